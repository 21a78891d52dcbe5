//! Atomic temp-file + rename writes, shared by every component that
//! persists a small state document to local disk: the digest scheduler's
//! `last_run` map, the auto-tuner's rewritten profile config, and the
//! batch feedback processor's restart-safety fallback. Matches the
//! original tool's `_save_state`-style persistence (spec §4.8/§5).

use std::io::Write;
use std::path::Path;

use crate::error::{Result, SentinelError};

/// Write `contents` to `path` atomically: write to a sibling temp file in
/// the same directory, fsync it, then rename over the destination. A
/// reader never observes a partially-written file, and a crash mid-write
/// leaves the previous version intact.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SentinelError::Internal(format!("atomic rename failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{\"a\":1}").unwrap();
        let read = std::fs::read_to_string(&path).unwrap();
        assert_eq!(read, "{\"a\":1}");
    }

    #[test]
    fn overwrites_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
