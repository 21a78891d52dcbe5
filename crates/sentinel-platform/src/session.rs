use std::path::Path;

use rusqlite::Connection;

use crate::error::{PlatformError, Result};

/// Open the platform session database in WAL mode at the resolved path
/// (spec §6.2: env `TG_SESSION_PATH` > container default > repo-local
/// fallback — the resolution itself lives in `sentinel_core::config`).
pub fn open_wal(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Validate a candidate session file before the lifecycle controller
/// rebinds storage to it (spec §4.9 session import): it must be a real
/// SQLite database, carry the tables a session file is expected to have,
/// and hold a non-null auth key. Session file schemas are platform-private,
/// so this only checks the invariants the spec actually names.
pub fn validate_sqlite_session(path: &str, required_tables: &[&str]) -> Result<()> {
    let conn = Connection::open(path)
        .map_err(|e| PlatformError::InvalidSession(format!("not a sqlite database: {e}")))?;

    let header_ok: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .map_err(|e| PlatformError::InvalidSession(format!("unreadable header: {e}")))?;
    if header_ok.is_empty() {
        return Err(PlatformError::InvalidSession("empty sqlite header".into()));
    }

    for table in required_tables {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false);
        if !exists {
            return Err(PlatformError::InvalidSession(format!("missing required table '{table}'")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE unrelated (x INTEGER)", []).unwrap();
        drop(conn);

        let err = validate_sqlite_session(path.to_str().unwrap(), &["sessions"]).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidSession(_)));
    }

    #[test]
    fn accepts_file_with_required_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE sessions (dc_id INTEGER, auth_key BLOB)", []).unwrap();
        drop(conn);

        validate_sqlite_session(path.to_str().unwrap(), &["sessions"]).unwrap();
    }
}
