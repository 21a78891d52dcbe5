use sentinel_coord::{keys, CoordStore};
use sentinel_platform::{session::validate_sqlite_session, PlatformClient, SelfIdentity};

use crate::error::{LifecycleError, Result};
use crate::signals::LifecycleSignals;
use crate::types::SessionEvent;

/// Tables a session file must contain to be considered a usable platform
/// session rather than a stray or truncated SQLite file.
const REQUIRED_SESSION_TABLES: &[&str] = &["sessions", "entities"];

/// Import a freshly-dropped session file: validate its shape, reconnect the
/// platform client against it, bump the generation and publish
/// [`SessionEvent::SessionImported`] followed by
/// [`SessionEvent::SessionAuthorized`] (spec §4.9: import implies an
/// immediate authorization once the reconnect succeeds).
pub async fn import_session(
    session_path: &str,
    signals: &LifecycleSignals,
    coord: &CoordStore,
    platform: &dyn PlatformClient,
) -> Result<SelfIdentity> {
    validate_sqlite_session(session_path, REQUIRED_SESSION_TABLES)
        .map_err(|e| LifecycleError::InvalidSession(e.to_string()))?;

    signals.close_handshake_gate();
    signals.clear_authorized();

    platform.disconnect().await.map_err(|e| LifecycleError::InvalidSession(e.to_string()))?;
    platform.connect().await.map_err(|e| LifecycleError::InvalidSession(e.to_string()))?;
    let identity = platform
        .get_me()
        .await
        .map_err(|e| LifecycleError::InvalidSession(e.to_string()))?;

    let generation = signals.advance_generation();

    coord
        .publish(keys::CHANNEL_SESSION_UPDATED, &SessionEvent::SessionImported { generation })
        .await?;
    coord
        .publish(
            keys::CHANNEL_SESSION_UPDATED,
            &SessionEvent::SessionAuthorized {
                generation,
                identity: identity.display_name.clone(),
            },
        )
        .await?;

    signals.open_handshake_gate();
    signals.mark_authorized();

    Ok(identity)
}

/// Tear down the active session: disconnect, clear the `authorized` signal
/// and per-generation UI caches, publish [`SessionEvent::SessionLogout`].
/// The session file itself is left on disk for the caller (typically an
/// admin HTTP handler) to remove, since this module only owns in-process
/// and coordination-store state.
pub async fn logout(
    generation: u64,
    signals: &LifecycleSignals,
    coord: &CoordStore,
    platform: &dyn PlatformClient,
) -> Result<()> {
    signals.close_handshake_gate();
    signals.clear_authorized();

    platform.disconnect().await.map_err(|e| LifecycleError::InvalidSession(e.to_string()))?;

    coord.delete(&keys::cached_channels(generation)).await?;
    coord.delete(&keys::cached_users(generation)).await?;

    coord
        .publish(keys::CHANNEL_SESSION_UPDATED, &SessionEvent::SessionLogout)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_tables_are_stable() {
        assert_eq!(REQUIRED_SESSION_TABLES, &["sessions", "entities"]);
    }
}
