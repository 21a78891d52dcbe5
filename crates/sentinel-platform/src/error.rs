use thiserror::Error;

/// Errors produced by the chat-platform adapter (C7/C9's external
/// collaborator, spec §6.2). Kept deliberately thin — the contract is
/// opaque to the rest of the system, so callers only ever see "it failed"
/// plus enough context to log.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("not connected")]
    NotConnected,

    #[error("invalid session file: {0}")]
    InvalidSession(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

impl From<PlatformError> for sentinel_core::SentinelError {
    fn from(e: PlatformError) -> Self {
        sentinel_core::SentinelError::Platform(e.to_string())
    }
}
