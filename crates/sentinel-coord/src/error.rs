use thiserror::Error;

/// Errors raised by the coordination-store client.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("key not found: {0}")]
    NotFound(String),
}

impl From<redis::RedisError> for CoordError {
    fn from(e: redis::RedisError) -> Self {
        CoordError::Command(e.to_string())
    }
}

impl From<CoordError> for sentinel_core::SentinelError {
    fn from(e: CoordError) -> Self {
        sentinel_core::SentinelError::Coord(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
