use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("coordination store error: {0}")]
    Coord(#[from] sentinel_coord::CoordError),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

impl From<LifecycleError> for sentinel_core::SentinelError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Coord(_) => sentinel_core::SentinelError::Coord(e.to_string()),
            LifecycleError::InvalidSession(msg) => sentinel_core::SentinelError::Platform(msg),
            LifecycleError::Database(_) => sentinel_core::SentinelError::Database(e.to_string()),
            LifecycleError::Io(err) => sentinel_core::SentinelError::Io(err),
        }
    }
}
