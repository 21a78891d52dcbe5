use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("store error: {0}")]
    Store(#[from] sentinel_store::StoreError),

    #[error("coordination store error: {0}")]
    Coord(#[from] sentinel_coord::CoordError),

    #[error("platform error: {0}")]
    Platform(String),

    #[error(transparent)]
    Core(#[from] sentinel_core::SentinelError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;

impl From<DigestError> for sentinel_core::SentinelError {
    fn from(e: DigestError) -> Self {
        match e {
            DigestError::Store(_) => sentinel_core::SentinelError::Database(e.to_string()),
            DigestError::Coord(_) => sentinel_core::SentinelError::Coord(e.to_string()),
            DigestError::Platform(msg) => sentinel_core::SentinelError::Platform(msg),
            DigestError::Core(inner) => inner,
            DigestError::Serialization(err) => sentinel_core::SentinelError::Serialization(err),
            DigestError::Io(err) => sentinel_core::SentinelError::Io(err),
        }
    }
}
