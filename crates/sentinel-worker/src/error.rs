use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("coordination store error: {0}")]
    Coord(#[from] sentinel_coord::CoordError),

    #[error("stream error: {0}")]
    Stream(#[from] sentinel_stream::StreamError),

    #[error("store error: {0}")]
    Store(#[from] sentinel_store::StoreError),

    #[error("semantic evaluator error: {0}")]
    Semantic(#[from] sentinel_semantic::SemanticError),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

impl From<WorkerError> for sentinel_core::SentinelError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Coord(_) => sentinel_core::SentinelError::Coord(e.to_string()),
            WorkerError::Stream(_) => sentinel_core::SentinelError::Internal(e.to_string()),
            WorkerError::Store(_) => sentinel_core::SentinelError::Database(e.to_string()),
            WorkerError::Semantic(_) => sentinel_core::SentinelError::Internal(e.to_string()),
            WorkerError::Platform(msg) => sentinel_core::SentinelError::Platform(msg),
            WorkerError::Serialization(err) => sentinel_core::SentinelError::Serialization(err),
            WorkerError::Io(err) => sentinel_core::SentinelError::Io(err),
        }
    }
}
