use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("coordination store error: {0}")]
    Coord(#[from] sentinel_coord::CoordError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed stream entry {id}: missing field {field}")]
    MalformedEntry { id: String, field: &'static str },
}

pub type Result<T> = std::result::Result<T, StreamError>;
