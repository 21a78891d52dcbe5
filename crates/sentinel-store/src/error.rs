use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message not found: ({chat_id}, {msg_id})")]
    MessageNotFound { chat_id: i64, msg_id: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
