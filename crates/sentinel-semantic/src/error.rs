use thiserror::Error;

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("persistence error: {0}")]
    Store(#[from] sentinel_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SemanticError>;
