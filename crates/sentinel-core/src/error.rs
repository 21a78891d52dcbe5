use thiserror::Error;

/// Top-level error type shared across every component.
///
/// Each per-message failure is caught at the worker boundary and mapped to
/// one of these variants before being logged — nothing here is allowed to
/// unwind through the consumer loop.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("coordination store error: {0}")]
    Coord(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("unknown profile id: {id}")]
    UnknownProfile { id: String },

    #[error("platform error: {0}")]
    Platform(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session desynchronized: generation {expected} != {actual}")]
    GenerationMismatch { expected: u64, actual: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Short machine-readable code, mirrored in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Coord(_) => "COORD_ERROR",
            Self::MalformedEvent(_) => "MALFORMED_EVENT",
            Self::UnknownProfile { .. } => "UNKNOWN_PROFILE",
            Self::Platform(_) => "PLATFORM_ERROR",
            Self::Delivery(_) => "DELIVERY_FAILED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::GenerationMismatch { .. } => "GENERATION_MISMATCH",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors where the per-message boundary should retry (not ack).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Platform(_) | Self::Coord(_) | Self::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
