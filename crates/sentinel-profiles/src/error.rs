use thiserror::Error;

/// Errors from the profile resolver. Resolution itself never fails — an
/// unknown bound profile ID is logged and skipped per spec §4.2 — so this
/// enum only covers the supplemental validation pass.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ProfileError>;
