//! Semantic evaluator (C6): embedding-centroid similarity scoring for
//! interest profiles, with an in-memory per-profile centroid cache.

pub mod backend;
pub mod error;
pub mod evaluator;
pub mod types;

pub use backend::{EmbeddingBackend, NoopEmbeddingBackend};
pub use error::{Result, SemanticError};
pub use evaluator::SemanticEvaluator;
pub use types::{Centroid, InterestEvaluation};
