//! Heuristic evaluator (C5): the pure keyword/VIP/reaction/reply/structural
//! scoring function over one chat event and its resolved profile.

pub mod detectors;
pub mod evaluate;
pub mod types;

pub use evaluate::{content_hash, evaluate};
pub use types::HeuristicResult;
