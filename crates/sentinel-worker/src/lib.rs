//! Worker (C7): the scoring pipeline that pulls normalized events off the
//! ingestion stream, resolves their profile, scores them against both
//! pipelines, persists the result, and dispatches immediate alerts.
//!
//! [`consumer::run`] is the outer loop a daemon spawns one-per-consumer;
//! [`pipeline::score_event`] is the pure-ish per-message decision function
//! it drives. [`feedback::BatchFeedbackProcessor`] and [`tuner`] handle the
//! feedback side: centroid recomputation batching and profile auto-tuning.

pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod pipeline;
pub mod tuner;
pub mod types;

pub use consumer::run as run_consumer;
pub use error::{Result, WorkerError};
pub use feedback::BatchFeedbackProcessor;
pub use pipeline::score_event;
pub use tuner::AutoTuner;
