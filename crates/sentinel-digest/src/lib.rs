//! Digest engine (C8): periodically bundles interesting messages nobody
//! was instantly alerted about into a combined summary, per cadence.
//!
//! [`discovery`] walks the declared config to find which channels/users run
//! a cadence; [`aggregation`] merges their settings into one run;
//! [`scheduler`] tracks due-check state; [`collector`] pulls and ranks
//! candidates out of the store; [`formatter`] renders them to text;
//! [`delivery`] sends it. [`engine::DigestEngine`] is the loop that ties
//! all of it together.

pub mod aggregation;
pub mod collector;
pub mod delivery;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod scheduler;
pub mod types;

pub use engine::DigestEngine;
pub use error::{DigestError, Result};
pub use types::{DigestExecutionRecord, ExecutionStatus};
