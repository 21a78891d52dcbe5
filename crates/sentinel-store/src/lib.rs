//! Persistence layer (C3): the SQLite-backed store of record for scored
//! messages, feedback, webhook deliveries, and auto-tuner adjustments.
//!
//! All access goes through [`manager::StoreManager`], which owns a single
//! blocking `rusqlite::Connection` behind a mutex. Async callers run through
//! `tokio::task::spawn_blocking`.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, StoreError};
pub use manager::StoreManager;
pub use types::{
    Feedback, FeedbackProfile, ProfileAdjustment, RetentionReport, SemanticType, StoredMessage,
    WebhookDelivery,
};
