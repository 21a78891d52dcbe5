pub mod atomic;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Result, SentinelError};
