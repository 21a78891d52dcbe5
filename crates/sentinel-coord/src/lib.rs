pub mod client;
pub mod error;
pub mod keys;

pub use client::{CoordStore, StreamEntry};
pub use error::{CoordError, Result};
