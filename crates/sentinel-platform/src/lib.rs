//! Chat-platform client adapter (spec §6.2): an opaque external
//! collaborator with a narrow, specified contract. The rest of the system
//! depends only on [`PlatformClient`]; [`HttpPlatformClient`] is the one
//! concrete implementation shipped here.

pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use client::{HttpPlatformClient, PlatformClient};
pub use error::{PlatformError, Result};
pub use types::{EntityInfo, SelfIdentity};
