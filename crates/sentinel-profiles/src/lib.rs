//! Profile resolver (C2): merges global profile definitions with per-channel
//! and per-user bindings/overrides into a [`types::ResolvedProfile`].
//!
//! Pure and synchronous — no I/O, no mutable state. A new [`resolver::ProfileResolver`]
//! is constructed from whatever [`sentinel_core::config::AppCfg`] snapshot is
//! current; callers re-resolve after a config reload.

pub mod error;
pub mod resolver;
pub mod types;

pub use error::{ProfileError, Result};
pub use resolver::{validate_profiles, ProfileResolver};
pub use types::ResolvedProfile;
