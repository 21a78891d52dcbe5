//! Session lifecycle coordination (spec §4.9): the generation-gated signals
//! every long-running task waits on, plus session import/logout handling.

pub mod error;
pub mod session;
pub mod signals;
pub mod types;

pub use error::{LifecycleError, Result};
pub use signals::LifecycleSignals;
pub use types::SessionEvent;
