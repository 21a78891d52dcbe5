//! Sends a formatted digest to its resolved target(s) and reports which
//! succeeded, so the caller can mark messages processed and choose the
//! execution-audit status.

use sentinel_core::types::DeliveryMode;
use sentinel_platform::PlatformClient;
use tracing::warn;

/// The platform adapter's own identity, used for the "DM the operator"
/// delivery mode (spec-equivalent of the worker's instant-alert target).
const DM_TARGET: &str = "me";

pub struct DeliveryOutcome {
    pub dm_sent: Option<bool>,
    pub channel_sent: Option<bool>,
}

impl DeliveryOutcome {
    pub fn all_attempted_succeeded(&self) -> bool {
        self.dm_sent.unwrap_or(true) && self.channel_sent.unwrap_or(true)
    }

    pub fn any_succeeded(&self) -> bool {
        self.dm_sent.unwrap_or(false) || self.channel_sent.unwrap_or(false)
    }

    pub fn attempted_anything(&self) -> bool {
        self.dm_sent.is_some() || self.channel_sent.is_some()
    }
}

/// Deliver every chunk, in order, to whichever of (DM, target channel) the
/// resolved mode calls for. A `digest`/`both` mode with no resolvable
/// target channel is logged and treated as a failed channel send rather
/// than silently dropped.
pub async fn deliver(
    platform: &dyn PlatformClient,
    mode: DeliveryMode,
    target_channel: Option<&str>,
    chunks: &[String],
) -> DeliveryOutcome {
    let mut outcome = DeliveryOutcome { dm_sent: None, channel_sent: None };

    if mode.includes_dm() {
        outcome.dm_sent = Some(send_all(platform, DM_TARGET, chunks).await);
    }
    if mode.includes_digest() {
        match target_channel {
            Some(target) => outcome.channel_sent = Some(send_all(platform, target, chunks).await),
            None => {
                warn!("digest mode requires a target channel but none is configured");
                outcome.channel_sent = Some(false);
            }
        }
    }

    outcome
}

async fn send_all(platform: &dyn PlatformClient, target: &str, chunks: &[String]) -> bool {
    for chunk in chunks {
        if let Err(e) = platform.send_message(target, chunk, true).await {
            warn!(target, error = %e, "digest chunk delivery failed");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_with_nothing_attempted_counts_as_succeeded() {
        let outcome = DeliveryOutcome { dm_sent: None, channel_sent: None };
        assert!(outcome.all_attempted_succeeded());
        assert!(!outcome.attempted_anything());
    }

    #[test]
    fn partial_failure_is_detected() {
        let outcome = DeliveryOutcome { dm_sent: Some(true), channel_sent: Some(false) };
        assert!(!outcome.all_attempted_succeeded());
        assert!(outcome.any_succeeded());
    }
}
