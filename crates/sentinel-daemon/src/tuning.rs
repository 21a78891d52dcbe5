use std::sync::Arc;
use std::time::Duration;

use sentinel_core::config::AppCfg;
use sentinel_worker::AutoTuner;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Auto-tuning sweep interval: negative feedback accumulates slowly enough
/// that a fast poll would just waste a round trip per profile.
const TUNING_INTERVAL: Duration = Duration::from_secs(300);

/// Periodically evaluate every declared profile against its accumulated
/// negative feedback and apply any resulting threshold/min_score bump
/// (spec §4.7). Runs against whatever config is current each tick, so a
/// profile added via hot-reload is picked up on the next sweep.
pub async fn run(cfg_rx: watch::Receiver<Arc<AppCfg>>, tuner: Arc<AutoTuner>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(TUNING_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("auto-tuner sweep shutting down");
                return;
            }
            _ = ticker.tick() => {
                let cfg = cfg_rx.borrow().clone();
                for (profile_id, profile) in &cfg.global_profiles {
                    let decision = tuner
                        .evaluate(profile_id, profile.is_semantic(), profile.threshold, profile.min_score)
                        .await;
                    match decision {
                        Ok(Some(decision)) => {
                            if let Err(e) = tuner.apply(&decision).await {
                                error!(profile_id, error = %e, "failed to apply auto-tuning decision");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => error!(profile_id, error = %e, "auto-tuner evaluation failed"),
                    }
                }
            }
        }
    }
}
