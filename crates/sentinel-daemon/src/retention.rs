use std::sync::Arc;
use std::time::Duration;

use sentinel_core::config::AppCfg;
use sentinel_store::StoreManager;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Periodic retention sweep plus vacuum (spec §4.3). Two independent
/// tickers since vacuum is far more expensive than a delete sweep and
/// defaults to running much less often.
pub async fn run(
    cfg_rx: watch::Receiver<Arc<AppCfg>>,
    store: Arc<StoreManager>,
    shutdown: CancellationToken,
) {
    let cfg = cfg_rx.borrow().clone();
    let mut sweep_ticker = tokio::time::interval(Duration::from_secs(cfg.retention_sweep_interval_secs));
    let mut vacuum_ticker = tokio::time::interval(Duration::from_secs(cfg.vacuum_interval_secs));
    sweep_ticker.tick().await; // skip the immediate first tick
    vacuum_ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("retention sweep task shutting down");
                return;
            }
            _ = sweep_ticker.tick() => {
                let cfg = cfg_rx.borrow().clone();
                let store = store.clone();
                let result = tokio::task::spawn_blocking(move || {
                    store.retention_sweep(cfg.retention_days, cfg.retention_alert_multiplier, cfg.retention_max_messages)
                }).await;
                match result {
                    Ok(Ok(report)) => info!(?report, "retention sweep complete"),
                    Ok(Err(e)) => error!(error = %e, "retention sweep failed"),
                    Err(e) => error!(error = %e, "retention sweep task panicked"),
                }
            }
            _ = vacuum_ticker.tick() => {
                let store = store.clone();
                let result = tokio::task::spawn_blocking(move || store.vacuum()).await;
                match result {
                    Ok(Ok(())) => info!("database vacuum complete"),
                    Ok(Err(e)) => error!(error = %e, "database vacuum failed"),
                    Err(e) => error!(error = %e, "vacuum task panicked"),
                }
            }
        }
    }
}
