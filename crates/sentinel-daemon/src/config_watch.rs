use std::sync::Arc;

use futures_util::StreamExt;
use sentinel_core::config::AppCfg;
use sentinel_coord::{keys, CoordStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Watch `config_updated` and hot-reload the declarative half of `AppCfg`
/// (spec §4.1: "on a 'config changed' broadcast, re-read and atomically
/// swap"). Env-sourced settings are never touched by a reload. A reload
/// that fails to parse is logged and dropped — the previous `Arc<AppCfg>`
/// keeps serving.
pub async fn run(
    coord: CoordStore,
    config_path: String,
    cfg_tx: watch::Sender<Arc<AppCfg>>,
    shutdown: CancellationToken,
) {
    loop {
        let pubsub = match coord.subscribe(keys::CHANNEL_CONFIG_UPDATED).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to subscribe to config_updated, retrying in 5s");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => continue,
                }
            }
        };
        let mut stream = pubsub.into_on_message();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("config watcher shutting down");
                    return;
                }
                msg = stream.next() => {
                    let Some(_msg) = msg else {
                        warn!("config_updated pub/sub stream closed, resubscribing");
                        break;
                    };
                    reload(&config_path, &cfg_tx);
                }
            }
        }
    }
}

fn reload(config_path: &str, cfg_tx: &watch::Sender<Arc<AppCfg>>) {
    let mut next = (**cfg_tx.borrow()).clone();
    match next.reload_declared(config_path) {
        Ok(()) => {
            info!("config reloaded from {config_path}");
            let _ = cfg_tx.send(Arc::new(next));
        }
        Err(e) => {
            error!(error = %e, "config reload failed, keeping previous config");
        }
    }
}
