use std::time::Duration;

use sentinel_coord::CoordStore;
use sentinel_lifecycle::LifecycleSignals;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Published to `worker_status` on a fixed heartbeat so an external admin
/// surface can show whether the daemon is alive and authorized, without
/// needing its own liveness probe against every subsystem.
#[derive(Serialize)]
struct WorkerStatus {
    authorized: bool,
    generation: u64,
    pid: u32,
    git_sha: &'static str,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run(coord: CoordStore, signals: LifecycleSignals, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("worker status heartbeat shutting down");
                return;
            }
            _ = ticker.tick() => {
                let status = WorkerStatus {
                    authorized: signals.is_authorized(),
                    generation: signals.generation(),
                    pid: std::process::id(),
                    git_sha: env!("SENTINEL_GIT_SHA"),
                };
                if let Err(e) = coord.set_worker_status(&status).await {
                    error!(error = %e, "failed to publish worker status heartbeat");
                }
            }
        }
    }
}
