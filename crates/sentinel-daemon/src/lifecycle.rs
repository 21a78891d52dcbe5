use std::sync::Arc;
use std::time::Duration;

use sentinel_core::config::AppCfg;
use sentinel_coord::CoordStore;
use sentinel_digest::DigestEngine;
use sentinel_lifecycle::LifecycleSignals;
use sentinel_platform::PlatformClient;
use sentinel_semantic::SemanticEvaluator;
use sentinel_store::StoreManager;
use sentinel_stream::StreamConsumer;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How often this supervisor polls for a generation change while a session
/// is active. `LifecycleSignals` has no "notify on generation bump"
/// primitive of its own, so a short poll stands in — cheap against a
/// handful of checks per minute.
const GENERATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Supervises the per-generation collaborators that depend on an
/// authorized platform session: the ingestion consumer pool (spec §5 "MAY
/// run with count > 1 consumers") and the digest engine. Waits for
/// authorization, spawns both, and tears them down the moment the
/// lifecycle generation advances (a re-login), re-entering the wait gate
/// for the next session (spec §4.9).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    cfg_rx: watch::Receiver<Arc<AppCfg>>,
    coord: CoordStore,
    store: Arc<StoreManager>,
    semantic: Arc<SemanticEvaluator>,
    platform: Arc<dyn PlatformClient>,
    signals: LifecycleSignals,
    digest_state_path: String,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = signals.wait_for_authorized() => {}
        }

        let generation = signals.generation();
        let cfg = cfg_rx.borrow().clone();
        info!(generation, "session authorized, starting ingestion and digest pipeline");

        let generation_token = CancellationToken::new();
        let mut consumer_handles = Vec::new();

        for idx in 0..cfg.worker_consumer_count.max(1) {
            let consumer_name = format!("{}-{}", cfg.redis_consumer, idx);
            match StreamConsumer::new(coord.clone(), cfg.redis_stream.clone(), cfg.redis_group.clone(), consumer_name).await {
                Ok(consumer) => {
                    let handle = tokio::spawn(sentinel_worker::run_consumer(
                        consumer,
                        cfg.clone(),
                        store.clone(),
                        semantic.clone(),
                        platform.clone(),
                        signals.clone(),
                    ));
                    consumer_handles.push(handle);
                }
                Err(e) => error!(idx, error = %e, "failed to start ingestion consumer"),
            }
        }

        let digest_engine = DigestEngine::new(
            cfg_rx.clone(),
            store.clone(),
            Arc::new(coord.clone()),
            platform.clone(),
            digest_state_path.clone(),
        );
        let digest_handle = tokio::spawn(digest_engine.run(generation_token.clone()));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    generation_token.cancel();
                    break;
                }
                _ = tokio::time::sleep(GENERATION_POLL_INTERVAL) => {
                    if !signals.is_current_generation(generation) {
                        warn!(generation, current = signals.generation(), "lifecycle generation advanced, tearing down session pipeline");
                        generation_token.cancel();
                        break;
                    }
                }
            }
        }

        for handle in consumer_handles {
            if let Err(e) = handle.await {
                error!(error = %e, "ingestion consumer task panicked");
            }
        }
        if let Err(e) = digest_handle.await {
            error!(error = %e, "digest engine task panicked");
        }

        if shutdown.is_cancelled() {
            return;
        }
    }
}
