use std::sync::Arc;
use std::time::Duration;

use sentinel_core::config::AppCfg;
use sentinel_lifecycle::LifecycleSignals;
use sentinel_platform::PlatformClient;
use sentinel_semantic::SemanticEvaluator;
use sentinel_store::StoreManager;
use sentinel_stream::StreamConsumer;
use tracing::{error, warn};

use crate::dispatch;
use crate::error::Result;
use crate::pipeline::score_event;

/// How many entries to pull per poll/reclaim round. Kept modest: the batch
/// is scored message-by-message, and a large batch would just delay acking
/// the earlier entries in it.
const POLL_BATCH: usize = 32;
/// How often to sweep for stale (crashed-consumer) pending entries, against
/// the 30s idle threshold `StreamConsumer::reclaim_stale` uses internally.
const RECLAIM_INTERVAL: Duration = Duration::from_secs(45);

/// Run one consumer's ingestion loop until cancelled. Captures the
/// lifecycle generation at entry; if a re-login bumps the generation this
/// loop exits so the caller can re-enter the outer wait-for-auth gate and
/// restart with a fresh generation (spec §4.9).
pub async fn run(
    consumer: StreamConsumer,
    cfg: Arc<AppCfg>,
    store: Arc<StoreManager>,
    semantic: Arc<SemanticEvaluator>,
    platform: Arc<dyn PlatformClient>,
    signals: LifecycleSignals,
) -> Result<()> {
    let generation = signals.generation();
    let mut last_reclaim = tokio::time::Instant::now();

    loop {
        if !signals.is_current_generation(generation) {
            warn!(generation, "lifecycle generation advanced, stopping consumer loop");
            return Ok(());
        }
        signals.wait_for_handshake_gate().await;

        let mut batch = consumer.poll(POLL_BATCH).await?;
        if last_reclaim.elapsed() >= RECLAIM_INTERVAL {
            batch.extend(consumer.reclaim_stale(POLL_BATCH).await?);
            last_reclaim = tokio::time::Instant::now();
        }

        for ingested in batch {
            let outcome = process_one(&ingested.event, &cfg, &store, &semantic, platform.as_ref()).await;
            let should_ack = match outcome {
                Ok(()) => true,
                Err(e) => {
                    let message = e.to_string();
                    let transient = sentinel_core::SentinelError::from(e).is_transient();
                    if transient {
                        warn!(stream_id = %ingested.stream_id, error = %message, "transient failure processing event, leaving unacked for redelivery");
                    } else {
                        error!(stream_id = %ingested.stream_id, error = %message, "non-transient failure processing event, acking to avoid poisoning the stream");
                    }
                    !transient
                }
            };
            if should_ack {
                if let Err(e) = consumer.ack(&ingested.stream_id).await {
                    error!(stream_id = %ingested.stream_id, error = %e, "failed to ack stream entry");
                }
            }
        }
    }
}

async fn process_one(
    event: &sentinel_core::types::ChatEvent,
    cfg: &AppCfg,
    store: &StoreManager,
    semantic: &SemanticEvaluator,
    platform: &dyn PlatformClient,
) -> Result<()> {
    let Some(outcome) = score_event(event, cfg, semantic).await? else {
        return Ok(());
    };

    store.upsert_message(&outcome.stored)?;

    let delivered = dispatch::dispatch_alerts(event, &outcome.matched_alert_profiles, cfg, store, platform).await?;
    if delivered {
        let mut alerted = outcome.stored;
        alerted.alerted = true;
        store.upsert_message(&alerted)?;
    }

    Ok(())
}
