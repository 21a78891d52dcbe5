use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sentinel_coord::CoordStore;
use sentinel_semantic::SemanticEvaluator;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::types::{BatchHistoryEntry, BatchTrigger, RecomputeQueue};

/// Batch centroid recomputation interval: profiles are queued on feedback
/// and recomputed together rather than on every single feedback event, to
/// avoid thrashing the semantic cache under a burst of corrections.
const BATCH_INTERVAL: Duration = Duration::from_secs(600);
/// Queue size that forces an out-of-cycle batch run.
const BATCH_SIZE_THRESHOLD: usize = 5;
const BATCH_HISTORY_CAP: usize = 50;

/// Queues profile IDs whose semantic centroid needs recomputation and
/// flushes them in batches (spec §4.7, grounded on the original's 10-minute
/// / 5-profile batching policy). State survives restarts via the
/// coordination store.
pub struct BatchFeedbackProcessor {
    coord: CoordStore,
    semantic: Arc<SemanticEvaluator>,
    pending: Mutex<HashSet<String>>,
    history: Mutex<Vec<BatchHistoryEntry>>,
}

impl BatchFeedbackProcessor {
    pub async fn new(coord: CoordStore, semantic: Arc<SemanticEvaluator>) -> Result<Self> {
        let restored: RecomputeQueue = coord.load_batch_queue().await?.unwrap_or_default();
        Ok(Self {
            coord,
            semantic,
            pending: Mutex::new(restored.profile_ids.into_iter().collect()),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Queue `profile_id` for the next batch flush. Does not recompute
    /// anything itself.
    pub async fn schedule_recompute(&self, profile_id: &str) -> Result<()> {
        let mut pending = self.pending.lock().await;
        pending.insert(profile_id.to_string());
        let size = pending.len();
        self.persist(&pending).await?;
        info!(profile_id, queue_size = size, "scheduled profile for centroid recompute");
        Ok(())
    }

    async fn persist(&self, pending: &HashSet<String>) -> Result<()> {
        let queue = RecomputeQueue { profile_ids: pending.iter().cloned().collect() };
        self.coord.save_batch_queue(&queue).await?;
        Ok(())
    }

    /// Run forever: flush on a fixed interval, or immediately once the
    /// queue crosses the size threshold.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let queue_len = self.pending.lock().await.len();
            if queue_len == 0 {
                continue;
            }
            if queue_len >= BATCH_SIZE_THRESHOLD {
                self.flush(BatchTrigger::QueueSize).await?;
                continue;
            }
            let due = self
                .coord
                .load_last_batch_time()
                .await?
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|t| Utc::now().signed_duration_since(t).to_std().unwrap_or_default() >= BATCH_INTERVAL)
                .unwrap_or(true);
            if due {
                self.flush(BatchTrigger::Interval).await?;
            }
        }
    }

    async fn flush(&self, trigger: BatchTrigger) -> Result<()> {
        let started_at = Utc::now();
        let profile_ids: Vec<String> = {
            let mut pending = self.pending.lock().await;
            let ids: Vec<String> = pending.drain().collect();
            self.persist(&pending).await?;
            ids
        };
        if profile_ids.is_empty() {
            return Ok(());
        }

        for profile_id in &profile_ids {
            self.semantic.invalidate(profile_id);
        }

        self.coord.save_last_batch_time(&started_at.to_rfc3339()).await?;

        let entry = BatchHistoryEntry {
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            profile_ids: profile_ids.clone(),
            trigger,
        };
        let mut history = self.history.lock().await;
        history.push(entry);
        if history.len() > BATCH_HISTORY_CAP {
            let overflow = history.len() - BATCH_HISTORY_CAP;
            history.drain(0..overflow);
        }

        info!(count = profile_ids.len(), trigger = ?trigger, "flushed centroid recompute batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_trigger_serializes_snake_case() {
        let json = serde_json::to_string(&BatchTrigger::QueueSize).unwrap();
        assert_eq!(json, "\"queue_size\"");
    }
}
