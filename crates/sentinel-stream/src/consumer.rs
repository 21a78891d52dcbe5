use sentinel_coord::CoordStore;
use tracing::warn;

use crate::error::{Result, StreamError};
use crate::types::IngestedEvent;

/// How long an entry may sit unacked before [`StreamConsumer::reclaim_stale`]
/// considers it abandoned by a crashed worker (spec §4.4 redelivery).
const DEFAULT_MIN_IDLE_MS: usize = 30_000;
/// How long a blocking read waits for new entries before returning empty
/// (spec §5: stream read blocks <= 5s).
const DEFAULT_BLOCK_MS: usize = 5_000;

/// One consumer-group member reading from the ingestion stream (spec §4.4).
///
/// Each worker task owns its own `StreamConsumer` with a distinct consumer
/// name inside the shared group; Redis Streams partitions unacknowledged
/// entries across them.
pub struct StreamConsumer {
    coord: CoordStore,
    stream: String,
    group: String,
    consumer: String,
}

impl StreamConsumer {
    /// Ensure the consumer group exists (idempotent — `BUSYGROUP` is
    /// tolerated) and return a ready-to-read consumer.
    pub async fn new(coord: CoordStore, stream: String, group: String, consumer: String) -> Result<Self> {
        coord.xgroup_create_mkstream(&stream, &group).await?;
        Ok(Self { coord, stream, group, consumer })
    }

    /// Block up to 5s for up to `count` new entries, decoding each payload
    /// into a [`ChatEvent`]. A malformed entry is logged and skipped rather
    /// than failing the whole batch — one corrupt record must not stall an
    /// otherwise-healthy consumer.
    pub async fn poll(&self, count: usize) -> Result<Vec<IngestedEvent>> {
        let entries = self
            .coord
            .xreadgroup_new(&self.stream, &self.group, &self.consumer, count, DEFAULT_BLOCK_MS)
            .await?;
        Ok(self.decode_all(entries).await)
    }

    /// Reclaim entries idle longer than `min_idle_ms` that were never acked
    /// by their original consumer, redelivering them to this one
    /// (at-least-once per spec §4.4/§5).
    pub async fn reclaim_stale(&self, count: usize) -> Result<Vec<IngestedEvent>> {
        let entries = self
            .coord
            .xautoclaim(&self.stream, &self.group, &self.consumer, DEFAULT_MIN_IDLE_MS, count)
            .await?;
        Ok(self.decode_all(entries).await)
    }

    pub async fn ack(&self, stream_id: &str) -> Result<()> {
        self.coord.xack(&self.stream, &self.group, stream_id).await?;
        Ok(())
    }

    /// Decode every entry, dropping malformed ones. A malformed entry is
    /// acked immediately rather than left pending — it can never decode
    /// successfully no matter how many times it's redelivered, so leaving
    /// it unacked would just make `reclaim_stale` hand it back forever.
    async fn decode_all(&self, entries: Vec<sentinel_coord::StreamEntry>) -> Vec<IngestedEvent> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.decode(&entry) {
                Ok(event) => out.push(event),
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "acking and dropping malformed ingestion entry");
                    if let Err(ack_err) = self.ack(&entry.id).await {
                        warn!(id = %entry.id, error = %ack_err, "failed to ack malformed entry, will be redelivered");
                    }
                }
            }
        }
        out
    }

    fn decode(&self, entry: &sentinel_coord::StreamEntry) -> Result<IngestedEvent> {
        let payload = entry
            .fields
            .iter()
            .find(|(k, _)| k == "payload")
            .map(|(_, v)| v.as_str())
            .ok_or(StreamError::MalformedEntry { id: entry.id.clone(), field: "payload" })?;
        let event = serde_json::from_str(payload)?;
        Ok(IngestedEvent { stream_id: entry.id.clone(), event })
    }
}
