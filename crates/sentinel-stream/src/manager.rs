use sentinel_core::types::ChatEvent;
use sentinel_coord::CoordStore;
use tracing::debug;

use crate::error::Result;

/// Approximate cap applied via `XADD ... MAXLEN ~` (spec §4.4's bounded-length
/// producer-side truncation).
const STREAM_MAX_LEN: usize = 100_000;

/// Appends normalized chat events to the ingestion stream.
///
/// One `StreamProducer` is shared by every platform-adapter task that
/// converts raw platform payloads into [`ChatEvent`]s.
pub struct StreamProducer {
    coord: CoordStore,
    stream: String,
}

impl StreamProducer {
    pub fn new(coord: CoordStore, stream: String) -> Self {
        Self { coord, stream }
    }

    /// Append one event, JSON-encoded under a single `payload` field so the
    /// consumer side never has to reconstruct a typed struct from loose
    /// string fields.
    pub async fn append(&self, event: &ChatEvent) -> Result<String> {
        let payload = serde_json::to_string(event)?;
        let id = self
            .coord
            .xadd_message_capped(&self.stream, STREAM_MAX_LEN, &[("payload", payload.as_str())])
            .await?;
        debug!(stream = %self.stream, id = %id, chat_id = event.chat_id, msg_id = event.msg_id, "event appended to ingestion stream");
        Ok(id)
    }
}
