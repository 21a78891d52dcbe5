use sentinel_core::types::ChatEvent;

/// One delivered ingestion-stream entry: the stream-assigned ID (needed to
/// ack or to track pending-entry age) plus the decoded event (spec §4.4).
#[derive(Debug, Clone)]
pub struct IngestedEvent {
    pub stream_id: String,
    pub event: ChatEvent,
}
