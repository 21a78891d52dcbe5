use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Per-message correlation identifier, attached to every log line emitted
/// while processing one event. UUIDv7 — time-sortable for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media attached to an inbound message, as reported by the
/// chat-platform adapter. Coarse-grained on purpose — only the categories
/// the heuristic evaluator's structural flags care about are distinguished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    None,
    Document,
    Photo,
    Video,
    Poll,
    Other,
}

impl MediaKind {
    /// True for media kinds the `detect_documents` structural flag matches.
    pub fn is_document_like(&self) -> bool {
        matches!(self, MediaKind::Document)
    }

    pub fn is_poll(&self) -> bool {
        matches!(self, MediaKind::Poll)
    }
}

/// Normalized chat event produced by the platform adapter at the ingestion
/// boundary. This is the single typed struct every downstream component
/// operates on — the platform's own untyped payload is converted to this
/// once, at the edge, and never inspected again further downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub chat_id: i64,
    pub chat_title: String,
    pub msg_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub text: String,
    #[serde(default)]
    pub mentioned: bool,
    #[serde(default)]
    pub reactions_count: i32,
    #[serde(default)]
    pub replies_count: i32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub reply_to_msg_id: Option<i64>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub media_type: MediaKind,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub has_forward: bool,
    #[serde(default)]
    pub forward_from: Option<String>,
    /// Whether the sender holds an admin/moderator role in `chat_id`, for
    /// `prioritize_admin` scoring. Supplemental field (not in the
    /// distilled event schema) recovered from the original detector's
    /// `sender_is_admin` check.
    #[serde(default)]
    pub sender_is_admin: bool,
}

impl ChatEvent {
    /// SHA-256 hex digest of the message text, used for dedup tooling.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True for a private (1:1) conversation, by the platform's sign convention
    /// (positive chat IDs are users, negative are groups/channels).
    pub fn is_private(&self) -> bool {
        self.chat_id > 0
    }
}

/// Delivery mode for an alert or digest: where (if anywhere) output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Save only — no message is sent.
    #[default]
    None,
    /// Direct message to the operator.
    Dm,
    /// Post to the configured target channel.
    Digest,
    /// Both DM and target channel.
    Both,
}

impl DeliveryMode {
    /// Legacy profiles may carry the retired `"channel"` mode; normalize it
    /// to `Dm`. Flagged in the design notes as a possibly-unintentional
    /// migration shim inherited unchanged from the source system.
    pub fn parse_legacy(s: &str) -> Self {
        match s {
            "dm" => Self::Dm,
            "digest" => Self::Digest,
            "both" => Self::Both,
            "channel" => Self::Dm,
            _ => Self::None,
        }
    }

    pub fn includes_dm(&self) -> bool {
        matches!(self, Self::Dm | Self::Both)
    }

    pub fn includes_digest(&self) -> bool {
        matches!(self, Self::Digest | Self::Both)
    }
}
