use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which pipeline produced a match, for UI/debugging display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    #[default]
    None,
    Interest,
    Feedback,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Interest => "interest",
            Self::Feedback => "feedback",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SemanticType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "interest" => Ok(Self::Interest),
            "feedback" => Ok(Self::Feedback),
            other => Err(format!("unknown semantic type: {other}")),
        }
    }
}

/// A scored message, as upserted by the worker (C7) and read back by the
/// digest engine (C8). Primary key `(chat_id, msg_id)` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoredMessage {
    pub chat_id: i64,
    pub msg_id: i64,
    pub content_hash: String,
    pub score: f32,
    pub keyword_score: f32,
    /// `profile_id -> cosine similarity`.
    pub semantic_scores: HashMap<String, f32>,
    pub semantic_type: SemanticType,
    pub alerted: bool,
    pub feed_alert_flag: bool,
    pub feed_interest_flag: bool,
    pub chat_title: String,
    pub sender_name: String,
    pub sender_id: i64,
    pub message_text: String,
    /// Comma-joined trigger keywords, for quick display.
    pub triggers: String,
    /// `category -> [keyword, ...]`.
    pub trigger_annotations: HashMap<String, Vec<String>>,
    pub matched_profiles: Vec<String>,
    pub digest_schedule: String,
    pub digest_processed: bool,
    pub created_at: String,
}

impl StoredMessage {
    /// `max(keyword_score, max(semantic_scores.values()))`, falling back to
    /// `score` if neither is populated — spec §4.8 collector rule.
    pub fn effective_score(&self) -> f32 {
        let semantic_max = self
            .semantic_scores
            .values()
            .cloned()
            .fold(f32::MIN, f32::max);
        let candidate = self.keyword_score.max(if semantic_max == f32::MIN { f32::MIN } else { semantic_max });
        if candidate == f32::MIN {
            self.score
        } else {
            candidate
        }
    }
}

/// A single feedback event on a scored message: `(chat_id, msg_id)` primary
/// key, fanned out across matched profiles via [`FeedbackProfile`] rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub chat_id: i64,
    pub msg_id: i64,
    pub label: i32,
    pub semantic_type: SemanticType,
    pub created_at: String,
}

/// One `(chat_id, msg_id, profile_id)` fan-out row for [`Feedback`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackProfile {
    pub chat_id: i64,
    pub msg_id: i64,
    pub profile_id: String,
}

/// Append-only audit row for one external delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: i64,
    pub service: String,
    pub profile_id: Option<String>,
    pub chat_id: i64,
    pub msg_id: i64,
    pub status: String,
    pub http_status: Option<i32>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub attempt: i32,
    pub created_at: String,
}

/// Audit row for one auto-tuned threshold/min_score change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileAdjustment {
    pub id: i64,
    pub profile_id: String,
    pub profile_type: String,
    pub adjustment_type: String,
    pub old_value: f32,
    pub new_value: f32,
    pub reason: String,
    pub feedback_count: i32,
    pub trigger_chat_id: Option<i64>,
    pub trigger_msg_id: Option<i64>,
    pub created_at: String,
}

/// Outcome of a retention sweep, for logging/metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionReport {
    pub deleted_non_alerted: u64,
    pub deleted_alerted: u64,
    pub deleted_over_cap: u64,
}
