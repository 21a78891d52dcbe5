use std::collections::HashMap;

use sentinel_core::config::Schedule;
use sentinel_store::StoredMessage;

/// Result of scoring one [`sentinel_core::types::ChatEvent`] against its
/// resolved profile (spec §4.7 steps 5-9). Carries everything needed to
/// build the [`StoredMessage`] row and decide immediate dispatch.
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub stored: StoredMessage,
    /// Alert-profile IDs whose keyword threshold was met this message.
    pub matched_alert_profiles: Vec<String>,
    /// Interest-profile IDs whose semantic threshold was met this message.
    pub matched_interest_profiles: Vec<String>,
    pub primary_schedule: Schedule,
}

/// Why a message never reached scoring — used for structured logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoRuleOrProfile,
    ExcludedSender,
    RequireForwardedNotMet,
    PrivateChatNotMonitored,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoRuleOrProfile => "no_rule_or_profile",
            Self::ExcludedSender => "excluded_sender",
            Self::RequireForwardedNotMet => "require_forwarded_not_met",
            Self::PrivateChatNotMonitored => "private_chat_not_monitored",
        };
        write!(f, "{s}")
    }
}

/// Pending centroid-recompute queue for the batch feedback processor (spec
/// §4.7/§5), persisted verbatim to the coordination store so a restart
/// doesn't lose in-flight feedback.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RecomputeQueue {
    pub profile_ids: Vec<String>,
}

/// One completed batch run, recorded for operational visibility.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchHistoryEntry {
    pub started_at: String,
    pub finished_at: String,
    pub profile_ids: Vec<String>,
    pub trigger: BatchTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchTrigger {
    Interval,
    QueueSize,
}

/// One auto-tuner adjustment candidate before it is written to the config
/// document and audited (spec §4.7 "Auto-tuning").
#[derive(Debug, Clone)]
pub struct TuningDecision {
    pub profile_id: String,
    pub adjustment_type: TuningKind,
    pub old_value: f32,
    pub new_value: f32,
    pub feedback_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningKind {
    Threshold,
    MinScore,
}

impl TuningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::MinScore => "min_score",
        }
    }
}

pub type TriggerAnnotations = HashMap<String, Vec<String>>;
