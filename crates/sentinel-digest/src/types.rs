use std::collections::HashMap;

use sentinel_core::config::Schedule;
use sentinel_core::types::DeliveryMode;
use serde::{Deserialize, Serialize};

/// One entity (channel or monitored user) found to run a given cadence,
/// with its digest settings already resolved through the same
/// entity > overrides > profile precedence the worker uses for scoring.
#[derive(Debug, Clone)]
pub struct DiscoveredSchedule {
    /// `"channel:<id>"` or `"user:<id>"`, for logging and dedup only.
    pub identifier: String,
    pub profile_ids: Vec<String>,
    pub min_score: f32,
    pub top_n: i32,
    pub mode: DeliveryMode,
    pub target_channel: Option<String>,
    pub daily_hour: u8,
    pub weekly_day: u8,
    pub weekly_hour: u8,
}

/// Result of merging every [`DiscoveredSchedule`] bound to one cadence into
/// a single run: the tightest `min_score`, the widest `top_n`, and a
/// delivery mode/target resolved per the aggregation rule.
#[derive(Debug, Clone)]
pub struct AggregatedConfig {
    pub min_score: f32,
    pub top_n: i32,
    pub mode: DeliveryMode,
    pub target_channel: Option<String>,
    pub profile_group: Vec<String>,
}

/// Lifecycle of one digest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Delivery fully succeeded, or nothing needed delivering.
    Success,
    /// One of two targets (dm/channel under `both`) failed, the other sent.
    Partial,
    Failed,
}

/// One row of the digest execution-audit trail, mirrored into the
/// coordination store under both a per-profile list and a global history
/// list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestExecutionRecord {
    pub id: String,
    pub schedule: String,
    pub profile_group: Vec<String>,
    pub mode: String,
    pub target: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub status: ExecutionStatus,
    pub message_count: usize,
    pub duration_ms: i64,
    pub error: Option<String>,
}

/// On-disk scheduler state: the last successful due-check per cadence.
/// Mirrors `CoordStore::{set,get}_digest_last_run`, kept locally too so the
/// scheduler's monotonicity survives a coordination-store outage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerState {
    pub last_run: HashMap<Schedule, chrono::DateTime<chrono::Utc>>,
}
