use std::collections::HashMap;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// One of the fixed digest cadences. `None` means "never runs" and is the
/// zero value used when a `ScheduleConfig` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Hourly,
    Every4h,
    Every6h,
    Every12h,
    Daily,
    Weekly,
    None,
}

impl Schedule {
    /// Priority order used to pick the *primary* digest schedule for a
    /// message that matched profiles bound to more than one cadence.
    /// Lower number = higher priority.
    pub fn priority(&self) -> u8 {
        match self {
            Schedule::Hourly => 0,
            Schedule::Every4h => 1,
            Schedule::Every6h => 2,
            Schedule::Every12h => 3,
            Schedule::Daily => 4,
            Schedule::Weekly => 5,
            Schedule::None => 6,
        }
    }

    /// Collection window, in hours, used by the digest collector.
    pub fn window_hours(&self) -> i64 {
        match self {
            Schedule::Hourly => 1,
            Schedule::Every4h => 4,
            Schedule::Every6h => 6,
            Schedule::Every12h => 12,
            Schedule::Daily => 24,
            Schedule::Weekly => 168,
            Schedule::None => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::Hourly => "hourly",
            Schedule::Every4h => "every_4h",
            Schedule::Every6h => "every_6h",
            Schedule::Every12h => "every_12h",
            Schedule::Daily => "daily",
            Schedule::Weekly => "weekly",
            Schedule::None => "none",
        }
    }

    pub const ALL: [Schedule; 6] = [
        Schedule::Hourly,
        Schedule::Every4h,
        Schedule::Every6h,
        Schedule::Every12h,
        Schedule::Daily,
        Schedule::Weekly,
    ];
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery mode for a single schedule / profile digest config. Distinct
/// from [`crate::types::DeliveryMode`]: this one additionally carries
/// `"digest"` which means "only deliver as part of a digest bundle", while
/// `crate::types::DeliveryMode` is the runtime decision after aggregation.
pub type DigestDeliveryMode = crate::types::DeliveryMode;

/// A single cadence's configuration, nested inside [`ProfileDigestConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub schedule: Schedule,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub top_n: Option<i32>,
    pub min_score: Option<f32>,
    #[serde(default = "default_daily_hour")]
    pub daily_hour: u8,
    #[serde(default)]
    pub weekly_day: u8,
    #[serde(default = "default_daily_hour")]
    pub weekly_hour: u8,
    #[serde(default)]
    pub mode: DigestDeliveryMode,
    pub target_channel: Option<String>,
}

impl ScheduleConfig {
    /// Validate the invariants from spec §3: `daily_hour in [0,23]`,
    /// `weekly_day in [0,6]`, `min_score in [0,10]`.
    pub fn validate(&self) -> Result<()> {
        if self.daily_hour > 23 {
            return Err(SentinelError::Config(format!(
                "daily_hour {} out of range 0..23",
                self.daily_hour
            )));
        }
        if self.weekly_day > 6 {
            return Err(SentinelError::Config(format!(
                "weekly_day {} out of range 0..6",
                self.weekly_day
            )));
        }
        if self.weekly_hour > 23 {
            return Err(SentinelError::Config(format!(
                "weekly_hour {} out of range 0..23",
                self.weekly_hour
            )));
        }
        if let Some(ms) = self.min_score {
            if !(0.0..=10.0).contains(&ms) {
                return Err(SentinelError::Config(format!(
                    "min_score {} out of range 0..10",
                    ms
                )));
            }
        }
        Ok(())
    }
}

fn default_daily_hour() -> u8 {
    8
}

/// Digest delivery configuration carried by a profile, channel, or user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileDigestConfig {
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
    #[serde(default = "default_top_n")]
    pub top_n: i32,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default)]
    pub mode: DigestDeliveryMode,
    pub target_channel: Option<String>,
}

fn default_top_n() -> i32 {
    10
}

impl ProfileDigestConfig {
    pub const MAX_SCHEDULES: usize = 3;

    pub fn validate(&self) -> Result<()> {
        if self.schedules.len() > Self::MAX_SCHEDULES {
            return Err(SentinelError::Config(format!(
                "digest config has {} schedules, max {}",
                self.schedules.len(),
                Self::MAX_SCHEDULES
            )));
        }
        for s in &self.schedules {
            s.validate()?;
        }
        Ok(())
    }
}

/// The nine keyword categories a [`ProfileDefinition`] carries. Kept as a
/// plain struct (rather than a `HashMap<String, Vec<String>>`) so typos in
/// config keys are caught at deserialize time, not silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeywordCategories {
    #[serde(default)]
    pub security: Vec<String>,
    #[serde(default)]
    pub urgency: Vec<String>,
    #[serde(default)]
    pub action: Vec<String>,
    #[serde(default)]
    pub decision: Vec<String>,
    #[serde(default)]
    pub importance: Vec<String>,
    #[serde(default)]
    pub release: Vec<String>,
    #[serde(default)]
    pub risk: Vec<String>,
    #[serde(default)]
    pub opportunity: Vec<String>,
    #[serde(default)]
    pub general: Vec<String>,
}

impl KeywordCategories {
    pub const NAMES: [&'static str; 9] = [
        "security",
        "urgency",
        "action",
        "decision",
        "importance",
        "release",
        "risk",
        "opportunity",
        "general",
    ];

    pub fn get(&self, category: &str) -> &[String] {
        match category {
            "security" => &self.security,
            "urgency" => &self.urgency,
            "action" => &self.action,
            "decision" => &self.decision,
            "importance" => &self.importance,
            "release" => &self.release,
            "risk" => &self.risk,
            "opportunity" => &self.opportunity,
            "general" => &self.general,
            _ => &[],
        }
    }

    pub fn get_mut(&mut self, category: &str) -> Option<&mut Vec<String>> {
        match category {
            "security" => Some(&mut self.security),
            "urgency" => Some(&mut self.urgency),
            "action" => Some(&mut self.action),
            "decision" => Some(&mut self.decision),
            "importance" => Some(&mut self.importance),
            "release" => Some(&mut self.release),
            "risk" => Some(&mut self.risk),
            "opportunity" => Some(&mut self.opportunity),
            "general" => Some(&mut self.general),
            _ => None,
        }
    }

    pub fn total_len(&self) -> usize {
        Self::NAMES.iter().map(|n| self.get(n).len()).sum()
    }
}

/// A named bundle of keywords (alert profile) or positive/negative samples
/// (interest profile), plus thresholds and delivery configuration.
///
/// A profile is **keyword-based** iff `positive_samples` is empty,
/// **semantic** otherwise — the two pipelines are mutually exclusive per
/// profile (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<i64>,
    #[serde(default)]
    pub users: Vec<i64>,
    #[serde(default)]
    pub keywords: KeywordCategories,
    #[serde(default)]
    pub vip_senders: Vec<i64>,
    #[serde(default)]
    pub excluded_users: Vec<i64>,
    #[serde(default)]
    pub positive_samples: Vec<String>,
    #[serde(default)]
    pub negative_samples: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default)]
    pub scoring_weights: HashMap<String, f32>,
    pub digest: Option<ProfileDigestConfig>,
    #[serde(default)]
    pub detect_codes: bool,
    #[serde(default)]
    pub detect_documents: bool,
    #[serde(default)]
    pub detect_links: bool,
    #[serde(default)]
    pub detect_polls: bool,
    #[serde(default)]
    pub require_forwarded: bool,
    #[serde(default)]
    pub prioritize_pinned: bool,
    #[serde(default)]
    pub prioritize_admin: bool,
}

fn default_threshold() -> f32 {
    0.42
}

impl ProfileDefinition {
    /// True if this profile runs the semantic pipeline instead of keywords.
    pub fn is_semantic(&self) -> bool {
        !self.positive_samples.is_empty()
    }

    /// Auto-binding rule from spec §4.1: a profile with both `channels` and
    /// `users` empty auto-binds to every entity; otherwise it auto-binds to
    /// any entity ID present in the matching list.
    pub fn auto_binds_channel(&self, channel_id: i64) -> bool {
        if !self.enabled {
            return false;
        }
        let both_empty = self.channels.is_empty() && self.users.is_empty();
        both_empty || self.channels.contains(&channel_id)
    }

    pub fn auto_binds_user(&self, user_id: i64) -> bool {
        if !self.enabled {
            return false;
        }
        let both_empty = self.channels.is_empty() && self.users.is_empty();
        both_empty || self.users.contains(&user_id)
    }
}

/// Additive per-entity overrides: `*_extra` keyword lists are unioned in,
/// `scoring_weights` replaces the merged map, `excluded_users` is appended.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelOverrides {
    #[serde(default)]
    pub keywords_extra: Vec<String>,
    #[serde(default)]
    pub action_extra: Vec<String>,
    #[serde(default)]
    pub decision_extra: Vec<String>,
    #[serde(default)]
    pub urgency_extra: Vec<String>,
    #[serde(default)]
    pub importance_extra: Vec<String>,
    #[serde(default)]
    pub release_extra: Vec<String>,
    #[serde(default)]
    pub security_extra: Vec<String>,
    #[serde(default)]
    pub risk_extra: Vec<String>,
    #[serde(default)]
    pub opportunity_extra: Vec<String>,
    #[serde(default)]
    pub general_extra: Vec<String>,
    #[serde(default)]
    pub scoring_weights: HashMap<String, f32>,
    pub digest: Option<ProfileDigestConfig>,
    #[serde(default)]
    pub excluded_users: Vec<i64>,
}

impl ChannelOverrides {
    /// `(category, extra_keywords)` pairs, for the resolver's merge loop.
    pub fn extras(&self) -> [(&'static str, &[String]); 9] {
        [
            ("keywords", &self.keywords_extra),
            ("action", &self.action_extra),
            ("decision", &self.decision_extra),
            ("urgency", &self.urgency_extra),
            ("importance", &self.importance_extra),
            ("release", &self.release_extra),
            ("security", &self.security_extra),
            ("risk", &self.risk_extra),
            ("opportunity", &self.opportunity_extra),
        ]
    }
}

/// Legacy (pre-profile) keyword fields retained on [`ChannelRule`] for
/// backward compatibility, per spec §3/§4.1.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LegacyKeywords {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub action_keywords: Vec<String>,
    #[serde(default)]
    pub decision_keywords: Vec<String>,
    #[serde(default)]
    pub urgency_keywords: Vec<String>,
    #[serde(default)]
    pub importance_keywords: Vec<String>,
    #[serde(default)]
    pub release_keywords: Vec<String>,
    #[serde(default)]
    pub security_keywords: Vec<String>,
    #[serde(default)]
    pub risk_keywords: Vec<String>,
    #[serde(default)]
    pub opportunity_keywords: Vec<String>,
}

impl LegacyKeywords {
    pub fn fields(&self) -> [(&'static str, &[String]); 9] {
        [
            ("keywords", &self.keywords),
            ("action", &self.action_keywords),
            ("decision", &self.decision_keywords),
            ("urgency", &self.urgency_keywords),
            ("importance", &self.importance_keywords),
            ("release", &self.release_keywords),
            ("security", &self.security_keywords),
            ("risk", &self.risk_keywords),
            ("opportunity", &self.opportunity_keywords),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRule {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub overrides: ChannelOverrides,
    pub digest: Option<ProfileDigestConfig>,
    #[serde(default)]
    pub vip_senders: Vec<i64>,
    #[serde(default)]
    pub excluded_users: Vec<i64>,
    #[serde(default)]
    pub legacy: LegacyKeywords,
    /// Minimum `reactions_count` for the heuristic evaluator's `+0.4`
    /// reactions bonus; `0` disables the bonus (spec §4.5).
    #[serde(default)]
    pub reaction_threshold: i32,
    /// Minimum `replies_count` for the `+0.4` replies bonus; `0` disables it.
    #[serde(default)]
    pub reply_threshold: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredUser {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub overrides: ChannelOverrides,
    pub digest: Option<ProfileDigestConfig>,
    #[serde(default)]
    pub vip_senders: Vec<i64>,
    #[serde(default)]
    pub excluded_users: Vec<i64>,
    #[serde(default)]
    pub reaction_threshold: i32,
    #[serde(default)]
    pub reply_threshold: i32,
}

fn bool_true() -> bool {
    true
}

/// Declarative part of the config — what's actually in the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Declared {
    #[serde(default)]
    pub profiles: Vec<ProfileDefinition>,
    #[serde(default)]
    pub channels: Vec<ChannelRule>,
    #[serde(default)]
    pub monitored_users: Vec<MonitoredUser>,
}

/// Fully typed application configuration: the declarative YAML document
/// plus every environment-sourced setting from spec §6.5.
#[derive(Debug, Clone)]
pub struct AppCfg {
    pub global_profiles: HashMap<String, ProfileDefinition>,
    pub channels: Vec<ChannelRule>,
    pub monitored_users: Vec<MonitoredUser>,

    pub tg_session_path: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_stream: String,
    pub redis_group: String,
    pub redis_consumer: String,
    pub db_uri: String,
    pub embeddings_model: Option<String>,
    pub similarity_threshold: f32,
    pub alert_mode: crate::types::DeliveryMode,
    pub alert_channel: Option<String>,
    pub hourly_digest: bool,
    pub daily_digest: bool,
    pub digest_top_n: i32,
    pub notification_channel: Option<String>,
    pub admin_token: Option<String>,
    pub log_level: String,

    /// Retention sweep knobs (spec §4.3) — not named individually in spec
    /// §6.5's env var list, which only enumerates the scoring/delivery
    /// surface; these follow the same "read the env var directly" pattern.
    pub retention_days: i64,
    pub retention_alert_multiplier: i64,
    pub retention_max_messages: i64,
    pub retention_sweep_interval_secs: u64,
    pub vacuum_interval_secs: u64,
    /// Worker consumer-group parallelism (spec §5: "MAY run with `count > 1`
    /// consumers in the same group").
    pub worker_consumer_count: u32,
}

impl AppCfg {
    /// Load a YAML config file, then layer environment overrides named
    /// explicitly by name (no common prefix — each env var is read
    /// individually).
    pub fn load(path: &str) -> Result<Self> {
        let declared: Declared = Figment::new()
            .merge(Yaml::file(path))
            .extract()
            .map_err(|e| SentinelError::Config(format!("{path}: {e}")))?;

        Self::from_declared(declared)
    }

    pub fn from_declared(declared: Declared) -> Result<Self> {
        let mut global_profiles = HashMap::new();
        for p in declared.profiles {
            if p.is_semantic() && !p.scoring_weights.is_empty() {
                // both pipelines configured is allowed by the type system but
                // violates the spec invariant; keep scoring_weights (heuristic
                // weighting is meaningless without keywords) only for
                // diagnostics, not as a hard error — matches the original's
                // permissive YAML loader.
            }
            if let Some(d) = &p.digest {
                d.validate()?;
            }
            global_profiles.insert(p.id.clone(), p);
        }
        for c in &declared.channels {
            if let Some(d) = &c.digest {
                d.validate()?;
            }
            c.overrides.digest.as_ref().map(|d| d.validate()).transpose()?;
        }
        for u in &declared.monitored_users {
            if let Some(d) = &u.digest {
                d.validate()?;
            }
        }

        let redis_host = env_or("REDIS_HOST", "localhost");
        let redis_port: u16 = env_or("REDIS_PORT", "6379")
            .parse()
            .map_err(|_| SentinelError::Config("REDIS_PORT must be a u16".into()))?;
        let similarity_threshold: f32 = env_or("SIMILARITY_THRESHOLD", "0.42")
            .parse()
            .map_err(|_| SentinelError::Config("SIMILARITY_THRESHOLD must be a float".into()))?;
        let digest_top_n: i32 = env_or("DIGEST_TOP_N", "10")
            .parse()
            .map_err(|_| SentinelError::Config("DIGEST_TOP_N must be an integer".into()))?;

        Ok(AppCfg {
            global_profiles,
            channels: declared.channels,
            monitored_users: declared.monitored_users,
            tg_session_path: env_or("TG_SESSION_PATH", &default_session_path()),
            redis_host,
            redis_port,
            redis_stream: env_or("REDIS_STREAM", "tgsentinel:messages"),
            redis_group: env_or("REDIS_GROUP", "workers"),
            redis_consumer: env_or("REDIS_CONSUMER", "worker-1"),
            db_uri: env_or("DB_URI", "sqlite:///./data/sentinel.db"),
            embeddings_model: std::env::var("EMBEDDINGS_MODEL").ok().filter(|s| !s.is_empty()),
            similarity_threshold,
            alert_mode: parse_alert_mode(&env_or("ALERT_MODE", "dm")),
            alert_channel: std::env::var("ALERT_CHANNEL").ok().filter(|s| !s.is_empty()),
            hourly_digest: env_bool("HOURLY_DIGEST", true),
            daily_digest: env_bool("DAILY_DIGEST", true),
            digest_top_n,
            notification_channel: std::env::var("NOTIFICATION_CHANNEL")
                .ok()
                .filter(|s| !s.is_empty()),
            admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty()),
            log_level: env_or("LOG_LEVEL", "info"),
            retention_days: env_or("RETENTION_DAYS", "30")
                .parse()
                .map_err(|_| SentinelError::Config("RETENTION_DAYS must be an integer".into()))?,
            retention_alert_multiplier: env_or("RETENTION_ALERT_MULTIPLIER", "2")
                .parse()
                .map_err(|_| SentinelError::Config("RETENTION_ALERT_MULTIPLIER must be an integer".into()))?,
            retention_max_messages: env_or("RETENTION_MAX_MESSAGES", "100000")
                .parse()
                .map_err(|_| SentinelError::Config("RETENTION_MAX_MESSAGES must be an integer".into()))?,
            retention_sweep_interval_secs: env_or("RETENTION_SWEEP_INTERVAL_SECS", "21600")
                .parse()
                .map_err(|_| SentinelError::Config("RETENTION_SWEEP_INTERVAL_SECS must be an integer".into()))?,
            vacuum_interval_secs: env_or("VACUUM_INTERVAL_SECS", "86400")
                .parse()
                .map_err(|_| SentinelError::Config("VACUUM_INTERVAL_SECS must be an integer".into()))?,
            worker_consumer_count: env_or("WORKER_CONSUMER_COUNT", "2")
                .parse()
                .map_err(|_| SentinelError::Config("WORKER_CONSUMER_COUNT must be an integer".into()))?,
        })
    }

    /// Re-read the declarative YAML portion without disturbing env-sourced
    /// settings, for hot reload (spec §4.1). Failure leaves `self` untouched
    /// — callers should keep serving the previous `Arc<AppCfg>` on error.
    pub fn reload_declared(&mut self, path: &str) -> Result<()> {
        let declared: Declared = Figment::new()
            .merge(Yaml::file(path))
            .extract()
            .map_err(|e| SentinelError::Config(format!("{path}: {e}")))?;

        let mut global_profiles = HashMap::new();
        for p in declared.profiles {
            if let Some(d) = &p.digest {
                d.validate()?;
            }
            global_profiles.insert(p.id.clone(), p);
        }
        self.global_profiles = global_profiles;
        self.channels = declared.channels;
        self.monitored_users = declared.monitored_users;
        Ok(())
    }
}

fn parse_alert_mode(s: &str) -> crate::types::DeliveryMode {
    crate::types::DeliveryMode::parse_legacy(s)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn default_session_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.tgsentinel/session.sqlite")
}

/// Resolve `DB_URI` (spec §6.3, e.g. `sqlite:///./data/sentinel.db`) to a
/// filesystem path `rusqlite::Connection::open` can use directly. Bare paths
/// without a `sqlite://` prefix pass through unchanged.
pub fn db_path_from_uri(uri: &str) -> &str {
    uri.strip_prefix("sqlite:///")
        .or_else(|| uri.strip_prefix("sqlite://"))
        .unwrap_or(uri)
}

#[cfg(test)]
mod uri_tests {
    use super::db_path_from_uri;

    #[test]
    fn strips_triple_slash_scheme() {
        assert_eq!(db_path_from_uri("sqlite:///./data/sentinel.db"), "./data/sentinel.db");
    }

    #[test]
    fn strips_double_slash_scheme() {
        assert_eq!(db_path_from_uri("sqlite://data/sentinel.db"), "data/sentinel.db");
    }

    #[test]
    fn passes_through_bare_path() {
        assert_eq!(db_path_from_uri("/tmp/sentinel.db"), "/tmp/sentinel.db");
    }
}
