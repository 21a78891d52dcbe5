use std::collections::HashMap;

use sentinel_core::config::ProfileDigestConfig;

/// Result of merging every profile bound to one channel or monitored user
/// (spec §4.2). Not persisted — recomputed on config (re)load and cached by
/// the caller keyed by entity.
#[derive(Debug, Clone, Default)]
pub struct ResolvedProfile {
    pub keywords: Vec<String>,
    pub action_keywords: Vec<String>,
    pub decision_keywords: Vec<String>,
    pub urgency_keywords: Vec<String>,
    pub importance_keywords: Vec<String>,
    pub release_keywords: Vec<String>,
    pub security_keywords: Vec<String>,
    pub risk_keywords: Vec<String>,
    pub opportunity_keywords: Vec<String>,

    pub vip_senders: Vec<i64>,
    pub excluded_users: Vec<i64>,
    pub reaction_threshold: i32,
    pub reply_threshold: i32,

    pub detect_codes: bool,
    pub detect_documents: bool,
    pub detect_links: bool,
    pub detect_polls: bool,
    pub require_forwarded: bool,
    pub prioritize_pinned: bool,
    pub prioritize_admin: bool,

    pub scoring_weights: HashMap<String, f32>,
    pub digest: Option<ProfileDigestConfig>,

    pub bound_profiles: Vec<String>,
    pub matched_profile_ids: Vec<String>,
    pub has_overrides: bool,
}

impl ResolvedProfile {
    /// `(category_name, keywords)` pairs, in the fixed order the heuristic
    /// evaluator iterates categories for scoring-weight lookup.
    pub fn keyword_categories(&self) -> [(&'static str, &[String]); 9] {
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

    pub fn is_excluded(&self, user_id: i64) -> bool {
        self.excluded_users.contains(&user_id)
    }

    pub fn is_vip(&self, user_id: i64) -> bool {
        self.vip_senders.contains(&user_id)
    }
}
