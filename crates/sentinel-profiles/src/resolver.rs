use std::collections::{HashMap, HashSet};

use sentinel_core::config::{AppCfg, ChannelOverrides, ChannelRule, MonitoredUser, ProfileDefinition};
use tracing::{debug, warn};

use crate::types::ResolvedProfile;

/// Resolves entity-level `ResolvedProfile`s against a fixed snapshot of
/// global profile definitions. Holds no I/O and no mutable state — callers
/// construct a new resolver whenever `AppCfg` reloads (spec §4.1).
pub struct ProfileResolver<'a> {
    global_profiles: &'a HashMap<String, ProfileDefinition>,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(global_profiles: &'a HashMap<String, ProfileDefinition>) -> Self {
        Self { global_profiles }
    }

    pub fn from_cfg(cfg: &'a AppCfg) -> Self {
        Self::new(&cfg.global_profiles)
    }

    /// True if at least one enabled global profile auto-binds to this channel.
    pub fn has_applicable_profiles_for_channel(&self, channel_id: i64) -> bool {
        self.global_profiles
            .values()
            .any(|p| p.auto_binds_channel(channel_id))
    }

    pub fn has_applicable_profiles_for_user(&self, user_id: i64) -> bool {
        self.global_profiles.values().any(|p| p.auto_binds_user(user_id))
    }

    pub fn resolve_for_channel(&self, channel: &ChannelRule) -> ResolvedProfile {
        let mut effective_profiles = channel.profiles.clone();
        for (profile_id, profile) in self.global_profiles {
            if effective_profiles.contains(profile_id) {
                continue;
            }
            if profile.auto_binds_channel(channel.id) {
                debug!(channel_id = channel.id, profile_id, "auto-binding global profile to channel");
                effective_profiles.push(profile_id.clone());
            }
        }

        self.resolve(
            "channel",
            channel.id,
            effective_profiles,
            &channel.overrides,
            channel.digest.as_ref(),
            &channel.excluded_users,
            &channel.vip_senders,
            Some(&channel.legacy),
            channel.reaction_threshold,
            channel.reply_threshold,
        )
    }

    pub fn resolve_for_user(&self, user: &MonitoredUser) -> ResolvedProfile {
        let mut effective_profiles = user.profiles.clone();
        for (profile_id, profile) in self.global_profiles {
            if effective_profiles.contains(profile_id) {
                continue;
            }
            if profile.auto_binds_user(user.id) {
                debug!(user_id = user.id, profile_id, "auto-binding global profile to user");
                effective_profiles.push(profile_id.clone());
            }
        }

        self.resolve(
            "user",
            user.id,
            effective_profiles,
            &user.overrides,
            user.digest.as_ref(),
            &user.excluded_users,
            &user.vip_senders,
            None,
            user.reaction_threshold,
            user.reply_threshold,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self,
        entity_type: &str,
        entity_id: i64,
        bound_profiles: Vec<String>,
        overrides: &ChannelOverrides,
        entity_digest: Option<&sentinel_core::config::ProfileDigestConfig>,
        entity_excluded_users: &[i64],
        entity_vip_senders: &[i64],
        legacy: Option<&sentinel_core::config::LegacyKeywords>,
        reaction_threshold: i32,
        reply_threshold: i32,
    ) -> ResolvedProfile {
        let mut merged_keywords: HashMap<&'static str, HashSet<String>> = sentinel_core::config::KeywordCategories::NAMES
            .iter()
            .map(|&name| (name, HashSet::new()))
            .collect();
        let mut merged_weights: HashMap<String, Vec<f32>> = HashMap::new();
        let mut detect_codes = Vec::new();
        let mut detect_documents = Vec::new();
        let mut detect_links = Vec::new();
        let mut detect_polls = Vec::new();
        let mut require_forwarded = Vec::new();
        let mut prioritize_pinned = Vec::new();
        let mut prioritize_admin = Vec::new();
        let mut excluded_users_ordered: Vec<i64> = Vec::new();
        let mut vip_senders_ordered: Vec<i64> = Vec::new();
        let mut resolved_bound = Vec::new();

        for profile_id in &bound_profiles {
            let Some(profile) = self.global_profiles.get(profile_id) else {
                warn!(entity_type, entity_id, profile_id, "bound profile not found; skipping");
                continue;
            };

            for name in sentinel_core::config::KeywordCategories::NAMES {
                merged_keywords.get_mut(name).unwrap().extend(profile.keywords.get(name).iter().cloned());
            }
            for (category, weight) in &profile.scoring_weights {
                merged_weights.entry(category.clone()).or_default().push(*weight);
            }
            detect_codes.push(profile.detect_codes);
            detect_documents.push(profile.detect_documents);
            detect_links.push(profile.detect_links);
            detect_polls.push(profile.detect_polls);
            require_forwarded.push(profile.require_forwarded);
            prioritize_pinned.push(profile.prioritize_pinned);
            prioritize_admin.push(profile.prioritize_admin);

            for &user_id in &profile.excluded_users {
                if !excluded_users_ordered.contains(&user_id) {
                    excluded_users_ordered.push(user_id);
                }
            }
            for &user_id in &profile.vip_senders {
                if !vip_senders_ordered.contains(&user_id) {
                    vip_senders_ordered.push(user_id);
                }
            }

            resolved_bound.push(profile_id.clone());
        }

        // Step 2: legacy keyword fields (channels only). `keywords` maps to the
        // generic "general" bucket in KeywordCategories naming; legacy fields
        // line up 1:1 with the 9 category names except the unprefixed
        // "keywords" field, which folds into "general".
        if let Some(legacy) = legacy {
            for (name, values) in legacy.fields() {
                if values.is_empty() {
                    continue;
                }
                let target = if name == "keywords" { "general" } else { name };
                if let Some(set) = merged_keywords.get_mut(target) {
                    set.extend(values.iter().cloned());
                }
            }
        }

        let mut has_overrides = false;

        // Step 3: overrides (*_extra unioned in).
        for (name, extra) in overrides.extras() {
            if extra.is_empty() {
                continue;
            }
            let target = if name == "keywords" { "general" } else { name };
            if let Some(set) = merged_keywords.get_mut(target) {
                set.extend(extra.iter().cloned());
                has_overrides = true;
            }
        }

        // Entity-level excluded_users / vip_senders, then override excluded_users.
        for &user_id in entity_excluded_users {
            if !excluded_users_ordered.contains(&user_id) {
                excluded_users_ordered.push(user_id);
            }
        }
        for &user_id in entity_vip_senders {
            if !vip_senders_ordered.contains(&user_id) {
                vip_senders_ordered.push(user_id);
            }
        }
        if !overrides.excluded_users.is_empty() {
            for &user_id in &overrides.excluded_users {
                if !excluded_users_ordered.contains(&user_id) {
                    excluded_users_ordered.push(user_id);
                }
            }
            has_overrides = true;
        }

        // Step 4: finalize keyword lists, sorted for determinism.
        let mut finalized: HashMap<&'static str, Vec<String>> = HashMap::new();
        for (name, set) in merged_keywords {
            let mut v: Vec<String> = set.into_iter().collect();
            v.sort();
            finalized.insert(name, v);
        }

        // Step 5: mean scoring weights, then override.
        let mut scoring_weights: HashMap<String, f32> = merged_weights
            .into_iter()
            .map(|(category, weights)| {
                let mean = weights.iter().sum::<f32>() / weights.len() as f32;
                (category, mean)
            })
            .collect();
        if !overrides.scoring_weights.is_empty() {
            scoring_weights.extend(overrides.scoring_weights.clone());
            has_overrides = true;
        }

        // Step 6: detection flags, most permissive (OR).
        let any = |v: &[bool]| v.iter().any(|&b| b);

        // Step 7: digest precedence: entity > overrides > first bound profile > none.
        let digest = entity_digest
            .cloned()
            .or_else(|| overrides.digest.clone())
            .or_else(|| {
                bound_profiles
                    .iter()
                    .find_map(|id| self.global_profiles.get(id).and_then(|p| p.digest.clone()))
            });

        let matched_profile_ids = resolved_bound.clone();

        debug!(
            entity_type,
            entity_id,
            bound_profiles = resolved_bound.len(),
            has_overrides,
            "resolved profile"
        );

        ResolvedProfile {
            keywords: finalized.remove("general").unwrap_or_default(),
            action_keywords: finalized.remove("action").unwrap_or_default(),
            decision_keywords: finalized.remove("decision").unwrap_or_default(),
            urgency_keywords: finalized.remove("urgency").unwrap_or_default(),
            importance_keywords: finalized.remove("importance").unwrap_or_default(),
            release_keywords: finalized.remove("release").unwrap_or_default(),
            security_keywords: finalized.remove("security").unwrap_or_default(),
            risk_keywords: finalized.remove("risk").unwrap_or_default(),
            opportunity_keywords: finalized.remove("opportunity").unwrap_or_default(),
            vip_senders: vip_senders_ordered,
            excluded_users: excluded_users_ordered,
            reaction_threshold,
            reply_threshold,
            detect_codes: any(&detect_codes),
            detect_documents: any(&detect_documents),
            detect_links: any(&detect_links),
            detect_polls: any(&detect_polls),
            require_forwarded: any(&require_forwarded),
            prioritize_pinned: any(&prioritize_pinned),
            prioritize_admin: any(&prioritize_admin),
            scoring_weights,
            digest,
            bound_profiles: resolved_bound,
            matched_profile_ids,
            has_overrides,
        }
    }
}

/// Sanity-check a declared configuration (spec §4.1/§4.2 supplement, grounded
/// in the original tool's `validate_profiles`): duplicate IDs, dangling
/// bindings, and excessive keyword counts are reported but never fatal.
pub fn validate_profiles(
    global_profiles: &HashMap<String, ProfileDefinition>,
    channels: &[ChannelRule],
    users: &[MonitoredUser],
) -> Vec<String> {
    const MAX_KEYWORDS: usize = 500;
    let mut errors = Vec::new();

    let mut all_bound: HashSet<&str> = HashSet::new();
    for c in channels {
        all_bound.extend(c.profiles.iter().map(String::as_str));
    }
    for u in users {
        all_bound.extend(u.profiles.iter().map(String::as_str));
    }
    for profile_id in all_bound {
        if !global_profiles.contains_key(profile_id) {
            errors.push(format!("profile '{profile_id}' is bound but not defined globally"));
        }
    }

    for (profile_id, profile) in global_profiles {
        let total = profile.keywords.total_len();
        if total > MAX_KEYWORDS {
            errors.push(format!(
                "profile '{profile_id}' has {total} keywords (>{MAX_KEYWORDS}, may impact performance)"
            ));
        }
    }

    errors
}
