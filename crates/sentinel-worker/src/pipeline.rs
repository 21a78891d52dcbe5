use std::collections::HashMap;

use chrono::Utc;
use sentinel_core::config::{AppCfg, ChannelOverrides, ChannelRule, LegacyKeywords, MonitoredUser, ProfileDefinition, Schedule};
use sentinel_core::types::ChatEvent;
use sentinel_profiles::ProfileResolver;
use sentinel_semantic::SemanticEvaluator;
use sentinel_store::{SemanticType, StoredMessage};
use tracing::debug;

use crate::error::Result;
use crate::types::{ScoringOutcome, SkipReason};

fn synthetic_channel_rule(id: i64) -> ChannelRule {
    ChannelRule {
        id,
        name: String::new(),
        enabled: true,
        profiles: Vec::new(),
        overrides: ChannelOverrides::default(),
        digest: None,
        vip_senders: Vec::new(),
        excluded_users: Vec::new(),
        legacy: LegacyKeywords::default(),
        reaction_threshold: 0,
        reply_threshold: 0,
    }
}

/// Run the full per-message scoring pipeline (spec §4.7 steps 2-9). Returns
/// `Ok(None)` for messages that should be acked and dropped without ever
/// reaching the store — no rule/profile applies, the sender is excluded, a
/// hard filter (`require_forwarded`) rejected it, or a private chat isn't
/// explicitly monitored.
pub async fn score_event(
    event: &ChatEvent,
    cfg: &AppCfg,
    semantic: &SemanticEvaluator,
) -> Result<Option<ScoringOutcome>> {
    let resolver = ProfileResolver::from_cfg(cfg);

    let resolved = if event.is_private() {
        // Private chats require an explicit `monitored_users` entry — the
        // auto-bind-everywhere rule intentionally does not extend to DMs
        // (spec §4.7 step 4's extra private-chat gate).
        let Some(user) = cfg.monitored_users.iter().find(|u| u.id == event.chat_id && u.enabled) else {
            debug!(chat_id = event.chat_id, reason = %SkipReason::PrivateChatNotMonitored, "skipping event");
            return Ok(None);
        };
        resolver.resolve_for_user(user)
    } else {
        match cfg.channels.iter().find(|c| c.id == event.chat_id && c.enabled) {
            Some(channel) => resolver.resolve_for_channel(channel),
            None => {
                if !resolver.has_applicable_profiles_for_channel(event.chat_id) {
                    debug!(chat_id = event.chat_id, reason = %SkipReason::NoRuleOrProfile, "skipping event");
                    return Ok(None);
                }
                resolver.resolve_for_channel(&synthetic_channel_rule(event.chat_id))
            }
        }
    };

    if resolved.is_excluded(event.sender_id) {
        debug!(chat_id = event.chat_id, sender_id = event.sender_id, reason = %SkipReason::ExcludedSender, "skipping event");
        return Ok(None);
    }

    let heuristic = sentinel_heuristics::evaluate(event, &resolved);
    if heuristic.filtered_out {
        debug!(chat_id = event.chat_id, msg_id = event.msg_id, reason = %SkipReason::RequireForwardedNotMet, "skipping event");
        return Ok(None);
    }

    // Step 6: alert-profile evaluation — keyword profiles only.
    let mut matched_alert_profiles = Vec::new();
    for profile_id in &resolved.bound_profiles {
        let Some(profile) = cfg.global_profiles.get(profile_id) else { continue };
        if profile.is_semantic() {
            continue;
        }
        if heuristic.pre_score >= profile.min_score {
            matched_alert_profiles.push(profile_id.clone());
        }
    }

    // Step 7: interest-profile evaluation — semantic profiles only.
    let semantic_profiles: Vec<&ProfileDefinition> = resolved
        .bound_profiles
        .iter()
        .filter_map(|id| cfg.global_profiles.get(id))
        .filter(|p| p.is_semantic())
        .collect();
    let interest = semantic.evaluate_interest_profiles(&event.text, &semantic_profiles).await?;

    // Step 8: feed flags.
    let feed_alert_flag = !matched_alert_profiles.is_empty();
    let feed_interest_flag = !interest.matched_profile_ids.is_empty() && interest.should_include_in_feed;

    let mut matched_profiles: Vec<String> = matched_alert_profiles.clone();
    for id in &interest.matched_profile_ids {
        if !matched_profiles.contains(id) {
            matched_profiles.push(id.clone());
        }
    }

    // Step 9: primary digest schedule by fixed priority across every
    // matched profile's enabled cadences.
    let primary_schedule = pick_primary_schedule(&matched_profiles, &cfg.global_profiles);

    let combined_score = heuristic.pre_score
        + interest.semantic_scores.values().cloned().fold(0.0_f32, f32::max);

    let semantic_type = if !interest.matched_profile_ids.is_empty() {
        SemanticType::Interest
    } else {
        SemanticType::None
    };

    let stored = StoredMessage {
        chat_id: event.chat_id,
        msg_id: event.msg_id,
        content_hash: heuristic.content_hash.clone(),
        score: combined_score,
        keyword_score: heuristic.pre_score,
        semantic_scores: interest.semantic_scores,
        semantic_type,
        alerted: false,
        feed_alert_flag,
        feed_interest_flag,
        chat_title: event.chat_title.clone(),
        sender_name: event.sender_name.clone(),
        sender_id: event.sender_id,
        message_text: event.text.clone(),
        triggers: heuristic.triggers_csv(),
        trigger_annotations: heuristic.trigger_annotations,
        matched_profiles,
        digest_schedule: primary_schedule.as_str().to_string(),
        digest_processed: false,
        created_at: event.timestamp.to_rfc3339(),
    };

    debug!(
        chat_id = event.chat_id,
        msg_id = event.msg_id,
        score = combined_score,
        feed_alert_flag,
        feed_interest_flag,
        "scored event"
    );

    Ok(Some(ScoringOutcome {
        stored,
        matched_alert_profiles,
        matched_interest_profiles: interest.matched_profile_ids,
        primary_schedule,
    }))
}

/// Pick the highest-priority enabled cadence across every matched profile's
/// digest config (`hourly > every_4h > every_6h > every_12h > daily > weekly`,
/// spec §4.7 step 9). `Schedule::None` if nothing matched carries a digest.
fn pick_primary_schedule(matched: &[String], profiles: &HashMap<String, ProfileDefinition>) -> Schedule {
    let mut best: Option<Schedule> = None;
    for id in matched {
        let Some(profile) = profiles.get(id) else { continue };
        let Some(digest) = &profile.digest else { continue };
        for schedule_cfg in &digest.schedules {
            if !schedule_cfg.enabled {
                continue;
            }
            let replace = match best {
                Some(b) => schedule_cfg.schedule.priority() < b.priority(),
                None => true,
            };
            if replace {
                best = Some(schedule_cfg.schedule);
            }
        }
    }
    best.unwrap_or(Schedule::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{Declared, KeywordCategories};
    use sentinel_core::types::MediaKind;
    use sentinel_semantic::{NoopEmbeddingBackend, SemanticEvaluator};
    use std::sync::Arc;

    fn base_event(chat_id: i64, text: &str) -> ChatEvent {
        ChatEvent {
            chat_id,
            chat_title: "ops".into(),
            msg_id: 1,
            sender_id: 7,
            sender_name: "bob".into(),
            text: text.into(),
            mentioned: false,
            reactions_count: 0,
            replies_count: 0,
            timestamp: Utc::now(),
            is_reply: false,
            reply_to_msg_id: None,
            has_media: false,
            media_type: MediaKind::None,
            is_pinned: false,
            has_forward: false,
            forward_from: None,
            sender_is_admin: false,
        }
    }

    fn evaluator() -> SemanticEvaluator {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = Arc::new(sentinel_store::StoreManager::new(conn).unwrap());
        SemanticEvaluator::new(Arc::new(NoopEmbeddingBackend), store)
    }

    fn cfg_with_profile(mut profile: ProfileDefinition, channel_id: i64) -> AppCfg {
        profile.channels = vec![channel_id];
        let declared = Declared {
            profiles: vec![profile],
            channels: vec![],
            monitored_users: vec![],
        };
        AppCfg::from_declared(declared).unwrap()
    }

    #[tokio::test]
    async fn unmatched_channel_without_auto_binding_is_skipped() {
        let profile = ProfileDefinition {
            id: "launches".into(),
            name: String::new(),
            enabled: true,
            channels: vec![999],
            users: vec![],
            keywords: KeywordCategories::default(),
            vip_senders: vec![],
            excluded_users: vec![],
            positive_samples: vec![],
            negative_samples: vec![],
            threshold: 0.42,
            min_score: 0.0,
            scoring_weights: HashMap::new(),
            digest: None,
            detect_codes: false,
            detect_documents: false,
            detect_links: false,
            detect_polls: false,
            require_forwarded: false,
            prioritize_pinned: false,
            prioritize_admin: false,
        };
        let cfg = cfg_with_profile(profile, 999);
        let event = base_event(-100, "hello");
        let outcome = score_event(&event, &cfg, &evaluator()).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn mentioned_message_matches_auto_bound_profile() {
        let profile = ProfileDefinition {
            id: "ops".into(),
            name: String::new(),
            enabled: true,
            channels: vec![],
            users: vec![],
            keywords: KeywordCategories::default(),
            vip_senders: vec![],
            excluded_users: vec![],
            positive_samples: vec![],
            negative_samples: vec![],
            threshold: 0.42,
            min_score: 0.0,
            scoring_weights: HashMap::new(),
            digest: None,
            detect_codes: false,
            detect_documents: false,
            detect_links: false,
            detect_polls: false,
            require_forwarded: false,
            prioritize_pinned: false,
            prioritize_admin: false,
        };
        let declared = Declared { profiles: vec![profile], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();

        let mut event = base_event(-200, "please look at this");
        event.mentioned = true;
        let outcome = score_event(&event, &cfg, &evaluator()).await.unwrap().unwrap();
        assert!(outcome.stored.feed_alert_flag);
        assert_eq!(outcome.matched_alert_profiles, vec!["ops".to_string()]);
    }

    #[tokio::test]
    async fn excluded_sender_is_dropped() {
        let mut profile = ProfileDefinition {
            id: "ops".into(),
            name: String::new(),
            enabled: true,
            channels: vec![],
            users: vec![],
            keywords: KeywordCategories::default(),
            vip_senders: vec![],
            excluded_users: vec![7],
            positive_samples: vec![],
            negative_samples: vec![],
            threshold: 0.42,
            min_score: 0.0,
            scoring_weights: HashMap::new(),
            digest: None,
            detect_codes: false,
            detect_documents: false,
            detect_links: false,
            detect_polls: false,
            require_forwarded: false,
            prioritize_pinned: false,
            prioritize_admin: false,
        };
        profile.excluded_users = vec![7];
        let declared = Declared { profiles: vec![profile], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();

        let mut event = base_event(-300, "hello");
        event.mentioned = true;
        event.sender_id = 7;
        let outcome = score_event(&event, &cfg, &evaluator()).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn private_chat_without_monitored_user_is_skipped() {
        let declared = Declared { profiles: vec![], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();
        let event = base_event(555, "hi");
        let outcome = score_event(&event, &cfg, &evaluator()).await.unwrap();
        assert!(outcome.is_none());
    }
}
