//! Walks the declared configuration to find which channels and monitored
//! users run a given cadence, resolving each one's digest settings through
//! the same precedence the worker uses for scoring (entity > overrides >
//! first bound profile).

use sentinel_core::config::{AppCfg, Schedule};
use sentinel_profiles::ProfileResolver;

use crate::types::DiscoveredSchedule;

pub fn discover(cfg: &AppCfg, schedule: Schedule) -> Vec<DiscoveredSchedule> {
    let resolver = ProfileResolver::from_cfg(cfg);
    let mut found = Vec::new();

    for channel in cfg.channels.iter().filter(|c| c.enabled) {
        let resolved = resolver.resolve_for_channel(channel);
        if let Some(digest) = &resolved.digest {
            if let Some(sc) = digest.schedules.iter().find(|s| s.schedule == schedule && s.enabled) {
                found.push(DiscoveredSchedule {
                    identifier: format!("channel:{}", channel.id),
                    profile_ids: resolved.matched_profile_ids.clone(),
                    min_score: sc.min_score.unwrap_or(digest.min_score),
                    top_n: sc.top_n.unwrap_or(digest.top_n),
                    mode: if sc.mode == Default::default() { digest.mode } else { sc.mode },
                    target_channel: sc.target_channel.clone().or_else(|| digest.target_channel.clone()),
                    daily_hour: sc.daily_hour,
                    weekly_day: sc.weekly_day,
                    weekly_hour: sc.weekly_hour,
                });
            }
        }
    }

    for user in cfg.monitored_users.iter().filter(|u| u.enabled) {
        let resolved = resolver.resolve_for_user(user);
        if let Some(digest) = &resolved.digest {
            if let Some(sc) = digest.schedules.iter().find(|s| s.schedule == schedule && s.enabled) {
                found.push(DiscoveredSchedule {
                    identifier: format!("user:{}", user.id),
                    profile_ids: resolved.matched_profile_ids.clone(),
                    min_score: sc.min_score.unwrap_or(digest.min_score),
                    top_n: sc.top_n.unwrap_or(digest.top_n),
                    mode: if sc.mode == Default::default() { digest.mode } else { sc.mode },
                    target_channel: sc.target_channel.clone().or_else(|| digest.target_channel.clone()),
                    daily_hour: sc.daily_hour,
                    weekly_day: sc.weekly_day,
                    weekly_hour: sc.weekly_hour,
                });
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{
        ChannelRule, Declared, KeywordCategories, ProfileDefinition, ProfileDigestConfig, ScheduleConfig,
    };
    use std::collections::HashMap;

    fn cfg_with_channel_digest(schedule: Schedule) -> AppCfg {
        let declared = Declared {
            profiles: vec![ProfileDefinition {
                id: "p1".to_string(),
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
            }],
            channels: vec![ChannelRule {
                id: -100,
                name: "ops".to_string(),
                enabled: true,
                profiles: vec!["p1".to_string()],
                overrides: Default::default(),
                digest: Some(ProfileDigestConfig {
                    schedules: vec![ScheduleConfig {
                        schedule,
                        enabled: true,
                        top_n: Some(5),
                        min_score: Some(2.0),
                        daily_hour: 8,
                        weekly_day: 0,
                        weekly_hour: 8,
                        mode: Default::default(),
                        target_channel: Some("-100999".to_string()),
                    }],
                    top_n: 10,
                    min_score: 0.0,
                    mode: Default::default(),
                    target_channel: None,
                }),
                vip_senders: vec![],
                excluded_users: vec![],
                legacy: Default::default(),
                reaction_threshold: 0,
                reply_threshold: 0,
            }],
            monitored_users: vec![],
        };
        let raw = serde_yaml::to_string(&declared).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, raw).unwrap();
        AppCfg::load(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn finds_channel_bound_to_matching_cadence() {
        let cfg = cfg_with_channel_digest(Schedule::Hourly);
        let found = discover(&cfg, Schedule::Hourly);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "channel:-100");
        assert_eq!(found[0].profile_ids, vec!["p1".to_string()]);
        assert_eq!(found[0].top_n, 5);
        assert!((found[0].min_score - 2.0).abs() < 1e-6);
        assert_eq!(found[0].target_channel.as_deref(), Some("-100999"));
    }

    #[test]
    fn ignores_non_matching_cadence() {
        let cfg = cfg_with_channel_digest(Schedule::Hourly);
        assert!(discover(&cfg, Schedule::Daily).is_empty());
    }
}
