//! Merges every [`DiscoveredSchedule`] bound to one cadence into the single
//! combined run the collector and delivery stages operate on. A cadence is
//! shared across however many channels/users declared it; the digest
//! itself is one run per cadence, not one per entity.

use sentinel_core::config::AppCfg;
use sentinel_core::types::DeliveryMode;
use tracing::warn;

use crate::scheduler::plurality;
use crate::types::{AggregatedConfig, DiscoveredSchedule};

/// `min_score` takes the tightest (lowest) bound across entities so nothing
/// any of them cares about is dropped; `top_n` takes the widest so the
/// shared digest is never starved for the entity that wanted more.
/// Delivery mode is unanimous-or-escalate: if every entity agrees, use that
/// mode; if they disagree, use `both` when a global notification channel
/// is configured (so nobody's preference is silently dropped), otherwise
/// fall back to `dm`.
pub fn aggregate(cfg: &AppCfg, discovered: &[DiscoveredSchedule]) -> AggregatedConfig {
    let min_score = discovered
        .iter()
        .map(|d| d.min_score)
        .fold(f32::INFINITY, f32::min);
    let top_n = discovered.iter().map(|d| d.top_n).max().unwrap_or(10);

    let mut profile_group: Vec<String> = Vec::new();
    for d in discovered {
        for id in &d.profile_ids {
            if !profile_group.contains(id) {
                profile_group.push(id.clone());
            }
        }
    }

    let modes: Vec<DeliveryMode> = discovered.iter().map(|d| d.mode).collect();
    let mode = if modes.windows(2).all(|w| w[0] == w[1]) {
        modes.first().copied().unwrap_or_default()
    } else {
        warn!(schedule_entities = discovered.len(), "digest delivery modes disagree across entities");
        if cfg.notification_channel.is_some() {
            DeliveryMode::Both
        } else {
            DeliveryMode::Dm
        }
    };

    let mut targets: Vec<String> = discovered.iter().filter_map(|d| d.target_channel.clone()).collect();
    targets.sort();
    targets.dedup();
    let target_channel = match targets.len() {
        0 => cfg.notification_channel.clone(),
        1 => Some(targets.into_iter().next().unwrap()),
        _ => {
            warn!(?targets, "digest target channels disagree across entities, picking lexicographically first");
            Some(targets.into_iter().next().unwrap())
        }
    };

    AggregatedConfig {
        min_score,
        top_n,
        mode,
        target_channel,
        profile_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(min_score: f32, top_n: i32, mode: DeliveryMode, target: Option<&str>) -> DiscoveredSchedule {
        DiscoveredSchedule {
            identifier: "channel:1".to_string(),
            profile_ids: vec!["p1".to_string()],
            min_score,
            top_n,
            mode,
            target_channel: target.map(str::to_string),
            daily_hour: 8,
            weekly_day: 0,
            weekly_hour: 8,
        }
    }

    fn cfg() -> AppCfg {
        sentinel_core::config::AppCfg::from_declared(Default::default()).unwrap()
    }

    #[test]
    fn takes_tightest_min_score_and_widest_top_n() {
        let discovered = vec![entity(3.0, 5, DeliveryMode::Dm, None), entity(1.0, 10, DeliveryMode::Dm, None)];
        let agg = aggregate(&cfg(), &discovered);
        assert!((agg.min_score - 1.0).abs() < 1e-6);
        assert_eq!(agg.top_n, 10);
    }

    #[test]
    fn unanimous_mode_and_target_pass_through() {
        let discovered = vec![
            entity(1.0, 5, DeliveryMode::Digest, Some("-100")),
            entity(1.0, 5, DeliveryMode::Digest, Some("-100")),
        ];
        let agg = aggregate(&cfg(), &discovered);
        assert_eq!(agg.mode, DeliveryMode::Digest);
        assert_eq!(agg.target_channel.as_deref(), Some("-100"));
    }

    #[test]
    fn disagreeing_modes_escalate_to_both_with_global_channel() {
        let mut cfg = cfg();
        cfg.notification_channel = Some("-200".to_string());
        let discovered = vec![entity(1.0, 5, DeliveryMode::Dm, None), entity(1.0, 5, DeliveryMode::Digest, None)];
        let agg = aggregate(&cfg, &discovered);
        assert_eq!(agg.mode, DeliveryMode::Both);
        assert_eq!(agg.target_channel.as_deref(), Some("-200"));
    }

    #[test]
    fn disagreeing_modes_fall_back_to_dm_without_global_channel() {
        let discovered = vec![entity(1.0, 5, DeliveryMode::Dm, None), entity(1.0, 5, DeliveryMode::Digest, None)];
        let agg = aggregate(&cfg(), &discovered);
        assert_eq!(agg.mode, DeliveryMode::Dm);
    }

    #[test]
    fn profile_group_is_deduplicated_union() {
        let discovered = vec![entity(1.0, 5, DeliveryMode::Dm, None), entity(1.0, 5, DeliveryMode::Dm, None)];
        let agg = aggregate(&cfg(), &discovered);
        assert_eq!(agg.profile_group, vec!["p1".to_string()]);
    }
}
