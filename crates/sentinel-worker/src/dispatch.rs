use sentinel_core::config::AppCfg;
use sentinel_core::config::ProfileDefinition;
use sentinel_core::types::ChatEvent;
use sentinel_platform::PlatformClient;
use sentinel_store::StoreManager;
use tracing::{info, warn};

use crate::error::Result;

/// Destination used for the "DM the operator" delivery mode — the platform
/// adapter's own authenticated identity (Telegram's "Saved Messages"
/// equivalent), matching the original notifier's `notify_dm` behavior.
const DM_TARGET: &str = "me";

/// Truncate a message preview the same way the original notifier does, so
/// alert text stays readable in a chat client.
fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.replace('\n', " ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(max_chars).collect();
        format!("{truncated}\u{2026}")
    }
}

/// Recommended delivery mode for an alert profile: the first schedule's
/// `mode`, falling back to `dm` when the profile has no digest config or no
/// schedules — matching `alerts_evaluator.py::_extract_delivery_mode`.
/// Unlike [`ProfileDigestConfig::mode`](sentinel_core::config::ProfileDigestConfig),
/// which governs *digest* delivery, this is consulted purely to decide
/// whether an instant alert goes out as a DM.
fn extract_delivery_mode(profile: &ProfileDefinition) -> sentinel_core::types::DeliveryMode {
    match profile.digest.as_ref().and_then(|d| d.schedules.first()) {
        Some(schedule) => schedule.mode,
        None => sentinel_core::types::DeliveryMode::Dm,
    }
}

/// Send an instant alert for matched keyword profiles whose delivery mode
/// includes `dm` (spec §4.7 step 11). Idempotent on the `alerted` UPSERT
/// marker: skips the send entirely if this `(chat_id, msg_id)` was already
/// marked alerted by a prior (possibly redelivered) attempt.
pub async fn dispatch_alerts(
    event: &ChatEvent,
    matched_alert_profiles: &[String],
    cfg: &AppCfg,
    store: &StoreManager,
    platform: &dyn PlatformClient,
) -> Result<bool> {
    if matched_alert_profiles.is_empty() {
        return Ok(false);
    }

    let already_alerted = store
        .get_message(event.chat_id, event.msg_id)?
        .map(|m| m.alerted)
        .unwrap_or(false);
    if already_alerted {
        return Ok(false);
    }

    let wants_dm = matched_alert_profiles.iter().any(|id| {
        cfg.global_profiles
            .get(id)
            .map(|p: &ProfileDefinition| extract_delivery_mode(p).includes_dm())
            .unwrap_or(false)
    });
    if !wants_dm {
        return Ok(false);
    }

    let title = if event.chat_title.is_empty() {
        format!("chat {}", event.chat_id)
    } else {
        event.chat_title.clone()
    };
    let body = format!("[{title}] {}", preview(&event.text, 400));

    match platform.send_message(DM_TARGET, &body, true).await {
        Ok(()) => {
            info!(chat_id = event.chat_id, msg_id = event.msg_id, "instant alert delivered");
            Ok(true)
        }
        Err(e) => {
            warn!(chat_id = event.chat_id, msg_id = event.msg_id, error = %e, "instant alert delivery failed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::config::{Declared, KeywordCategories, ProfileDigestConfig, Schedule, ScheduleConfig};
    use sentinel_core::types::{DeliveryMode, MediaKind};
    use sentinel_platform::{EntityInfo, SelfIdentity};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingPlatform {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PlatformClient for RecordingPlatform {
        async fn connect(&self) -> sentinel_platform::Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> sentinel_platform::Result<()> {
            Ok(())
        }
        async fn get_me(&self) -> sentinel_platform::Result<SelfIdentity> {
            unimplemented!()
        }
        async fn send_message(&self, target: &str, text: &str, _disable_link_preview: bool) -> sentinel_platform::Result<()> {
            self.sent.lock().unwrap().push((target.to_string(), text.to_string()));
            Ok(())
        }
        async fn fetch_entity(&self, _id: i64) -> sentinel_platform::Result<Option<EntityInfo>> {
            Ok(None)
        }
        async fn fetch_profile_photo(&self, _id: i64) -> sentinel_platform::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn register_event_handler(&self, _sink: mpsc::Sender<ChatEvent>) {}
    }

    fn store() -> StoreManager {
        StoreManager::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap()
    }

    fn event(chat_id: i64, msg_id: i64) -> ChatEvent {
        ChatEvent {
            chat_id,
            chat_title: "ops".into(),
            msg_id,
            sender_id: 1,
            sender_name: "alice".into(),
            text: "CVE-2024-1234 critical".into(),
            mentioned: false,
            reactions_count: 0,
            replies_count: 0,
            timestamp: chrono::Utc::now(),
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

    fn profile_with_digest(id: &str, schedules: Vec<ScheduleConfig>) -> ProfileDefinition {
        ProfileDefinition {
            id: id.to_string(),
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
            min_score: 0.5,
            scoring_weights: HashMap::new(),
            digest: Some(ProfileDigestConfig { schedules, ..Default::default() }),
            detect_codes: false,
            detect_documents: false,
            detect_links: false,
            detect_polls: false,
            require_forwarded: false,
            prioritize_pinned: false,
            prioritize_admin: false,
        }
    }

    fn schedule_config(mode: DeliveryMode) -> ScheduleConfig {
        ScheduleConfig {
            schedule: Schedule::Hourly,
            enabled: true,
            top_n: None,
            min_score: None,
            daily_hour: 8,
            weekly_day: 0,
            weekly_hour: 8,
            mode,
            target_channel: None,
        }
    }

    /// Spec §8 scenario 1: a keyword profile whose digest carries only a
    /// schedule-level `mode: dm` (profile-level `digest.mode` left unset)
    /// still delivers the instant DM.
    #[tokio::test]
    async fn scenario_1_keyword_alert_delivers_dm_from_first_schedule_mode() {
        let profile = profile_with_digest("security", vec![schedule_config(DeliveryMode::Dm)]);
        assert_eq!(profile.digest.as_ref().unwrap().mode, DeliveryMode::None);

        let declared = Declared { profiles: vec![profile], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();
        let store = store();
        let platform = RecordingPlatform::default();

        let delivered = dispatch_alerts(&event(-1001, 42), &["security".to_string()], &cfg, &store, &platform)
            .await
            .unwrap();
        assert!(delivered);
        assert_eq!(platform.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_without_digest_config_defaults_to_dm() {
        let profile = ProfileDefinition {
            digest: None,
            ..profile_with_digest("ops", vec![])
        };
        let declared = Declared { profiles: vec![profile], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();
        let store = store();
        let platform = RecordingPlatform::default();

        let delivered = dispatch_alerts(&event(-1002, 7), &["ops".to_string()], &cfg, &store, &platform)
            .await
            .unwrap();
        assert!(delivered);
    }

    #[tokio::test]
    async fn first_schedule_mode_digest_only_suppresses_instant_dm() {
        let profile = profile_with_digest("silent", vec![schedule_config(DeliveryMode::Digest)]);
        let declared = Declared { profiles: vec![profile], channels: vec![], monitored_users: vec![] };
        let cfg = AppCfg::from_declared(declared).unwrap();
        let store = store();
        let platform = RecordingPlatform::default();

        let delivered = dispatch_alerts(&event(-1003, 9), &["silent".to_string()], &cfg, &store, &platform)
            .await
            .unwrap();
        assert!(!delivered);
        assert!(platform.sent.lock().unwrap().is_empty());
    }
}
