use std::sync::Arc;

use chrono::Utc;
use sentinel_core::atomic::write_atomic;
use sentinel_core::config::Declared;
use sentinel_store::{ProfileAdjustment, StoreManager};
use tracing::info;

use crate::error::{Result, WorkerError};
use crate::types::{TuningDecision, TuningKind};

/// Negative-feedback count that triggers a tuning step (spec §4.7
/// "Auto-tuning" — the source spec leaves the exact threshold
/// unspecified; grounded in the original's `profile_tuner.py` default of
/// five corrections before it acts, to avoid reacting to a single
/// mis-click).
const NEGATIVE_FEEDBACK_TRIGGER: i64 = 5;
const THRESHOLD_STEP: f32 = 0.05;
const THRESHOLD_CAP: f32 = 0.95;
const MIN_SCORE_STEP: f32 = 0.5;
const MIN_SCORE_CAP: f32 = 10.0;

/// Raises a profile's `threshold` (semantic) or `min_score` (keyword) after
/// enough negative feedback accumulates, audits the change, and persists it
/// back to the on-disk config document (spec §4.7). Adjustments are
/// monotonically non-decreasing and capped — never applied if the profile
/// is already at or past its cap.
pub struct AutoTuner {
    store: Arc<StoreManager>,
    config_path: String,
}

impl AutoTuner {
    pub fn new(store: Arc<StoreManager>, config_path: String) -> Self {
        Self { store, config_path }
    }

    /// Check one profile's accumulated negative feedback and, if it clears
    /// the trigger count, compute (but do not yet apply) a tuning decision.
    pub async fn evaluate(
        &self,
        profile_id: &str,
        is_semantic: bool,
        current_threshold: f32,
        current_min_score: f32,
    ) -> Result<Option<TuningDecision>> {
        let store = self.store.clone();
        let id = profile_id.to_string();
        let feedback_count =
            tokio::task::spawn_blocking(move || store.negative_feedback_count(&id))
                .await
                .map_err(|e| WorkerError::Platform(e.to_string()))??;

        if feedback_count < NEGATIVE_FEEDBACK_TRIGGER {
            return Ok(None);
        }

        let decision = if is_semantic {
            let new_value = (current_threshold + THRESHOLD_STEP).min(THRESHOLD_CAP);
            if new_value <= current_threshold {
                return Ok(None);
            }
            TuningDecision {
                profile_id: profile_id.to_string(),
                adjustment_type: TuningKind::Threshold,
                old_value: current_threshold,
                new_value,
                feedback_count: feedback_count as i32,
            }
        } else {
            let new_value = (current_min_score + MIN_SCORE_STEP).min(MIN_SCORE_CAP);
            if new_value <= current_min_score {
                return Ok(None);
            }
            TuningDecision {
                profile_id: profile_id.to_string(),
                adjustment_type: TuningKind::MinScore,
                old_value: current_min_score,
                new_value,
                feedback_count: feedback_count as i32,
            }
        };

        Ok(Some(decision))
    }

    /// Apply a tuning decision: rewrite the profile's field in the config
    /// document atomically (temp-file + rename) and audit the change to
    /// `profile_adjustments`. The in-memory `AppCfg` is not mutated here —
    /// callers pick the change up on the next config reload, per spec §4.1
    /// ("in-flight messages complete under the old config").
    pub async fn apply(&self, decision: &TuningDecision) -> Result<()> {
        let raw = tokio::fs::read_to_string(&self.config_path).await?;
        let mut declared: Declared = serde_yaml::from_str(&raw)
            .map_err(|e| WorkerError::Platform(format!("config parse failed: {e}")))?;

        let Some(profile) = declared.profiles.iter_mut().find(|p| p.id == decision.profile_id) else {
            info!(profile_id = %decision.profile_id, "tuning target profile no longer exists, skipping");
            return Ok(());
        };
        match decision.adjustment_type {
            TuningKind::Threshold => profile.threshold = decision.new_value,
            TuningKind::MinScore => profile.min_score = decision.new_value,
        }

        let rewritten = serde_yaml::to_string(&declared)
            .map_err(|e| WorkerError::Platform(format!("config serialize failed: {e}")))?;
        let path = self.config_path.clone();
        let bytes = rewritten.into_bytes();
        tokio::task::spawn_blocking(move || write_atomic(std::path::Path::new(&path), &bytes))
            .await
            .map_err(|e| WorkerError::Platform(e.to_string()))?
            .map_err(|e| WorkerError::Platform(e.to_string()))?;

        let adjustment = ProfileAdjustment {
            id: 0,
            profile_id: decision.profile_id.clone(),
            profile_type: match decision.adjustment_type {
                TuningKind::Threshold => "semantic".to_string(),
                TuningKind::MinScore => "keyword".to_string(),
            },
            adjustment_type: decision.adjustment_type.as_str().to_string(),
            old_value: decision.old_value,
            new_value: decision.new_value,
            reason: format!("{} negative feedback events", decision.feedback_count),
            feedback_count: decision.feedback_count,
            trigger_chat_id: None,
            trigger_msg_id: None,
            created_at: Utc::now().to_rfc3339(),
        };
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.record_adjustment(&adjustment))
            .await
            .map_err(|e| WorkerError::Platform(e.to_string()))??;

        info!(
            profile_id = %decision.profile_id,
            kind = decision.adjustment_type.as_str(),
            old = decision.old_value,
            new = decision.new_value,
            "auto-tuned profile"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{KeywordCategories, ProfileDefinition};
    use std::collections::HashMap;

    fn store() -> Arc<StoreManager> {
        Arc::new(StoreManager::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap())
    }

    fn write_config(path: &std::path::Path, profile_id: &str, min_score: f32) {
        let declared = Declared {
            profiles: vec![ProfileDefinition {
                id: profile_id.to_string(),
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
                min_score,
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
            channels: vec![],
            monitored_users: vec![],
        };
        std::fs::write(path, serde_yaml::to_string(&declared).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn below_trigger_count_yields_no_decision() {
        let tuner = AutoTuner::new(store(), "unused.yaml".to_string());
        let decision = tuner.evaluate("p1", false, 0.42, 1.0).await.unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn keyword_profile_raises_min_score_and_caps() {
        let store = store();
        for i in 0..NEGATIVE_FEEDBACK_TRIGGER {
            store
                .insert_feedback(
                    &sentinel_store::Feedback {
                        chat_id: -1,
                        msg_id: i,
                        label: 0,
                        semantic_type: sentinel_store::SemanticType::None,
                        created_at: Utc::now().to_rfc3339(),
                    },
                    &["p1".to_string()],
                )
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "p1", 9.8);

        let tuner = AutoTuner::new(store, path.to_string_lossy().to_string());
        let decision = tuner.evaluate("p1", false, 0.42, 9.8).await.unwrap().unwrap();
        assert_eq!(decision.adjustment_type, TuningKind::MinScore);
        assert!((decision.new_value - 10.0).abs() < 1e-6);

        tuner.apply(&decision).await.unwrap();
        let rewritten = std::fs::read_to_string(&path).unwrap();
        let declared: Declared = serde_yaml::from_str(&rewritten).unwrap();
        assert!((declared.profiles[0].min_score - 10.0).abs() < 1e-6);

        // Already at the cap: no further decision.
        let no_more = tuner.evaluate("p1", false, 0.42, 10.0).await.unwrap();
        assert!(no_more.is_none());
    }
}
