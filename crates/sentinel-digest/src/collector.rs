//! Pulls digest candidates out of the message store and ranks them. The
//! store already does the heavy lifting (`digest_candidates` filters by
//! schedule, window, and the effective-score floor); this module just
//! orders and truncates the result.

use chrono::{DateTime, Utc};
use sentinel_core::config::Schedule;
use sentinel_store::{StoreManager, StoredMessage};

use crate::error::Result;

/// Collect every unprocessed candidate for `schedule` created since
/// `window_start` scoring at or above `min_score`, then rank by effective
/// score (descending) and recency, truncated to `top_n`.
pub async fn collect(
    store: &StoreManager,
    schedule: Schedule,
    window_start: DateTime<Utc>,
    min_score: f32,
    top_n: i32,
) -> Result<Vec<StoredMessage>> {
    let candidates = store.digest_candidates(schedule.as_str(), window_start, min_score)?;
    Ok(rank(candidates, top_n))
}

fn rank(mut candidates: Vec<StoredMessage>, top_n: i32) -> Vec<StoredMessage> {
    candidates.sort_by(|a, b| {
        b.effective_score()
            .partial_cmp(&a.effective_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    let limit = top_n.max(0) as usize;
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use sentinel_store::SemanticType;

    fn store() -> StoreManager {
        StoreManager::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn message(chat_id: i64, msg_id: i64, score: f32, created_at: &str) -> StoredMessage {
        StoredMessage {
            chat_id,
            msg_id,
            content_hash: format!("hash-{msg_id}"),
            score,
            keyword_score: score,
            semantic_scores: Default::default(),
            semantic_type: SemanticType::None,
            alerted: false,
            feed_alert_flag: true,
            feed_interest_flag: false,
            chat_title: "ops".to_string(),
            sender_name: "alice".to_string(),
            sender_id: 1,
            message_text: "deploy failed".to_string(),
            triggers: "security".to_string(),
            trigger_annotations: Default::default(),
            matched_profiles: vec!["p1".to_string()],
            digest_schedule: "hourly".to_string(),
            digest_processed: false,
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn ranks_by_score_then_recency_and_truncates() {
        let store = store();
        store.upsert_message(&message(-100, 1, 3.0, "2026-01-01T09:00:00Z")).unwrap();
        store.upsert_message(&message(-100, 2, 9.0, "2026-01-01T09:01:00Z")).unwrap();
        store.upsert_message(&message(-100, 3, 9.0, "2026-01-01T09:05:00Z")).unwrap();

        let window_start = "2026-01-01T08:00:00Z".parse().unwrap();
        let ranked = collect(&store, Schedule::Hourly, window_start, 0.0, 2).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].msg_id, 3);
        assert_eq!(ranked[1].msg_id, 2);
    }

    #[tokio::test]
    async fn filters_below_min_score() {
        let store = store();
        store.upsert_message(&message(-100, 1, 1.0, "2026-01-01T09:00:00Z")).unwrap();
        let window_start = "2026-01-01T08:00:00Z".parse().unwrap();
        let ranked = collect(&store, Schedule::Hourly, window_start, 5.0, 10).await.unwrap();
        assert!(ranked.is_empty());
    }
}
