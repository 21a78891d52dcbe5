use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{
    Feedback, ProfileAdjustment, RetentionReport, SemanticType, StoredMessage, WebhookDelivery,
};

/// Transactional SQLite store for messages, feedback, deliveries, and
/// adjustments (C3, spec §4.3). Wraps a single blocking `rusqlite::Connection`
/// in a `Mutex` — rusqlite is `!Sync`, so the mutex is the serialization
/// point; async callers run through `tokio::task::spawn_blocking`.
pub struct StoreManager {
    conn: Mutex<rusqlite::Connection>,
}

impl StoreManager {
    pub fn new(conn: rusqlite::Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// UPSERT a scored message. On conflict `(chat_id, msg_id)`: overwrite
    /// score fields and metadata, OR-merge boolean feed flags, union
    /// `matched_profiles`, and never regress `digest_processed` (spec §3
    /// invariant / idempotence property in §8).
    pub fn upsert_message(&self, msg: &StoredMessage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let existing = Self::fetch_row(&conn, msg.chat_id, msg.msg_id)?;

        let (feed_alert_flag, feed_interest_flag, alerted, digest_processed, matched_profiles) =
            match &existing {
                Some(prev) => (
                    prev.feed_alert_flag || msg.feed_alert_flag,
                    prev.feed_interest_flag || msg.feed_interest_flag,
                    prev.alerted || msg.alerted,
                    prev.digest_processed || msg.digest_processed,
                    union_profiles(&prev.matched_profiles, &msg.matched_profiles),
                ),
                None => (
                    msg.feed_alert_flag,
                    msg.feed_interest_flag,
                    msg.alerted,
                    msg.digest_processed,
                    msg.matched_profiles.clone(),
                ),
            };

        let semantic_scores_json = serde_json::to_string(&msg.semantic_scores)?;
        let trigger_annotations_json = serde_json::to_string(&msg.trigger_annotations)?;
        let matched_profiles_json = serde_json::to_string(&matched_profiles)?;

        conn.execute(
            "INSERT INTO messages (
                chat_id, msg_id, content_hash, score, keyword_score,
                semantic_scores_json, semantic_type, alerted, feed_alert_flag,
                feed_interest_flag, chat_title, sender_name, sender_id,
                message_text, triggers, trigger_annotations, matched_profiles,
                digest_schedule, digest_processed, created_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
             ON CONFLICT(chat_id, msg_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                score = excluded.score,
                keyword_score = excluded.keyword_score,
                semantic_scores_json = excluded.semantic_scores_json,
                semantic_type = excluded.semantic_type,
                alerted = ?8,
                feed_alert_flag = ?9,
                feed_interest_flag = ?10,
                chat_title = excluded.chat_title,
                sender_name = excluded.sender_name,
                sender_id = excluded.sender_id,
                message_text = excluded.message_text,
                triggers = excluded.triggers,
                trigger_annotations = excluded.trigger_annotations,
                matched_profiles = ?17,
                digest_schedule = excluded.digest_schedule,
                digest_processed = ?19",
            params![
                msg.chat_id,
                msg.msg_id,
                msg.content_hash,
                msg.score,
                msg.keyword_score,
                semantic_scores_json,
                msg.semantic_type.to_string(),
                alerted as i32,
                feed_alert_flag as i32,
                feed_interest_flag as i32,
                msg.chat_title,
                msg.sender_name,
                msg.sender_id,
                msg.message_text,
                msg.triggers,
                trigger_annotations_json,
                matched_profiles_json,
                msg.digest_schedule,
                digest_processed as i32,
                msg.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_message(&self, chat_id: i64, msg_id: i64) -> Result<Option<StoredMessage>> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_row(&conn, chat_id, msg_id)
    }

    fn fetch_row(conn: &rusqlite::Connection, chat_id: i64, msg_id: i64) -> Result<Option<StoredMessage>> {
        conn.query_row(
            "SELECT chat_id, msg_id, content_hash, score, keyword_score,
                    semantic_scores_json, semantic_type, alerted, feed_alert_flag,
                    feed_interest_flag, chat_title, sender_name, sender_id,
                    message_text, triggers, trigger_annotations, matched_profiles,
                    digest_schedule, digest_processed, created_at
             FROM messages WHERE chat_id = ?1 AND msg_id = ?2",
            params![chat_id, msg_id],
            row_to_message,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Insert feedback and fan out to `feedback_profiles` (spec §3/§4.7).
    pub fn insert_feedback(&self, fb: &Feedback, profile_ids: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO feedback (chat_id, msg_id, label, semantic_type, created_at)
             VALUES (?1,?2,?3,?4,?5)
             ON CONFLICT(chat_id, msg_id) DO UPDATE SET
                label = excluded.label, semantic_type = excluded.semantic_type,
                created_at = excluded.created_at",
            params![fb.chat_id, fb.msg_id, fb.label, fb.semantic_type.to_string(), fb.created_at],
        )?;
        for profile_id in profile_ids {
            tx.execute(
                "INSERT OR IGNORE INTO feedback_profiles (chat_id, msg_id, profile_id)
                 VALUES (?1,?2,?3)",
                params![fb.chat_id, fb.msg_id, profile_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Count of negative (`label = 0`) feedback rows recorded for a profile,
    /// for the auto-tuner (spec §4.7).
    pub fn negative_feedback_count(&self, profile_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM feedback f
             JOIN feedback_profiles fp ON f.chat_id = fp.chat_id AND f.msg_id = fp.msg_id
             WHERE fp.profile_id = ?1 AND f.label = 0",
            params![profile_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Positive-feedback message texts for a profile, used to augment the
    /// semantic centroid (spec §4.6).
    pub fn positive_feedback_texts(&self, profile_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.message_text FROM feedback f
             JOIN feedback_profiles fp ON f.chat_id = fp.chat_id AND f.msg_id = fp.msg_id
             JOIN messages m ON m.chat_id = f.chat_id AND m.msg_id = f.msg_id
             WHERE fp.profile_id = ?1 AND f.label = 1",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn record_webhook_delivery(&self, d: &WebhookDelivery) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO webhook_deliveries
                (service, profile_id, chat_id, msg_id, status, http_status,
                 response_time_ms, error_message, payload, attempt, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                d.service, d.profile_id, d.chat_id, d.msg_id, d.status, d.http_status,
                d.response_time_ms, d.error_message, d.payload, d.attempt, d.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_adjustment(&self, a: &ProfileAdjustment) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO profile_adjustments
                (profile_id, profile_type, adjustment_type, old_value, new_value,
                 reason, feedback_count, trigger_chat_id, trigger_msg_id, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                a.profile_id, a.profile_type, a.adjustment_type, a.old_value, a.new_value,
                a.reason, a.feedback_count, a.trigger_chat_id, a.trigger_msg_id, a.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Candidate rows for a due digest schedule (spec §4.8 collector): feed
    /// flag set, bound to this schedule, not yet processed, inside the time
    /// window, above `min_score` on the effective-score rule.
    pub fn digest_candidates(
        &self,
        schedule: &str,
        window_start: DateTime<Utc>,
        min_score: f32,
    ) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT chat_id, msg_id, content_hash, score, keyword_score,
                    semantic_scores_json, semantic_type, alerted, feed_alert_flag,
                    feed_interest_flag, chat_title, sender_name, sender_id,
                    message_text, triggers, trigger_annotations, matched_profiles,
                    digest_schedule, digest_processed, created_at
             FROM messages
             WHERE (feed_interest_flag = 1 OR feed_alert_flag = 1)
               AND digest_schedule = ?1
               AND digest_processed = 0
               AND created_at >= ?2",
        )?;
        let rows = stmt.query_map(
            params![schedule, window_start.to_rfc3339()],
            row_to_message,
        )?;
        let candidates: Vec<StoredMessage> = rows
            .filter_map(|r| r.ok())
            .filter(|m| m.effective_score() >= min_score)
            .collect();
        Ok(candidates)
    }

    pub fn mark_digest_processed(&self, pairs: &[(i64, i64)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (chat_id, msg_id) in pairs {
            tx.execute(
                "UPDATE messages SET digest_processed = 1 WHERE chat_id = ?1 AND msg_id = ?2",
                params![chat_id, msg_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Retention sweep (spec §4.3/§8 scenario 6): delete non-alerted rows
    /// older than `retention_days`, alerted rows older than
    /// `retention_days * alert_multiplier`, then cap total row count,
    /// evicting oldest non-alerted first.
    pub fn retention_sweep(
        &self,
        retention_days: i64,
        alert_multiplier: i64,
        max_messages: i64,
    ) -> Result<RetentionReport> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let non_alerted_cutoff = (now - Duration::days(retention_days)).to_rfc3339();
        let alerted_cutoff = (now - Duration::days(retention_days * alert_multiplier)).to_rfc3339();

        let deleted_non_alerted = conn.execute(
            "DELETE FROM messages WHERE alerted = 0 AND created_at < ?1",
            params![non_alerted_cutoff],
        )? as u64;
        let deleted_alerted = conn.execute(
            "DELETE FROM messages WHERE alerted = 1 AND created_at < ?1",
            params![alerted_cutoff],
        )? as u64;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        let mut deleted_over_cap = 0u64;
        if total > max_messages {
            let overflow = total - max_messages;
            deleted_over_cap = conn.execute(
                "DELETE FROM messages WHERE rowid IN (
                    SELECT rowid FROM messages WHERE alerted = 0
                    ORDER BY created_at ASC LIMIT ?1
                )",
                params![overflow],
            )? as u64;
        }

        let report = RetentionReport {
            deleted_non_alerted,
            deleted_alerted,
            deleted_over_cap,
        };
        info!(?report, "retention sweep complete");
        Ok(report)
    }

    /// Reclaim disk space. Must run outside any transaction (spec §4.3) —
    /// no transaction is open on this connection at call time, so this
    /// issues under autocommit.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

fn union_profiles(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for id in b {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let semantic_scores_json: String = row.get(5)?;
    let semantic_type_str: String = row.get(6)?;
    let trigger_annotations_json: String = row.get(15)?;
    let matched_profiles_json: String = row.get(16)?;
    Ok(StoredMessage {
        chat_id: row.get(0)?,
        msg_id: row.get(1)?,
        content_hash: row.get(2)?,
        score: row.get(3)?,
        keyword_score: row.get(4)?,
        semantic_scores: serde_json::from_str(&semantic_scores_json).unwrap_or_default(),
        semantic_type: semantic_type_str.parse().unwrap_or(SemanticType::None),
        alerted: row.get::<_, i32>(7)? != 0,
        feed_alert_flag: row.get::<_, i32>(8)? != 0,
        feed_interest_flag: row.get::<_, i32>(9)? != 0,
        chat_title: row.get(10)?,
        sender_name: row.get(11)?,
        sender_id: row.get(12)?,
        message_text: row.get(13)?,
        triggers: row.get(14)?,
        trigger_annotations: serde_json::from_str(&trigger_annotations_json).unwrap_or_default(),
        matched_profiles: serde_json::from_str(&matched_profiles_json).unwrap_or_default(),
        digest_schedule: row.get(17)?,
        digest_processed: row.get::<_, i32>(18)? != 0,
        created_at: row.get(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreManager {
        StoreManager::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap()
    }

    fn sample(chat_id: i64, msg_id: i64) -> StoredMessage {
        StoredMessage {
            chat_id,
            msg_id,
            content_hash: "abc".into(),
            score: 1.0,
            keyword_score: 1.0,
            feed_alert_flag: true,
            matched_profiles: vec!["p1".into()],
            digest_schedule: "hourly".into(),
            created_at: Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    #[test]
    fn upsert_is_idempotent_and_or_merges_flags() {
        let store = store();
        let mut m = sample(-100, 1);
        store.upsert_message(&m).unwrap();

        m.feed_interest_flag = true;
        m.matched_profiles = vec!["p2".into()];
        m.digest_processed = false;
        store.upsert_message(&m).unwrap();

        let row = store.get_message(-100, 1).unwrap().unwrap();
        assert!(row.feed_alert_flag);
        assert!(row.feed_interest_flag);
        assert_eq!(row.matched_profiles, vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn digest_processed_never_regresses() {
        let store = store();
        let mut m = sample(-100, 2);
        m.digest_processed = true;
        store.upsert_message(&m).unwrap();

        m.digest_processed = false;
        store.upsert_message(&m).unwrap();

        let row = store.get_message(-100, 2).unwrap().unwrap();
        assert!(row.digest_processed);
    }

    #[test]
    fn retention_sweep_respects_alert_multiplier_and_cap() {
        let store = store();
        let old_non_alerted = Utc::now() - Duration::days(40);
        // Alert multiplier is 2, so the alerted cutoff is 30*2 = 60 days —
        // these need to be older than that to be swept.
        let old_alerted = Utc::now() - Duration::days(70);

        for i in 0..5 {
            let mut m = sample(-200, i);
            m.alerted = false;
            m.feed_alert_flag = false;
            m.created_at = old_non_alerted.to_rfc3339();
            store.upsert_message(&m).unwrap();
        }
        for i in 5..8 {
            let mut m = sample(-200, i);
            m.alerted = true;
            m.created_at = old_alerted.to_rfc3339();
            store.upsert_message(&m).unwrap();
        }

        let report = store.retention_sweep(30, 2, 1000).unwrap();
        assert_eq!(report.deleted_non_alerted, 5);
        assert_eq!(report.deleted_alerted, 3);
    }
}
