use rusqlite::{Connection, Result};

/// Initialise (and additively migrate) all tables owned by the worker DB
/// (spec §4.3/§6.3). Safe to call on every startup — `CREATE TABLE IF NOT
/// EXISTS` plus guarded `ALTER TABLE ... ADD COLUMN` calls make it idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_messages_table(conn)?;
    create_feedback_tables(conn)?;
    create_webhook_deliveries_table(conn)?;
    create_profile_adjustments_table(conn)?;
    migrate_additive_columns(conn)?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            chat_id               INTEGER NOT NULL,
            msg_id                INTEGER NOT NULL,
            content_hash          TEXT NOT NULL,
            score                 REAL NOT NULL DEFAULT 0,
            keyword_score         REAL NOT NULL DEFAULT 0,
            semantic_scores_json  TEXT NOT NULL DEFAULT '{}',
            semantic_type         TEXT NOT NULL DEFAULT 'none',
            alerted               INTEGER NOT NULL DEFAULT 0,
            feed_alert_flag       INTEGER NOT NULL DEFAULT 0,
            feed_interest_flag    INTEGER NOT NULL DEFAULT 0,
            chat_title            TEXT NOT NULL DEFAULT '',
            sender_name           TEXT NOT NULL DEFAULT '',
            sender_id             INTEGER NOT NULL DEFAULT 0,
            message_text          TEXT NOT NULL DEFAULT '',
            triggers              TEXT NOT NULL DEFAULT '',
            trigger_annotations   TEXT NOT NULL DEFAULT '{}',
            matched_profiles      TEXT NOT NULL DEFAULT '[]',
            digest_schedule       TEXT NOT NULL DEFAULT 'none',
            digest_processed      INTEGER NOT NULL DEFAULT 0,
            created_at            TEXT NOT NULL,
            PRIMARY KEY (chat_id, msg_id)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_digest_collection
            ON messages(feed_interest_flag, digest_schedule, digest_processed, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_alerted ON messages(alerted);
        CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);",
    )
}

fn create_feedback_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS feedback (
            chat_id       INTEGER NOT NULL,
            msg_id        INTEGER NOT NULL,
            label         INTEGER NOT NULL,
            semantic_type TEXT NOT NULL DEFAULT 'none',
            created_at    TEXT NOT NULL,
            PRIMARY KEY (chat_id, msg_id)
        );
        CREATE TABLE IF NOT EXISTS feedback_profiles (
            chat_id    INTEGER NOT NULL,
            msg_id     INTEGER NOT NULL,
            profile_id TEXT NOT NULL,
            PRIMARY KEY (chat_id, msg_id, profile_id)
        );",
    )
}

fn create_webhook_deliveries_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS webhook_deliveries (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            service           TEXT NOT NULL,
            profile_id        TEXT,
            chat_id           INTEGER NOT NULL,
            msg_id            INTEGER NOT NULL,
            status            TEXT NOT NULL,
            http_status       INTEGER,
            response_time_ms  INTEGER,
            error_message     TEXT,
            payload           TEXT,
            attempt           INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhooks_created ON webhook_deliveries(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_webhooks_service ON webhook_deliveries(service, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_webhooks_status ON webhook_deliveries(status, created_at DESC);",
    )
}

fn create_profile_adjustments_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profile_adjustments (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id       TEXT NOT NULL,
            profile_type     TEXT NOT NULL,
            adjustment_type  TEXT NOT NULL,
            old_value        REAL NOT NULL,
            new_value        REAL NOT NULL,
            reason           TEXT NOT NULL DEFAULT '',
            feedback_count   INTEGER NOT NULL DEFAULT 0,
            trigger_chat_id  INTEGER,
            trigger_msg_id   INTEGER,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_adjustments_profile
            ON profile_adjustments(profile_id, created_at DESC);",
    )
}

/// Columns added after the tables' initial release. Each is guarded by a
/// `PRAGMA table_info` check so re-running this against an already-migrated
/// database is a no-op, matching the teacher's additive-migration style.
fn migrate_additive_columns(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "messages", "digest_processed", "INTEGER NOT NULL DEFAULT 0")?;
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, ddl: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);
    if !exists {
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"))?;
    }
    Ok(())
}
