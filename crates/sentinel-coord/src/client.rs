use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CoordError, Result};
use crate::keys;

/// TTL, in seconds, applied to cache entries and handshake keys per spec §6.1.
pub mod ttl {
    pub const CACHE_ENTRY: u64 = 15 * 60;
    pub const WORKER_STATUS: u64 = 15 * 60;
    pub const DIGEST_LAST_RUN: u64 = 7 * 24 * 3600;
    pub const DIGEST_EXECUTION_LATEST: u64 = 7 * 24 * 3600;
    pub const RELOGIN_HANDSHAKE: u64 = 120;
    pub const LOGIN_PROGRESS: u64 = 300;
}

const EXECUTIONS_PER_PROFILE_CAP: isize = 50;
const EXECUTIONS_GLOBAL_CAP: isize = 500;

/// Typed async client over the coordination store (spec §6.1). Wraps a
/// single multiplexed [`ConnectionManager`] — cheap to clone, safe to share
/// across every long-running task in the process.
#[derive(Clone)]
pub struct CoordStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl CoordStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| CoordError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| CoordError::Connection(e.to_string()))?;
        Ok(Self { client, conn })
    }

    /// Open a dedicated pub/sub connection subscribed to `channel`. Kept
    /// separate from the shared [`ConnectionManager`] since a subscribed
    /// connection can no longer issue ordinary commands.
    pub async fn subscribe(&self, channel: &str) -> Result<redis::aio::PubSub> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| CoordError::Connection(e.to_string()))?;
        pubsub.subscribe(channel).await?;
        Ok(pubsub)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    // -- generic primitives -------------------------------------------------

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self.conn().get(key).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let _: () = self.conn().set(key, raw).await?;
        Ok(())
    }

    pub async fn set_json_ex<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let _: () = self.conn().set_ex(key, raw, ttl_secs).await?;
        Ok(())
    }

    pub async fn get_str(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().get(key).await?)
    }

    pub async fn set_str_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self.conn().set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let _: () = self.conn().del(key).await?;
        Ok(())
    }

    pub async fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<()> {
        let raw = serde_json::to_string(payload)?;
        let _: () = self.conn().publish(channel, raw).await?;
        Ok(())
    }

    // -- worker status / identity -------------------------------------------

    pub async fn set_worker_status<T: Serialize>(&self, status: &T) -> Result<()> {
        self.set_json_ex(keys::WORKER_STATUS, status, ttl::WORKER_STATUS).await
    }

    pub async fn get_worker_status<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.get_json(keys::WORKER_STATUS).await
    }

    pub async fn set_user_info<T: Serialize>(&self, info: &T) -> Result<()> {
        self.set_json(keys::USER_INFO, info).await
    }

    // -- UI cache (per-generation) -------------------------------------------

    pub async fn set_cached_channels<T: Serialize>(&self, generation: u64, value: &T) -> Result<()> {
        self.set_json_ex(&keys::cached_channels(generation), value, ttl::CACHE_ENTRY).await
    }

    pub async fn get_cached_channels<T: DeserializeOwned>(&self, generation: u64) -> Result<Option<T>> {
        self.get_json(&keys::cached_channels(generation)).await
    }

    pub async fn set_cached_users<T: Serialize>(&self, generation: u64, value: &T) -> Result<()> {
        self.set_json_ex(&keys::cached_users(generation), value, ttl::CACHE_ENTRY).await
    }

    pub async fn get_cached_users<T: DeserializeOwned>(&self, generation: u64) -> Result<Option<T>> {
        self.get_json(&keys::cached_users(generation)).await
    }

    pub async fn set_avatar(&self, prefix: &str, id: i64, base64_data: &str) -> Result<()> {
        let _: () = self.conn().set(keys::avatar(prefix, id), base64_data).await?;
        Ok(())
    }

    pub async fn get_avatar(&self, prefix: &str, id: i64) -> Result<Option<String>> {
        Ok(self.conn().get(keys::avatar(prefix, id)).await?)
    }

    // -- digest scheduler -----------------------------------------------------

    pub async fn set_digest_last_run(&self, schedule: &str, iso8601: &str) -> Result<()> {
        self.set_str_ex(&keys::digest_last_run(schedule), iso8601, ttl::DIGEST_LAST_RUN).await
    }

    pub async fn get_digest_last_run(&self, schedule: &str) -> Result<Option<String>> {
        self.get_str(&keys::digest_last_run(schedule)).await
    }

    /// Push one execution record, trim the per-profile and global history
    /// lists to their caps, and refresh the latest-execution quick lookup.
    pub async fn record_digest_execution<T: Serialize>(
        &self,
        profile_id: &str,
        record: &T,
    ) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        let mut conn = self.conn();
        let per_profile_key = keys::digest_executions(profile_id);
        let _: () = conn.lpush(&per_profile_key, &raw).await?;
        let _: () = conn.ltrim(&per_profile_key, 0, EXECUTIONS_PER_PROFILE_CAP - 1).await?;
        let _: () = conn.lpush(keys::DIGEST_EXECUTIONS_HISTORY, &raw).await?;
        let _: () = conn
            .ltrim(keys::DIGEST_EXECUTIONS_HISTORY, 0, EXECUTIONS_GLOBAL_CAP - 1)
            .await?;
        self.set_json_ex(
            &keys::digest_executions_latest(profile_id),
            record,
            ttl::DIGEST_EXECUTION_LATEST,
        )
        .await?;
        Ok(())
    }

    pub async fn get_latest_digest_execution<T: DeserializeOwned>(
        &self,
        profile_id: &str,
    ) -> Result<Option<T>> {
        self.get_json(&keys::digest_executions_latest(profile_id)).await
    }

    // -- batch feedback processor --------------------------------------------

    pub async fn save_batch_queue<T: Serialize>(&self, queue: &T) -> Result<()> {
        self.set_json(keys::BATCH_PROCESSOR_QUEUE, queue).await
    }

    pub async fn load_batch_queue<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.get_json(keys::BATCH_PROCESSOR_QUEUE).await
    }

    pub async fn save_last_batch_time(&self, iso8601: &str) -> Result<()> {
        let _: () = self.conn().set(keys::BATCH_PROCESSOR_LAST_BATCH_TIME, iso8601).await?;
        Ok(())
    }

    pub async fn load_last_batch_time(&self) -> Result<Option<String>> {
        self.get_str(keys::BATCH_PROCESSOR_LAST_BATCH_TIME).await
    }

    // -- relogin / auth handshake ---------------------------------------------

    pub async fn set_relogin_handshake<T: Serialize>(&self, payload: &T) -> Result<()> {
        self.set_json_ex(keys::RELOGIN_HANDSHAKE, payload, ttl::RELOGIN_HANDSHAKE).await
    }

    pub async fn get_relogin_handshake<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.get_json(keys::RELOGIN_HANDSHAKE).await
    }

    pub async fn push_auth_request<T: Serialize>(&self, request: &T) -> Result<()> {
        let raw = serde_json::to_string(request)?;
        let _: () = self.conn().rpush(keys::AUTH_QUEUE, raw).await?;
        Ok(())
    }

    /// Blocking pop with `timeout_secs` budget (0 = block forever), matching
    /// the "auth requests wait <= 90s" timeout from spec §5.
    pub async fn pop_auth_request<T: DeserializeOwned>(&self, timeout_secs: f64) -> Result<Option<T>> {
        let result: Option<(String, String)> = self
            .conn()
            .blpop(keys::AUTH_QUEUE, timeout_secs)
            .await?;
        match result {
            Some((_, raw)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_auth_response<T: Serialize>(&self, request_id: &str, response: &T) -> Result<()> {
        let raw = serde_json::to_string(response)?;
        let _: () = self.conn().hset(keys::AUTH_RESPONSES, request_id, raw).await?;
        Ok(())
    }

    pub async fn get_auth_response<T: DeserializeOwned>(&self, request_id: &str) -> Result<Option<T>> {
        let raw: Option<String> = self.conn().hget(keys::AUTH_RESPONSES, request_id).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn set_login_progress<T: Serialize>(&self, progress: &T) -> Result<()> {
        self.set_json_ex(keys::LOGIN_PROGRESS, progress, ttl::LOGIN_PROGRESS).await
    }

    pub async fn set_logout_progress<T: Serialize>(&self, progress: &T) -> Result<()> {
        self.set_json_ex(keys::LOGOUT_PROGRESS, progress, ttl::LOGIN_PROGRESS).await
    }

    // -- ingestion stream (C4) -------------------------------------------------
    // Low-level XADD/XREADGROUP/XACK/XAUTOCLAIM primitives. Consumer-group
    // semantics (pending-entry reclaim, dedup) live in sentinel-stream; this
    // crate only owns the wire-level calls and error mapping.

    pub async fn xadd_message(&self, stream: &str, fields: &[(&str, &str)]) -> Result<String> {
        let id: String = self.conn().xadd(stream, "*", fields).await?;
        Ok(id)
    }

    /// Append with an approximate `MAXLEN ~` cap, for the bounded-length
    /// ingestion stream (spec §4.4's producer-side truncation).
    pub async fn xadd_message_capped(
        &self,
        stream: &str,
        max_len: usize,
        fields: &[(&str, &str)],
    ) -> Result<String> {
        let id: String = self
            .conn()
            .xadd_maxlen(
                stream,
                redis::streams::StreamMaxlen::Approx(max_len),
                "*",
                fields,
            )
            .await?;
        Ok(id)
    }

    pub async fn xgroup_create_mkstream(&self, stream: &str, group: &str) -> Result<()> {
        let res: redis::RedisResult<()> = self
            .conn()
            .xgroup_create_mkstream(stream, group, "0")
            .await;
        match res {
            Ok(()) => Ok(()),
            // BUSYGROUP: group already exists, not an error for our purposes.
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let _: () = self.conn().xack(stream, group, &[id]).await?;
        Ok(())
    }

    pub async fn publish_raw(&self, channel: &str, payload: &str) -> Result<()> {
        let _: () = self.conn().publish(channel, payload).await?;
        Ok(())
    }

    /// Read new entries for `consumer` in `group`, blocking up to
    /// `block_ms` (spec §5: stream read blocks <= 5s).
    pub async fn xreadgroup_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<StreamEntry>> {
        use redis::streams::StreamReadOptions;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);
        let reply: redis::streams::StreamReadReply =
            self.conn().xread_options(&[stream], &[">"], &opts).await?;
        Ok(flatten_stream_reply(reply))
    }

    /// Reclaim entries idle for longer than `min_idle_ms`, for redelivery
    /// after a crashed consumer (spec §5 cancellation/redelivery guarantee).
    pub async fn xautoclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: usize,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let reply: redis::streams::StreamAutoClaimReply = self
            .conn()
            .xautoclaim_options(
                stream,
                group,
                consumer,
                min_idle_ms,
                "0-0",
                redis::streams::StreamAutoClaimOptions::default().count(count),
            )
            .await?;
        Ok(reply
            .claimed
            .into_iter()
            .map(|id| StreamEntry {
                id: id.id,
                fields: id
                    .map
                    .into_iter()
                    .filter_map(|(k, v)| field_to_string(v).map(|s| (k, s)))
                    .collect(),
            })
            .collect())
    }
}

/// One ingestion-stream entry: its stream ID plus flattened field/value pairs.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

fn flatten_stream_reply(reply: redis::streams::StreamReadReply) -> Vec<StreamEntry> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|id| StreamEntry {
            id: id.id,
            fields: id
                .map
                .into_iter()
                .filter_map(|(k, v)| field_to_string(v).map(|s| (k, s)))
                .collect(),
        })
        .collect()
}

fn field_to_string(v: redis::Value) -> Option<String> {
    match v {
        redis::Value::BulkString(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        redis::Value::SimpleString(s) => Some(s),
        _ => None,
    }
}
