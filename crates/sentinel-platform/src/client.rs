use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::types::ChatEvent;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{PlatformError, Result};
use crate::types::{EntityInfo, SelfIdentity};

/// The chat-platform contract this system treats as an opaque external
/// collaborator (spec §6.2): connect/disconnect, identity, outbound send,
/// inbound event registration, and entity/avatar lookups. Nothing above
/// this trait knows or cares which concrete chat network backs it.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn get_me(&self) -> Result<SelfIdentity>;

    /// Send `text` to `target` (a chat ID or channel handle, stringified).
    /// `disable_link_preview` mirrors the one platform-specific knob the
    /// spec calls out explicitly.
    async fn send_message(&self, target: &str, text: &str, disable_link_preview: bool) -> Result<()>;

    async fn fetch_entity(&self, id: i64) -> Result<Option<EntityInfo>>;
    async fn fetch_profile_photo(&self, id: i64) -> Result<Option<Vec<u8>>>;

    /// Register the sink that inbound normalized events are pushed to once
    /// `connect` starts its ingestion loop. Registering a new sink replaces
    /// the previous one.
    async fn register_event_handler(&self, sink: mpsc::Sender<ChatEvent>);
}

/// Thin `reqwest`-based implementation of [`PlatformClient`] against a
/// generic long-poll bot-style HTTP API: `POST {base_url}/sendMessage`,
/// `GET {base_url}/getMe`, `GET {base_url}/getUpdates?offset=`. The exact
/// wire shape is a private concern of this adapter — nothing upstream
/// depends on it beyond the trait above.
pub struct HttpPlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sink: Arc<Mutex<Option<mpsc::Sender<ChatEvent>>>>,
}

impl HttpPlatformClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn connect(&self) -> Result<()> {
        // Verify credentials before handing control back to the lifecycle
        // controller, which gates everything else on this succeeding.
        self.get_me().await?;
        debug!(base_url = %self.base_url, "platform client connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.sink.lock().await = None;
        Ok(())
    }

    async fn get_me(&self) -> Result<SelfIdentity> {
        let resp: GetMeResponse = self
            .http
            .get(self.url("getMe"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(SelfIdentity {
            id: resp.id,
            username: resp.username,
            display_name: resp.first_name,
        })
    }

    async fn send_message(&self, target: &str, text: &str, disable_link_preview: bool) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": target,
            "text": text,
            "disable_web_page_preview": disable_link_preview,
        });
        self.http
            .post(self.url("sendMessage"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_entity(&self, id: i64) -> Result<Option<EntityInfo>> {
        let resp = self
            .http
            .get(self.url("getChat"))
            .query(&[("chat_id", id.to_string())])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let chat: ChatResponse = resp.error_for_status()?.json().await?;
        Ok(Some(EntityInfo {
            id: chat.id,
            name: chat.title.or(chat.username).unwrap_or_default(),
            is_channel: chat.chat_type.as_deref() == Some("channel"),
        }))
    }

    async fn fetch_profile_photo(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let resp = self
            .http
            .get(self.url("getUserProfilePhoto"))
            .query(&[("user_id", id.to_string())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    async fn register_event_handler(&self, sink: mpsc::Sender<ChatEvent>) {
        *self.sink.lock().await = Some(sink);
    }
}

impl HttpPlatformClient {
    /// Long-poll `getUpdates` and forward normalized events to the
    /// registered sink. Callers spawn this as its own task after `connect`;
    /// it returns only when the HTTP transport fails outright.
    pub async fn run_ingestion_loop(&self, mut offset: i64) -> Result<()> {
        loop {
            let updates: Vec<RawUpdate> = self
                .http
                .get(self.url("getUpdates"))
                .query(&[("offset", offset.to_string()), ("timeout", "30".to_string())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(event) = raw_update_to_event(&update) else {
                    continue;
                };
                let sink = self.sink.lock().await.clone();
                if let Some(sink) = sink {
                    if sink.send(event).await.is_err() {
                        warn!("ingestion sink closed, stopping platform poll loop");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct GetMeResponse {
    id: i64,
    username: Option<String>,
    first_name: String,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    id: i64,
    title: Option<String>,
    username: Option<String>,
    #[serde(rename = "type")]
    chat_type: Option<String>,
}

#[derive(serde::Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

#[derive(serde::Deserialize)]
struct RawMessage {
    message_id: i64,
    chat: ChatResponse,
    from: Option<RawUser>,
    text: Option<String>,
    date: i64,
}

#[derive(serde::Deserialize)]
struct RawUser {
    id: i64,
    first_name: String,
}

fn raw_update_to_event(update: &RawUpdate) -> Option<ChatEvent> {
    let msg = update.message.as_ref()?;
    let sender = msg.from.as_ref();
    Some(ChatEvent {
        chat_id: msg.chat.id,
        chat_title: msg.chat.title.clone().unwrap_or_default(),
        msg_id: msg.message_id,
        sender_id: sender.map(|u| u.id).unwrap_or_default(),
        sender_name: sender.map(|u| u.first_name.clone()).unwrap_or_default(),
        text: msg.text.clone().unwrap_or_default(),
        mentioned: false,
        reactions_count: 0,
        replies_count: 0,
        timestamp: chrono::DateTime::from_timestamp(msg.date, 0).unwrap_or_else(chrono::Utc::now),
        is_reply: false,
        reply_to_msg_id: None,
        has_media: false,
        media_type: sentinel_core::types::MediaKind::None,
        is_pinned: false,
        has_forward: false,
        forward_from: None,
        sender_is_admin: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_update_without_message_is_ignored() {
        let update = RawUpdate { update_id: 1, message: None };
        assert!(raw_update_to_event(&update).is_none());
    }

    #[test]
    fn raw_update_maps_core_fields() {
        let update = RawUpdate {
            update_id: 2,
            message: Some(RawMessage {
                message_id: 9,
                chat: ChatResponse { id: -100, title: Some("ops".into()), username: None, chat_type: Some("group".into()) },
                from: Some(RawUser { id: 42, first_name: "alice".into() }),
                text: Some("hello".into()),
                date: 1_700_000_000,
            }),
        };
        let event = raw_update_to_event(&update).unwrap();
        assert_eq!(event.chat_id, -100);
        assert_eq!(event.msg_id, 9);
        assert_eq!(event.sender_id, 42);
        assert_eq!(event.text, "hello");
    }
}
