use serde::{Deserialize, Serialize};

/// Identity reported by `get_me` (spec §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub display_name: String,
}

/// Minimal entity lookup result — enough for the worker/digest formatter to
/// resolve a chat title or a sender's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: i64,
    pub name: String,
    pub is_channel: bool,
}
