use serde::{Deserialize, Serialize};

/// Events published on `tgsentinel:session_updated` (spec §6.1/§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionAuthorized { generation: u64, identity: String },
    SessionImported { generation: u64 },
    SessionLogout,
}
