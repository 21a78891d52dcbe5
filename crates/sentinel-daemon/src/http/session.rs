use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::Multipart;
use serde::Serialize;
use tracing::info;

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Serialize)]
pub struct SessionResponse {
    generation: u64,
    identity: String,
}

/// Accept a multipart-uploaded session file, write it to the configured
/// session path, and hand off to `sentinel_lifecycle::session::import_session`
/// (spec §4.9). The first `session` field found in the multipart body wins;
/// any other fields are ignored.
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        if field.name() == Some("session") {
            bytes = Some(field.bytes().await.map_err(|e| ApiError::bad_request(e.to_string()))?);
            break;
        }
    }
    let Some(bytes) = bytes else {
        return Err(ApiError::bad_request("multipart body missing a 'session' field"));
    };

    let session_path = state.cfg().tg_session_path.clone();
    tokio::fs::write(&session_path, &bytes)
        .await
        .map_err(sentinel_core::SentinelError::Io)?;

    let identity = sentinel_lifecycle::session::import_session(
        &session_path,
        &state.signals,
        &state.coord,
        state.platform.as_ref(),
    )
    .await
    .map_err(sentinel_core::SentinelError::from)?;

    let generation = state.signals.generation();
    info!(generation, identity = %identity.display_name, "session imported");
    Ok(Json(SessionResponse { generation, identity: identity.display_name }))
}

/// Tear down the active session (spec §4.9). The uploaded session file is
/// intentionally left on disk — this endpoint only clears in-process and
/// coordination-store state, matching `sentinel_lifecycle::session::logout`'s
/// own scope.
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Result<Json<SessionResponse>, ApiError> {
    let generation = state.signals.generation();
    sentinel_lifecycle::session::logout(generation, &state.signals, &state.coord, state.platform.as_ref())
        .await
        .map_err(sentinel_core::SentinelError::from)?;

    Ok(Json(SessionResponse { generation, identity: String::new() }))
}
