use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use sentinel_store::{Feedback, SemanticType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub chat_id: i64,
    pub msg_id: i64,
    pub label: i32,
    #[serde(default)]
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub profile_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    recorded: bool,
    recompute_scheduled: usize,
}

/// Accept one feedback event (spec §4.7): records it, fans out to
/// `feedback_profiles`, and schedules semantic profiles among
/// `profile_ids` for batched centroid recomputation. Keyword profiles are
/// picked up by the auto-tuner's periodic sweep instead — they have no
/// centroid to invalidate.
pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    if req.label != 0 && req.label != 1 {
        return Err(ApiError::bad_request("label must be 0 or 1"));
    }

    let fb = Feedback {
        chat_id: req.chat_id,
        msg_id: req.msg_id,
        label: req.label,
        semantic_type: req.semantic_type,
        created_at: Utc::now().to_rfc3339(),
    };

    let store = state.store.clone();
    let profile_ids = req.profile_ids.clone();
    tokio::task::spawn_blocking(move || store.insert_feedback(&fb, &profile_ids))
        .await
        .map_err(|e| sentinel_core::SentinelError::Internal(e.to_string()))?
        .map_err(|e| sentinel_core::SentinelError::Database(e.to_string()))?;

    let cfg = state.cfg();
    let mut recompute_scheduled = 0;
    for profile_id in &req.profile_ids {
        let is_semantic = cfg.global_profiles.get(profile_id).map(|p| p.is_semantic()).unwrap_or(false);
        if is_semantic {
            state
                .batch
                .schedule_recompute(profile_id)
                .await
                .map_err(sentinel_core::SentinelError::from)?;
            recompute_scheduled += 1;
        }
    }

    info!(chat_id = req.chat_id, msg_id = req.msg_id, label = req.label, "feedback recorded");
    Ok(Json(FeedbackResponse { recorded: true, recompute_scheduled }))
}
