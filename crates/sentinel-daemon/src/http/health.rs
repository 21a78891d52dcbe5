use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
    authorized: bool,
    generation: u64,
    git_sha: &'static str,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        authorized: state.signals.is_authorized(),
        generation: state.signals.generation(),
        git_sha: env!("SENTINEL_GIT_SHA"),
    })
}
