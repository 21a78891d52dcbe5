use std::sync::Arc;

use sentinel_core::config::AppCfg;
use sentinel_coord::CoordStore;
use sentinel_lifecycle::LifecycleSignals;
use sentinel_platform::PlatformClient;
use sentinel_semantic::SemanticEvaluator;
use sentinel_store::StoreManager;
use sentinel_worker::BatchFeedbackProcessor;
use tokio::sync::watch;

/// Everything an HTTP handler or background task needs, shared as one
/// `Arc<AppState>` — the daemon's narrowed admin boundary (spec §6.4) plus
/// the collaborators its own supervisor loops drive directly.
pub struct AppState {
    /// Live config snapshot; `watch::Sender` so the config-reload task can
    /// publish a new `Arc<AppCfg>` without handlers needing to reload it
    /// themselves (spec §4.1 hot-reload).
    pub cfg: watch::Sender<Arc<AppCfg>>,
    pub config_path: String,
    pub coord: CoordStore,
    pub store: Arc<StoreManager>,
    pub semantic: Arc<SemanticEvaluator>,
    pub platform: Arc<dyn PlatformClient>,
    pub signals: LifecycleSignals,
    pub batch: Arc<BatchFeedbackProcessor>,
}

impl AppState {
    pub fn cfg(&self) -> Arc<AppCfg> {
        self.cfg.borrow().clone()
    }

    pub fn cfg_rx(&self) -> watch::Receiver<Arc<AppCfg>> {
        self.cfg.subscribe()
    }
}

/// Assemble the admin HTTP router: health, feedback ingestion, session
/// import/logout. Nothing else is in scope — the full admin UI is an
/// external collaborator per spec §1.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/feedback", post(crate::http::feedback::feedback_handler))
        .route("/session/import", post(crate::http::session::import_handler))
        .route("/session/logout", post(crate::http::session::logout_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
