use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sentinel_core::config::{db_path_from_uri, AppCfg};
use sentinel_coord::CoordStore;
use sentinel_lifecycle::LifecycleSignals;
use sentinel_platform::HttpPlatformClient;
use sentinel_semantic::{NoopEmbeddingBackend, SemanticEvaluator};
use sentinel_store::StoreManager;
use sentinel_worker::{AutoTuner, BatchFeedbackProcessor};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod auth_queue;
mod config_watch;
mod http;
mod lifecycle;
mod retention;
mod tuning;
mod worker_status;

/// `sentineld`: the long-running process that ties every component (C1-C9)
/// together — ingestion, scoring, persistence, digests, and the narrow
/// admin HTTP boundary.
#[derive(Parser, Debug)]
#[command(name = "sentineld")]
struct Cli {
    /// Path to the declarative YAML config document.
    #[arg(long, env = "CONFIG_PATH", default_value = "tgsentinel.yml")]
    config: String,

    /// Address the admin HTTP boundary binds to.
    #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0:8080")]
    http_bind: SocketAddr,

    /// Scheduler state file for the digest engine (spec §4.8).
    #[arg(long, env = "DIGEST_STATE_PATH", default_value = "digest_state.json")]
    digest_state_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppCfg::load(&cli.config)?;
    init_tracing(&cfg.log_level);
    info!(config = %cli.config, git_sha = env!("SENTINEL_GIT_SHA"), "starting sentineld");

    if let Some(warnings) = validate(&cfg) {
        for w in warnings {
            warn!("{w}");
        }
    }

    let redis_url = format!("redis://{}:{}", cfg.redis_host, cfg.redis_port);
    let coord = CoordStore::connect(&redis_url).await?;
    info!(redis_host = %cfg.redis_host, redis_port = cfg.redis_port, "connected to coordination store");

    let db_path = db_path_from_uri(&cfg.db_uri).to_string();
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = rusqlite::Connection::open(&db_path)?;
    let store = Arc::new(StoreManager::new(conn)?);
    info!(db_path = %db_path, "persistence layer ready");

    let embedding_backend = Arc::new(NoopEmbeddingBackend);
    if cfg.embeddings_model.is_none() {
        info!("EMBEDDINGS_MODEL unset, semantic scoring degrades to keyword-only");
    }
    let semantic = Arc::new(SemanticEvaluator::new(embedding_backend, store.clone()));

    let admin_token = cfg.admin_token.clone();
    let platform: Arc<dyn sentinel_platform::PlatformClient> =
        Arc::new(HttpPlatformClient::new(redis_url_to_bot_base(&cfg), admin_token.unwrap_or_default()));

    let (cfg_tx, _cfg_rx) = watch::channel(Arc::new(cfg));
    let signals = LifecycleSignals::new();
    let batch = Arc::new(BatchFeedbackProcessor::new(coord.clone(), semantic.clone()).await?);
    let tuner = Arc::new(AutoTuner::new(store.clone(), cli.config.clone()));

    let state = Arc::new(app::AppState {
        cfg: cfg_tx.clone(),
        config_path: cli.config.clone(),
        coord: coord.clone(),
        store: store.clone(),
        semantic: semantic.clone(),
        platform: platform.clone(),
        signals: signals.clone(),
        batch: batch.clone(),
    });

    let shutdown = CancellationToken::new();

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(config_watch::run(coord.clone(), cli.config.clone(), cfg_tx.clone(), shutdown.clone())));
    tasks.push(tokio::spawn(lifecycle::run(
        cfg_tx.subscribe(),
        coord.clone(),
        store.clone(),
        semantic.clone(),
        platform.clone(),
        signals.clone(),
        cli.digest_state_path.clone(),
        shutdown.clone(),
    )));
    tasks.push(tokio::spawn(retention::run(cfg_tx.subscribe(), store.clone(), shutdown.clone())));
    tasks.push(tokio::spawn(tuning::run(cfg_tx.subscribe(), tuner, shutdown.clone())));
    tasks.push(tokio::spawn(worker_status::run(coord.clone(), signals.clone(), shutdown.clone())));
    tasks.push(tokio::spawn(auth_queue::run(
        coord.clone(),
        signals.clone(),
        platform.clone(),
        state.cfg().tg_session_path.clone(),
        shutdown.clone(),
    )));
    {
        let batch = batch.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = batch.run().await {
                tracing::error!(error = %e, "batch feedback processor exited");
            }
        }));
    }

    let router = app::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(cli.http_bind).await?;
    info!(addr = %cli.http_bind, "admin HTTP boundary listening");

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sentinel={log_level},tower_http=info").into()),
        )
        .init();
}

fn validate(cfg: &AppCfg) -> Option<Vec<String>> {
    let warnings = sentinel_profiles::validate_profiles(&cfg.global_profiles, &cfg.channels, &cfg.monitored_users);
    if warnings.is_empty() {
        None
    } else {
        Some(warnings)
    }
}

/// The `HttpPlatformClient` adapter expects a bot-style API base URL; this
/// isn't part of spec §6.5's env var list (the platform client is an
/// opaque external collaborator per spec §1), so it follows the same
/// "read the env var directly, sensible default" convention as the
/// retention knobs in `AppCfg`.
fn redis_url_to_bot_base(cfg: &AppCfg) -> String {
    let _ = cfg;
    std::env::var("PLATFORM_API_BASE").unwrap_or_else(|_| "https://api.telegram.org".to_string())
}
