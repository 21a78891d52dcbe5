use sentinel_coord::CoordStore;
use sentinel_lifecycle::LifecycleSignals;
use sentinel_platform::PlatformClient;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long `pop_auth_request` blocks per round. Spec §5: "auth requests
/// wait <= 90s" for the admin boundary's request/response handshake.
const POP_TIMEOUT_SECS: f64 = 90.0;

/// One `{action, request_id, ...}` message the admin HTTP boundary pushes
/// onto `auth_queue` (spec §6.4). `session_path` is only meaningful for
/// `import_session`; other actions ignore it.
#[derive(Debug, Deserialize)]
struct AuthRequest {
    request_id: String,
    action: String,
    #[serde(default)]
    session_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    request_id: String,
    ok: bool,
    message: String,
    generation: u64,
    authorized: bool,
}

/// Drain `auth_queue` forever, performing the requested lifecycle action
/// and writing the outcome to `auth_responses` keyed by `request_id`
/// (spec §6.4's queue-passthrough contract for the out-of-scope admin UI).
pub async fn run(
    coord: CoordStore,
    signals: LifecycleSignals,
    platform: std::sync::Arc<dyn PlatformClient>,
    default_session_path: String,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            info!("auth queue processor shutting down");
            return;
        }

        let popped = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = coord.pop_auth_request::<AuthRequest>(POP_TIMEOUT_SECS) => result,
        };

        let request = match popped {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "failed to pop auth request, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                continue;
            }
        };

        let response = handle(&request, &coord, &signals, platform.as_ref(), &default_session_path).await;
        if let Err(e) = coord.set_auth_response(&request.request_id, &response).await {
            error!(request_id = %request.request_id, error = %e, "failed to publish auth response");
        }
    }
}

async fn handle(
    request: &AuthRequest,
    coord: &CoordStore,
    signals: &LifecycleSignals,
    platform: &dyn PlatformClient,
    default_session_path: &str,
) -> AuthResponse {
    let result = match request.action.as_str() {
        "import_session" => {
            let path = request.session_path.as_deref().unwrap_or(default_session_path);
            sentinel_lifecycle::session::import_session(path, signals, coord, platform)
                .await
                .map(|identity| format!("imported session for {}", identity.display_name))
        }
        "logout" => {
            let generation = signals.generation();
            sentinel_lifecycle::session::logout(generation, signals, coord, platform)
                .await
                .map(|_| "logged out".to_string())
        }
        "status" => Ok("status ok".to_string()),
        other => {
            warn!(action = other, "unknown auth queue action");
            Err(sentinel_lifecycle::LifecycleError::InvalidSession(format!("unknown action '{other}'")))
        }
    };

    match result {
        Ok(message) => AuthResponse {
            request_id: request.request_id.clone(),
            ok: true,
            message,
            generation: signals.generation(),
            authorized: signals.is_authorized(),
        },
        Err(e) => AuthResponse {
            request_id: request.request_id.clone(),
            ok: false,
            message: e.to_string(),
            generation: signals.generation(),
            authorized: signals.is_authorized(),
        },
    }
}
