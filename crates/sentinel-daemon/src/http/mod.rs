pub mod feedback;
pub mod health;
pub mod session;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Uniform error envelope for every handler. Maps the underlying
/// `SentinelError` code (or a handler-local reason) onto an HTTP status —
/// `is_transient()` errors surface as 503 so the operator's HTTP client
/// knows a retry is worth it, everything else as 400/404/500.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ApiErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiErrorBody { error: self.code, message: self.message })).into_response()
    }
}

impl From<sentinel_core::SentinelError> for ApiError {
    fn from(e: sentinel_core::SentinelError) -> Self {
        let status = if e.is_transient() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiError { status, code: e.code(), message: e.to_string() }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, code: "BAD_REQUEST", message: message.into() }
    }
}
