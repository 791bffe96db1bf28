use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application error mapping to HTTP status codes and the `{ok:false}`
/// envelope. The string payloads are the machine-readable wire codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(&'static str),
    #[error("authentication required")]
    Unauthorized,
    #[error("admin privileges required")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("expired: {0}")]
    Expired(&'static str),
    #[error("rate limited, retry in {wait_ms} ms")]
    RateLimited { wait_ms: i64 },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(code) => (StatusCode::BAD_REQUEST, *code),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "ADMIN_REQUIRED"),
            ApiError::NotFound(code) => (StatusCode::NOT_FOUND, *code),
            ApiError::Conflict(code) => (StatusCode::CONFLICT, *code),
            ApiError::Expired(code) => (StatusCode::GONE, *code),
            ApiError::RateLimited { wait_ms } => {
                let body = json!({ "ok": false, "error": "RATE_LIMITED", "waitMs": wait_ms });
                return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            }
            ApiError::Storage(e) => {
                // Internal detail goes to the log, never the wire.
                error!("storage error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE")
            }
        };

        (status, Json(json!({ "ok": false, "error": code }))).into_response()
    }
}
