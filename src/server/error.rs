//! HTTP error surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// Errors a REST handler can surface directly.
///
/// Business rejections are not here: the exchange accepted those requests
/// and answers 200 with a reject payload. These are protocol, auth, and
/// capacity failures.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or unknown API key
    Unauthorized,
    /// Malformed request content
    BadRequest(String),
    /// Queues or the pending table are saturated
    Overloaded,
    /// The pending-request deadline expired
    Timeout(Uuid),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid or missing API key" })),
            )
                .into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Overloaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "OVERLOAD" })),
            )
                .into_response(),
            ApiError::Timeout(request_id) => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({
                    "error": "request timed out",
                    "request_id": request_id,
                })),
            )
                .into_response(),
        }
    }
}
