//! Error types for occp-collector

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Failure of one batch delivery. Every variant means "requeue and retry".
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connection, TLS or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-2xx status
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response without a readable `tweets_added`
    #[error("Undecodable backend response: {0}")]
    Decode(String),
}

/// Collector task unreachable
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector task has stopped")]
    Stopped,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Collector unavailable (503)
    #[error("Collector unavailable: {0}")]
    Unavailable(#[from] CollectorError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let message = rejection.body_text();
        warn!(status = status.as_u16(), "Request body rejected: {}", message);

        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(message)
        } else {
            ApiError::BadRequest(message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Unavailable(ref err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "COLLECTOR_UNAVAILABLE",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
