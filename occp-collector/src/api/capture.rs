//! Capture intake
//!
//! A relay (browser hook, proxy, devtools bridge) posts each completed host
//! response here. The exchange is handed to the interceptor and the call
//! returns before extraction runs.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;

/// POST /api/capture body
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    /// Request URL of the observed exchange
    pub url: String,
    /// Response status, when the relay knows it
    #[serde(default)]
    pub status: Option<u16>,
    /// Raw response text
    pub body: String,
}

/// POST /api/capture response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureResponse {
    /// Whether the exchange was selected for inspection
    pub matched: bool,
}

/// Capture routes; request bodies over `max_body` bytes are refused with 413
pub fn capture_routes(max_body: usize) -> Router<AppState> {
    Router::new()
        .route("/api/capture", post(capture))
        .layer(DefaultBodyLimit::max(max_body))
}

/// POST /api/capture
pub async fn capture(
    State(state): State<AppState>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CaptureResponse>)> {
    let Json(request) = payload?;

    let matched = state
        .interceptor
        .observe(&request.url, request.status, Bytes::from(request.body));

    Ok((StatusCode::ACCEPTED, Json(CaptureResponse { matched })))
}
