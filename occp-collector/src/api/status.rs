//! Status surface and control commands
//!
//! Every endpoint answers with the current [`CollectorStatus`].

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use occp_common::CapturedTweet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collector::CollectorStatus;
use crate::error::ApiResult;
use crate::AppState;

/// Tagged control message, as posted by the panel or a relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    TweetsCaptured { tweets: Vec<CapturedTweet> },
    GetStatus,
    ToggleEnabled { enabled: bool },
    ResetStats,
}

/// POST /api/toggle body
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// Build status and control routes
pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/toggle", post(toggle))
        .route("/api/reset", post(reset))
        .route("/api/messages", post(message))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<CollectorStatus>> {
    Ok(Json(state.collector.status().await?))
}

/// POST /api/toggle
pub async fn toggle(
    State(state): State<AppState>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<Json<CollectorStatus>> {
    let Json(request) = payload?;
    Ok(Json(state.collector.set_enabled(request.enabled).await?))
}

/// POST /api/reset
pub async fn reset(State(state): State<AppState>) -> ApiResult<Json<CollectorStatus>> {
    Ok(Json(state.collector.reset_stats().await?))
}

/// POST /api/messages
pub async fn message(
    State(state): State<AppState>,
    payload: Result<Json<ControlMessage>, JsonRejection>,
) -> ApiResult<Json<CollectorStatus>> {
    let Json(message) = payload?;

    let status = match message {
        ControlMessage::TweetsCaptured { tweets } => {
            let total = tweets.len();
            let viable: Vec<CapturedTweet> =
                tweets.into_iter().filter(CapturedTweet::is_viable).collect();
            if viable.len() < total {
                debug!(rejected = total - viable.len(), "Dropped non-viable posted tweets");
            }
            state.collector.submit_tweets(viable).await?
        }
        ControlMessage::GetStatus => state.collector.status().await?,
        ControlMessage::ToggleEnabled { enabled } => state.collector.set_enabled(enabled).await?,
        ControlMessage::ResetStats => state.collector.reset_stats().await?,
    };

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_tags() {
        let msg: ControlMessage = serde_json::from_value(json!({"type": "get_status"})).unwrap();
        assert_eq!(msg, ControlMessage::GetStatus);

        let msg: ControlMessage =
            serde_json::from_value(json!({"type": "toggle_enabled", "enabled": false})).unwrap();
        assert_eq!(msg, ControlMessage::ToggleEnabled { enabled: false });

        let msg: ControlMessage =
            serde_json::from_value(json!({"type": "tweets_captured", "tweets": []})).unwrap();
        assert_eq!(msg, ControlMessage::TweetsCaptured { tweets: vec![] });
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(serde_json::from_value::<ControlMessage>(json!({"type": "flush_now"})).is_err());
    }
}
