//! Integration tests for occp-collector API endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Status shape and control commands (toggle, reset)
//! - Tagged control messages
//! - Capture intake and its body limit
//! - Interceptor layered onto a host router
//! - Control panel page

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Json, Router,
};
use http_body_util::BodyExt;
use helpers::{load_fixture, test_config, tweet, wait_until, MockSink};
use occp_collector::collector::{IngestionSink, StateStore};
use occp_collector::{build_router, start_pipeline, Pipeline};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: pipeline on an in-memory store, flush timer far away
async fn setup_pipeline() -> (Pipeline, StateStore) {
    let store = StateStore::in_memory().await.unwrap();
    let sink: Arc<dyn IngestionSink> = MockSink::new();
    let pipeline = start_pipeline(&test_config(50, 3_600_000), sink, Some(store.clone()))
        .await
        .unwrap();
    (pipeline, store)
}

/// Test helper: in-memory pipeline with a small capture body limit
async fn setup_limited_pipeline(max_body_bytes: usize) -> Pipeline {
    let mut config = test_config(50, 3_600_000);
    config.max_body_bytes = max_body_bytes;
    let sink: Arc<dyn IngestionSink> = MockSink::new();
    start_pipeline(&config, sink, None).await.unwrap()
}

fn setup_app(pipeline: &Pipeline) -> axum::Router {
    build_router(pipeline.app_state())
}

/// Test helper: Create request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request with JSON body
fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "occp-collector");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_health_degraded_after_shutdown() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);
    pipeline.collector.shutdown().await.unwrap();

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "degraded");
}

// =============================================================================
// Status and control
// =============================================================================

#[tokio::test]
async fn test_status_shape_on_first_run() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app.oneshot(test_request("GET", "/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["queueSize"], 0);
    assert_eq!(body["flushInFlight"], false);
    assert_eq!(body["queueState"], "idle");
    assert_eq!(body["lastSync"], "never");
    assert_eq!(body["stats"]["tweetsCollected"], 0);
    assert_eq!(body["stats"]["tweetsSent"], 0);
    assert_eq!(body["stats"]["tweetsDropped"], 0);
    assert!(body["stats"]["lastSentAt"].is_null());
}

#[tokio::test]
async fn test_toggle_persists_enabled_flag() {
    let (pipeline, store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app
        .clone()
        .oneshot(json_request("/api/toggle", json!({ "enabled": false })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["queueState"], "paused");
    assert!(!store.load().await.unwrap().enabled);

    let response = app
        .oneshot(json_request("/api/toggle", json!({ "enabled": true })))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enabled"], true);
    assert!(store.load().await.unwrap().enabled);
}

#[tokio::test]
async fn test_toggle_rejects_malformed_body() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app
        .oneshot(json_request("/api/toggle", json!({ "enabled": "yes" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_reset_zeroes_counters_keeps_queue() {
    let (pipeline, store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    pipeline
        .collector
        .submit_tweets(vec![tweet("1"), tweet("2")])
        .await
        .unwrap();

    let response = app.oneshot(test_request("POST", "/api/reset")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["stats"]["tweetsCollected"], 0);
    assert_eq!(body["queueSize"], 2);
    assert_eq!(body["enabled"], true);
    assert_eq!(store.load().await.unwrap().stats.tweets_collected, 0);
}

// =============================================================================
// Control messages
// =============================================================================

#[tokio::test]
async fn test_message_tweets_captured_filters_non_viable() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let mut anonymous = tweet("3");
    anonymous.author.username.clear();
    let message = json!({
        "type": "tweets_captured",
        "tweets": [tweet("1"), tweet("2"), anonymous],
    });

    let response = app.oneshot(json_request("/api/messages", message)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["stats"]["tweetsCollected"], 2);
    assert_eq!(body["queueSize"], 2);
}

#[tokio::test]
async fn test_message_accepts_sparse_records() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    // Relays may send only the fields they could read
    let message = json!({
        "type": "tweets_captured",
        "tweets": [{ "id": "1", "text": "hi", "author": { "id": "9", "username": "alice" } }],
    });

    let response = app.oneshot(json_request("/api/messages", message)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["stats"]["tweetsCollected"], 1);
    assert_eq!(body["queueSize"], 1);
}

#[tokio::test]
async fn test_message_control_variants() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app
        .clone()
        .oneshot(json_request("/api/messages", json!({ "type": "toggle_enabled", "enabled": false })))
        .await
        .unwrap();
    assert_eq!(extract_json(response.into_body()).await["enabled"], false);

    let response = app
        .clone()
        .oneshot(json_request("/api/messages", json!({ "type": "get_status" })))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["queueState"], "paused");

    let response = app
        .oneshot(json_request("/api/messages", json!({ "type": "reset_stats" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["enabled"], false);
}

#[tokio::test]
async fn test_message_unknown_type_rejected() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app
        .oneshot(json_request("/api/messages", json!({ "type": "sync_now" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Capture intake
// =============================================================================

#[tokio::test]
async fn test_capture_matching_exchange() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let capture = json!({
        "url": "https://x.com/i/api/graphql/abc123/HomeTimeline?variables=%7B%7D",
        "status": 200,
        "body": load_fixture("home_timeline.json").to_string(),
    });
    let response = app.oneshot(json_request("/api/capture", capture)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(extract_json(response.into_body()).await["matched"], true);

    let collected = wait_until(Duration::from_secs(2), || async {
        pipeline.collector.status().await.unwrap().stats.tweets_collected == 2
    })
    .await;
    assert!(collected);
}

#[tokio::test]
async fn test_capture_ignores_unselected_exchanges() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);
    let body = load_fixture("home_timeline.json").to_string();

    let unrelated = json!({ "url": "https://x.com/i/api/1.1/jot/client_event.json", "body": body });
    let response = app.clone().oneshot(json_request("/api/capture", unrelated)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(extract_json(response.into_body()).await["matched"], false);

    let failed = json!({
        "url": "https://x.com/i/api/graphql/abc123/HomeTimeline",
        "status": 429,
        "body": body,
    });
    let response = app.oneshot(json_request("/api/capture", failed)).await.unwrap();
    assert_eq!(extract_json(response.into_body()).await["matched"], false);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.collector.status().await.unwrap().stats.tweets_collected, 0);
}

#[tokio::test]
async fn test_capture_requires_body_field() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app
        .oneshot(json_request("/api/capture", json!({ "url": "https://x.com/home" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_capture_over_body_limit_rejected() {
    let pipeline = setup_limited_pipeline(1024).await;
    let app = setup_app(&pipeline);

    let capture = json!({
        "url": "https://x.com/i/api/graphql/abc123/HomeTimeline",
        "status": 200,
        "body": "x".repeat(4096),
    });
    let response = app.oneshot(json_request("/api/capture", capture)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_capture_under_body_limit_accepted() {
    let pipeline = setup_limited_pipeline(1024).await;
    let app = setup_app(&pipeline);

    let capture = json!({ "url": "https://x.com/home", "body": "{}" });
    let response = app.oneshot(json_request("/api/capture", capture)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

// =============================================================================
// Layered host router
// =============================================================================

#[tokio::test]
async fn test_layered_router_feeds_collector() {
    let (pipeline, _store) = setup_pipeline().await;
    let timeline = load_fixture("home_timeline.json");
    let host = Router::new()
        .route(
            "/i/api/graphql/abc123/HomeTimeline",
            get(move || {
                let timeline = timeline.clone();
                async move { Json(timeline) }
            }),
        )
        .layer(pipeline.interceptor.layer());

    let response = host
        .oneshot(test_request("GET", "/i/api/graphql/abc123/HomeTimeline"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Caller still gets the full payload
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let served: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(served, load_fixture("home_timeline.json"));

    let collected = wait_until(Duration::from_secs(2), || async {
        pipeline.collector.status().await.unwrap().stats.tweets_collected == 2
    })
    .await;
    assert!(collected, "layered timeline was not collected");
}

// =============================================================================
// Panel
// =============================================================================

#[tokio::test]
async fn test_panel_page_served() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app.oneshot(test_request("GET", "/panel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/status"));
    assert!(html.contains("/api/toggle"));
}

#[tokio::test]
async fn test_root_redirects_to_panel() {
    let (pipeline, _store) = setup_pipeline().await;
    let app = setup_app(&pipeline);

    let response = app.oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/panel");
}
