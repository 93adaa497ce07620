//! occp-collector library interface
//!
//! Tweet collection pipeline:
//! observed traffic → [`interceptor`] → [`extractor`] → [`bridge`] →
//! [`collector`] → backend ingestion endpoint.
//!
//! The [`api`] module serves the status surface, control commands and
//! capture intake over HTTP.
//!
//! # Embedding the interceptor
//!
//! The binary feeds the interceptor through `POST /api/capture`. A host that
//! serves or proxies the timeline traffic itself can instead install
//! [`interceptor::InterceptLayer`] on its own router or client stack. Matching
//! responses are teed to the collector while the caller reads them:
//!
//! ```no_run
//! # async fn run(
//! #     config: occp_collector::config::CollectorConfig,
//! #     sink: std::sync::Arc<dyn occp_collector::collector::IngestionSink>,
//! #     upstream: axum::Router,
//! # ) -> occp_common::Result<()> {
//! let pipeline = occp_collector::start_pipeline(&config, sink, None).await?;
//! let proxied = upstream.layer(pipeline.interceptor.layer());
//! # let _ = proxied;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bridge;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod interceptor;
pub mod logging;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::bridge::bridge_channel;
use crate::collector::{
    spawn_collector, Collector, CollectorHandle, IngestionSink, PersistedState, ShutdownReport,
    StateStore,
};
use crate::config::CollectorConfig;
use crate::extractor::Extractor;
use crate::interceptor::{Interceptor, UrlMatcher};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Control handle on the collector task
    pub collector: CollectorHandle,
    /// Inspection path for the capture intake
    pub interceptor: Interceptor,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(collector: CollectorHandle, interceptor: Interceptor) -> Self {
        Self {
            collector,
            interceptor,
            startup_time: Utc::now(),
        }
    }
}

/// Running interceptor + collector pair
pub struct Pipeline {
    pub interceptor: Interceptor,
    pub collector: CollectorHandle,
    /// Resolves once the collector task has drained and stopped
    pub task: JoinHandle<ShutdownReport>,
}

/// Restore persisted state and start the collector task, wired to a fresh
/// interceptor through the bridge. Without a store the pipeline starts
/// enabled with zeroed counters and persists nothing.
pub async fn start_pipeline(
    config: &CollectorConfig,
    sink: Arc<dyn IngestionSink>,
    store: Option<StateStore>,
) -> occp_common::Result<Pipeline> {
    let restored = match &store {
        Some(store) => store.load().await?,
        None => PersistedState::default(),
    };
    let (bridge_tx, bridge_rx) = bridge_channel(config.bridge_capacity);

    let interceptor = Interceptor::new(
        UrlMatcher::new(config.url_patterns.iter().cloned()),
        Extractor::new(config.max_depth),
        bridge_tx,
    )
    .with_max_body(config.max_body_bytes);
    let (collector, task) = spawn_collector(
        Collector::new(config.collector, restored),
        sink,
        store,
        bridge_rx,
    );

    Ok(Pipeline {
        interceptor,
        collector,
        task,
    })
}

impl Pipeline {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.collector.clone(), self.interceptor.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let capture_limit = state.interceptor.max_body();
    Router::new()
        .merge(api::panel_routes())
        .merge(api::status_routes())
        .merge(api::capture_routes(capture_limit))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // The capture relay posts from the host page's origin
        .layer(CorsLayer::permissive())
}
