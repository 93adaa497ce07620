//! Batch delivery to the backend
//!
//! [`IngestionSink`] is the seam between the collector task and the
//! network. [`HttpIngestionClient`] is the production implementation:
//! `POST {backend_url}/api/crowdsource/tweets` with `{"tweets": [...]}`.

use crate::error::DeliveryError;
use async_trait::async_trait;
use occp_common::{CapturedTweet, Error, IngestRequest, IngestResponse, Result, INGEST_PATH};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// User-Agent header sent with every delivery
const USER_AGENT: &str = concat!("occp-collector/", env!("CARGO_PKG_VERSION"));

/// Longest backend error body kept for logs
const ERROR_BODY_LIMIT: usize = 256;

/// Destination of flushed batches
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Deliver one batch. `Ok` carries the backend's `tweets_added`.
    async fn submit(&self, tweets: &[CapturedTweet]) -> std::result::Result<u64, DeliveryError>;
}

/// HTTP client for the backend ingestion endpoint
#[derive(Debug, Clone)]
pub struct HttpIngestionClient {
    http_client: Client,
    endpoint: String,
}

impl HttpIngestionClient {
    /// `timeout` of `None` leaves requests unbounded
    pub fn new(backend_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: ingest_endpoint(backend_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Join the base URL and the ingestion path without doubling slashes
pub fn ingest_endpoint(backend_url: &str) -> String {
    format!("{}{}", backend_url.trim_end_matches('/'), INGEST_PATH)
}

#[async_trait]
impl IngestionSink for HttpIngestionClient {
    async fn submit(&self, tweets: &[CapturedTweet]) -> std::result::Result<u64, DeliveryError> {
        let request = IngestRequest {
            tweets: tweets.to_vec(),
        };

        debug!(batch = tweets.len(), endpoint = %self.endpoint, "Submitting batch");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, ERROR_BODY_LIMIT));
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: IngestResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Decode(e.to_string()))?;

        Ok(parsed.tweets_added)
    }
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    (0..=max).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0)
}
