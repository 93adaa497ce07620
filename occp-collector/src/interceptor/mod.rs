//! Traffic interception
//!
//! Observes completed HTTP exchanges of the host application, picks the
//! ones whose URL matches the timeline/search/detail allow-list, and runs
//! the [`Extractor`] over their JSON bodies. Extracted tweets go to the
//! collector through the [`BridgeSender`].
//!
//! Two surfaces feed the same inspection path:
//! - [`InterceptLayer`]: tower middleware around any HTTP service
//! - [`Interceptor::observe`]: one callback per completed exchange, used by
//!   the capture intake endpoint and HAR replay
//!
//! Inspection never fails the observed exchange. Bodies that are not JSON
//! are dropped with a trace log.

pub mod har;
pub mod layer;

pub use layer::{InterceptLayer, InterceptService};

use crate::bridge::BridgeSender;
use crate::extractor::Extractor;
use axum::body::Bytes;
use occp_common::CapturedTweet;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Path fragments of host endpoints that carry tweet payloads
pub const DEFAULT_URL_PATTERNS: &[&str] = &[
    "/HomeTimeline",
    "/HomeLatestTimeline",
    "/UserTweets",
    "/UserTweetsAndReplies",
    "/SearchTimeline",
    "/TweetDetail",
    "/ListLatestTweetsTimeline",
    "/graphql/",
];

/// Largest body kept for inspection; larger responses pass through unseen
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Substring allow-list over request URLs
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    patterns: Arc<[String]>,
}

impl Default for UrlMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_URL_PATTERNS.iter().copied())
    }
}

impl UrlMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        Self {
            patterns: patterns.into(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Shared inspection path for both interception surfaces
#[derive(Debug, Clone)]
pub struct Interceptor {
    matcher: UrlMatcher,
    extractor: Extractor,
    bridge: BridgeSender,
    max_body: usize,
}

impl Interceptor {
    pub fn new(matcher: UrlMatcher, extractor: Extractor, bridge: BridgeSender) -> Self {
        Self {
            matcher,
            extractor,
            bridge,
            max_body: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }

    pub fn matches(&self, url: &str) -> bool {
        self.matcher.matches(url)
    }

    /// Tower layer feeding this interceptor
    pub fn layer(&self) -> InterceptLayer {
        InterceptLayer::new(self.clone())
    }

    /// Event-based surface: report one completed exchange.
    ///
    /// Returns whether the exchange was selected for inspection. Parsing
    /// and extraction run on a spawned task, so this returns before any
    /// tweet reaches the collector. Must be called within a tokio runtime.
    pub fn observe(&self, url: &str, status: Option<u16>, body: Bytes) -> bool {
        if !self.selects(url, status) {
            return false;
        }

        let interceptor = self.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            interceptor.inspect(&url, &body);
        });
        true
    }

    /// Parse and extract one matching body, then hand the tweets to the
    /// bridge. Returns the number of tweets handed off.
    pub fn inspect(&self, url: &str, body: &[u8]) -> usize {
        let tweets = self.extract_body(url, body);
        let count = tweets.len();
        if self.bridge.send(url, tweets) {
            count
        } else {
            0
        }
    }

    /// Match, parse and extract without touching the bridge.
    ///
    /// Non-matching URLs and unparsable bodies yield an empty list.
    pub fn capture(&self, url: &str, status: Option<u16>, body: &[u8]) -> Vec<CapturedTweet> {
        if !self.selects(url, status) {
            return Vec::new();
        }
        self.extract_body(url, body)
    }

    /// Error responses never carry timeline data
    fn selects(&self, url: &str, status: Option<u16>) -> bool {
        let status_ok = status.map_or(true, |code| (200..300).contains(&code));
        status_ok && self.matcher.matches(url)
    }

    fn extract_body(&self, url: &str, body: &[u8]) -> Vec<CapturedTweet> {
        if body.is_empty() {
            trace!(url = %url, "Empty body, nothing to inspect");
            return Vec::new();
        }

        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                trace!(url = %url, error = %e, "Body is not JSON, skipping");
                return Vec::new();
            }
        };

        let tweets = self.extractor.extract(&payload);
        if !tweets.is_empty() {
            debug!(url = %url, count = tweets.len(), "Extracted tweets from response");
        }
        tweets
    }
}
