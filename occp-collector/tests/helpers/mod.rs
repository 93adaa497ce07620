//! Shared test helpers: scripted ingestion sink, config builder, fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use occp_collector::collector::IngestionSink;
use occp_collector::config::{CliOverrides, CollectorConfig, TomlConfig};
use occp_collector::error::DeliveryError;
use occp_common::{CapturedAuthor, CapturedTweet};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock backend answers one submit
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// 2xx with `tweets_added` = batch length
    Accept,
    /// 2xx with the given `tweets_added`
    Added(u64),
    /// Transport failure
    Fail,
    /// Never answers
    Hang,
}

/// Ingestion sink recording every attempted batch
#[derive(Default)]
pub struct MockSink {
    attempts: Mutex<Vec<Vec<CapturedTweet>>>,
    script: Mutex<VecDeque<Reply>>,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replies used in order; once exhausted every submit is accepted
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        let sink = Self::default();
        sink.script.lock().unwrap().extend(replies);
        Arc::new(sink)
    }

    pub fn attempts(&self) -> Vec<Vec<CapturedTweet>> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_ids(&self) -> Vec<Vec<String>> {
        self.attempts()
            .iter()
            .map(|batch| batch.iter().map(|t| t.id.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl IngestionSink for MockSink {
    async fn submit(&self, tweets: &[CapturedTweet]) -> Result<u64, DeliveryError> {
        self.attempts.lock().unwrap().push(tweets.to_vec());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Accept);

        match reply {
            Reply::Accept => Ok(tweets.len() as u64),
            Reply::Added(n) => Ok(n),
            Reply::Fail => Err(DeliveryError::Transport("connection refused".to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Config with test batching parameters; root folder never touched
pub fn test_config(batch_size: usize, flush_interval_ms: u64) -> CollectorConfig {
    let toml = TomlConfig {
        batch_size: Some(batch_size),
        flush_interval_ms: Some(flush_interval_ms),
        ..Default::default()
    };
    let cli = CliOverrides {
        root_folder: Some(PathBuf::from("/tmp/occp-collector-tests")),
        ..Default::default()
    };
    CollectorConfig::resolve(toml, cli).unwrap()
}

/// Minimal viable tweet
pub fn tweet(id: &str) -> CapturedTweet {
    CapturedTweet {
        id: id.to_string(),
        text: format!("tweet {}", id),
        conversation_id: id.to_string(),
        author: CapturedAuthor {
            id: "1".to_string(),
            username: "tester".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn tweets(ids: std::ops::Range<u32>) -> Vec<CapturedTweet> {
    ids.map(|i| tweet(&i.to_string())).collect()
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Poll `check` until it holds or `limit` passes
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
