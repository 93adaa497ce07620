//! Bridge between interception and the collector task
//!
//! One-way and fire-and-forget: the interception side never awaits the
//! collector. A full or closed channel drops the batch with a warning;
//! nothing is acknowledged and nothing is retried here.

use occp_common::CapturedTweet;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

/// One inspected response worth of extracted tweets
#[derive(Debug, Clone, PartialEq)]
pub struct TweetBatch {
    /// URL of the response the batch came from (for logs)
    pub source: String,
    pub tweets: Vec<CapturedTweet>,
}

/// Sending half, cloned into every interception surface
#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: mpsc::Sender<TweetBatch>,
}

pub type BridgeReceiver = mpsc::Receiver<TweetBatch>;

/// Create a bridge holding at most `capacity` undelivered batches
pub fn bridge_channel(capacity: usize) -> (BridgeSender, BridgeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BridgeSender { tx }, rx)
}

impl BridgeSender {
    /// Hand a batch to the collector without waiting.
    ///
    /// Returns `true` when the batch was enqueued. Empty batches are not sent.
    pub fn send(&self, source: &str, tweets: Vec<CapturedTweet>) -> bool {
        if tweets.is_empty() {
            return false;
        }

        let count = tweets.len();
        let batch = TweetBatch {
            source: source.to_string(),
            tweets,
        };

        match self.tx.try_send(batch) {
            Ok(()) => {
                trace!(count, url = %source, "Bridge: batch handed off");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(count, url = %source, "Bridge: channel full, dropping batch");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(count, url = %source, "Bridge: collector gone, dropping batch");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
