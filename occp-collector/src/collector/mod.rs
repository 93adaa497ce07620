//! Collector / batcher
//!
//! [`Collector`] is the owned state machine: queue, counters, enabled flag
//! and the single in-flight flush. It does no I/O and never awaits; the
//! task in [`task`] drives it, performs deliveries through an
//! [`IngestionSink`] and persists state through a [`StateStore`].
//!
//! # Flush protocol
//! 1. [`Collector::take_batch`] removes up to `batch_size` tweets from the
//!    front and marks a flush in flight.
//! 2. The task awaits delivery.
//! 3. [`Collector::complete_flush`] either counts the batch as sent or puts
//!    it back at the front in its original order.
//!
//! Intake arriving while a flush is in flight queues behind it.

pub mod sink;
pub mod state;
pub mod store;
pub mod task;

pub use sink::{HttpIngestionClient, IngestionSink};
pub use state::{CollectorStats, CollectorStatus, QueueState};
pub use store::{PersistedState, StateStore};
pub use task::{spawn_collector, CollectorHandle, ShutdownReport};

use crate::error::DeliveryError;
use chrono::{DateTime, Utc};
use occp_common::CapturedTweet;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_QUEUE_LEN: usize = 10_000;

/// Batching parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Flush threshold and maximum batch length
    pub batch_size: usize,
    /// Timer flush period
    pub flush_interval: Duration,
    /// Queue bound; oldest tweets are evicted beyond it
    pub max_queue_len: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
        }
    }
}

/// Result of one intake event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    /// Collection disabled, tweets discarded
    Discarded,
    Accepted {
        accepted: usize,
        /// Oldest tweets evicted to stay within the bound
        evicted: usize,
    },
}

/// Result of a completed flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered { batch: usize, added: u64 },
    Requeued { batch: usize },
}

#[derive(Debug)]
pub struct Collector {
    settings: CollectorSettings,
    enabled: bool,
    queue: VecDeque<CapturedTweet>,
    stats: CollectorStats,
    flush_in_flight: bool,
}

impl Collector {
    pub fn new(settings: CollectorSettings, restored: PersistedState) -> Self {
        Self {
            settings,
            enabled: restored.enabled,
            queue: VecDeque::new(),
            stats: restored.stats,
            flush_in_flight: false,
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn flush_in_flight(&self) -> bool {
        self.flush_in_flight
    }

    /// Queued tweets, front first
    pub fn queued(&self) -> impl Iterator<Item = &CapturedTweet> {
        self.queue.iter()
    }

    /// Append a batch of extracted tweets
    pub fn on_tweets_received(&mut self, tweets: Vec<CapturedTweet>) -> Intake {
        if !self.enabled {
            debug!(count = tweets.len(), "Collection disabled, discarding tweets");
            return Intake::Discarded;
        }

        let accepted = tweets.len();
        self.queue.extend(tweets);
        self.stats.tweets_collected += accepted as u64;

        let evicted = self.queue.len().saturating_sub(self.settings.max_queue_len);
        if evicted > 0 {
            self.queue.drain(..evicted);
            self.stats.tweets_dropped += evicted as u64;
            warn!(
                evicted,
                queue = self.queue.len(),
                "Queue bound reached, dropped oldest tweets"
            );
        }

        debug!(accepted, queue = self.queue.len(), "Tweets queued");
        Intake::Accepted { accepted, evicted }
    }

    /// Size trigger: threshold reached and no flush running
    pub fn threshold_reached(&self) -> bool {
        !self.flush_in_flight && self.queue.len() >= self.settings.batch_size
    }

    /// Start a flush. `None` when the queue is empty or a flush is running.
    pub fn take_batch(&mut self) -> Option<Vec<CapturedTweet>> {
        if self.flush_in_flight || self.queue.is_empty() {
            return None;
        }

        let len = self.settings.batch_size.min(self.queue.len());
        let batch: Vec<CapturedTweet> = self.queue.drain(..len).collect();
        self.flush_in_flight = true;
        Some(batch)
    }

    /// Finish the in-flight flush with the delivery result
    pub fn complete_flush(
        &mut self,
        batch: Vec<CapturedTweet>,
        result: Result<u64, DeliveryError>,
        now: DateTime<Utc>,
    ) -> FlushOutcome {
        self.flush_in_flight = false;
        let len = batch.len();

        match result {
            Ok(added) => {
                self.stats.tweets_sent += added;
                self.stats.last_sent_at = Some(now);
                info!(batch = len, added, queue = self.queue.len(), "Batch delivered");
                FlushOutcome::Delivered { batch: len, added }
            }
            Err(e) => {
                for tweet in batch.into_iter().rev() {
                    self.queue.push_front(tweet);
                }
                warn!(batch = len, queue = self.queue.len(), error = %e, "Delivery failed, batch requeued");
                FlushOutcome::Requeued { batch: len }
            }
        }
    }

    /// Gate new intake. Queued tweets keep draining either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(enabled, "Collection toggled");
        }
        self.enabled = enabled;
    }

    /// Zero the counters. Queue and enabled flag are untouched.
    pub fn reset_stats(&mut self) {
        self.stats = CollectorStats::default();
        info!("Collector stats reset");
    }

    pub fn status(&self, now: DateTime<Utc>) -> CollectorStatus {
        CollectorStatus::new(
            self.enabled,
            self.stats,
            self.queue.len(),
            self.flush_in_flight,
            now,
        )
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            enabled: self.enabled,
            stats: self.stats,
        }
    }
}
