//! Collector state as seen from outside the task

use chrono::{DateTime, Utc};
use occp_common::human_time::format_time_since;
use serde::{Deserialize, Serialize};

/// Cumulative counters, persisted as one JSON value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorStats {
    #[serde(default)]
    pub tweets_collected: u64,
    #[serde(default)]
    pub tweets_sent: u64,
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Tweets evicted by the queue bound
    #[serde(default)]
    pub tweets_dropped: u64,
}

/// Coarse queue activity, derived at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    /// Nothing queued, intake on
    Idle,
    /// Items waiting for delivery (regardless of the enabled flag)
    Draining,
    /// Nothing queued, intake off
    Paused,
}

impl QueueState {
    pub fn derive(enabled: bool, queue_len: usize) -> Self {
        if queue_len > 0 {
            QueueState::Draining
        } else if enabled {
            QueueState::Idle
        } else {
            QueueState::Paused
        }
    }
}

/// Snapshot answered to every status query and control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorStatus {
    pub enabled: bool,
    pub stats: CollectorStats,
    pub queue_size: usize,
    pub flush_in_flight: bool,
    pub queue_state: QueueState,
    /// Relative time since the last successful delivery
    pub last_sync: String,
}

impl CollectorStatus {
    pub fn new(
        enabled: bool,
        stats: CollectorStats,
        queue_size: usize,
        flush_in_flight: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            enabled,
            stats,
            queue_size,
            flush_in_flight,
            queue_state: QueueState::derive(enabled, queue_size),
            last_sync: format_time_since(stats.last_sent_at, now),
        }
    }
}
