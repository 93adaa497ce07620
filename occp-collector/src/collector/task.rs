//! Collector task
//!
//! One long-lived task owns the [`Collector`]. Its loop selects over:
//! - control commands from [`CollectorHandle`]s
//! - tweet batches arriving over the bridge
//! - the flush interval tick
//! - the in-flight delivery future
//!
//! State only changes inside this task, between awaits. A slow or hung
//! delivery delays only its own flush; intake and status keep being served.

use super::{Collector, CollectorStats, CollectorStatus, FlushOutcome, IngestionSink, Intake, StateStore};
use crate::bridge::BridgeReceiver;
use crate::error::{CollectorError, DeliveryError};
use chrono::Utc;
use futures::future::{BoxFuture, OptionFuture};
use occp_common::CapturedTweet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

const COMMAND_CAPACITY: usize = 64;

type Delivery = BoxFuture<'static, (Vec<CapturedTweet>, Result<u64, DeliveryError>)>;

enum Command {
    Tweets {
        tweets: Vec<CapturedTweet>,
        reply: oneshot::Sender<CollectorStatus>,
    },
    GetStatus(oneshot::Sender<CollectorStatus>),
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<CollectorStatus>,
    },
    ResetStats(oneshot::Sender<CollectorStatus>),
    Shutdown(oneshot::Sender<ShutdownReport>),
}

/// What the shutdown drain achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tweets delivered while draining
    pub delivered: usize,
    /// Tweets still queued when the task stopped (lost)
    pub remaining: usize,
    /// Counters at stop time
    pub stats: CollectorStats,
}

/// Cloneable control handle on the collector task
#[derive(Debug, Clone)]
pub struct CollectorHandle {
    tx: mpsc::Sender<Command>,
}

impl CollectorHandle {
    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, CollectorError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| CollectorError::Stopped)?;
        response.await.map_err(|_| CollectorError::Stopped)
    }

    pub async fn status(&self) -> Result<CollectorStatus, CollectorError> {
        self.request(Command::GetStatus).await
    }

    /// Direct intake, bypassing the bridge. Waits for the task.
    pub async fn submit_tweets(
        &self,
        tweets: Vec<CapturedTweet>,
    ) -> Result<CollectorStatus, CollectorError> {
        self.request(|reply| Command::Tweets { tweets, reply }).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<CollectorStatus, CollectorError> {
        self.request(|reply| Command::SetEnabled { enabled, reply })
            .await
    }

    pub async fn reset_stats(&self) -> Result<CollectorStatus, CollectorError> {
        self.request(Command::ResetStats).await
    }

    /// Stop intake, drain what can be delivered, and stop the task
    pub async fn shutdown(&self) -> Result<ShutdownReport, CollectorError> {
        self.request(Command::Shutdown).await
    }
}

/// Start the collector task.
///
/// Without a `store`, the enabled flag and counters live in memory only.
/// The task ends on [`CollectorHandle::shutdown`] or once every handle is
/// dropped, draining the queue first in both cases.
pub fn spawn_collector(
    collector: Collector,
    sink: Arc<dyn IngestionSink>,
    store: Option<StateStore>,
    bridge: BridgeReceiver,
) -> (CollectorHandle, JoinHandle<ShutdownReport>) {
    let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
    let task = CollectorTask {
        collector,
        sink,
        store,
        commands,
        bridge,
    };
    let join = tokio::spawn(task.run());
    (CollectorHandle { tx }, join)
}

struct CollectorTask {
    collector: Collector,
    sink: Arc<dyn IngestionSink>,
    store: Option<StateStore>,
    commands: mpsc::Receiver<Command>,
    bridge: BridgeReceiver,
}

impl CollectorTask {
    async fn run(mut self) -> ShutdownReport {
        let settings = *self.collector.settings();
        info!(
            batch_size = settings.batch_size,
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            max_queue_len = settings.max_queue_len,
            enabled = self.collector.is_enabled(),
            "Collector started"
        );

        let mut ticker = time::interval_at(
            Instant::now() + settings.flush_interval,
            settings.flush_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut delivery: Option<Delivery> = None;
        let mut bridge_open = true;

        let shutdown_reply = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(reply) = self.handle_command(command, &mut delivery).await {
                            break Some(reply);
                        }
                    }
                    None => {
                        debug!("All collector handles dropped");
                        break None;
                    }
                },
                batch = self.bridge.recv(), if bridge_open => match batch {
                    Some(batch) => {
                        trace!(url = %batch.source, count = batch.tweets.len(), "Bridge batch received");
                        self.intake(batch.tweets, &mut delivery).await;
                    }
                    None => {
                        debug!("Bridge closed, intake continues through commands only");
                        bridge_open = false;
                    }
                },
                _ = ticker.tick() => {
                    if delivery.is_some() {
                        debug!("Flush in flight, tick skipped");
                    } else {
                        delivery = self.start_flush();
                    }
                },
                Some((batch, result)) = OptionFuture::from(delivery.as_mut()), if delivery.is_some() => {
                    delivery = None;
                    self.finish_flush(batch, result).await;
                    if self.collector.threshold_reached() {
                        delivery = self.start_flush();
                    }
                },
            }
        };

        let report = self.drain(delivery).await;
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(report);
        }
        report
    }

    /// Returns the reply channel when the command asks for shutdown
    async fn handle_command(
        &mut self,
        command: Command,
        delivery: &mut Option<Delivery>,
    ) -> Option<oneshot::Sender<ShutdownReport>> {
        let reply = match command {
            Command::Tweets { tweets, reply } => {
                self.intake(tweets, delivery).await;
                reply
            }
            Command::GetStatus(reply) => reply,
            Command::SetEnabled { enabled, reply } => {
                self.collector.set_enabled(enabled);
                self.persist_enabled().await;
                reply
            }
            Command::ResetStats(reply) => {
                self.collector.reset_stats();
                self.persist_stats().await;
                reply
            }
            Command::Shutdown(reply) => return Some(reply),
        };

        // Requester may have gone away
        let _ = reply.send(self.collector.status(Utc::now()));
        None
    }

    async fn intake(&mut self, tweets: Vec<CapturedTweet>, delivery: &mut Option<Delivery>) {
        if let Intake::Discarded = self.collector.on_tweets_received(tweets) {
            return;
        }
        self.persist_stats().await;

        if self.collector.threshold_reached() {
            debug!(queue = self.collector.queue_len(), "Batch threshold reached");
            *delivery = self.start_flush();
        }
    }

    fn start_flush(&mut self) -> Option<Delivery> {
        let batch = self.collector.take_batch()?;
        let sink = Arc::clone(&self.sink);
        debug!(batch = batch.len(), queue = self.collector.queue_len(), "Flush started");

        Some(Box::pin(async move {
            let result = sink.submit(&batch).await;
            (batch, result)
        }))
    }

    async fn finish_flush(
        &mut self,
        batch: Vec<CapturedTweet>,
        result: Result<u64, DeliveryError>,
    ) -> FlushOutcome {
        let outcome = self.collector.complete_flush(batch, result, Utc::now());
        if let FlushOutcome::Delivered { .. } = outcome {
            self.persist_stats().await;
        }
        outcome
    }

    async fn persist_stats(&mut self) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save_stats(self.collector.stats()).await {
            warn!("Failed to persist collector stats: {}", e);
        }
    }

    async fn persist_enabled(&mut self) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save_enabled(self.collector.is_enabled()).await {
            warn!("Failed to persist enabled flag: {}", e);
        }
    }

    /// Deliver until the queue is empty or one attempt fails
    async fn drain(&mut self, in_flight: Option<Delivery>) -> ShutdownReport {
        self.bridge.close();
        while let Ok(batch) = self.bridge.try_recv() {
            self.collector.on_tweets_received(batch.tweets);
        }

        let mut delivered = 0;
        let mut pending = in_flight.or_else(|| self.start_flush());

        while let Some(flush) = pending.take() {
            let (batch, result) = flush.await;
            match self.finish_flush(batch, result).await {
                FlushOutcome::Delivered { batch, .. } => {
                    delivered += batch;
                    pending = self.start_flush();
                }
                FlushOutcome::Requeued { .. } => break,
            }
        }

        let report = ShutdownReport {
            delivered,
            remaining: self.collector.queue_len(),
            stats: *self.collector.stats(),
        };
        if report.remaining > 0 {
            warn!(
                delivered = report.delivered,
                lost = report.remaining,
                "Collector stopped with undelivered tweets"
            );
        } else {
            info!(delivered = report.delivered, "Collector stopped, queue drained");
        }
        report
    }
}
