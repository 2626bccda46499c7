//! Queue consumer loop
//!
//! A single control task multiplexes the shutdown signal against the next
//! delivery. Each delivery is handed to a spawned task and acknowledged right
//! after the spawn, so an ack means "accepted", not "processed". A crash
//! between dispatch and completion loses that file.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::ShutdownConfig;
use crate::error::{PipelineError, QueueError};
use crate::pipeline::ProcessSummary;

pub mod amqp;

pub use amqp::AmqpQueue;

/// One delivery taken off the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkMessage {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
}

impl WorkMessage {
    pub fn new(delivery_tag: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            body: body.into(),
        }
    }

    /// Storage key carried by the body, passed through as is; `None` when
    /// the body is empty or only whitespace
    pub fn file_key(&self) -> Option<String> {
        let key = String::from_utf8_lossy(&self.body);
        (!key.trim().is_empty()).then(|| key.into_owned())
    }
}

/// Stream of deliveries with manual acknowledgment
#[async_trait]
pub trait DeliverySource: Send {
    /// Next delivery; `None` once the subscription has ended
    async fn recv(&mut self) -> Option<Result<WorkMessage, QueueError>>;

    /// Positive, single-delivery acknowledgment
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError>;

    async fn close(&mut self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Work performed for each accepted delivery
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn process(&self, file_key: &str) -> Result<ProcessSummary, PipelineError>;
}

/// Counters for one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub dispatched: u64,
    pub acknowledged: u64,
}

pub struct Consumer {
    config: ShutdownConfig,
    tracker: TaskTracker,
}

impl Consumer {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Number of spawned file tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Consume until `shutdown` resolves or the source ends.
    ///
    /// Errors from the source itself are fatal and returned.
    pub async fn run<S, P, F>(
        &self,
        mut source: S,
        processor: Arc<P>,
        shutdown: F,
    ) -> Result<RunStats, QueueError>
    where
        S: DeliverySource,
        P: FileProcessor + 'static,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = RunStats::default();

        info!("Waiting for messages");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting deliveries");
                    break;
                }
                delivery = source.recv() => match delivery {
                    Some(Ok(message)) => {
                        self.dispatch(&mut source, &processor, message, &mut stats).await;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Delivery stream failed");
                        if let Err(close_err) = source.close().await {
                            debug!(error = %close_err, "Close after failure also failed");
                        }
                        return Err(e);
                    }
                    None => {
                        warn!("Delivery stream ended");
                        break;
                    }
                }
            }
        }

        self.stop(&mut source).await?;

        info!(
            received = stats.received,
            dispatched = stats.dispatched,
            acknowledged = stats.acknowledged,
            "Consumer stopped"
        );
        Ok(stats)
    }

    async fn dispatch<S, P>(
        &self,
        source: &mut S,
        processor: &Arc<P>,
        message: WorkMessage,
        stats: &mut RunStats,
    ) where
        S: DeliverySource,
        P: FileProcessor + 'static,
    {
        stats.received += 1;
        let tag = message.delivery_tag;

        match message.file_key() {
            Some(key) => {
                info!(delivery_tag = tag, file = %key, "Received a message");

                let processor = Arc::clone(processor);
                self.tracker.spawn(async move {
                    match processor.process(&key).await {
                        Ok(summary) => debug!(
                            file = %key,
                            request_id = %summary.request_id,
                            "File task finished"
                        ),
                        Err(e) => error!(file = %key, error = %e, "File processing failed"),
                    }
                });
                stats.dispatched += 1;
            }
            None => warn!(delivery_tag = tag, "Received an empty message, nothing to process"),
        }

        match source.ack(tag).await {
            Ok(()) => stats.acknowledged += 1,
            Err(e) => error!(delivery_tag = tag, error = %e, "Failed to acknowledge delivery"),
        }
    }

    async fn stop<S: DeliverySource>(&self, source: &mut S) -> Result<(), QueueError> {
        tokio::time::sleep(self.config.grace()).await;
        self.tracker.close();

        match self.config.drain_timeout() {
            Some(limit) => {
                info!(in_flight = self.tracker.len(), "Draining in-flight files");
                if tokio::time::timeout(limit, self.tracker.wait()).await.is_err() {
                    warn!(
                        in_flight = self.tracker.len(),
                        "Drain timed out, abandoning in-flight files"
                    );
                }
            }
            None if !self.tracker.is_empty() => {
                warn!(
                    in_flight = self.tracker.len(),
                    "Exiting without waiting for in-flight files"
                );
            }
            None => {}
        }

        source.close().await
    }
}
