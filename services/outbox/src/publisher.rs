//! Periodic leaser/dispatcher draining the outbox to the bus

use crate::bus::{EventBus, OutboundEvent};
use crate::store::{Outbox, OutboxRecord, OutboxStatus};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};
use types::events::ExchangeEvent;
use types::time::now_nanos;

/// Publisher tuning
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Delay between lease polls
    pub poll_interval: Duration,
    /// Records leased per poll
    pub batch_size: usize,
    /// How long a lease protects a record from re-leasing
    pub lease_duration: Duration,
    /// Concurrent publishes per batch
    pub max_parallelism: usize,
    /// Attempts before a record fails terminally
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub base_delay: Duration,
    /// Retry delay ceiling
    pub max_delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 32,
            lease_duration: Duration::from_secs(30),
            max_parallelism: 8,
            max_attempts: 8,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Leases batches from the outbox and publishes them with confirm
///
/// Time is derived from a wall-clock base plus a monotonic offset so the
/// loop stays testable under a paused runtime clock.
pub struct OutboxPublisher {
    outbox: Arc<Outbox>,
    bus: Arc<dyn EventBus>,
    config: PublisherConfig,
    wall_base: i64,
    monotonic_base: Instant,
}

impl OutboxPublisher {
    pub fn new(outbox: Arc<Outbox>, bus: Arc<dyn EventBus>, config: PublisherConfig) -> Self {
        Self {
            outbox,
            bus,
            config,
            wall_base: now_nanos(),
            monotonic_base: Instant::now(),
        }
    }

    fn now(&self) -> i64 {
        self.wall_base + self.monotonic_base.elapsed().as_nanos() as i64
    }

    /// Poll until the stop signal flips true
    ///
    /// A batch in flight when the signal arrives is awaited to completion;
    /// only the sleep between polls is interruptible.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        info!("outbox publisher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop.borrow() {
                break;
            }
            self.drain_once().await;
        }
        info!("outbox publisher stopped");
    }

    /// Lease one batch and dispatch it with bounded parallelism
    pub async fn drain_once(&self) {
        let now = self.now();
        let batch = self.outbox.try_lease_batch(
            now,
            self.config.batch_size,
            self.config.lease_duration.as_nanos() as i64,
        );
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "leased outbox batch");

        for chunk in batch.chunks(self.config.max_parallelism) {
            join_all(chunk.iter().map(|record| self.dispatch(record))).await;
        }
    }

    async fn dispatch(&self, record: &OutboxRecord) {
        // A tag the registry cannot decode will never succeed: fail it
        // terminally without spending a bus call.
        match ExchangeEvent::decode(&record.event_type, &record.payload) {
            None => {
                warn!(id = %record.id, tag = %record.event_type, "unknown event tag");
                let _ = self.outbox.mark_failed_or_reschedule(
                    record.id,
                    &format!("unknown event tag: {}", record.event_type),
                    self.now(),
                    OutboxStatus::Failed,
                );
                return;
            }
            Some(Err(e)) => {
                warn!(id = %record.id, tag = %record.event_type, error = %e, "undecodable payload");
                let _ = self.outbox.mark_failed_or_reschedule(
                    record.id,
                    &format!("undecodable payload: {e}"),
                    self.now(),
                    OutboxStatus::Failed,
                );
                return;
            }
            Some(Ok(_)) => {}
        }

        let outbound = OutboundEvent {
            id: record.id,
            event_type: record.event_type.clone(),
            payload: record.payload.clone(),
        };

        match self.bus.publish(&outbound).await {
            Ok(()) => {
                self.outbox.mark_published(&[record.id]);
                debug!(id = %record.id, tag = %record.event_type, "published");
            }
            Err(e) => {
                let next_attempt = record.attempts + 1;
                if next_attempt >= self.config.max_attempts {
                    warn!(id = %record.id, attempts = next_attempt, error = %e, "giving up");
                    let _ = self.outbox.mark_failed_or_reschedule(
                        record.id,
                        &e.to_string(),
                        self.now(),
                        OutboxStatus::Failed,
                    );
                } else {
                    let backoff = self.backoff_nanos(record.attempts);
                    debug!(id = %record.id, attempts = next_attempt, backoff_ms = backoff / 1_000_000, "retrying");
                    let _ = self.outbox.mark_failed_or_reschedule(
                        record.id,
                        &e.to_string(),
                        self.now() + backoff,
                        OutboxStatus::Pending,
                    );
                }
            }
        }
    }

    /// min(base · 2^clamp(attempts, 0, 20), max)
    fn backoff_nanos(&self, attempts: u32) -> i64 {
        let exponent = attempts.min(20);
        let delay = self
            .config
            .base_delay
            .as_nanos()
            .saturating_mul(1u128 << exponent);
        delay.min(self.config.max_delay.as_nanos()) as i64
    }
}
