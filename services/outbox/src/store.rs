//! The outbox store
//!
//! All operations serialize under one internal mutex. Timestamps are Unix
//! nanoseconds supplied by the caller, which keeps the lease and backoff
//! logic fully deterministic under test.

use parking_lot::Mutex;
use types::errors::OutboxError;
use types::events::IntegrationEvent;
use types::ids::EventId;

/// Lifecycle of an outbox record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    /// Waiting for lease (initial state, and after a rescheduled failure)
    Pending,
    /// Leased by a publisher until `locked_until`
    InFlight,
    /// Confirmed by the bus (terminal)
    Published,
    /// Attempt budget exhausted or undecodable (terminal)
    Failed,
}

/// One enqueued integration event
#[derive(Debug, Clone)]
pub struct OutboxRecord {
    pub id: EventId,
    /// Stable routing tag, e.g. `order.matched`
    pub event_type: String,
    /// JSON payload
    pub payload: String,
    pub created_at: i64,
    pub status: OutboxStatus,
    /// Completed publish attempts; monotonically non-decreasing
    pub attempts: u32,
    pub next_attempt_at: i64,
    /// Lease expiry; 0 when unleased
    pub locked_until: i64,
    pub last_error: Option<String>,
}

impl OutboxRecord {
    fn leasable(&self, now: i64) -> bool {
        !matches!(self.status, OutboxStatus::Published | OutboxStatus::Failed)
            && self.next_attempt_at <= now
            && self.locked_until <= now
    }
}

/// In-memory durable-queue abstraction for integration events
#[derive(Debug, Default)]
pub struct Outbox {
    records: Mutex<Vec<OutboxRecord>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize and enqueue an event as Pending, eligible immediately
    pub fn enqueue(&self, event: &impl IntegrationEvent, now: i64) -> Result<EventId, OutboxError> {
        let payload =
            serde_json::to_string(event).map_err(|e| OutboxError::Serialize(e.to_string()))?;
        let id = EventId::new();
        self.records.lock().push(OutboxRecord {
            id,
            event_type: event.event_type().to_string(),
            payload,
            created_at: now,
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: now,
            locked_until: 0,
            last_error: None,
        });
        Ok(id)
    }

    /// Lease up to `batch_size` eligible records, oldest first
    ///
    /// Eligible means neither terminal, due (`next_attempt_at ≤ now`), and
    /// unleased (`locked_until ≤ now`). Leased records become InFlight until
    /// `now + lease_nanos`; if the publisher dies mid-batch the lease lapses
    /// and the record becomes eligible again.
    pub fn try_lease_batch(
        &self,
        now: i64,
        batch_size: usize,
        lease_nanos: i64,
    ) -> Vec<OutboxRecord> {
        let mut records = self.records.lock();

        let mut eligible: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.leasable(now))
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by_key(|&i| (records[i].created_at, records[i].id));
        eligible.truncate(batch_size);

        eligible
            .into_iter()
            .map(|i| {
                let record = &mut records[i];
                record.status = OutboxStatus::InFlight;
                record.locked_until = now + lease_nanos;
                record.clone()
            })
            .collect()
    }

    /// Confirmations from the bus: terminal success
    pub fn mark_published(&self, ids: &[EventId]) {
        let mut records = self.records.lock();
        for record in records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = OutboxStatus::Published;
            record.locked_until = 0;
            record.last_error = None;
        }
    }

    /// Count a failed attempt and either reschedule or fail terminally
    pub fn mark_failed_or_reschedule(
        &self,
        id: EventId,
        error: &str,
        next_attempt_at: i64,
        status: OutboxStatus,
    ) -> Result<(), OutboxError> {
        debug_assert!(matches!(
            status,
            OutboxStatus::Pending | OutboxStatus::Failed
        ));
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| OutboxError::UnknownRecord { id: id.to_string() })?;
        record.attempts += 1;
        record.status = status;
        record.next_attempt_at = next_attempt_at;
        record.locked_until = 0;
        record.last_error = Some(error.to_string());
        Ok(())
    }

    /// Records not yet terminal
    pub fn pending_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| !matches!(r.status, OutboxStatus::Published | OutboxStatus::Failed))
            .count()
    }

    /// Terminally failed records
    pub fn failed_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.status == OutboxStatus::Failed)
            .count()
    }

    /// Snapshot one record by id
    pub fn record(&self, id: EventId) -> Option<OutboxRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }
}
