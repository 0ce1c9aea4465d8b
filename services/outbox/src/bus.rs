//! The external bus contract

use async_trait::async_trait;
use parking_lot::Mutex;
use types::errors::PublishError;
use types::ids::EventId;

/// An event as handed to the bus
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// Stable record id; downstream dedup key
    pub id: EventId,
    /// Routing key on the bus
    pub event_type: String,
    /// JSON body
    pub payload: String,
}

/// Publish-with-confirm to an external message broker
///
/// Implementations are expected to declare their topic exchange once per
/// channel, enable publish confirms, publish with routing-key = event type
/// and JSON content (persistent delivery), and wait for broker confirmation
/// under a timeout, pooling channels over one long-lived connection. The
/// publisher treats every error identically: retry with backoff, then fail
/// the record terminally.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError>;
}

/// Recording bus for tests and the demo binary
///
/// Can be programmed to fail the next N publishes.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    published: Mutex<Vec<OutboundEvent>>,
    failures_remaining: Mutex<u32>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` publishes fail with a transport error
    pub fn fail_next(&self, n: u32) {
        *self.failures_remaining.lock() = n;
    }

    /// Everything successfully published, in order
    pub fn published(&self) -> Vec<OutboundEvent> {
        self.published.lock().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError> {
        {
            let mut failures = self.failures_remaining.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(PublishError::Transport("injected failure".to_string()));
            }
        }
        self.published.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tag: &str) -> OutboundEvent {
        OutboundEvent {
            id: EventId::new(),
            event_type: tag.to_string(),
            payload: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_bus_records_in_order() {
        let bus = InMemoryBus::new();
        bus.publish(&event("a")).await.unwrap();
        bus.publish(&event("b")).await.unwrap();

        let published = bus.published();
        assert_eq!(published[0].event_type, "a");
        assert_eq!(published[1].event_type, "b");
    }

    #[tokio::test]
    async fn test_programmed_failures_then_recover() {
        let bus = InMemoryBus::new();
        bus.fail_next(2);

        assert!(bus.publish(&event("a")).await.is_err());
        assert!(bus.publish(&event("a")).await.is_err());
        assert!(bus.publish(&event("a")).await.is_ok());
        assert_eq!(bus.published_count(), 1);
    }
}
