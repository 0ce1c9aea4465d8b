//! Integration-event outbox
//!
//! Domain events are committed to an in-process outbox in the same critical
//! section that produced them, then drained asynchronously to the external
//! bus with leases, exponential backoff, and a terminal failure state.
//! Delivery is at-least-once; the record id is the consumer's dedup key.

mod bus;
mod publisher;
mod store;

pub use bus::{EventBus, InMemoryBus, OutboundEvent};
pub use publisher::{OutboxPublisher, PublisherConfig};
pub use store::{Outbox, OutboxRecord, OutboxStatus};
