//! Order pipeline
//!
//! Orchestrates the trading core: idempotent ingress, risk checks, funds
//! reservation, matching, settlement, event enqueueing, and market-data
//! fan-out. Per symbol, matching through outbox enqueue runs under one
//! exclusive lock and is observable as a single atomic step.

mod idempotency;
mod owner;
mod pipeline;
mod response;
mod settlement;

pub use idempotency::{IdempotencyCache, IdempotencyConfig};
pub use owner::{OrderOwner, OrderOwnerTable};
pub use pipeline::{OrderPipeline, PipelineConfig, PlaceOrderInput, Response};
pub use response::{OrderStatus, PlaceOrderBody, TradeView};
