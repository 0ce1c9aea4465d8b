//! Market-data fan-out
//!
//! Batches order-book snapshots and trades per symbol and broadcasts them to
//! subscribed feed connections, rate-limited per connection. Producers only
//! record state and arm a timer; sends happen on the timer task so the
//! matching path never blocks on a slow consumer.

mod fanout;
mod limiter;
mod messages;
mod transport;

pub use fanout::{ConnectionId, FanoutConfig, MarketFanout};
pub use limiter::TokenBucket;
pub use messages::{FeedMessage, PublicTrade};
pub use transport::FeedTransport;
