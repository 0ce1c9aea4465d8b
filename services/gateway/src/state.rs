use market_data::MarketFanout;
use std::sync::Arc;
use trading::OrderPipeline;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<OrderPipeline>,
    pub fanout: MarketFanout,
}
