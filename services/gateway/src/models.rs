use serde::Deserialize;

/// Order placement body; fields stay strings so the pipeline owns shape
/// validation and its error wording
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: String,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub asset: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthParams {
    pub depth: Option<usize>,
}

/// First message a feed client sends after connecting
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub symbol: String,
    pub depth: Option<usize>,
}
