//! Order-placement wire body and status resolution

use serde::{Deserialize, Serialize};
use types::ids::{OrderId, TradeId};
use types::numeric::{Price, Quantity};
use types::time::to_rfc3339;
use types::trade::Trade;

/// Terminal disposition of a placement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Filled,
    PartiallyFilled,
    Accepted,
}

impl OrderStatus {
    /// remaining = 0 ⇒ FILLED; trades with a remainder ⇒ PARTIALLY_FILLED;
    /// no trades ⇒ ACCEPTED (the order rests, or a market order went
    /// unfilled)
    pub fn resolve(remaining: Quantity, trade_count: usize) -> Self {
        if remaining.is_zero() {
            Self::Filled
        } else if trade_count > 0 {
            Self::PartiallyFilled
        } else {
            Self::Accepted
        }
    }
}

/// One trade as reported to the order's placer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub id: TradeId,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub executed_at_utc: String,
}

impl From<&Trade> for TradeView {
    fn from(trade: &Trade) -> Self {
        Self {
            id: trade.trade_id,
            price: trade.price,
            quantity: trade.quantity,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            executed_at_utc: to_rfc3339(trade.executed_at),
        }
    }
}

/// Successful placement response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub remaining_quantity: Quantity,
    pub trades: Vec<TradeView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_resolution() {
        let zero = Quantity::zero();
        let some = Quantity::from_u64(1);

        assert_eq!(OrderStatus::resolve(zero, 3), OrderStatus::Filled);
        assert_eq!(OrderStatus::resolve(zero, 0), OrderStatus::Filled);
        assert_eq!(OrderStatus::resolve(some, 2), OrderStatus::PartiallyFilled);
        assert_eq!(OrderStatus::resolve(some, 0), OrderStatus::Accepted);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap(),
            "\"PARTIALLY_FILLED\""
        );
    }

    #[test]
    fn test_body_is_camel_case() {
        let body = PlaceOrderBody {
            order_id: OrderId::new(),
            status: OrderStatus::Accepted,
            remaining_quantity: Quantity::from_u64(1),
            trades: vec![],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"orderId\""));
        assert!(json.contains("\"remainingQuantity\""));
    }
}
