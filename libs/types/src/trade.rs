//! Trade entity

use crate::ids::{OrderId, Symbol, TradeId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single execution between a resting maker and an incoming taker
///
/// The price is always the maker's resting price; any improvement on a
/// crossing limit accrues to the taker at settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    /// Execution timestamp (Unix nanos, UTC)
    pub executed_at: i64,
}

impl Trade {
    pub fn new(
        symbol: Symbol,
        price: Price,
        quantity: Quantity,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        executed_at: i64,
    ) -> Self {
        assert!(!quantity.is_zero(), "Trade quantity must be positive");
        Self {
            trade_id: TradeId::new(),
            symbol,
            price,
            quantity,
            maker_order_id,
            taker_order_id,
            executed_at,
        }
    }

    /// Quote-asset value of this trade (price × quantity)
    pub fn notional(&self) -> Decimal {
        self.quantity.notional(self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_notional() {
        let trade = Trade::new(
            Symbol::new("BTC-USD"),
            Price::from_u64(50000),
            Quantity::parse("0.5").unwrap(),
            OrderId::new(),
            OrderId::new(),
            1708123456789000000,
        );

        assert_eq!(trade.notional(), Decimal::from(25000));
    }

    #[test]
    #[should_panic(expected = "Trade quantity must be positive")]
    fn test_zero_quantity_trade_panics() {
        Trade::new(
            Symbol::new("BTC-USD"),
            Price::from_u64(50000),
            Quantity::zero(),
            OrderId::new(),
            OrderId::new(),
            1708123456789000000,
        );
    }

    #[test]
    fn test_trade_serialization_round_trip() {
        let trade = Trade::new(
            Symbol::new("ETH-USD"),
            Price::parse("3000.50").unwrap(),
            Quantity::parse("2.5").unwrap(),
            OrderId::new(),
            OrderId::new(),
            1708123456789000000,
        );

        let json = serde_json::to_string(&trade).unwrap();
        let deserialized: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deserialized);
    }
}
