//! Order entity and wire enums

use crate::ids::{OrderId, Symbol};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type
///
/// Market buys are rejected at ingress (no maximum-quote-amount parameter),
/// so a Market order in the core is always a sell or an already-validated
/// taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Rests at its limit price when not fully matched
    Limit,
    /// Matches against available liquidity, never rests
    Market,
}

/// An order flowing through the matching engine
///
/// Invariants: `price.is_some() ⇔ order_type == Limit`; `remaining ≤ quantity`
/// and remaining only ever decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; absent for market orders
    pub price: Option<Price>,
    /// Original quantity, strictly positive
    pub quantity: Quantity,
    /// Unfilled quantity
    pub remaining: Quantity,
    /// Creation timestamp (Unix nanos, UTC)
    pub created_at: i64,
}

impl Order {
    /// Create a new limit order
    pub fn limit(
        symbol: Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        assert!(!quantity.is_zero(), "Order quantity must be positive");
        Self {
            order_id: OrderId::new(),
            symbol,
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity,
            remaining: quantity,
            created_at: timestamp,
        }
    }

    /// Create a new market order
    pub fn market(symbol: Symbol, side: Side, quantity: Quantity, timestamp: i64) -> Self {
        assert!(!quantity.is_zero(), "Order quantity must be positive");
        Self {
            order_id: OrderId::new(),
            symbol,
            side,
            order_type: OrderType::Market,
            price: None,
            quantity,
            remaining: quantity,
            created_at: timestamp,
        }
    }

    /// Check if the order has no remaining quantity
    pub fn is_filled(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Check the price/type invariant
    pub fn check_invariant(&self) -> bool {
        match self.order_type {
            OrderType::Limit => self.price.is_some(),
            OrderType::Market => self.price.is_none(),
        }
    }

    /// Reduce remaining quantity by a fill
    ///
    /// # Panics
    /// Panics if the fill exceeds the remaining quantity; the engine never
    /// produces such a fill, so this is a programmer-error trap.
    pub fn fill(&mut self, fill_quantity: Quantity) {
        assert!(
            fill_quantity.as_decimal() <= self.remaining.as_decimal(),
            "Fill would exceed remaining quantity"
        );
        self.remaining = self.remaining - fill_quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD")
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_limit_order_creation() {
        let order = Order::limit(
            symbol(),
            Side::Buy,
            Price::from_u64(50000),
            Quantity::parse("1.0").unwrap(),
            1708123456789000000,
        );

        assert!(order.check_invariant());
        assert!(!order.is_filled());
        assert_eq!(order.remaining, order.quantity);
    }

    #[test]
    fn test_market_order_has_no_price() {
        let order = Order::market(
            symbol(),
            Side::Sell,
            Quantity::parse("1.0").unwrap(),
            1708123456789000000,
        );

        assert!(order.price.is_none());
        assert!(order.check_invariant());
    }

    #[test]
    fn test_fill_reduces_remaining() {
        let mut order = Order::limit(
            symbol(),
            Side::Buy,
            Price::from_u64(50000),
            Quantity::parse("1.0").unwrap(),
            1708123456789000000,
        );

        order.fill(Quantity::parse("0.3").unwrap());
        assert_eq!(order.remaining, Quantity::parse("0.7").unwrap());
        assert!(!order.is_filled());

        order.fill(Quantity::parse("0.7").unwrap());
        assert!(order.is_filled());
    }

    #[test]
    #[should_panic(expected = "Fill would exceed remaining quantity")]
    fn test_overfill_panics() {
        let mut order = Order::limit(
            symbol(),
            Side::Buy,
            Price::from_u64(50000),
            Quantity::parse("1.0").unwrap(),
            1708123456789000000,
        );

        order.fill(Quantity::parse("1.5").unwrap());
    }

    #[test]
    fn test_side_wire_format() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(
            serde_json::to_string(&OrderType::Market).unwrap(),
            "\"MARKET\""
        );
    }
}
