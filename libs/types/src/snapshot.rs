//! Order-book depth projections

use crate::ids::Symbol;
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// One aggregated price level of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelView {
    pub price: Price,
    /// Total remaining quantity across all orders at this price
    pub quantity: Quantity,
    /// Number of resting orders at this price
    pub order_count: usize,
}

/// Bounded-depth projection of one book
///
/// Bids are ordered best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

impl BookSnapshot {
    /// Best bid price, if any
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price, if any
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }
}
