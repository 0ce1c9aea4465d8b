//! Bid (buy-side) book half
//!
//! Buy orders sorted by price descending; the highest bid is the best level.
//! BTreeMap keeps level iteration deterministic.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;
use types::order::Order;
use types::snapshot::LevelView;

use super::price_level::PriceLevel;

#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest an order at its limit price
    pub fn insert(&mut self, order: Order) {
        let price = order.price.expect("resting bid must carry a price");
        self.levels.entry(price).or_default().push_back(order);
    }

    /// Remove an order; drops the level when it empties
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Order> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Highest bid price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Mutable access to the best level; BTreeMap iterates ascending, so the
    /// best bid is the last entry
    pub fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels
            .iter_mut()
            .next_back()
            .map(|(price, level)| (*price, level))
    }

    /// Drop the level at a price once it has emptied
    pub fn remove_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(|l| l.is_empty()) {
            self.levels.remove(&price);
        }
    }

    /// Top `depth` levels, best first
    pub fn depth(&self, depth: usize) -> Vec<LevelView> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| LevelView {
                price: *price,
                quantity: level.total_quantity(),
                order_count: level.order_count(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
