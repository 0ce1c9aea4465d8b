//! Order ownership side-table
//!
//! The matching engine is ownership-agnostic, so settlement looks up who
//! placed each order here. The recorded limit price is what funds the
//! price-improvement refund for crossing limit buys.

use parking_lot::Mutex;
use std::collections::HashMap;
use types::ids::{ClientId, OrderId, Symbol};
use types::numeric::Price;
use types::order::{OrderType, Side};

/// What settlement needs to know about an order's origin
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOwner {
    pub client_id: ClientId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price as reserved at ingress; None for market orders
    pub limit_price: Option<Price>,
}

/// order id → owner, for every order with funds still at stake
#[derive(Debug, Default)]
pub struct OrderOwnerTable {
    owners: Mutex<HashMap<OrderId, OrderOwner>>,
}

impl OrderOwnerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order_id: OrderId, owner: OrderOwner) {
        self.owners.lock().insert(order_id, owner);
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderOwner> {
        self.owners.lock().get(order_id).cloned()
    }

    pub fn remove(&self, order_id: &OrderId) -> Option<OrderOwner> {
        self.owners.lock().remove(order_id)
    }

    pub fn len(&self) -> usize {
        self.owners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.lock().is_empty()
    }
}
