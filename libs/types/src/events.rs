//! Type-tagged integration events
//!
//! Events cross the outbox as (tag, JSON payload) pairs. The tag is a stable
//! string, never a Rust type name, so the wire contract survives refactors.
//! Decoding happens through an explicit tag match; an unknown tag is a
//! terminal failure for the record carrying it.

use crate::ids::{ClientId, OrderId, Symbol, TradeId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An event the core publishes to the external bus
pub trait IntegrationEvent: Serialize {
    /// Stable routing tag for this event kind
    fn event_type(&self) -> &'static str;
}

/// An order passed validation and reservation and entered the book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub remaining: Quantity,
    pub accepted_at: i64,
}

impl IntegrationEvent for OrderAccepted {
    fn event_type(&self) -> &'static str {
        "order.accepted"
    }
}

/// A maker and taker matched for some quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMatched {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub executed_at: i64,
}

impl IntegrationEvent for OrderMatched {
    fn event_type(&self) -> &'static str {
        "order.matched"
    }
}

/// Ledger deltas for one trade completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSettled {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub buyer: ClientId,
    pub seller: ClientId,
    pub price: Price,
    pub quantity: Quantity,
    pub notional: Decimal,
    pub settled_at: i64,
}

impl IntegrationEvent for TradeSettled {
    fn event_type(&self) -> &'static str {
        "trade.settled"
    }
}

/// A client's balance changed for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdated {
    pub client_id: ClientId,
    pub asset: String,
    pub available: Decimal,
    pub reserved: Decimal,
    pub updated_at: i64,
}

impl IntegrationEvent for BalanceUpdated {
    fn event_type(&self) -> &'static str {
        "balance.updated"
    }
}

/// Decoded form of any integration event
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    OrderAccepted(OrderAccepted),
    OrderMatched(OrderMatched),
    TradeSettled(TradeSettled),
    BalanceUpdated(BalanceUpdated),
}

impl ExchangeEvent {
    /// Decode a payload by its tag
    ///
    /// Returns None for an unknown tag; the caller treats that as terminal.
    pub fn decode(tag: &str, payload: &str) -> Option<Result<Self, serde_json::Error>> {
        match tag {
            "order.accepted" => Some(serde_json::from_str(payload).map(Self::OrderAccepted)),
            "order.matched" => Some(serde_json::from_str(payload).map(Self::OrderMatched)),
            "trade.settled" => Some(serde_json::from_str(payload).map(Self::TradeSettled)),
            "balance.updated" => Some(serde_json::from_str(payload).map(Self::BalanceUpdated)),
            _ => None,
        }
    }

    /// The stable tag for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OrderAccepted(e) => e.event_type(),
            Self::OrderMatched(e) => e.event_type(),
            Self::TradeSettled(e) => e.event_type(),
            Self::BalanceUpdated(e) => e.event_type(),
        }
    }
}
