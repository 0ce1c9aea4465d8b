//! Feed wire messages

use serde::{Deserialize, Serialize};
use types::ids::{OrderId, Symbol, TradeId};
use types::numeric::{Price, Quantity};
use types::snapshot::BookSnapshot;
use types::time::to_rfc3339;
use types::trade::Trade;

/// Public view of a trade, stripped of any account linkage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTrade {
    pub id: TradeId,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub executed_at_utc: String,
}

impl From<&Trade> for PublicTrade {
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

/// One outbound feed frame
///
/// A batch window with a single buffered trade flushes as `trade`; two or
/// more flush as one `trades` frame carrying the array in engine order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Unicast initial state for a new subscriber
    Snapshot {
        symbol: Symbol,
        snapshot: BookSnapshot,
    },
    /// Broadcast book update
    Orderbook {
        symbol: Symbol,
        snapshot: BookSnapshot,
    },
    Trade {
        symbol: Symbol,
        trade: PublicTrade,
    },
    Trades {
        symbol: Symbol,
        trades: Vec<PublicTrade>,
    },
    Ping {
        #[serde(rename = "timestampUtc")]
        timestamp_utc: String,
    },
}
