//! Single-symbol order book with price-time matching

use std::collections::HashMap;
use types::ids::{OrderId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::snapshot::BookSnapshot;
use types::trade::Trade;

use crate::book::{AskBook, BidBook};

/// Outcome of submitting one order
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Trades in execution order (taker matched oldest-best first)
    pub trades: Vec<Trade>,
    /// Taker quantity left unfilled after matching
    pub remaining: Quantity,
    /// The resting remainder, if the order entered the book
    pub resting: Option<Order>,
}

/// Order book for a single symbol
///
/// Owns every resting order plus an id index for cancellation. Matching,
/// cancellation, and snapshots all assume the caller serializes access
/// (one writer per symbol).
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: Symbol,
    bids: BidBook,
    asks: AskBook,
    /// order id → (side, resting price); every resting order appears exactly once
    index: HashMap<OrderId, (Side, Price)>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BidBook::new(),
            asks: AskBook::new(),
            index: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Match an incoming order against the opposite side
    ///
    /// Fills at the maker's resting price until the taker is exhausted, the
    /// opposite side empties, or a limit taker stops crossing. A limit
    /// remainder rests; a market remainder is returned unfilled.
    ///
    /// # Panics
    /// Panics on a symbol mismatch or a violated price/type invariant; both
    /// are programmer errors, not user input.
    pub fn add_order(&mut self, mut order: Order, now: i64) -> MatchResult {
        assert_eq!(
            order.symbol, self.symbol,
            "order routed to the wrong book"
        );
        assert!(order.check_invariant(), "order price/type invariant violated");

        let trades = match order.side {
            Side::Buy => self.match_against_asks(&mut order, now),
            Side::Sell => self.match_against_bids(&mut order, now),
        };

        let remaining = order.remaining;
        let resting = if !order.is_filled() && order.order_type == OrderType::Limit {
            let price = order.price.expect("limit order carries a price");
            self.index.insert(order.order_id, (order.side, price));
            match order.side {
                Side::Buy => self.bids.insert(order.clone()),
                Side::Sell => self.asks.insert(order.clone()),
            }
            Some(order)
        } else {
            None
        };

        MatchResult {
            trades,
            remaining,
            resting,
        }
    }

    fn match_against_asks(&mut self, taker: &mut Order, now: i64) -> Vec<Trade> {
        let mut trades = Vec::new();

        while !taker.is_filled() {
            let Some((level_price, level)) = self.asks.best_level_mut() else {
                break;
            };
            // A limit buy stops once the best ask exceeds its price.
            if taker.price.is_some_and(|limit| level_price > limit) {
                break;
            }

            let maker = level.front().expect("levels are never empty");
            let maker_id = maker.order_id;
            let fill = taker.remaining.min(maker.remaining);

            trades.push(Trade::new(
                self.symbol.clone(),
                level_price,
                fill,
                maker_id,
                taker.order_id,
                now,
            ));

            taker.fill(fill);
            if let Some(filled_maker) = level.fill_front(fill) {
                self.index.remove(&filled_maker);
            }
            self.asks.remove_level_if_empty(level_price);
        }

        trades
    }

    fn match_against_bids(&mut self, taker: &mut Order, now: i64) -> Vec<Trade> {
        let mut trades = Vec::new();

        while !taker.is_filled() {
            let Some((level_price, level)) = self.bids.best_level_mut() else {
                break;
            };
            // A limit sell stops once the best bid drops below its price.
            if taker.price.is_some_and(|limit| level_price < limit) {
                break;
            }

            let maker = level.front().expect("levels are never empty");
            let maker_id = maker.order_id;
            let fill = taker.remaining.min(maker.remaining);

            trades.push(Trade::new(
                self.symbol.clone(),
                level_price,
                fill,
                maker_id,
                taker.order_id,
                now,
            ));

            taker.fill(fill);
            if let Some(filled_maker) = level.fill_front(fill) {
                self.index.remove(&filled_maker);
            }
            self.bids.remove_level_if_empty(level_price);
        }

        trades
    }

    /// Remove a resting order; no-op if the id is unknown
    pub fn cancel_order(&mut self, order_id: &OrderId) -> Option<Order> {
        let (side, price) = self.index.remove(order_id)?;
        let removed = match side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        };
        debug_assert!(removed.is_some(), "index and book out of sync");
        removed
    }

    /// Bounded projection of both sides, best levels first
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            bids: self.bids.depth(depth),
            asks: self.asks.depth(depth),
        }
    }

    /// Highest resting bid
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Lowest resting ask
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Whether an order currently rests in this book
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    /// Number of resting orders
    pub fn resting_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD")
    }

    fn book() -> OrderBook {
        OrderBook::new(symbol())
    }

    fn limit(side: Side, price: u64, qty: &str, ts: i64) -> Order {
        Order::limit(
            symbol(),
            side,
            Price::from_u64(price),
            Quantity::parse(qty).unwrap(),
            ts,
        )
    }

    const T0: i64 = 1708123456789000000;

    #[test]
    fn test_no_cross_rests() {
        let mut book = book();
        book.add_order(limit(Side::Sell, 51000, "1.0", T0), T0);

        let result = book.add_order(limit(Side::Buy, 50000, "1.0", T0 + 1), T0 + 1);
        assert!(result.trades.is_empty());
        assert!(result.resting.is_some());
        assert_eq!(book.resting_count(), 2);
        // Book is not crossed.
        assert!(book.best_ask().unwrap() > book.best_bid().unwrap());
    }

    #[test]
    fn test_full_match_at_maker_price() {
        let mut book = book();
        let maker = limit(Side::Sell, 50000, "1.0", T0);
        let maker_id = maker.order_id;
        book.add_order(maker, T0);

        // Taker willing to pay more still trades at the maker's price.
        let result = book.add_order(limit(Side::Buy, 50500, "1.0", T0 + 1), T0 + 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, Price::from_u64(50000));
        assert_eq!(result.trades[0].maker_order_id, maker_id);
        assert!(result.resting.is_none());
        assert!(result.remaining.is_zero());
        assert_eq!(book.resting_count(), 0);
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut book = book();
        book.add_order(limit(Side::Sell, 50000, "0.5", T0), T0);

        let result = book.add_order(limit(Side::Buy, 50000, "1.0", T0 + 1), T0 + 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.remaining, Quantity::parse("0.5").unwrap());
        let resting = result.resting.unwrap();
        assert_eq!(resting.remaining, Quantity::parse("0.5").unwrap());
        assert!(book.contains(&resting.order_id));
    }

    #[test]
    fn test_time_priority_within_level() {
        let mut book = book();
        let first = limit(Side::Sell, 100, "1", T0);
        let second = limit(Side::Sell, 100, "1", T0 + 1_000_000_000);
        let first_id = first.order_id;
        let second_id = second.order_id;
        book.add_order(first, T0);
        book.add_order(second, T0 + 1_000_000_000);

        let result = book.add_order(limit(Side::Buy, 100, "2", T0 + 2), T0 + 2);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id, first_id);
        assert_eq!(result.trades[1].maker_order_id, second_id);
    }

    #[test]
    fn test_crosses_levels_best_first() {
        let mut book = book();
        book.add_order(limit(Side::Sell, 99, "1", T0), T0);
        book.add_order(limit(Side::Sell, 101, "1", T0 + 1), T0 + 1);

        let result = book.add_order(limit(Side::Buy, 101, "2", T0 + 2), T0 + 2);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].price, Price::from_u64(99));
        assert_eq!(result.trades[1].price, Price::from_u64(101));
        assert!(result.remaining.is_zero());
    }

    #[test]
    fn test_limit_stops_at_uncrossable_level() {
        let mut book = book();
        book.add_order(limit(Side::Sell, 99, "1", T0), T0);
        book.add_order(limit(Side::Sell, 102, "1", T0 + 1), T0 + 1);

        let result = book.add_order(limit(Side::Buy, 100, "2", T0 + 2), T0 + 2);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.remaining, Quantity::from_u64(1));
        // Remainder rests as the new best bid below the surviving ask.
        assert_eq!(book.best_bid(), Some(Price::from_u64(100)));
        assert_eq!(book.best_ask(), Some(Price::from_u64(102)));
    }

    #[test]
    fn test_market_sell_consumes_bids_never_rests() {
        let mut book = book();
        book.add_order(limit(Side::Buy, 100, "1", T0), T0);

        let taker = Order::market(symbol(), Side::Sell, Quantity::from_u64(3), T0 + 1);
        let result = book.add_order(taker, T0 + 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.remaining, Quantity::from_u64(2));
        assert!(result.resting.is_none());
        assert_eq!(book.resting_count(), 0);
    }

    #[test]
    fn test_market_sell_walks_down_levels() {
        let mut book = book();
        book.add_order(limit(Side::Buy, 101, "1", T0), T0);
        book.add_order(limit(Side::Buy, 99, "1", T0 + 1), T0 + 1);

        let taker = Order::market(symbol(), Side::Sell, Quantity::from_u64(2), T0 + 2);
        let result = book.add_order(taker, T0 + 2);
        assert_eq!(result.trades[0].price, Price::from_u64(101));
        assert_eq!(result.trades[1].price, Price::from_u64(99));
    }

    #[test]
    fn test_cancel_removes_and_unindexes() {
        let mut book = book();
        let order = limit(Side::Buy, 100, "1", T0);
        let id = order.order_id;
        book.add_order(order, T0);

        let removed = book.cancel_order(&id).unwrap();
        assert_eq!(removed.order_id, id);
        assert!(!book.contains(&id));
        assert!(book.best_bid().is_none());

        // Second cancel is a no-op.
        assert!(book.cancel_order(&id).is_none());
    }

    #[test]
    fn test_cancel_preserves_other_orders_at_level() {
        let mut book = book();
        let first = limit(Side::Sell, 100, "1", T0);
        let second = limit(Side::Sell, 100, "2", T0 + 1);
        let third = limit(Side::Sell, 100, "3", T0 + 2);
        let first_id = first.order_id;
        let second_id = second.order_id;
        let third_id = third.order_id;
        book.add_order(first, T0);
        book.add_order(second, T0 + 1);
        book.add_order(third, T0 + 2);

        book.cancel_order(&second_id);

        let result = book.add_order(limit(Side::Buy, 100, "4", T0 + 3), T0 + 3);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id, first_id);
        assert_eq!(result.trades[1].maker_order_id, third_id);
    }

    #[test]
    fn test_snapshot_aggregates_levels() {
        let mut book = book();
        book.add_order(limit(Side::Buy, 99, "1", T0), T0);
        book.add_order(limit(Side::Buy, 99, "2", T0 + 1), T0 + 1);
        book.add_order(limit(Side::Sell, 101, "1.5", T0 + 2), T0 + 2);

        let snapshot = book.snapshot(10);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids[0].quantity, Quantity::from_u64(3));
        assert_eq!(snapshot.bids[0].order_count, 2);
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(
            snapshot.asks[0].quantity,
            Quantity::parse("1.5").unwrap()
        );
    }

    #[test]
    fn test_snapshot_depth_bound() {
        let mut book = book();
        for price in [95u64, 96, 97, 98, 99] {
            book.add_order(limit(Side::Buy, price, "1", T0), T0);
        }

        let snapshot = book.snapshot(3);
        assert_eq!(snapshot.bids.len(), 3);
        assert_eq!(snapshot.bids[0].price, Price::from_u64(99));
    }

    #[test]
    #[should_panic(expected = "order routed to the wrong book")]
    fn test_symbol_mismatch_panics() {
        let mut book = book();
        let foreign = Order::limit(
            Symbol::new("ETH-USD"),
            Side::Buy,
            Price::from_u64(100),
            Quantity::from_u64(1),
            T0,
        );
        book.add_order(foreign, T0);
    }

    #[test]
    fn test_filled_makers_leave_the_index() {
        let mut book = book();
        let maker = limit(Side::Sell, 100, "1", T0);
        let maker_id = maker.order_id;
        book.add_order(maker, T0);
        book.add_order(limit(Side::Buy, 100, "1", T0 + 1), T0 + 1);

        assert!(!book.contains(&maker_id));
        assert_eq!(book.resting_count(), 0);
    }
}
