//! The order pipeline
//!
//! One instance per process, holding its collaborators as explicit
//! dependencies. The placement path is linear and fail-fast: the first
//! 400-class error short-circuits before any ledger mutation.

use crate::idempotency::{IdempotencyCache, IdempotencyConfig};
use crate::owner::{OrderOwner, OrderOwnerTable};
use crate::response::{OrderStatus, PlaceOrderBody, TradeView};
use crate::settlement;
use ledger::Ledger;
use market_data::MarketFanout;
use matching_engine::{MatchResult, OrderBook};
use outbox::Outbox;
use parking_lot::Mutex;
use risk_engine::{OrderContext, RiskGate};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use types::events::{BalanceUpdated, OrderAccepted, OrderMatched, TradeSettled};
use types::ids::{ClientId, OrderId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::snapshot::BookSnapshot;
use types::time::now_nanos;
use uuid::Uuid;

/// Pipeline-level settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Symbols this process hosts books for
    pub symbols: Vec<Symbol>,
    /// Depth of the snapshots pushed to the market-data feed
    pub broadcast_depth: usize,
    pub idempotency: IdempotencyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: vec![Symbol::new("BTC-USD")],
            broadcast_depth: 20,
            idempotency: IdempotencyConfig::default(),
        }
    }
}

/// Raw order placement input, as extracted by the transport
///
/// Fields stay unparsed strings so the pipeline owns shape validation and
/// its error taxonomy (missing headers are never cached; malformed bodies
/// are cached once the caller is identifiable).
#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub client_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: String,
    pub price: Option<String>,
}

/// Transport-agnostic response: an HTTP-ish status and a JSON body
///
/// Stored verbatim in the idempotency cache so replays are byte-identical.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    fn ok(body: String) -> Self {
        Self { status: 200, body }
    }

    fn bad_request(errors: Vec<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "errors": errors }).to_string(),
        }
    }
}

struct ParsedOrder {
    symbol: Symbol,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    price: Option<Price>,
}

/// Orchestrates validate → reserve → match → settle → publish → fan out
pub struct OrderPipeline {
    config: PipelineConfig,
    ledger: Arc<Ledger>,
    risk: Arc<RiskGate>,
    outbox: Arc<Outbox>,
    fanout: MarketFanout,
    idempotency: IdempotencyCache,
    owners: OrderOwnerTable,
    books: HashMap<Symbol, Mutex<OrderBook>>,
}

impl OrderPipeline {
    pub fn new(
        config: PipelineConfig,
        ledger: Arc<Ledger>,
        risk: Arc<RiskGate>,
        outbox: Arc<Outbox>,
        fanout: MarketFanout,
    ) -> Self {
        let books = config
            .symbols
            .iter()
            .map(|s| (s.clone(), Mutex::new(OrderBook::new(s.clone()))))
            .collect();
        let idempotency = IdempotencyCache::new(config.idempotency.clone());
        info!(symbols = config.symbols.len(), "order pipeline ready");
        Self {
            config,
            ledger,
            risk,
            outbox,
            fanout,
            idempotency,
            owners: OrderOwnerTable::new(),
            books,
        }
    }

    /// Place an order using the current wall clock
    pub fn place_order(&self, input: &PlaceOrderInput) -> Response {
        self.place_order_at(input, now_nanos())
    }

    /// Place an order at an explicit timestamp (deterministic in tests)
    pub fn place_order_at(&self, input: &PlaceOrderInput, now: i64) -> Response {
        // Header errors identify no cacheable caller intent: never cached.
        let Some(client_id) = valid_header(&input.client_id) else {
            return Response::bad_request(vec!["missing X-Client-Id header".to_string()]);
        };
        let Some(key) = valid_header(&input.idempotency_key) else {
            return Response::bad_request(vec!["missing Idempotency-Key header".to_string()]);
        };

        if let Some((status, body)) = self.idempotency.try_get(client_id, key, now) {
            debug!(client = client_id, key, "idempotent replay");
            return Response { status, body };
        }

        let response = self.execute_order(client_id, input, now);
        self.idempotency
            .store(client_id, key, response.status, response.body.clone(), now);
        response
    }

    /// Everything past the idempotency gate; the result is always cached
    fn execute_order(&self, client_id: &str, input: &PlaceOrderInput, now: i64) -> Response {
        let parsed = match self.validate_shape(input) {
            Ok(parsed) => parsed,
            Err(errors) => return Response::bad_request(errors),
        };

        let risk_errors = self.risk.validate(
            &OrderContext {
                client_id,
                symbol: &parsed.symbol,
                order_type: parsed.order_type,
                quantity: parsed.quantity,
                price: parsed.price,
            },
            now,
        );
        if !risk_errors.is_empty() {
            return Response::bad_request(risk_errors);
        }

        let client: ClientId = client_id.into();
        if let Err(e) = settlement::reserve_for_order(
            &self.ledger,
            &client,
            &parsed.symbol,
            parsed.side,
            parsed.quantity,
            parsed.price,
        ) {
            return Response::bad_request(vec![e.to_string()]);
        }

        let order = match parsed.order_type {
            OrderType::Limit => Order::limit(
                parsed.symbol.clone(),
                parsed.side,
                parsed.price.expect("validated limit price"),
                parsed.quantity,
                now,
            ),
            OrderType::Market => {
                Order::market(parsed.symbol.clone(), parsed.side, parsed.quantity, now)
            }
        };
        let order_id = order.order_id;
        self.owners.insert(
            order_id,
            OrderOwner {
                client_id: client.clone(),
                symbol: parsed.symbol.clone(),
                side: parsed.side,
                order_type: parsed.order_type,
                limit_price: parsed.price,
            },
        );

        // Per-symbol critical section: matching, settlement, the last-trade
        // update, and the outbox enqueues appear atomic from outside.
        let (result, snapshot) = {
            let mut book = self
                .books
                .get(&parsed.symbol)
                .expect("symbol validated against the registry")
                .lock();
            let result = book.add_order(order, now);

            for trade in &result.trades {
                let maker = self
                    .owners
                    .get(&trade.maker_order_id)
                    .expect("maker owner recorded at ingress");
                let taker = self
                    .owners
                    .get(&trade.taker_order_id)
                    .expect("taker owner recorded at ingress");
                let settled = settlement::settle_trade(&self.ledger, trade, &maker, &taker);

                self.enqueue(
                    &OrderMatched {
                        trade_id: trade.trade_id,
                        symbol: trade.symbol.clone(),
                        price: trade.price,
                        quantity: trade.quantity,
                        maker_order_id: trade.maker_order_id,
                        taker_order_id: trade.taker_order_id,
                        executed_at: trade.executed_at,
                    },
                    now,
                );
                self.enqueue(
                    &TradeSettled {
                        trade_id: trade.trade_id,
                        symbol: trade.symbol.clone(),
                        buyer: settled.buyer.clone(),
                        seller: settled.seller.clone(),
                        price: trade.price,
                        quantity: trade.quantity,
                        notional: settled.notional,
                        settled_at: now,
                    },
                    now,
                );
                for client in [&settled.buyer, &settled.seller] {
                    for asset in [parsed.symbol.base(), parsed.symbol.quote()] {
                        self.enqueue_balance_updated(client, asset, now);
                    }
                }

                if !book.contains(&trade.maker_order_id) {
                    self.owners.remove(&trade.maker_order_id);
                }
            }

            if let Some(last) = result.trades.last() {
                self.risk.update_last_trade_price(&parsed.symbol, last.price);
            }

            // A market remainder cannot rest; hand its reservation back.
            if parsed.order_type == OrderType::Market && !result.remaining.is_zero() {
                let owner = self
                    .owners
                    .get(&order_id)
                    .expect("taker owner recorded at ingress");
                settlement::release_remainder(
                    &self.ledger,
                    &owner,
                    &parsed.symbol,
                    result.remaining,
                )
                .expect("market remainder must still be reserved");
                self.enqueue_balance_updated(&client, parsed.symbol.base(), now);
            }

            if result.resting.is_none() {
                self.owners.remove(&order_id);
            }

            self.enqueue(
                &OrderAccepted {
                    order_id,
                    client_id: client.clone(),
                    symbol: parsed.symbol.clone(),
                    quantity: parsed.quantity,
                    remaining: result.remaining,
                    accepted_at: now,
                },
                now,
            );

            let snapshot = book.snapshot(self.config.broadcast_depth);
            (result, snapshot)
        };

        self.broadcast(&parsed.symbol, &result, snapshot);

        let body = PlaceOrderBody {
            order_id,
            status: OrderStatus::resolve(result.remaining, result.trades.len()),
            remaining_quantity: result.remaining,
            trades: result.trades.iter().map(TradeView::from).collect(),
        };
        debug!(
            order = %order_id,
            trades = result.trades.len(),
            remaining = %result.remaining,
            "order processed"
        );
        Response::ok(serde_json::to_string(&body).expect("response body always serializes"))
    }

    /// Cancel a resting order owned by the caller
    pub fn cancel_order(&self, client_id: Option<&str>, order_id: &str) -> Response {
        let Some(client_id) = client_id.filter(|s| !s.is_empty()) else {
            return Response::bad_request(vec!["missing X-Client-Id header".to_string()]);
        };
        let Ok(uuid) = Uuid::from_str(order_id) else {
            return Response::bad_request(vec![format!("malformed order id: {order_id}")]);
        };
        let order_id = OrderId::from_uuid(uuid);

        let Some(owner) = self.owners.get(&order_id) else {
            return Response::bad_request(vec!["unknown order".to_string()]);
        };
        if owner.client_id.as_str() != client_id {
            // Do not leak other clients' order ids.
            return Response::bad_request(vec!["unknown order".to_string()]);
        }

        let now = now_nanos();
        let snapshot = {
            let mut book = self
                .books
                .get(&owner.symbol)
                .expect("owned orders live in hosted books")
                .lock();
            let Some(cancelled) = book.cancel_order(&order_id) else {
                return Response::bad_request(vec!["unknown order".to_string()]);
            };
            settlement::release_remainder(
                &self.ledger,
                &owner,
                &owner.symbol,
                cancelled.remaining,
            )
            .expect("resting order keeps its reservation");
            self.owners.remove(&order_id);

            let reserved_asset = match owner.side {
                Side::Buy => owner.symbol.quote(),
                Side::Sell => owner.symbol.base(),
            };
            self.enqueue_balance_updated(&owner.client_id, reserved_asset, now);
            book.snapshot(self.config.broadcast_depth)
        };
        self.fanout.broadcast_orderbook(&owner.symbol, snapshot);

        Response::ok(json!({ "orderId": order_id, "status": "CANCELLED" }).to_string())
    }

    /// Credit a deposit and report the updated balance
    pub fn deposit(&self, client_id: Option<&str>, asset: &str, amount: &str) -> Response {
        let Some(client_id) = client_id.filter(|s| !s.is_empty()) else {
            return Response::bad_request(vec!["missing X-Client-Id header".to_string()]);
        };
        let Some(amount) = parse_positive_decimal(amount) else {
            return Response::bad_request(vec!["amount must be a positive decimal".to_string()]);
        };
        if asset.trim().is_empty() {
            return Response::bad_request(vec!["asset must not be empty".to_string()]);
        }

        let client: ClientId = client_id.into();
        match self.ledger.deposit(&client, asset, amount) {
            Ok(()) => {
                self.enqueue_balance_updated(&client, asset, now_nanos());
                let view = self.ledger.balance(&client, asset);
                Response::ok(
                    serde_json::to_string(&view).expect("balance view always serializes"),
                )
            }
            Err(e) => Response::bad_request(vec![e.to_string()]),
        }
    }

    /// All balances for a client
    pub fn balances(&self, client_id: Option<&str>) -> Response {
        let Some(client_id) = client_id.filter(|s| !s.is_empty()) else {
            return Response::bad_request(vec!["missing X-Client-Id header".to_string()]);
        };
        let views = self.ledger.balances(&client_id.into());
        Response::ok(serde_json::to_string(&views).expect("balance views always serialize"))
    }

    /// Depth-bounded book snapshot for one symbol
    pub fn orderbook(&self, symbol: &str, depth: usize) -> Response {
        let Some(book) = Symbol::try_new(symbol).and_then(|s| self.books.get(&s)) else {
            return Response::bad_request(vec![format!("unknown symbol: {symbol}")]);
        };
        let snapshot = book.lock().snapshot(depth);
        Response::ok(serde_json::to_string(&snapshot).expect("snapshot always serializes"))
    }

    /// Snapshot used to seed a new feed subscription
    pub fn feed_snapshot(&self, symbol: &Symbol, depth: usize) -> Option<BookSnapshot> {
        self.books.get(symbol).map(|b| b.lock().snapshot(depth))
    }

    /// Whether this process hosts a book for the symbol
    pub fn hosts_symbol(&self, symbol: &Symbol) -> bool {
        self.books.contains_key(symbol)
    }

    fn validate_shape(&self, input: &PlaceOrderInput) -> Result<ParsedOrder, Vec<String>> {
        let mut errors = Vec::new();

        let symbol = match Symbol::try_new(input.symbol.clone()) {
            Some(symbol) if self.books.contains_key(&symbol) => Some(symbol),
            _ => {
                errors.push(format!("unknown symbol: {}", input.symbol));
                None
            }
        };

        let side = match input.side.as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            other => {
                errors.push(format!("side must be BUY or SELL, got: {other}"));
                None
            }
        };

        let order_type = match input.order_type.as_str() {
            "LIMIT" => Some(OrderType::Limit),
            "MARKET" => Some(OrderType::Market),
            other => {
                errors.push(format!("type must be LIMIT or MARKET, got: {other}"));
                None
            }
        };

        let quantity = match parse_positive_decimal(&input.quantity) {
            Some(quantity) => Quantity::try_positive(quantity),
            None => None,
        };
        if quantity.is_none() {
            errors.push("quantity must be a positive decimal".to_string());
        }

        let price = match (order_type, &input.price) {
            (Some(OrderType::Limit), Some(raw)) => match parse_positive_decimal(raw) {
                Some(value) => Price::try_new(value),
                None => {
                    errors.push("price must be a positive decimal".to_string());
                    None
                }
            },
            (Some(OrderType::Limit), None) => {
                errors.push("limit orders require a price".to_string());
                None
            }
            (Some(OrderType::Market), Some(_)) => {
                errors.push("market orders must not carry a price".to_string());
                None
            }
            _ => None,
        };

        // No maximum-quote-amount parameter exists, so a market buy has no
        // spend bound and is rejected outright.
        if side == Some(Side::Buy) && order_type == Some(OrderType::Market) {
            errors.push("market buy orders are not supported".to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ParsedOrder {
            symbol: symbol.expect("validated"),
            side: side.expect("validated"),
            order_type: order_type.expect("validated"),
            quantity: quantity.expect("validated"),
            price,
        })
    }

    fn broadcast(&self, symbol: &Symbol, result: &MatchResult, snapshot: BookSnapshot) {
        self.fanout.broadcast_orderbook(symbol, snapshot);
        if !result.trades.is_empty() {
            self.fanout.broadcast_trades(symbol, &result.trades);
        }
    }

    fn enqueue(&self, event: &impl types::events::IntegrationEvent, now: i64) {
        self.outbox
            .enqueue(event, now)
            .expect("event payloads always serialize");
    }

    fn enqueue_balance_updated(&self, client: &ClientId, asset: &str, now: i64) {
        let view = self.ledger.balance(client, asset);
        self.enqueue(
            &BalanceUpdated {
                client_id: client.clone(),
                asset: view.asset,
                available: view.available,
                reserved: view.reserved,
                updated_at: now,
            },
            now,
        );
    }
}

fn valid_header(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn parse_positive_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok().filter(|d| *d > Decimal::ZERO)
}
