//! The fan-out manager

use crate::limiter::TokenBucket;
use crate::messages::{FeedMessage, PublicTrade};
use crate::transport::FeedTransport;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, info, warn};
use types::ids::Symbol;
use types::snapshot::BookSnapshot;
use types::time::{now_nanos, to_rfc3339};
use types::trade::Trade;

/// Opaque handle for one feed connection
pub type ConnectionId = u64;

/// Fan-out tuning
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Coalescing delay after the first buffered message
    pub batch_window: Duration,
    /// Ping cadence
    pub heartbeat_interval: Duration,
    /// Budget for one send to one connection
    pub send_timeout: Duration,
    /// Optional-message budget per connection; 0 disables limiting
    pub max_messages_per_second: u32,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(30),
            send_timeout: Duration::from_secs(1),
            max_messages_per_second: 10,
        }
    }
}

struct Subscriber {
    transport: Arc<dyn FeedTransport>,
    bucket: Mutex<TokenBucket>,
}

#[derive(Default)]
struct PendingBuffer {
    /// Coalesced: only the latest snapshot survives the window
    snapshot: Option<BookSnapshot>,
    /// Append-only within the window, engine order preserved
    trades: Vec<Trade>,
    flush_scheduled: bool,
}

struct SymbolHub {
    subscribers: DashMap<ConnectionId, Subscriber>,
    buffer: Mutex<PendingBuffer>,
}

impl SymbolHub {
    fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: Mutex::new(PendingBuffer::default()),
        }
    }
}

struct Inner {
    config: FanoutConfig,
    hubs: DashMap<Symbol, Arc<SymbolHub>>,
    connections: DashMap<ConnectionId, Symbol>,
    next_connection_id: AtomicU64,
}

/// Per-symbol batched, rate-limited market-data broadcast
///
/// Producers call `broadcast_*`, which only stash state under the buffer
/// mutex and arm a one-shot timer; the timer task drains the buffer and
/// performs the sends. Slow or dead connections are dropped after the
/// broadcast pass, never blocking it. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MarketFanout {
    inner: Arc<Inner>,
}

impl MarketFanout {
    pub fn new(config: FanoutConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                hubs: DashMap::new(),
                connections: DashMap::new(),
                next_connection_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a connection for a symbol's feed
    pub fn subscribe(&self, symbol: &Symbol, transport: Arc<dyn FeedTransport>) -> ConnectionId {
        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let hub = self.hub(symbol);
        hub.subscribers.insert(
            id,
            Subscriber {
                transport,
                bucket: Mutex::new(TokenBucket::new(now_nanos())),
            },
        );
        self.inner.connections.insert(id, symbol.clone());
        debug!(connection = id, %symbol, "feed subscribed");
        id
    }

    /// Drop a connection from a symbol's feed; no-op when unknown
    pub fn unsubscribe(&self, symbol: &Symbol, connection_id: ConnectionId) {
        if let Some(hub) = self.inner.hubs.get(symbol) {
            hub.subscribers.remove(&connection_id);
        }
        self.inner.connections.remove(&connection_id);
        debug!(connection = connection_id, %symbol, "feed unsubscribed");
    }

    /// Unicast the initial snapshot to one subscriber
    ///
    /// Mandatory on new subscriptions: bypasses the rate limiter (but not
    /// the send timeout).
    pub async fn send_snapshot(&self, connection_id: ConnectionId, snapshot: BookSnapshot) {
        let Some(symbol) = self.inner.connections.get(&connection_id).map(|s| s.clone()) else {
            return;
        };
        let Some(hub) = self.inner.hubs.get(&symbol).map(|h| h.clone()) else {
            return;
        };
        let Some(transport) = hub
            .subscribers
            .get(&connection_id)
            .map(|s| s.transport.clone())
        else {
            return;
        };

        let frame = encode(&FeedMessage::Snapshot {
            symbol: symbol.clone(),
            snapshot,
        });
        if !self.timed_send(&transport, frame).await {
            warn!(connection = connection_id, %symbol, "snapshot send failed; dropping subscriber");
            self.unsubscribe(&symbol, connection_id);
        }
    }

    /// Stash the latest book snapshot and arm the batch timer
    pub fn broadcast_orderbook(&self, symbol: &Symbol, snapshot: BookSnapshot) {
        let hub = self.hub(symbol);
        let mut buffer = hub.buffer.lock();
        buffer.snapshot = Some(snapshot);
        self.arm_flush(symbol, &mut buffer);
    }

    /// Append trades (engine order) and arm the batch timer
    pub fn broadcast_trades(&self, symbol: &Symbol, trades: &[Trade]) {
        if trades.is_empty() {
            return;
        }
        let hub = self.hub(symbol);
        let mut buffer = hub.buffer.lock();
        buffer.trades.extend_from_slice(trades);
        self.arm_flush(symbol, &mut buffer);
    }

    fn hub(&self, symbol: &Symbol) -> Arc<SymbolHub> {
        self.inner
            .hubs
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(SymbolHub::new()))
            .clone()
    }

    fn arm_flush(&self, symbol: &Symbol, buffer: &mut PendingBuffer) {
        if buffer.flush_scheduled {
            return;
        }
        buffer.flush_scheduled = true;
        let fanout = self.clone();
        let symbol = symbol.clone();
        let window = self.inner.config.batch_window;
        tokio::spawn(async move {
            sleep(window).await;
            fanout.flush(&symbol).await;
        });
    }

    /// Drain the pending buffer and emit at most two frames per subscriber
    async fn flush(&self, symbol: &Symbol) {
        let Some(hub) = self.inner.hubs.get(symbol).map(|h| h.clone()) else {
            return;
        };

        let (snapshot, trades) = {
            let mut buffer = hub.buffer.lock();
            buffer.flush_scheduled = false;
            (buffer.snapshot.take(), std::mem::take(&mut buffer.trades))
        };

        let mut frames = Vec::new();
        if let Some(snapshot) = snapshot {
            frames.push(encode(&FeedMessage::Orderbook {
                symbol: symbol.clone(),
                snapshot,
            }));
        }
        match trades.len() {
            0 => {}
            1 => frames.push(encode(&FeedMessage::Trade {
                symbol: symbol.clone(),
                trade: PublicTrade::from(&trades[0]),
            })),
            _ => frames.push(encode(&FeedMessage::Trades {
                symbol: symbol.clone(),
                trades: trades.iter().map(PublicTrade::from).collect(),
            })),
        }
        if frames.is_empty() {
            return;
        }
        debug!(%symbol, frames = frames.len(), trades = trades.len(), "flushing feed buffer");

        let mut dead = Vec::new();
        for frame in frames {
            dead.extend(self.deliver(&hub, frame).await);
        }
        self.remove_dead(symbol, &hub, dead);
    }

    /// Broadcast one frame to every subscriber of a hub, rate-limited
    ///
    /// Returns connections whose sends failed or timed out.
    async fn deliver(&self, hub: &SymbolHub, frame: String) -> Vec<ConnectionId> {
        let now = now_nanos();
        let max = self.inner.config.max_messages_per_second;

        // Snapshot targets first so no map guard lives across an await.
        let targets: Vec<(ConnectionId, Arc<dyn FeedTransport>)> = hub
            .subscribers
            .iter()
            .filter_map(|entry| {
                let allowed = entry.value().bucket.lock().try_consume(now, max);
                if allowed {
                    Some((*entry.key(), entry.value().transport.clone()))
                } else {
                    debug!(connection = *entry.key(), "rate limited; dropping frame");
                    None
                }
            })
            .collect();

        let sends = targets.iter().map(|(id, transport)| {
            let frame = frame.clone();
            async move {
                if self.timed_send(transport, frame).await {
                    None
                } else {
                    Some(*id)
                }
            }
        });

        join_all(sends).await.into_iter().flatten().collect()
    }

    async fn timed_send(&self, transport: &Arc<dyn FeedTransport>, frame: String) -> bool {
        matches!(
            timeout(self.inner.config.send_timeout, transport.send(frame)).await,
            Ok(Ok(()))
        )
    }

    fn remove_dead(&self, symbol: &Symbol, hub: &SymbolHub, dead: Vec<ConnectionId>) {
        for connection_id in dead {
            warn!(connection = connection_id, %symbol, "send failed; dropping subscriber");
            hub.subscribers.remove(&connection_id);
            self.inner.connections.remove(&connection_id);
        }
    }

    /// Fan a ping out to every subscriber of every symbol
    pub async fn send_heartbeat(&self) {
        let frame = encode(&FeedMessage::Ping {
            timestamp_utc: to_rfc3339(now_nanos()),
        });
        let hubs: Vec<(Symbol, Arc<SymbolHub>)> = self
            .inner
            .hubs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (symbol, hub) in hubs {
            let dead = self.deliver(&hub, frame.clone()).await;
            self.remove_dead(&symbol, &hub, dead);
        }
    }

    /// Ping loop; stops when the signal flips true
    pub async fn run_heartbeat(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.inner.config.heartbeat_interval);
        info!("heartbeat loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop.borrow() {
                break;
            }
            self.send_heartbeat().await;
        }
        info!("heartbeat loop stopped");
    }

    /// Subscribers currently registered for a symbol
    pub fn subscriber_count(&self, symbol: &Symbol) -> usize {
        self.inner
            .hubs
            .get(symbol)
            .map_or(0, |hub| hub.subscribers.len())
    }
}

fn encode(message: &FeedMessage) -> String {
    serde_json::to_string(message).expect("feed messages always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use types::ids::OrderId;
    use types::numeric::{Price, Quantity};

    const T0: i64 = 1708123456789000000;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Mutex<Vec<String>>,
        fail: std::sync::atomic::AtomicBool,
        stall: std::sync::atomic::AtomicBool,
    }

    impl RecordingTransport {
        fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }
    }

    #[async_trait]
    impl FeedTransport for RecordingTransport {
        async fn send(&self, frame: String) -> Result<(), String> {
            if self.stall.load(Ordering::Relaxed) {
                std::future::pending::<()>().await;
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err("connection reset".to_string());
            }
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD")
    }

    fn empty_snapshot() -> BookSnapshot {
        BookSnapshot {
            symbol: symbol(),
            bids: vec![],
            asks: vec![],
        }
    }

    fn trade(n: u64) -> Trade {
        Trade::new(
            symbol(),
            Price::from_u64(100 + n),
            Quantity::from_u64(1),
            OrderId::new(),
            OrderId::new(),
            T0 + n as i64,
        )
    }

    async fn run_timers() {
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_trade_batches_coalesce_into_one_frame() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), transport.clone());

        let first: Vec<Trade> = (0..3).map(trade).collect();
        let second: Vec<Trade> = (3..6).map(trade).collect();
        fanout.broadcast_trades(&symbol(), &first);
        fanout.broadcast_trades(&symbol(), &second);

        run_timers().await;

        let frames = transport.frames();
        assert_eq!(frames.len(), 1, "both batches share one flush");
        let message: FeedMessage = serde_json::from_str(&frames[0]).unwrap();
        match message {
            FeedMessage::Trades { trades, .. } => {
                assert_eq!(trades.len(), 6);
                let prices: Vec<Price> = trades.iter().map(|t| t.price).collect();
                let expected: Vec<Price> = (0..6).map(|n| Price::from_u64(100 + n)).collect();
                assert_eq!(prices, expected, "engine order preserved");
            }
            other => panic!("expected trades frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trade_flushes_as_trade_frame() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), transport.clone());

        fanout.broadcast_trades(&symbol(), &[trade(0)]);
        run_timers().await;

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"type\":\"trade\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_coalesces_last_writer_wins() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), transport.clone());

        let stale = empty_snapshot();
        let fresh = BookSnapshot {
            symbol: symbol(),
            bids: vec![types::snapshot::LevelView {
                price: Price::from_u64(99),
                quantity: Quantity::from_u64(1),
                order_count: 1,
            }],
            asks: vec![],
        };
        fanout.broadcast_orderbook(&symbol(), stale);
        fanout.broadcast_orderbook(&symbol(), fresh);

        run_timers().await;

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        let message: FeedMessage = serde_json::from_str(&frames[0]).unwrap();
        match message {
            FeedMessage::Orderbook { snapshot, .. } => assert_eq!(snapshot.bids.len(), 1),
            other => panic!("expected orderbook frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_and_trades_flush_in_order() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), transport.clone());

        fanout.broadcast_trades(&symbol(), &[trade(0), trade(1)]);
        fanout.broadcast_orderbook(&symbol(), empty_snapshot());
        run_timers().await;

        let frames = transport.frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("\"type\":\"orderbook\""));
        assert!(frames[1].contains("\"type\":\"trades\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_drops_excess_frames() {
        let fanout = MarketFanout::new(FanoutConfig {
            max_messages_per_second: 1,
            ..FanoutConfig::default()
        });
        let transport = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), transport.clone());

        // One flush carrying two frames: the second exceeds the budget.
        fanout.broadcast_orderbook(&symbol(), empty_snapshot());
        fanout.broadcast_trades(&symbol(), &[trade(0)]);
        run_timers().await;

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"type\":\"orderbook\""));
        // Still subscribed: rate limiting is a drop, not a failure.
        assert_eq!(fanout.subscriber_count(&symbol()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unicast_snapshot_bypasses_rate_limit() {
        let fanout = MarketFanout::new(FanoutConfig {
            max_messages_per_second: 1,
            ..FanoutConfig::default()
        });
        let transport = Arc::new(RecordingTransport::default());
        let connection = fanout.subscribe(&symbol(), transport.clone());

        // Exhaust the optional-message budget first.
        fanout.broadcast_orderbook(&symbol(), empty_snapshot());
        run_timers().await;
        assert_eq!(transport.frames().len(), 1);

        fanout.send_snapshot(connection, empty_snapshot()).await;
        let frames = transport.frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains("\"type\":\"snapshot\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscriber_removed_after_broadcast() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let healthy = Arc::new(RecordingTransport::default());
        let broken = Arc::new(RecordingTransport::default());
        broken.fail.store(true, Ordering::Relaxed);

        fanout.subscribe(&symbol(), healthy.clone());
        fanout.subscribe(&symbol(), broken.clone());
        assert_eq!(fanout.subscriber_count(&symbol()), 2);

        fanout.broadcast_trades(&symbol(), &[trade(0)]);
        run_timers().await;

        assert_eq!(healthy.frames().len(), 1);
        assert_eq!(fanout.subscriber_count(&symbol()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscriber_times_out_and_is_removed() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let stalled = Arc::new(RecordingTransport::default());
        stalled.stall.store(true, Ordering::Relaxed);
        fanout.subscribe(&symbol(), stalled.clone());

        fanout.broadcast_trades(&symbol(), &[trade(0)]);
        // Batch window plus the full send timeout.
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert_eq!(fanout.subscriber_count(&symbol()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_reaches_all_symbols() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let btc = Arc::new(RecordingTransport::default());
        let eth = Arc::new(RecordingTransport::default());
        fanout.subscribe(&symbol(), btc.clone());
        fanout.subscribe(&Symbol::new("ETH-USD"), eth.clone());

        fanout.send_heartbeat().await;

        assert!(btc.frames()[0].contains("\"type\":\"ping\""));
        assert!(eth.frames()[0].contains("\"type\":\"ping\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery() {
        let fanout = MarketFanout::new(FanoutConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        let connection = fanout.subscribe(&symbol(), transport.clone());

        fanout.unsubscribe(&symbol(), connection);
        fanout.broadcast_trades(&symbol(), &[trade(0)]);
        run_timers().await;

        assert!(transport.frames().is_empty());
    }
}
