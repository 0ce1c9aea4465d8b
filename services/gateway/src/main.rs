mod error;
mod handlers;
mod models;
mod router;
mod state;

use ledger::Ledger;
use market_data::{FanoutConfig, MarketFanout};
use outbox::{InMemoryBus, Outbox, OutboxPublisher, PublisherConfig};
use risk_engine::{RiskConfig, RiskGate};
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use trading::{OrderPipeline, PipelineConfig};
use types::ids::Symbol;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    tracing::info!("starting demex gateway");

    let symbols = symbols_from_env();
    let ledger = Arc::new(Ledger::new());
    let risk = Arc::new(RiskGate::new(RiskConfig::default()));
    let outbox = Arc::new(Outbox::new());
    let fanout = MarketFanout::new(FanoutConfig::default());
    let pipeline = Arc::new(OrderPipeline::new(
        PipelineConfig {
            symbols,
            ..PipelineConfig::default()
        },
        ledger,
        risk,
        outbox.clone(),
        fanout.clone(),
    ));

    // The demo process publishes to an in-memory bus; a broker-backed
    // EventBus drops in here without touching the publisher.
    let bus = Arc::new(InMemoryBus::new());
    let publisher = Arc::new(OutboxPublisher::new(
        outbox,
        bus,
        PublisherConfig::default(),
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let publisher_task = {
        let publisher = publisher.clone();
        let stop = stop_rx.clone();
        tokio::spawn(async move { publisher.run(stop).await })
    };
    let heartbeat_task = {
        let fanout = fanout.clone();
        let stop = stop_rx;
        tokio::spawn(async move { fanout.run_heartbeat(stop).await })
    };

    let app = create_router(AppState { pipeline, fanout });
    let addr: SocketAddr = std::env::var("DEMEX_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("shutting down");
    let _ = stop_tx.send(true);
    let _ = publisher_task.await;
    let _ = heartbeat_task.await;
    Ok(())
}

fn symbols_from_env() -> Vec<Symbol> {
    let raw = std::env::var("DEMEX_SYMBOLS").unwrap_or_else(|_| "BTC-USD".to_string());
    let symbols: Vec<Symbol> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let parsed = Symbol::try_new(s);
            if parsed.is_none() {
                tracing::warn!(symbol = s, "ignoring malformed symbol");
            }
            parsed
        })
        .collect();
    if symbols.is_empty() {
        vec![Symbol::new("BTC-USD")]
    } else {
        symbols
    }
}
