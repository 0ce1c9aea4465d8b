//! WebSocket feed handler
//!
//! Protocol: the client's first text frame is `{"symbol": "...", "depth": N?}`.
//! The server replies with a unicast `snapshot` and then streams batched
//! `orderbook` / `trade` / `trades` / `ping` frames until the client leaves.

use super::header_value;
use crate::models::SubscribeRequest;
use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures::stream::StreamExt;
use futures::SinkExt;
use market_data::FeedTransport;
use std::sync::Arc;
use tracing::debug;
use types::ids::Symbol;

const DEFAULT_DEPTH: usize = 20;

pub async fn feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let client = header_value(&headers, "X-Client-Id").unwrap_or_else(|| "anonymous".to_string());
    upgrade.on_upgrade(move |socket| serve_feed(state, socket, client))
}

/// The fan-out's view of one WebSocket
struct WsFeed {
    sink: tokio::sync::Mutex<futures::stream::SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl FeedTransport for WsFeed {
    async fn send(&self, frame: String) -> Result<(), String> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| e.to_string())
    }
}

async fn serve_feed(state: AppState, socket: WebSocket, client: String) {
    let (sink, mut stream) = socket.split();
    let transport = Arc::new(WsFeed {
        sink: tokio::sync::Mutex::new(sink),
    });

    // First frame picks the symbol.
    let request = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<SubscribeRequest>(&text) {
                    Ok(request) => break request,
                    Err(_) => {
                        let _ = transport
                            .send(r#"{"errors":["expected {\"symbol\":...,\"depth\":...}"]}"#.to_string())
                            .await;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => {}
        }
    };

    let Some(symbol) = Symbol::try_new(request.symbol.as_str()) else {
        let _ = transport
            .send(format!(r#"{{"errors":["unknown symbol: {}"]}}"#, request.symbol))
            .await;
        return;
    };
    let depth = request.depth.unwrap_or(DEFAULT_DEPTH);
    let Some(snapshot) = state.pipeline.feed_snapshot(&symbol, depth) else {
        let _ = transport
            .send(format!(r#"{{"errors":["unknown symbol: {}"]}}"#, symbol))
            .await;
        return;
    };

    let connection = state.fanout.subscribe(&symbol, transport.clone());
    debug!(%symbol, connection, client, "feed connected");

    // Mandatory initial snapshot, unrated.
    state.fanout.send_snapshot(connection, snapshot).await;

    // Drain the client side until it goes away; inbound frames are ignored.
    loop {
        match stream.next().await {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }

    state.fanout.unsubscribe(&symbol, connection);
    debug!(%symbol, connection, client, "feed disconnected");
}
