use crate::handlers::{orderbook, orders, wallets, ws};
use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/:order_id", delete(orders::cancel_order))
        .route("/orderbook/:symbol", get(orderbook::get_orderbook))
        .route("/wallets/deposit", post(wallets::deposit))
        .route("/wallets/balances", get(wallets::get_balances))
        .route("/ws", get(ws::feed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
