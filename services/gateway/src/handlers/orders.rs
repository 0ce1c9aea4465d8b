use super::header_value;
use crate::error::CoreResponse;
use crate::models::CreateOrderRequest;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use trading::PlaceOrderInput;

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> CoreResponse {
    let input = PlaceOrderInput {
        client_id: header_value(&headers, "X-Client-Id"),
        idempotency_key: header_value(&headers, "Idempotency-Key"),
        symbol: payload.symbol,
        side: payload.side,
        order_type: payload.order_type,
        quantity: payload.quantity,
        price: payload.price,
    };
    CoreResponse(state.pipeline.place_order(&input))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> CoreResponse {
    let client_id = header_value(&headers, "X-Client-Id");
    CoreResponse(state.pipeline.cancel_order(client_id.as_deref(), &order_id))
}
