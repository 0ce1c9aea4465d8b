use super::header_value;
use crate::error::CoreResponse;
use crate::models::DepositRequest;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DepositRequest>,
) -> CoreResponse {
    let client_id = header_value(&headers, "X-Client-Id");
    CoreResponse(
        state
            .pipeline
            .deposit(client_id.as_deref(), &payload.asset, &payload.amount),
    )
}

pub async fn get_balances(State(state): State<AppState>, headers: HeaderMap) -> CoreResponse {
    let client_id = header_value(&headers, "X-Client-Id");
    CoreResponse(state.pipeline.balances(client_id.as_deref()))
}
