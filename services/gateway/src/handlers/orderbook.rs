use crate::error::CoreResponse;
use crate::models::DepthParams;
use crate::state::AppState;
use axum::extract::{Path, Query, State};

const DEFAULT_DEPTH: usize = 20;

pub async fn get_orderbook(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<DepthParams>,
) -> CoreResponse {
    let depth = params.depth.unwrap_or(DEFAULT_DEPTH);
    CoreResponse(state.pipeline.orderbook(&symbol, depth))
}
