use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Adapter from the pipeline's transport-agnostic responses to HTTP
///
/// The pipeline already produced a serialized JSON body (possibly replayed
/// from the idempotency cache), so the body passes through untouched.
pub struct CoreResponse(pub trading::Response);

impl IntoResponse for CoreResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.0.body,
        )
            .into_response()
    }
}
