pub mod orderbook;
pub mod orders;
pub mod wallets;
pub mod ws;

use axum::http::HeaderMap;

/// Read a header as an owned string, when present and valid UTF-8
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
