//! Matching engine
//!
//! A single-symbol order book with price-time priority. The book is
//! ownership-agnostic: it knows orders, not accounts. Settlement identity
//! lives with the caller.

pub mod book;
mod engine;

pub use engine::{MatchResult, OrderBook};
