//! Reservation ledger
//!
//! Per-client, per-asset available/reserved balances with all-or-nothing
//! operations. Reserving moves funds from available to reserved inside one
//! account; no asset ever leaves an account except through settlement's
//! debit/credit pair, so the per-asset sum across accounts equals the sum of
//! deposits at every observable instant.

mod balance;
mod book;

pub use balance::{AssetBalance, BalanceView};
pub use book::Ledger;
