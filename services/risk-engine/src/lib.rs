//! Pre-trade risk checks
//!
//! Stateless with respect to orders; keeps only a last-trade price per
//! symbol and a per-client sliding request window.

mod gate;

pub use gate::{OrderContext, RiskConfig, RiskGate};
