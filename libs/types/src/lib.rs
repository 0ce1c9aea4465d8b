//! Shared types for the demex trading core
//!
//! Core type definitions used across every service crate: identifiers,
//! fixed-point decimals, order and trade entities, book snapshots,
//! integration events, and the shared error taxonomy.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, EventId, ClientId, Symbol)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Order entity and enums
//! - `trade`: Trade entity
//! - `snapshot`: Order-book depth projections
//! - `events`: Type-tagged integration events
//! - `errors`: Error taxonomy

pub mod errors;
pub mod events;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod snapshot;
pub mod time;
pub mod trade;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::snapshot::*;
    pub use crate::trade::*;
}
