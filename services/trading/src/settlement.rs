//! Reservation and settlement deltas
//!
//! Reservation happens before matching; settlement transfers the reserved
//! funds once a trade exists. The refund for a limit buy that crossed at a
//! better price lives here, keyed off the owner table's recorded limit
//! price, keeping the book ownership-agnostic and the ledger trade-agnostic.

use crate::owner::OrderOwner;
use ledger::Ledger;
use rust_decimal::Decimal;
use types::errors::LedgerError;
use types::ids::{ClientId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{OrderType, Side};
use types::trade::Trade;

/// Who moved what in one settled trade; feeds the integration events
#[derive(Debug, Clone)]
pub struct Settlement {
    pub buyer: ClientId,
    pub seller: ClientId,
    pub notional: Decimal,
}

/// Reserve the funds an order may consume
///
/// Buy limits reserve quote at the limit price; sells (limit or market)
/// reserve base equal to the quantity. Market buys never reach this point.
pub fn reserve_for_order(
    ledger: &Ledger,
    client: &ClientId,
    symbol: &Symbol,
    side: Side,
    quantity: Quantity,
    limit_price: Option<Price>,
) -> Result<(), LedgerError> {
    match side {
        Side::Buy => {
            let price = limit_price.expect("buy reservation requires a limit price");
            ledger.reserve(client, symbol.quote(), quantity.notional(price))
        }
        Side::Sell => ledger.reserve(client, symbol.base(), quantity.as_decimal()),
    }
}

/// Apply the ledger deltas for one trade
///
/// Trade price P, quantity Q, notional N = P·Q:
/// buyer releases and debits N quote and is credited Q base; seller releases
/// and debits Q base and is credited N quote. A buyer whose limit L exceeds
/// P gets the excess reservation (L−P)·Q released back to available.
///
/// # Panics
/// Panics when an owner is missing or a reserved balance cannot cover its
/// own settlement; both mean the pipeline's bookkeeping is broken, and the
/// trade must not half-apply.
pub fn settle_trade(ledger: &Ledger, trade: &Trade, maker: &OrderOwner, taker: &OrderOwner) -> Settlement {
    let (buyer, seller) = match (maker.side, taker.side) {
        (Side::Buy, Side::Sell) => (maker, taker),
        (Side::Sell, Side::Buy) => (taker, maker),
        _ => panic!("maker and taker on the same side"),
    };

    let symbol = &trade.symbol;
    let base = symbol.base();
    let quote = symbol.quote();
    let quantity = trade.quantity.as_decimal();
    let notional = trade.notional();

    ledger
        .release(&buyer.client_id, quote, notional)
        .expect("buyer reservation must cover the notional");
    ledger
        .debit(&buyer.client_id, quote, notional)
        .expect("released funds must be debitable");
    ledger
        .credit(&buyer.client_id, base, quantity)
        .expect("credit cannot fail");

    ledger
        .release(&seller.client_id, base, quantity)
        .expect("seller reservation must cover the quantity");
    ledger
        .debit(&seller.client_id, base, quantity)
        .expect("released funds must be debitable");
    ledger
        .credit(&seller.client_id, quote, notional)
        .expect("credit cannot fail");

    // Price improvement: the buyer reserved at their limit, the trade
    // executed at the maker's better price. Hand the excess back.
    if buyer.order_type == OrderType::Limit {
        let limit = buyer
            .limit_price
            .expect("limit owner carries a limit price");
        if limit > trade.price {
            let excess = (limit.as_decimal() - trade.price.as_decimal()) * quantity;
            ledger
                .release(&buyer.client_id, quote, excess)
                .expect("improvement excess must still be reserved");
        }
    }

    Settlement {
        buyer: buyer.client_id.clone(),
        seller: seller.client_id.clone(),
        notional,
    }
}

/// Give back the reservation behind an unfilled remainder
///
/// Used when a market sell exhausts liquidity and for cancellations.
pub fn release_remainder(
    ledger: &Ledger,
    owner: &OrderOwner,
    symbol: &Symbol,
    remaining: Quantity,
) -> Result<(), LedgerError> {
    if remaining.is_zero() {
        return Ok(());
    }
    match owner.side {
        Side::Buy => {
            let price = owner
                .limit_price
                .expect("buy reservation requires a limit price");
            ledger.release(&owner.client_id, symbol.quote(), remaining.notional(price))
        }
        Side::Sell => ledger.release(&owner.client_id, symbol.base(), remaining.as_decimal()),
    }
}
