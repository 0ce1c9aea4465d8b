//! The risk gate

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use types::ids::{ClientId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::OrderType;

const WINDOW_NANOS: i64 = 60 * 1_000_000_000;

/// Risk limits; a zero value disables the corresponding check
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Largest quantity a single order may carry
    pub max_quantity_per_order: Quantity,
    /// Allowed deviation of a limit price from the last trade, in percent
    pub price_band_percent: Decimal,
    /// Orders a client may submit per sliding minute
    pub requests_per_minute_per_client: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_quantity_per_order: Quantity::zero(),
            price_band_percent: Decimal::ZERO,
            requests_per_minute_per_client: 0,
        }
    }
}

/// The order fields the gate validates
#[derive(Debug, Clone)]
pub struct OrderContext<'a> {
    pub client_id: &'a str,
    pub symbol: &'a Symbol,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
}

/// Pre-trade validation: quantity cap, price band, request rate
///
/// `validate` collects every failing check so the caller can report all of
/// them in one response.
#[derive(Debug)]
pub struct RiskGate {
    config: RiskConfig,
    last_trade: Mutex<HashMap<Symbol, Price>>,
    request_log: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            last_trade: Mutex::new(HashMap::new()),
            request_log: Mutex::new(HashMap::new()),
        }
    }

    /// Run every check; an empty vec means the order passed
    pub fn validate(&self, ctx: &OrderContext<'_>, now: i64) -> Vec<String> {
        let mut errors = Vec::new();

        if ctx.client_id.is_empty() {
            errors.push("client id must not be empty".to_string());
        }

        let cap = self.config.max_quantity_per_order;
        if !cap.is_zero() && ctx.quantity.as_decimal() > cap.as_decimal() {
            errors.push(format!(
                "quantity {} exceeds the per-order maximum of {}",
                ctx.quantity, cap
            ));
        }

        if ctx.order_type == OrderType::Limit {
            match ctx.price {
                None => errors.push("limit orders require a price".to_string()),
                Some(price) => {
                    if let Some(deviation) = self.band_deviation(ctx.symbol, price) {
                        errors.push(format!(
                            "price {} deviates {:.2}% from the last trade, band is {}%",
                            price, deviation, self.config.price_band_percent
                        ));
                    }
                }
            }
        }

        if self.over_request_rate(ctx.client_id, now) {
            errors.push(format!(
                "request rate exceeds {} orders per minute",
                self.config.requests_per_minute_per_client
            ));
        }

        errors
    }

    /// Record the price of the last trade for a symbol
    pub fn update_last_trade_price(&self, symbol: &Symbol, price: Price) {
        self.last_trade.lock().insert(symbol.clone(), price);
    }

    /// Last trade price seen for a symbol, if any
    pub fn last_trade_price(&self, symbol: &Symbol) -> Option<Price> {
        self.last_trade.lock().get(symbol).copied()
    }

    /// Percent deviation when outside the band, None when acceptable
    fn band_deviation(&self, symbol: &Symbol, price: Price) -> Option<Decimal> {
        if self.config.price_band_percent <= Decimal::ZERO {
            return None;
        }
        let last = self.last_trade.lock().get(symbol).copied()?;
        let last = last.as_decimal();
        let deviation = (price.as_decimal() - last).abs() / last * Decimal::ONE_HUNDRED;
        (deviation > self.config.price_band_percent).then_some(deviation)
    }

    /// Record this request and report whether the client exceeded the window
    fn over_request_rate(&self, client_id: &str, now: i64) -> bool {
        let limit = self.config.requests_per_minute_per_client;
        if limit == 0 {
            return false;
        }
        let mut log = self.request_log.lock();
        let window = log.entry(client_id.to_string()).or_default();
        while window.front().is_some_and(|&t| now - t >= WINDOW_NANOS) {
            window.pop_front();
        }
        window.push_back(now);
        window.len() > limit as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const T0: i64 = 1708123456789000000;

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD")
    }

    fn limit_ctx<'a>(symbol: &'a Symbol, qty: &str, price: u64) -> OrderContext<'a> {
        OrderContext {
            client_id: "alice",
            symbol,
            order_type: OrderType::Limit,
            quantity: Quantity::parse(qty).unwrap(),
            price: Some(Price::from_u64(price)),
        }
    }

    #[test]
    fn test_default_config_passes_everything() {
        let gate = RiskGate::new(RiskConfig::default());
        let symbol = symbol();
        let errors = gate.validate(&limit_ctx(&symbol, "1000000", 1), T0);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_client_id() {
        let gate = RiskGate::new(RiskConfig::default());
        let symbol = symbol();
        let ctx = OrderContext {
            client_id: "",
            ..limit_ctx(&symbol, "1", 100)
        };
        let errors = gate.validate(&ctx, T0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("client id"));
    }

    #[test]
    fn test_quantity_cap() {
        let gate = RiskGate::new(RiskConfig {
            max_quantity_per_order: Quantity::from_u64(10),
            ..RiskConfig::default()
        });
        let symbol = symbol();

        assert!(gate.validate(&limit_ctx(&symbol, "10", 100), T0).is_empty());
        let errors = gate.validate(&limit_ctx(&symbol, "10.5", 100), T0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("per-order maximum"));
    }

    #[test]
    fn test_price_band_needs_last_trade() {
        let gate = RiskGate::new(RiskConfig {
            price_band_percent: dec!(5),
            ..RiskConfig::default()
        });
        let symbol = symbol();

        // No last trade yet: band cannot apply.
        assert!(gate.validate(&limit_ctx(&symbol, "1", 200), T0).is_empty());

        gate.update_last_trade_price(&symbol, Price::from_u64(100));
        assert!(gate.validate(&limit_ctx(&symbol, "1", 104), T0).is_empty());
        assert!(gate.validate(&limit_ctx(&symbol, "1", 105), T0).is_empty());

        let errors = gate.validate(&limit_ctx(&symbol, "1", 106), T0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("band"));
    }

    #[test]
    fn test_band_ignores_market_orders() {
        let gate = RiskGate::new(RiskConfig {
            price_band_percent: dec!(1),
            ..RiskConfig::default()
        });
        let symbol = symbol();
        gate.update_last_trade_price(&symbol, Price::from_u64(100));

        let ctx = OrderContext {
            client_id: "alice",
            symbol: &symbol,
            order_type: OrderType::Market,
            quantity: Quantity::from_u64(1),
            price: None,
        };
        assert!(gate.validate(&ctx, T0).is_empty());
    }

    #[test]
    fn test_request_rate_sliding_window() {
        let gate = RiskGate::new(RiskConfig {
            requests_per_minute_per_client: 2,
            ..RiskConfig::default()
        });
        let symbol = symbol();

        assert!(gate.validate(&limit_ctx(&symbol, "1", 100), T0).is_empty());
        assert!(gate
            .validate(&limit_ctx(&symbol, "1", 100), T0 + 1)
            .is_empty());
        let errors = gate.validate(&limit_ctx(&symbol, "1", 100), T0 + 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("request rate"));

        // A minute later the window has slid past the earlier requests.
        let later = T0 + WINDOW_NANOS + 3;
        assert!(gate.validate(&limit_ctx(&symbol, "1", 100), later).is_empty());
    }

    #[test]
    fn test_rate_windows_are_per_client() {
        let gate = RiskGate::new(RiskConfig {
            requests_per_minute_per_client: 1,
            ..RiskConfig::default()
        });
        let symbol = symbol();

        assert!(gate.validate(&limit_ctx(&symbol, "1", 100), T0).is_empty());
        let bob = OrderContext {
            client_id: "bob",
            ..limit_ctx(&symbol, "1", 100)
        };
        assert!(gate.validate(&bob, T0 + 1).is_empty());
    }

    #[test]
    fn test_collects_multiple_errors() {
        let gate = RiskGate::new(RiskConfig {
            max_quantity_per_order: Quantity::from_u64(1),
            ..RiskConfig::default()
        });
        let symbol = symbol();
        let ctx = OrderContext {
            client_id: "",
            symbol: &symbol,
            order_type: OrderType::Limit,
            quantity: Quantity::from_u64(5),
            price: None,
        };

        let errors = gate.validate(&ctx, T0);
        assert_eq!(errors.len(), 3);
    }
}
