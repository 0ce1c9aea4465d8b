//! Single-asset balance with an available/reserved split

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::LedgerError;

/// Balance of one asset inside one account
///
/// Invariant: available ≥ 0 and reserved ≥ 0 after every operation. An
/// operation that would break the invariant returns an error and changes
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub available: Decimal,
    pub reserved: Decimal,
}

impl AssetBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to available balance
    pub fn deposit(&mut self, amount: Decimal) {
        debug_assert!(amount > Decimal::ZERO);
        self.available += amount;
    }

    /// Move funds from available to reserved
    pub fn reserve(&mut self, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        if self.available < amount {
            return Err(insufficient(asset, amount, self.available));
        }
        self.available -= amount;
        self.reserved += amount;
        Ok(())
    }

    /// Move funds from reserved back to available
    pub fn release(&mut self, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        if self.reserved < amount {
            return Err(insufficient(asset, amount, self.reserved));
        }
        self.reserved -= amount;
        self.available += amount;
        Ok(())
    }

    /// Add to available balance (settlement inflow)
    pub fn credit(&mut self, amount: Decimal) {
        debug_assert!(amount > Decimal::ZERO);
        self.available += amount;
    }

    /// Remove from available balance (settlement outflow)
    pub fn debit(&mut self, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        if self.available < amount {
            return Err(insufficient(asset, amount, self.available));
        }
        self.available -= amount;
        Ok(())
    }

    /// True when both components are zero
    pub fn is_empty(&self) -> bool {
        self.available.is_zero() && self.reserved.is_zero()
    }
}

fn insufficient(asset: &str, required: Decimal, available: Decimal) -> LedgerError {
    LedgerError::InsufficientBalance {
        asset: asset.to_string(),
        required: required.to_string(),
        available: available.to_string(),
    }
}

/// Point-in-time view of one asset's balance, for wire output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub asset: String,
    pub available: Decimal,
    pub reserved: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reserve_moves_funds() {
        let mut balance = AssetBalance::new();
        balance.deposit(dec!(100));
        balance.reserve("USD", dec!(30)).unwrap();

        assert_eq!(balance.available, dec!(70));
        assert_eq!(balance.reserved, dec!(30));
    }

    #[test]
    fn test_reserve_insufficient_is_noop() {
        let mut balance = AssetBalance::new();
        balance.deposit(dec!(100));

        let err = balance.reserve("USD", dec!(150)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(balance.available, dec!(100));
        assert_eq!(balance.reserved, Decimal::ZERO);
    }

    #[test]
    fn test_release_requires_reservation() {
        let mut balance = AssetBalance::new();
        balance.deposit(dec!(100));
        assert!(balance.release("USD", dec!(1)).is_err());

        balance.reserve("USD", dec!(50)).unwrap();
        balance.release("USD", dec!(20)).unwrap();
        assert_eq!(balance.available, dec!(70));
        assert_eq!(balance.reserved, dec!(30));
    }

    #[test]
    fn test_debit_bounds() {
        let mut balance = AssetBalance::new();
        balance.deposit(dec!(10));
        assert!(balance.debit("USD", dec!(11)).is_err());
        balance.debit("USD", dec!(10)).unwrap();
        assert!(balance.is_empty());
    }

    #[test]
    fn test_reserve_release_round_trip() {
        let mut balance = AssetBalance::new();
        balance.deposit(dec!(42));
        let before = balance.clone();

        balance.reserve("USD", dec!(42)).unwrap();
        balance.release("USD", dec!(42)).unwrap();
        assert_eq!(balance, before);
    }
}
