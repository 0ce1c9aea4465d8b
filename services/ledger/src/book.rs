//! The ledger proper: client accounts behind one coarse lock

use crate::balance::{AssetBalance, BalanceView};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use types::errors::LedgerError;
use types::ids::ClientId;

/// All account balances in the process
///
/// One mutex serializes every operation, which keeps cross-account
/// settlement trivially deadlock-free. Asset keys are case-insensitive and
/// normalized to uppercase.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: Mutex<HashMap<ClientId, HashMap<String, AssetBalance>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add funds to a client's available balance
    pub fn deposit(
        &self,
        client: &ClientId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let asset = normalize(asset);
        check_positive(amount)?;
        let mut accounts = self.accounts.lock();
        accounts
            .entry(client.clone())
            .or_default()
            .entry(asset)
            .or_default()
            .deposit(amount);
        Ok(())
    }

    /// Move funds from available to reserved
    pub fn reserve(
        &self,
        client: &ClientId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let asset = normalize(asset);
        check_positive(amount)?;
        let mut accounts = self.accounts.lock();
        balance_mut(&mut accounts, client, &asset).reserve(&asset, amount)
    }

    /// Move funds from reserved back to available
    pub fn release(
        &self,
        client: &ClientId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let asset = normalize(asset);
        check_positive(amount)?;
        let mut accounts = self.accounts.lock();
        balance_mut(&mut accounts, client, &asset).release(&asset, amount)
    }

    /// Add funds to available (settlement inflow)
    pub fn credit(
        &self,
        client: &ClientId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let asset = normalize(asset);
        check_positive(amount)?;
        let mut accounts = self.accounts.lock();
        balance_mut(&mut accounts, client, &asset).credit(amount);
        Ok(())
    }

    /// Remove funds from available (settlement outflow)
    pub fn debit(
        &self,
        client: &ClientId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let asset = normalize(asset);
        check_positive(amount)?;
        let mut accounts = self.accounts.lock();
        balance_mut(&mut accounts, client, &asset).debit(&asset, amount)
    }

    /// Point-in-time snapshot of one client's balances, sorted by asset
    pub fn balances(&self, client: &ClientId) -> Vec<BalanceView> {
        let accounts = self.accounts.lock();
        let Some(account) = accounts.get(client) else {
            return Vec::new();
        };
        let sorted: BTreeMap<&String, &AssetBalance> = account.iter().collect();
        sorted
            .into_iter()
            .map(|(asset, balance)| BalanceView {
                asset: asset.clone(),
                available: balance.available,
                reserved: balance.reserved,
            })
            .collect()
    }

    /// One asset's balance for one client; zeros when the pair is unknown
    pub fn balance(&self, client: &ClientId, asset: &str) -> BalanceView {
        let asset = normalize(asset);
        let accounts = self.accounts.lock();
        let balance = accounts
            .get(client)
            .and_then(|account| account.get(&asset))
            .cloned()
            .unwrap_or_default();
        BalanceView {
            asset,
            available: balance.available,
            reserved: balance.reserved,
        }
    }

    /// Sum of available+reserved for one asset across every account
    ///
    /// Settlement only transfers between accounts, so this equals total
    /// deposits for the asset. Exposed for invariant checks in tests.
    pub fn total_asset_supply(&self, asset: &str) -> Decimal {
        let asset = normalize(asset);
        let accounts = self.accounts.lock();
        accounts
            .values()
            .filter_map(|account| account.get(&asset))
            .map(|b| b.available + b.reserved)
            .sum()
    }
}

fn normalize(asset: &str) -> String {
    asset.to_ascii_uppercase()
}

fn check_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        Err(LedgerError::NonPositiveAmount)
    } else {
        Ok(())
    }
}

fn balance_mut<'a>(
    accounts: &'a mut HashMap<ClientId, HashMap<String, AssetBalance>>,
    client: &ClientId,
    asset: &str,
) -> &'a mut AssetBalance {
    accounts
        .entry(client.clone())
        .or_default()
        .entry(asset.to_string())
        .or_default()
}
