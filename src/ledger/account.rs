use std::collections::HashMap;

use getset::Getters;
use thiserror::Error;

/// Errors raised by ledger primitives when a mutation would overdraw a
/// tradable balance.
///
/// These are business failures from the Broker's point of view (insufficient
/// tradable cash/assets), not programmer errors — the Broker maps them onto
/// a rejected `place_order` rather than letting them propagate as panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient tradable cash: have {have} cents, need {need} cents")]
    InsufficientCash { have: i64, need: i64 },
    #[error("insufficient tradable amount of asset '{asset}': have {have}, need {need}")]
    InsufficientAsset { asset: String, have: u64, need: u64 },
    #[error("account fields must be non-negative")]
    NegativeField,
}

/// A single trader's wallet: cash in integer cents plus a per-asset
/// portfolio, with earmarked (reserved) amounts for resting limit orders.
///
/// Mirrors `pybroker/models.py::Account`, generalized from the teacher's
/// `bank::Account` (which kept one `balances: HashMap<Currency, u64>` for a
/// fixed pair) into a split cash/portfolio/earmark shape.
#[derive(Getters, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    #[get = "pub"]
    trader_id: u64,
    #[get = "pub"]
    cash_balance_cents: i64,
    #[get = "pub"]
    portfolio: HashMap<String, u64>,
    #[get = "pub"]
    earmarked_cash_cents: i64,
    #[get = "pub"]
    earmarked_assets: HashMap<String, u64>,
}

impl Account {
    /// Creates a fresh, empty account for `trader_id`.
    pub fn new(trader_id: u64) -> Account {
        Account {
            trader_id,
            cash_balance_cents: 0,
            portfolio: HashMap::new(),
            earmarked_cash_cents: 0,
            earmarked_assets: HashMap::new(),
        }
    }

    /// Reconstructs an account from raw fields, rejecting any negative
    /// value. Used by snapshot/rollback and by tests that want to assert
    /// on a specific starting state.
    pub fn from_parts(
        trader_id: u64,
        cash_balance_cents: i64,
        portfolio: HashMap<String, u64>,
        earmarked_cash_cents: i64,
        earmarked_assets: HashMap<String, u64>,
    ) -> Result<Account, LedgerError> {
        if cash_balance_cents < 0 || earmarked_cash_cents < 0 {
            return Err(LedgerError::NegativeField);
        }
        Ok(Account {
            trader_id,
            cash_balance_cents,
            portfolio,
            earmarked_cash_cents,
            earmarked_assets,
        })
    }

    // --- derived queries ---

    pub fn tradable_balance_cents(&self) -> i64 {
        self.cash_balance_cents - self.earmarked_cash_cents
    }

    pub fn tradable_asset_amount(&self, asset: &str) -> u64 {
        let total = *self.portfolio.get(asset).unwrap_or(&0);
        let held = *self.earmarked_assets.get(asset).unwrap_or(&0);
        total.saturating_sub(held)
    }

    pub fn earmarked_asset_amount(&self, asset: &str) -> u64 {
        *self.earmarked_assets.get(asset).unwrap_or(&0)
    }

    // --- broker-controlled mutations ---
    //
    // None of these are `pub` — an `Account` exposes no setter a caller
    // outside this crate could use to overdraw a balance or a reservation.
    // Only the Broker, which owns every Account, calls them.

    pub(crate) fn deposit_cash(&mut self, amount_cents: u64) {
        self.cash_balance_cents += amount_cents as i64;
    }

    pub(crate) fn withdraw_cash(&mut self, amount_cents: u64) -> Result<(), LedgerError> {
        let amount = amount_cents as i64;
        if self.tradable_balance_cents() < amount {
            return Err(LedgerError::InsufficientCash {
                have: self.tradable_balance_cents(),
                need: amount,
            });
        }
        self.cash_balance_cents -= amount;
        Ok(())
    }

    pub(crate) fn deposit_asset(&mut self, asset: &str, amount: u64) {
        *self.portfolio.entry(asset.to_string()).or_insert(0) += amount;
    }

    pub(crate) fn withdraw_asset(&mut self, asset: &str, amount: u64) -> Result<(), LedgerError> {
        let tradable = self.tradable_asset_amount(asset);
        if tradable < amount {
            return Err(LedgerError::InsufficientAsset {
                asset: asset.to_string(),
                have: tradable,
                need: amount,
            });
        }
        let remaining = self.portfolio.get(asset).copied().unwrap_or(0) - amount;
        if remaining == 0 {
            self.portfolio.remove(asset);
        } else {
            self.portfolio.insert(asset.to_string(), remaining);
        }
        Ok(())
    }

    pub(crate) fn reserve_cash(&mut self, amount_cents: u64) -> Result<(), LedgerError> {
        let amount = amount_cents as i64;
        if self.tradable_balance_cents() < amount {
            return Err(LedgerError::InsufficientCash {
                have: self.tradable_balance_cents(),
                need: amount,
            });
        }
        self.earmarked_cash_cents += amount;
        Ok(())
    }

    pub(crate) fn release_cash_reservation(&mut self, amount_cents: u64) {
        debug_assert!(self.earmarked_cash_cents >= amount_cents as i64);
        self.earmarked_cash_cents -= amount_cents as i64;
    }

    pub(crate) fn reserve_asset(&mut self, asset: &str, amount: u64) -> Result<(), LedgerError> {
        let tradable = self.tradable_asset_amount(asset);
        if tradable < amount {
            return Err(LedgerError::InsufficientAsset {
                asset: asset.to_string(),
                have: tradable,
                need: amount,
            });
        }
        *self.earmarked_assets.entry(asset.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub(crate) fn release_asset_reservation(&mut self, asset: &str, amount: u64) {
        let held = self.earmarked_assets.get(asset).copied().unwrap_or(0);
        debug_assert!(held >= amount);
        let remaining = held.saturating_sub(amount);
        if remaining == 0 {
            self.earmarked_assets.remove(asset);
        } else {
            self.earmarked_assets.insert(asset.to_string(), remaining);
        }
    }

    pub(crate) fn reset_earmarks(&mut self) {
        self.earmarked_cash_cents = 0;
        self.earmarked_assets.clear();
    }

    /// Settles the cash leg of a filled BUY limit fragment: releases the
    /// earmark and debits cash by the same amount in one step, matching
    /// `pybroker/order_broker.py::_settle_trade`'s paired
    /// `earMarkedCashCents -=` / `cashBalanceCents -=`.
    pub(crate) fn settle_limit_buy_cash(&mut self, amount_cents: u64) -> Result<(), LedgerError> {
        let amount = amount_cents as i64;
        if self.earmarked_cash_cents < amount || self.cash_balance_cents < amount {
            return Err(LedgerError::InsufficientCash {
                have: self.cash_balance_cents,
                need: amount,
            });
        }
        self.earmarked_cash_cents -= amount;
        self.cash_balance_cents -= amount;
        Ok(())
    }

    /// Settles the asset leg of a filled SELL limit fragment: releases the
    /// earmark and debits the portfolio by the same amount in one step.
    pub(crate) fn settle_limit_sell_asset(
        &mut self,
        asset: &str,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let held = self.earmarked_assets.get(asset).copied().unwrap_or(0);
        let owned = self.portfolio.get(asset).copied().unwrap_or(0);
        if held < amount || owned < amount {
            return Err(LedgerError::InsufficientAsset {
                asset: asset.to_string(),
                have: owned,
                need: amount,
            });
        }
        let held_remaining = held - amount;
        if held_remaining == 0 {
            self.earmarked_assets.remove(asset);
        } else {
            self.earmarked_assets.insert(asset.to_string(), held_remaining);
        }
        let owned_remaining = owned - amount;
        if owned_remaining == 0 {
            self.portfolio.remove(asset);
        } else {
            self.portfolio.insert(asset.to_string(), owned_remaining);
        }
        Ok(())
    }

    pub(crate) fn credit_cash(&mut self, amount_cents: u64) {
        self.cash_balance_cents += amount_cents as i64;
    }

    pub(crate) fn debit_cash(&mut self, amount_cents: u64) -> Result<(), LedgerError> {
        let amount = amount_cents as i64;
        if self.cash_balance_cents < amount {
            return Err(LedgerError::InsufficientCash {
                have: self.cash_balance_cents,
                need: amount,
            });
        }
        self.cash_balance_cents -= amount;
        Ok(())
    }

    pub(crate) fn credit_asset(&mut self, asset: &str, amount: u64) {
        *self.portfolio.entry(asset.to_string()).or_insert(0) += amount;
    }

    pub(crate) fn debit_asset(&mut self, asset: &str, amount: u64) -> Result<(), LedgerError> {
        let owned = self.portfolio.get(asset).copied().unwrap_or(0);
        if owned < amount {
            return Err(LedgerError::InsufficientAsset {
                asset: asset.to_string(),
                have: owned,
                need: amount,
            });
        }
        let remaining = owned - amount;
        if remaining == 0 {
            self.portfolio.remove(asset);
        } else {
            self.portfolio.insert(asset.to_string(), remaining);
        }
        Ok(())
    }

    /// Drops `asset` entirely from the portfolio and its earmark (used by
    /// `Broker::destroy_market` once a market is torn down).
    pub(crate) fn purge_asset(&mut self, asset: &str) {
        self.portfolio.remove(asset);
        self.earmarked_assets.remove(asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tradable_balance_reflects_earmarks() {
        let mut acct = Account::new(1);
        acct.deposit_cash(1000);
        acct.reserve_cash(400).unwrap();
        assert_eq!(acct.tradable_balance_cents(), 600);
        assert_eq!(*acct.cash_balance_cents(), 1000);
    }

    #[test]
    fn reserve_cash_rejects_over_reservation() {
        let mut acct = Account::new(1);
        acct.deposit_cash(100);
        assert!(acct.reserve_cash(101).is_err());
    }

    #[test]
    fn withdraw_asset_removes_zero_entries() {
        let mut acct = Account::new(1);
        acct.deposit_asset("ABC", 5);
        acct.withdraw_asset("ABC", 5).unwrap();
        assert!(acct.portfolio().get("ABC").is_none());
    }

    #[test]
    fn tradable_asset_amount_absent_reads_as_zero() {
        let acct = Account::new(1);
        assert_eq!(acct.tradable_asset_amount("XYZ"), 0);
    }

    #[test]
    fn from_parts_rejects_negative_cash() {
        assert!(Account::from_parts(1, -1, HashMap::new(), 0, HashMap::new()).is_err());
    }

    #[test]
    fn settle_limit_buy_cash_reduces_both_fields() {
        let mut acct = Account::new(1);
        acct.deposit_cash(1000);
        acct.reserve_cash(500).unwrap();
        acct.settle_limit_buy_cash(500).unwrap();
        assert_eq!(*acct.cash_balance_cents(), 500);
        assert_eq!(*acct.earmarked_cash_cents(), 0);
    }
}
