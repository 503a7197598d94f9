//! The Broker: the only component that combines accounts with markets,
//! and the sole enforcer of global cash/asset conservation across
//! operations.
//!
//! Grounded on `pybroker/order_broker.py::Broker`. The teacher repo has no
//! Broker-equivalent — its `main.rs`/`ui` drove a single `Orderbook`
//! directly against one account — so this module is built fresh from the
//! Python original, in the teacher's struct/impl/getset idiom.

use std::collections::HashMap;

use getset::Getters;
use thiserror::Error;
use log::{info, warn};

use crate::config::BrokerConfig;
use crate::events::{EventSink, L1HistoryRow, Level1MarketData};
use crate::ledger::{Account, LedgerError};
use crate::matcher::{Match, Matcher, MatcherError, Order, OrderType, Side};

/// The full error taxonomy, mapped onto Rust's `Result` for every Broker
/// operation except `place_order`, which keeps a boolean success-flag
/// contract for the submitter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("account for trader {0} already exists")]
    AccountAlreadyExists(u64),
    #[error("no account for trader {0}")]
    UnknownTrader(u64),
    #[error("market for asset '{0}' already exists")]
    MarketAlreadyExists(String),
    #[error("no market for asset '{0}'")]
    UnknownAsset(String),
    #[error("order amount must be positive")]
    InvalidAmount,
    #[error("order price must be non-negative")]
    InvalidPrice,
    #[error("market orders must carry a zero price")]
    MarketOrderWithPrice,
    #[error("order id {0} already rests in this market")]
    DuplicateOrderId(u64),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("market order could not be completely filled")]
    UnfillableMarketOrder,
    #[error("failed to dequeue a match that was just produced")]
    MissingMatch,
}

impl From<MatcherError> for BrokerError {
    fn from(e: MatcherError) -> Self {
        // NotAMarketOrder is a precondition violation the Broker itself must
        // never trigger through place_order; surfacing it as a business
        // failure would hide a real bug.
        panic!("matcher precondition violated: {e}")
    }
}

/// Orchestrates accounts, markets and the L1 history buffer.
pub struct Broker {
    config: BrokerConfig,
    tick_count: u64,
    accounts: HashMap<u64, Account>,
    markets: HashMap<String, Matcher>,
    l1_history: HashMap<String, Vec<L1HistoryRow>>,
    sink: Option<Box<dyn EventSink>>,
}

/// A read-only snapshot of a Matcher's book-side totals, for callers that
/// want the depth/totals API without reaching into the Matcher directly.
#[derive(Getters, Clone, Debug)]
pub struct MarketTotals {
    #[get = "pub"]
    total_cash_held_in_bid_limits: i64,
    #[get = "pub"]
    total_assets_held_in_ask_limits: u64,
}

impl Broker {
    pub fn new() -> Broker {
        Broker::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Broker {
        Broker {
            config,
            tick_count: 0,
            accounts: HashMap::new(),
            markets: HashMap::new(),
            l1_history: HashMap::new(),
            sink: None,
        }
    }

    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    fn next_tick(&mut self) -> u64 {
        self.tick_count += 1;
        self.tick_count
    }

    // --- account lifecycle ---

    pub fn open_account(&mut self, trader_id: u64) -> Result<(), BrokerError> {
        if self.accounts.contains_key(&trader_id) {
            return Err(BrokerError::AccountAlreadyExists(trader_id));
        }
        self.accounts.insert(trader_id, Account::new(trader_id));
        Ok(())
    }

    pub fn close_account(&mut self, trader_id: u64) -> Result<Account, BrokerError> {
        self.ensure_trader_exists(trader_id)?;

        for asset in self.markets.keys().cloned().collect::<Vec<_>>() {
            self.cancel_and_unearmark(&asset, trader_id);
        }

        Ok(self.accounts.remove(&trader_id).expect("checked above"))
    }

    pub fn end_trading_day(&mut self) {
        for market in self.markets.values_mut() {
            market.clear_order_book();
        }
        for account in self.accounts.values_mut() {
            account.reset_earmarks();
        }
    }

    // --- market lifecycle ---

    pub fn create_market(&mut self, asset: &str) -> Result<(), BrokerError> {
        if self.markets.contains_key(asset) {
            return Err(BrokerError::MarketAlreadyExists(asset.to_string()));
        }
        let matcher = Matcher::with_config(
            self.config.price_buffer_capacity,
            self.config.stats_windows,
        );
        self.markets.insert(asset.to_string(), matcher);
        self.l1_history.entry(asset.to_string()).or_default();
        Ok(())
    }

    /// Tears down a market. First performs an implicit cancel-all of every
    /// resting limit on the asset (unearmarking cash and assets correctly)
    /// instead of silently dropping the cash held in unmatched buy limits.
    pub fn destroy_market(&mut self, asset: &str) -> Result<(), BrokerError> {
        self.ensure_market_exists(asset)?;

        let resting = {
            let market = self.markets.get_mut(asset).expect("checked above");
            market.clear_order_book()
        };
        for order in resting {
            self.unearmark(&order, asset);
        }

        self.markets.remove(asset);
        self.l1_history.remove(asset);

        for account in self.accounts.values_mut() {
            account.purge_asset(asset);
        }
        Ok(())
    }

    // --- cash / asset movements ---

    pub fn deposit_cash(&mut self, trader_id: u64, amount_cents: u64) -> Result<(), BrokerError> {
        let account = self.account_mut(trader_id)?;
        account.deposit_cash(amount_cents);
        Ok(())
    }

    pub fn withdraw_cash(&mut self, trader_id: u64, amount_cents: u64) -> Result<(), BrokerError> {
        let account = self.account_mut(trader_id)?;
        account.withdraw_cash(amount_cents)?;
        Ok(())
    }

    pub fn deposit_asset(
        &mut self,
        trader_id: u64,
        amount: u64,
        asset: &str,
    ) -> Result<(), BrokerError> {
        let account = self.account_mut(trader_id)?;
        account.deposit_asset(asset, amount);
        Ok(())
    }

    pub fn withdraw_asset(
        &mut self,
        trader_id: u64,
        amount: u64,
        asset: &str,
    ) -> Result<(), BrokerError> {
        let account = self.account_mut(trader_id)?;
        account.withdraw_asset(asset, amount)?;
        Ok(())
    }

    /// A defensive copy of the trader's account — callers can never mutate
    /// live Broker state through it.
    pub fn get_account_info(&self, trader_id: u64) -> Result<Account, BrokerError> {
        self.accounts
            .get(&trader_id)
            .cloned()
            .ok_or(BrokerError::UnknownTrader(trader_id))
    }

    // --- order submission (the central atomic operation) ---

    /// Validates, earmarks/matches and settles `order` against `asset`.
    /// Returns `true` on success, `false` on any input fault or business
    /// failure — no partial effects are ever visible on a `false` return.
    pub fn place_order(&mut self, asset: &str, mut order: Order) -> bool {
        let tick = self.next_tick();
        order.set_tick(tick);

        match self.try_place_order(asset, &order) {
            Ok(()) => {
                self.record_l1_history(asset, tick);
                if let Some(sink) = &self.sink {
                    sink.order_executed(asset, &order);
                }
                info!("placed order {} on '{}' at tick {}", order.id(), asset, tick);
                true
            }
            Err(err) => {
                warn!(
                    "rejected order {} on '{}' at tick {}: {}",
                    order.id(),
                    asset,
                    tick,
                    err
                );
                if let Some(sink) = &self.sink {
                    sink.order_cancelled(asset, &order);
                }
                false
            }
        }
    }

    fn try_place_order(&mut self, asset: &str, order: &Order) -> Result<(), BrokerError> {
        self.ensure_market_exists(asset)?;
        self.ensure_trader_exists(order.trader_id())?;
        if order.amount() == 0 {
            return Err(BrokerError::InvalidAmount);
        }
        if order.price_cents() < 0 {
            return Err(BrokerError::InvalidPrice);
        }
        if order.kind() == OrderType::Market && order.price_cents() != 0 {
            return Err(BrokerError::MarketOrderWithPrice);
        }
        if order.kind() == OrderType::Limit && self.markets[asset].contains_order_id(order.id()) {
            return Err(BrokerError::DuplicateOrderId(order.id()));
        }

        let trader_id = order.trader_id();
        let snapshot = self.accounts[&trader_id].clone();

        let result = match order.kind() {
            OrderType::Limit => self.place_limit(asset, order),
            OrderType::Market => self.place_market(asset, order),
        };

        if result.is_err() {
            self.accounts.insert(trader_id, snapshot);
        }
        result
    }

    fn place_limit(&mut self, asset: &str, order: &Order) -> Result<(), BrokerError> {
        self.validate_limit_affordability(asset, order)?;
        self.earmark_for_limit(asset, order)?;
        self.markets
            .get_mut(asset)
            .expect("market existence checked by caller")
            .place_limit_order(order.clone());
        Ok(())
    }

    fn place_market(&mut self, asset: &str, order: &Order) -> Result<(), BrokerError> {
        let account = &self.accounts[&order.trader_id()];
        let available_cash = account.tradable_balance_cents();
        let available_assets = account.tradable_asset_amount(asset);

        let book_snapshot = self.markets[asset].clone();

        let filled = self
            .markets
            .get_mut(asset)
            .expect("market existence checked by caller")
            .match_market_order(order, available_cash, available_assets)?;

        if !filled {
            return Err(BrokerError::UnfillableMarketOrder);
        }

        let dequeued = self
            .markets
            .get_mut(asset)
            .expect("market existence checked by caller")
            .dequeue_match();

        let result = match dequeued {
            Some(matched) => self.settle_trade(&matched, asset),
            None => Err(BrokerError::MissingMatch),
        };
        if result.is_err() {
            self.markets.insert(asset.to_string(), book_snapshot);
        }
        result
    }

    fn validate_limit_affordability(&self, asset: &str, order: &Order) -> Result<(), BrokerError> {
        let account = &self.accounts[&order.trader_id()];
        match order.side() {
            Side::Buy => {
                let cost = order.amount() as i64 * order.price_cents();
                if account.tradable_balance_cents() < cost {
                    return Err(LedgerError::InsufficientCash {
                        have: account.tradable_balance_cents(),
                        need: cost,
                    }
                    .into());
                }
            }
            Side::Sell => {
                if account.tradable_asset_amount(asset) < order.amount() {
                    return Err(LedgerError::InsufficientAsset {
                        asset: asset.to_string(),
                        have: account.tradable_asset_amount(asset),
                        need: order.amount(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn earmark_for_limit(&mut self, asset: &str, order: &Order) -> Result<(), BrokerError> {
        let account = self.account_mut(order.trader_id())?;
        match order.side() {
            Side::Buy => {
                account.reserve_cash(order.amount() * order.price_cents() as u64)?;
            }
            Side::Sell => {
                account.reserve_asset(asset, order.amount())?;
            }
        }
        Ok(())
    }

    /// Applies the two-sided settlement for a fully-matched market order:
    /// the market side against the Match's own trader, and every limit
    /// fragment against its resting owner.
    fn settle_trade(&mut self, matched: &Match, asset: &str) -> Result<(), BrokerError> {
        let market = &matched.market_order;
        let total_amount = matched.limit_orders_total_amount();
        let total_value = matched.limit_orders_total_value_cents() as u64;

        {
            let account = self.account_mut(market.trader_id())?;
            match market.side() {
                Side::Buy => {
                    account.debit_cash(total_value)?;
                    account.credit_asset(asset, total_amount);
                }
                Side::Sell => {
                    account.debit_asset(asset, total_amount)?;
                    account.credit_cash(total_value);
                }
            }
        }

        for fragment in &matched.limit_orders {
            let value = fragment.amount() * fragment.price_cents() as u64;
            let account = self.account_mut(fragment.trader_id())?;
            match fragment.side() {
                Side::Buy => {
                    account.settle_limit_buy_cash(value)?;
                    account.credit_asset(asset, fragment.amount());
                }
                Side::Sell => {
                    account.settle_limit_sell_asset(asset, fragment.amount())?;
                    account.credit_cash(value);
                }
            }
        }

        Ok(())
    }

    fn cancel_and_unearmark(&mut self, asset: &str, trader_id: u64) {
        let cancelled = {
            let market = match self.markets.get_mut(asset) {
                Some(m) => m,
                None => return,
            };
            market.cancel_orders_for_trader(trader_id)
        };
        for order in cancelled {
            self.unearmark(&order, asset);
        }
    }

    /// Reverses the earmark a resting limit order represents. The only
    /// path by which earmarks decrease outside settlement.
    fn unearmark(&mut self, order: &Order, asset: &str) {
        if let Some(account) = self.accounts.get_mut(&order.trader_id()) {
            match order.side() {
                Side::Buy => {
                    account
                        .release_cash_reservation(order.amount() * order.price_cents() as u64);
                }
                Side::Sell => {
                    account.release_asset_reservation(asset, order.amount());
                }
            }
        }
    }

    // --- observation (read paths) ---

    pub fn get_lowest_ask(&self, asset: &str) -> Result<Option<i64>, BrokerError> {
        Ok(self.market(asset)?.get_lowest_ask())
    }

    pub fn get_highest_bid(&self, asset: &str) -> Result<Option<i64>, BrokerError> {
        Ok(self.market(asset)?.get_highest_bid())
    }

    pub fn get_bid_depth(&self, asset: &str) -> Result<Vec<(i64, u64, u64)>, BrokerError> {
        Ok(self.market(asset)?.get_bid_depth())
    }

    pub fn get_ask_depth(&self, asset: &str) -> Result<Vec<(i64, u64, u64)>, BrokerError> {
        Ok(self.market(asset)?.get_ask_depth())
    }

    pub fn get_level_1_market_data(&self, asset: &str) -> Result<Level1MarketData, BrokerError> {
        Ok(self.market(asset)?.get_level_1_market_data())
    }

    pub fn total_assets_held_in_ask_limits(&self, asset: &str) -> Result<u64, BrokerError> {
        Ok(self.market(asset)?.total_assets_held_in_ask_limits())
    }

    pub fn total_cash_held_in_bid_limits(&self, asset: &str) -> Result<i64, BrokerError> {
        Ok(self.market(asset)?.total_cash_held_in_bid_limits())
    }

    pub fn market_totals(&self, asset: &str) -> Result<MarketTotals, BrokerError> {
        let market = self.market(asset)?;
        Ok(MarketTotals {
            total_cash_held_in_bid_limits: market.total_cash_held_in_bid_limits(),
            total_assets_held_in_ask_limits: market.total_assets_held_in_ask_limits(),
        })
    }

    pub fn get_l1_history(&self, asset: &str) -> Result<Vec<L1HistoryRow>, BrokerError> {
        self.l1_history
            .get(asset)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownAsset(asset.to_string()))
    }

    /// Defensive-copy observation pairing an account snapshot with an L1
    /// snapshot for one (trader, asset), the shape agents consume.
    pub fn observe(
        &self,
        trader_id: u64,
        asset: &str,
    ) -> Result<(Account, Level1MarketData), BrokerError> {
        let account = self.get_account_info(trader_id)?;
        let l1 = self.get_level_1_market_data(asset)?;
        Ok((account, l1))
    }

    /// Vectorizes this trader/asset pair for learned agents: L1 fields,
    /// then cash/earmark/tradable balance.
    pub fn vectorize(&self, trader_id: u64, asset: &str) -> Result<[f64; 13], BrokerError> {
        let (account, l1) = self.observe(trader_id, asset)?;
        let l1v = l1.vectorize();
        let mut out = [0.0; 13];
        out[..10].copy_from_slice(&l1v);
        out[10] = *account.cash_balance_cents() as f64;
        out[11] = *account.earmarked_cash_cents() as f64;
        out[12] = account.tradable_balance_cents() as f64;
        Ok(out)
    }

    fn record_l1_history(&mut self, asset: &str, tick: u64) {
        let (best_bid, best_ask) = {
            let market = &self.markets[asset];
            (market.get_highest_bid(), market.get_lowest_ask())
        };
        info!(
            target: "l1_data",
            "{} tick={} bid={:?} ask={:?}",
            asset,
            tick,
            best_bid,
            best_ask
        );
        self.l1_history
            .entry(asset.to_string())
            .or_default()
            .push(L1HistoryRow {
                best_bid,
                best_ask,
                tick,
            });
    }

    fn ensure_trader_exists(&self, trader_id: u64) -> Result<(), BrokerError> {
        if self.accounts.contains_key(&trader_id) {
            Ok(())
        } else {
            Err(BrokerError::UnknownTrader(trader_id))
        }
    }

    fn ensure_market_exists(&self, asset: &str) -> Result<(), BrokerError> {
        if self.markets.contains_key(asset) {
            Ok(())
        } else {
            Err(BrokerError::UnknownAsset(asset.to_string()))
        }
    }

    fn account_mut(&mut self, trader_id: u64) -> Result<&mut Account, BrokerError> {
        self.accounts
            .get_mut(&trader_id)
            .ok_or(BrokerError::UnknownTrader(trader_id))
    }

    fn market(&self, asset: &str) -> Result<&Matcher, BrokerError> {
        self.markets
            .get(asset)
            .ok_or_else(|| BrokerError::UnknownAsset(asset.to_string()))
    }
}

impl Default for Broker {
    fn default() -> Self {
        Broker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Order, OrderType, Side};

    fn broker_with_market(asset: &str) -> Broker {
        let mut b = Broker::new();
        b.create_market(asset).unwrap();
        b
    }

    // A resting sell limit fully crossed by a buy market order.
    #[test]
    fn scenario_single_cross() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.deposit_cash(1, 500).unwrap();
        b.deposit_asset(2, 5, "ABC").unwrap();

        assert!(b.place_order("ABC", Order::new(1, 2, Side::Sell, OrderType::Limit, 5, 100)));
        assert!(b.place_order("ABC", Order::new(2, 1, Side::Buy, OrderType::Market, 5, 0)));

        let acc1 = b.get_account_info(1).unwrap();
        assert_eq!(*acc1.cash_balance_cents(), 0);
        assert_eq!(acc1.portfolio().get("ABC"), Some(&5));

        let acc2 = b.get_account_info(2).unwrap();
        assert_eq!(*acc2.cash_balance_cents(), 500);
        assert_eq!(*acc2.earmarked_cash_cents(), 0);

        assert_eq!(b.get_highest_bid("ABC").unwrap(), None);
        assert_eq!(b.get_lowest_ask("ABC").unwrap(), None);
    }

    // A second market order submitted after the book is already empty
    // is rejected outright, with no effect on the submitter's account.
    #[test]
    fn scenario_market_exhausts_liquidity() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.open_account(3).unwrap();
        b.deposit_cash(1, 500).unwrap();
        b.deposit_asset(2, 5, "ABC").unwrap();
        b.deposit_cash(3, 500).unwrap();

        assert!(b.place_order("ABC", Order::new(1, 2, Side::Sell, OrderType::Limit, 5, 100)));
        assert!(b.place_order("ABC", Order::new(2, 1, Side::Buy, OrderType::Market, 5, 0)));
        assert!(!b.place_order("ABC", Order::new(3, 3, Side::Buy, OrderType::Market, 5, 0)));

        let acc3 = b.get_account_info(3).unwrap();
        assert_eq!(*acc3.cash_balance_cents(), 500);
        assert!(acc3.portfolio().get("ABC").is_none());
        assert_eq!(b.get_highest_bid("ABC").unwrap(), None);
        assert_eq!(b.get_lowest_ask("ABC").unwrap(), None);
    }

    // A single large resting limit order gets whittled down by a series
    // of smaller market orders until fully consumed.
    #[test]
    fn scenario_split_large_limit() {
        let mut b = broker_with_market("LMN");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 10000).unwrap();
        assert!(b.place_order("LMN", Order::new(1, 1, Side::Buy, OrderType::Limit, 10, 100)));

        for trader in 2..=6u64 {
            b.open_account(trader).unwrap();
            b.deposit_asset(trader, 2, "LMN").unwrap();
            assert!(b.place_order(
                "LMN",
                Order::new(trader, trader, Side::Sell, OrderType::Market, 2, 0)
            ));
            if trader < 6 {
                let expected_remaining = 10 - (trader - 1) * 2;
                assert_eq!(b.get_highest_bid("LMN").unwrap(), Some(100));
                let depth = b.get_bid_depth("LMN").unwrap();
                assert_eq!(depth[0].1, expected_remaining);
            }
        }

        assert_eq!(b.get_highest_bid("LMN").unwrap(), None);
        let acc1 = b.get_account_info(1).unwrap();
        assert_eq!(acc1.portfolio().get("LMN"), Some(&10));
        for trader in 2..=6u64 {
            let acc = b.get_account_info(trader).unwrap();
            assert_eq!(*acc.cash_balance_cents(), 200);
            assert!(acc.portfolio().get("LMN").is_none());
        }
    }

    // A market order sweeps several resting sell limits but leaves the
    // last one only partially consumed.
    #[test]
    fn scenario_partial_book_consumed() {
        let mut b = broker_with_market("XYZ");
        for trader in 1..=5u64 {
            b.open_account(trader).unwrap();
            b.deposit_asset(trader, 2, "XYZ").unwrap();
            assert!(b.place_order(
                "XYZ",
                Order::new(trader, trader, Side::Sell, OrderType::Limit, 2, 100)
            ));
        }
        b.open_account(6).unwrap();
        b.deposit_cash(6, 1000).unwrap();
        assert!(b.place_order("XYZ", Order::new(10, 6, Side::Buy, OrderType::Market, 8, 0)));

        let acc6 = b.get_account_info(6).unwrap();
        assert_eq!(acc6.portfolio().get("XYZ"), Some(&8));
        assert_eq!(*acc6.cash_balance_cents(), 200);

        for trader in 1..=4u64 {
            let acc = b.get_account_info(trader).unwrap();
            assert_eq!(*acc.cash_balance_cents(), 200);
        }
        let acc5 = b.get_account_info(5).unwrap();
        assert_eq!(*acc5.cash_balance_cents(), 0);
        assert_eq!(acc5.portfolio().get("XYZ"), Some(&2));
    }

    // A market buy that would exceed the trader's tradable cash is
    // rejected and leaves the resting ask untouched.
    #[test]
    fn scenario_insufficient_cash_on_market_buy() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.deposit_cash(1, 500).unwrap();
        b.deposit_asset(2, 10, "ABC").unwrap();
        assert!(b.place_order("ABC", Order::new(1, 2, Side::Sell, OrderType::Limit, 10, 100)));

        assert!(!b.place_order("ABC", Order::new(2, 1, Side::Buy, OrderType::Market, 10, 0)));

        assert_eq!(b.get_lowest_ask("ABC").unwrap(), Some(100));
        let depth = b.get_ask_depth("ABC").unwrap();
        assert_eq!(depth[0].1, 10);
        let acc1 = b.get_account_info(1).unwrap();
        assert_eq!(*acc1.cash_balance_cents(), 500);
    }

    // A trader with both a resting buy limit and a resting sell limit
    // has the right cash and asset amounts earmarked.
    #[test]
    fn scenario_earmark_accounting() {
        let mut b = broker_with_market("XYZ");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 100000).unwrap();
        b.deposit_asset(1, 100, "XYZ").unwrap();

        assert!(b.place_order("XYZ", Order::new(1, 1, Side::Buy, OrderType::Limit, 50, 100)));
        assert!(b.place_order("XYZ", Order::new(2, 1, Side::Sell, OrderType::Limit, 30, 150)));

        let acc = b.get_account_info(1).unwrap();
        assert_eq!(*acc.earmarked_cash_cents(), 5000);
        assert_eq!(acc.earmarked_asset_amount("XYZ"), 30);
        assert_eq!(acc.tradable_balance_cents(), 95000);
        assert_eq!(acc.tradable_asset_amount("XYZ"), 70);
        assert_eq!(b.total_cash_held_in_bid_limits("XYZ").unwrap(), 5000);
        assert_eq!(b.total_assets_held_in_ask_limits("XYZ").unwrap(), 30);
    }

    #[test]
    fn rejected_market_order_leaves_state_untouched() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.deposit_cash(1, 100).unwrap();
        b.deposit_asset(2, 10, "ABC").unwrap();
        assert!(b.place_order("ABC", Order::new(1, 2, Side::Sell, OrderType::Limit, 10, 100)));

        let before = b.get_account_info(1).unwrap();
        assert!(!b.place_order("ABC", Order::new(2, 1, Side::Buy, OrderType::Market, 10, 0)));
        let after = b.get_account_info(1).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn duplicate_limit_order_id_is_rejected() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 1000).unwrap();
        assert!(b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 1, 100)));
        assert!(!b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 1, 100)));
    }

    #[test]
    fn close_account_unearmarks_resting_limits() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 1000).unwrap();
        assert!(b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 5, 100)));
        let closed = b.close_account(1).unwrap();
        assert_eq!(*closed.cash_balance_cents(), 1000);
        assert_eq!(*closed.earmarked_cash_cents(), 0);
        assert!(b.get_highest_bid("ABC").unwrap().is_none());
    }

    #[test]
    fn destroy_market_unearmarks_instead_of_leaking_cash() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 1000).unwrap();
        assert!(b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 5, 100)));
        b.destroy_market("ABC").unwrap();
        let acc = b.get_account_info(1).unwrap();
        assert_eq!(*acc.cash_balance_cents(), 1000);
        assert_eq!(*acc.earmarked_cash_cents(), 0);
    }

    #[test]
    fn end_trading_day_clears_books_and_earmarks_but_not_balances() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.deposit_cash(1, 1000).unwrap();
        assert!(b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 5, 100)));
        b.end_trading_day();
        let acc = b.get_account_info(1).unwrap();
        assert_eq!(*acc.cash_balance_cents(), 1000);
        assert_eq!(*acc.earmarked_cash_cents(), 0);
        assert!(b.get_highest_bid("ABC").unwrap().is_none());
    }

    // L1 history length equals the number of successful place_order
    // calls on that asset.
    #[test]
    fn l1_history_length_tracks_successful_orders() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.deposit_cash(1, 1000).unwrap();
        b.deposit_asset(2, 10, "ABC").unwrap();

        assert!(b.place_order("ABC", Order::new(1, 1, Side::Buy, OrderType::Limit, 5, 100)));
        assert!(!b.place_order("ABC", Order::new(2, 2, Side::Sell, OrderType::Limit, 0, 100)));
        assert!(b.place_order("ABC", Order::new(3, 2, Side::Sell, OrderType::Limit, 5, 90)));

        assert_eq!(b.get_l1_history("ABC").unwrap().len(), 2);
    }

    // Conservation of cash and assets across a sequence of calls.
    #[test]
    fn conservation_of_cash_and_assets_across_many_orders() {
        let mut b = broker_with_market("ABC");
        b.open_account(1).unwrap();
        b.open_account(2).unwrap();
        b.deposit_cash(1, 100_000).unwrap();
        b.deposit_asset(2, 50, "ABC").unwrap();

        let total_cash_before: i64 = [1, 2]
            .iter()
            .map(|t| *b.get_account_info(*t).unwrap().cash_balance_cents())
            .sum();
        let total_asset_before: u64 = [1, 2]
            .iter()
            .map(|t| *b.get_account_info(*t).unwrap().portfolio().get("ABC").unwrap_or(&0))
            .sum();

        assert!(b.place_order("ABC", Order::new(1, 2, Side::Sell, OrderType::Limit, 50, 100)));
        assert!(b.place_order("ABC", Order::new(2, 1, Side::Buy, OrderType::Market, 20, 0)));
        assert!(!b.place_order("ABC", Order::new(3, 1, Side::Buy, OrderType::Market, 1000, 0)));

        let total_cash_after: i64 = [1, 2]
            .iter()
            .map(|t| *b.get_account_info(*t).unwrap().cash_balance_cents())
            .sum();
        let total_asset_after: u64 = [1, 2]
            .iter()
            .map(|t| *b.get_account_info(*t).unwrap().portfolio().get("ABC").unwrap_or(&0))
            .sum();

        assert_eq!(total_cash_before, total_cash_after);
        assert_eq!(total_asset_before, total_asset_after);
    }
}
