use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

use thiserror::Error;

use super::order::{Match, Order, OrderType, Side};
use super::stats::RollingStats;
use crate::events::Level1MarketData;

/// Errors that indicate a caller violated a Matcher precondition.
/// These are programmer errors, not business failures — the Broker
/// is responsible for never triggering them through the documented API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("order {0} is not a market order")]
    NotAMarketOrder(u64),
}

/// Key type that gives bids/asks their price-time priority directly from
/// `BTreeMap` iteration order, rather than the teacher's `BTreeMap<tick ->
/// Tick-of-orders>` scheme, which conflated price and arrival order onto
/// a single axis. `seq` breaks ties when price and tick are both equal
/// (insertion order).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
struct BidKey(Reverse<i64>, u64, u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
struct AskKey(i64, u64, u64);

/// One side of the book: a sorted map from priority key to resting order,
/// plus an id index for O(log n) cancel-by-trader and duplicate-id checks.
#[derive(Clone, Debug, Default)]
struct Side1<K: Ord + Copy> {
    entries: BTreeMap<K, Order>,
    by_id: HashMap<u64, K>,
}

impl<K: Ord + Copy> Side1<K> {
    fn insert(&mut self, key: K, order: Order) {
        self.by_id.insert(order.id(), key);
        self.entries.insert(key, order);
    }

    fn contains_id(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }

    fn remove_by_id(&mut self, id: u64) -> Option<Order> {
        let key = self.by_id.remove(&id)?;
        self.entries.remove(&key)
    }

    fn remove_trader_orders(&mut self, trader_id: u64) {
        let removed_ids: Vec<u64> = self
            .entries
            .values()
            .filter(|o| o.trader_id() == trader_id)
            .map(|o| o.id())
            .collect();
        for id in removed_ids {
            self.remove_by_id(id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.by_id.clear();
    }

    fn total_amount(&self) -> u64 {
        self.entries.values().map(|o| o.amount()).sum()
    }
}

/// Per-asset matching engine: two sorted books, a FIFO match queue and
/// rolling fill-price statistics. Grounded on
/// `examples/AlpinYukseloglu-orderbook/src/book/orderbook.rs`.
#[derive(Clone, Debug)]
pub struct Matcher {
    bids: Side1<BidKey>,
    asks: Side1<AskKey>,
    match_queue: VecDeque<Match>,
    stats: RollingStats,
    seq: u64,
}

impl Matcher {
    pub fn new() -> Matcher {
        Matcher::with_stats_capacity(100)
    }

    pub fn with_stats_capacity(capacity: usize) -> Matcher {
        Matcher::with_config(capacity, [5, 10, 50, 100])
    }

    pub fn with_config(capacity: usize, windows: [usize; 4]) -> Matcher {
        Matcher {
            bids: Side1::default(),
            asks: Side1::default(),
            match_queue: VecDeque::new(),
            stats: RollingStats::with_windows(capacity, windows),
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    pub fn contains_order_id(&self, id: u64) -> bool {
        self.bids.contains_id(id) || self.asks.contains_id(id)
    }

    /// Inserts a resting limit order into the correct side. Never fails:
    /// `order.type = LIMIT` is a precondition the Broker upholds before
    /// calling this, and so is a unique order id — the Broker checks
    /// `contains_order_id` and rejects a duplicate before this is ever
    /// reached, rather than this method returning a business-style error
    /// for it.
    pub fn place_limit_order(&mut self, order: Order) {
        debug_assert!(
            order.kind() == OrderType::Limit,
            "place_limit_order called with a non-limit order {}",
            order.id()
        );
        debug_assert!(
            !self.contains_order_id(order.id()),
            "place_limit_order called with a duplicate order id {}",
            order.id()
        );
        let seq = self.next_seq();
        match order.side() {
            Side::Buy => {
                let key = BidKey(Reverse(order.price_cents()), order.tick(), seq);
                self.bids.insert(key, order);
            }
            Side::Sell => {
                let key = AskKey(order.price_cents(), order.tick(), seq);
                self.asks.insert(key, order);
            }
        }
    }

    /// Attempts to fill `order` (a MARKET order) from the opposite book's
    /// resting liquidity, in book order, capped by `available_cash`
    /// (BUY) or `available_assets` (SELL). Returns `true` and enqueues a
    /// `Match` iff the order was filled in full; otherwise rolls back any
    /// partial mutation and returns `false` (fill-or-kill).
    pub fn match_market_order(
        &mut self,
        order: &Order,
        available_cash: i64,
        available_assets: u64,
    ) -> Result<bool, MatcherError> {
        if order.kind() != OrderType::Market {
            return Err(MatcherError::NotAMarketOrder(order.id()));
        }

        match order.side() {
            Side::Buy => Ok(self.match_against_asks(order, available_cash)),
            Side::Sell => Ok(self.match_against_bids(order, available_assets)),
        }
    }

    fn match_against_asks(&mut self, order: &Order, available_cash: i64) -> bool {
        let snapshot = self.asks.clone();

        let mut remaining = order.amount();
        let mut total_cost: i64 = 0;
        let mut fragments = Vec::new();
        let mut fully_consumed_ids = Vec::new();
        let mut partial_update: Option<(AskKey, u64)> = None;

        for (&key, resting) in self.asks.entries.iter() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(resting.amount());
            let cost = take as i64 * resting.price_cents();
            if total_cost + cost > available_cash {
                self.asks = snapshot;
                return false;
            }
            total_cost += cost;
            remaining -= take;
            fragments.push(resting.fragment(take));
            if take < resting.amount() {
                partial_update = Some((key, resting.amount() - take));
            } else {
                fully_consumed_ids.push(resting.id());
            }
        }

        if remaining > 0 {
            // Opposite book exhausted before the order was filled.
            self.asks = snapshot;
            return false;
        }

        for id in fully_consumed_ids {
            self.asks.remove_by_id(id);
        }
        if let Some((key, new_amount)) = partial_update {
            if let Some(resting) = self.asks.entries.get_mut(&key) {
                resting.set_amount(new_amount);
            }
        }

        self.enqueue_match(order.clone(), fragments);
        true
    }

    fn match_against_bids(&mut self, order: &Order, available_assets: u64) -> bool {
        let snapshot = self.bids.clone();

        let mut remaining = order.amount();
        let mut total_assets: u64 = 0;
        let mut fragments = Vec::new();
        let mut fully_consumed_ids = Vec::new();
        let mut partial_update: Option<(BidKey, u64)> = None;

        for (&key, resting) in self.bids.entries.iter() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(resting.amount());
            if total_assets + take > available_assets {
                self.bids = snapshot;
                return false;
            }
            total_assets += take;
            remaining -= take;
            fragments.push(resting.fragment(take));
            if take < resting.amount() {
                partial_update = Some((key, resting.amount() - take));
            } else {
                fully_consumed_ids.push(resting.id());
            }
        }

        if remaining > 0 {
            self.bids = snapshot;
            return false;
        }

        for id in fully_consumed_ids {
            self.bids.remove_by_id(id);
        }
        if let Some((key, new_amount)) = partial_update {
            if let Some(resting) = self.bids.entries.get_mut(&key) {
                resting.set_amount(new_amount);
            }
        }

        self.enqueue_match(order.clone(), fragments);
        true
    }

    fn enqueue_match(&mut self, market_order: Order, fragments: Vec<Order>) {
        let mut m = Match::new(market_order);
        m.limit_orders = fragments;
        let fill_price = m.weighted_fill_price_cents();
        self.match_queue.push_back(m);
        self.stats.record_fill(fill_price);
    }

    pub fn dequeue_match(&mut self) -> Option<Match> {
        self.match_queue.pop_front()
    }

    pub fn get_highest_bid(&self) -> Option<i64> {
        self.bids.entries.values().next().map(|o| o.price_cents())
    }

    pub fn get_lowest_ask(&self) -> Option<i64> {
        self.asks.entries.values().next().map(|o| o.price_cents())
    }

    /// Ordered (price, cumulative amount, tick) rows, best price first.
    pub fn get_bid_depth(&self) -> Vec<(i64, u64, u64)> {
        Self::depth_of(self.bids.entries.values())
    }

    pub fn get_ask_depth(&self) -> Vec<(i64, u64, u64)> {
        Self::depth_of(self.asks.entries.values())
    }

    fn depth_of<'a>(orders: impl Iterator<Item = &'a Order>) -> Vec<(i64, u64, u64)> {
        let mut cumulative = 0u64;
        orders
            .map(|o| {
                cumulative += o.amount();
                (o.price_cents(), cumulative, o.tick())
            })
            .collect()
    }

    pub fn cancel_all_orders_for_trader(&mut self, trader_id: u64) {
        self.bids.remove_trader_orders(trader_id);
        self.asks.remove_trader_orders(trader_id);
    }

    /// Removes every resting limit order on this side for `trader_id`,
    /// returning them so the Broker can unearmark the reserved funds/assets
    /// they represent.
    pub fn cancel_orders_for_trader(&mut self, trader_id: u64) -> Vec<Order> {
        let mut cancelled = Vec::new();
        let bid_ids: Vec<u64> = self
            .bids
            .entries
            .values()
            .filter(|o| o.trader_id() == trader_id)
            .map(|o| o.id())
            .collect();
        for id in bid_ids {
            if let Some(o) = self.bids.remove_by_id(id) {
                cancelled.push(o);
            }
        }
        let ask_ids: Vec<u64> = self
            .asks
            .entries
            .values()
            .filter(|o| o.trader_id() == trader_id)
            .map(|o| o.id())
            .collect();
        for id in ask_ids {
            if let Some(o) = self.asks.remove_by_id(id) {
                cancelled.push(o);
            }
        }
        cancelled
    }

    /// Removes every resting limit order, returning them so the Broker can
    /// unearmark before the book is dropped (used by `end_trading_day` and
    /// `destroy_market`).
    pub fn clear_order_book(&mut self) -> Vec<Order> {
        let mut all: Vec<Order> = self.bids.entries.values().cloned().collect();
        all.extend(self.asks.entries.values().cloned());
        self.bids.clear();
        self.asks.clear();
        self.match_queue.clear();
        all
    }

    pub fn total_assets_held_in_ask_limits(&self) -> u64 {
        self.asks.total_amount()
    }

    pub fn total_cash_held_in_bid_limits(&self) -> i64 {
        self.bids
            .entries
            .values()
            .map(|o| o.amount() as i64 * o.price_cents())
            .sum()
    }

    pub fn get_level_1_market_data(&self) -> Level1MarketData {
        let mas = self.stats.moving_averages();
        let sds = self.stats.standard_deviations();
        Level1MarketData {
            best_bid: self.get_highest_bid(),
            best_ask: self.get_lowest_ask(),
            ma5: mas[0],
            sd5: sds[0],
            ma10: mas[1],
            sd10: sds[1],
            ma50: mas[2],
            sd50: sds[2],
            ma100: mas[3],
            sd100: sds[3],
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new()
    }
}
