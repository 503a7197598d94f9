//! A simulated multi-asset trading broker: a price-time (FIFO) continuous
//! double-auction matching engine coupled with an accounting ledger that
//! guarantees conservation of cash and assets across every trader
//! operation.
//!
//! The three composing pieces, leaves first: [`matcher`] (per-asset order
//! book and matching), [`ledger`] (per-trader cash/asset wallet) and
//! [`broker`] (the singleton orchestrator that is the only component
//! combining the two). [`config`] and [`events`] are the supporting
//! vocabulary and ambient stack shared by all three. Assets are identified
//! by plain symbol strings throughout.

pub mod broker;
pub mod config;
pub mod events;
pub mod ledger;
pub mod matcher;

pub use broker::{Broker, BrokerError, MarketTotals};
pub use config::BrokerConfig;
pub use events::{Bar, EventSink, JsonEventSink, L1HistoryRow, Level1MarketData};
pub use ledger::{Account, LedgerError};
pub use matcher::{Match, Matcher, MatcherError, Order, OrderType, Side};
