//! Per-asset matching engine.
//!
//! Grounded on `examples/AlpinYukseloglu-orderbook/src/book/` (`Order`,
//! `Orderbook`), generalized and extended with the rolling statistics and
//! match-queue semantics from `pybroker/order_matching.py::Matcher`.

mod book;
mod order;
mod stats;

pub use book::{Matcher, MatcherError};
pub use order::{Match, Order, OrderType, Side};
