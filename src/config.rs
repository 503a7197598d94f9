//! Broker configuration knobs.
//!
//! Grounded on `pybroker/broker_logging.py::LogSettings`, which gathered
//! the logging/L1-channel toggles used by `setup_logging` into one
//! dataclass passed to a constructor. No teacher equivalent exists — the
//! teacher had no configuration layer at all.

/// Tunables for a `Broker`. `Broker::new()` uses `BrokerConfig::default()`;
/// `Broker::with_config` takes an explicit one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Window sizes (in fills) for the Matcher's rolling moving-average /
    /// standard-deviation statistics.
    pub stats_windows: [usize; 4],
    /// Capacity of each Matcher's circular fill-price buffer.
    pub price_buffer_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            stats_windows: [5, 10, 50, 100],
            price_buffer_capacity: 100,
        }
    }
}
