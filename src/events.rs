//! L1 market data, the L1 history row, and the optional event-sink
//! capability.
//!
//! Grounded on `pybroker/models.py::Level1MarketData` and
//! `pybroker/event_publisher.py::EventPublisher`. The Python publisher
//! spoke directly to an MQTT client; this crate turns it into a trait so
//! the matching/settlement core carries no transport dependency — wiring a
//! concrete sink (MQTT, a file, a channel) is left to the caller.

use serde::Serialize;

use crate::matcher::Order;

/// Best bid/ask plus rolling statistics for one asset, as of the moment it
/// was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Level1MarketData {
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
    pub ma5: Option<f64>,
    pub sd5: Option<f64>,
    pub ma10: Option<f64>,
    pub sd10: Option<f64>,
    pub ma50: Option<f64>,
    pub sd50: Option<f64>,
    pub ma100: Option<f64>,
    pub sd100: Option<f64>,
}

impl Level1MarketData {
    /// Vectorizes this snapshot for learned agents: best_bid, best_ask,
    /// MA5, SD5, MA10, SD10, MA50, SD50, MA100, SD100 — absent values
    /// encoded as -1.0.
    pub fn vectorize(&self) -> [f64; 10] {
        let enc_i = |v: Option<i64>| v.map(|v| v as f64).unwrap_or(-1.0);
        let enc_f = |v: Option<f64>| v.unwrap_or(-1.0);
        [
            enc_i(self.best_bid),
            enc_i(self.best_ask),
            enc_f(self.ma5),
            enc_f(self.sd5),
            enc_f(self.ma10),
            enc_f(self.sd10),
            enc_f(self.ma50),
            enc_f(self.sd50),
            enc_f(self.ma100),
            enc_f(self.sd100),
        ]
    }
}

/// One append-only row of L1 history, written after every successful
/// `place_order` call affecting top-of-book.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct L1HistoryRow {
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
    pub tick: u64,
}

/// An OHLC+ticks bar over `best_bid`, the shape crossing the
/// `{topic}/{asset}/bars/tick` interface. The aggregator that produces
/// these from a rolling window of `Level1MarketData` snapshots is an
/// external collaborator — only the payload shape is specified here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Bar {
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub ticks: u64,
}

/// Fire-and-forget sink for broker events. A sink failure must never roll
/// back a settled trade — implementations that can fail should swallow
/// their own errors (log, drop, retry out of band) rather than propagate
/// one back into `Broker::place_order`.
pub trait EventSink {
    fn order_executed(&self, asset: &str, order: &Order);
    fn order_cancelled(&self, asset: &str, order: &Order);
    fn publish_tick_bar(&self, asset: &str, bar: &Bar);
}

/// A sink that serializes every event to JSON and hands it to a closure —
/// the shape the Python `EventPublisher` used (topic string + JSON
/// payload), minus the MQTT transport itself.
pub struct JsonEventSink<F: Fn(&str, &str)> {
    topic: String,
    publish: F,
}

impl<F: Fn(&str, &str)> JsonEventSink<F> {
    pub fn new(topic: impl Into<String>, publish: F) -> Self {
        JsonEventSink {
            topic: topic.into(),
            publish,
        }
    }
}

impl<F: Fn(&str, &str)> EventSink for JsonEventSink<F> {
    fn order_executed(&self, asset: &str, order: &Order) {
        let subtopic = format!("{}/{}/order_executed", self.topic, asset);
        if let Ok(payload) = serde_json::to_string(order) {
            (self.publish)(&subtopic, &payload);
        }
    }

    fn order_cancelled(&self, asset: &str, order: &Order) {
        let subtopic = format!("{}/{}/order_cancelled", self.topic, asset);
        if let Ok(payload) = serde_json::to_string(order) {
            (self.publish)(&subtopic, &payload);
        }
    }

    fn publish_tick_bar(&self, asset: &str, bar: &Bar) {
        let subtopic = format!("{}/{}/bars/tick", self.topic, asset);
        if let Ok(payload) = serde_json::to_string(bar) {
            (self.publish)(&subtopic, &payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn vectorize_encodes_absent_as_negative_one() {
        let l1 = Level1MarketData {
            best_bid: Some(100),
            best_ask: None,
            ..Default::default()
        };
        let v = l1.vectorize();
        assert_eq!(v[0], 100.0);
        assert_eq!(v[1], -1.0);
        assert_eq!(v[2], -1.0);
    }

    #[test]
    fn json_event_sink_publishes_expected_subtopic() {
        use crate::matcher::{Order, OrderType, Side};
        let published: RefCell<Vec<(String, String)>> = RefCell::new(Vec::new());
        let sink = JsonEventSink::new("orderbook", |topic: &str, payload: &str| {
            published.borrow_mut().push((topic.to_string(), payload.to_string()));
        });
        let order = Order::new(1, 1, Side::Buy, OrderType::Limit, 10, 100);
        sink.order_executed("ABC", &order);
        let calls = published.borrow();
        assert_eq!(calls[0].0, "orderbook/ABC/order_executed");
        assert!(calls[0].1.contains("\"side\":\"Buy\""));
    }
}
