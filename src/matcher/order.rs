use getset::{CopyGetters, Setters};
use serde::Serialize;

/// Which side of the book an order rests on or crosses.
#[derive(Serialize, PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum Side {
    Buy,
    Sell,
}

/// Limit orders rest until matched or cancelled; market orders are
/// fill-or-kill within a single `Broker::place_order` call.
#[derive(Serialize, PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum OrderType {
    Limit,
    Market,
}

/// An order submitted to the broker. `tick` is assigned by the Broker,
/// never by the caller; `id` is supplied by the caller and must be unique
/// among the resting orders of the Matcher it is placed into.
#[derive(CopyGetters, Setters, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Order {
    #[get_copy = "pub"]
    id: u64,
    #[get_copy = "pub"]
    trader_id: u64,
    #[get_copy = "pub"]
    side: Side,
    #[get_copy = "pub"]
    #[serde(rename = "type")]
    kind: OrderType,
    #[get_copy = "pub"]
    #[set = "pub(crate)"]
    amount: u64,
    #[get_copy = "pub"]
    price_cents: i64,
    #[get_copy = "pub"]
    #[set = "pub(crate)"]
    tick: u64,
}

impl Order {
    pub fn new(
        id: u64,
        trader_id: u64,
        side: Side,
        kind: OrderType,
        amount: u64,
        price_cents: i64,
    ) -> Order {
        Order {
            id,
            trader_id,
            side,
            kind,
            amount,
            price_cents,
            tick: 0,
        }
    }

    /// Returns a copy of this order with `amount` replaced — used to build
    /// a fragment representing a partial fill of a resting limit order (a
    /// fragment equals the resting order when fully consumed, else a copy
    /// with reduced amount).
    pub(crate) fn fragment(&self, amount: u64) -> Order {
        let mut frag = self.clone();
        frag.amount = amount;
        frag
    }
}

/// Produced by `Matcher::match_market_order`, consumed exactly once by the
/// Broker's settlement.
#[derive(Clone, Debug)]
pub struct Match {
    pub market_order: Order,
    pub limit_orders: Vec<Order>,
}

impl Match {
    pub fn new(market_order: Order) -> Match {
        Match {
            market_order,
            limit_orders: Vec::new(),
        }
    }

    pub fn fulfils_market_order(&self) -> bool {
        self.market_order.amount == self.limit_orders_total_amount()
    }

    pub fn limit_orders_total_amount(&self) -> u64 {
        self.limit_orders.iter().map(|o| o.amount).sum()
    }

    pub fn limit_orders_total_value_cents(&self) -> i64 {
        self.limit_orders
            .iter()
            .map(|o| o.amount as i64 * o.price_cents)
            .sum()
    }

    /// Amount-weighted average fill price across all consumed fragments.
    /// The market order's own `price_cents` is always 0 and must not be
    /// used here.
    pub fn weighted_fill_price_cents(&self) -> f64 {
        let total_amount = self.limit_orders_total_amount();
        if total_amount == 0 {
            return 0.0;
        }
        self.limit_orders_total_value_cents() as f64 / total_amount as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_reduces_amount_without_mutating_original() {
        let order = Order::new(1, 1, Side::Buy, OrderType::Limit, 100, 10);
        let frag = order.fragment(40);
        assert_eq!(frag.amount(), 40);
        assert_eq!(order.amount(), 100);
        assert_eq!(frag.id(), order.id());
    }

    #[test]
    fn match_weighted_fill_price_averages_fragments() {
        let market = Order::new(1, 1, Side::Buy, OrderType::Market, 15, 0);
        let mut m = Match::new(market);
        m.limit_orders.push(Order::new(2, 2, Side::Sell, OrderType::Limit, 10, 100));
        m.limit_orders.push(Order::new(3, 3, Side::Sell, OrderType::Limit, 5, 200));
        assert!(m.fulfils_market_order());
        // (10*100 + 5*200) / 15 = 2000/15
        assert!((m.weighted_fill_price_cents() - (2000.0 / 15.0)).abs() < 1e-9);
    }

    #[test]
    fn order_serializes_enum_fields_by_name() {
        let order = Order::new(1, 1, Side::Buy, OrderType::Limit, 10, 100);
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"side\":\"Buy\""));
        assert!(json.contains("\"type\":\"Limit\""));
    }
}
