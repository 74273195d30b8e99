use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the book an order rests on or trades against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// LIMIT rests its residual after matching; MARKET never rests and fails
/// to fill against an empty or insufficiently deep opposing book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// A resting or in-flight order. `quantity` holds the *remaining* amount and
/// is mutated in place while the order is matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub seq: u64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u64,
    /// Price in integer ticks. `None` for market orders.
    pub price: Option<i64>,
    pub user_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }
}

/// One fill produced while matching a taker order against a resting maker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub price: i64,
    pub quantity: u64,
    pub taker_order_id: u64,
    pub maker_order_id: u64,
    pub taker_side: Side,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view of the book used for TOB replies and BOOK events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: Option<i64>,
    pub best_bid_quantity: u64,
    pub best_ask: Option<i64>,
    pub best_ask_quantity: u64,
}

/// Aggregated depth snapshot at up to `depth` price levels per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Best-to-worst, i.e. highest price first.
    pub bids: Vec<(i64, u64)>,
    /// Best-to-worst, i.e. lowest price first.
    pub asks: Vec<(i64, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_side_round_trips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn order_is_filled_when_quantity_drained() {
        let order = Order {
            id: 1,
            seq: 1,
            symbol: "BTC-USD".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: 0,
            price: Some(100),
            user_ref: None,
            created_at: Utc::now(),
        };
        assert!(order.is_filled());
    }
}
