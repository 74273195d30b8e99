//! Self-describing JSON wire format for inbound commands and outbound
//! events, matching the original reference's `json.dumps`/Kafka payloads
//! (spec's §6 record shapes) using the teacher's existing `serde_json`.

use serde::{Deserialize, Serialize};

use crate::domain::models::types::{Side, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InboundType {
    Limit,
    Market,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireSide {
    Buy,
    Sell,
}

impl From<WireSide> for Side {
    fn from(value: WireSide) -> Self {
        match value {
            WireSide::Buy => Side::Buy,
            WireSide::Sell => Side::Sell,
        }
    }
}

/// Decimal scale applied when converting the wire format's floating-point
/// `price` field into integer ticks, matching the teacher's existing
/// 6-decimal-place convention (see `create_test_order` in the teacher's
/// binaries).
pub const PRICE_SCALE: f64 = 1_000_000.0;

/// Converts a decimal price into ticks, rejecting anything that isn't
/// positive and finite (spec's inbound `price` field is "positive
/// finite") — `None` here means the caller should reject the command
/// before it ever reaches the book.
pub fn price_to_ticks(price: f64) -> Option<i64> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let ticks = (price * PRICE_SCALE).round() as i64;
    if ticks <= 0 {
        return None;
    }
    Some(ticks)
}

pub fn ticks_to_price(ticks: i64) -> f64 {
    ticks as f64 / PRICE_SCALE
}

/// One inbound command record, deserialized straight off the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundCommand {
    pub command_id: Option<String>,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: InboundType,
    pub side: Option<WireSide>,
    pub price: Option<f64>,
    pub quantity: Option<u64>,
    pub order_id: Option<u64>,
    pub user_ref: Option<String>,
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum AckPayload {
    Limit {
        accepted: bool,
        order_id: Option<u64>,
        residual_quantity: Option<u64>,
        error: Option<String>,
    },
    Market {
        accepted: bool,
        order_id: Option<u64>,
        filled_quantity: Option<u64>,
        error: Option<String>,
    },
    Cancel {
        accepted: bool,
        order_id: u64,
    },
    Unknown {
        accepted: bool,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TradePayload {
    pub taker_order_id: u64,
    pub maker_order_id: u64,
    pub price: f64,
    pub quantity: u64,
}

impl From<&Trade> for TradePayload {
    fn from(trade: &Trade) -> Self {
        Self {
            taker_order_id: trade.taker_order_id,
            maker_order_id: trade.maker_order_id,
            price: ticks_to_price(trade.price),
            quantity: trade.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookPayload {
    pub best_bid: (Option<f64>, u64),
    pub best_ask: (Option<f64>, u64),
}

/// One outbound event record. `ts` is stamped by the command loop at
/// publish time, not by this type, since `Utc::now()` belongs at the
/// boundary where the event is actually emitted.
/// One outbound event record: `event` names ACK/TRADE/BOOK and `payload`
/// carries the shape matching spec's §6 outbound table for that event.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub symbol: String,
    pub event: &'static str,
    pub payload: serde_json::Value,
    pub ts: i64,
}

impl OutboundEvent {
    pub fn ack(symbol: impl Into<String>, payload: AckPayload, ts: i64) -> Self {
        Self {
            symbol: symbol.into(),
            event: "ACK",
            payload: serde_json::to_value(payload).expect("AckPayload always serializes"),
            ts,
        }
    }

    pub fn trade(symbol: impl Into<String>, payload: TradePayload, ts: i64) -> Self {
        Self {
            symbol: symbol.into(),
            event: "TRADE",
            payload: serde_json::to_value(payload).expect("TradePayload always serializes"),
            ts,
        }
    }

    pub fn book(symbol: impl Into<String>, payload: BookPayload, ts: i64) -> Self {
        Self {
            symbol: symbol.into(),
            event: "BOOK",
            payload: serde_json::to_value(payload).expect("BookPayload always serializes"),
            ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_round_trips_through_ticks() {
        let ticks = price_to_ticks(100.5).unwrap();
        assert_eq!(ticks, 100_500_000);
        assert!((ticks_to_price(ticks) - 100.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_or_non_finite_price_is_rejected() {
        assert_eq!(price_to_ticks(0.0), None);
        assert_eq!(price_to_ticks(-5.0), None);
        assert_eq!(price_to_ticks(f64::NAN), None);
        assert_eq!(price_to_ticks(f64::INFINITY), None);
    }

    #[test]
    fn inbound_command_deserializes_from_json() {
        let raw = r#"{"command_id":"c1","symbol":"BTC-USD","type":"LIMIT","side":"BUY","price":100.0,"quantity":5}"#;
        let cmd: InboundCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd.symbol, "BTC-USD");
        assert_eq!(cmd.kind, InboundType::Limit);
        assert_eq!(cmd.side, Some(WireSide::Buy));
    }
}
