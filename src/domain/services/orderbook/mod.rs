use thiserror::Error;

pub mod orderbook;

pub use self::orderbook::{OrderBook, PriceLevel, PriceLevelIndex};

/// Errors that can occur within the orderbook service.
#[derive(Debug, Error)]
pub enum OrderbookError {
    /// Limit order submitted with no price.
    #[error("limit order has no price")]
    NoLimitPrice,

    /// Order quantity was zero or otherwise invalid.
    #[error("invalid order quantity: {0}")]
    InvalidQuantity(u64),

    /// Invalid price level.
    #[error("invalid price: {0}")]
    InvalidPrice(i64),

    /// Order id unknown to this book.
    #[error("order {0} not found")]
    OrderNotFound(u64),
}
