use thiserror::Error;

pub mod matching_engine;

pub use self::matching_engine::{MatchingEngineHandle, MatchingEngineWorker};

/// Errors surfaced back to a command loop by a running engine.
#[derive(Debug, Error)]
pub enum MatchingError {
    /// The limit order carried no price.
    #[error("limit order has no price")]
    NoLimitPrice,

    /// Quantity was zero.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(u64),

    /// Price was not a positive number of ticks.
    #[error("invalid price: {0}")]
    InvalidPrice(i64),

    /// The engine's worker thread has already shut down.
    #[error("engine for symbol {0} is no longer running")]
    EngineStopped(String),
}
