pub mod command_loop;
pub mod config;
pub mod domain;
pub mod transport;
pub mod wire;

pub use domain::models::types::{BookSnapshot, Order, OrderType, Side, Trade};
pub use domain::services::dedup::CommandDeduplicator;
pub use domain::services::matching_engine::{MatchingEngineHandle, MatchingEngineWorker};
pub use domain::services::orderbook::{OrderBook, OrderbookError};
pub use domain::services::registry::EngineRegistry;
