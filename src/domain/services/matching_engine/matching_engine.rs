use std::thread;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::models::types::{BookSnapshot, Order, OrderType, Side, Trade};
use crate::domain::services::orderbook::{OrderBook, OrderbookError};

use super::MatchingError;

/// Carries a book-level rejection back to the handle's caller without
/// collapsing every case into the same error, so an ACK's `error` field
/// names the actual problem (bad price vs. bad quantity).
fn matching_error_from(err: OrderbookError) -> MatchingError {
    match err {
        OrderbookError::NoLimitPrice => MatchingError::NoLimitPrice,
        OrderbookError::InvalidPrice(price) => MatchingError::InvalidPrice(price),
        OrderbookError::InvalidQuantity(quantity) => MatchingError::InvalidQuantity(quantity),
        // add_limit/add_market never return this; cancel() reports a
        // missing order as `false`, not an error.
        OrderbookError::OrderNotFound(order_id) => MatchingError::InvalidQuantity(order_id),
    }
}

/// Result of submitting a LIMIT order.
#[derive(Debug, Clone)]
pub struct LimitOutcome {
    pub order_id: u64,
    pub trades: Vec<Trade>,
    pub residual_quantity: u64,
}

/// Result of submitting a MARKET order.
#[derive(Debug, Clone)]
pub struct MarketOutcome {
    pub order_id: u64,
    pub trades: Vec<Trade>,
    pub filled_quantity: u64,
}

/// Engine-internal command vocabulary. Mirrors the LIMIT/MARKET/CANCEL/
/// TOB/SNAP/STOP set handled by the original reference engine's command
/// queue, expressed as typed messages with a completion handle per command
/// instead of the original's `(cmd, args, kwargs, future)` tuple.
enum EngineCommand {
    Limit {
        side: Side,
        quantity: u64,
        price: i64,
        user_ref: Option<String>,
        respond_to: oneshot::Sender<Result<LimitOutcome, MatchingError>>,
    },
    Market {
        side: Side,
        quantity: u64,
        user_ref: Option<String>,
        respond_to: oneshot::Sender<Result<MarketOutcome, MatchingError>>,
    },
    Cancel {
        order_id: u64,
        respond_to: oneshot::Sender<bool>,
    },
    TopOfBook {
        respond_to: oneshot::Sender<(Option<i64>, u64, Option<i64>, u64)>,
    },
    Snapshot {
        depth: usize,
        respond_to: oneshot::Sender<BookSnapshot>,
    },
    Stop {
        respond_to: oneshot::Sender<()>,
    },
}

/// Clonable front for a running engine. Each call builds a oneshot reply
/// channel and awaits the worker's response, the same request/response
/// shape as the teacher's `OrderBookClient`.
#[derive(Clone)]
pub struct MatchingEngineHandle {
    symbol: String,
    command_tx: mpsc::Sender<EngineCommand>,
}

impl MatchingEngineHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn submit_limit(
        &self,
        side: Side,
        quantity: u64,
        price: i64,
        user_ref: Option<String>,
    ) -> Result<LimitOutcome, MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Limit {
                side,
                quantity,
                price,
                user_ref,
                respond_to: tx,
            })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?
    }

    pub async fn submit_market(
        &self,
        side: Side,
        quantity: u64,
        user_ref: Option<String>,
    ) -> Result<MarketOutcome, MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Market {
                side,
                quantity,
                user_ref,
                respond_to: tx,
            })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?
    }

    pub async fn cancel(&self, order_id: u64) -> Result<bool, MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Cancel {
                order_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))
    }

    pub async fn top_of_book(&self) -> Result<(Option<i64>, u64, Option<i64>, u64), MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::TopOfBook { respond_to: tx })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))
    }

    pub async fn snapshot(&self, depth: usize) -> Result<BookSnapshot, MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Snapshot { depth, respond_to: tx })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))
    }

    pub async fn stop(&self) -> Result<(), MatchingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Stop { respond_to: tx })
            .await
            .map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))?;
        rx.await.map_err(|_| MatchingError::EngineStopped(self.symbol.clone()))
    }
}

/// Owns the book and the per-symbol id/seq counters for one symbol. Runs on
/// its own OS thread driving a single-threaded tokio runtime, the same
/// pattern the teacher's `OrderBookWorker` uses, generalized to the full
/// LIMIT/MARKET/CANCEL/TOB/SNAP/STOP vocabulary so there is exactly one
/// writer per symbol and no book-level locking is ever needed.
pub struct MatchingEngineWorker {
    book: OrderBook,
    next_id: u64,
    next_seq: u64,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl MatchingEngineWorker {
    /// Spawns the worker thread and returns a handle to it plus its
    /// `JoinHandle` for shutdown coordination.
    pub fn start(symbol: impl Into<String>) -> (MatchingEngineHandle, thread::JoinHandle<()>) {
        let symbol = symbol.into();
        let (command_tx, command_rx) = mpsc::channel(1024);

        let worker = MatchingEngineWorker {
            book: OrderBook::new(symbol.clone()),
            next_id: 1,
            next_seq: 1,
            command_rx,
        };

        let thread_symbol = symbol.clone();
        let join_handle = thread::Builder::new()
            .name(format!("engine-{symbol}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build engine worker runtime");
                runtime.block_on(worker.run(thread_symbol));
            })
            .expect("failed to spawn matching engine worker thread");

        (
            MatchingEngineHandle { symbol, command_tx },
            join_handle,
        )
    }

    async fn run(mut self, symbol: String) {
        info!(symbol = %symbol, "matching engine worker started");
        while let Some(command) = self.command_rx.recv().await {
            match command {
                EngineCommand::Limit {
                    side,
                    quantity,
                    price,
                    user_ref,
                    respond_to,
                } => {
                    let result = self.handle_limit(side, quantity, price, user_ref);
                    let _ = respond_to.send(result);
                }
                EngineCommand::Market {
                    side,
                    quantity,
                    user_ref,
                    respond_to,
                } => {
                    let result = self.handle_market(side, quantity, user_ref);
                    let _ = respond_to.send(result);
                }
                EngineCommand::Cancel { order_id, respond_to } => {
                    let cancelled = self.book.cancel(order_id);
                    debug!(symbol = %symbol, order_id, cancelled, "cancel processed");
                    let _ = respond_to.send(cancelled);
                }
                EngineCommand::TopOfBook { respond_to } => {
                    let _ = respond_to.send(self.book.top_of_book());
                }
                EngineCommand::Snapshot { depth, respond_to } => {
                    let _ = respond_to.send(self.book.snapshot(depth));
                }
                EngineCommand::Stop { respond_to } => {
                    info!(symbol = %symbol, "matching engine worker stopping");
                    let _ = respond_to.send(());
                    break;
                }
            }
        }
        warn!(symbol = %symbol, "matching engine worker exited");
    }

    fn handle_limit(
        &mut self,
        side: Side,
        quantity: u64,
        price: i64,
        user_ref: Option<String>,
    ) -> Result<LimitOutcome, MatchingError> {
        if quantity == 0 {
            return Err(MatchingError::InvalidQuantity(quantity));
        }
        let order = self.next_order(side, OrderType::Limit, quantity, Some(price), user_ref);
        let order_id = order.id;
        let (trades, residual_quantity) = self.book.add_limit(order).map_err(matching_error_from)?;
        Ok(LimitOutcome {
            order_id,
            trades,
            residual_quantity,
        })
    }

    fn handle_market(
        &mut self,
        side: Side,
        quantity: u64,
        user_ref: Option<String>,
    ) -> Result<MarketOutcome, MatchingError> {
        if quantity == 0 {
            return Err(MatchingError::InvalidQuantity(quantity));
        }
        let order = self.next_order(side, OrderType::Market, quantity, None, user_ref);
        let order_id = order.id;
        let trades = self.book.add_market(order).map_err(matching_error_from)?;
        let filled_quantity = trades.iter().map(|t| t.quantity).sum();
        Ok(MarketOutcome {
            order_id,
            trades,
            filled_quantity,
        })
    }

    /// Assigns `id` and `seq` here, just before the order reaches the book,
    /// so sequence order always matches arrival order at this single
    /// writer regardless of how commands were produced upstream.
    fn next_order(
        &mut self,
        side: Side,
        order_type: OrderType,
        quantity: u64,
        price: Option<i64>,
        user_ref: Option<String>,
    ) -> Order {
        let id = self.next_id;
        let seq = self.next_seq;
        self.next_id += 1;
        self.next_seq += 1;
        Order {
            id,
            seq,
            symbol: self.book.symbol.clone(),
            side,
            order_type,
            quantity,
            price,
            user_ref,
            created_at: Utc::now(),
        }
    }
}
