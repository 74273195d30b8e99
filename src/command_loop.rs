//! Poll -> dedup -> dispatch -> emit -> commit, grounded on the original
//! Python reference's `run`/`handle_command` pair (`app/engine.py`'s
//! `_run` loop), wired to the `transport` trait pair instead of a concrete
//! broker client.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::models::types::Side;
use crate::domain::services::dedup::CommandDeduplicator;
use crate::domain::services::registry::EngineRegistry;
use crate::transport::{AckToken, CommandSource, EventSink, TransportError};
use crate::wire::{price_to_ticks, ticks_to_price, AckPayload, BookPayload, InboundCommand, InboundType, OutboundEvent, TradePayload};

/// How long a single `poll` waits for the next record before looping back
/// around to drive the sink and check again. Short enough that shutdown
/// and idle housekeeping are still responsive.
const POLL_TIMEOUT_MS: u64 = 250;

pub struct CommandLoop<S, K> {
    source: S,
    sink: K,
    registry: EngineRegistry,
    dedup: CommandDeduplicator,
}

impl<S, K> CommandLoop<S, K>
where
    S: CommandSource,
    K: EventSink,
{
    pub fn new(source: S, sink: K, registry: EngineRegistry, dedup: CommandDeduplicator) -> Self {
        Self {
            source,
            sink,
            registry,
            dedup,
        }
    }

    /// Runs until the source is exhausted (`poll` returns an error) or
    /// `shutdown` resolves. Every other failure along the way becomes an
    /// `ACK { accepted: false }` instead of aborting the loop, per the
    /// error handling design: only transport failures are fatal.
    pub async fn run(mut self, mut shutdown: impl std::future::Future<Output = ()> + Unpin) -> anyhow::Result<()> {
        info!("command loop started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("command loop shutting down");
                    return Ok(());
                }
                polled = self.source.poll(POLL_TIMEOUT_MS) => {
                    let record = match polled {
                        Ok(Some(record)) => record,
                        Ok(None) => {
                            self.sink.drive().await;
                            continue;
                        }
                        Err(err) => {
                            error!(error = %err, "inbound transport failed");
                            return Err(err.into());
                        }
                    };
                    self.process(record.command, record.ack_token).await?;
                }
            }
        }
    }

    async fn process(&mut self, command: InboundCommand, ack_token: AckToken) -> Result<(), TransportError> {
        let symbol = command.symbol.clone();

        if let Some(command_id) = command.command_id.as_deref() {
            if self.dedup.seen_or_record(&symbol, command_id) {
                debug!(symbol = %symbol, command_id, "duplicate command, skipping dispatch");
                return self.source.commit(ack_token).await;
            }
        }

        let ts = Utc::now().timestamp_millis();
        let handle = self.registry.get_or_create(&symbol);

        let (ack, trades, book) = match command.kind {
            InboundType::Limit => {
                let side = command.side.map(Side::from);
                let price = command.price.and_then(price_to_ticks);
                match (side, price, command.quantity) {
                    (Some(side), Some(price), Some(quantity)) => {
                        match handle.submit_limit(side, quantity, price, command.user_ref.clone()).await {
                            Ok(outcome) => (
                                AckPayload::Limit {
                                    accepted: true,
                                    order_id: Some(outcome.order_id),
                                    residual_quantity: Some(outcome.residual_quantity),
                                    error: None,
                                },
                                outcome.trades,
                                true,
                            ),
                            Err(err) => (
                                AckPayload::Limit {
                                    accepted: false,
                                    order_id: None,
                                    residual_quantity: None,
                                    error: Some(err.to_string()),
                                },
                                Vec::new(),
                                false,
                            ),
                        }
                    }
                    _ => (
                        AckPayload::Limit {
                            accepted: false,
                            order_id: None,
                            residual_quantity: None,
                            error: Some("LIMIT requires side, quantity and a positive finite price".to_string()),
                        },
                        Vec::new(),
                        false,
                    ),
                }
            }
            InboundType::Market => {
                let side = command.side.map(Side::from);
                match (side, command.quantity) {
                    (Some(side), Some(quantity)) => {
                        match handle.submit_market(side, quantity, command.user_ref.clone()).await {
                            Ok(outcome) => (
                                AckPayload::Market {
                                    accepted: true,
                                    order_id: Some(outcome.order_id),
                                    filled_quantity: Some(outcome.filled_quantity),
                                    error: None,
                                },
                                outcome.trades,
                                true,
                            ),
                            Err(err) => (
                                AckPayload::Market {
                                    accepted: false,
                                    order_id: None,
                                    filled_quantity: None,
                                    error: Some(err.to_string()),
                                },
                                Vec::new(),
                                false,
                            ),
                        }
                    }
                    _ => (
                        AckPayload::Market {
                            accepted: false,
                            order_id: None,
                            filled_quantity: None,
                            error: Some("MARKET requires side and quantity".to_string()),
                        },
                        Vec::new(),
                        false,
                    ),
                }
            }
            InboundType::Cancel => match command.order_id {
                // A cancel that reaches the engine always gets its BOOK
                // event, whether or not the order was still live to cancel
                // — "cancel of unknown order" is not an error (spec §7.3).
                Some(order_id) => match handle.cancel(order_id).await {
                    Ok(accepted) => (AckPayload::Cancel { accepted, order_id }, Vec::new(), true),
                    Err(err) => {
                        warn!(symbol = %symbol, order_id, error = %err, "cancel failed");
                        (AckPayload::Cancel { accepted: false, order_id }, Vec::new(), true)
                    }
                },
                None => (
                    AckPayload::Unknown {
                        accepted: false,
                        error: "CANCEL requires order_id".to_string(),
                    },
                    Vec::new(),
                    false,
                ),
            },
        };

        // ACK first, then one TRADE per fill, then BOOK — the fixed
        // per-command emission order the loop guarantees.
        self.sink.publish(OutboundEvent::ack(symbol.clone(), ack, ts)).await?;

        for trade in &trades {
            self.sink
                .publish(OutboundEvent::trade(symbol.clone(), TradePayload::from(trade), ts))
                .await?;
        }

        if book {
            let (best_bid, best_bid_qty, best_ask, best_ask_qty) = handle
                .top_of_book()
                .await
                .unwrap_or((None, 0, None, 0));
            self.sink
                .publish(OutboundEvent::book(
                    symbol,
                    BookPayload {
                        best_bid: (best_bid.map(ticks_to_price), best_bid_qty),
                        best_ask: (best_ask.map(ticks_to_price), best_ask_qty),
                    },
                    ts,
                ))
                .await?;
        }

        self.source.commit(ack_token).await
    }
}
