//! Transport abstraction the command loop drives. Concrete transports
//! (RabbitMQ, or the in-memory pair used in tests) only need to implement
//! `CommandSource` and `EventSink`; the loop itself never sees a queue
//! name or a broker client.

pub mod memory;
pub mod rabbit;

use async_trait::async_trait;
use thiserror::Error;

use crate::wire::{InboundCommand, OutboundEvent};

/// A raw inbound record plus whatever the transport needs to commit it
/// later. Kept opaque to the command loop beyond the decoded command.
pub struct InboundRecord {
    pub command: InboundCommand,
    pub ack_token: AckToken,
}

/// Opaque per-message token a transport uses to commit/acknowledge a
/// record once the command loop has fully processed it.
pub enum AckToken {
    Rabbit(rabbit::RabbitAckToken),
    Memory,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport connection error: {0}")]
    Connection(String),
    #[error("failed to decode inbound command: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to commit inbound record: {0}")]
    Commit(String),
    #[error("failed to publish outbound event: {0}")]
    Publish(String),
}

/// Pull-based inbound command source with manual commit, mirroring the
/// original reference's `enable.auto.commit: False` consumer.
#[async_trait]
pub trait CommandSource: Send {
    /// Waits up to `timeout_ms` for the next record. `Ok(None)` means the
    /// poll timed out with nothing available — not an error.
    async fn poll(&mut self, timeout_ms: u64) -> Result<Option<InboundRecord>, TransportError>;

    /// Commits/acknowledges a record as fully processed.
    async fn commit(&mut self, ack_token: AckToken) -> Result<(), TransportError>;
}

/// Idempotent outbound event publisher.
#[async_trait]
pub trait EventSink: Send {
    async fn publish(&mut self, event: OutboundEvent) -> Result<(), TransportError>;

    /// Drives any background flushing/retry work the transport needs.
    /// Called on every loop tick, including empty polls, matching the
    /// original reference's `producer.poll(0)` calls.
    async fn drive(&mut self) {}
}
