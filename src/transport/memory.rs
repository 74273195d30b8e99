//! In-memory transport pair used by integration tests so the command loop
//! can be exercised end to end without a broker, mirroring the teacher's
//! existing preference for `tokio::sync::mpsc`-backed test doubles over
//! mocking the trait itself.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::wire::{InboundCommand, OutboundEvent};

use super::{AckToken, CommandSource, EventSink, InboundRecord, TransportError};

pub struct MemoryCommandSource {
    rx: mpsc::Receiver<InboundCommand>,
}

#[async_trait]
impl CommandSource for MemoryCommandSource {
    async fn poll(&mut self, timeout_ms: u64) -> Result<Option<InboundRecord>, TransportError> {
        let timeout = tokio::time::sleep(std::time::Duration::from_millis(timeout_ms));
        tokio::select! {
            received = self.rx.recv() => Ok(received.map(|command| InboundRecord {
                command,
                ack_token: AckToken::Memory,
            })),
            _ = timeout => Ok(None),
        }
    }

    async fn commit(&mut self, _ack_token: AckToken) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryEventSink {
    published: Arc<Mutex<Vec<OutboundEvent>>>,
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn publish(&mut self, event: OutboundEvent) -> Result<(), TransportError> {
        self.published.lock().push(event);
        Ok(())
    }
}

impl MemoryEventSink {
    pub fn published(&self) -> Vec<OutboundEvent> {
        self.published.lock().clone()
    }
}

/// Builds a connected `(source, sender, sink)` triple: push commands into
/// `sender`, drive the loop against `source`/`sink`, then inspect whatever
/// the sink recorded.
pub fn channel() -> (MemoryCommandSource, mpsc::Sender<InboundCommand>, MemoryEventSink) {
    let (tx, rx) = mpsc::channel(1024);
    let source = MemoryCommandSource { rx };
    let sink = MemoryEventSink {
        published: Arc::new(Mutex::new(Vec::new())),
    };
    (source, tx, sink)
}
