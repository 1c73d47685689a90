//! Shared store slot channel.
//!
//! Sending overwrites one well-known slot with the envelope JSON; every
//! other context subscribed to the store sees the write. Concurrent
//! writers simply overwrite each other. There is no return path.

use crate::error::SyncResult;
use crate::protocol::Envelope;
use crate::transport::{Channel, ChannelKind, Inbound};
use countrycfg_store::SharedStore;
use countrycfg_types::ContextId;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

/// Storage channel for one context.
pub struct StorageChannel {
    id: ContextId,
    store: Arc<dyn SharedStore>,
    slot: String,
}

impl StorageChannel {
    /// Uses `slot` in `store` as context `id`.
    pub fn new(id: ContextId, store: Arc<dyn SharedStore>, slot: impl Into<String>) -> Self {
        Self {
            id,
            store,
            slot: slot.into(),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl Channel for StorageChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Storage
    }

    fn try_send(&self, envelope: &Envelope) -> SyncResult<()> {
        let json = envelope.to_json()?;
        self.store.set(&self.slot, &json, self.id)?;
        Ok(())
    }

    fn try_listen(&self, sink: mpsc::UnboundedSender<Inbound>) -> SyncResult<Option<JoinHandle<()>>> {
        let mut rx = self.store.subscribe();
        let id = self.id;
        let slot = self.slot.clone();

        let handle = tokio::spawn(async move {
            loop {
                let change = match rx.recv().await {
                    Ok(change) => change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Storage listener for {} lagged, {} changes dropped", id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if change.key != slot || change.writer == id {
                    continue;
                }
                let Some(raw) = change.new_value else {
                    continue;
                };
                let envelope = match Envelope::from_json(&raw) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Ignoring unreadable envelope in slot {}: {}", slot, e);
                        continue;
                    }
                };

                let inbound = Inbound {
                    channel: ChannelKind::Storage,
                    origin: None,
                    sender: change.writer,
                    envelope,
                    reply: None,
                };
                if sink.send(inbound).is_err() {
                    break;
                }
            }
        });
        Ok(Some(handle))
    }
}
