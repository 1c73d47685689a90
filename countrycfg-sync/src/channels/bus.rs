//! Same-origin broadcast bus.
//!
//! Every context of an origin shares one [`OriginBus`] and sees every
//! frame published on it, regardless of window hierarchy. A frame may be
//! addressed to a single context; everyone else drops it.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Envelope;
use crate::transport::{Channel, ChannelKind, Inbound, Responder, ResponseToken};
use countrycfg_types::ContextId;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Frames buffered per subscriber before slow ones start lagging.
const DEFAULT_CAPACITY: usize = 128;

/// A frame on the bus.
#[derive(Debug, Clone)]
pub struct BusFrame {
    pub sender: ContextId,
    /// Only this context should process the frame.
    pub target: Option<ContextId>,
    pub origin: String,
    pub envelope: Envelope,
}

/// Fan-out shared by every context of one origin.
#[derive(Debug, Clone)]
pub struct OriginBus {
    origin: String,
    tx: broadcast::Sender<BusFrame>,
}

impl OriginBus {
    /// Creates a bus for `origin` with default capacity.
    pub fn new(origin: impl Into<String>) -> Self {
        Self::with_capacity(origin, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(origin: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            origin: origin.into(),
            tx,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Publishes a frame. Returns how many subscribers will see it.
    pub fn publish(&self, frame: BusFrame) -> usize {
        // No subscribers just means no other context is open.
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusFrame> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Bus channel for one context.
pub struct BusChannel {
    id: ContextId,
    bus: Option<OriginBus>,
}

impl BusChannel {
    /// Joins `bus` as context `id`.
    pub fn new(id: ContextId, bus: OriginBus) -> Self {
        Self { id, bus: Some(bus) }
    }

    /// A channel for a runtime without bus support.
    pub fn unsupported(id: ContextId) -> Self {
        Self { id, bus: None }
    }
}

struct BusReply {
    bus: OriginBus,
    from: ContextId,
    to: ContextId,
}

impl Responder for BusReply {
    fn respond(&self, envelope: &Envelope) -> SyncResult<()> {
        self.bus.publish(BusFrame {
            sender: self.from,
            target: Some(self.to),
            origin: self.bus.origin.clone(),
            envelope: envelope.clone(),
        });
        Ok(())
    }
}

impl Channel for BusChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Bus
    }

    fn is_supported(&self) -> bool {
        self.bus.is_some()
    }

    fn try_send(&self, envelope: &Envelope) -> SyncResult<()> {
        let bus = self
            .bus
            .as_ref()
            .ok_or_else(|| SyncError::unavailable(ChannelKind::Bus, "no broadcast bus"))?;
        let seen_by = bus.publish(BusFrame {
            sender: self.id,
            target: None,
            origin: bus.origin.clone(),
            envelope: envelope.clone(),
        });
        trace!("{} published to {} bus subscribers", envelope.kind, seen_by);
        Ok(())
    }

    fn try_listen(&self, sink: mpsc::UnboundedSender<Inbound>) -> SyncResult<Option<JoinHandle<()>>> {
        let bus = self
            .bus
            .clone()
            .ok_or_else(|| SyncError::unavailable(ChannelKind::Bus, "no broadcast bus"))?;
        let mut rx = bus.subscribe();
        let id = self.id;

        let handle = tokio::spawn(async move {
            loop {
                let frame = match rx.recv().await {
                    Ok(frame) => frame,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Bus listener for {} lagged, {} frames dropped", id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if frame.sender == id || frame.target.is_some_and(|t| t != id) {
                    continue;
                }

                let reply = ResponseToken::new(BusReply {
                    bus: bus.clone(),
                    from: id,
                    to: frame.sender,
                });
                let inbound = Inbound {
                    channel: ChannelKind::Bus,
                    origin: Some(frame.origin),
                    sender: frame.sender,
                    envelope: frame.envelope,
                    reply: Some(reply),
                };
                if sink.send(inbound).is_err() {
                    break;
                }
            }
        });
        Ok(Some(handle))
    }
}
