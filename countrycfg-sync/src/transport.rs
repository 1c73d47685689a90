//! Broadcast transport.
//!
//! A [`Transport`] fans each envelope out over every configured
//! [`Channel`] and funnels everything the channels receive into one
//! [`InboundStream`]. Channels are independent: one failing or being
//! unsupported never stops the others.
//!
//! Window and bus envelopes must come from an allow-listed origin. The
//! storage channel is same-origin by construction and is not checked.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Envelope;
use countrycfg_types::{ContextId, CountryConfiguration};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The three delivery mechanisms between contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Direct reference to a parent or opener context.
    Window,
    /// Same-origin broadcast bus.
    Bus,
    /// Change notification on a shared store slot.
    Storage,
}

impl ChannelKind {
    /// Whether inbound envelopes must pass the origin allow-list.
    pub fn checks_origin(self) -> bool {
        !matches!(self, Self::Storage)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Window => "window",
            Self::Bus => "bus",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// Sends a reply back to the context an inbound envelope came from.
pub trait Responder: Send + Sync {
    fn respond(&self, envelope: &Envelope) -> SyncResult<()>;
}

/// Opaque token used to reply to an inbound envelope.
/// Each channel wraps its own return path inside this.
#[derive(Clone)]
pub struct ResponseToken(Arc<dyn Responder>);

impl ResponseToken {
    /// Wraps a channel-specific return path.
    pub fn new(responder: impl Responder + 'static) -> Self {
        Self(Arc::new(responder))
    }

    /// Sends `envelope` to the original sender.
    pub fn respond(&self, envelope: &Envelope) -> SyncResult<()> {
        self.0.respond(envelope)
    }
}

impl fmt::Debug for ResponseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseToken")
    }
}

/// An envelope received on one channel.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// The channel it arrived on.
    pub channel: ChannelKind,
    /// Origin of the sending context, when the channel reports one.
    pub origin: Option<String>,
    /// The sending context.
    pub sender: ContextId,
    pub envelope: Envelope,
    /// Return path, if the channel has one.
    pub reply: Option<ResponseToken>,
}

/// One delivery mechanism.
pub trait Channel: Send + Sync {
    /// Which mechanism this is.
    fn kind(&self) -> ChannelKind;

    /// Whether the runtime supports this channel at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Sends an envelope without waiting for delivery.
    ///
    /// Returns [`SyncError::ChannelUnavailable`] when there is nobody to
    /// send to from this context.
    fn try_send(&self, envelope: &Envelope) -> SyncResult<()>;

    /// Starts forwarding received envelopes into `sink`.
    ///
    /// Channels that need a background task return its handle. Must be
    /// called from within a tokio runtime.
    fn try_listen(&self, sink: mpsc::UnboundedSender<Inbound>) -> SyncResult<Option<JoinHandle<()>>>;
}

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Origins accepted on the window and bus channels.
    pub allowed_origins: Vec<String>,
    /// Shared store slot used by the storage channel.
    pub sync_slot: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
            sync_slot: "crossDomainSync".to_string(),
        }
    }
}

impl TransportConfig {
    /// Whether an envelope from `origin` on `channel` may be processed.
    pub fn accepts(&self, channel: ChannelKind, origin: Option<&str>) -> bool {
        if !channel.checks_origin() {
            return true;
        }
        origin.is_some_and(|o| self.allowed_origins.iter().any(|allowed| allowed == o))
    }
}

/// Per-channel result of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<ChannelKind>,
    pub skipped: Vec<ChannelKind>,
    pub failed: Vec<(ChannelKind, String)>,
}

impl DeliveryReport {
    /// Whether at least one channel accepted the envelope.
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// Multi-channel fan-out and fan-in for one context.
pub struct Transport {
    context: ContextId,
    config: Arc<TransportConfig>,
    channels: Vec<Arc<dyn Channel>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Transport {
    /// Creates a transport with no channels.
    pub fn new(context: ContextId, config: TransportConfig) -> Self {
        Self {
            context,
            config: Arc::new(config),
            channels: Vec::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Adds a channel. Channels are tried in the order they were added.
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// This context's id.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Kinds of the configured channels, in send order.
    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.kind()).collect()
    }

    /// Sends `envelope` on every channel.
    ///
    /// Never short-circuits: every channel is attempted and the outcome of
    /// each is recorded in the report.
    pub fn broadcast(&self, envelope: &Envelope) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for channel in &self.channels {
            let kind = channel.kind();
            if !channel.is_supported() {
                debug!("Skipping {} channel: not supported", kind);
                report.skipped.push(kind);
                continue;
            }
            match channel.try_send(envelope) {
                Ok(()) => report.delivered.push(kind),
                Err(SyncError::ChannelUnavailable { reason, .. }) => {
                    debug!("Skipping {} channel: {}", kind, reason);
                    report.skipped.push(kind);
                }
                Err(e) => {
                    warn!("Failed to send {} on {} channel: {}", envelope.kind, kind, e);
                    report.failed.push((kind, e.to_string()));
                }
            }
        }
        report
    }

    /// Announces a changed configuration to every reachable sibling.
    pub fn notify_config_updated(&self, config: &CountryConfiguration) -> SyncResult<DeliveryReport> {
        let envelope = Envelope::config_updated(config)?;
        Ok(self.broadcast(&envelope))
    }

    /// Asks every reachable sibling for its state. Fire-and-forget.
    pub fn request_sync(&self) -> DeliveryReport {
        debug!("Context {} requesting sync", self.context);
        self.broadcast(&Envelope::request_sync())
    }

    /// Starts every channel's listener and returns the merged stream.
    ///
    /// A channel that cannot listen is logged and left out.
    pub fn listen(&self) -> InboundStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handles = Vec::new();
        for channel in &self.channels {
            if !channel.is_supported() {
                continue;
            }
            match channel.try_listen(tx.clone()) {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => warn!("Not listening on {} channel: {}", channel.kind(), e),
            }
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.extend(handles);
        }
        InboundStream {
            rx,
            config: Arc::clone(&self.config),
        }
    }

    /// Stops every listener task.
    pub fn shutdown(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Inbound envelopes from all channels, with disallowed origins removed.
pub struct InboundStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
    config: Arc<TransportConfig>,
}

impl InboundStream {
    /// Receives the next accepted envelope. Returns `None` once every
    /// channel listener has stopped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let inbound = self.rx.recv().await?;
            if self.config.accepts(inbound.channel, inbound.origin.as_deref()) {
                return Some(inbound);
            }
            warn!(
                "Rejected {} from origin {:?} on {} channel",
                inbound.envelope.kind, inbound.origin, inbound.channel
            );
        }
    }
}

/// An in-memory channel for testing.
pub mod mock {
    use super::*;

    /// Records sent envelopes and lets tests inject inbound ones.
    pub struct RecordingChannel {
        kind: ChannelKind,
        supported: bool,
        failure: Mutex<Option<String>>,
        sent: Arc<Mutex<Vec<Envelope>>>,
        replies: Arc<Mutex<Vec<Envelope>>>,
        sink: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    }

    struct RecordingResponder {
        replies: Arc<Mutex<Vec<Envelope>>>,
    }

    impl Responder for RecordingResponder {
        fn respond(&self, envelope: &Envelope) -> SyncResult<()> {
            self.replies.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    impl RecordingChannel {
        /// Creates a supported channel of the given kind.
        pub fn new(kind: ChannelKind) -> Self {
            Self {
                kind,
                supported: true,
                failure: Mutex::new(None),
                sent: Arc::new(Mutex::new(Vec::new())),
                replies: Arc::new(Mutex::new(Vec::new())),
                sink: Mutex::new(None),
            }
        }

        /// Creates a channel the runtime does not support.
        pub fn unsupported(kind: ChannelKind) -> Self {
            Self {
                supported: false,
                ..Self::new(kind)
            }
        }

        /// Makes every send fail with `reason` (or succeed again on `None`).
        pub fn set_failure(&self, reason: Option<&str>) {
            *self.failure.lock().unwrap() = reason.map(str::to_string);
        }

        /// Envelopes sent so far.
        pub fn sent(&self) -> Vec<Envelope> {
            self.sent.lock().unwrap().clone()
        }

        /// Replies sent through tokens handed out by [`Self::deliver`].
        pub fn replies(&self) -> Vec<Envelope> {
            self.replies.lock().unwrap().clone()
        }

        /// Feeds an inbound envelope to the listener. Returns `false` if
        /// nothing is listening.
        pub fn deliver(
            &self,
            origin: Option<&str>,
            sender: ContextId,
            envelope: Envelope,
            with_reply: bool,
        ) -> bool {
            let reply = with_reply.then(|| {
                ResponseToken::new(RecordingResponder {
                    replies: Arc::clone(&self.replies),
                })
            });
            let inbound = Inbound {
                channel: self.kind,
                origin: origin.map(str::to_string),
                sender,
                envelope,
                reply,
            };
            match self.sink.lock().unwrap().as_ref() {
                Some(sink) => sink.send(inbound).is_ok(),
                None => false,
            }
        }
    }

    impl Channel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn try_send(&self, envelope: &Envelope) -> SyncResult<()> {
            if let Some(reason) = self.failure.lock().unwrap().clone() {
                return Err(SyncError::Protocol(reason));
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn try_listen(
            &self,
            sink: mpsc::UnboundedSender<Inbound>,
        ) -> SyncResult<Option<JoinHandle<()>>> {
            *self.sink.lock().unwrap() = Some(sink);
            Ok(None)
        }
    }
}
