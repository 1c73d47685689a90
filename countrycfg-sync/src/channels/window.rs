//! Direct window reference channel.
//!
//! Every context owns an inbox. A [`WindowHandle`] is a posting reference
//! to someone else's inbox, the way a frame holds its parent or a popup
//! holds its opener. Messages carry the sender's origin and a handle back
//! to the sender so the receiver can reply.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Envelope;
use crate::transport::{Channel, ChannelKind, Inbound, Responder, ResponseToken};
use countrycfg_types::ContextId;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// A message posted into a context's inbox.
#[derive(Debug, Clone)]
pub struct WindowMessage {
    /// Origin of the posting context.
    pub origin: String,
    pub sender: ContextId,
    pub envelope: Envelope,
    /// Reference back to the poster.
    pub source: Option<WindowHandle>,
}

/// A posting reference to another context's inbox.
#[derive(Clone)]
pub struct WindowHandle {
    id: ContextId,
    origin: String,
    tx: mpsc::UnboundedSender<WindowMessage>,
}

impl WindowHandle {
    /// The context this handle posts to.
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Posts a message. Fails once the target context is gone.
    pub fn post(&self, message: WindowMessage) -> SyncResult<()> {
        self.tx.send(message).map_err(|_| SyncError::ChannelClosed)
    }

    /// Whether the target context has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowHandle")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Window channel for one context.
pub struct WindowChannel {
    own: WindowHandle,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<WindowMessage>>>,
    parent: Option<WindowHandle>,
    opener: Option<WindowHandle>,
}

impl WindowChannel {
    /// Creates the channel and inbox for context `id` served from `origin`.
    pub fn new(id: ContextId, origin: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            own: WindowHandle {
                id,
                origin: origin.into(),
                tx,
            },
            inbox: Mutex::new(Some(rx)),
            parent: None,
            opener: None,
        }
    }

    /// Sets the embedding context.
    pub fn with_parent(mut self, parent: WindowHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the context that opened this one.
    pub fn with_opener(mut self, opener: WindowHandle) -> Self {
        self.opener = Some(opener);
        self
    }

    /// A handle others can use to post to this context.
    pub fn handle(&self) -> WindowHandle {
        self.own.clone()
    }

    /// Parent and opener, excluding this context and duplicates.
    fn targets(&self) -> Vec<&WindowHandle> {
        let mut targets: Vec<&WindowHandle> = Vec::new();
        for handle in [self.parent.as_ref(), self.opener.as_ref()].into_iter().flatten() {
            if handle.id != self.own.id && targets.iter().all(|t| t.id != handle.id) {
                targets.push(handle);
            }
        }
        targets
    }

    fn message(&self, envelope: &Envelope) -> WindowMessage {
        WindowMessage {
            origin: self.own.origin.clone(),
            sender: self.own.id,
            envelope: envelope.clone(),
            source: Some(self.own.clone()),
        }
    }
}

struct WindowReply {
    from: WindowHandle,
    to: WindowHandle,
}

impl Responder for WindowReply {
    fn respond(&self, envelope: &Envelope) -> SyncResult<()> {
        self.to.post(WindowMessage {
            origin: self.from.origin.clone(),
            sender: self.from.id,
            envelope: envelope.clone(),
            source: Some(self.from.clone()),
        })
    }
}

impl Channel for WindowChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Window
    }

    fn try_send(&self, envelope: &Envelope) -> SyncResult<()> {
        let targets = self.targets();
        if targets.is_empty() {
            return Err(SyncError::unavailable(
                ChannelKind::Window,
                "no parent or opener",
            ));
        }

        let mut posted = 0;
        for target in targets {
            match target.post(self.message(envelope)) {
                Ok(()) => posted += 1,
                Err(_) => debug!("Window {} is gone", target.id),
            }
        }
        if posted == 0 {
            return Err(SyncError::ChannelClosed);
        }
        Ok(())
    }

    fn try_listen(&self, sink: mpsc::UnboundedSender<Inbound>) -> SyncResult<Option<JoinHandle<()>>> {
        let mut rx = self
            .inbox
            .lock()
            .map_err(|_| SyncError::unavailable(ChannelKind::Window, "inbox lock poisoned"))?
            .take()
            .ok_or_else(|| SyncError::unavailable(ChannelKind::Window, "already listening"))?;
        let own = self.own.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let reply = message.source.map(|to| {
                    ResponseToken::new(WindowReply {
                        from: own.clone(),
                        to,
                    })
                });
                let inbound = Inbound {
                    channel: ChannelKind::Window,
                    origin: Some(message.origin),
                    sender: message.sender,
                    envelope: message.envelope,
                    reply,
                };
                if sink.send(inbound).is_err() {
                    break;
                }
            }
        });
        Ok(Some(handle))
    }
}
