//! Routes inbound envelopes to the registry.

use crate::protocol::{Envelope, MessageType};
use crate::registry::{ChangeSource, ConfigRegistry, MergeOutcome};
use crate::transport::{Inbound, InboundStream};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the dispatcher did with one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A `ConfigUpdated` went through the merge rule.
    Merged(MergeOutcome),
    /// A `RequestSync` was answered with a snapshot.
    Replied,
    /// A `RequestSync` arrived on a channel with no return path.
    NoReplyPath,
    /// A `SyncResponse` was merged; these codes changed.
    Synced(Vec<String>),
    /// The envelope was malformed or the reply could not be sent.
    Dropped(String),
}

/// Applies inbound envelopes to one registry.
#[derive(Clone)]
pub struct SyncDispatcher {
    registry: Arc<ConfigRegistry>,
}

impl SyncDispatcher {
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        Self { registry }
    }

    /// Handles one envelope.
    pub async fn dispatch(&self, inbound: Inbound) -> Dispatched {
        let Inbound {
            channel,
            sender,
            envelope,
            reply,
            ..
        } = inbound;
        debug!("{} from {} on {} channel", envelope.kind, sender, channel);

        match envelope.kind {
            MessageType::ConfigUpdated => match envelope.configuration() {
                Ok(config) => {
                    let code = config.country_code.clone();
                    let outcome = self
                        .registry
                        .merge_incoming(&code, config, ChangeSource::Broadcast)
                        .await;
                    Dispatched::Merged(outcome)
                }
                Err(e) => dropped(&envelope, e),
            },
            MessageType::RequestSync => {
                let Some(reply) = reply else {
                    debug!("Sync request on {} channel has no return path", channel);
                    return Dispatched::NoReplyPath;
                };
                let snapshot = self.registry.persisted_snapshot().await;
                let response = match Envelope::sync_response(&snapshot) {
                    Ok(response) => response,
                    Err(e) => return dropped(&envelope, e),
                };
                match reply.respond(&response) {
                    Ok(()) => {
                        debug!("Answered {} with {} configurations", sender, snapshot.len());
                        Dispatched::Replied
                    }
                    Err(e) => dropped(&envelope, e),
                }
            }
            MessageType::SyncResponse => match envelope.snapshot() {
                Ok(snapshot) => Dispatched::Synced(
                    self.registry
                        .merge_snapshot(snapshot, ChangeSource::Broadcast)
                        .await,
                ),
                Err(e) => dropped(&envelope, e),
            },
        }
    }

    /// Dispatches until every channel listener has stopped.
    pub async fn run(self, mut stream: InboundStream) {
        while let Some(inbound) = stream.recv().await {
            self.dispatch(inbound).await;
        }
        debug!("Inbound stream closed");
    }
}

fn dropped(envelope: &Envelope, error: impl std::fmt::Display) -> Dispatched {
    warn!("Dropping {}: {}", envelope.kind, error);
    Dispatched::Dropped(error.to_string())
}
