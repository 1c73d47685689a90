//! Error types for the sync layer.

use crate::transport::ChannelKind;
use countrycfg_store::StoreError;
use countrycfg_types::ConfigError;
use thiserror::Error;

/// Result type for transport and protocol operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while moving envelopes between contexts.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The channel cannot deliver in this context. Skipped silently by the
    /// fan-out.
    #[error("{channel} channel unavailable: {reason}")]
    ChannelUnavailable { channel: ChannelKind, reason: String },

    /// Envelope has the wrong type or payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shared store error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The receiving end of a channel is gone.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    pub(crate) fn unavailable(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            channel,
            reason: reason.into(),
        }
    }
}

/// Result type for registry writes.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned to callers of registry writes.
///
/// Remote and broadcast failures never surface here; they are logged and
/// reported through [`UpsertOutcome`](crate::UpsertOutcome).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The configuration lacks its identity fields.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}
