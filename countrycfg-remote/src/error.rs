//! Remote store error types.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned by a remote store. Nothing past the adapter panics.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store rejected request ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote store timed out after {0} ms")]
    Timeout(u64),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Returns true if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout(_) | RemoteError::Unavailable(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
