//! Broadcast envelope exchanged between contexts.
//!
//! The JSON shape is `{ "type": .., "data": .., "timestamp": <ms> }`:
//! - `ConfigUpdated` carries one changed configuration
//! - `RequestSync` carries nothing and asks siblings for their state
//! - `SyncResponse` carries `{ "countryConfigurations": { code: config } }`
//!
//! Receivers merge with last-write-wins, so envelopes may arrive more
//! than once and in any order.

use crate::error::{SyncError, SyncResult};
use countrycfg_types::{CountryConfiguration, timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Envelope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// One configuration changed.
    ConfigUpdated,
    /// A context asks its siblings for their state.
    RequestSync,
    /// Reply to `RequestSync` with the full persisted map.
    SyncResponse,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConfigUpdated => "ConfigUpdated",
            Self::RequestSync => "RequestSync",
            Self::SyncResponse => "SyncResponse",
        };
        f.write_str(name)
    }
}

/// A message on any broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Send time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Envelope {
    fn new(kind: MessageType, data: Option<Value>) -> Self {
        Self {
            kind,
            data,
            timestamp: timestamp::epoch_millis(),
        }
    }

    /// Announces a changed configuration.
    pub fn config_updated(config: &CountryConfiguration) -> SyncResult<Self> {
        Ok(Self::new(
            MessageType::ConfigUpdated,
            Some(serde_json::to_value(config)?),
        ))
    }

    /// Asks reachable siblings for their state.
    pub fn request_sync() -> Self {
        Self::new(MessageType::RequestSync, None)
    }

    /// Answers a `RequestSync` with a snapshot.
    pub fn sync_response(snapshot: &SyncSnapshot) -> SyncResult<Self> {
        Ok(Self::new(
            MessageType::SyncResponse,
            Some(serde_json::to_value(snapshot)?),
        ))
    }

    /// Decodes an envelope from its JSON text.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the envelope as JSON text.
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The configuration carried by a `ConfigUpdated` envelope.
    pub fn configuration(&self) -> SyncResult<CountryConfiguration> {
        let data = self.payload(MessageType::ConfigUpdated)?;
        Ok(serde_json::from_value(data.clone())?)
    }

    /// The snapshot carried by a `SyncResponse` envelope.
    pub fn snapshot(&self) -> SyncResult<SyncSnapshot> {
        let data = self.payload(MessageType::SyncResponse)?;
        Ok(serde_json::from_value(data.clone())?)
    }

    fn payload(&self, expected: MessageType) -> SyncResult<&Value> {
        if self.kind != expected {
            return Err(SyncError::Protocol(format!(
                "expected {expected} envelope, got {}",
                self.kind
            )));
        }
        self.data
            .as_ref()
            .ok_or_else(|| SyncError::Protocol(format!("{expected} envelope has no data")))
    }
}

/// The full configuration map sent in a `SyncResponse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(rename = "countryConfigurations", default)]
    pub configurations: BTreeMap<String, CountryConfiguration>,
}

impl SyncSnapshot {
    /// Builds a snapshot keyed by country code.
    pub fn from_configs(configs: impl IntoIterator<Item = CountryConfiguration>) -> Self {
        Self {
            configurations: configs
                .into_iter()
                .map(|c| (c.country_code.clone(), c))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}
