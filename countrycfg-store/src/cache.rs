//! The persisted configuration map.
//!
//! One slot holds a JSON object `{ countryCode: CountryConfiguration }`.

use crate::SharedStore;
use crate::error::StoreResult;
use countrycfg_types::{ContextId, CountryConfiguration};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Reads and writes the configuration map slot on behalf of one context.
#[derive(Clone)]
pub struct ConfigCache {
    store: Arc<dyn SharedStore>,
    key: String,
    writer: ContextId,
}

impl ConfigCache {
    /// Creates a cache over `key` in `store`, writing as `writer`.
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>, writer: ContextId) -> Self {
        Self {
            store,
            key: key.into(),
            writer,
        }
    }

    /// The slot key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying shared store.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Loads the persisted map. An absent slot yields an empty map.
    ///
    /// Entries that fail to parse are skipped with a warning so one bad
    /// record does not hide the rest.
    pub fn load(&self) -> StoreResult<BTreeMap<String, CountryConfiguration>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(BTreeMap::new());
        };

        let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)?;
        let mut configs = BTreeMap::new();
        for (code, value) in entries {
            match serde_json::from_value::<CountryConfiguration>(value) {
                Ok(config) if config.country_code == code => {
                    configs.insert(code, config);
                }
                Ok(config) => {
                    warn!(
                        "Skipping cached entry {}: keyed under mismatched code {}",
                        code, config.country_code
                    );
                }
                Err(e) => warn!("Skipping unreadable cached entry {}: {}", code, e),
            }
        }
        Ok(configs)
    }

    /// Overwrites the slot with the given configurations, keyed by code.
    pub fn save<'a>(
        &self,
        configs: impl IntoIterator<Item = &'a CountryConfiguration>,
    ) -> StoreResult<()> {
        let map: BTreeMap<&str, &CountryConfiguration> = configs
            .into_iter()
            .map(|c| (c.country_code.as_str(), c))
            .collect();
        let json = serde_json::to_string(&map)?;
        self.store.set(&self.key, &json, self.writer)
    }

    /// Deletes the slot.
    pub fn clear(&self) -> StoreResult<()> {
        self.store.remove(&self.key, self.writer)
    }
}
