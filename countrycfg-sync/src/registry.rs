//! Configuration registry.
//!
//! The in-memory source of truth for one context. Entries come from four
//! places: built-in defaults, the persisted cache, the remote store and
//! sibling contexts. They all meet in one merge rule
//! ([`CountryConfiguration::supersedes`]), so the order in which sources
//! arrive does not affect the result.
//!
//! Local writes go memory, then cache, then remote store, then broadcast.
//! Only identity validation can fail a write; everything after that
//! degrades to a logged warning.

use crate::bootstrap;
use crate::error::RegistryResult;
use crate::protocol::SyncSnapshot;
use crate::transport::Transport;
use countrycfg_remote::{CountryRow, RemoteError, RemoteResult, RemoteStore};
use countrycfg_store::ConfigCache;
use countrycfg_types::{
    ConfigError, CountryConfiguration, CountryPackage, CountryService, FormSection, timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Shared store slot holding the persisted map.
    pub cache_key: String,
    /// Upper bound on any single remote store call (ms).
    pub remote_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_key: "country_configurations".to_string(),
            remote_timeout_ms: 5_000,
        }
    }
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// A write through this registry.
    Local,
    /// Another context, over the broadcast transport.
    Broadcast,
    /// The remote store.
    Remote,
    /// The persisted cache.
    Cache,
    /// Built-in defaults and placeholders.
    Bootstrap,
}

/// Notification delivered to change listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// One entry was written or replaced.
    Updated { code: String, source: ChangeSource },
    /// One entry was removed locally.
    Removed { code: String },
    /// Several entries changed in one batch.
    Synced {
        codes: Vec<String>,
        source: ChangeSource,
    },
}

/// Result of a successful `upsert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Stored locally and in the remote store.
    Synced,
    /// Stored locally; no remote store is configured.
    LocalOnly,
    /// Stored locally; the remote write failed. Local state stays
    /// authoritative for this context.
    RemoteSyncFailed { reason: String },
}

impl UpsertOutcome {
    /// Whether the caller should surface a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::RemoteSyncFailed { .. })
    }
}

/// Result of offering one configuration to the merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The code was absent.
    Inserted,
    /// The incoming copy outranked the current one.
    Replaced,
    /// The current copy ranks the same or higher; nothing changed.
    Ignored,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Handle returned by [`ConfigRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeListener = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

/// Applies last-write-wins for one configuration.
fn merge_into(
    entries: &mut HashMap<String, CountryConfiguration>,
    incoming: CountryConfiguration,
) -> MergeOutcome {
    let outcome = match entries.get(&incoming.country_code) {
        None => MergeOutcome::Inserted,
        Some(current) if incoming.supersedes(current) => MergeOutcome::Replaced,
        Some(_) => return MergeOutcome::Ignored,
    };
    entries.insert(incoming.country_code.clone(), incoming);
    outcome
}

/// Merges a keyed batch, returning the codes that changed.
fn merge_all(
    entries: &mut HashMap<String, CountryConfiguration>,
    batch: impl IntoIterator<Item = (String, CountryConfiguration)>,
) -> Vec<String> {
    let mut changed = Vec::new();
    for (code, config) in batch {
        if config.country_code != code {
            warn!(
                "Skipping entry keyed {} carrying code {}",
                code, config.country_code
            );
            continue;
        }
        if let Err(e) = config.validate_identity() {
            warn!("Skipping invalid entry {}: {}", code, e);
            continue;
        }
        if merge_into(entries, config).changed() {
            changed.push(code);
        }
    }
    changed.sort();
    changed
}

fn sorted_by_code(mut configs: Vec<CountryConfiguration>) -> Vec<CountryConfiguration> {
    configs.sort_by(|a, b| a.country_code.cmp(&b.country_code));
    configs
}

/// The per-context configuration registry.
pub struct ConfigRegistry {
    config: RegistryConfig,
    entries: RwLock<HashMap<String, CountryConfiguration>>,
    cache: ConfigCache,
    remote: Option<Arc<dyn RemoteStore>>,
    transport: Option<Arc<Transport>>,
    listeners: Mutex<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl ConfigRegistry {
    /// Creates an empty registry persisting through `cache`.
    ///
    /// Call [`Self::initialize`] (or [`Self::bootstrap`]) before serving
    /// reads.
    pub fn new(config: RegistryConfig, cache: ConfigCache) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            cache,
            remote: None,
            transport: None,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Pushes writes to and loads from `remote`.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Broadcasts writes over `transport`.
    pub fn with_transport(mut self, transport: Arc<Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn transport(&self) -> Option<&Arc<Transport>> {
        self.transport.as_ref()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The configuration for `code`, if present.
    pub async fn get(&self, code: &str) -> Option<CountryConfiguration> {
        self.entries.read().await.get(code).cloned()
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.entries.read().await.contains_key(code)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Active configurations, sorted by code.
    pub async fn list_active(&self) -> Vec<CountryConfiguration> {
        let entries = self.entries.read().await;
        sorted_by_code(entries.values().filter(|c| c.active).cloned().collect())
    }

    /// Every configuration, active and passive, sorted by code.
    pub async fn all(&self) -> Vec<CountryConfiguration> {
        sorted_by_code(self.entries.read().await.values().cloned().collect())
    }

    /// Available packages of `code` in display order. Empty if absent.
    pub async fn get_packages(&self, code: &str) -> Vec<CountryPackage> {
        self.entries
            .read()
            .await
            .get(code)
            .map(CountryConfiguration::available_packages)
            .unwrap_or_default()
    }

    /// Available services of `code` in display order. Empty if absent.
    pub async fn get_services(&self, code: &str) -> Vec<CountryService> {
        self.entries
            .read()
            .await
            .get(code)
            .map(CountryConfiguration::available_services)
            .unwrap_or_default()
    }

    /// Form sections of `code`, sections and fields in display order.
    pub async fn get_form_sections(&self, code: &str) -> Vec<FormSection> {
        self.entries
            .read()
            .await
            .get(code)
            .map(CountryConfiguration::ordered_sections)
            .unwrap_or_default()
    }

    /// Whether `code` can be chosen by a client: present and active.
    pub async fn is_selectable(&self, code: &str) -> bool {
        self.entries
            .read()
            .await
            .get(code)
            .is_some_and(|c| c.active)
    }

    // ── Local writes ─────────────────────────────────────────────

    /// Inserts or replaces a configuration.
    ///
    /// Advances `metadata.last_updated` past both the stored and the
    /// incoming stamp, persists, pushes to the remote store and broadcasts.
    pub async fn upsert(&self, mut config: CountryConfiguration) -> RegistryResult<UpsertOutcome> {
        config.validate_identity()?;
        let code = config.country_code.clone();

        {
            let mut entries = self.entries.write().await;
            let previous = entries.get(&code).and_then(CountryConfiguration::last_updated);
            let stamp = timestamp::advance(previous.max(config.last_updated()));
            config.metadata.last_updated = Some(stamp);
            entries.insert(code.clone(), config.clone());
            self.persist(&entries);
        }
        debug!("Stored {} locally", code);
        self.notify(ConfigChange::Updated {
            code: code.clone(),
            source: ChangeSource::Local,
        });

        let outcome = match &self.remote {
            None => UpsertOutcome::LocalOnly,
            Some(remote) => {
                let row = CountryRow::from_config(&config);
                match self.remote_call(remote.upsert(&row)).await {
                    Ok(()) => UpsertOutcome::Synced,
                    Err(e) => {
                        warn!("Remote upsert of {} via {} failed: {}", code, remote.name(), e);
                        UpsertOutcome::RemoteSyncFailed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        if let Some(transport) = &self.transport {
            match transport.notify_config_updated(&config) {
                Ok(report) if !report.any_delivered() => {
                    debug!("Update of {} reached no channel", code);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to broadcast {}: {}", code, e),
            }
        }

        Ok(outcome)
    }

    /// Applies `f` to a copy of the entry for `code` and upserts the
    /// result. Returns `Ok(None)` when `code` is absent.
    pub async fn update<F>(&self, code: &str, f: F) -> RegistryResult<Option<UpsertOutcome>>
    where
        F: FnOnce(&mut CountryConfiguration),
    {
        let Some(mut config) = self.get(code).await else {
            return Ok(None);
        };
        f(&mut config);
        if config.country_code != code {
            return Err(ConfigError::CodeMismatch {
                expected: code.to_string(),
                actual: config.country_code,
            }
            .into());
        }
        self.upsert(config).await.map(Some)
    }

    /// Removes `code` from memory and the cache. Returns whether it existed.
    ///
    /// Also deletes the remote row, best-effort. Siblings are not told.
    pub async fn remove(&self, code: &str) -> bool {
        let existed = {
            let mut entries = self.entries.write().await;
            let existed = entries.remove(code).is_some();
            if existed {
                self.persist(&entries);
            }
            existed
        };
        if !existed {
            return false;
        }

        info!("Removed {}", code);
        self.notify(ConfigChange::Removed {
            code: code.to_string(),
        });

        if let Some(remote) = &self.remote
            && let Err(e) = self.remote_call(remote.delete(code)).await
        {
            warn!("Remote delete of {} via {} failed: {}", code, remote.name(), e);
        }
        true
    }

    // ── Merges ───────────────────────────────────────────────────

    /// Offers a configuration received from elsewhere.
    ///
    /// Replaces the current entry only if the incoming copy outranks it.
    /// Invalid or mis-keyed configurations are ignored.
    pub async fn merge_incoming(
        &self,
        code: &str,
        config: CountryConfiguration,
        source: ChangeSource,
    ) -> MergeOutcome {
        if config.country_code != code {
            warn!("Ignoring {} keyed as {}", config.country_code, code);
            return MergeOutcome::Ignored;
        }
        if let Err(e) = config.validate_identity() {
            warn!("Ignoring invalid configuration for {}: {}", code, e);
            return MergeOutcome::Ignored;
        }

        let outcome = {
            let mut entries = self.entries.write().await;
            let outcome = merge_into(&mut entries, config);
            if outcome.changed() {
                self.persist(&entries);
            }
            outcome
        };

        if outcome.changed() {
            self.notify(ConfigChange::Updated {
                code: code.to_string(),
                source,
            });
        } else {
            debug!("Ignored {:?} copy of {}: not newer", source, code);
        }
        outcome
    }

    /// Merges a whole snapshot entry by entry. Returns the changed codes.
    pub async fn merge_snapshot(&self, snapshot: SyncSnapshot, source: ChangeSource) -> Vec<String> {
        let changed = {
            let mut entries = self.entries.write().await;
            let changed = merge_all(&mut entries, snapshot.configurations);
            if !changed.is_empty() {
                self.persist(&entries);
            }
            changed
        };
        self.notify_synced(&changed, source);
        changed
    }

    /// Seeds the built-in defaults, then a placeholder for every passive
    /// jurisdiction not already present. Returns the seeded codes.
    pub async fn bootstrap(&self) -> Vec<String> {
        let seeded = {
            let mut entries = self.entries.write().await;
            let seeded = Self::seed(&mut entries);
            if !seeded.is_empty() {
                self.persist(&entries);
            }
            seeded
        };
        self.notify_synced(&seeded, ChangeSource::Bootstrap);
        seeded
    }

    fn seed(entries: &mut HashMap<String, CountryConfiguration>) -> Vec<String> {
        let defaults = bootstrap::default_configurations().unwrap_or_else(|e| {
            warn!("Built-in configurations unreadable: {}", e);
            Vec::new()
        });

        let mut seeded = merge_all(
            entries,
            defaults.into_iter().map(|c| (c.country_code.clone(), c)),
        );
        for placeholder in bootstrap::passive_configurations() {
            if !entries.contains_key(&placeholder.country_code) {
                seeded.push(placeholder.country_code.clone());
                entries.insert(placeholder.country_code.clone(), placeholder);
            }
        }
        seeded.sort();
        seeded
    }

    /// Loads the persisted cache, then seeds bootstrap entries around it,
    /// and persists the result once. Returns the number of entries.
    pub async fn initialize(&self) -> usize {
        let cached = self.load_cache();
        let count = {
            let mut entries = self.entries.write().await;
            merge_all(&mut entries, cached);
            Self::seed(&mut entries);
            self.persist(&entries);
            entries.len()
        };
        info!("Registry initialized with {} configurations", count);
        count
    }

    /// Re-reads the persisted cache and merges it. Returns the changed codes.
    pub async fn reload_from_cache(&self) -> Vec<String> {
        let snapshot = SyncSnapshot {
            configurations: self.load_cache().into_iter().collect(),
        };
        self.merge_snapshot(snapshot, ChangeSource::Cache).await
    }

    /// Overlays the remote store's rows. A row replaces the local entry
    /// only if its `updated_at` is newer. Returns the changed codes.
    ///
    /// Without a remote store this is a no-op.
    pub async fn refresh_from_remote(&self) -> RemoteResult<Vec<String>> {
        let Some(remote) = &self.remote else {
            return Ok(Vec::new());
        };
        let rows = self.remote_call(remote.fetch_all()).await?;
        debug!("Fetched {} rows from {}", rows.len(), remote.name());

        let changed = {
            let mut entries = self.entries.write().await;
            let candidates: Vec<(String, CountryConfiguration)> = rows
                .iter()
                .map(|row| {
                    let candidate = match entries.get(&row.country_code) {
                        Some(current) => {
                            let mut merged = current.clone();
                            row.apply_to(&mut merged);
                            merged
                        }
                        None => row.to_config(),
                    };
                    (row.country_code.clone(), candidate)
                })
                .collect();
            let changed = merge_all(&mut entries, candidates);
            if !changed.is_empty() {
                self.persist(&entries);
            }
            changed
        };
        self.notify_synced(&changed, ChangeSource::Remote);
        Ok(changed)
    }

    /// The persisted map, as sent in a `SyncResponse`. Falls back to
    /// memory if the cache cannot be read.
    pub async fn persisted_snapshot(&self) -> SyncSnapshot {
        match self.cache.load() {
            Ok(configurations) => SyncSnapshot { configurations },
            Err(e) => {
                warn!("Cache unreadable, answering from memory: {}", e);
                SyncSnapshot::from_configs(self.entries.read().await.values().cloned())
            }
        }
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Registers a change listener. Listeners run on the task that made
    /// the change, after the registry lock is released.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, change: ConfigChange) {
        // Snapshot so listeners may unsubscribe themselves.
        let listeners: Vec<ChangeListener> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(&change);
        }
    }

    fn notify_synced(&self, codes: &[String], source: ChangeSource) {
        if codes.is_empty() {
            return;
        }
        info!("{} configurations changed from {:?}", codes.len(), source);
        self.notify(ConfigChange::Synced {
            codes: codes.to_vec(),
            source,
        });
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn load_cache(&self) -> Vec<(String, CountryConfiguration)> {
        match self.cache.load() {
            Ok(map) => map.into_iter().collect(),
            Err(e) => {
                warn!("Failed to load cached configurations: {}", e);
                Vec::new()
            }
        }
    }

    /// Writes the whole map to the cache. Called with the write guard
    /// held so the slot never lags memory.
    fn persist(&self, entries: &HashMap<String, CountryConfiguration>) {
        if let Err(e) = self.cache.save(entries.values()) {
            warn!("Failed to persist configurations: {}", e);
        }
    }

    async fn remote_call<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let limit = self.config.remote_timeout_ms;
        tokio::time::timeout(Duration::from_millis(limit), call)
            .await
            .map_err(|_| RemoteError::Timeout(limit))?
    }
}
