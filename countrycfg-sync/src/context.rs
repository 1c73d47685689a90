//! Wiring for one execution context.
//!
//! [`SyncContext`] owns a registry, its transport and the background
//! tasks that keep it in step with siblings:
//! - the dispatcher loop over inbound envelopes
//! - the remote overlay, run once after startup
//! - the delayed initial `RequestSync`
//!
//! Dropping the context stops all of them.

use crate::channels::{BusChannel, OriginBus, StorageChannel, WindowChannel, WindowHandle};
use crate::dispatcher::SyncDispatcher;
use crate::error::SyncResult;
use crate::registry::{ConfigRegistry, RegistryConfig};
use crate::transport::{Transport, TransportConfig};
use countrycfg_remote::RemoteStore;
use countrycfg_store::{ConfigCache, SharedStore};
use countrycfg_types::ContextId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Settings for one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub registry: RegistryConfig,
    pub transport: TransportConfig,
    /// Delay before the initial `RequestSync` (ms).
    pub initial_sync_delay_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            transport: TransportConfig::default(),
            initial_sync_delay_ms: 1_000,
        }
    }
}

impl ContextConfig {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`SyncContext`].
pub struct SyncContextBuilder {
    id: ContextId,
    config: ContextConfig,
    store: Arc<dyn SharedStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    window_origin: Option<String>,
    parent: Option<WindowHandle>,
    opener: Option<WindowHandle>,
    bus: Option<OriginBus>,
    storage_channel: bool,
}

impl SyncContextBuilder {
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Opens a window inbox for this context, served from `origin`.
    /// Required for [`Self::parent`] and [`Self::opener`] to take effect.
    pub fn window(mut self, origin: impl Into<String>) -> Self {
        self.window_origin = Some(origin.into());
        self
    }

    pub fn parent(mut self, parent: WindowHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn opener(mut self, opener: WindowHandle) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Joins the origin's broadcast bus.
    pub fn bus(mut self, bus: OriginBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Leaves the storage slot channel out.
    pub fn without_storage_channel(mut self) -> Self {
        self.storage_channel = false;
        self
    }

    /// Builds the registry and transport, loads cache and defaults, and
    /// starts the background tasks. Must run inside a tokio runtime.
    pub async fn start(self) -> SyncContext {
        let id = self.id;
        let mut window_handle = None;
        let mut transport = Transport::new(id, self.config.transport.clone());

        if let Some(origin) = self.window_origin {
            let mut window = WindowChannel::new(id, origin);
            if let Some(parent) = self.parent {
                window = window.with_parent(parent);
            }
            if let Some(opener) = self.opener {
                window = window.with_opener(opener);
            }
            window_handle = Some(window.handle());
            transport = transport.with_channel(Arc::new(window));
        } else if self.parent.is_some() || self.opener.is_some() {
            warn!("Context {} has a parent or opener but no window origin", id);
        }
        let bus_channel = match self.bus {
            Some(bus) => BusChannel::new(id, bus),
            None => BusChannel::unsupported(id),
        };
        transport = transport.with_channel(Arc::new(bus_channel));
        if self.storage_channel {
            transport = transport.with_channel(Arc::new(StorageChannel::new(
                id,
                Arc::clone(&self.store),
                self.config.transport.sync_slot.clone(),
            )));
        }
        let transport = Arc::new(transport);

        let cache = ConfigCache::new(self.store, self.config.registry.cache_key.clone(), id);
        let mut registry = ConfigRegistry::new(self.config.registry.clone(), cache)
            .with_transport(Arc::clone(&transport));
        if let Some(remote) = self.remote {
            registry = registry.with_remote(remote);
        }
        let registry = Arc::new(registry);
        registry.initialize().await;

        let mut tasks = Vec::new();
        let stream = transport.listen();
        tasks.push(tokio::spawn(SyncDispatcher::new(Arc::clone(&registry)).run(stream)));

        let overlay = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            match overlay.refresh_from_remote().await {
                Ok(changed) if !changed.is_empty() => {
                    info!("Remote store updated {} configurations", changed.len());
                }
                Ok(_) => {}
                Err(e) => warn!("Remote load failed, keeping local state: {}", e),
            }
        }));

        let requester = Arc::clone(&transport);
        let delay = Duration::from_millis(self.config.initial_sync_delay_ms);
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let report = requester.request_sync();
            debug!("Initial sync request sent on {:?}", report.delivered);
        }));

        info!("Context {} started on {:?}", id, transport.channel_kinds());
        SyncContext {
            id,
            registry,
            transport,
            window: window_handle,
            tasks,
        }
    }
}

/// A running context: registry, transport and background tasks.
pub struct SyncContext {
    id: ContextId,
    registry: Arc<ConfigRegistry>,
    transport: Arc<Transport>,
    window: Option<WindowHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncContext {
    /// Starts building a context with a fresh id over `store`.
    pub fn builder(store: Arc<dyn SharedStore>) -> SyncContextBuilder {
        Self::builder_with_id(ContextId::new(), store)
    }

    pub fn builder_with_id(id: ContextId, store: Arc<dyn SharedStore>) -> SyncContextBuilder {
        SyncContextBuilder {
            id,
            config: ContextConfig::default(),
            store,
            remote: None,
            window_origin: None,
            parent: None,
            opener: None,
            bus: None,
            storage_channel: true,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// A handle other contexts can use as their parent or opener.
    pub fn window_handle(&self) -> Option<WindowHandle> {
        self.window.clone()
    }

    /// Stops the background tasks and channel listeners.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.transport.shutdown();
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
