//! Cross-context sync for country configurations.
//!
//! Several execution contexts (tabs, windows, embedded frames) each hold
//! their own copy of the configuration map and must converge on the same
//! state without shared memory.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Registry**: the in-memory map for one context, merging defaults,
//!   the persisted cache, the remote store and sibling updates
//! - **Protocol**: the envelope exchanged between contexts
//! - **Transport**: fan-out over independent channels and fan-in of
//!   everything they receive
//! - **Channels**: window references, the same-origin bus and the shared
//!   store slot
//! - **Dispatcher**: routes inbound envelopes to the registry
//! - **Context**: wires all of the above and runs the background tasks
//!
//! ## Conflict resolution
//!
//! Last-write-wins on `metadata.lastUpdated`. Bootstrap placeholders are
//! only inserted for absent codes. Merges are idempotent and order
//! independent, so duplicated or reordered deliveries are harmless and a
//! later `RequestSync` round trip repairs anything lost.
//!
//! # Example
//!
//! ```no_run
//! use countrycfg_store::MemoryStore;
//! use countrycfg_sync::{OriginBus, SyncContext};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::new());
//! let bus = OriginBus::new("http://localhost:5174");
//!
//! let context = SyncContext::builder(store).bus(bus).start().await;
//! let georgia = context.registry().get("GE").await;
//! assert!(georgia.is_some_and(|c| c.active));
//! # }
//! ```

pub mod bootstrap;
pub mod channels;
mod context;
mod dispatcher;
mod error;
pub mod protocol;
mod registry;
pub mod transport;

pub use channels::{
    BusChannel, BusFrame, OriginBus, StorageChannel, WindowChannel, WindowHandle, WindowMessage,
};
pub use context::{ContextConfig, SyncContext, SyncContextBuilder};
pub use dispatcher::{Dispatched, SyncDispatcher};
pub use error::{RegistryError, RegistryResult, SyncError, SyncResult};
pub use protocol::{Envelope, MessageType, SyncSnapshot};
pub use registry::{
    ChangeSource, ConfigChange, ConfigRegistry, ListenerId, MergeOutcome, RegistryConfig,
    UpsertOutcome,
};
pub use transport::{
    Channel, ChannelKind, DeliveryReport, Inbound, InboundStream, Responder, ResponseToken,
    Transport, TransportConfig,
};
