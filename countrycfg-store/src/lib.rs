//! Shared persistent store for country configuration sync.
//!
//! Models the origin-scoped key/value storage every execution context can
//! read and write. Writes raise a change notification that every *other*
//! subscriber sees; this is both the persisted cache for the configuration
//! map and the last-resort broadcast channel.
//!
//! # Architecture
//!
//! - [`SharedStore`] is the slot interface (get/set/remove + subscribe)
//! - [`MemoryStore`] keeps slots in memory, for tests and ephemeral contexts
//! - [`SqliteStore`] persists slots in a SQLite file
//! - [`ConfigCache`] stores the `{ countryCode: configuration }` map in one slot
//!
//! Change notifications are delivered in-process through a tokio broadcast
//! channel, so contexts observe each other's writes only when they share a
//! store instance.

mod cache;
mod error;
mod memory;
mod sqlite;

pub use cache::ConfigCache;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use countrycfg_types::ContextId;
use tokio::sync::broadcast;

/// Buffered notifications per subscriber before the oldest are dropped.
const NOTIFY_CAPACITY: usize = 256;

/// A mutation of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// The slot that changed.
    pub key: String,
    /// The new value, `None` when the slot was removed.
    pub new_value: Option<String>,
    /// The context that performed the write.
    pub writer: ContextId,
}

/// Keyed string slots shared by every context of an origin.
pub trait SharedStore: Send + Sync {
    /// Reads a slot.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrites a slot and notifies subscribers.
    fn set(&self, key: &str, value: &str, writer: ContextId) -> StoreResult<()>;

    /// Deletes a slot and notifies subscribers. Missing slots are not an error.
    fn remove(&self, key: &str, writer: ContextId) -> StoreResult<()>;

    /// Subscribes to slot mutations.
    ///
    /// Listeners receive their own writes too and should filter on
    /// [`StoreChange::writer`].
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Fan-out of store mutations to subscribers.
#[derive(Debug, Clone)]
pub(crate) struct ChangeNotifier {
    tx: broadcast::Sender<StoreChange>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { tx }
    }

    pub(crate) fn notify(&self, key: &str, new_value: Option<&str>, writer: ContextId) {
        // No subscribers is the normal state for a lone context.
        let _ = self.tx.send(StoreChange {
            key: key.to_string(),
            new_value: new_value.map(str::to_string),
            writer,
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}
