//! In-memory slot store.

use crate::error::{StoreError, StoreResult};
use crate::{ChangeNotifier, SharedStore, StoreChange};
use countrycfg_types::ContextId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Slots held in a `HashMap`. Nothing survives the process.
#[derive(Debug)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let slots = self.slots.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, writer: ContextId) -> StoreResult<()> {
        self.slots
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(key.to_string(), value.to_string());
        self.notifier.notify(key, Some(value), writer);
        Ok(())
    }

    fn remove(&self, key: &str, writer: ContextId) -> StoreResult<()> {
        let existed = self
            .slots
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .remove(key)
            .is_some();
        if existed {
            self.notifier.notify(key, None, writer);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }
}
