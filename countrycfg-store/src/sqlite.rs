//! SQLite-backed slot store.
//!
//! One table of `(key, value, updated_at)` rows. Uses a separate SQLite
//! file so the slots survive restarts of the hosting process.

use crate::error::{StoreError, StoreResult};
use crate::{ChangeNotifier, SharedStore, StoreChange};
use countrycfg_types::{ContextId, timestamp};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Persistent slot store backed by SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Lists occupied slot keys in lexical order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT key FROM slots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl SharedStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let value = conn
            .query_row("SELECT value FROM slots WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, writer: ContextId) -> StoreResult<()> {
        {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, timestamp::epoch_millis()],
            )?;
        }
        self.notifier.notify(key, Some(value), writer);
        Ok(())
    }

    fn remove(&self, key: &str, writer: ContextId) -> StoreResult<()> {
        let removed = {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute("DELETE FROM slots WHERE key = ?1", params![key])?
        };
        if removed > 0 {
            self.notifier.notify(key, None, writer);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }
}
