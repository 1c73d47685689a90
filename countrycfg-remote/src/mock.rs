//! An in-memory remote store for testing.

use crate::error::{RemoteError, RemoteResult};
use crate::row::CountryRow;
use crate::RemoteStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Rows in a `BTreeMap`, with switchable failure and latency.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    rows: Mutex<BTreeMap<String, CountryRow>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote pre-populated with `rows`.
    pub fn with_rows(rows: impl IntoIterator<Item = CountryRow>) -> Self {
        let remote = Self::new();
        if let Ok(mut map) = remote.rows.lock() {
            map.extend(rows.into_iter().map(|r| (r.country_code.clone(), r)));
        }
        remote
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every subsequent call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut l) = self.latency.lock() {
            *l = latency;
        }
    }

    /// Returns the stored row for `code`.
    pub fn row(&self, code: &str) -> Option<CountryRow> {
        self.rows.lock().ok().and_then(|m| m.get(code).cloned())
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upsert calls that reached the store.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Number of delete calls that reached the store.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> RemoteResult<()> {
        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("mock remote is failing".to_string()));
        }
        Ok(())
    }

    fn rows(&self) -> RemoteResult<std::sync::MutexGuard<'_, BTreeMap<String, CountryRow>>> {
        self.rows
            .lock()
            .map_err(|_| RemoteError::Unavailable("mock remote lock poisoned".to_string()))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all(&self) -> RemoteResult<Vec<CountryRow>> {
        self.gate().await?;
        Ok(self.rows()?.values().cloned().collect())
    }

    async fn upsert(&self, row: &CountryRow) -> RemoteResult<()> {
        self.gate().await?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.rows()?.insert(row.country_code.clone(), row.clone());
        Ok(())
    }

    async fn delete(&self, country_code: &str) -> RemoteResult<()> {
        self.gate().await?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.rows()?.remove(country_code);
        Ok(())
    }
}
