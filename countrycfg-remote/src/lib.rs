//! Remote Store Adapter.
//!
//! Maps [`CountryConfiguration`](countrycfg_types::CountryConfiguration)
//! to the remote table's row shape and back, and talks to the remote
//! store. The remote store is a durability and catch-up layer: callers
//! treat every failure here as non-fatal.

mod error;
pub mod mock;
mod row;
mod supabase;

pub use error::{RemoteError, RemoteResult};
pub use row::CountryRow;
pub use supabase::{SupabaseConfig, SupabaseStore};

use async_trait::async_trait;

/// A remote table of country rows keyed by `country_code`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &'static str;

    /// Fetches every row, ordered by country code.
    async fn fetch_all(&self) -> RemoteResult<Vec<CountryRow>>;

    /// Inserts or replaces the row with the same country code.
    async fn upsert(&self, row: &CountryRow) -> RemoteResult<()>;

    /// Deletes the row for `country_code`. Missing rows are not an error.
    async fn delete(&self, country_code: &str) -> RemoteResult<()>;
}
