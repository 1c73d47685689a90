//! PostgREST (Supabase) remote store.
//!
//! Rows live in one table keyed by `country_code`. Upserts rely on
//! PostgREST's `merge-duplicates` resolution, so a write never creates a
//! second row for the same code.

use crate::error::{RemoteError, RemoteResult};
use crate::row::CountryRow;
use crate::RemoteStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for the remote table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (e.g. `https://xyz.supabase.co`).
    pub base_url: String,
    /// Anon or service key, sent as `apikey` and bearer token.
    pub api_key: String,
    /// Table holding the rows.
    pub table: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            table: "country_configurations".to_string(),
            timeout_secs: 5,
        }
    }
}

impl SupabaseConfig {
    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`. Returns `None` if
    /// either is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let api_key = std::env::var("SUPABASE_ANON_KEY").ok()?;
        Some(Self {
            base_url,
            api_key,
            ..Self::default()
        })
    }
}

/// Remote store client over the PostgREST HTTP API.
pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStore {
    /// Creates a client. Fails if the base URL is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: SupabaseConfig) -> RemoteResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(RemoteError::Config("base_url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// The active configuration.
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(self.config.timeout_secs * 1000)
            } else {
                RemoteError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn fetch_all(&self) -> RemoteResult<Vec<CountryRow>> {
        let request = self
            .client
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "country_code.asc")]);
        let response = self.send(request).await?;
        let body = response.text().await?;
        let rows: Vec<CountryRow> = serde_json::from_str(&body)?;
        debug!("Fetched {} rows from {}", rows.len(), self.config.table);
        Ok(rows)
    }

    async fn upsert(&self, row: &CountryRow) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.table_url())
            .query(&[("on_conflict", "country_code")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        self.send(request).await?;
        debug!("Upserted {} into {}", row.country_code, self.config.table);
        Ok(())
    }

    async fn delete(&self, country_code: &str) -> RemoteResult<()> {
        let filter = format!("eq.{country_code}");
        let request = self
            .client
            .delete(self.table_url())
            .query(&[("country_code", filter.as_str())]);
        self.send(request).await?;
        debug!("Deleted {} from {}", country_code, self.config.table);
        Ok(())
    }
}
