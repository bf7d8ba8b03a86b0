//! Row store backends.

use crate::error::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use tradedesk_core::IdentityId;

/// One persisted watchlist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistRow {
    pub ticker: String,
    pub name: String,
}

impl WatchlistRow {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
        }
    }
}

/// Identity-scoped row CRUD.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Rows for `owner`, in insertion order.
    async fn select(&self, owner: &IdentityId) -> PersistenceResult<Vec<WatchlistRow>>;

    async fn insert(&self, owner: &IdentityId, row: &WatchlistRow) -> PersistenceResult<()>;

    /// Delete every row of `owner` with `ticker`.
    async fn delete(&self, owner: &IdentityId, ticker: &str) -> PersistenceResult<()>;
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local row store.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    rows: DashMap<String, Vec<WatchlistRow>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all owners.
    pub fn row_count(&self) -> usize {
        self.rows.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn select(&self, owner: &IdentityId) -> PersistenceResult<Vec<WatchlistRow>> {
        Ok(self
            .rows
            .get(owner.as_str())
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    async fn insert(&self, owner: &IdentityId, row: &WatchlistRow) -> PersistenceResult<()> {
        self.rows
            .entry(owner.as_str().to_string())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    async fn delete(&self, owner: &IdentityId, ticker: &str) -> PersistenceResult<()> {
        if let Some(mut rows) = self.rows.get_mut(owner.as_str()) {
            rows.retain(|row| row.ticker != ticker);
        }
        Ok(())
    }
}

// ============================================================================
// REST (PostgREST)
// ============================================================================

/// PostgREST connection settings.
#[derive(Debug, Clone)]
pub struct RestRowStoreConfig {
    /// REST root, e.g. `https://project.example.co/rest/v1`.
    pub base_url: String,
    pub table: String,
    pub api_key: String,
    /// User access token; the API key is sent as bearer when absent.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    ticker: &'a str,
    name: &'a str,
}

/// Row store over a PostgREST table with `user_id`, `ticker`, `name`.
pub struct RestRowStore {
    client: Client,
    config: RestRowStoreConfig,
}

impl RestRowStore {
    pub fn new(config: RestRowStoreConfig) -> PersistenceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PersistenceError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> PersistenceResult<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| PersistenceError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RowStore for RestRowStore {
    async fn select(&self, owner: &IdentityId) -> PersistenceResult<Vec<WatchlistRow>> {
        let owner_filter = format!("eq.{owner}");
        let response = self
            .send(self.client.get(self.table_url()).query(&[
                ("select", "ticker,name"),
                ("user_id", owner_filter.as_str()),
            ]))
            .await?;

        let rows: Vec<WatchlistRow> = response
            .json()
            .await
            .map_err(|e| PersistenceError::Http(format!("Failed to parse rows: {e}")))?;
        debug!(owner = %owner, count = rows.len(), "Selected watchlist rows");
        Ok(rows)
    }

    async fn insert(&self, owner: &IdentityId, row: &WatchlistRow) -> PersistenceResult<()> {
        let body = InsertRow {
            user_id: owner.as_str(),
            ticker: &row.ticker,
            name: &row.name,
        };
        self.send(
            self.client
                .post(self.table_url())
                .header("Prefer", "return=minimal")
                .json(&body),
        )
        .await?;
        debug!(owner = %owner, ticker = %row.ticker, "Inserted watchlist row");
        Ok(())
    }

    async fn delete(&self, owner: &IdentityId, ticker: &str) -> PersistenceResult<()> {
        let owner_filter = format!("eq.{owner}");
        let ticker_filter = format!("eq.{ticker}");
        self.send(self.client.delete(self.table_url()).query(&[
            ("user_id", owner_filter.as_str()),
            ("ticker", ticker_filter.as_str()),
        ]))
        .await?;
        debug!(owner = %owner, ticker = %ticker, "Deleted watchlist row");
        Ok(())
    }
}
