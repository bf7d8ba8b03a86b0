//! HTTP client for the market data gateway.
//!
//! Endpoints:
//! - `GET /api/yfinance?ticker=&interval=&start=&end=` -> `[Bar]`
//! - `GET /api/ticker-name?ticker=` -> `{"name": ...}`
//! - `GET /api/wsfinnhub` -> `{"url": ...}` (older gateways send `wsUrl`)

use crate::bars::{Bar, BarRequest, BarSource};
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use tradedesk_core::Symbol;
use tradedesk_relay::{redact_endpoint, EndpointDiscovery, RelayError, RelayResult};

/// Default timeout for gateway requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct NameResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(alias = "wsUrl")]
    url: Option<String>,
}

/// Gateway client.
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    /// Create a client for the gateway at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> MarketResult<Response> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| MarketError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Fetch the live-feed URL.
    pub async fn fetch_feed_url(&self) -> MarketResult<String> {
        let response: DiscoveryResponse = self
            .get("/api/wsfinnhub", &[])
            .await?
            .json()
            .await
            .map_err(|e| MarketError::Decode(format!("Failed to parse discovery response: {e}")))?;

        match response.url {
            Some(url) if !url.trim().is_empty() => {
                info!(endpoint = redact_endpoint(&url), "Resolved live feed endpoint");
                Ok(url)
            }
            _ => Err(MarketError::Decode(
                "discovery response has no url".to_string(),
            )),
        }
    }
}

#[async_trait]
impl BarSource for MarketDataClient {
    async fn fetch_bars(&self, request: &BarRequest) -> MarketResult<Vec<Bar>> {
        let start = request.start.format(DATE_FORMAT).to_string();
        let end = request.end.format(DATE_FORMAT).to_string();
        debug!(
            symbol = %request.symbol,
            interval = %request.interval,
            %start,
            %end,
            "Fetching bars"
        );

        let bars: Vec<Bar> = self
            .get(
                "/api/yfinance",
                &[
                    ("ticker", request.symbol.as_str()),
                    ("interval", request.interval.as_str()),
                    ("start", start.as_str()),
                    ("end", end.as_str()),
                ],
            )
            .await?
            .json()
            .await
            .map_err(|e| MarketError::Decode(format!("Failed to parse bars: {e}")))?;

        debug!(symbol = %request.symbol, count = bars.len(), "Bars received");
        Ok(bars)
    }

    async fn fetch_display_name(&self, symbol: &Symbol) -> MarketResult<String> {
        let response: NameResponse = self
            .get("/api/ticker-name", &[("ticker", symbol.as_str())])
            .await?
            .json()
            .await
            .map_err(|e| MarketError::Decode(format!("Failed to parse name: {e}")))?;

        response
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| MarketError::Decode(format!("no name for {symbol}")))
    }
}

#[async_trait]
impl EndpointDiscovery for MarketDataClient {
    async fn discover(&self) -> RelayResult<String> {
        self.fetch_feed_url()
            .await
            .map_err(|e| RelayError::Discovery(e.to_string()))
    }
}
