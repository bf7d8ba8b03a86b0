//! Baseline and current price selection.
//!
//! Which bars answer "previous close" and "latest price" depends on where
//! the exchange clock is relative to the regular session:
//!
//! | Phase (trading day) | Current price request           |
//! |---------------------|---------------------------------|
//! | Regular             | `1m` bars over today, last bar  |
//! | After close         | `1d` bars over today, first bar |
//! | Pre-open / closed   | `1d` bars over the previous trading day, first bar |
//!
//! The baseline is always the first `1d` bar of the previous trading day.

use crate::bars::{BarPick, BarRequest, BarSource, Interval};
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use tradedesk_core::{exchange_date, phase_at, previous_trading_day, MarketPhase, Price, Symbol};

/// Source of "now" for session classification.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Prices and names the watchlist store needs per symbol.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Previous session close. Errors if missing or not a usable price.
    async fn baseline_price(&self, symbol: &Symbol) -> MarketResult<Price>;

    /// Most recent known price.
    async fn current_price(&self, symbol: &Symbol) -> MarketResult<Price>;

    /// Human-readable name.
    async fn display_name(&self, symbol: &Symbol) -> MarketResult<String>;
}

/// Request for the previous session's daily bar.
pub fn baseline_request(symbol: &Symbol, now: DateTime<Utc>) -> BarRequest {
    let previous = previous_trading_day(exchange_date(now));
    BarRequest {
        symbol: symbol.clone(),
        interval: Interval::OneDay,
        start: previous,
        end: previous + Duration::days(1),
    }
}

/// Request and bar pick for the latest price at `now`.
pub fn latest_request(symbol: &Symbol, now: DateTime<Utc>) -> (BarRequest, BarPick) {
    let today = exchange_date(now);
    match phase_at(now) {
        MarketPhase::Regular => (
            BarRequest {
                symbol: symbol.clone(),
                interval: Interval::OneMinute,
                start: today,
                end: today + Duration::days(1),
            },
            BarPick::Last,
        ),
        MarketPhase::AfterClose => (
            BarRequest {
                symbol: symbol.clone(),
                interval: Interval::OneDay,
                start: today,
                end: today + Duration::days(1),
            },
            BarPick::First,
        ),
        MarketPhase::PreOpen | MarketPhase::Closed => (baseline_request(symbol, now), BarPick::First),
    }
}

/// [`MarketDataProvider`] over any [`BarSource`].
pub struct QuoteService {
    source: Arc<dyn BarSource>,
    clock: Clock,
}

impl QuoteService {
    pub fn new(source: Arc<dyn BarSource>) -> Self {
        Self::with_clock(source, Arc::new(Utc::now))
    }

    pub fn with_clock(source: Arc<dyn BarSource>, clock: Clock) -> Self {
        Self { source, clock }
    }

    async fn close_of(&self, request: &BarRequest, pick: BarPick) -> MarketResult<Price> {
        let bars = self.source.fetch_bars(request).await?;
        let bar = pick
            .pick(&bars)
            .ok_or_else(|| MarketError::EmptyBars(request.symbol.to_string()))?;
        let price = Price::new(bar.close);
        if !price.is_known() {
            return Err(MarketError::InvalidPrice {
                symbol: request.symbol.to_string(),
                price: bar.close,
            });
        }
        Ok(price)
    }
}

#[async_trait]
impl MarketDataProvider for QuoteService {
    async fn baseline_price(&self, symbol: &Symbol) -> MarketResult<Price> {
        let request = baseline_request(symbol, (self.clock)());
        debug!(symbol = %symbol, start = %request.start, "Fetching baseline");
        self.close_of(&request, BarPick::First)
            .await
            .map_err(|e| {
                warn!(symbol = %symbol, error = %e, "Baseline unavailable");
                e
            })
    }

    async fn current_price(&self, symbol: &Symbol) -> MarketResult<Price> {
        let (request, pick) = latest_request(symbol, (self.clock)());
        debug!(symbol = %symbol, interval = %request.interval, start = %request.start, "Fetching current price");
        self.close_of(&request, pick)
            .await
            .map_err(|e| {
                warn!(symbol = %symbol, error = %e, "Current price unavailable");
                e
            })
    }

    async fn display_name(&self, symbol: &Symbol) -> MarketResult<String> {
        self.source.fetch_display_name(symbol).await
    }
}
