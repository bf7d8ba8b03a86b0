//! OHLC bars and bar requests.

use crate::error::MarketResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tradedesk_core::Symbol;

/// One OHLC bar as served by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time (unix seconds).
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::OneWeek => "1wk",
            Self::OneMonth => "1mo",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Self::OneMinute
                | Self::FiveMinutes
                | Self::FifteenMinutes
                | Self::ThirtyMinutes
                | Self::OneHour
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bars for one symbol over `[start, end)`, exchange dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub symbol: Symbol,
    pub interval: Interval,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Which bar's close answers the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarPick {
    First,
    Last,
}

impl BarPick {
    pub fn pick<'a>(&self, bars: &'a [Bar]) -> Option<&'a Bar> {
        match self {
            Self::First => bars.first(),
            Self::Last => bars.last(),
        }
    }
}

/// Raw bar and name lookups.
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch_bars(&self, request: &BarRequest) -> MarketResult<Vec<Bar>>;

    async fn fetch_display_name(&self, symbol: &Symbol) -> MarketResult<String>;
}
