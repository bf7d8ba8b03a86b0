//! Market data gateway client.
//!
//! Fetches OHLC bars and display names over HTTP and turns them into the
//! two prices a tracked symbol needs:
//! - Baseline: close of the previous trading session
//! - Current: latest intraday or daily close, depending on session phase

pub mod bars;
pub mod client;
pub mod error;
pub mod quotes;

pub use bars::{Bar, BarPick, BarRequest, BarSource, Interval};
pub use client::{MarketDataClient, DEFAULT_TIMEOUT};
pub use error::{MarketError, MarketResult};
pub use quotes::{baseline_request, latest_request, Clock, MarketDataProvider, QuoteService};
