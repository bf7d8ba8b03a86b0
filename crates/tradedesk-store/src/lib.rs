//! Watchlist reconciliation store.
//!
//! Single source of truth for one identity's tracked symbols:
//! - Loads persisted tickers and prices them against the previous close
//! - Adds and removes symbols, persisting through the identity's backend
//! - Owns the live-feed relay and decides what it subscribes to
//! - Merges live ticks into current price, percent change and sparkline
//! - Publishes every change as a [`WatchlistEvent`]

pub mod config;
pub mod error;
pub mod event;
pub mod merge;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use event::{Notice, NoticeLevel, WatchlistEvent};
pub use merge::merge_ticks;
pub use store::{StoreBackends, WatchlistStore};
