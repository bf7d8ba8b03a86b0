//! Core domain types for the tradedesk watchlist.
//!
//! This crate provides the types shared by every other crate:
//! - `Symbol`: canonical ticker with provider-symbol translation
//! - `Price`, `PriceHistory`: price values and the bounded sparkline window
//! - `TrackedSymbol`: one watchlist entry with its fixed baseline
//! - `Identity`: user or guest identity the watchlist is scoped to
//! - `calendar`: US equity trading days and regular-session phases

pub mod calendar;
pub mod error;
pub mod history;
pub mod identity;
pub mod price;
pub mod symbol;
pub mod tracked;

pub use calendar::{exchange_date, is_trading_day, phase_at, previous_trading_day, MarketPhase};
pub use error::{CoreError, CoreResult};
pub use history::PriceHistory;
pub use identity::{Identity, IdentityId, IdentityKind};
pub use price::Price;
pub use symbol::Symbol;
pub use tracked::TrackedSymbol;
