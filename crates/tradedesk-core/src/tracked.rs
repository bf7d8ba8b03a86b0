//! Watchlist entry.

use crate::error::{CoreError, CoreResult};
use crate::history::PriceHistory;
use crate::price::Price;
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// One tracked symbol with its live-updated metrics.
///
/// `baseline_price` is the previous session's close. It is fixed at
/// construction and has no setter; only `apply_price` mutates the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSymbol {
    symbol: Symbol,
    display_name: String,
    baseline_price: Price,
    current_price: Price,
    percent_change: f64,
    price_history: PriceHistory,
}

impl TrackedSymbol {
    /// Build an entry from freshly fetched prices.
    ///
    /// Fails if the baseline is not a usable price; an unknown current
    /// price degrades to a zero percent change.
    pub fn new(
        symbol: Symbol,
        display_name: impl Into<String>,
        baseline_price: Price,
        current_price: Price,
        history_window: usize,
    ) -> CoreResult<Self> {
        if !baseline_price.is_known() {
            return Err(CoreError::UnavailableBaseline(symbol.to_string()));
        }

        let current_price = if current_price.is_known() {
            current_price
        } else {
            Price::ZERO
        };

        Ok(Self {
            percent_change: current_price.pct_from(baseline_price).unwrap_or(0.0),
            price_history: PriceHistory::seeded(history_window, baseline_price, current_price),
            symbol,
            display_name: display_name.into(),
            baseline_price,
            current_price,
        })
    }

    /// Merge a live price into the entry.
    ///
    /// Unknown prices are ignored so a bad tick cannot zero the entry.
    /// Returns `true` if the entry changed.
    pub fn apply_price(&mut self, price: Price) -> bool {
        if !price.is_known() {
            return false;
        }
        self.current_price = price;
        self.percent_change = price.pct_from(self.baseline_price).unwrap_or(0.0);
        self.price_history.push(price);
        true
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn baseline_price(&self) -> Price {
        self.baseline_price
    }

    pub fn current_price(&self) -> Price {
        self.current_price
    }

    pub fn percent_change(&self) -> f64 {
        self.percent_change
    }

    pub fn price_history(&self) -> &PriceHistory {
        &self.price_history
    }

    /// Symbol to match against live-feed ticks.
    pub fn provider_symbol(&self) -> &str {
        self.symbol.provider_symbol()
    }

    pub fn is_gain(&self) -> bool {
        self.percent_change > 0.0
    }
}
