//! Price values for watchlist entries.
//!
//! Prices arrive from HTTP bar endpoints and the live feed as JSON floats,
//! so `Price` wraps `f64`. A price is *known* only when it is finite and
//! strictly positive; zero is the "not available" value the gateway
//! degrades to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Last-trade or close price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub f64);

impl Price {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> f64 {
        self.0
    }

    /// Check if this price can be used in calculations.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }

    /// Percentage change from `baseline` to this price.
    ///
    /// Returns `None` if either side is unknown.
    #[inline]
    pub fn pct_from(&self, baseline: Price) -> Option<f64> {
        if !self.is_known() || !baseline.is_known() {
            return None;
        }
        Some((self.0 - baseline.0) / baseline.0 * 100.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<f64> for Price {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
