//! Bounded price history used for sparklines.

use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding window of the most recent prices.
///
/// Oldest samples are evicted first once the window is full; the history
/// is never reset by new samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    window: usize,
    samples: VecDeque<f64>,
}

impl PriceHistory {
    /// Twenty retained samples plus the newest one.
    pub const DEFAULT_WINDOW: usize = 21;

    /// Create an empty history. A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    /// Create a history seeded with `[baseline, current]`.
    ///
    /// An unknown current price is left out so the sparkline does not dip
    /// to zero.
    pub fn seeded(window: usize, baseline: Price, current: Price) -> Self {
        let mut history = Self::new(window);
        history.push(baseline);
        if current.is_known() {
            history.push(current);
        }
        history
    }

    /// Append a sample, evicting the oldest if the window is full.
    pub fn push(&mut self, price: Price) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(price.inner());
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Lowest and highest sample, for scaling a sparkline.
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut iter = self.samples.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
