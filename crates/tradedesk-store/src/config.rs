//! Store configuration.

use serde::{Deserialize, Serialize};
use tradedesk_core::PriceHistory;

/// Watchlist store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Sparkline samples kept per symbol.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Buffered events per observer before it lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_history_window() -> usize {
    PriceHistory::DEFAULT_WINDOW
}

fn default_event_capacity() -> usize {
    256
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            event_capacity: default_event_capacity(),
        }
    }
}
