//! Live-feed wire messages.

use serde::{Deserialize, Serialize};

// ============================================================================
// Control messages (client -> server)
// ============================================================================

/// Subscription action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Subscribe,
    Unsubscribe,
}

/// Subscribe/unsubscribe instruction for one provider symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub action: ControlAction,
    pub symbol: String,
}

impl ControlMessage {
    pub fn subscribe(symbol: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Subscribe,
            symbol: symbol.into(),
        }
    }

    pub fn unsubscribe(symbol: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Unsubscribe,
            symbol: symbol.into(),
        }
    }
}

// ============================================================================
// Data messages (server -> client)
// ============================================================================

/// One trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Provider symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Trade price.
    #[serde(rename = "p")]
    pub price: f64,
    /// Trade time (unix ms).
    #[serde(rename = "t", default)]
    pub timestamp_ms: i64,
    /// Trade volume.
    #[serde(rename = "v", default)]
    pub volume: f64,
}

/// Parsed feed frame.
///
/// Trade frames carry `data`; keep-alive (`{"type":"ping"}`) and error
/// frames parse to a message with no ticks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Vec<TradeTick>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl FeedMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn trades(ticks: Vec<TradeTick>) -> Self {
        Self {
            kind: Some("trade".to_string()),
            data: ticks,
            msg: None,
        }
    }

    pub fn has_ticks(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("error")
    }

    /// Latest price for `provider_symbol` in this frame.
    ///
    /// A frame can batch several prints for one symbol; the last one wins.
    pub fn latest_price(&self, provider_symbol: &str) -> Option<f64> {
        self.data
            .iter()
            .rev()
            .find(|tick| tick.symbol == provider_symbol)
            .map(|tick| tick.price)
    }
}
