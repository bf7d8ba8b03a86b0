//! Store change events.

use serde::Serialize;
use std::fmt;
use tradedesk_core::{Symbol, TrackedSymbol};

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Message shown to the user after an add/remove.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.message)
    }
}

/// Change published by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchlistEvent {
    /// A bulk load started.
    Loading,
    /// A bulk load finished with `count` entries.
    Loaded { count: usize },
    Added { entry: TrackedSymbol },
    Removed { symbol: Symbol },
    /// A live tick changed an entry.
    PriceUpdated { entry: TrackedSymbol },
    /// The list was emptied.
    Cleared,
    ConnectionChanged { connected: bool },
    Notice(Notice),
}
