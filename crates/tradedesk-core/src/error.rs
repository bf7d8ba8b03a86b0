//! Error types for tradedesk-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Baseline price unavailable for {0}")]
    UnavailableBaseline(String),

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
