//! Relay error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Endpoint discovery failed: {0}")]
    Discovery(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Relay closed by owner")]
    ClosedByIntent,

    #[error("Message parse error: {0}")]
    ParseError(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
