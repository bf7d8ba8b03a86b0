//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Auth request failed: {0}")]
    Auth(String),

    #[error("Auth service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Guest marker I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Guest marker format: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] tradedesk_core::CoreError),

    #[error(transparent)]
    Store(#[from] tradedesk_store::StoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;
