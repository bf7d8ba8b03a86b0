//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Market data error: {0}")]
    Market(#[from] tradedesk_market::MarketError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tradedesk_persistence::PersistenceError),

    #[error(transparent)]
    Store(#[from] tradedesk_store::StoreError),

    #[error("Session error: {0}")]
    Session(#[from] tradedesk_session::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tradedesk_telemetry::TelemetryError),

    #[error("No identity: start a guest session or configure auth.user_id")]
    NoIdentity,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
