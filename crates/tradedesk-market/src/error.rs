//! Market data error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No bars returned for {0}")]
    EmptyBars(String),

    #[error("Unusable price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MarketResult<T> = Result<T, MarketError>;
