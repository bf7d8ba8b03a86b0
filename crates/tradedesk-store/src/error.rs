//! Store error types.

use thiserror::Error;
use tradedesk_core::{CoreError, Symbol};
use tradedesk_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is already in your watchlist")]
    AlreadyTracked(Symbol),

    #[error("{0} not listed")]
    NotListed(Symbol),

    #[error("{0} is not in your watchlist")]
    NotTracked(Symbol),

    #[error("No identity bound to the watchlist")]
    NoIdentity,

    #[error("Persistence failed for {symbol}: {source}")]
    Persistence {
        symbol: String,
        #[source]
        source: PersistenceError,
    },

    #[error("Operation superseded by an identity or connection change")]
    Superseded,

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
