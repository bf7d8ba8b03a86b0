//! Watchlist persistence for tradedesk.
//!
//! Two backends behind one capability:
//! - Signed-in users: a row store of `{ticker, name}` scoped by user id
//! - Guests: a whole-list snapshot keyed `watchlist_<id>`, rewritten on
//!   every mutation
//!
//! The variant is picked once per identity with [`for_identity`].

pub mod error;
pub mod rows;
pub mod snapshot;
pub mod watchlist;

pub use error::{PersistenceError, PersistenceResult};
pub use rows::{InMemoryRowStore, RestRowStore, RestRowStoreConfig, RowStore, WatchlistRow};
pub use snapshot::{JsonFileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use watchlist::{
    for_identity, LocalSnapshotWatchlist, PersistenceKind, RowStoreWatchlist,
    WatchlistPersistence,
};
