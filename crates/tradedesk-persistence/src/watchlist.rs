//! Watchlist persistence capability.

use crate::error::PersistenceResult;
use crate::rows::{RowStore, WatchlistRow};
use crate::snapshot::SnapshotStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use tradedesk_core::{Identity, IdentityId, Symbol, TrackedSymbol};

/// Which backend a persistence handle writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceKind {
    RowStore,
    LocalSnapshot,
}

/// Persistence for one identity's watchlist.
#[async_trait]
pub trait WatchlistPersistence: Send + Sync {
    fn kind(&self) -> PersistenceKind;

    /// Persisted `{ticker, name}` pairs in stored order.
    async fn load(&self) -> PersistenceResult<Vec<WatchlistRow>>;

    async fn insert(&self, entry: &TrackedSymbol) -> PersistenceResult<()>;

    async fn remove(&self, symbol: &Symbol) -> PersistenceResult<()>;
}

/// Pick the backend for `identity`: guests get the local snapshot.
pub fn for_identity(
    identity: &Identity,
    rows: Arc<dyn RowStore>,
    snapshots: Arc<dyn SnapshotStore>,
) -> Arc<dyn WatchlistPersistence> {
    if identity.is_guest() {
        Arc::new(LocalSnapshotWatchlist::new(identity.snapshot_key(), snapshots))
    } else {
        Arc::new(RowStoreWatchlist::new(identity.id.clone(), rows))
    }
}

/// Row-store-backed watchlist.
pub struct RowStoreWatchlist {
    owner: IdentityId,
    rows: Arc<dyn RowStore>,
}

impl RowStoreWatchlist {
    pub fn new(owner: IdentityId, rows: Arc<dyn RowStore>) -> Self {
        Self { owner, rows }
    }
}

#[async_trait]
impl WatchlistPersistence for RowStoreWatchlist {
    fn kind(&self) -> PersistenceKind {
        PersistenceKind::RowStore
    }

    async fn load(&self) -> PersistenceResult<Vec<WatchlistRow>> {
        self.rows.select(&self.owner).await
    }

    async fn insert(&self, entry: &TrackedSymbol) -> PersistenceResult<()> {
        let row = WatchlistRow::new(entry.symbol().as_str(), entry.display_name());
        self.rows.insert(&self.owner, &row).await
    }

    async fn remove(&self, symbol: &Symbol) -> PersistenceResult<()> {
        self.rows.delete(&self.owner, symbol.as_str()).await
    }
}

/// Snapshot-backed watchlist; every mutation rewrites the whole list.
pub struct LocalSnapshotWatchlist {
    key: String,
    snapshots: Arc<dyn SnapshotStore>,
}

impl LocalSnapshotWatchlist {
    pub fn new(key: impl Into<String>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            key: key.into(),
            snapshots,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn entries(&self) -> PersistenceResult<Vec<TrackedSymbol>> {
        Ok(self.snapshots.read(&self.key)?.unwrap_or_default())
    }
}

#[async_trait]
impl WatchlistPersistence for LocalSnapshotWatchlist {
    fn kind(&self) -> PersistenceKind {
        PersistenceKind::LocalSnapshot
    }

    async fn load(&self) -> PersistenceResult<Vec<WatchlistRow>> {
        let rows = self
            .entries()?
            .iter()
            .map(|entry| WatchlistRow::new(entry.symbol().as_str(), entry.display_name()))
            .collect();
        Ok(rows)
    }

    async fn insert(&self, entry: &TrackedSymbol) -> PersistenceResult<()> {
        let mut entries = self.entries()?;
        entries.retain(|existing| existing.symbol() != entry.symbol());
        entries.push(entry.clone());
        self.snapshots.write(&self.key, &entries)?;
        debug!(key = %self.key, symbol = %entry.symbol(), "Snapshot updated with entry");
        Ok(())
    }

    async fn remove(&self, symbol: &Symbol) -> PersistenceResult<()> {
        let mut entries = self.entries()?;
        entries.retain(|existing| existing.symbol() != symbol);
        self.snapshots.write(&self.key, &entries)?;
        debug!(key = %self.key, symbol = %symbol, "Snapshot rewritten without entry");
        Ok(())
    }
}
