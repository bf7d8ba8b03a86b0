//! Watchlist store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::event::{Notice, NoticeLevel, WatchlistEvent};
use crate::merge::merge_ticks;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as TokioMutex};
use tracing::{debug, info, trace, warn};
use tradedesk_core::{Identity, Price, Symbol, TrackedSymbol};
use tradedesk_market::MarketDataProvider;
use tradedesk_persistence::{for_identity, RowStore, SnapshotStore, WatchlistPersistence};
use tradedesk_relay::{FeedMessage, FeedRelay, Listener, RelayFactory, RelayState};
use tradedesk_telemetry::Metrics;

/// Collaborators the store is wired to.
#[derive(Clone)]
pub struct StoreBackends {
    pub market: Arc<dyn MarketDataProvider>,
    pub relay_factory: Arc<dyn RelayFactory>,
    pub rows: Arc<dyn RowStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

/// Counts one in-flight load until dropped, however the load ends.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(loads: &'a AtomicUsize) -> Self {
        loads.fetch_add(1, Ordering::SeqCst);
        Self(loads)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The owned relay and the provider symbols subscribed on it.
///
/// A replacement relay starts with an empty set.
#[derive(Clone)]
struct Connection {
    relay: Arc<dyn FeedRelay>,
    subscribed: Arc<Mutex<HashSet<String>>>,
}

impl Connection {
    fn new(relay: Arc<dyn FeedRelay>) -> Self {
        Self {
            relay,
            subscribed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Subscribe unless already subscribed. The set lock is held across the send.
    fn subscribe(&self, provider: &str) -> bool {
        let mut subscribed = self.subscribed.lock();
        if subscribed.contains(provider) || !self.relay.subscribe(provider) {
            return false;
        }
        subscribed.insert(provider.to_string());
        true
    }

    fn unsubscribe(&self, provider: &str) -> bool {
        let mut subscribed = self.subscribed.lock();
        if !subscribed.remove(provider) {
            return false;
        }
        self.relay.unsubscribe(provider);
        true
    }

    /// Make the subscribed set equal `wanted`. Returns (added, dropped).
    fn sync(&self, wanted: &[String]) -> (usize, usize) {
        let mut subscribed = self.subscribed.lock();
        let keep: HashSet<&str> = wanted.iter().map(String::as_str).collect();

        let mut stale: Vec<String> = subscribed
            .iter()
            .filter(|provider| !keep.contains(provider.as_str()))
            .cloned()
            .collect();
        stale.sort();
        for provider in &stale {
            subscribed.remove(provider);
            self.relay.unsubscribe(provider);
        }

        let mut added = 0;
        for provider in wanted {
            if !subscribed.contains(provider) && self.relay.subscribe(provider) {
                subscribed.insert(provider.clone());
                added += 1;
            }
        }
        (added, stale.len())
    }
}

/// Reconciliation store for one session.
///
/// The relay reference is owned here and nowhere else. Every identity
/// change or teardown bumps `generation`; async work started under an
/// older generation discards its results.
pub struct WatchlistStore {
    config: StoreConfig,
    backends: StoreBackends,
    identity: RwLock<Option<Identity>>,
    persistence: RwLock<Option<Arc<dyn WatchlistPersistence>>>,
    entries: Arc<RwLock<Vec<TrackedSymbol>>>,
    connection: RwLock<Option<Connection>>,
    loading: AtomicUsize,
    generation: Arc<AtomicU64>,
    connect_lock: TokioMutex<()>,
    events: broadcast::Sender<WatchlistEvent>,
}

impl WatchlistStore {
    pub fn new(config: StoreConfig, backends: StoreBackends) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            backends,
            identity: RwLock::new(None),
            persistence: RwLock::new(None),
            entries: Arc::new(RwLock::new(Vec::new())),
            connection: RwLock::new(None),
            loading: AtomicUsize::new(0),
            generation: Arc::new(AtomicU64::new(0)),
            connect_lock: TokioMutex::new(()),
            events,
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Subscribe to store changes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WatchlistEvent> {
        self.events.subscribe()
    }

    /// Current entries in display order.
    pub fn snapshot(&self) -> Vec<TrackedSymbol> {
        self.entries.read().clone()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<TrackedSymbol> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.symbol() == symbol)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    /// True while at least one load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub fn has_connection(&self) -> bool {
        self.connection.read().is_some()
    }

    /// State of the owned relay, if any.
    pub fn connection_state(&self) -> Option<RelayState> {
        self.connection.read().as_ref().map(|c| c.relay.state())
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Replace the identity and pick its persistence backend.
    ///
    /// A different identity tears down the current relay. Does not load or
    /// reconnect; the session binding decides when to.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let persistence = identity.as_ref().map(|id| {
            for_identity(
                id,
                self.backends.rows.clone(),
                self.backends.snapshots.clone(),
            )
        });

        let changed = {
            let mut current = self.identity.write();
            let changed = *current != identity;
            *current = identity;
            changed
        };
        *self.persistence.write() = persistence;

        if changed {
            self.teardown_connection();
            match self.identity() {
                Some(identity) => {
                    info!(identity = %identity.id, kind = %identity.kind, "Watchlist identity set")
                }
                None => info!("Watchlist identity cleared"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Create and open the relay unless one already exists.
    ///
    /// The merge listener is registered before the relay opens, then every
    /// tracked symbol is subscribed.
    pub async fn initialize_connection(&self) {
        let _guard = self.connect_lock.lock().await;

        let exists = self.connection.read().is_some();
        if exists {
            return;
        }

        let generation = self.current_generation();
        let relay = self.backends.relay_factory.create();
        relay.add_listener(self.merge_listener(generation));
        let connection = Connection::new(relay.clone());
        *self.connection.write() = Some(connection.clone());

        relay.initialize().await;

        if self.is_stale(generation) {
            debug!("Connection torn down during initialization");
            return;
        }

        let (subscribed, _) = self.sync_subscriptions(&connection);
        let connected = relay.state() == RelayState::Open;
        info!(connected, subscribed, "Watchlist connection initialized");
        self.emit(WatchlistEvent::ConnectionChanged { connected });
    }

    /// Close and drop the relay. Entries stay, frozen at their last price.
    pub fn teardown_connection(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let connection = self.connection.write().take();
        if let Some(connection) = connection {
            connection.relay.close();
            info!("Watchlist connection torn down");
            self.emit(WatchlistEvent::ConnectionChanged { connected: false });
        }
    }

    fn merge_listener(&self, generation: u64) -> Listener {
        let entries = self.entries.clone();
        let events = self.events.clone();
        let live_generation = self.generation.clone();

        Arc::new(move |message: &FeedMessage| {
            if live_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let updated = merge_ticks(entries.write().as_mut_slice(), message);
            if updated.is_empty() {
                return;
            }
            trace!(count = updated.len(), "Merged live ticks");
            Metrics::ticks_merged(updated.len());
            for entry in updated {
                let _ = events.send(WatchlistEvent::PriceUpdated { entry });
            }
        })
    }

    /// Subscribe every tracked symbol and drop subscriptions for symbols
    /// no longer tracked.
    fn sync_subscriptions(&self, connection: &Connection) -> (usize, usize) {
        let wanted: Vec<String> = self
            .entries
            .read()
            .iter()
            .map(|entry| entry.provider_symbol().to_string())
            .collect();
        connection.sync(&wanted)
    }

    fn current_connection(&self) -> Option<Connection> {
        self.connection.read().clone()
    }

    // ------------------------------------------------------------------
    // Load / add / remove
    // ------------------------------------------------------------------

    /// Replace the list with the identity's persisted symbols.
    ///
    /// Symbols are priced one at a time in stored order. A symbol whose
    /// baseline is unavailable is skipped. Subscriptions are issued once
    /// every entry is built. Returns the number of entries loaded.
    pub async fn load_tracked_symbols(&self) -> StoreResult<usize> {
        let persistence = self.persistence_handle()?;
        let generation = self.current_generation();

        let _loading = LoadingGuard::enter(&self.loading);
        self.emit(WatchlistEvent::Loading);

        let rows = persistence
            .load()
            .await
            .map_err(|source| StoreError::Persistence {
                symbol: "*".to_string(),
                source,
            })?;
        if self.is_stale(generation) {
            return Err(StoreError::Superseded);
        }
        debug!(count = rows.len(), backend = ?persistence.kind(), "Loaded persisted rows");

        self.entries.write().clear();

        for row in rows {
            let symbol = match Symbol::canonicalize(&row.ticker) {
                Ok(symbol) => symbol,
                Err(e) => {
                    warn!(ticker = %row.ticker, error = %e, "Skipping invalid persisted ticker");
                    continue;
                }
            };

            let baseline = match self.backends.market.baseline_price(&symbol).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping symbol without baseline");
                    continue;
                }
            };
            let current = self.fetch_current(&symbol).await;

            if self.is_stale(generation) {
                return Err(StoreError::Superseded);
            }

            let name = if row.name.trim().is_empty() {
                symbol.to_string()
            } else {
                row.name
            };
            let entry = match TrackedSymbol::new(
                symbol,
                name,
                baseline,
                current,
                self.config.history_window,
            ) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unusable entry");
                    continue;
                }
            };

            if self.append_unique(entry.clone()) {
                self.emit(WatchlistEvent::Added { entry });
            }
        }

        if let Some(connection) = self.current_connection() {
            let (subscribed, unsubscribed) = self.sync_subscriptions(&connection);
            debug!(subscribed, unsubscribed, "Synced subscriptions to loaded symbols");
        }

        let count = self.len();
        Metrics::tracked_symbols(count);
        info!(count, "Watchlist loaded");
        self.emit(WatchlistEvent::Loaded { count });
        Ok(count)
    }

    /// Add a symbol: price it, append, persist, then subscribe.
    ///
    /// A persistence failure rolls the entry back and skips the subscribe.
    pub async fn add_tracked(&self, raw_symbol: &str) -> StoreResult<TrackedSymbol> {
        let symbol = match Symbol::canonicalize(raw_symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                self.notify(Notice::error(format!("{:?} is not a valid symbol", raw_symbol.trim())));
                return Err(e.into());
            }
        };
        let persistence = self.persistence_handle()?;

        if self.contains(&symbol) {
            self.notify(Notice::error(format!("{symbol} is already in your watchlist")));
            return Err(StoreError::AlreadyTracked(symbol));
        }

        let generation = self.current_generation();

        let name = match self.backends.market.display_name(&symbol).await {
            Ok(name) => name,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Name lookup failed, using symbol");
                symbol.to_string()
            }
        };

        let baseline = match self.backends.market.baseline_price(&symbol).await {
            Ok(price) => price,
            Err(_) => {
                self.notify(Notice::error(format!("{symbol} not listed")));
                return Err(StoreError::NotListed(symbol));
            }
        };
        let current = self.fetch_current(&symbol).await;

        if self.is_stale(generation) {
            return Err(StoreError::Superseded);
        }

        let entry = match TrackedSymbol::new(
            symbol.clone(),
            name,
            baseline,
            current,
            self.config.history_window,
        ) {
            Ok(entry) => entry,
            Err(_) => {
                self.notify(Notice::error(format!("{symbol} not listed")));
                return Err(StoreError::NotListed(symbol));
            }
        };

        if !self.append_unique(entry.clone()) {
            self.notify(Notice::error(format!("{symbol} is already in your watchlist")));
            return Err(StoreError::AlreadyTracked(symbol));
        }
        self.emit(WatchlistEvent::Added {
            entry: entry.clone(),
        });

        if let Err(source) = persistence.insert(&entry).await {
            warn!(symbol = %symbol, error = %source, "Persisting new symbol failed, rolling back");
            if self.remove_entry(&symbol).is_some() {
                self.emit(WatchlistEvent::Removed {
                    symbol: symbol.clone(),
                });
            }
            // A concurrent sync may have subscribed the pending entry.
            if let Some(connection) = self.current_connection() {
                connection.unsubscribe(entry.provider_symbol());
            }
            self.notify(Notice::error(format!("Failed to save {symbol}")));
            return Err(StoreError::Persistence {
                symbol: symbol.to_string(),
                source,
            });
        }

        if self.is_stale(generation) {
            return Err(StoreError::Superseded);
        }

        if let Some(connection) = self.current_connection() {
            connection.subscribe(entry.provider_symbol());
        }

        Metrics::symbol_added();
        Metrics::tracked_symbols(self.len());
        self.notify(Notice::success(format!("{symbol} added!")));
        Ok(entry)
    }

    /// Remove a symbol: drop it, delete the persisted record, unsubscribe.
    ///
    /// A persistence failure puts the entry back where it was and skips the
    /// unsubscribe.
    pub async fn remove_tracked(&self, raw_symbol: &str) -> StoreResult<()> {
        let symbol = Symbol::canonicalize(raw_symbol)?;
        let persistence = self.persistence_handle()?;

        let Some((index, entry)) = self.remove_entry(&symbol) else {
            self.notify(Notice::error(format!("{symbol} is not in your watchlist")));
            return Err(StoreError::NotTracked(symbol));
        };
        self.emit(WatchlistEvent::Removed {
            symbol: symbol.clone(),
        });

        if let Err(source) = persistence.remove(&symbol).await {
            warn!(symbol = %symbol, error = %source, "Deleting symbol failed, restoring entry");
            let restored = {
                let mut entries = self.entries.write();
                if entries.iter().any(|e| e.symbol() == &symbol) {
                    false
                } else {
                    let at = index.min(entries.len());
                    entries.insert(at, entry.clone());
                    true
                }
            };
            if restored {
                self.emit(WatchlistEvent::Added { entry });
            }
            self.notify(Notice::error(format!("Failed to remove {symbol}")));
            return Err(StoreError::Persistence {
                symbol: symbol.to_string(),
                source,
            });
        }

        if let Some(connection) = self.current_connection() {
            connection.unsubscribe(entry.provider_symbol());
        }

        Metrics::symbol_removed();
        Metrics::tracked_symbols(self.len());
        self.notify(Notice::success(format!("{symbol} removed")));
        Ok(())
    }

    /// Empty the list and drop its subscriptions.
    pub fn clear(&self) {
        self.entries.write().clear();
        if let Some(connection) = self.current_connection() {
            connection.sync(&[]);
        }
        Metrics::tracked_symbols(0);
        self.emit(WatchlistEvent::Cleared);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn fetch_current(&self, symbol: &Symbol) -> Price {
        match self.backends.market.current_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Current price unknown");
                Price::ZERO
            }
        }
    }

    fn persistence_handle(&self) -> StoreResult<Arc<dyn WatchlistPersistence>> {
        self.persistence.read().clone().ok_or(StoreError::NoIdentity)
    }

    fn contains(&self, symbol: &Symbol) -> bool {
        self.entries.read().iter().any(|e| e.symbol() == symbol)
    }

    fn append_unique(&self, entry: TrackedSymbol) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.symbol() == entry.symbol()) {
            return false;
        }
        entries.push(entry);
        true
    }

    fn remove_entry(&self, symbol: &Symbol) -> Option<(usize, TrackedSymbol)> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|e| e.symbol() == symbol)?;
        Some((index, entries.remove(index)))
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    fn emit(&self, event: WatchlistEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        Metrics::notice(notice.level.as_str());
        match notice.level {
            NoticeLevel::Success => info!(message = %notice.message, "Notice"),
            NoticeLevel::Error => warn!(message = %notice.message, "Notice"),
        }
        self.emit(WatchlistEvent::Notice(notice));
    }
}

impl Drop for WatchlistStore {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.relay.close();
        }
    }
}
