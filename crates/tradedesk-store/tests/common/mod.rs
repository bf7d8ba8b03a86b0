//! Fakes shared by the store integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tradedesk_core::{Identity, IdentityId, Price, Symbol};
use tradedesk_market::{MarketDataProvider, MarketError, MarketResult};
use tradedesk_persistence::{InMemoryRowStore, MemorySnapshotStore, RowStore, SnapshotStore};
use tradedesk_relay::{
    FeedMessage, FeedRelay, Listener, ListenerId, ListenerRegistry, RelayFactory, RelayState,
};
use tradedesk_store::{StoreBackends, StoreConfig, WatchlistStore};

/// Relay that records control traffic and lets tests inject frames.
pub struct FakeRelay {
    state: Mutex<RelayState>,
    open_on_initialize: bool,
    listeners: ListenerRegistry,
    subscribed: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<String>>,
    initialize_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl FakeRelay {
    pub fn new(open_on_initialize: bool) -> Self {
        Self {
            state: Mutex::new(RelayState::Disconnected),
            open_on_initialize,
            listeners: ListenerRegistry::new(),
            subscribed: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
            initialize_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Deliver a frame to every registered listener.
    pub fn inject(&self, message: &FeedMessage) {
        self.listeners.dispatch(message);
    }

    pub fn inject_trade(&self, provider_symbol: &str, price: f64) {
        let text = format!(
            r#"{{"type":"trade","data":[{{"s":"{provider_symbol}","p":{price},"t":1,"v":1}}]}}"#
        );
        let message = FeedMessage::parse(&text).expect("valid trade frame");
        self.inject(&message);
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedRelay for FakeRelay {
    async fn initialize(&self) {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if *state == RelayState::Disconnected && self.open_on_initialize {
            *state = RelayState::Open;
        }
    }

    fn subscribe(&self, provider_symbol: &str) -> bool {
        if *self.state.lock() != RelayState::Open {
            return false;
        }
        self.subscribed.lock().push(provider_symbol.to_string());
        true
    }

    fn unsubscribe(&self, provider_symbol: &str) -> bool {
        if *self.state.lock() != RelayState::Open {
            return false;
        }
        self.unsubscribed.lock().push(provider_symbol.to_string());
        true
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = RelayState::Closed;
        self.listeners.clear();
    }

    fn state(&self) -> RelayState {
        *self.state.lock()
    }
}

/// Factory that hands out `FakeRelay`s and remembers them.
pub struct FakeRelayFactory {
    open_on_initialize: bool,
    created: Mutex<Vec<Arc<FakeRelay>>>,
}

impl FakeRelayFactory {
    pub fn new() -> Self {
        Self {
            open_on_initialize: true,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Relays that never reach `Open`.
    pub fn unreachable() -> Self {
        Self {
            open_on_initialize: false,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn last(&self) -> Arc<FakeRelay> {
        self.created.lock().last().cloned().expect("a relay was created")
    }

    pub fn relay(&self, index: usize) -> Arc<FakeRelay> {
        self.created.lock()[index].clone()
    }
}

impl RelayFactory for FakeRelayFactory {
    fn create(&self) -> Arc<dyn FeedRelay> {
        let relay = Arc::new(FakeRelay::new(self.open_on_initialize));
        self.created.lock().push(relay.clone());
        relay
    }
}

/// Market data keyed by canonical symbol.
#[derive(Default)]
pub struct FakeMarket {
    quotes: Mutex<HashMap<String, (f64, f64, String)>>,
    failing_current: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    baseline_calls: Mutex<Vec<String>>,
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every baseline lookup sleeps for `delay` first.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn quote(self, symbol: &str, baseline: f64, current: f64, name: &str) -> Self {
        self.quotes
            .lock()
            .insert(symbol.to_string(), (baseline, current, name.to_string()));
        self
    }

    pub fn fail_current(self, symbol: &str) -> Self {
        self.failing_current.lock().insert(symbol.to_string());
        self
    }

    pub fn baseline_calls(&self) -> Vec<String> {
        self.baseline_calls.lock().clone()
    }

    fn lookup(&self, symbol: &Symbol) -> MarketResult<(f64, f64, String)> {
        self.quotes
            .lock()
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| MarketError::EmptyBars(symbol.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for FakeMarket {
    async fn baseline_price(&self, symbol: &Symbol) -> MarketResult<Price> {
        self.baseline_calls.lock().push(symbol.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let (baseline, _, _) = self.lookup(symbol)?;
        Ok(Price::new(baseline))
    }

    async fn current_price(&self, symbol: &Symbol) -> MarketResult<Price> {
        if self.failing_current.lock().contains(symbol.as_str()) {
            return Err(MarketError::Http("timeout".to_string()));
        }
        let (_, current, _) = self.lookup(symbol)?;
        Ok(Price::new(current))
    }

    async fn display_name(&self, symbol: &Symbol) -> MarketResult<String> {
        let (_, _, name) = self.lookup(symbol)?;
        Ok(name)
    }
}

pub fn default_market() -> FakeMarket {
    FakeMarket::new()
        .quote("AMZN", 100.0, 100.0, "Amazon.com, Inc.")
        .quote("TSLA", 200.0, 210.0, "Tesla, Inc.")
        .quote("AAPL", 150.0, 147.0, "Apple Inc.")
        .quote("^GSPC", 6000.0, 6030.0, "S&P 500")
}

pub fn user(id: &str) -> Identity {
    Identity::user(IdentityId::new(id).expect("valid id"))
}

pub fn guest(id: &str) -> Identity {
    Identity::guest(IdentityId::new(id).expect("valid id"))
}

/// A store plus handles on its fakes.
pub struct Harness {
    pub store: Arc<WatchlistStore>,
    pub relays: Arc<FakeRelayFactory>,
    pub market: Arc<FakeMarket>,
    pub rows: Arc<InMemoryRowStore>,
    pub snapshots: Arc<MemorySnapshotStore>,
}

impl Harness {
    pub fn new(market: FakeMarket) -> Self {
        Self::build(market, FakeRelayFactory::new(), Arc::new(InMemoryRowStore::new()))
    }

    pub fn with_relays(market: FakeMarket, relays: FakeRelayFactory) -> Self {
        Self::build(market, relays, Arc::new(InMemoryRowStore::new()))
    }

    fn build(market: FakeMarket, relays: FakeRelayFactory, rows: Arc<InMemoryRowStore>) -> Self {
        let market = Arc::new(market);
        let relays = Arc::new(relays);
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let backends = StoreBackends {
            market: market.clone(),
            relay_factory: relays.clone(),
            rows: rows.clone(),
            snapshots: snapshots.clone(),
        };
        let store = Arc::new(WatchlistStore::new(
            StoreConfig {
                history_window: 5,
                ..StoreConfig::default()
            },
            backends,
        ));
        Self {
            store,
            relays,
            market,
            rows,
            snapshots,
        }
    }

    /// Store wired to a caller-supplied relay factory.
    pub fn with_relay_factory(
        market: FakeMarket,
        relay_factory: Arc<dyn RelayFactory>,
    ) -> Arc<WatchlistStore> {
        let backends = StoreBackends {
            market: Arc::new(market),
            relay_factory,
            rows: Arc::new(InMemoryRowStore::new()),
            snapshots: Arc::new(MemorySnapshotStore::new()),
        };
        Arc::new(WatchlistStore::new(StoreConfig::default(), backends))
    }

    /// Store wired to a caller-supplied row store.
    pub fn with_row_store(market: FakeMarket, rows: Arc<dyn RowStore>) -> Arc<WatchlistStore> {
        let backends = StoreBackends {
            market: Arc::new(market),
            relay_factory: Arc::new(FakeRelayFactory::new()),
            rows,
            snapshots: Arc::new(MemorySnapshotStore::new()) as Arc<dyn SnapshotStore>,
        };
        Arc::new(WatchlistStore::new(StoreConfig::default(), backends))
    }
}
