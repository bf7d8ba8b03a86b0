//! Test doubles for driving a real `WatchlistStore` through the binding.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tradedesk_core::{IdentityId, Price, Symbol};
use tradedesk_market::{MarketDataProvider, MarketError, MarketResult};
use tradedesk_persistence::{InMemoryRowStore, MemorySnapshotStore, RowStore, WatchlistRow};
use tradedesk_relay::{
    FeedMessage, FeedRelay, Listener, ListenerId, ListenerRegistry, RelayFactory, RelayState,
};
use tradedesk_store::{StoreBackends, StoreConfig, WatchlistStore};

pub struct CountingRelay {
    state: Mutex<RelayState>,
    listeners: ListenerRegistry,
    subscribed: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl CountingRelay {
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn inject_trade(&self, provider_symbol: &str, price: f64) {
        let text = format!(r#"{{"type":"trade","data":[{{"s":"{provider_symbol}","p":{price}}}]}}"#);
        self.listeners.dispatch(&FeedMessage::parse(&text).unwrap());
    }
}

#[async_trait]
impl FeedRelay for CountingRelay {
    async fn initialize(&self) {
        let mut state = self.state.lock();
        if *state == RelayState::Disconnected {
            *state = RelayState::Open;
        }
    }

    fn subscribe(&self, provider_symbol: &str) -> bool {
        self.subscribed.lock().push(provider_symbol.to_string());
        true
    }

    fn unsubscribe(&self, provider_symbol: &str) -> bool {
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
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = RelayState::Closed;
        self.listeners.clear();
    }

    fn state(&self) -> RelayState {
        *self.state.lock()
    }
}

#[derive(Default)]
pub struct CountingFactory {
    relays: Mutex<Vec<Arc<CountingRelay>>>,
}

impl CountingFactory {
    pub fn created(&self) -> usize {
        self.relays.lock().len()
    }

    pub fn relay(&self, index: usize) -> Arc<CountingRelay> {
        self.relays.lock()[index].clone()
    }
}

impl RelayFactory for CountingFactory {
    fn create(&self) -> Arc<dyn FeedRelay> {
        let relay = Arc::new(CountingRelay {
            state: Mutex::new(RelayState::Disconnected),
            listeners: ListenerRegistry::new(),
            subscribed: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        });
        self.relays.lock().push(relay.clone());
        relay
    }
}

/// Every symbol is listed at baseline 100, current 105.
pub struct FlatMarket;

#[async_trait]
impl MarketDataProvider for FlatMarket {
    async fn baseline_price(&self, symbol: &Symbol) -> MarketResult<Price> {
        if symbol.as_str() == "ZZZZ" {
            return Err(MarketError::EmptyBars(symbol.to_string()));
        }
        Ok(Price::new(100.0))
    }

    async fn current_price(&self, _symbol: &Symbol) -> MarketResult<Price> {
        Ok(Price::new(105.0))
    }

    async fn display_name(&self, symbol: &Symbol) -> MarketResult<String> {
        Ok(symbol.to_string())
    }
}

pub struct Fixture {
    pub store: Arc<WatchlistStore>,
    pub relays: Arc<CountingFactory>,
    pub rows: Arc<InMemoryRowStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let relays = Arc::new(CountingFactory::default());
        let rows = Arc::new(InMemoryRowStore::new());
        let store = Arc::new(WatchlistStore::new(
            StoreConfig::default(),
            StoreBackends {
                market: Arc::new(FlatMarket),
                relay_factory: relays.clone(),
                rows: rows.clone(),
                snapshots: Arc::new(MemorySnapshotStore::new()),
            },
        ));
        Self {
            store,
            relays,
            rows,
        }
    }

    pub async fn seed_rows(&self, owner: &str, tickers: &[&str]) {
        let owner = IdentityId::new(owner).unwrap();
        for ticker in tickers {
            self.rows
                .insert(&owner, &WatchlistRow::new(*ticker, *ticker))
                .await
                .unwrap();
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        self.store
            .snapshot()
            .iter()
            .map(|e| e.symbol().to_string())
            .collect()
    }
}
