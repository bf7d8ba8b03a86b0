//! Shared live-feed relay for the tradedesk watchlist.
//!
//! Owns at most one WebSocket connection to the trade feed and fans
//! incoming messages out to registered listeners:
//! - Idempotent `initialize` with one-time endpoint discovery
//! - Subscribe/unsubscribe sent only while the socket is open
//! - Per-listener failure isolation during fan-out
//! - Sticky manual close; a closed manager never reconnects

pub mod discovery;
pub mod error;
pub mod listener;
pub mod manager;
pub mod message;

pub use discovery::{redact_endpoint, EndpointDiscovery, StaticEndpoint};
pub use error::{RelayError, RelayResult};
pub use listener::{Listener, ListenerId, ListenerRegistry};
pub use manager::{
    FeedRelay, RelayConfig, RelayFactory, RelayManager, RelayManagerFactory, RelayState,
    RelayStats, RelayStatsSnapshot, DEFAULT_CONNECT_TIMEOUT,
};
pub use message::{ControlAction, ControlMessage, FeedMessage, TradeTick};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
