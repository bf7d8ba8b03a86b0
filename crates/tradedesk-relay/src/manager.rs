//! Live-feed connection manager.
//!
//! Owns at most one WebSocket connection. There is no automatic
//! reconnection: a dropped connection leaves the manager `Disconnected`
//! until the owner calls `initialize` again, and `close` is terminal.

use crate::discovery::{redact_endpoint, EndpointDiscovery};
use crate::error::{RelayError, RelayResult};
use crate::listener::{Listener, ListenerId, ListenerRegistry};
use crate::message::{ControlMessage, FeedMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tradedesk_telemetry::Metrics;
use tracing::{debug, error, info, warn};

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Fixed feed URL. When unset the endpoint is discovered on first use.
    pub url: Option<String>,
    /// Outbound control-message buffer.
    pub outbound_capacity: usize,
    /// Upper bound on the TCP connect plus WebSocket upgrade.
    pub connect_timeout: Duration,
}

/// Default for [`RelayConfig::connect_timeout`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            outbound_capacity: 64,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Disconnected,
    Connecting,
    Open,
    /// Closed by the owner. Terminal.
    Closed,
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Per-manager counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    connect_attempts: AtomicU64,
    messages_received: AtomicU64,
    parse_failures: AtomicU64,
    listener_panics: AtomicU64,
}

/// Snapshot of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub connect_attempts: u64,
    pub messages_received: u64,
    pub parse_failures: u64,
    pub listener_panics: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}

/// Shared live-feed connection.
///
/// The watchlist store talks to the feed only through this trait so tests
/// can substitute a recording fake.
#[async_trait]
pub trait FeedRelay: Send + Sync {
    /// Open the connection if none is open or opening.
    ///
    /// No-op after `close`. Failures are logged, never returned.
    async fn initialize(&self);

    /// Send a subscribe instruction. Dropped (returns false) unless open.
    fn subscribe(&self, provider_symbol: &str) -> bool;

    /// Send an unsubscribe instruction. Dropped (returns false) unless open.
    fn unsubscribe(&self, provider_symbol: &str) -> bool;

    fn add_listener(&self, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Close for good: set the sticky flag, drop the socket, clear listeners.
    fn close(&self);

    fn state(&self) -> RelayState;
}

/// Builds a fresh relay per identity.
pub trait RelayFactory: Send + Sync {
    fn create(&self) -> Arc<dyn FeedRelay>;
}

/// WebSocket relay manager.
pub struct RelayManager {
    config: RelayConfig,
    discovery: Option<Arc<dyn EndpointDiscovery>>,
    /// Resolved endpoint, shared with sibling managers from the same factory.
    endpoint: Arc<RwLock<Option<String>>>,
    state: Arc<RwLock<RelayState>>,
    closed_by_intent: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    outbound: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    shutdown_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RelayStats>,
    /// Set while this manager's socket is counted in the connected gauge.
    gauge_held: Arc<AtomicBool>,
}

impl RelayManager {
    /// Create a manager with its own endpoint cache.
    pub fn new(config: RelayConfig, discovery: Option<Arc<dyn EndpointDiscovery>>) -> Self {
        let endpoint = Arc::new(RwLock::new(config.url.clone()));
        Self::with_endpoint_cache(config, discovery, endpoint)
    }

    /// Create a manager that reads and fills a shared endpoint cache.
    pub fn with_endpoint_cache(
        config: RelayConfig,
        discovery: Option<Arc<dyn EndpointDiscovery>>,
        endpoint: Arc<RwLock<Option<String>>>,
    ) -> Self {
        Self {
            config,
            discovery,
            endpoint,
            state: Arc::new(RwLock::new(RelayState::Disconnected)),
            closed_by_intent: AtomicBool::new(false),
            listeners: Arc::new(ListenerRegistry::new()),
            outbound: Arc::new(RwLock::new(None)),
            shutdown_token: CancellationToken::new(),
            task: Mutex::new(None),
            stats: Arc::new(RelayStats::default()),
            gauge_held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_closed_by_intent(&self) -> bool {
        self.closed_by_intent.load(Ordering::SeqCst)
    }

    /// Open the connection, returning why it could not be opened.
    ///
    /// Returns `Ok(())` without a new attempt if a connection is already
    /// open or opening.
    pub async fn open(&self) -> RelayResult<()> {
        if self.is_closed_by_intent() {
            return Err(RelayError::ClosedByIntent);
        }

        {
            let mut state = self.state.write();
            match *state {
                RelayState::Connecting | RelayState::Open => return Ok(()),
                RelayState::Closed => return Err(RelayError::ClosedByIntent),
                RelayState::Disconnected => *state = RelayState::Connecting,
            }
        }

        let url = match self.resolve_endpoint().await {
            Ok(url) => url,
            Err(e) => {
                self.set_state_unless_closed(RelayState::Disconnected);
                return Err(e);
            }
        };

        self.stats.connect_attempts.fetch_add(1, Ordering::Relaxed);
        info!(endpoint = redact_endpoint(&url), "Connecting to live feed");

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async_tls_with_config(url.as_str(), None, true, None),
        );
        let ws_stream = tokio::select! {
            () = self.shutdown_token.cancelled() => {
                Metrics::relay_connect_discarded();
                return Err(RelayError::ClosedByIntent);
            }
            result = connect => match result {
                Ok(Ok((ws_stream, _response))) => ws_stream,
                Ok(Err(e)) => {
                    Metrics::relay_connect_failed();
                    self.set_state_unless_closed(RelayState::Disconnected);
                    return Err(RelayError::ConnectionFailed(e.to_string()));
                }
                Err(_elapsed) => {
                    Metrics::relay_connect_failed();
                    self.set_state_unless_closed(RelayState::Disconnected);
                    return Err(RelayError::ConnectionFailed(format!(
                        "handshake timed out after {:?}",
                        self.config.connect_timeout
                    )));
                }
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        {
            let mut state = self.state.write();
            if *state == RelayState::Closed || self.is_closed_by_intent() {
                Metrics::relay_connect_discarded();
                return Err(RelayError::ClosedByIntent);
            }
            *self.outbound.write() = Some(outbound_tx);
            *state = RelayState::Open;
        }
        self.gauge_held.store(true, Ordering::SeqCst);
        Metrics::relay_opened();
        info!("Live feed connected");

        let task = tokio::spawn(message_loop(
            ws_stream,
            outbound_rx,
            LoopContext {
                shutdown: self.shutdown_token.clone(),
                listeners: self.listeners.clone(),
                state: self.state.clone(),
                outbound: self.outbound.clone(),
                stats: self.stats.clone(),
                gauge_held: self.gauge_held.clone(),
            },
        ));
        *self.task.lock() = Some(task);

        Ok(())
    }

    async fn resolve_endpoint(&self) -> RelayResult<String> {
        let cached = self.endpoint.read().clone();
        if let Some(url) = cached {
            return Ok(url);
        }

        let discovery = self
            .discovery
            .as_ref()
            .ok_or_else(|| RelayError::Discovery("no feed endpoint configured".to_string()))?;
        let url = discovery.discover().await?;
        debug!(endpoint = redact_endpoint(&url), "Discovered live feed endpoint");
        *self.endpoint.write() = Some(url.clone());
        Ok(url)
    }

    fn set_state_unless_closed(&self, next: RelayState) {
        let mut state = self.state.write();
        if *state != RelayState::Closed {
            *state = next;
        }
    }

    fn send_control(&self, message: ControlMessage) -> bool {
        if self.state() != RelayState::Open {
            debug!(symbol = %message.symbol, action = ?message.action, "Relay not open, dropping control message");
            return false;
        }

        let Some(tx) = self.outbound.read().clone() else {
            debug!(symbol = %message.symbol, "No outbound channel, dropping control message");
            return false;
        };

        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode control message");
                return false;
            }
        };

        match tx.try_send(payload) {
            Ok(()) => {
                debug!(symbol = %message.symbol, action = ?message.action, "Control message queued");
                true
            }
            Err(e) => {
                warn!(symbol = %message.symbol, error = %e, "Failed to queue control message");
                false
            }
        }
    }
}

#[async_trait]
impl FeedRelay for RelayManager {
    async fn initialize(&self) {
        match self.open().await {
            Ok(()) => {}
            Err(RelayError::ClosedByIntent) => {
                debug!("Relay closed by owner, not connecting");
            }
            Err(e) => {
                error!(error = %e, "Live feed initialization failed");
            }
        }
    }

    fn subscribe(&self, provider_symbol: &str) -> bool {
        self.send_control(ControlMessage::subscribe(provider_symbol))
    }

    fn unsubscribe(&self, provider_symbol: &str) -> bool {
        self.send_control(ControlMessage::unsubscribe(provider_symbol))
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn close(&self) {
        self.closed_by_intent.store(true, Ordering::SeqCst);
        *self.state.write() = RelayState::Closed;
        *self.outbound.write() = None;
        self.shutdown_token.cancel();
        self.listeners.clear();
        release_gauge(&self.gauge_held);
        info!("Relay closed by owner");
    }

    fn state(&self) -> RelayState {
        *self.state.read()
    }
}

impl Drop for RelayManager {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

/// Factory producing [`RelayManager`]s that share one endpoint cache.
pub struct RelayManagerFactory {
    config: RelayConfig,
    discovery: Option<Arc<dyn EndpointDiscovery>>,
    endpoint: Arc<RwLock<Option<String>>>,
}

impl RelayManagerFactory {
    pub fn new(config: RelayConfig, discovery: Option<Arc<dyn EndpointDiscovery>>) -> Self {
        let endpoint = Arc::new(RwLock::new(config.url.clone()));
        Self {
            config,
            discovery,
            endpoint,
        }
    }
}

impl RelayFactory for RelayManagerFactory {
    fn create(&self) -> Arc<dyn FeedRelay> {
        Arc::new(RelayManager::with_endpoint_cache(
            self.config.clone(),
            self.discovery.clone(),
            self.endpoint.clone(),
        ))
    }
}

struct LoopContext {
    shutdown: CancellationToken,
    listeners: Arc<ListenerRegistry>,
    state: Arc<RwLock<RelayState>>,
    outbound: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    stats: Arc<RelayStats>,
    gauge_held: Arc<AtomicBool>,
}

/// Lower the connected gauge if this manager still holds it.
fn release_gauge(held: &AtomicBool) {
    if held.swap(false, Ordering::SeqCst) {
        Metrics::relay_disconnected();
    }
}

async fn message_loop(
    ws_stream: FeedStream,
    mut outbound_rx: mpsc::Receiver<String>,
    ctx: LoopContext,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;

            () = ctx.shutdown.cancelled() => {
                debug!("Shutdown signal received in message loop");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Failed to send Close frame");
                }
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(&text, &ctx),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to answer ping");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, "Live feed closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Live feed read error");
                        break;
                    }
                    None => {
                        warn!("Live feed stream ended");
                        break;
                    }
                    _ => {}
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!(error = %e, "Failed to send control message");
                            break;
                        }
                    }
                    None => {
                        debug!("Outbound channel dropped, closing");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    {
        let mut state = ctx.state.write();
        if *state != RelayState::Closed {
            *state = RelayState::Disconnected;
            *ctx.outbound.write() = None;
        }
    }
    release_gauge(&ctx.gauge_held);
    info!("Live feed message loop exited");
}

fn handle_text(text: &str, ctx: &LoopContext) {
    let message = match FeedMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            ctx.stats.parse_failures.fetch_add(1, Ordering::Relaxed);
            Metrics::relay_parse_failure();
            warn!(error = %e, "Dropping unparseable feed frame");
            return;
        }
    };

    ctx.stats.messages_received.fetch_add(1, Ordering::Relaxed);
    let kind = if message.has_ticks() {
        "trade"
    } else {
        match message.kind.as_deref() {
            Some("ping") => "ping",
            Some("error") => "error",
            _ => "other",
        }
    };
    Metrics::relay_message(kind);
    if message.is_error() {
        warn!(msg = ?message.msg, "Live feed reported an error");
    }

    let panicked = ctx.listeners.dispatch(&message);
    if panicked > 0 {
        ctx.stats
            .listener_panics
            .fetch_add(panicked as u64, Ordering::Relaxed);
        for _ in 0..panicked {
            Metrics::listener_panic();
        }
    }
}
