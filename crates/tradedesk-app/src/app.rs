//! Application wiring and the watch loop.

use crate::command::{Command, HELP};
use crate::config::{AppConfig, RowBackend};
use crate::error::{AppError, AppResult};
use crate::view::{render_event, render_table};
use std::future::pending;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{debug, info, warn};
use tradedesk_core::IdentityId;
use tradedesk_market::{MarketDataClient, MarketDataProvider, QuoteService};
use tradedesk_persistence::{
    InMemoryRowStore, JsonFileSnapshotStore, RestRowStore, RestRowStoreConfig, RowStore,
};
use tradedesk_relay::{EndpointDiscovery, RelayManagerFactory};
use tradedesk_session::{
    AuthEvent, AuthProvider, FileGuestMarker, RestAuthProvider, SessionBinding, SessionState,
    StaticAuthProvider,
};
use tradedesk_store::{StoreBackends, StoreError, WatchlistEvent, WatchlistStore};
use tradedesk_telemetry::Metrics;

/// Whether the watch loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Configured auth provider, kept concrete so sign-in can feed it.
enum AuthHandle {
    Static(Arc<StaticAuthProvider>),
    Rest(Arc<RestAuthProvider>),
}

impl AuthHandle {
    fn provider(&self) -> Arc<dyn AuthProvider> {
        match self {
            Self::Static(provider) => provider.clone() as Arc<dyn AuthProvider>,
            Self::Rest(provider) => provider.clone() as Arc<dyn AuthProvider>,
        }
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<WatchlistStore>,
    session: Arc<SessionBinding>,
    auth: AuthHandle,
}

impl Application {
    /// Build every component from `config`. Nothing connects yet.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let client = Arc::new(MarketDataClient::new(
            config.market.base_url.clone(),
            config.market.timeout(),
        )?);
        let market: Arc<dyn MarketDataProvider> = Arc::new(QuoteService::new(client.clone()));

        let discovery: Option<Arc<dyn EndpointDiscovery>> = match config.relay.url {
            Some(_) => None,
            None => Some(client as Arc<dyn EndpointDiscovery>),
        };
        let relay_factory = Arc::new(RelayManagerFactory::new(
            config.relay.clone().into(),
            discovery,
        ));

        let store = Arc::new(WatchlistStore::new(
            config.store.clone(),
            StoreBackends {
                market,
                relay_factory,
                rows: build_row_store(&config)?,
                snapshots: Arc::new(JsonFileSnapshotStore::new(
                    config.persistence.snapshot_dir.clone(),
                )),
            },
        ));

        let auth = build_auth(&config)?;
        let guests = Arc::new(FileGuestMarker::new(config.session.dir.clone()));
        let session = Arc::new(SessionBinding::new(store.clone(), auth.provider(), guests));

        info!(
            gateway = %config.market.base_url,
            backend = ?config.persistence.backend,
            "Application configured"
        );

        Ok(Self {
            config,
            store,
            session,
            auth,
        })
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionBinding> {
        &self.session
    }

    /// Resolve the identity (or start a guest session) and load the list.
    pub async fn start(&self, guest: bool) -> AppResult<SessionState> {
        if guest {
            self.session.start_guest().await?;
            Ok(self.session.state())
        } else {
            Ok(self.session.resolve().await?)
        }
    }

    /// Tear the connection down.
    pub async fn shutdown(&self) {
        if let Err(e) = self.session.handle(AuthEvent::Unload).await {
            warn!(error = %e, "Unload failed");
        }
        info!(metrics = ?Metrics::summary(), "Shutting down");
    }

    /// Run one command against the live session.
    pub async fn execute(&self, command: Command) -> AppResult<Flow> {
        match command {
            Command::Add(symbol) => {
                self.store
                    .add_tracked(&symbol)
                    .await
                    .map_err(store_error)?;
            }
            Command::Remove(symbol) => {
                self.store
                    .remove_tracked(&symbol)
                    .await
                    .map_err(store_error)?;
            }
            Command::List => println!("{}", render_table(&self.store.snapshot())),
            Command::SignIn(arg) => {
                self.sign_in(arg)?;
                self.session.handle(AuthEvent::SignedIn).await?;
            }
            Command::SignOut => {
                match &self.auth {
                    AuthHandle::Static(provider) => provider.sign_out(),
                    AuthHandle::Rest(provider) => provider.set_access_token(None),
                }
                self.session.handle(AuthEvent::SignedOut).await?;
            }
            Command::Guest => {
                let identity = self.session.start_guest().await?;
                println!("guest session {}", identity.id);
            }
            Command::Metrics => {
                let summary = serde_json::to_string_pretty(&Metrics::summary())
                    .map_err(|e| AppError::Config(e.to_string()))?;
                println!("{summary}");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn sign_in(&self, arg: Option<String>) -> AppResult<()> {
        match &self.auth {
            AuthHandle::Static(provider) => {
                let user = arg
                    .or_else(|| self.config.auth.user_id.clone())
                    .ok_or_else(|| AppError::Config("signin needs a user id".to_string()))?;
                let id = IdentityId::new(user).map_err(|e| AppError::Config(e.to_string()))?;
                provider.sign_in(id);
            }
            AuthHandle::Rest(provider) => {
                if arg.is_some() {
                    provider.set_access_token(arg);
                }
            }
        }
        Ok(())
    }

    /// Start the session, run `command`, print its notices, tear down.
    pub async fn run_once(&self, command: Command, guest: bool) -> AppResult<()> {
        let state = self.start(guest).await?;
        if state.identity().is_none() {
            self.shutdown().await;
            return Err(AppError::NoIdentity);
        }

        let mut events = self.store.subscribe_events();
        let result = self.execute(command).await;
        while let Ok(event) = events.try_recv() {
            if let WatchlistEvent::Notice(notice) = event {
                println!("{notice}");
            }
        }

        self.shutdown().await;
        result.map(|_| ())
    }

    /// Interactive loop: stdin commands, live tick lines, periodic metrics.
    pub async fn run_watch(&self, guest: bool) -> AppResult<()> {
        let printer = spawn_event_printer(self.store.subscribe_events());

        match self.start(guest).await? {
            SessionState::Unresolved => {
                println!("no identity: type `guest` or `signin <user>`");
            }
            state => debug!(?state, "Session started"),
        }
        println!("{}", render_table(&self.store.snapshot()));
        println!("type `help` for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut metrics_interval = self
            .config
            .telemetry
            .metrics_log_interval()
            .map(tokio::time::interval);

        info!("Entering watch loop");
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(command) => match self.execute(command).await {
                            Ok(Flow::Quit) => break,
                            Ok(Flow::Continue) => {}
                            Err(e) => report(&e),
                        },
                        Err(e) => println!("{e}"),
                    }
                }

                _ = tick(&mut metrics_interval) => {
                    info!(metrics = ?Metrics::summary(), "Metrics summary");
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        printer.abort();
        Ok(())
    }
}

fn build_row_store(config: &AppConfig) -> AppResult<Arc<dyn RowStore>> {
    match config.persistence.backend {
        RowBackend::Memory => Ok(Arc::new(InMemoryRowStore::new())),
        RowBackend::Rest => {
            let persistence = &config.persistence;
            let base_url = persistence
                .rest_url
                .clone()
                .ok_or_else(|| AppError::Config("persistence.rest_url is not set".to_string()))?;
            let api_key = persistence
                .api_key
                .clone()
                .ok_or_else(|| AppError::Config("persistence.api_key is not set".to_string()))?;
            let store = RestRowStore::new(RestRowStoreConfig {
                base_url,
                table: persistence.table.clone(),
                api_key,
                access_token: config.auth.access_token.clone(),
                timeout: config.market.timeout(),
            })?;
            Ok(Arc::new(store))
        }
    }
}

fn build_auth(config: &AppConfig) -> AppResult<AuthHandle> {
    if let Some(auth_url) = &config.auth.auth_url {
        let api_key = config.persistence.api_key.clone().unwrap_or_default();
        let provider = RestAuthProvider::new(
            auth_url.clone(),
            api_key,
            config.auth.access_token.clone(),
            config.market.timeout(),
        )?;
        return Ok(AuthHandle::Rest(Arc::new(provider)));
    }

    let user = config
        .auth
        .user_id
        .clone()
        .map(IdentityId::new)
        .transpose()
        .map_err(|e| AppError::Config(format!("auth.user_id: {e}")))?;
    Ok(AuthHandle::Static(Arc::new(StaticAuthProvider::new(user))))
}

/// User-action failures are already published as notices.
fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::NoIdentity => AppError::NoIdentity,
        other => AppError::Store(other),
    }
}

fn report(e: &AppError) {
    match e {
        AppError::Store(inner) => debug!(error = %inner, "Command rejected"),
        other => println!("error: {other}"),
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<WatchlistEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
