//! Identity state machine driving the watchlist store.
//!
//! ```text
//! Unresolved --resolve--> Authenticated | Guest | Unresolved
//! Authenticated/Guest --SignedOut--> SignedOut
//! any --SignedIn--> Authenticated (full connection reset)
//! any --Unload--> connection torn down, state unchanged
//! ```

use crate::auth::AuthProvider;
use crate::error::SessionResult;
use crate::marker::GuestMarker;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tradedesk_core::{Identity, IdentityId, IdentityKind};
use tradedesk_store::{StoreError, WatchlistStore};

/// Where the session is in its identity lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unresolved,
    Guest(IdentityId),
    Authenticated(IdentityId),
    SignedOut,
}

impl SessionState {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Guest(id) => Some(Identity::guest(id.clone())),
            Self::Authenticated(id) => Some(Identity::user(id.clone())),
            Self::Unresolved | Self::SignedOut => None,
        }
    }
}

/// Auth-side events the binding reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A user signed in; the provider is queried for the id.
    SignedIn,
    SignedOut,
    /// The process is going away.
    Unload,
}

/// Couples identity changes to the store lifecycle.
pub struct SessionBinding {
    store: Arc<WatchlistStore>,
    auth: Arc<dyn AuthProvider>,
    guests: Arc<dyn GuestMarker>,
    state: RwLock<SessionState>,
}

impl SessionBinding {
    pub fn new(
        store: Arc<WatchlistStore>,
        auth: Arc<dyn AuthProvider>,
        guests: Arc<dyn GuestMarker>,
    ) -> Self {
        Self {
            store,
            auth,
            guests,
            state: RwLock::new(SessionState::Unresolved),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    /// Resolve the startup identity: auth provider first, then guest marker.
    pub async fn resolve(&self) -> SessionResult<SessionState> {
        match self.auth.current_user().await {
            Ok(Some(id)) => {
                self.bind(Identity::user(id), false).await?;
                return Ok(self.state());
            }
            Ok(None) => debug!("No signed-in user"),
            Err(e) => warn!(error = %e, "User lookup failed, trying guest session"),
        }

        if let Some(id) = self.guests.guest_id()? {
            self.bind(Identity::guest(id), false).await?;
        } else {
            info!("No identity resolved");
        }
        Ok(self.state())
    }

    /// Start (or resume) a guest session and bind it.
    pub async fn start_guest(&self) -> SessionResult<Identity> {
        let identity = Identity::guest(self.guests.start_guest()?);
        self.bind(identity.clone(), false).await?;
        Ok(identity)
    }

    /// React to one auth event.
    pub async fn handle(&self, event: AuthEvent) -> SessionResult<()> {
        match event {
            AuthEvent::SignedOut => {
                self.sign_out();
                Ok(())
            }
            AuthEvent::SignedIn => match self.auth.current_user().await? {
                Some(id) => self.bind(Identity::user(id), true).await,
                None => {
                    warn!("Sign-in event without a user");
                    Ok(())
                }
            },
            AuthEvent::Unload => {
                self.store.teardown_connection();
                Ok(())
            }
        }
    }

    /// Process events until the channel closes or an unload arrives.
    pub async fn run(&self, mut events: mpsc::Receiver<AuthEvent>) {
        while let Some(event) = events.recv().await {
            let unload = event == AuthEvent::Unload;
            if let Err(e) = self.handle(event).await {
                warn!(error = %e, "Session event failed");
            }
            if unload {
                break;
            }
        }
        debug!("Session event loop stopped");
    }

    fn sign_out(&self) {
        let previous = self.state();
        self.store.teardown_connection();
        self.store.set_identity(None);
        self.store.clear();
        if matches!(previous, SessionState::Guest(_)) {
            if let Err(e) = self.guests.clear() {
                warn!(error = %e, "Failed to clear guest marker");
            }
        }
        *self.state.write() = SessionState::SignedOut;
        info!("Signed out");
    }

    /// Bind `identity` to the store.
    ///
    /// A different identity (or `reset`) tears the connection down and
    /// drops the in-memory list first. When no connection exists
    /// afterwards, connect and then load.
    async fn bind(&self, identity: Identity, reset: bool) -> SessionResult<()> {
        let changed = self.store.identity().as_ref() != Some(&identity);
        if changed || reset {
            self.store.teardown_connection();
            self.store.clear();
        }

        self.store.set_identity(Some(identity.clone()));
        *self.state.write() = match identity.kind {
            IdentityKind::Guest => SessionState::Guest(identity.id.clone()),
            IdentityKind::User => SessionState::Authenticated(identity.id.clone()),
        };
        info!(identity = %identity, "Session bound");

        if self.store.has_connection() {
            return Ok(());
        }

        self.store.initialize_connection().await;
        match self.store.load_tracked_symbols().await {
            Ok(_) => Ok(()),
            Err(StoreError::Superseded) => {
                debug!(identity = %identity, "Load superseded by a newer identity");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
