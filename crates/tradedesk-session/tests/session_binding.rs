//! Identity transitions against a real store.

mod common;

use axum::{http::HeaderMap, http::StatusCode, routing::get, Json, Router};
use common::Fixture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tradedesk_core::IdentityId;
use tradedesk_persistence::RowStore;
use tradedesk_session::{
    AuthEvent, AuthProvider, GuestMarker, MemoryGuestMarker, RestAuthProvider, SessionBinding,
    SessionState, StaticAuthProvider,
};

fn id(raw: &str) -> IdentityId {
    IdentityId::new(raw).unwrap()
}

fn binding(
    fixture: &Fixture,
    auth: Arc<StaticAuthProvider>,
    guests: Arc<MemoryGuestMarker>,
) -> SessionBinding {
    SessionBinding::new(fixture.store.clone(), auth, guests)
}

#[tokio::test]
async fn test_resolve_authenticated_connects_then_loads() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["AMZN", "ZZZZ", "TSLA"]).await;
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = binding(&fixture, auth, Arc::new(MemoryGuestMarker::new()));

    let state = session.resolve().await.unwrap();

    assert_eq!(state, SessionState::Authenticated(id("user-1")));
    assert_eq!(fixture.relays.created(), 1);
    assert_eq!(fixture.symbols(), vec!["AMZN", "TSLA"]);
    assert_eq!(
        fixture.relays.relay(0).subscribed(),
        vec!["AMZN".to_string(), "TSLA".to_string()]
    );
}

#[tokio::test]
async fn test_resolve_falls_back_to_guest_marker() {
    let fixture = Fixture::new();
    let guests = Arc::new(MemoryGuestMarker::new());
    let guest_id = guests.start_guest().unwrap();
    let session = binding(&fixture, Arc::new(StaticAuthProvider::default()), guests);

    let state = session.resolve().await.unwrap();

    assert_eq!(state, SessionState::Guest(guest_id));
    assert!(fixture.store.identity().unwrap().is_guest());
    assert!(fixture.store.has_connection());
}

#[tokio::test]
async fn test_resolve_without_identity_stays_unresolved() {
    let fixture = Fixture::new();
    let session = binding(
        &fixture,
        Arc::new(StaticAuthProvider::default()),
        Arc::new(MemoryGuestMarker::new()),
    );

    let state = session.resolve().await.unwrap();

    assert_eq!(state, SessionState::Unresolved);
    assert_eq!(fixture.relays.created(), 0);
    assert!(fixture.store.identity().is_none());
}

#[tokio::test]
async fn test_sign_out_clears_list_and_connection() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["AMZN"]).await;
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = binding(&fixture, auth, Arc::new(MemoryGuestMarker::new()));
    session.resolve().await.unwrap();

    session.handle(AuthEvent::SignedOut).await.unwrap();

    assert_eq!(session.state(), SessionState::SignedOut);
    assert!(fixture.store.is_empty());
    assert!(!fixture.store.has_connection());
    assert!(fixture.store.identity().is_none());
    assert_eq!(fixture.relays.relay(0).closes(), 1);
}

#[tokio::test]
async fn test_guest_sign_out_forgets_marker() {
    let fixture = Fixture::new();
    let guests = Arc::new(MemoryGuestMarker::new());
    let session = binding(
        &fixture,
        Arc::new(StaticAuthProvider::default()),
        guests.clone(),
    );
    session.start_guest().await.unwrap();

    session.handle(AuthEvent::SignedOut).await.unwrap();

    assert!(guests.guest_id().unwrap().is_none());
}

#[tokio::test]
async fn test_sign_in_after_sign_out_rebuilds_connection() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-2", &["AAPL"]).await;
    let auth = Arc::new(StaticAuthProvider::default());
    let session = binding(&fixture, auth.clone(), Arc::new(MemoryGuestMarker::new()));
    session.start_guest().await.unwrap();
    session.store().add_tracked("NVDA").await.unwrap();
    session.handle(AuthEvent::SignedOut).await.unwrap();

    auth.sign_in(id("user-2"));
    session.handle(AuthEvent::SignedIn).await.unwrap();

    assert_eq!(session.state(), SessionState::Authenticated(id("user-2")));
    assert_eq!(fixture.relays.created(), 2);
    assert_eq!(fixture.symbols(), vec!["AAPL"]);
    assert_eq!(fixture.relays.relay(1).subscribed(), vec!["AAPL".to_string()]);
}

#[tokio::test]
async fn test_guest_to_user_resets_connection() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["TSLA"]).await;
    let auth = Arc::new(StaticAuthProvider::default());
    let session = binding(&fixture, auth.clone(), Arc::new(MemoryGuestMarker::new()));
    session.start_guest().await.unwrap();
    session.store().add_tracked("AMZN").await.unwrap();
    let guest_relay = fixture.relays.relay(0);

    auth.sign_in(id("user-1"));
    session.handle(AuthEvent::SignedIn).await.unwrap();

    assert_eq!(guest_relay.closes(), 1);
    assert_eq!(fixture.relays.created(), 2);
    assert_eq!(fixture.symbols(), vec!["TSLA"]);

    guest_relay.inject_trade("AMZN", 500.0);
    assert!(fixture.store.snapshot().iter().all(|e| e.symbol().as_str() != "AMZN"));
}

#[tokio::test]
async fn test_repeated_sign_in_same_user_still_resets() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["AMZN"]).await;
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = binding(&fixture, auth, Arc::new(MemoryGuestMarker::new()));
    session.resolve().await.unwrap();

    session.handle(AuthEvent::SignedIn).await.unwrap();

    assert_eq!(fixture.relays.created(), 2);
    assert_eq!(fixture.relays.relay(0).closes(), 1);
    assert_eq!(fixture.symbols(), vec!["AMZN"]);
    assert_eq!(fixture.relays.relay(1).subscribed(), vec!["AMZN".to_string()]);
}

#[tokio::test]
async fn test_unload_tears_down_regardless_of_state() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["AMZN"]).await;
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = binding(&fixture, auth, Arc::new(MemoryGuestMarker::new()));
    session.resolve().await.unwrap();

    session.handle(AuthEvent::Unload).await.unwrap();

    assert!(!fixture.store.has_connection());
    assert_eq!(session.state(), SessionState::Authenticated(id("user-1")));
    assert_eq!(fixture.symbols(), vec!["AMZN"]);

    // Unresolved session: still safe
    let idle = Fixture::new();
    let idle_session = binding(
        &idle,
        Arc::new(StaticAuthProvider::default()),
        Arc::new(MemoryGuestMarker::new()),
    );
    idle_session.handle(AuthEvent::Unload).await.unwrap();
    assert_eq!(idle_session.state(), SessionState::Unresolved);
}

#[tokio::test]
async fn test_rebind_after_unload_subscribes_each_symbol_once() {
    let fixture = Fixture::new();
    fixture.seed_rows("user-1", &["AMZN", "TSLA"]).await;
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = binding(&fixture, auth, Arc::new(MemoryGuestMarker::new()));
    session.resolve().await.unwrap();
    session.handle(AuthEvent::Unload).await.unwrap();

    // Deleted from another device while this session was away.
    fixture.rows.delete(&id("user-1"), "TSLA").await.unwrap();
    session.resolve().await.unwrap();

    let relay = fixture.relays.relay(1);
    assert_eq!(
        relay.subscribed(),
        vec!["AMZN".to_string(), "TSLA".to_string()]
    );
    assert_eq!(relay.unsubscribed(), vec!["TSLA".to_string()]);
    assert_eq!(fixture.symbols(), vec!["AMZN"]);
}

#[tokio::test]
async fn test_run_stops_on_unload() {
    let fixture = Fixture::new();
    let auth = Arc::new(StaticAuthProvider::new(Some(id("user-1"))));
    let session = Arc::new(binding(&fixture, auth, Arc::new(MemoryGuestMarker::new())));
    session.resolve().await.unwrap();

    let (tx, rx) = mpsc::channel(8);
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run(rx).await })
    };

    tx.send(AuthEvent::SignedOut).await.unwrap();
    tx.send(AuthEvent::Unload).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("run loop exits")
        .unwrap();
    assert_eq!(session.state(), SessionState::SignedOut);
}

// ============================================================================
// REST auth provider against a fake auth service
// ============================================================================

async fn user_handler(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match bearer {
        "Bearer good-token" => Ok(Json(serde_json::json!({ "id": "user-42" }))),
        "Bearer broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn start_auth_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/auth/v1/user", get(user_handler));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_rest_auth_provider_user_lookup() {
    let url = start_auth_service().await;
    let auth = RestAuthProvider::new(
        &url,
        "anon",
        Some("good-token".to_string()),
        Duration::from_secs(2),
    )
    .unwrap();

    assert_eq!(auth.current_user().await.unwrap(), Some(id("user-42")));

    auth.set_access_token(Some("expired".to_string()));
    assert_eq!(auth.current_user().await.unwrap(), None);

    auth.set_access_token(Some("broken".to_string()));
    assert!(auth.current_user().await.is_err());
}
