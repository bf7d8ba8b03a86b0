//! Local gateway and feed servers for end-to-end tests.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tradedesk_app::AppConfig;

// ============================================================================
// Feed
// ============================================================================

/// Minimal live-feed server: records client frames, pushes server frames.
pub struct FeedServer {
    url: String,
    push_tx: broadcast::Sender<String>,
    received: Arc<Mutex<Vec<String>>>,
}

impl FeedServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (push_tx, _) = broadcast::channel::<String>(64);
        let received = Arc::new(Mutex::new(Vec::new()));

        let push = push_tx.clone();
        let recorded = received.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut push_rx = push.subscribe();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => recorded.lock().await.push(text),
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                _ => {}
                            },
                            frame = push_rx.recv() => match frame {
                                Ok(text) => {
                                    if write.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(_)) => {}
                                Err(broadcast::error::RecvError::Closed) => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            url,
            push_tx,
            received,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push_trade(&self, symbol: &str, price: f64) {
        let frame = json!({"type": "trade", "data": [{"s": symbol, "p": price, "t": 1, "v": 1}]});
        let _ = self.push_tx.send(frame.to_string());
    }

    /// Parsed client frames.
    pub async fn received(&self) -> Vec<serde_json::Value> {
        self.received
            .lock()
            .await
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Wait until a client frame with `kind` and `symbol` arrives.
    pub async fn wait_for(&self, kind: &str, symbol: &str) -> bool {
        for _ in 0..100 {
            let found = self
                .received()
                .await
                .iter()
                .any(|frame| frame["type"] == kind && frame["symbol"] == symbol);
            if found {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

// ============================================================================
// Gateway
// ============================================================================

#[derive(Clone)]
struct GatewayState {
    feed_url: String,
}

async fn bars(Query(params): Query<HashMap<String, String>>) -> Response {
    let close = match params.get("ticker").map(String::as_str) {
        Some("AMZN") => 100.0,
        Some("TSLA") => 200.0,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "No data found"})),
            )
                .into_response()
        }
    };
    Json(json!([
        {"time": 1770336000, "open": close, "high": close, "low": close, "close": close, "volume": 10}
    ]))
    .into_response()
}

async fn ticker_name(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("ticker").map(String::as_str) {
        Some("AMZN") => Json(json!({"name": "Amazon.com, Inc."})).into_response(),
        Some("TSLA") => Json(json!({"name": "Tesla, Inc."})).into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn discovery(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({"url": state.feed_url}))
}

/// Gateway whose discovery endpoint points at `feed_url`.
pub async fn start_gateway(feed_url: &str) -> String {
    let app = Router::new()
        .route("/api/yfinance", get(bars))
        .route("/api/ticker-name", get(ticker_name))
        .route("/api/wsfinnhub", get(discovery))
        .with_state(GatewayState {
            feed_url: feed_url.to_string(),
        });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Config pointing at local servers, with state under `dir`.
pub fn test_config(gateway: &str, dir: &Path, user: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.market.base_url = gateway.to_string();
    config.market.timeout_secs = 2;
    config.persistence.snapshot_dir = dir.join("snapshots");
    config.session.dir = dir.join("session");
    config.auth.user_id = user.map(str::to_string);
    config.telemetry.metrics_log_interval_secs = 0;
    config
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
