//! Prometheus metrics for tradedesk.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught at first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_int_gauge, Counter, CounterVec, IntGauge,
};
use serde::Serialize;

/// Open live-feed connections.
///
/// Raised once per opened socket and lowered once when that socket goes away.
pub static RELAY_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tradedesk_relay_open_connections",
        "Open live feed connections"
    )
    .unwrap()
});

/// Relay connection attempts.
/// Labels: outcome (opened/failed/discarded)
pub static RELAY_CONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradedesk_relay_connect_total",
        "Live feed connection attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Parsed feed frames.
/// Labels: kind (trade/ping/error/other)
pub static RELAY_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradedesk_relay_messages_total",
        "Live feed frames received",
        &["kind"]
    )
    .unwrap()
});

/// Feed frames that failed to parse.
pub static RELAY_PARSE_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tradedesk_relay_parse_failures_total",
        "Live feed frames dropped on parse failure"
    )
    .unwrap()
});

/// Listener callbacks that panicked during fan-out.
pub static LISTENER_PANICS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tradedesk_listener_panics_total",
        "Listener callbacks that panicked during fan-out"
    )
    .unwrap()
});

/// Ticks applied to tracked entries.
pub static TICKS_MERGED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tradedesk_ticks_merged_total",
        "Live ticks merged into tracked entries"
    )
    .unwrap()
});

/// Watchlist mutations.
/// Labels: action (added/removed)
pub static WATCHLIST_CHANGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradedesk_watchlist_changes_total",
        "Watchlist additions and removals",
        &["action"]
    )
    .unwrap()
});

/// User-facing notices.
/// Labels: level (success/error)
pub static NOTICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradedesk_notices_total",
        "User-facing notices published",
        &["level"]
    )
    .unwrap()
});

/// Current number of tracked symbols.
pub static TRACKED_SYMBOLS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tradedesk_tracked_symbols", "Symbols currently tracked").unwrap()
});

/// Point-in-time view of the headline counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub relay_connected: bool,
    pub relay_connections: i64,
    pub connects_opened: u64,
    pub connects_failed: u64,
    pub trade_frames: u64,
    pub parse_failures: u64,
    pub listener_panics: u64,
    pub ticks_merged: u64,
    pub symbols_added: u64,
    pub symbols_removed: u64,
    pub tracked_symbols: i64,
}

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    pub fn relay_opened() {
        RELAY_CONNECT_TOTAL.with_label_values(&["opened"]).inc();
        RELAY_CONNECTED.inc();
    }

    pub fn relay_connect_failed() {
        RELAY_CONNECT_TOTAL.with_label_values(&["failed"]).inc();
    }

    /// Connection completed after the owner already closed the relay.
    pub fn relay_connect_discarded() {
        RELAY_CONNECT_TOTAL.with_label_values(&["discarded"]).inc();
    }

    /// Pair with exactly one earlier [`Metrics::relay_opened`].
    pub fn relay_disconnected() {
        RELAY_CONNECTED.dec();
    }

    pub fn relay_message(kind: &str) {
        RELAY_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn relay_parse_failure() {
        RELAY_PARSE_FAILURES_TOTAL.inc();
    }

    pub fn listener_panic() {
        LISTENER_PANICS_TOTAL.inc();
    }

    pub fn ticks_merged(count: usize) {
        TICKS_MERGED_TOTAL.inc_by(count as f64);
    }

    pub fn symbol_added() {
        WATCHLIST_CHANGES_TOTAL.with_label_values(&["added"]).inc();
    }

    pub fn symbol_removed() {
        WATCHLIST_CHANGES_TOTAL.with_label_values(&["removed"]).inc();
    }

    pub fn notice(level: &str) {
        NOTICES_TOTAL.with_label_values(&[level]).inc();
    }

    pub fn tracked_symbols(count: usize) {
        TRACKED_SYMBOLS.set(count as i64);
    }

    /// Read the headline counters.
    pub fn summary() -> MetricsSummary {
        MetricsSummary {
            relay_connected: RELAY_CONNECTED.get() > 0,
            relay_connections: RELAY_CONNECTED.get(),
            connects_opened: RELAY_CONNECT_TOTAL.with_label_values(&["opened"]).get() as u64,
            connects_failed: RELAY_CONNECT_TOTAL.with_label_values(&["failed"]).get() as u64,
            trade_frames: RELAY_MESSAGES_TOTAL.with_label_values(&["trade"]).get() as u64,
            parse_failures: RELAY_PARSE_FAILURES_TOTAL.get() as u64,
            listener_panics: LISTENER_PANICS_TOTAL.get() as u64,
            ticks_merged: TICKS_MERGED_TOTAL.get() as u64,
            symbols_added: WATCHLIST_CHANGES_TOTAL.with_label_values(&["added"]).get() as u64,
            symbols_removed: WATCHLIST_CHANGES_TOTAL.with_label_values(&["removed"]).get() as u64,
            tracked_symbols: TRACKED_SYMBOLS.get(),
        }
    }
}
