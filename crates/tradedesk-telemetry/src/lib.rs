//! Prometheus metrics and structured logging for tradedesk.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for relay traffic and watchlist activity

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_FILTER};
pub use metrics::{Metrics, MetricsSummary};
