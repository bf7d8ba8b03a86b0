//! tradedesk terminal watchlist.
//!
//! Wires the gateway client, feed relay, persistence backends, watchlist
//! store and session binding into one application:
//! - Interactive `watch` loop with live repaint on ticks
//! - One-shot `add` / `remove` / `list` commands
//! - Periodic metrics summary in the log

pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod view;

pub use app::{Application, Flow};
pub use command::Command;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
