//! tradedesk - terminal watchlist with live prices.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tradedesk_app::{AppConfig, Application, Command};

/// Terminal watchlist with live prices
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRADEDESK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Use a guest session instead of the configured user
    #[arg(long, global = true)]
    guest: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Watch the list update live (default)
    Watch,
    /// Track a symbol
    Add {
        #[arg(required = true, num_args = 1..)]
        symbol: Vec<String>,
    },
    /// Stop tracking a symbol
    Remove {
        #[arg(required = true, num_args = 1..)]
        symbol: Vec<String>,
    },
    /// Print the watchlist
    List,
    /// Start (or resume) a guest session
    Guest,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection
    tradedesk_relay::init_crypto();

    let args = Args::parse();

    tradedesk_telemetry::init_logging()?;

    info!("Starting tradedesk v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;

    let app = Application::new(config)?;

    match args.command.unwrap_or(Cmd::Watch) {
        Cmd::Watch => app.run_watch(args.guest).await?,
        Cmd::Add { symbol } => app.run_once(Command::Add(symbol.join(" ")), args.guest).await?,
        Cmd::Remove { symbol } => {
            app.run_once(Command::Remove(symbol.join(" ")), args.guest)
                .await?
        }
        Cmd::List => app.run_once(Command::List, args.guest).await?,
        Cmd::Guest => app.run_once(Command::Guest, true).await?,
    }

    Ok(())
}
