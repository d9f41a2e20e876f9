//! # Revenda — automation scheduler daemon
//!
//! Long-lived background process for the Revenda back office. Wakes at
//! the campaign schedule times (civil GMT-3), deactivates lapsed
//! subscriptions, and dispatches due campaign payloads to the
//! automation webhook.
//!
//! Usage:
//!   revenda                        # Run with ~/.revenda/config.toml
//!   revenda --config ./dev.toml    # Explicit config file
//!   revenda --db ./panel.db        # Override the database path

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use revenda_core::{RevendaConfig, SqliteStorage};
use revenda_scheduler::{clock, Scheduler, SystemClock, WebhookDispatcher};

#[derive(Parser)]
#[command(name = "revenda", version, about = "Revenda automation scheduler")]
struct Cli {
    /// Config file (default: ~/.revenda/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path (overrides the config file)
    #[arg(long)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "revenda=debug,revenda_scheduler=debug,revenda_core=debug"
    } else {
        "revenda=info,revenda_scheduler=info,revenda_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            RevendaConfig::load_from(Path::new(&path))?
        }
        None => RevendaConfig::load()?,
    };

    let db_path = cli
        .db
        .map(|p| shellexpand::tilde(&p).to_string())
        .unwrap_or_else(|| config.db_path.clone());
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = Arc::new(SqliteStorage::open(Path::new(&db_path))?);
    tracing::info!("database: {db_path}");

    let fallback_wake_times = config
        .scheduler
        .fallback_wake_times
        .iter()
        .filter_map(|s| match clock::parse_hhmm(s) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!("ignoring fallback wake time: {e}");
                None
            }
        })
        .collect();

    let scheduler = Scheduler::new(
        storage,
        Arc::new(WebhookDispatcher::new(config.webhook.timeout_secs)),
        Arc::new(SystemClock),
        fallback_wake_times,
    );
    let handle = scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    handle.stop().await;
    Ok(())
}
