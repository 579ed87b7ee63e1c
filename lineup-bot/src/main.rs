//! Lineup bot - main entry point
//!
//! Wires together configuration, storage, the command dispatcher, the
//! announcement sweep and the REST API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lineup_bot::dispatcher::{Dispatcher, OutboundMessage};
use lineup_common::config::Config;
use lineup_common::storage::{MemoryStorage, SqliteStorage, Storage};

/// Command-line arguments for lineup-bot
#[derive(Parser, Debug)]
#[command(name = "lineup-bot")]
#[command(about = "Chat-driven festival lineup manager")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "LINEUP_BOT_CONFIG")]
    config: PathBuf,

    /// Validate the config, print the lineup and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lineup_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    info!("using config {}", args.config.display());

    let storage: Arc<dyn Storage> = if args.check {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(
            SqliteStorage::open(std::path::Path::new(&config.database_path))
                .await
                .with_context(|| format!("opening database {}", config.database_path))?,
        )
    };

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel::<OutboundMessage>();
    let dispatcher = Arc::new(
        Dispatcher::new(config, storage, outbound_tx, Local::now())
            .await
            .context("initializing dispatcher")?,
    );

    if args.check {
        info!("Checked config: OK");
        println!("{}", dispatcher.lineup_report().await);
        return Ok(());
    }

    // The chat surface consumes outbound messages; until one is attached
    // they are drained to the log so the channel never backs up.
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            info!(
                user_id = message.user_id,
                "outbound: {}",
                message.text.trim_end()
            );
        }
    });

    dispatcher
        .broadcast_message(&format!(
            "✅ Restarted, schedule starts {}",
            dispatcher.config().schedule_start.format("%a %d %b %H:%M")
        ))
        .await;

    let sweeper = Arc::clone(&dispatcher);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            sweeper.sweep(Local::now()).await;
        }
    });

    if dispatcher.config().port != 0 {
        lineup_bot::server::start(Arc::clone(&dispatcher))
            .await
            .context("HTTP server")?;
    } else {
        info!("port is 0, skipping the REST API");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot install ctrl-c handler: {e}");
        }
    }

    info!("server exiting");
    Ok(())
}
