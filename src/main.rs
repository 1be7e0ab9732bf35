//! ==============================================================================
//! main.rs - dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the pieces together: loads configuration, builds the shared
//!     reading store, starts the serial ingestion thread, and serves the
//!     web dashboard until ctrl-c.
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                      dht-dashboard                       │
//!     │  ┌───────────────┐                  ┌────────────────┐   │
//!     │  │ serial thread │                  │  web server    │   │
//!     │  │ (100ms poll)  │                  │  (axum, tokio) │   │
//!     │  └───────┬───────┘                  └───────┬────────┘   │
//!     │          │ append                   snapshot │           │
//!     │          ▼                                   ▼           │
//!     │      ┌───────────────────────────────────────────┐       │
//!     │      │        ReadingStore (cap 50, FIFO)        │       │
//!     │      └───────────────────────────────────────────┘       │
//!     │                                 ▲                        │
//!     │                        ┌────────┴────────┐               │
//!     │                        │  RefreshCycle   │ <- /api/frame │
//!     │                        └─────────────────┘               │
//!     └──────────────────────────────────────────────────────────┘
//!
//! data path:
//!     device lines -> parser pairing -> store -> refresh frame -> browser.
//!     with no device attached the refresh cycle synthesizes its series, so
//!     the dashboard animates either way.
//!
//! ==============================================================================

mod config;
mod parser;
mod refresh;
mod serial;
mod server;
mod store;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::refresh::RefreshCycle;
use crate::server::ServerState;
use crate::store::ReadingStore;

/// live web dashboard for a serial-attached temperature/humidity sensor
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Bind address for the web server
    #[arg(long)]
    host: Option<String>,

    /// Port for the web server
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Path to a dashboard.toml config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // startup banner
    println!("===========================================================");
    println!("  Temperature & Humidity Dashboard");
    println!("===========================================================");

    // step 1: load configuration, CLI flags win over the file
    let mut config = match &args.config {
        Some(path) => config::DashConfig::load(path)?,
        None => config::DashConfig::load_or_default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    init_tracing(&config.logging.level);
    config.print_summary();

    // step 2: shared reading store, handed to both sides explicitly
    let store = ReadingStore::new();
    if config.store.seed_demo {
        store.seed_demo();
    }

    // step 3: serial ingestion thread. an unavailable device is reported
    // once; the dashboard still runs on synthesized data.
    let ingest = if config.serial.enabled {
        match serial::SerialIngest::spawn(&config.serial, store.clone()) {
            Ok(ingest) => {
                println!("[STARTUP] ✓ Serial ingestion running on {}", ingest.port_name());
                Some(ingest)
            }
            Err(e) => {
                tracing::error!(
                    error = %format!("{e:#}"),
                    "serial device unavailable, serving synthesized data"
                );
                None
            }
        }
    } else {
        tracing::info!("serial ingestion disabled by config");
        None
    };

    // step 4: web server, runs until ctrl-c
    let state = ServerState {
        store: store.clone(),
        refresh: Arc::new(RefreshCycle::new(store)),
        refresh_interval_ms: config.refresh.interval_ms,
    };

    println!(
        "[STARTUP] ✓ Dashboard live at http://{}:{}",
        config.server.host, config.server.port
    );
    server::serve(state, &config.server.host, config.server.port).await?;

    // step 5: shutdown. stop the ingestion loop and release the device.
    if let Some(ingest) = ingest {
        tracing::info!("stopping serial ingestion");
        ingest.stop();
    }
    println!("[SHUTDOWN] Dashboard stopped");

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
