//! Config sync agent.
//!
//! Keeps a local copy of the gateway's routing and plugin configuration in
//! step with the config authority over HTTP long-polling.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── config-sync ────────────────────────────┐
//!   │                                                                      │
//!   │  ┌────────────┐  listen   ┌──────────────┐  POST /configs/listener   │
//!   │  │            │──────────▶│              │──────────────────────────┼──▶ Config
//!   │  │ SyncEngine │  fetch    │ HttpTransport│  GET  /configs/fetch      │    Authority
//!   │  │            │──────────▶│              │──────────────────────────┼──▶
//!   │  └─────┬──────┘           └──────────────┘                           │
//!   │        │ publish                                                     │
//!   │        ▼                                                             │
//!   │  ┌────────────────────┐                                              │
//!   │  │ SubscriberRegistry │──▶ gateway runtime                           │
//!   │  └────────────────────┘                                              │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use config_sync::config::{load_config, validation::validate_config, SyncConfig};
use config_sync::model::DataGroup;
use config_sync::observability::{logging, metrics};
use config_sync::sync::{SubscriberRegistry, SyncEngine};

#[derive(Parser)]
#[command(name = "config-sync")]
#[command(about = "Synchronize gateway configuration from the config authority", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `http.url` (comma-delimited base URLs).
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => SyncConfig::default(),
    };
    if let Some(url) = args.url {
        config.http.url = url;
    }
    if let Err(errors) = validate_config(&config) {
        for e in errors {
            eprintln!("Invalid configuration: {}", e);
        }
        return ExitCode::FAILURE;
    }

    logging::init_logging(&config.observability);
    tracing::info!("config-sync v0.1.0 starting");

    tracing::info!(
        url = %config.http.url,
        delay_time_secs = config.http.delay_time,
        connection_timeout_secs = config.http.connection_timeout,
        listen_timeout_secs = config.http.listen_timeout,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(SubscriberRegistry::new());
    for group in DataGroup::ALL {
        registry.register_fn(group, |group, snapshot| {
            tracing::info!(
                group = %group,
                version = %snapshot.version,
                items = snapshot.items.len(),
                "Configuration updated"
            );
        });
    }

    let engine = match SyncEngine::new(&config.http, registry) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create sync engine");
            return ExitCode::FAILURE;
        }
    };
    let handle = engine.start();

    if let Err(e) = handle.wait_ready().await {
        tracing::error!(error = %e, "Gateway configuration unavailable, not ready");
        handle.stop().await;
        return ExitCode::FAILURE;
    }
    tracing::info!("Ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received");

    handle.stop().await;
    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
