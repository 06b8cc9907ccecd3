//! # Telemetry Bridge
//!
//! Connects to the instrument (or the synthetic generator), sends the
//! start configuration once per opened connection, and logs the
//! normalized telemetry stream until interrupted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

mod config;
mod error;
mod protocol;
mod session;

use config::Config;
use session::events::{Event, EventKind};
use session::factory::create_session;

/// Configuration file consulted when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of records between telemetry log messages
const LOG_INTERVAL_RECORDS: u64 = 50;

/// Main entry point for Telemetry Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (explicit path, default file, or built-ins)
///    - Build the transport or synthetic session from configuration
///
/// 2. **Event wiring**
///    - `open`: request the start configuration (sampling frequency and
///      classification thresholds), sent exactly once per connection
///    - `status`/`error`: connection indicator logging
///    - `data`: periodic stream summary
///
/// 3. **Shutdown**
///    - Ctrl+C tears the session down and exits cleanly
///
/// # Errors
///
/// Returns error if an explicitly given configuration file cannot be
/// loaded. Link failures never abort the process; the session keeps
/// reconnecting until interrupted.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Telemetry Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let session = create_session(&config);

    // Start configuration, requested from the open callback so it is
    // re-sent after every reconnect (the session enforces once-per-
    // connection)
    let starter = Arc::clone(&session);
    session.on(EventKind::Open, Arc::new(move |_| {
        starter.send_start_once(json!({
            "freq": 1,
            "threshold": {"giallo": 2.5, "rosso": 5},
        }));
    }));

    session.on(EventKind::Status, Arc::new(|event| {
        if let Event::Status(status) = event {
            match &status.detail {
                Some(detail) => info!("Connection status: {:?} ({})", status.state, detail),
                None => info!("Connection status: {:?}", status.state),
            }
        }
    }));

    session.on(EventKind::Error, Arc::new(|event| {
        if let Event::Error(detail) = event {
            warn!("Link error: {}", detail);
        }
    }));

    let record_count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&record_count);
    session.on(EventKind::Data, Arc::new(move |event| {
        let Event::Data(record) = event else { return };
        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if count % LOG_INTERVAL_RECORDS == 0 {
            info!(
                "Received {} records (latest: speed={} position={},{} class={})",
                count,
                record.get("Speed").unwrap_or(&serde_json::Value::Null),
                record.get("Latitude").unwrap_or(&serde_json::Value::Null),
                record.get("Longitude").unwrap_or(&serde_json::Value::Null),
                record.get("EventClassText").unwrap_or(&serde_json::Value::Null),
            );
        }
    }));

    session.connect();
    info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    info!(
        "Total records received: {}",
        record_count.load(Ordering::Relaxed)
    );
    session.destroy();

    Ok(())
}

/// Resolve configuration: explicit path, the default file if present,
/// otherwise built-in defaults
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", path);
        return Ok(Config::load(&path)?);
    }
    if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
        info!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
        return Ok(Config::load(DEFAULT_CONFIG_PATH)?);
    }
    info!("No configuration file found, using defaults");
    Ok(Config::default())
}
