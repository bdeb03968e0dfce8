//! Ridewatch - live ride tracking service
//!
//! Tracks active rides: the driver streams location samples over HTTP and
//! every ride participant receives real-time events on a per-user MQTT
//! topic served by an embedded broker.
//!
//! Module structure:
//! - `domain/` - Core business types (TrackingSession, GeoPoint, Status)
//! - `io/` - External interfaces (HTTP API, MQTT push, ride directory)
//! - `services/` - Business logic (TrackingService, Store, Deviation, Sweeper)
//! - `infra/` - Infrastructure (Config, Errors, Broker)

use clap::Parser;
use ridewatch::infra::Config;
use ridewatch::io::{
    create_push_channel, InMemoryRideDirectory, LogSosAlerter, MqttPusher, NullNotifier, Notifier,
};
use ridewatch::services::deviation::NoopDetector;
use ridewatch::services::{TrackingService, TrackingStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Ridewatch - live ride tracking service
#[derive(Parser, Debug)]
#[command(name = "ridewatch", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("ridewatch starting");

    // Parse command line arguments using clap
    let args = Args::parse();

    // Load configuration from TOML file (needed for broker config)
    let config = Config::load_from_path(&args.config);

    // Start embedded MQTT broker with config
    ridewatch::infra::broker::start_embedded_broker(&config);

    info!(
        config_file = %config.config_file(),
        service_id = %config.service_id(),
        http_port = %config.http_port(),
        broker_port = %config.broker_port(),
        push_enabled = %config.push_enabled(),
        push_topic_prefix = %config.push_topic_prefix(),
        retention_terminal_days = %config.retention_terminal_days(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create push channel and MQTT publisher (if enabled)
    let notifier: Arc<dyn Notifier> = if config.push_enabled() {
        let (push_sender, push_rx) = create_push_channel(config.push_buffer());

        let pusher = MqttPusher::new(&config, push_rx);
        let pusher_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            pusher.run(pusher_shutdown).await;
        });

        Arc::new(push_sender)
    } else {
        Arc::new(NullNotifier)
    };

    // Ride directory, optionally seeded from a JSONL file
    let rides = Arc::new(InMemoryRideDirectory::new());
    if let Some(seed_file) = config.rides_seed_file() {
        if let Err(e) = rides.load_seed_file(seed_file) {
            tracing::error!(error = %e, seed_file = %seed_file, "ride_seed_failed");
        }
    }

    let store = Arc::new(TrackingStore::new());
    let service = Arc::new(TrackingService::new(
        store.clone(),
        notifier,
        rides,
        Arc::new(LogSosAlerter),
        Box::new(NoopDetector),
    ));

    // Start retention sweep for terminal sessions
    let sweep_store = store.clone();
    let sweep_interval = config.retention_sweep_interval_secs();
    let retention_ms = config.retention_window_ms();
    let sweep_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        ridewatch::services::sweeper::run_retention_sweep(
            sweep_store,
            sweep_interval,
            retention_ms,
            sweep_shutdown,
        )
        .await;
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run the HTTP API - blocks until shutdown
    ridewatch::io::start_http_server(
        config.http_bind_address(),
        config.http_port(),
        service,
        shutdown_rx,
    )
    .await?;

    info!("ridewatch shutdown complete");
    Ok(())
}
