// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! HelioWatch - Space-Weather Threat Monitor
//!
//! Polls the NOAA space-weather feeds, classifies the current threat level
//! and streams updates to every connected WebSocket viewer. Viewers can
//! inject simulated events for demonstration.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use heliowatch::alerts::AlertDispatcher;
use heliowatch::{Config, HybridEngine, NoaaGateway, Scheduler, WebSocketServer, VERSION};

/// HelioWatch - Space-Weather Threat Monitor
#[derive(Parser, Debug)]
#[command(name = "heliowatch")]
#[command(author = "HelioWatch Project")]
#[command(version = VERSION)]
#[command(about = "Live space-weather threat classification and streaming")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// WebSocket server port
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket bind address
    #[arg(long)]
    bind: Option<String>,

    /// MQTT broker address for alerts
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Webhook URL for alerts (repeatable)
    #[arg(long)]
    webhook: Vec<String>,

    /// Disable alert dispatch
    #[arg(long)]
    no_alerts: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging: flags, then RUST_LOG, then the config file
    let filter = if args.trace {
        EnvFilter::new("trace")
    } else if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("☀️ HelioWatch v{} - Space-Weather Threat Monitor", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if let Some(port) = args.port {
        config.streaming.websocket_port = port;
    }
    if let Some(bind) = args.bind {
        config.streaming.bind_address = bind;
    }
    if let Some(mqtt) = args.mqtt_broker {
        config.alerts.mqtt_enabled = true;
        config.alerts.mqtt_broker = mqtt;
    }
    config.alerts.webhook_urls.extend(args.webhook);
    if args.no_alerts {
        config.alerts.enabled = false;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(config))
}

/// Run until Ctrl+C
async fn run_server(config: Config) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let gateway = Arc::new(NoaaGateway::new(config.upstream.clone())?);
    let engine = HybridEngine::new(config.detection.clone());
    let mut scheduler = Scheduler::new(config.scheduler.clone(), engine, gateway);

    if config.alerts.enabled {
        let (sender, dispatcher) = AlertDispatcher::from_config(&config.alerts).await?;
        info!("Alert dispatcher initialized with {} sink(s)", dispatcher.sink_count());
        tokio::spawn(dispatcher.run(shutdown_tx.subscribe()));
        scheduler = scheduler.with_alerts(sender);
    } else {
        info!("Alerts disabled");
    }

    let handle = scheduler.handle();
    let server = WebSocketServer::new(config.streaming.clone(), handle);
    server.start(shutdown_tx.subscribe()).await?;

    let scheduler_task = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    info!("🚀 HelioWatch running");
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    let _ = shutdown_tx.send(());
    scheduler_task.await?;

    info!("HelioWatch shutdown complete");

    Ok(())
}
