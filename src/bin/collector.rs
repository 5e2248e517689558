//! Collector: receives length-prefixed JPEG records from a camera

use anyhow::Result;
use camstream::config::Config;
use camstream::Collector;
use clap::Parser;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "collector")]
#[command(about = "Receive JPEG frames streamed by camstream")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "camstream.toml")]
    config: String,

    /// Listen address (overrides collector.listen_address)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log frame statistics every N frames
    #[arg(long, default_value_t = 100)]
    stats_every: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = if Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let listen = cli
        .listen
        .unwrap_or_else(|| config.collector.listen_address.clone());

    let collector = Collector::bind(&listen, config.collector.max_frame_bytes).await?;
    let stats = collector.stats_handle();

    let (frame_tx, mut frame_rx) = mpsc::channel(8);
    let collector_task = tokio::spawn(async move {
        if let Err(e) = collector.run(frame_tx).await {
            error!(error = %e, "Collector failed");
        }
    });

    let stats_every = cli.stats_every.max(1);
    let consumer_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if (frame.seq + 1) % stats_every == 0 {
                let snapshot = stats.snapshot();
                info!(
                    frames = snapshot.frames_received,
                    invalid = snapshot.invalid_jpeg,
                    bytes = snapshot.bytes_received,
                    clients = snapshot.clients,
                    last_dimensions = ?frame.dimensions,
                    "Stats"
                );
            }
        }
    });

    info!("Collector running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    collector_task.abort();
    consumer_task.abort();

    Ok(())
}
