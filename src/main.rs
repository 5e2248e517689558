//! Camera streamer: captures JPEG frames and streams them to the collector

use anyhow::{Context, Result};
use camstream::camera;
use camstream::config::Config;
use camstream::connection::ConnectionManager;
use camstream::streamer::{FrameStreamer, StreamerConfig, SystemClock};
use camstream::transport::TcpTransport;
use clap::Parser;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "camstream")]
#[command(about = "Capture JPEG frames and stream them to a fixed collector over TCP")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "camstream.toml")]
    config: String,

    /// Collector host (overrides network.host)
    #[arg(long)]
    host: Option<String>,

    /// Collector port (overrides network.port)
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = if Path::new(&cli.config).exists() {
        info!(config_path = %cli.config, "Loading configuration");
        Config::load(&cli.config).with_context(|| format!("loading {}", cli.config))?
    } else {
        info!(config_path = %cli.config, "Configuration file not found, using defaults");
        Config::default()
    };

    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    config.validate()?;

    // Camera failure is not fatal: capture will simply never produce a frame
    let camera = camera::initialize_or_unavailable(&config.camera);

    let transport = TcpTransport::from_config(&config.network);
    let connection = ConnectionManager::new(transport, config.network.endpoint());

    let mut streamer = FrameStreamer::new(
        connection,
        camera,
        SystemClock,
        StreamerConfig::from(&config),
    );

    streamer.run()
}
