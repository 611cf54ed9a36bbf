//! sky-looper service.
//!
//! Follows GOES imagery and NEXRAD radar streams:
//! - Downloads new objects from the public NOAA buckets
//! - Reprojects and renders each one onto a fixed local map
//! - Keeps a rolling window on disk and purges what ages out
//! - Publishes numbered frame slots, a latest frame and looping animations

mod config;
mod scheduler;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::load_stream_configs;
use scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "sky-looper")]
#[command(about = "Rolling satellite and radar loops for a local area")]
struct Args {
    /// Configuration directory (contains streams/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Specific stream to run (default: all enabled)
    #[arg(short, long)]
    stream: Option<String>,

    /// Run one cycle per stream and exit (vs continuous polling)
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Download objects even if they are already on disk
    #[arg(long)]
    force_download: bool,

    /// Re-render frames that already exist
    #[arg(long)]
    force_regen: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!(config_dir = %args.config_dir.display(), "Starting sky-looper");

    if let Some(port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port, "Serving metrics");
    }

    let mut configs = load_stream_configs(&args.config_dir)?;
    if let Some(name) = &args.stream {
        configs.retain(|c| &c.stream.name == name);
        if configs.is_empty() {
            bail!("No enabled stream named '{}' in {}", name, args.config_dir.display());
        }
    }
    if configs.is_empty() {
        bail!("No enabled streams in {}", args.config_dir.display());
    }

    let mut scheduler = Scheduler::from_configs(
        &configs,
        &args.config_dir,
        args.force_download,
        args.force_regen,
    )?;

    if args.once {
        // Single run mode
        info!(streams = ?scheduler.stream_names(), "Running single cycle");
        for report in scheduler.run_once().await? {
            info!(
                stream = %report.stream,
                downloaded = report.downloaded,
                rendered = report.rendered,
                unparseable = report.unparseable,
                "Stream cycle finished"
            );
        }
    } else {
        // Continuous polling mode
        info!(streams = ?scheduler.stream_names(), "Starting continuous polling");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // Handle Ctrl+C
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await?;
    }

    info!("sky-looper stopped");
    Ok(())
}
