// Push the process's own metrics to a remote-write endpoint until interrupted

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use promremote::config::ConfigBuilder;
use promremote::util::logging;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "promremote", about = "Push metrics via Prometheus remote_write")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the push interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,
}

fn register_metrics(registry: &Registry) -> Result<Gauge> {
    let build_info = GaugeVec::new(
        Opts::new("promremote_build_info", "Build information about promremote"),
        &["version"],
    )?;
    registry.register(Box::new(build_info.clone()))?;
    build_info.with_label_values(&[promremote::VERSION]).set(1.0);

    let uptime = Gauge::with_opts(Opts::new(
        "promremote_uptime_seconds",
        "Seconds since the exporter started",
    ))?;
    registry.register(Box::new(uptime.clone()))?;

    Ok(uptime)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigBuilder::new()
        .add_file(&args.config)
        .add_env("PROMREMOTE")
        .build()
        .with_context(|| format!("loading {}", args.config.display()))?;
    logging::init(config.log_level);

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.interval());

    let registry = Arc::new(Registry::new());
    let uptime = register_metrics(&registry)?;

    let client = config
        .into_client(Arc::clone(&registry))
        .context("creating remote_write client")?;
    client.run(interval)?;
    info!(
        "Pushing to {} every {:?} as instance={} job={}",
        client.endpoint(),
        interval,
        client.instance(),
        client.job()
    );

    let started = Instant::now();
    let mut refresh = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = refresh.tick() => uptime.set(started.elapsed().as_secs_f64()),
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Received stop signal, shutting down");
    client.stop();
    Ok(())
}
