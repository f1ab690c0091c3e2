//! Posebridge Daemon - Main entry point
//!
//! Feeds runtime device poses and button events to the body-tracking server
//! at a fixed tick rate.

mod config;
mod dry_run;
mod run;

use anyhow::{bail, Context, Result};
use clap::Parser;
use posebridge_core::{Bridge, Feeder, SimRuntime, Universe};
use posebridge_ipc::SocketBridge;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "posebridge")]
#[command(about = "Feeds tracked device poses to a body-tracking server")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "posebridge.toml")]
    config: PathBuf,

    /// Ticks per second
    #[arg(short, long)]
    tps: Option<u32>,

    /// Tracking universe (raw, seated, standing)
    #[arg(short, long)]
    universe: Option<Universe>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Scene file for the simulated runtime
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Log outgoing messages instead of connecting to the server
    #[arg(long)]
    dry_run: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
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
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("posebridge v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::Config::save_default(&args.config)
            .with_context(|| format!("writing {}", args.config.display()))?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    // Load configuration, command line wins over the file
    let mut config = config::load_config(&args.config)?;

    if let Some(tps) = args.tps {
        config.feeder.tps = tps;
    }
    if let Some(universe) = args.universe {
        config.feeder.universe = universe;
    }
    if let Some(scene) = args.scene {
        config.runtime.scene = Some(scene);
    }

    if config.feeder.tps == 0 {
        bail!("tps must be at least 1");
    }

    info!(
        tps = config.feeder.tps,
        universe = ?config.feeder.universe,
        socket = %config.bridge.socket.display(),
        "Configuration loaded"
    );

    let runtime = match &config.runtime.scene {
        Some(path) => SimRuntime::from_scene_file(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => {
            warn!("No scene configured, starting with an empty simulated runtime");
            SimRuntime::new()
        }
    };

    let bridge: Box<dyn Bridge> = if args.dry_run {
        info!("Dry run, messages are logged instead of sent");
        Box::new(dry_run::DryRunBridge::new())
    } else {
        Box::new(SocketBridge::new(config.to_bridge_config()))
    };

    let feeder = Feeder::setup(runtime, bridge, &config.to_feeder_config())
        .context("runtime setup failed")?;

    let stop = Arc::new(AtomicBool::new(false));
    run::install_stop_handler(stop.clone());

    let reason = run::run(feeder, config.feeder.tps, stop).await?;
    info!(reason = ?reason, "Shutting down");

    Ok(())
}
