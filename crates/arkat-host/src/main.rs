//! Arkat - Headless host entry point
//!
//! Replays a script of tracking frames and lifecycle signals through the
//! reference-image trigger and overlay pipeline.

mod config;
mod host;
mod script;
mod sim;

use anyhow::Result;
use arkat_session::CancellationToken;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "arkat")]
#[command(about = "Anchors a chroma-keyed video overlay to a recognized reference image")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "arkat.toml")]
    config: PathBuf,

    /// Replay script (JSON lines of frames and lifecycle signals)
    #[arg(short, long, default_value = "frames.jsonl")]
    script: PathBuf,

    /// Asset directory (overrides the configuration file)
    #[arg(short, long)]
    assets: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file to --config and exit
    #[arg(long)]
    write_default_config: bool,
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

    info!("Arkat v{}", env!("CARGO_PKG_VERSION"));

    if args.write_default_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    if let Some(assets) = args.assets {
        config.assets.path = assets;
    }

    info!(
        target_name = %config.target.name,
        image = %config.target.image,
        width_m = config.target.width_m,
        media = %config.overlay.media,
        "Configuration loaded"
    );

    let script = script::load_script(&args.script)?;
    info!(path = %args.script.display(), entries = script.len(), "Loaded replay script");

    // Ctrl-C tears the host down
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.cancel(),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let summary = host::run(&config, script, cancel).await?;

    println!("Session summary:");
    println!("  configured:     {}", summary.configured);
    println!("  frames:         {}", summary.frames);
    println!("  overlays:       {}", summary.spawned);
    println!("  spawn failures: {}", summary.spawn_failures);
    println!("  backgrounded:   {}", summary.backgrounded);
    println!("  destroyed:      {}", summary.destroyed);

    Ok(())
}
