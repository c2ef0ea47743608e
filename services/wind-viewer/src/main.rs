//! Wind viewer.
//!
//! Headless host for the particle animator: sets up a viewport, steps through
//! the requested datasets with animated transitions and writes a PNG
//! snapshot of the surface for each one.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use animator::{AnimatorHandle, AnimatorState, ParticleAnimator};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use transition::{CoordinatorHandle, SourceConfig};

use crate::config::ViewerConfig;

#[derive(Parser, Debug)]
#[command(name = "wind-viewer")]
#[command(about = "Animate wind datasets and export frames as PNG")]
struct Args {
    /// Dataset keys to show, in order
    #[arg(required = true)]
    keys: Vec<String>,

    /// YAML configuration file
    #[arg(short, long, env = "WIND_VIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Read datasets from `<dir>/<key>.json`, overriding the configured source
    #[arg(long, env = "WIND_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory for exported frames
    #[arg(short, long, env = "WIND_OUTPUT_DIR", default_value = "frames")]
    output_dir: PathBuf,

    /// How long to animate each dataset before taking its snapshot
    #[arg(long, default_value = "3000")]
    hold_ms: u64,

    /// Give up waiting for a dataset after this long
    #[arg(long, default_value = "60")]
    wait_secs: u64,

    /// Build fields inline instead of on the background worker
    #[arg(long)]
    no_worker: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = ViewerConfig::load(args.config.as_deref())?;
    if args.no_worker {
        config.animator.use_worker = false;
    }
    if let Some(dir) = &args.data_dir {
        config.source = SourceConfig::File { dir: dir.clone() };
    }

    info!(
        keys = args.keys.len(),
        width = config.viewport.width,
        height = config.viewport.height,
        zoom = config.viewport.zoom,
        "Starting wind viewer"
    );

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let keys = config.animator.vector_keys.clone();
    let animator = ParticleAnimator::new(config.animator.clone())?;
    let handle = AnimatorHandle::spawn(animator);
    handle.draw_layer(config.viewport, args.no_worker)?;

    let source = config.source.build()?;
    let coordinator = CoordinatorHandle::spawn(
        Arc::new(handle.clone()),
        source,
        keys,
        config.transition.clone(),
    )?;

    let wait = Duration::from_secs(args.wait_secs);
    for (index, key) in args.keys.iter().enumerate() {
        let before = coordinator.status().applied;
        coordinator.goto(Some(key.as_str()))?;

        let settled = tokio::time::timeout(
            wait,
            coordinator.wait_until(|s| s.applied > before && !s.playing),
        )
        .await;
        match settled {
            Ok(status) => {
                let status = status?;
                info!(key = %key, dtg = ?status.current_dtg, "Dataset shown");
            }
            Err(_) => {
                warn!(key = %key, "Dataset did not arrive in time, keeping previous frame");
            }
        }

        if tokio::time::timeout(wait, handle.wait_for_state(AnimatorState::Running))
            .await
            .is_err()
        {
            warn!(key = %key, "Animator is not running, snapshot may be blank");
        }
        tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;

        let png = handle.snapshot().await?;
        let path = args.output_dir.join(format!("{:03}_{}.png", index, key));
        tokio::fs::write(&path, &png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = png.len(), "Wrote frame");
    }

    let status = handle.status().await?;
    info!(
        frames = status.frames,
        particles = status.particles,
        "Animation finished"
    );

    coordinator.shutdown().await?;
    handle.shutdown().await?;
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if args.log_json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
