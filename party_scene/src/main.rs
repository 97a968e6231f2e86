//! party_scene: interactive entry point.

use std::path::PathBuf;

use clap::Parser;
use party_scene::{run, InputSource, RunOptions, SceneConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Hand-gesture driven birthday particle scene.
#[derive(Debug, Parser)]
#[command(name = "party_scene", version, about)]
struct Cli {
    /// TOML scene configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the layout seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Replay JSON-lines hand observations from a file, or `-` for stdin,
    /// instead of the keyboard simulation.
    #[arg(long, value_name = "PATH")]
    replay: Option<String>,

    /// Run this many frames without opening a window, logging progress.
    #[arg(long, value_name = "N")]
    headless_frames: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("party_scene=info,hand_gesture=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match SceneConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(error = %e, "invalid configuration");
                std::process::exit(1);
            }
        },
        None => SceneConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let input = match cli.replay {
        Some(path) => InputSource::Replay(path),
        None => InputSource::Keyboard,
    };
    match (&input, cli.headless_frames) {
        (_, Some(n)) => info!(frames = n, "running headless"),
        (InputSource::Keyboard, None) => {
            info!("keyboard simulation: F fist, O open, P pinch, H heart, N no hands, arrows move, Q quit")
        }
        (InputSource::Replay(path), None) => info!(%path, "opening visualizer window"),
    }

    let opts = RunOptions { input, headless_frames: cli.headless_frames };
    if let Err(e) = run(config, opts) {
        error!(error = %e, "party_scene failed");
        std::process::exit(1);
    }
}
