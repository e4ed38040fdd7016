//! Set Simulator
//!
//! Runs a headless game between computer players and prints the standings.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_set::core::GameConfig;
use rust_set::display::TracingSink;
use rust_set::game::Game;
use rust_set::rules::FeatureOracle;

/// How often the runner checks the wall-clock limit.
const POLL: Duration = Duration::from_millis(50);

/// Headless Set game between computer players.
#[derive(Parser, Debug)]
#[command(name = "set-sim", version, about)]
struct Cli {
    /// TOML game configuration. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of computer players.
    #[arg(long)]
    computers: Option<usize>,

    /// Seed for the deck and the computer players.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Round length in milliseconds.
    #[arg(long)]
    round_millis: Option<u64>,

    /// Stop the game after this many seconds.
    #[arg(long)]
    max_seconds: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(?config, seed = cli.seed, "starting game");

    let oracle = Arc::new(FeatureOracle::new(config.set_size, config.feature_count));
    let game = Game::new(config, oracle, Arc::new(TracingSink), cli.seed)?;
    let handle = game.start()?;

    let started = Instant::now();
    let limit = cli.max_seconds.map(Duration::from_secs);
    while !handle.is_finished() {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            info!("time limit reached, terminating");
            handle.terminate();
            break;
        }
        thread::sleep(POLL);
    }

    let summary = handle.join()?;
    for (player, score) in summary.scores.iter() {
        println!("{player}: {score}");
    }
    let winners: Vec<String> = summary.winners.iter().map(ToString::to_string).collect();
    println!("Winners: {}", winners.join(", "));
    Ok(())
}

fn load_config(cli: &Cli) -> Result<GameConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            GameConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => GameConfig::default(),
    };

    if config.human_players > 0 {
        warn!(humans = config.human_players, "no input source for human players, running computers only");
    }
    let computers = cli.computers.unwrap_or(config.computer_players + config.human_players);
    config = config.with_players(0, computers);

    if let Some(millis) = cli.round_millis {
        let warning = config.turn_timeout_warning().min(Duration::from_millis(millis));
        config = config.with_turn_timeout(Duration::from_millis(millis), warning);
    }

    config.validate()?;
    Ok(config)
}
