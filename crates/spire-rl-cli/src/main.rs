//! Spire-RL runner
//!
//! Normally launched by the game's communication mod, in which case the
//! protocol runs over this process's stdin/stdout and all logging goes to a
//! file. Pass the game command after `--` to spawn it and use its pipes instead.

mod policy;

use anyhow::{Context, Result};
use clap::Parser;
use policy::GreedyPolicy;
use spire_bridge::{DEFAULT_QUEUE_CAPACITY, spawn_game, stdio_transport};
use spire_rl_core::{Policy, TerminationReason};
use spire_rl_env::{EngineConfig, Environment, SpireEnvironment};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "spire-rl",
    version,
    about = "Run Slay the Spire episodes through the RL environment"
)]
struct Args {
    /// JSON engine config; omitted fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file (stdout carries the game protocol)
    #[arg(long, default_value = "logs/spire_debug.log")]
    log_file: PathBuf,

    /// Episodes to play before exiting
    #[arg(short, long, default_value_t = 1)]
    episodes: u32,

    /// Step cap per episode
    #[arg(long, default_value_t = 5000)]
    max_steps: u64,

    #[arg(long)]
    character: Option<String>,

    #[arg(long)]
    ascension: Option<u32>,

    #[arg(long)]
    seed: Option<String>,

    /// Game command to spawn instead of talking over stdio
    #[arg(last = true)]
    game: Vec<String>,
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    if let Some(character) = &args.character {
        config.reset.character = character.to_lowercase();
    }
    if args.ascension.is_some() {
        config.reset.ascension = args.ascension;
    }
    if args.seed.is_some() {
        config.reset.seed = args.seed.clone();
    }
    Ok(config)
}

async fn run_episodes<E: Environment, P: Policy>(
    env: &mut E,
    policy: &mut P,
    episodes: u32,
    max_steps: u64,
) -> Result<()> {
    for episode in 1..=episodes {
        let mut outcome = env.reset().await.context("reset failed")?;
        let mut total = 0.0;
        let mut steps = 0u64;

        while !outcome.done && steps < max_steps {
            let action = policy.decide(&outcome.observation, &outcome.mask);
            outcome = env.step(action).await?;
            total += outcome.reward.value;
            steps += 1;
            if outcome.truncated {
                warn!(episode, steps, "Step truncated, continuing from last known state");
            }
        }

        info!(
            episode,
            steps,
            total_reward = total,
            reason = ?outcome.termination_reason,
            "Episode finished"
        );
        if outcome.termination_reason == Some(TerminationReason::ProcessGone) {
            warn!("Game exited, stopping early");
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    let config = load_config(&args)?;

    info!("Spire-RL starting ({} episodes)", args.episodes);

    let (transport, mut child) = match args.game.split_first() {
        Some((program, rest)) => {
            let (transport, child) = spawn_game(program, rest, DEFAULT_QUEUE_CAPACITY)?;
            (transport, Some(child))
        }
        None => (stdio_transport(DEFAULT_QUEUE_CAPACITY), None),
    };

    let mut env = SpireEnvironment::connect(transport, config).await;
    let mut policy = GreedyPolicy;
    let result = run_episodes(&mut env, &mut policy, args.episodes, args.max_steps).await;
    if let Err(e) = &result {
        error!("Run aborted: {:#}", e);
    }

    env.shutdown().await?;
    drop(env);
    if let Some(child) = child.as_mut() {
        if let Err(e) = child.kill().await {
            warn!("Failed to stop game process: {}", e);
        }
    }
    result
}
