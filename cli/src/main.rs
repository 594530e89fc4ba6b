use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cascada_core::{
    Board, EngineState, Gate, GameEngine, GameMode, LevelConfig, LevelGenerator, LevelSource, RecordedEvent,
    TowerDefenseEngine,
};
use cascada_protocol::{LevelCatalog, MemoryStore, PlayerProgress, ProgressStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use script::*;

mod script;

#[derive(Parser, Debug)]
#[command(version, about = "Plays cascada levels from the terminal")]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a move script against a level
    Play {
        level: u32,

        /// Level file to look the level up in before generating it
        #[arg(long)]
        levels: Option<PathBuf>,

        /// Force a seed instead of the level's own
        #[arg(short, long)]
        seed: Option<u64>,

        /// Script with one `swap r1 c1 r2 c2` or `tap r c` per line
        #[arg(short, long)]
        moves: Option<PathBuf>,

        /// Print every event as a JSON line
        #[arg(long)]
        events: bool,

        /// Progress file to load the gate from and credit the reward to
        #[arg(long)]
        progress: Option<PathBuf>,
    },
    /// Print a level configuration as JSON
    Describe {
        level: u32,

        #[arg(long)]
        levels: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.verbose.log_level_filter().to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Play {
            level,
            levels,
            seed,
            moves,
            events,
            progress,
        } => {
            let mut config = level_config(level, levels.as_deref())?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let actions = match moves {
                Some(path) => parse_script(&read(&path)?)?,
                None => Vec::new(),
            };
            play(config, &actions, events, progress.as_deref())
        }
        Command::Describe { level, levels } => {
            let config = level_config(level, levels.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
}

/// Looks the level up in the level file, falling back to the generator.
fn level_config(level: u32, levels: Option<&Path>) -> Result<LevelConfig> {
    if let Some(path) = levels {
        let catalog = LevelCatalog::from_json(&read(path)?)
            .with_context(|| format!("Could not load levels from {}", path.display()))?;
        if let Some(config) = catalog.level_config(level) {
            return Ok(config);
        }
        log::info!("Level {level} is not in {}, generating it", path.display());
    }
    LevelGenerator
        .level_config(level)
        .context("Level numbers start at 1")
}

/// Either engine, picked by the level mode.
enum Game {
    Match(GameEngine),
    Defense(TowerDefenseEngine),
}

impl Game {
    fn new(config: LevelConfig, gate: Gate) -> Result<Self> {
        Ok(match config.mode {
            GameMode::TowerDefense => Self::Defense(TowerDefenseEngine::try_new(config, gate)?),
            GameMode::ScoreAccumulation | GameMode::ClearSpecialCells => Self::Match(GameEngine::try_new(config)?),
        })
    }

    fn apply(&mut self, action: Action) -> bool {
        match (self, action) {
            (Self::Match(engine), Action::Swap(from, to)) => engine.swap(from, to),
            (Self::Match(engine), Action::Tap(pos)) => engine.tap_block(pos),
            (Self::Defense(engine), Action::Swap(from, to)) => engine.swap(from, to),
            (Self::Defense(engine), Action::Tap(pos)) => engine.tap_block(pos),
        }
    }

    fn get_events(&mut self) -> Vec<RecordedEvent> {
        match self {
            Self::Match(engine) => engine.get_events(),
            Self::Defense(engine) => engine.get_events(),
        }
    }

    fn board(&self) -> &Board {
        match self {
            Self::Match(engine) => engine.board(),
            Self::Defense(engine) => engine.board(),
        }
    }

    fn state(&self) -> EngineState {
        match self {
            Self::Match(engine) => engine.state(),
            Self::Defense(engine) => engine.state(),
        }
    }

    fn score(&self) -> u32 {
        match self {
            Self::Match(engine) => engine.score(),
            Self::Defense(engine) => engine.score(),
        }
    }

    fn turns_remaining(&self) -> u32 {
        match self {
            Self::Match(engine) => engine.turns_remaining(),
            Self::Defense(engine) => engine.turns_remaining(),
        }
    }

    fn wallet_reward(&self) -> u32 {
        match self {
            Self::Match(engine) => engine.wallet_reward(),
            Self::Defense(engine) => engine.wallet_reward(),
        }
    }
}

fn play(config: LevelConfig, actions: &[Action], print_events: bool, progress_path: Option<&Path>) -> Result<()> {
    let mut store = match progress_path {
        Some(path) if path.exists() => MemoryStore::from_json(&read(path)?)?,
        _ => MemoryStore::new(),
    };
    let mut progress = store.load();

    let level = config.level;
    println!("Level {level}: {}", config.description());
    let mut game = Game::new(config, progress.gate())?;
    println!("{}", game.board());

    for (n, &action) in actions.iter().enumerate() {
        if game.state().is_finished() {
            log::warn!("Game is over, ignoring the remaining {} actions", actions.len() - n);
            break;
        }
        let accepted = game.apply(action);
        let events = game.get_events();
        println!(
            "{}: {action} {} ({} events)",
            n + 1,
            if accepted { "accepted" } else { "rejected" },
            events.len()
        );
        if print_events {
            for recorded in &events {
                println!("{}", serde_json::to_string(&recorded.event)?);
            }
        }
    }

    println!("{}", game.board());
    println!(
        "{:?}: score {}, {} turns left, reward {}",
        game.state(),
        game.score(),
        game.turns_remaining(),
        game.wallet_reward()
    );

    if let Some(path) = progress_path {
        credit(&mut progress, level, &game);
        store.save(&progress)?;
        fs::write(path, store.to_json()?).with_context(|| format!("Could not write {}", path.display()))?;
    }
    Ok(())
}

fn credit(progress: &mut PlayerProgress, level: u32, game: &Game) {
    if let Game::Defense(engine) = game {
        progress.store_gate(engine.gate());
    }
    if game.state().is_finished() {
        progress.complete_level(level, game.state().is_victory(), game.wallet_reward());
    }
}
