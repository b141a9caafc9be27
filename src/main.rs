//! tengen: a parallel Monte-Carlo tree search Go engine.
//!
//! The binary speaks GTP on stdin/stdout. All engine behavior is configured
//! on the command line; diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use flexi_logger::Logger;

use tengen::constants::PURE_BOARD_SIZE;
use tengen::gtp::{EngineConfig, GtpEngine};
use tengen::uct::SearchMode;

/// Parallel MCTS Go engine speaking GTP.
#[derive(Parser)]
#[command(name = "tengen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Playouts per move (constant-playout mode)
    #[arg(long)]
    playout: Option<usize>,

    /// Total thinking time in seconds (time-setting mode)
    #[arg(long)]
    time: Option<f64>,

    /// Seconds per move (constant-time mode)
    #[arg(long)]
    const_time: Option<f64>,

    /// Board size
    #[arg(long, default_value_t = PURE_BOARD_SIZE)]
    size: usize,

    /// Worker threads
    #[arg(long, default_value_t = 1)]
    thread: usize,

    /// Komi
    #[arg(long, default_value_t = tengen::constants::KOMI)]
    komi: f64,

    /// Fixed handicap stones for testing
    #[arg(long, default_value_t = 0)]
    handicap: usize,

    /// Keep the reusable subtree between moves
    #[arg(long)]
    reuse_subtree: bool,

    /// Search on the opponent's time
    #[arg(long)]
    pondering: bool,

    /// Transposition-table size (power of two)
    #[arg(long)]
    tree_size: Option<usize>,

    /// Suppress diagnostic output
    #[arg(long)]
    no_debug: bool,

    /// Enforce positional super-ko
    #[arg(long)]
    superko: bool,

    /// Resign below this winrate
    #[arg(long)]
    resign: Option<f64>,

    /// CGOS mode: capture every dead stone before passing
    #[arg(long)]
    cgos: bool,

    /// Directory with simulation parameter files
    #[arg(long)]
    sim_params: Option<PathBuf>,

    /// Directory with search prior parameter files
    #[arg(long)]
    uct_params: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The handle must stay alive for the lifetime of the process.
    let _logger = Logger::try_with_env_or_str(if cli.no_debug { "warn" } else { "debug" })?
        .log_to_stderr()
        .start()?;

    let mut config = EngineConfig {
        size: cli.size,
        komi: cli.komi,
        superko: cli.superko,
        handicap: cli.handicap,
        threads: cli.thread.clamp(1, tengen::constants::THREAD_MAX),
        reuse_subtree: cli.reuse_subtree,
        pondering: cli.pondering,
        debug: !cli.no_debug,
        cgos: cli.cgos,
        sim_params_dir: cli.sim_params,
        uct_params_dir: cli.uct_params,
        ..EngineConfig::default()
    };

    if !(1..=PURE_BOARD_SIZE).contains(&cli.size) {
        bail!("board size must be between 1 and {PURE_BOARD_SIZE}");
    }
    if let Some(tree_size) = cli.tree_size {
        if tree_size == 0 || (tree_size & (tree_size - 1)) != 0 {
            bail!("tree size must be a power of two, got {tree_size}");
        }
        config.tree_size = tree_size;
    }
    if let Some(resign) = cli.resign {
        if !(0.0..=1.0).contains(&resign) {
            bail!("resign threshold must lie in [0, 1], got {resign}");
        }
        config.resign_threshold = resign;
    }

    // The last of --playout / --const-time / --time wins the mode.
    if let Some(playout) = cli.playout {
        config.mode = SearchMode::ConstPlayout;
        config.playout = playout;
    }
    if let Some(seconds) = cli.const_time {
        config.mode = SearchMode::ConstTime;
        config.const_thinking_time = seconds;
    }
    if let Some(seconds) = cli.time {
        config.mode = SearchMode::TimeSetting;
        config.total_time = seconds;
    }

    let mut engine = GtpEngine::new(config)?;
    engine.run();
    Ok(())
}
