use std::path::PathBuf;

use clap::Args;

use crate::constants::{MAX_COMMANDS_PER_ACTOR, MAX_DIMENSION, MAX_GHOSTS, MAX_LEVELS};
use crate::orchestrator::RoundOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_commands: usize,
    pub max_ghosts: usize,
    pub max_levels: usize,
    /// Largest accepted board height or width.
    pub max_dimension: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_commands: MAX_COMMANDS_PER_ACTOR,
            max_ghosts: MAX_GHOSTS,
            max_levels: MAX_LEVELS,
            max_dimension: MAX_DIMENSION,
        }
    }
}

/// Command-line flags shared by both binaries.
#[derive(Args, Clone, Debug)]
pub struct GameArgs {
    /// Directory holding the `.lvl` files and their entity files.
    pub level_dir: PathBuf,
    #[arg(long)]
    pub seed: Option<u32>,
    #[arg(long, default_value_t = MAX_COMMANDS_PER_ACTOR)]
    pub max_commands: usize,
    #[arg(long, default_value_t = MAX_GHOSTS)]
    pub max_ghosts: usize,
    #[arg(long, default_value_t = MAX_LEVELS)]
    pub max_levels: usize,
    #[arg(long, default_value_t = MAX_DIMENSION)]
    pub max_dimension: usize,
    /// Give up rewinding to the last save after this many deaths.
    #[arg(long)]
    pub rollback_limit: Option<u32>,
    /// End each level attempt as a quit after this many render ticks.
    #[arg(long)]
    pub tick_limit: Option<u64>,
    /// Append structured log lines to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub level_dir: PathBuf,
    pub seed: u32,
    pub limits: Limits,
    pub rollback_limit: Option<u32>,
    pub round: RoundOptions,
    /// Pause on level-complete and end banners.
    pub banner_hold_ms: u64,
}

impl GameConfig {
    pub fn new(level_dir: PathBuf, seed: u32) -> Self {
        Self {
            level_dir,
            seed,
            limits: Limits::default(),
            rollback_limit: None,
            round: RoundOptions::default(),
            banner_hold_ms: 0,
        }
    }
}

impl GameArgs {
    pub fn to_config(&self, banner_hold_ms: u64) -> GameConfig {
        GameConfig {
            level_dir: self.level_dir.clone(),
            seed: self.seed.unwrap_or_else(rand::random),
            limits: Limits {
                max_commands: self.max_commands,
                max_ghosts: self.max_ghosts,
                max_levels: self.max_levels,
                max_dimension: self.max_dimension,
            },
            rollback_limit: self.rollback_limit,
            round: RoundOptions {
                tick_limit: self.tick_limit,
            },
            banner_hold_ms,
        }
    }
}
