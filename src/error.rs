use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("level {level} has no DIM line")]
    MissingDimensions { level: String },

    #[error("level {level} has invalid dimensions {height}x{width}")]
    InvalidDimensions {
        level: String,
        height: i64,
        width: i64,
    },

    #[error("level {level} is {height}x{width}, limit is {limit} per side")]
    DimensionsTooLarge {
        level: String,
        height: i64,
        width: i64,
        limit: usize,
    },

    #[error("{entity} has {count} commands, limit is {limit}")]
    TooManyCommands {
        entity: String,
        count: usize,
        limit: usize,
    },

    #[error("level {level} declares {count} ghosts, limit is {limit}")]
    TooManyGhosts {
        level: String,
        count: usize,
        limit: usize,
    },

    #[error("level {level} declares more than one pacman")]
    MultiplePacmen { level: String },

    #[error("{entity} cannot be placed at row {y}, column {x}")]
    InvalidPosition { entity: String, x: i32, y: i32 },

    #[error("level {level} has no free cell for pacman")]
    NoFreeCell { level: String },

    #[error("no .lvl files found in {dir}")]
    NoLevels { dir: PathBuf },

    #[error("{dir} holds {count} levels, limit is {limit}")]
    TooManyLevels {
        dir: PathBuf,
        count: usize,
        limit: usize,
    },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to start duplicate session: {0}")]
    Spawn(#[source] io::Error),

    #[error("duplicate session {generation} panicked")]
    DuplicatePanicked { generation: u64 },

    #[error(transparent)]
    Level(#[from] LevelError),
}
