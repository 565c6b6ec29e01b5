use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::actor::{Actor, ActorState};
use crate::command::Command;
use crate::config::Limits;
use crate::constants::{derive_actor_seed, DEFAULT_TEMPO_MS, LEVEL_EXTENSION};
use crate::error::LevelError;
use crate::grid::{Board, Cell};
use crate::log::{EventLog, LogLevel};
use crate::types::{ActorId, Vec2};
use crate::world::LevelState;

/// Parsed `.lvl` file before its entity files are read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelLayout {
    pub name: String,
    pub tempo_ms: u64,
    pub board: Board,
    pub pacman_file: Option<String>,
    pub ghost_files: Vec<String>,
}

/// Parsed entity move file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityFile {
    pub passo: u32,
    pub position: Option<Vec2>,
    pub commands: Vec<Command>,
}

pub fn parse_level(name: &str, text: &str, limits: &Limits) -> Result<LevelLayout, LevelError> {
    let mut board: Option<Board> = None;
    let mut tempo_ms = DEFAULT_TEMPO_MS;
    let mut pacman_file = None;
    let mut ghost_files = Vec::new();
    let mut row = 0usize;

    for line in text.lines() {
        // A row of spaces is open floor, so only bare lines are skipped.
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("DIM") => {
                let height = parse_number(words.next());
                let width = parse_number(words.next());
                let (Some(height), Some(width)) = (height, width) else {
                    continue;
                };
                if height <= 0 || width <= 0 {
                    return Err(LevelError::InvalidDimensions {
                        level: name.to_string(),
                        height,
                        width,
                    });
                }
                if height as u64 > limits.max_dimension as u64
                    || width as u64 > limits.max_dimension as u64
                {
                    return Err(LevelError::DimensionsTooLarge {
                        level: name.to_string(),
                        height,
                        width,
                        limit: limits.max_dimension,
                    });
                }
                board = Some(Board::new(width as usize, height as usize));
                row = 0;
            }
            Some("TEMPO") => {
                if let Some(tempo) = parse_number(words.next()) {
                    tempo_ms = tempo.max(0) as u64;
                }
            }
            Some("PAC") => {
                let files: Vec<&str> = words.collect();
                if files.len() > 1 {
                    return Err(LevelError::MultiplePacmen {
                        level: name.to_string(),
                    });
                }
                pacman_file = files.first().map(|file| file.to_string());
            }
            Some("MON") => {
                ghost_files = words.map(str::to_string).collect();
                if ghost_files.len() > limits.max_ghosts {
                    return Err(LevelError::TooManyGhosts {
                        level: name.to_string(),
                        count: ghost_files.len(),
                        limit: limits.max_ghosts,
                    });
                }
            }
            _ => {
                let Some(board) = board.as_mut() else {
                    continue;
                };
                if row >= board.height {
                    continue;
                }
                for (x, glyph) in line.chars().take(board.width).enumerate() {
                    let idx = row * board.width + x;
                    board.cells[idx] = match glyph {
                        'X' => Cell::wall(),
                        '@' => Cell::portal(),
                        _ => Cell::floor(true),
                    };
                }
                row += 1;
            }
        }
    }

    let board = board.ok_or_else(|| LevelError::MissingDimensions {
        level: name.to_string(),
    })?;
    Ok(LevelLayout {
        name: name.to_string(),
        tempo_ms,
        board,
        pacman_file,
        ghost_files,
    })
}

pub fn parse_entity(entity: &str, text: &str, limits: &Limits) -> Result<EntityFile, LevelError> {
    let mut parsed = EntityFile::default();
    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("PASSO") => {
                if let Some(passo) = parse_number(words.next()) {
                    parsed.passo = passo.clamp(0, u32::MAX as i64) as u32;
                }
            }
            Some("POS") => {
                let row = parse_number(words.next());
                let col = parse_number(words.next());
                if let (Some(row), Some(col)) = (row, col) {
                    parsed.position = Some(Vec2::new(
                        col.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                        row.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                    ));
                }
            }
            _ => {
                if let Some(command) = Command::parse_line(line) {
                    parsed.commands.push(command);
                }
            }
        }
    }
    if parsed.commands.len() > limits.max_commands {
        return Err(LevelError::TooManyCommands {
            entity: entity.to_string(),
            count: parsed.commands.len(),
            limit: limits.max_commands,
        });
    }
    Ok(parsed)
}

/// Places the entities on the board and seeds their controllers.
/// `stream_base` keeps RNG streams of different levels apart.
pub fn assemble_level(
    layout: LevelLayout,
    pacman: Option<EntityFile>,
    ghosts: Vec<EntityFile>,
    session_seed: u32,
    stream_base: u32,
) -> Result<LevelState, LevelError> {
    let LevelLayout {
        name,
        tempo_ms,
        mut board,
        ..
    } = layout;

    let mut ghost_states = Vec::with_capacity(ghosts.len());
    for (idx, ghost) in ghosts.into_iter().enumerate() {
        let id = ActorId::ghost(idx);
        let pos = ghost.position.unwrap_or(Vec2::new(-1, -1));
        let cell = board
            .cell_mut(pos)
            .filter(|cell| !cell.is_wall() && cell.occupant.is_none())
            .ok_or_else(|| invalid_position(id, pos))?;
        cell.occupant = Some(id);
        ghost_states.push(ActorState {
            actor: Actor::new(
                id,
                ghost.passo,
                ghost.commands,
                derive_actor_seed(session_seed, stream_base + idx as u32 + 1),
            ),
            position: pos,
            alive: true,
            points: 0,
        });
    }

    // Without a script Pacman is steered from the keyboard and always starts
    // on the first free cell, whatever POS says.
    let pacman = pacman.unwrap_or_default();
    let requested = pacman
        .position
        .filter(|_| !pacman.commands.is_empty())
        .filter(|pos| board.cell(*pos).is_some_and(|cell| cell.is_free()));
    let pos = match requested {
        Some(pos) => pos,
        None => board
            .first_free()
            .ok_or_else(|| LevelError::NoFreeCell { level: name.clone() })?,
    };
    if let Some(cell) = board.cell_mut(pos) {
        cell.occupant = Some(ActorId::PACMAN);
        cell.has_dot = false;
    }

    Ok(LevelState {
        name,
        tempo_ms,
        board,
        pacman: ActorState {
            actor: Actor::new(
                ActorId::PACMAN,
                pacman.passo,
                pacman.commands,
                derive_actor_seed(session_seed, stream_base),
            ),
            position: pos,
            alive: true,
            points: 0,
        },
        ghosts: ghost_states,
    })
}

/// Loads one level file and the entity files it names, resolved next to it.
pub fn load_level_file(
    path: &Path,
    session_seed: u32,
    stream_base: u32,
    limits: &Limits,
    log: &dyn EventLog,
) -> Result<LevelState, LevelError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let text = read_text(path)?;
    let layout = parse_level(&name, &text, limits)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let pacman = match &layout.pacman_file {
        Some(file) => match read_optional(&base.join(file))? {
            Some(text) => Some(parse_entity("pacman", &text, limits)?),
            None => {
                log.emit(
                    LogLevel::Warn,
                    "pacman_file_missing",
                    &name,
                    json!({ "file": file, "fallback": "interactive" }),
                );
                None
            }
        },
        None => None,
    };

    let mut ghosts = Vec::with_capacity(layout.ghost_files.len());
    for file in &layout.ghost_files {
        match read_optional(&base.join(file))? {
            Some(text) => {
                let label = ActorId::ghost(ghosts.len()).label();
                ghosts.push(parse_entity(&label, &text, limits)?);
            }
            None => log.emit(
                LogLevel::Warn,
                "ghost_file_missing",
                &name,
                json!({ "file": file }),
            ),
        }
    }

    let state = assemble_level(layout, pacman, ghosts, session_seed, stream_base)?;
    log.emit(
        LogLevel::Info,
        "level_loaded",
        &state.name,
        json!({
            "width": state.board.width,
            "height": state.board.height,
            "tempoMs": state.tempo_ms,
            "ghosts": state.ghosts.len(),
            "dots": state.board.count_dots(),
            "interactive": state.pacman.actor.is_interactive(),
        }),
    );
    Ok(state)
}

/// Lists the `.lvl` files of `dir` in name order.
pub fn find_levels(dir: &Path, limits: &Limits) -> Result<Vec<PathBuf>, LevelError> {
    let entries = fs::read_dir(dir).map_err(|source| LevelError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut levels = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LevelError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == LEVEL_EXTENSION) {
            levels.push(path);
        }
    }
    levels.sort();
    if levels.is_empty() {
        return Err(LevelError::NoLevels {
            dir: dir.to_path_buf(),
        });
    }
    if levels.len() > limits.max_levels {
        return Err(LevelError::TooManyLevels {
            dir: dir.to_path_buf(),
            count: levels.len(),
            limit: limits.max_levels,
        });
    }
    Ok(levels)
}

pub fn load_levels(
    dir: &Path,
    session_seed: u32,
    limits: &Limits,
    log: &dyn EventLog,
) -> Result<Vec<LevelState>, LevelError> {
    find_levels(dir, limits)?
        .iter()
        .enumerate()
        .map(|(idx, path)| load_level_file(path, session_seed, idx as u32 * 64, limits, log))
        .collect()
}

fn parse_number(word: Option<&str>) -> Option<i64> {
    word?.parse().ok()
}

fn invalid_position(id: ActorId, pos: Vec2) -> LevelError {
    LevelError::InvalidPosition {
        entity: id.label(),
        x: pos.x,
        y: pos.y,
    }
}

fn read_text(path: &Path) -> Result<String, LevelError> {
    fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, LevelError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LevelError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
pub(crate) mod testdir {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scratch directory under the system temp dir, removed on drop.
    pub(crate) struct TempLevels {
        root: PathBuf,
    }

    impl TempLevels {
        pub(crate) fn new(tag: &str) -> Self {
            static NEXT: AtomicU32 = AtomicU32::new(0);
            let root = std::env::temp_dir().join(format!(
                "packman-{tag}-{}-{}",
                std::process::id(),
                NEXT.fetch_add(1, Ordering::Relaxed)
            ));
            fs::create_dir_all(&root).expect("create temp dir");
            Self { root }
        }

        pub(crate) fn path(&self) -> &Path {
            &self.root
        }

        pub(crate) fn write(&self, name: &str, text: &str) -> PathBuf {
            let path = self.root.join(name);
            fs::write(&path, text).expect("write fixture");
            path
        }
    }

    impl Drop for TempLevels {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}
