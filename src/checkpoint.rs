use std::thread;

use serde::Serialize;
use serde_json::json;

use crate::error::{CheckpointError, LevelError};
use crate::log::{EventLog, LogLevel};
use crate::session::{GameState, SessionExit};
use crate::types::{EndReason, GameEnd};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupervisorReport {
    pub end: GameEnd,
    pub saves: u32,
    pub rollbacks: u32,
    /// Duplicates started, the first run included.
    pub generations: u64,
}

pub struct Supervisor<'a> {
    log: &'a dyn EventLog,
    rollback_limit: Option<u32>,
}

impl<'a> Supervisor<'a> {
    pub fn new(log: &'a dyn EventLog, rollback_limit: Option<u32>) -> Self {
        Self {
            log,
            rollback_limit,
        }
    }

    /// Runs `play` on a fresh duplicate of the game, starting from
    /// `initial`. A save replaces the checkpoint; a death after a save
    /// restarts play from an untouched copy of it.
    pub fn run<F>(&self, initial: GameState, play: F) -> Result<SupervisorReport, CheckpointError>
    where
        F: Fn(GameState) -> Result<SessionExit, LevelError> + Sync,
    {
        let mut checkpoint: Option<GameState> = None;
        let mut next = initial;
        let mut generation = 0u64;
        let mut saves = 0u32;
        let mut rollbacks = 0u32;

        loop {
            let exit = self.spawn_duplicate(generation, next, &play)?;
            generation += 1;
            self.log.emit(
                LogLevel::Debug,
                "duplicate_exited",
                "checkpoint",
                json!({ "generation": generation - 1, "status": exit.status() }),
            );

            let end = match self.refuse_dead_save(exit) {
                SessionExit::SaveRequested(state) => {
                    let mut state = *state;
                    state.save_active = true;
                    saves += 1;
                    self.log.emit(
                        LogLevel::Info,
                        "checkpoint_saved",
                        "checkpoint",
                        json!({
                            "level": state.current.name,
                            "levelIndex": state.level_index,
                            "points": state.points,
                        }),
                    );
                    next = state.clone();
                    checkpoint = Some(state);
                    continue;
                }
                SessionExit::DiedWhileSaved(end) => match &checkpoint {
                    Some(saved) if self.may_roll_back(rollbacks) => {
                        rollbacks += 1;
                        self.log.emit(
                            LogLevel::Info,
                            "rollback",
                            "checkpoint",
                            json!({
                                "rollbacks": rollbacks,
                                "level": saved.current.name,
                                "points": saved.points,
                            }),
                        );
                        next = saved.clone();
                        continue;
                    }
                    Some(_) => {
                        self.log.emit(
                            LogLevel::Warn,
                            "rollback_limit_reached",
                            "checkpoint",
                            json!({ "rollbacks": rollbacks }),
                        );
                        end
                    }
                    None => end,
                },
                SessionExit::Ended(end) => end,
            };

            self.log.emit(
                LogLevel::Info,
                "game_ended",
                "checkpoint",
                json!({
                    "reason": end.reason,
                    "points": end.points,
                    "levelsCleared": end.levels_cleared,
                    "saves": saves,
                    "rollbacks": rollbacks,
                }),
            );
            return Ok(SupervisorReport {
                end,
                saves,
                rollbacks,
                generations: generation,
            });
        }
    }

    /// A save holding a dead Pacman would rewind into the same death forever,
    /// so it is read as the death it is.
    fn refuse_dead_save(&self, exit: SessionExit) -> SessionExit {
        let state = match exit {
            SessionExit::SaveRequested(state) if !state.current.pacman.alive => state,
            exit => return exit,
        };
        self.log.emit(
            LogLevel::Warn,
            "dead_checkpoint_refused",
            "checkpoint",
            json!({ "level": state.current.name, "points": state.points }),
        );
        let end = GameEnd {
            reason: EndReason::Died,
            points: state.points,
            levels_cleared: state.level_index,
        };
        if state.save_active {
            SessionExit::DiedWhileSaved(end)
        } else {
            SessionExit::Ended(end)
        }
    }

    fn may_roll_back(&self, rollbacks: u32) -> bool {
        self.rollback_limit.map_or(true, |limit| rollbacks < limit)
    }

    fn spawn_duplicate<F>(
        &self,
        generation: u64,
        state: GameState,
        play: &F,
    ) -> Result<SessionExit, CheckpointError>
    where
        F: Fn(GameState) -> Result<SessionExit, LevelError> + Sync,
    {
        let joined = thread::scope(|scope| -> Result<_, CheckpointError> {
            let handle = thread::Builder::new()
                .name(format!("session-{generation}"))
                .spawn_scoped(scope, move || play(state))
                .map_err(|error| {
                    self.log.emit(
                        LogLevel::Error,
                        "duplicate_spawn_failed",
                        "checkpoint",
                        json!({ "generation": generation, "error": error.to_string() }),
                    );
                    CheckpointError::Spawn(error)
                })?;
            Ok(handle.join())
        })?;
        match joined {
            Ok(exit) => Ok(exit?),
            Err(_) => {
                self.log.emit(
                    LogLevel::Error,
                    "duplicate_panicked",
                    "checkpoint",
                    json!({ "generation": generation }),
                );
                Err(CheckpointError::DuplicatePanicked { generation })
            }
        }
    }
}
