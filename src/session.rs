use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use crate::console::{lock_console, SharedConsole};
use crate::constants::{EXIT_DIED_WHILE_SAVED, EXIT_SUCCESS};
use crate::error::LevelError;
use crate::log::{EventLog, LogLevel};
use crate::orchestrator::{play_level, RoundOptions};
use crate::types::{Banner, EndCause, EndReason, GameEnd, RoundOutcome};
use crate::world::LevelState;

/// The whole game as one value. Cloning it is how a save is taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    pub levels: Arc<[LevelState]>,
    pub level_index: usize,
    pub current: LevelState,
    pub points: u32,
    pub save_active: bool,
}

impl GameState {
    pub fn new(levels: Vec<LevelState>) -> Option<Self> {
        let current = levels.first()?.clone();
        Some(Self {
            levels: levels.into(),
            level_index: 0,
            current,
            points: 0,
            save_active: false,
        })
    }

    pub fn is_last_level(&self) -> bool {
        self.level_index + 1 >= self.levels.len()
    }

    /// Moves to the next level, carrying `points` into it.
    fn advance(&mut self, points: u32) -> bool {
        let Some(next) = self.levels.get(self.level_index + 1) else {
            return false;
        };
        let mut next = next.clone();
        next.pacman.points = points;
        self.level_index += 1;
        self.current = next;
        self.points = points;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionExit {
    Ended(GameEnd),
    /// Pacman died after a save; carries the ending to relay if no rewind
    /// happens.
    DiedWhileSaved(GameEnd),
    SaveRequested(Box<GameState>),
}

impl SessionExit {
    pub fn status(&self) -> i32 {
        match self {
            Self::DiedWhileSaved(_) => EXIT_DIED_WHILE_SAVED,
            Self::Ended(_) | Self::SaveRequested(_) => EXIT_SUCCESS,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub round: RoundOptions,
    pub banner_hold_ms: u64,
}

/// Plays levels from `state` until the game ends or a save is requested.
pub fn run_session(
    mut state: GameState,
    console: &SharedConsole,
    log: &dyn EventLog,
    options: SessionOptions,
) -> Result<SessionExit, LevelError> {
    loop {
        log.emit(
            LogLevel::Info,
            "level_started",
            &state.current.name,
            json!({
                "levelIndex": state.level_index,
                "points": state.current.pacman.points,
                "saveActive": state.save_active,
            }),
        );
        let report = play_level(&state.current, console, log, options.round)?;
        let points = report.state.pacman.points;
        let outcome = report.settled_outcome();

        if report.save_requested {
            if !outcome.is_final() {
                state.current = report.state;
                state.points = points;
                return Ok(SessionExit::SaveRequested(Box::new(state)));
            }
            log.emit(
                LogLevel::Warn,
                "save_discarded",
                &state.current.name,
                json!({ "outcome": outcome }),
            );
        }

        let cleared = state.level_index;
        match outcome {
            RoundOutcome::NextLevel => {
                if state.is_last_level() {
                    show_banner(console, &report.state, Banner::Victory, options);
                    return Ok(SessionExit::Ended(GameEnd {
                        reason: EndReason::Victory,
                        points,
                        levels_cleared: cleared + 1,
                    }));
                }
                show_banner(console, &report.state, Banner::LevelComplete, options);
                state.advance(points);
            }
            RoundOutcome::Terminated {
                cause: EndCause::PacmanDied,
            } => {
                let end = GameEnd {
                    reason: EndReason::Died,
                    points,
                    levels_cleared: cleared,
                };
                if state.save_active {
                    log.emit(
                        LogLevel::Info,
                        "died_while_saved",
                        &state.current.name,
                        json!({ "points": points }),
                    );
                    return Ok(SessionExit::DiedWhileSaved(end));
                }
                show_banner(console, &report.state, Banner::GameOver, options);
                return Ok(SessionExit::Ended(end));
            }
            // A round stopped without an outcome was cut short; end it as a quit.
            RoundOutcome::Terminated {
                cause: EndCause::Quit,
            }
            | RoundOutcome::Continue => {
                return Ok(SessionExit::Ended(GameEnd {
                    reason: EndReason::Quit,
                    points,
                    levels_cleared: cleared,
                }));
            }
        }
    }
}

fn show_banner(console: &SharedConsole, level: &LevelState, banner: Banner, options: SessionOptions) {
    lock_console(console).draw(&level.frame(banner));
    if options.banner_hold_ms > 0 {
        thread::sleep(Duration::from_millis(options.banner_hold_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::console::{Console, NoInput, RecordingSink};
    use crate::log::NullLog;
    use crate::world::fixtures::level_from_rows;

    fn steps(keys: &str) -> Vec<Command> {
        keys.chars().map(Command::from_key).collect()
    }

    fn recording() -> (SharedConsole, RecordingSink) {
        let sink = RecordingSink::default();
        let console = Console::new(Box::new(sink.clone()), Box::new(NoInput)).into_shared();
        (console, sink)
    }

    #[test]
    fn clearing_every_level_is_a_victory_with_carried_points() {
        let first = level_from_rows(&["P.@"], steps("D"), vec![]);
        let second = level_from_rows(&["P..@"], steps("D"), vec![]);
        let state = GameState::new(vec![first, second]).expect("levels");
        let (console, sink) = recording();

        let exit = run_session(state, &console, &NullLog, SessionOptions::default())
            .expect("session");
        assert_eq!(
            exit,
            SessionExit::Ended(GameEnd {
                reason: EndReason::Victory,
                points: 3,
                levels_cleared: 2,
            })
        );
        let banners: Vec<_> = sink
            .frames()
            .into_iter()
            .map(|frame| frame.banner)
            .filter(|banner| *banner != Banner::Playing)
            .collect();
        assert_eq!(banners, vec![Banner::LevelComplete, Banner::Victory]);
        assert_eq!(sink.last().map(|frame| frame.points), Some(3));
    }

    #[test]
    fn death_without_save_is_game_over() {
        let level = level_from_rows(&["P.M"], steps("DD"), vec![]);
        let state = GameState::new(vec![level]).expect("levels");
        let (console, sink) = recording();

        let exit = run_session(state, &console, &NullLog, SessionOptions::default())
            .expect("session");
        assert_eq!(
            exit,
            SessionExit::Ended(GameEnd {
                reason: EndReason::Died,
                points: 1,
                levels_cleared: 0,
            })
        );
        assert_eq!(exit.status(), EXIT_SUCCESS);
        assert_eq!(sink.last().map(|frame| frame.banner), Some(Banner::GameOver));
    }

    #[test]
    fn death_after_save_reports_the_sentinel() {
        let level = level_from_rows(&["P.M"], steps("DD"), vec![]);
        let mut state = GameState::new(vec![level]).expect("levels");
        state.save_active = true;
        let (console, _) = recording();

        let exit = run_session(state, &console, &NullLog, SessionOptions::default())
            .expect("session");
        assert!(matches!(exit, SessionExit::DiedWhileSaved(_)));
        assert_eq!(exit.status(), EXIT_DIED_WHILE_SAVED);
    }

    #[test]
    fn save_returns_the_captured_game() {
        let level = level_from_rows(&["P..@"], steps("DGD"), vec![]);
        let state = GameState::new(vec![level]).expect("levels");
        let (console, _) = recording();

        let exit = run_session(state, &console, &NullLog, SessionOptions::default())
            .expect("session");
        let SessionExit::SaveRequested(saved) = exit else {
            panic!("expected a save, got {exit:?}");
        };
        assert_eq!(saved.points, 1);
        assert_eq!(saved.current.pacman.actor.cursor(), 2);
        assert_eq!(saved.level_index, 0);
    }

    #[test]
    fn save_racing_a_ghost_never_hands_back_a_dead_pacman() {
        let level = level_from_rows(&["PM"], steps("G"), vec![steps("A")]);
        let state = GameState::new(vec![level]).expect("levels");
        for _ in 0..200 {
            let (console, _) = recording();
            let exit = run_session(state.clone(), &console, &NullLog, SessionOptions::default())
                .expect("session");
            match exit {
                SessionExit::SaveRequested(saved) => assert!(saved.current.pacman.alive),
                SessionExit::Ended(end) => assert_eq!(end.reason, EndReason::Died),
                SessionExit::DiedWhileSaved(end) => panic!("no save was active: {end:?}"),
            }
        }
    }

    #[test]
    fn quit_ends_the_session() {
        let first = level_from_rows(&["P@"], steps("D"), vec![]);
        let second = level_from_rows(&["P.."], steps("Q"), vec![]);
        let state = GameState::new(vec![first, second]).expect("levels");
        let (console, _) = recording();

        let exit = run_session(state, &console, &NullLog, SessionOptions::default())
            .expect("session");
        assert_eq!(
            exit,
            SessionExit::Ended(GameEnd {
                reason: EndReason::Quit,
                points: 0,
                levels_cleared: 1,
            })
        );
    }

    #[test]
    fn empty_level_list_has_no_game() {
        assert!(GameState::new(vec![]).is_none());
    }
}
