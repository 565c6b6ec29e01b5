use std::any::Any;
use std::panic;
use std::thread;
use std::time::Duration;

use serde_json::json;

use crate::actor::Actor;
use crate::command::CommandKind;
use crate::console::{lock_console, SharedConsole};
use crate::engine::{apply_move, play_scripted};
use crate::error::LevelError;
use crate::log::{EventLog, LogLevel};
use crate::round::RoundState;
use crate::types::{Banner, EndCause, MoveResult, RoundOutcome};
use crate::world::{Cast, LevelState, World};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundOptions {
    /// Render ticks after which the round is ended as a quit.
    pub tick_limit: Option<u64>,
}

#[derive(Debug)]
pub struct RoundReport {
    pub outcome: RoundOutcome,
    pub save_requested: bool,
    pub cast: Cast,
}

#[derive(Debug)]
pub struct LevelReport {
    pub outcome: RoundOutcome,
    pub save_requested: bool,
    pub state: LevelState,
}

impl LevelReport {
    /// The round outcome, with a Pacman killed after the round was stopped
    /// counted as a death.
    pub fn settled_outcome(&self) -> RoundOutcome {
        if self.state.pacman.alive || self.outcome.is_final() {
            return self.outcome;
        }
        RoundOutcome::Terminated {
            cause: EndCause::PacmanDied,
        }
    }
}

/// Plays one attempt of `state` and captures the level once every worker
/// has been joined.
pub fn play_level(
    state: &LevelState,
    console: &SharedConsole,
    log: &dyn EventLog,
    options: RoundOptions,
) -> Result<LevelReport, LevelError> {
    let (world, cast) = World::from_state(state)?;
    let report = play_round(&world, cast, console, log, options);
    Ok(LevelReport {
        outcome: report.outcome,
        save_requested: report.save_requested,
        state: world.capture(&report.cast),
    })
}

pub fn play_round(
    world: &World,
    cast: Cast,
    console: &SharedConsole,
    log: &dyn EventLog,
    options: RoundOptions,
) -> RoundReport {
    let round = RoundState::new();
    let tick = tick_of(world.tempo_ms());
    log.emit(
        LogLevel::Info,
        "round_started",
        world.name(),
        json!({
            "ghosts": cast.ghosts.len(),
            "interactive": cast.pacman.is_interactive(),
            "tempoMs": world.tempo_ms(),
        }),
    );

    let Cast { pacman, ghosts } = cast;
    let (pacman, ghosts, console_result) = thread::scope(|scope| {
        let round = &round;
        let pacman_handle = scope.spawn(move || run_pacman(world, round, log, pacman, tick));
        let ghost_handles: Vec<_> = ghosts
            .into_iter()
            .map(|ghost| scope.spawn(move || run_ghost(world, round, log, ghost, tick)))
            .collect();
        let console_handle =
            scope.spawn(move || run_console(world, round, console, log, tick, options));
        (
            pacman_handle.join(),
            ghost_handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>(),
            console_handle.join(),
        )
    });

    let joined = console_result.and(pacman).and_then(|pacman| {
        let ghosts = ghosts.into_iter().collect::<thread::Result<Vec<_>>>()?;
        Ok(Cast { pacman, ghosts })
    });
    let cast = match joined {
        Ok(cast) => cast,
        Err(payload) => {
            log.emit(
                LogLevel::Error,
                "worker_panicked",
                world.name(),
                json!({ "message": panic_message(payload.as_ref()) }),
            );
            panic::resume_unwind(payload);
        }
    };

    let outcome = round.outcome();
    let save_requested = round.save_requested();
    log.emit(
        LogLevel::Info,
        "round_finished",
        world.name(),
        json!({
            "outcome": outcome,
            "saveRequested": save_requested,
            "points": world.pacman().points(),
        }),
    );
    RoundReport {
        outcome,
        save_requested,
        cast,
    }
}

/// Stops the round if the owning worker unwinds, so the others can leave.
struct StopOnPanic<'a>(&'a RoundState);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.stop();
        }
    }
}

fn run_pacman(
    world: &World,
    round: &RoundState,
    log: &dyn EventLog,
    mut actor: Actor,
    tick: Duration,
) -> Actor {
    let _guard = StopOnPanic(round);
    let pacman = world.pacman();
    while round.is_running() {
        if !pacman.is_alive() {
            round.resolve(RoundOutcome::Terminated {
                cause: EndCause::PacmanDied,
            });
            break;
        }

        let command = if actor.is_interactive() {
            match round.wait_for_input(|| !pacman.is_alive()) {
                Some(command) => command,
                None => continue,
            }
        } else {
            match actor.current_command() {
                Some(command) => command,
                None => continue,
            }
        };

        match command.kind {
            CommandKind::Quit => {
                actor.advance();
                log.emit(LogLevel::Info, "quit_requested", world.name(), json!({}));
                round.resolve(RoundOutcome::Terminated {
                    cause: EndCause::Quit,
                });
                break;
            }
            CommandKind::Save => {
                actor.advance();
                if round.request_save() {
                    log.emit(
                        LogLevel::Info,
                        "save_requested",
                        world.name(),
                        json!({ "points": pacman.points() }),
                    );
                }
                break;
            }
            _ => {}
        }

        let result = if actor.is_interactive() {
            let mut command = command;
            apply_move(world, &mut actor, &mut command)
        } else {
            play_scripted(world, &mut actor).unwrap_or(MoveResult::Invalid)
        };
        match result {
            MoveResult::ActorDied => {
                round.resolve(RoundOutcome::Terminated {
                    cause: EndCause::PacmanDied,
                });
                break;
            }
            MoveResult::ReachedPortal => {
                round.resolve(RoundOutcome::NextLevel);
                break;
            }
            MoveResult::Valid | MoveResult::Invalid => {}
        }

        if !round.pause(tick) {
            break;
        }
    }
    actor
}

fn run_ghost(
    world: &World,
    round: &RoundState,
    log: &dyn EventLog,
    mut actor: Actor,
    tick: Duration,
) -> Actor {
    let _guard = StopOnPanic(round);
    while round.is_running() {
        if play_scripted(world, &mut actor) == Some(MoveResult::ActorDied) {
            log.emit(
                LogLevel::Debug,
                "pacman_caught",
                world.name(),
                json!({ "ghost": actor.id().label() }),
            );
            // Pacman may be parked waiting for input.
            round.nudge();
        }
        if !round.pause(tick) {
            break;
        }
    }
    actor
}

fn run_console(
    world: &World,
    round: &RoundState,
    console: &SharedConsole,
    log: &dyn EventLog,
    tick: Duration,
    options: RoundOptions,
) {
    let _guard = StopOnPanic(round);
    let mut ticks = 0u64;
    loop {
        {
            let mut console = lock_console(console);
            console.draw(&world.frame(Banner::Playing));
            if let Some(command) = console.poll() {
                round.publish_input(command);
            }
        }
        ticks += 1;
        if options.tick_limit.is_some_and(|limit| ticks >= limit) {
            let ended = round.resolve_if_running(RoundOutcome::Terminated {
                cause: EndCause::Quit,
            });
            if ended {
                log.emit(
                    LogLevel::Warn,
                    "tick_limit_reached",
                    world.name(),
                    json!({ "ticks": ticks }),
                );
            }
            break;
        }
        if !round.pause(tick) {
            break;
        }
    }
}

fn tick_of(tempo_ms: u64) -> Duration {
    Duration::from_millis(tempo_ms.max(1))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
