use std::io;

use clap::Parser;
use packman_engine::checkpoint::Supervisor;
use packman_engine::config::GameArgs;
use packman_engine::console::{Console, StdinInput, TextRenderer};
use packman_engine::constants::{BANNER_HOLD_MS, EXIT_FAILURE, EXIT_SUCCESS};
use packman_engine::level::load_levels;
use packman_engine::log::{open_log, EventLog, LogLevel};
use packman_engine::session::{run_session, GameState, SessionOptions};
use packman_engine::types::EndReason;
use serde_json::json;

/// Play a directory of levels in the terminal. Type W/A/S/D and press
/// enter to move; G saves, Q quits.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    game: GameArgs,
}

fn main() {
    let cli = Cli::parse();
    let min_level = if cli.game.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log = match open_log(cli.game.log_file.as_deref(), min_level) {
        Ok(log) => log,
        Err(error) => {
            eprintln!("[packman] failed to open log file: {error}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    let config = cli.game.to_config(BANNER_HOLD_MS);
    log.emit(
        LogLevel::Info,
        "game_starting",
        "packman",
        json!({
            "levelDir": config.level_dir.to_string_lossy(),
            "seed": config.seed,
            "rollbackLimit": config.rollback_limit,
        }),
    );

    let levels = match load_levels(&config.level_dir, config.seed, &config.limits, log.as_ref()) {
        Ok(levels) => levels,
        Err(error) => fail(log.as_ref(), "levels_failed", &error.to_string()),
    };
    let Some(state) = GameState::new(levels) else {
        fail(log.as_ref(), "levels_failed", "no levels to play");
    };
    let input = match StdinInput::spawn() {
        Ok(input) => input,
        Err(error) => fail(log.as_ref(), "input_failed", &error.to_string()),
    };
    let console = Console::new(
        Box::new(TextRenderer::new(io::stdout(), true)),
        Box::new(input),
    )
    .into_shared();
    let options = SessionOptions {
        round: config.round,
        banner_hold_ms: config.banner_hold_ms,
    };

    let supervisor = Supervisor::new(log.as_ref(), config.rollback_limit);
    match supervisor.run(state, |state| {
        run_session(state, &console, log.as_ref(), options)
    }) {
        Ok(report) => {
            let verdict = match report.end.reason {
                EndReason::Victory => "You win!",
                EndReason::Quit => "Bye.",
                EndReason::Died => "Game over.",
            };
            println!(
                "{verdict} points={} levels={} rollbacks={}",
                report.end.points, report.end.levels_cleared, report.rollbacks
            );
            std::process::exit(EXIT_SUCCESS);
        }
        Err(error) => fail(log.as_ref(), "game_failed", &error.to_string()),
    }
}

fn fail(log: &dyn EventLog, event: &str, message: &str) -> ! {
    log.emit(LogLevel::Error, event, "packman", json!({ "error": message }));
    std::process::exit(EXIT_FAILURE);
}
