use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use packman_engine::checkpoint::{Supervisor, SupervisorReport};
use packman_engine::config::GameArgs;
use packman_engine::console::{Console, FrameSink, ScriptedInput};
use packman_engine::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use packman_engine::level::load_levels;
use packman_engine::log::{open_log, EventLog, LogLevel};
use packman_engine::session::{run_session, GameState, SessionOptions};
use packman_engine::types::Frame;
use serde::Serialize;
use serde_json::json;

/// Run a level directory headless and print a JSON summary line.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    game: GameArgs,
    /// Keys fed to an interactive pacman, one per tick. Quits once used up.
    #[arg(long, default_value = "")]
    keys: String,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    seed: u32,
    levels: usize,
    #[serde(flatten)]
    report: SupervisorReport,
    #[serde(rename = "lastFrame")]
    last_frame: Option<Frame>,
}

#[derive(Clone, Default)]
struct LastFrame(Arc<Mutex<Option<Frame>>>);

impl LastFrame {
    fn take(&self) -> Option<Frame> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl FrameSink for LastFrame {
    fn draw(&mut self, frame: &Frame) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }
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
            eprintln!("[simulate] failed to open log file: {error}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    let config = cli.game.to_config(0);
    let started_at = now_iso();
    log.emit(
        LogLevel::Info,
        "run_started",
        "simulate",
        json!({
            "levelDir": config.level_dir.to_string_lossy(),
            "seed": config.seed,
            "keys": cli.keys,
            "tickLimit": config.round.tick_limit,
        }),
    );

    let levels = match load_levels(&config.level_dir, config.seed, &config.limits, log.as_ref()) {
        Ok(levels) => levels,
        Err(error) => fail(log.as_ref(), "levels_failed", &error.to_string()),
    };
    let level_count = levels.len();
    let Some(state) = GameState::new(levels) else {
        fail(log.as_ref(), "levels_failed", "no levels to play");
    };

    let frames = LastFrame::default();
    let console = Console::new(
        Box::new(frames.clone()),
        Box::new(ScriptedInput::new(&cli.keys, true)),
    )
    .into_shared();
    let options = SessionOptions {
        round: config.round,
        banner_hold_ms: config.banner_hold_ms,
    };
    let supervisor = Supervisor::new(log.as_ref(), config.rollback_limit);
    let report = match supervisor.run(state, |state| {
        run_session(state, &console, log.as_ref(), options)
    }) {
        Ok(report) => report,
        Err(error) => fail(log.as_ref(), "run_failed", &error.to_string()),
    };

    let summary = RunSummary {
        started_at,
        finished_at: now_iso(),
        seed: config.seed,
        levels: level_count,
        report,
        last_frame: frames.take(),
    };
    let encoded = match serde_json::to_string(&summary) {
        Ok(encoded) => encoded,
        Err(error) => fail(log.as_ref(), "summary_encode_failed", &error.to_string()),
    };
    println!("{encoded}");

    if let Some(path) = &cli.summary_out {
        if let Err(error) = write_summary(path, &encoded) {
            log.emit(
                LogLevel::Error,
                "summary_write_failed",
                "simulate",
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(EXIT_FAILURE);
        }
    }
    log.emit(
        LogLevel::Info,
        "run_finished",
        "simulate",
        json!({
            "reason": summary.report.end.reason,
            "points": summary.report.end.points,
            "summaryOut": cli.summary_out.as_ref().map(|path| path.to_string_lossy()),
        }),
    );
    std::process::exit(EXIT_SUCCESS);
}

fn write_summary(path: &Path, encoded: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, format!("{encoded}\n"))
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn fail(log: &dyn EventLog, event: &str, message: &str) -> ! {
    log.emit(LogLevel::Error, event, "simulate", json!({ "error": message }));
    std::process::exit(EXIT_FAILURE);
}
