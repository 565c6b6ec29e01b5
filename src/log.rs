use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for structured events. Shared by every worker of a session.
pub trait EventLog: Send + Sync {
    fn emit(&self, level: LogLevel, event: &str, scope: &str, details: Value);
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine<'a> {
    timestamp: String,
    level: LogLevel,
    event: &'a str,
    scope: &'a str,
    details: Value,
}

/// Writes one JSON object per line.
pub struct JsonLineLog<W: Write + Send> {
    out: Mutex<W>,
    min_level: LogLevel,
}

impl<W: Write + Send> JsonLineLog<W> {
    pub fn new(out: W, min_level: LogLevel) -> Self {
        Self {
            out: Mutex::new(out),
            min_level,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventLog for JsonLineLog<W> {
    fn emit(&self, level: LogLevel, event: &str, scope: &str, details: Value) {
        if level_rank(level) < level_rank(self.min_level) {
            return;
        }
        let line = StructuredLogLine {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            event,
            scope,
            details,
        };
        let Ok(encoded) = serde_json::to_string(&line) else {
            return;
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // A broken log sink must never take the game down with it.
        let _ = writeln!(out, "{encoded}");
        let _ = out.flush();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggedEvent {
    pub level: LogLevel,
    pub event: String,
    pub scope: String,
    pub details: Value,
}

#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemoryLog {
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|logged| logged.event == event)
            .count()
    }
}

impl EventLog for MemoryLog {
    fn emit(&self, level: LogLevel, event: &str, scope: &str, details: Value) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedEvent {
                level,
                event: event.to_string(),
                scope: scope.to_string(),
                details,
            });
    }
}

pub struct NullLog;

impl EventLog for NullLog {
    fn emit(&self, _level: LogLevel, _event: &str, _scope: &str, _details: Value) {}
}

/// JSON lines appended to `path`, or written to stderr when no path is given.
pub fn open_log(path: Option<&Path>, min_level: LogLevel) -> io::Result<Box<dyn EventLog>> {
    match path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Box::new(JsonLineLog::new(file, min_level)))
        }
        None => Ok(Box::new(JsonLineLog::new(io::stderr(), min_level))),
    }
}

fn level_rank(level: LogLevel) -> u8 {
    match level {
        LogLevel::Debug => 0,
        LogLevel::Info => 1,
        LogLevel::Warn => 2,
        LogLevel::Error => 3,
    }
}
