use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::command::{Command, CommandKind};
use crate::types::{Banner, Frame};

pub trait FrameSink: Send {
    fn draw(&mut self, frame: &Frame);
}

pub trait InputSource: Send {
    fn poll(&mut self) -> Option<Command>;
}

pub struct Console {
    frames: Box<dyn FrameSink>,
    input: Box<dyn InputSource>,
}

pub type SharedConsole = Arc<Mutex<Console>>;

impl Console {
    pub fn new(frames: Box<dyn FrameSink>, input: Box<dyn InputSource>) -> Self {
        Self { frames, input }
    }

    pub fn headless() -> Self {
        Self::new(Box::new(NullSink), Box::new(NoInput))
    }

    pub fn into_shared(self) -> SharedConsole {
        Arc::new(Mutex::new(self))
    }

    pub fn draw(&mut self, frame: &Frame) {
        self.frames.draw(frame);
    }

    pub fn poll(&mut self) -> Option<Command> {
        self.input.poll()
    }
}

pub fn lock_console(console: &SharedConsole) -> MutexGuard<'_, Console> {
    console.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NullSink;

impl FrameSink for NullSink {
    fn draw(&mut self, _frame: &Frame) {}
}

/// Keeps every drawn frame; handy for tests and for reporting the last one.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Frame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl FrameSink for RecordingSink {
    fn draw(&mut self, frame: &Frame) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.clone());
    }
}

pub struct TextRenderer<W: Write + Send> {
    out: W,
    clear_screen: bool,
    broken: bool,
}

impl<W: Write + Send> TextRenderer<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self {
            out,
            clear_screen,
            broken: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if self.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        writeln!(
            self.out,
            "{} | points {} | tempo {}ms",
            frame.level, frame.points, frame.tempo_ms
        )?;
        for row in &frame.rows {
            writeln!(self.out, "{row}")?;
        }
        match frame.banner {
            Banner::Playing => writeln!(self.out, "W/A/S/D move, G save, Q quit")?,
            Banner::LevelComplete => writeln!(self.out, "*** LEVEL COMPLETE ***")?,
            Banner::GameOver => writeln!(self.out, "*** GAME OVER ***")?,
            Banner::Victory => writeln!(self.out, "*** YOU WIN ***")?,
        }
        self.out.flush()
    }
}

impl<W: Write + Send> FrameSink for TextRenderer<W> {
    fn draw(&mut self, frame: &Frame) {
        if self.broken {
            return;
        }
        if let Err(error) = self.write_frame(frame) {
            eprintln!("[renderer] output failed, disabling frames: {error}");
            self.broken = true;
        }
    }
}

pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> Option<Command> {
        None
    }
}

/// Feeds a fixed key sequence, one key per tick.
pub struct ScriptedInput {
    keys: VecDeque<Command>,
    quit_when_exhausted: bool,
}

impl ScriptedInput {
    pub fn new(keys: &str, quit_when_exhausted: bool) -> Self {
        Self {
            keys: keys
                .chars()
                .filter(|key| !key.is_whitespace())
                .map(Command::from_key)
                .collect(),
            quit_when_exhausted,
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<Command> {
        match self.keys.pop_front() {
            Some(command) => Some(command),
            None if self.quit_when_exhausted => Some(Command::new(CommandKind::Quit)),
            None => None,
        }
    }
}

/// Reads key lines from stdin on a background thread. Each non-blank
/// character of a line becomes one command.
pub struct StdinInput {
    rx: mpsc::Receiver<Command>,
}

impl StdinInput {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-input".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    for key in line.chars().filter(|key| !key.is_whitespace()) {
                        if tx.send(Command::from_key(key)).is_err() {
                            return;
                        }
                    }
                }
            })?;
        Ok(Self { rx })
    }
}

impl InputSource for StdinInput {
    fn poll(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn frame(banner: Banner) -> Frame {
        Frame {
            level: "1.lvl".to_string(),
            width: 3,
            height: 2,
            tempo_ms: 10,
            points: 4,
            rows: vec!["WWW".to_string(), "P.@".to_string()],
            banner,
        }
    }

    #[test]
    fn text_renderer_writes_header_rows_and_banner() {
        let mut renderer = TextRenderer::new(Vec::new(), false);
        renderer.draw(&frame(Banner::GameOver));
        let text = String::from_utf8(renderer.into_inner()).expect("utf8 output");
        assert_eq!(
            text,
            "1.lvl | points 4 | tempo 10ms\nWWW\nP.@\n*** GAME OVER ***\n"
        );
    }

    #[test]
    fn scripted_input_feeds_keys_then_quits() {
        let mut input = ScriptedInput::new("d s", true);
        assert_eq!(input.poll(), Some(Command::step(Direction::Right)));
        assert_eq!(input.poll(), Some(Command::step(Direction::Down)));
        assert_eq!(input.poll().map(|c| c.kind), Some(CommandKind::Quit));
    }

    #[test]
    fn scripted_input_without_quit_goes_silent() {
        let mut input = ScriptedInput::new("w", false);
        assert!(input.poll().is_some());
        assert_eq!(input.poll(), None);
    }

    #[test]
    fn recording_sink_shares_frames_between_clones() {
        let sink = RecordingSink::default();
        let mut console = Console::new(Box::new(sink.clone()), Box::new(NoInput));
        console.draw(&frame(Banner::Playing));
        console.draw(&frame(Banner::Victory));
        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.last().map(|f| f.banner), Some(Banner::Victory));
        assert_eq!(console.poll(), None);
    }
}
