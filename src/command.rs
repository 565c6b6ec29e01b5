use crate::types::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Step(Direction),
    Random,
    Wait,
    Charge,
    Quit,
    Save,
    Unknown(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub turns: u32,
    pub turns_left: u32,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            turns: 1,
            turns_left: 1,
        }
    }

    pub fn step(dir: Direction) -> Self {
        Self::new(CommandKind::Step(dir))
    }

    pub fn wait(turns: u32) -> Self {
        let turns = turns.max(1);
        Self {
            kind: CommandKind::Wait,
            turns,
            turns_left: turns,
        }
    }

    /// Parses one line of an entity move file. Blank lines yield nothing.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut chars = line.chars();
        let head = chars.next()?;
        if head == 'T' {
            let turns = chars.as_str().trim().parse::<i64>().unwrap_or(1);
            return Some(Self::wait(turns.clamp(1, u32::MAX as i64) as u32));
        }
        Some(Self::from_key(head))
    }

    /// Maps a single key to a command, case-insensitively.
    pub fn from_key(key: char) -> Self {
        let key = key.to_ascii_uppercase();
        if let Some(dir) = Direction::parse_key(key) {
            return Self::step(dir);
        }
        let kind = match key {
            'R' => CommandKind::Random,
            'T' => CommandKind::Wait,
            'C' => CommandKind::Charge,
            'Q' => CommandKind::Quit,
            'G' => CommandKind::Save,
            other => CommandKind::Unknown(other),
        };
        Self::new(kind)
    }

    pub fn key(&self) -> String {
        match self.kind {
            CommandKind::Step(dir) => dir.key().to_string(),
            CommandKind::Random => "R".to_string(),
            CommandKind::Wait => format!("T{}", self.turns),
            CommandKind::Charge => "C".to_string(),
            CommandKind::Quit => "Q".to_string(),
            CommandKind::Save => "G".to_string(),
            CommandKind::Unknown(other) => other.to_string(),
        }
    }
}
