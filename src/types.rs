use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse_key(value: char) -> Option<Self> {
        match value {
            'W' => Some(Self::Up),
            'S' => Some(Self::Down),
            'A' => Some(Self::Left),
            'D' => Some(Self::Right),
            _ => None,
        }
    }

    pub fn key(self) -> char {
        match self {
            Self::Up => 'W',
            Self::Down => 'S',
            Self::Left => 'A',
            Self::Right => 'D',
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Pacman,
    Ghost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ActorId {
    pub kind: ActorKind,
    pub index: u32,
}

impl ActorId {
    pub const PACMAN: ActorId = ActorId {
        kind: ActorKind::Pacman,
        index: 0,
    };

    pub fn ghost(index: usize) -> Self {
        Self {
            kind: ActorKind::Ghost,
            index: index as u32,
        }
    }

    pub fn is_pacman(self) -> bool {
        self.kind == ActorKind::Pacman
    }

    pub fn label(self) -> String {
        match self.kind {
            ActorKind::Pacman => "pacman".to_string(),
            ActorKind::Ghost => format!("ghost_{}", self.index),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveResult {
    Valid,
    Invalid,
    ReachedPortal,
    ActorDied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    Quit,
    PacmanDied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundOutcome {
    Continue,
    NextLevel,
    Terminated { cause: EndCause },
}

impl RoundOutcome {
    pub fn is_final(self) -> bool {
        self != Self::Continue
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Banner {
    Playing,
    LevelComplete,
    GameOver,
    Victory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub level: String,
    pub width: usize,
    pub height: usize,
    #[serde(rename = "tempoMs")]
    pub tempo_ms: u64,
    pub points: u32,
    pub rows: Vec<String>,
    pub banner: Banner,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Victory,
    Quit,
    Died,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameEnd {
    pub reason: EndReason,
    pub points: u32,
    #[serde(rename = "levelsCleared")]
    pub levels_cleared: usize,
}
