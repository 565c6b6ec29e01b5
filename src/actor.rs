use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::command::Command;
use crate::rng::Rng;
use crate::types::{ActorId, Vec2};

/// The part of an actor other threads may observe. Position and liveness are
/// only written while the lock of the cell the actor stands on is held.
#[derive(Debug)]
pub struct ActorBody {
    id: ActorId,
    position: AtomicUsize,
    alive: AtomicBool,
    points: AtomicU32,
}

impl ActorBody {
    pub fn new(id: ActorId, position: usize, alive: bool, points: u32) -> Self {
        Self {
            id,
            position: AtomicUsize::new(position),
            alive: AtomicBool::new(alive),
            points: AtomicU32::new(points),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn points(&self) -> u32 {
        self.points.load(Ordering::Acquire)
    }

    pub(crate) fn move_to(&self, index: usize) {
        self.position.store(index, Ordering::Release);
    }

    pub(crate) fn kill(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub(crate) fn add_points(&self, amount: u32) {
        self.points.fetch_add(amount, Ordering::AcqRel);
    }
}

/// Thread-owned controller of an actor: its script, pacing and private RNG.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    passo: u32,
    waiting: u32,
    commands: Vec<Command>,
    cursor: usize,
    charged: bool,
    rng: Rng,
}

impl Actor {
    pub fn new(id: ActorId, passo: u32, commands: Vec<Command>, seed: u32) -> Self {
        Self {
            id,
            passo,
            waiting: passo,
            commands,
            cursor: 0,
            charged: false,
            rng: Rng::new(seed),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn passo(&self) -> u32 {
        self.passo
    }

    pub fn waiting(&self) -> u32 {
        self.waiting
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_charged(&self) -> bool {
        self.charged
    }

    pub fn is_interactive(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn current_command(&self) -> Option<Command> {
        if self.commands.is_empty() {
            return None;
        }
        Some(self.commands[self.cursor % self.commands.len()])
    }

    pub(crate) fn current_slot(&self) -> Option<usize> {
        if self.commands.is_empty() {
            None
        } else {
            Some(self.cursor % self.commands.len())
        }
    }

    pub(crate) fn store_command(&mut self, slot: usize, command: Command) {
        if let Some(stored) = self.commands.get_mut(slot) {
            *stored = command;
        }
    }

    pub fn advance(&mut self) {
        if !self.commands.is_empty() {
            self.cursor = (self.cursor + 1) % self.commands.len();
        }
    }

    /// Consumes one tick of cooldown. Returns true while the actor must sit out.
    pub(crate) fn cool_down(&mut self) -> bool {
        if self.waiting > 0 {
            self.waiting -= 1;
            return true;
        }
        self.waiting = self.passo;
        false
    }

    pub(crate) fn set_charged(&mut self, charged: bool) {
        self.charged = charged;
    }

    pub(crate) fn rng_mut(&mut self) -> &mut Rng {
        &mut self.rng
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorState {
    pub actor: Actor,
    pub position: Vec2,
    pub alive: bool,
    pub points: u32,
}
