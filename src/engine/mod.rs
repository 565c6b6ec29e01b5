use crate::actor::{Actor, ActorBody};
use crate::command::{Command, CommandKind};
use crate::constants::POINTS_PER_DOT;
use crate::grid::{Cell, CellPair};
use crate::types::{ActorId, ActorKind, Direction, MoveResult};
use crate::world::World;

mod charge;

pub use self::charge::dash_target;

/// Applies one tick of `command` for `actor`. `command` is updated in place
/// so a `Wait` keeps its countdown across ticks.
pub fn apply_move(world: &World, actor: &mut Actor, command: &mut Command) -> MoveResult {
    let Some(body) = world.body(actor.id()) else {
        return MoveResult::Invalid;
    };
    if !body.is_alive() {
        return MoveResult::ActorDied;
    }
    if actor.cool_down() {
        return MoveResult::Valid;
    }

    let kind = match command.kind {
        CommandKind::Random => CommandKind::Step(actor.rng_mut().direction()),
        other => other,
    };

    match kind {
        CommandKind::Wait => {
            if command.turns_left <= 1 {
                actor.advance();
                command.turns_left = command.turns;
            } else {
                command.turns_left -= 1;
            }
            MoveResult::Valid
        }
        CommandKind::Charge if !actor.id().is_pacman() => {
            actor.set_charged(true);
            actor.advance();
            MoveResult::Valid
        }
        CommandKind::Step(dir) => {
            actor.advance();
            if actor.is_charged() {
                actor.set_charged(false);
                return charge::dash(world, body, dir);
            }
            step(world, body, dir)
        }
        _ => {
            actor.advance();
            MoveResult::Invalid
        }
    }
}

/// Runs the actor's current scripted command, if it has a script.
pub fn play_scripted(world: &World, actor: &mut Actor) -> Option<MoveResult> {
    let slot = actor.current_slot()?;
    let mut command = actor.commands()[slot];
    let result = apply_move(world, actor, &mut command);
    actor.store_command(slot, command);
    Some(result)
}

fn step(world: &World, body: &ActorBody, dir: Direction) -> MoveResult {
    let grid = world.grid();
    let source = body.position();
    let Some(dest) = grid.index_of(grid.position_of(source).offset(dir)) else {
        return MoveResult::Invalid;
    };
    relocate(world, body, source, dest)
}

fn relocate(world: &World, body: &ActorBody, source: usize, dest: usize) -> MoveResult {
    let pair = world.grid().lock_pair(source, dest);
    if pair.is_same_cell() {
        return MoveResult::Invalid;
    }
    // Someone may have moved or killed us between reading and locking.
    if !body.is_alive() {
        return MoveResult::ActorDied;
    }
    if body.position() != source {
        return MoveResult::Invalid;
    }
    match body.id().kind {
        ActorKind::Pacman => pacman_enters(body, &pair),
        ActorKind::Ghost => ghost_enters(world, body, &pair),
    }
}

fn pacman_enters(body: &ActorBody, pair: &CellPair<'_>) -> MoveResult {
    let id = body.id();
    let target = pair.dest().get();

    if target.has_portal {
        pair.source().update(|cell| vacate(cell, id));
        pair.dest().update(|cell| {
            if cell.occupant.is_none() {
                cell.occupant = Some(id);
            }
        });
        body.move_to(pair.dest().index());
        return MoveResult::ReachedPortal;
    }
    if target.is_wall() {
        return MoveResult::Invalid;
    }
    if target.occupant.is_some_and(|other| other != id) {
        pair.source().update(|cell| vacate(cell, id));
        body.kill();
        return MoveResult::ActorDied;
    }

    if target.has_dot {
        body.add_points(POINTS_PER_DOT);
    }
    pair.source().update(|cell| vacate(cell, id));
    pair.dest().update(|cell| {
        cell.has_dot = false;
        cell.occupant = Some(id);
    });
    body.move_to(pair.dest().index());
    MoveResult::Valid
}

fn ghost_enters(world: &World, body: &ActorBody, pair: &CellPair<'_>) -> MoveResult {
    let id = body.id();
    let target = pair.dest().get();
    if target.is_wall() {
        return MoveResult::Invalid;
    }

    let result = match target.occupant {
        Some(other) if other.kind == ActorKind::Ghost => return MoveResult::Invalid,
        Some(victim) => {
            if let Some(victim_body) = world.body(victim) {
                victim_body.kill();
            }
            MoveResult::ActorDied
        }
        None => MoveResult::Valid,
    };

    pair.source().update(|cell| vacate(cell, id));
    pair.dest().update(|cell| cell.occupant = Some(id));
    body.move_to(pair.dest().index());
    result
}

fn vacate(cell: &mut Cell, id: ActorId) {
    if cell.occupant == Some(id) {
        cell.occupant = None;
    }
}
