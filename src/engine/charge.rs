use crate::actor::ActorBody;
use crate::grid::Grid;
use crate::types::{Direction, MoveResult, Vec2};
use crate::world::World;

use super::relocate;

/// Finds where a charged dash from `from` ends: one cell short of the first
/// wall or ghost, on the first pacman, or on the last cell before the edge.
/// Cells are read without their locks; the final move revalidates.
pub fn dash_target(grid: &Grid, from: Vec2, dir: Direction) -> Option<usize> {
    let mut landing = None;
    let mut cursor = from.offset(dir);
    while let Some(idx) = grid.index_of(cursor) {
        let cell = grid.peek(idx);
        if cell.is_wall() {
            break;
        }
        match cell.occupant {
            Some(id) if id.is_pacman() => return Some(idx),
            Some(_) => break,
            None => {}
        }
        landing = Some(idx);
        cursor = cursor.offset(dir);
    }
    landing
}

pub(super) fn dash(world: &World, body: &ActorBody, dir: Direction) -> MoveResult {
    let grid = world.grid();
    let source = body.position();
    match dash_target(grid, grid.position_of(source), dir) {
        Some(dest) => relocate(world, body, source, dest),
        None => MoveResult::Invalid,
    }
}
