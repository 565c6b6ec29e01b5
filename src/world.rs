use crate::actor::{Actor, ActorBody, ActorState};
use crate::error::LevelError;
use crate::grid::{Board, Grid};
use crate::types::{ActorId, ActorKind, Banner, Frame};

/// Everything needed to (re)start a level: the board at rest plus every
/// actor's body and controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelState {
    pub name: String,
    pub tempo_ms: u64,
    pub board: Board,
    pub pacman: ActorState,
    pub ghosts: Vec<ActorState>,
}

impl LevelState {
    pub fn frame(&self, banner: Banner) -> Frame {
        Frame {
            level: self.name.clone(),
            width: self.board.width,
            height: self.board.height,
            tempo_ms: self.tempo_ms,
            points: self.pacman.points,
            rows: self.board.rows(),
            banner,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cast {
    pub pacman: Actor,
    pub ghosts: Vec<Actor>,
}

/// A level in play. Shared by reference between all worker threads.
#[derive(Debug)]
pub struct World {
    name: String,
    tempo_ms: u64,
    grid: Grid,
    pacman: ActorBody,
    ghosts: Vec<ActorBody>,
}

impl World {
    pub fn from_state(state: &LevelState) -> Result<(World, Cast), LevelError> {
        let pacman = body_from_state(&state.board, &state.pacman)?;
        let ghosts = state
            .ghosts
            .iter()
            .map(|ghost| body_from_state(&state.board, ghost))
            .collect::<Result<Vec<_>, _>>()?;
        let world = World {
            name: state.name.clone(),
            tempo_ms: state.tempo_ms,
            grid: Grid::from_board(&state.board),
            pacman,
            ghosts,
        };
        let cast = Cast {
            pacman: state.pacman.actor.clone(),
            ghosts: state.ghosts.iter().map(|ghost| ghost.actor.clone()).collect(),
        };
        Ok((world, cast))
    }

    /// Freezes the level. Callers must have joined every mover first.
    pub fn capture(&self, cast: &Cast) -> LevelState {
        LevelState {
            name: self.name.clone(),
            tempo_ms: self.tempo_ms,
            board: self.grid.to_board(),
            pacman: self.actor_state(&self.pacman, &cast.pacman),
            ghosts: self
                .ghosts
                .iter()
                .zip(cast.ghosts.iter())
                .map(|(body, actor)| self.actor_state(body, actor))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tempo_ms(&self) -> u64 {
        self.tempo_ms
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pacman(&self) -> &ActorBody {
        &self.pacman
    }

    pub fn ghosts(&self) -> &[ActorBody] {
        &self.ghosts
    }

    pub fn body(&self, id: ActorId) -> Option<&ActorBody> {
        match id.kind {
            ActorKind::Pacman if id.index == 0 => Some(&self.pacman),
            ActorKind::Pacman => None,
            ActorKind::Ghost => self.ghosts.get(id.index as usize),
        }
    }

    pub fn frame(&self, banner: Banner) -> Frame {
        let board = self.grid.to_board();
        Frame {
            level: self.name.clone(),
            width: board.width,
            height: board.height,
            tempo_ms: self.tempo_ms,
            points: self.pacman.points(),
            rows: board.rows(),
            banner,
        }
    }

    fn actor_state(&self, body: &ActorBody, actor: &Actor) -> ActorState {
        ActorState {
            actor: actor.clone(),
            position: self.grid.position_of(body.position()),
            alive: body.is_alive(),
            points: body.points(),
        }
    }
}

fn body_from_state(board: &Board, state: &ActorState) -> Result<ActorBody, LevelError> {
    let index = board
        .index_of(state.position)
        .ok_or_else(|| LevelError::InvalidPosition {
            entity: state.actor.id().label(),
            x: state.position.x,
            y: state.position.y,
        })?;
    Ok(ActorBody::new(
        state.actor.id(),
        index,
        state.alive,
        state.points,
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::actor::{Actor, ActorState};
    use crate::command::Command;
    use crate::grid::{Board, Cell};
    use crate::types::{ActorId, Vec2};

    use super::LevelState;

    /// Builds a level from rows using the level-file alphabet plus `P`/`M`
    /// markers. Ghosts get scripts in marker order; pacman gets `pacman_script`.
    pub(crate) fn level_from_rows(
        rows: &[&str],
        pacman_script: Vec<Command>,
        ghost_scripts: Vec<Vec<Command>>,
    ) -> LevelState {
        let height = rows.len();
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut board = Board::new(width, height);
        let mut pacman = None;
        let mut ghosts = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let pos = Vec2::new(x as i32, y as i32);
                let cell = board.cell_mut(pos).expect("in bounds");
                *cell = match ch {
                    'X' => Cell::wall(),
                    '@' => Cell::portal(),
                    '.' => Cell::floor(true),
                    _ => Cell::floor(false),
                };
                match ch {
                    'P' => {
                        cell.occupant = Some(ActorId::PACMAN);
                        pacman = Some(pos);
                    }
                    'M' => {
                        cell.occupant = Some(ActorId::ghost(ghosts.len()));
                        ghosts.push(pos);
                    }
                    _ => {}
                }
            }
        }
        let pacman_pos = pacman.expect("fixture needs a pacman");
        let mut scripts = ghost_scripts.into_iter();
        LevelState {
            name: "fixture".to_string(),
            tempo_ms: 0,
            board,
            pacman: ActorState {
                actor: Actor::new(ActorId::PACMAN, 0, pacman_script, 11),
                position: pacman_pos,
                alive: true,
                points: 0,
            },
            ghosts: ghosts
                .into_iter()
                .enumerate()
                .map(|(idx, pos)| ActorState {
                    actor: Actor::new(
                        ActorId::ghost(idx),
                        0,
                        scripts.next().unwrap_or_default(),
                        100 + idx as u32,
                    ),
                    position: pos,
                    alive: true,
                    points: 0,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::level_from_rows;
    use super::*;
    use crate::types::Vec2;

    #[test]
    fn capture_of_untouched_world_equals_its_state() {
        let state = level_from_rows(&["XXXXX", "XP.MX", "X..@X", "XXXXX"], vec![], vec![]);
        let (world, cast) = World::from_state(&state).expect("valid state");
        assert_eq!(world.capture(&cast), state);
    }

    #[test]
    fn body_lookup_by_id() {
        let state = level_from_rows(&["P.M.M"], vec![], vec![]);
        let (world, _) = World::from_state(&state).expect("valid state");
        let ghost = world.body(ActorId::ghost(1)).expect("second ghost");
        assert_eq!(world.grid().position_of(ghost.position()), Vec2::new(4, 0));
        assert!(world.body(ActorId::ghost(2)).is_none());
    }

    #[test]
    fn from_state_rejects_out_of_bounds_actor() {
        let mut state = level_from_rows(&["P.."], vec![], vec![]);
        state.pacman.position = Vec2::new(9, 9);
        assert!(matches!(
            World::from_state(&state),
            Err(LevelError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn frame_reports_rows_and_points() {
        let mut state = level_from_rows(&["XXX", "P.@"], vec![], vec![]);
        state.pacman.points = 7;
        let (world, _) = World::from_state(&state).expect("valid state");
        let frame = world.frame(Banner::Playing);
        assert_eq!(frame.rows, vec!["WWW", "P.@"]);
        assert_eq!(frame.points, 7);
        assert_eq!(frame, state.frame(Banner::Playing));
    }
}
