use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{ActorId, ActorKind, Vec2};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub tile: Tile,
    pub has_dot: bool,
    pub has_portal: bool,
    pub occupant: Option<ActorId>,
}

const WALL_BIT: u64 = 1;
const DOT_BIT: u64 = 1 << 1;
const PORTAL_BIT: u64 = 1 << 2;
const KIND_SHIFT: u32 = 3;
const KIND_MASK: u64 = 0b11 << KIND_SHIFT;
const INDEX_SHIFT: u32 = 32;

impl Cell {
    pub fn wall() -> Self {
        Self {
            tile: Tile::Wall,
            ..Self::default()
        }
    }

    pub fn floor(has_dot: bool) -> Self {
        Self {
            has_dot,
            ..Self::default()
        }
    }

    pub fn portal() -> Self {
        Self {
            has_portal: true,
            ..Self::default()
        }
    }

    pub fn is_wall(&self) -> bool {
        self.tile == Tile::Wall
    }

    pub fn is_free(&self) -> bool {
        !self.is_wall() && !self.has_portal && self.occupant.is_none()
    }

    pub fn glyph(&self) -> char {
        match self.occupant {
            Some(id) if id.kind == ActorKind::Pacman => return 'P',
            Some(_) => return 'M',
            None => {}
        }
        if self.is_wall() {
            'W'
        } else if self.has_portal {
            '@'
        } else if self.has_dot {
            '.'
        } else {
            ' '
        }
    }

    fn pack(self) -> u64 {
        let mut word = 0u64;
        if self.is_wall() {
            word |= WALL_BIT;
        }
        if self.has_dot {
            word |= DOT_BIT;
        }
        if self.has_portal {
            word |= PORTAL_BIT;
        }
        if let Some(id) = self.occupant {
            let kind = match id.kind {
                ActorKind::Pacman => 1u64,
                ActorKind::Ghost => 2u64,
            };
            word |= kind << KIND_SHIFT;
            word |= (id.index as u64) << INDEX_SHIFT;
        }
        word
    }

    fn unpack(word: u64) -> Self {
        let occupant = match (word & KIND_MASK) >> KIND_SHIFT {
            1 => Some(ActorKind::Pacman),
            2 => Some(ActorKind::Ghost),
            _ => None,
        }
        .map(|kind| ActorId {
            kind,
            index: (word >> INDEX_SHIFT) as u32,
        });
        Self {
            tile: if word & WALL_BIT != 0 {
                Tile::Wall
            } else {
                Tile::Empty
            },
            has_dot: word & DOT_BIT != 0,
            has_portal: word & PORTAL_BIT != 0,
            occupant,
        }
    }
}

/// At-rest form of a level grid. Plain data, cheap to clone and compare.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    pub fn index_of(&self, pos: Vec2) -> Option<usize> {
        linear_index(self.width, self.height, pos)
    }

    pub fn cell(&self, pos: Vec2) -> Option<&Cell> {
        self.index_of(pos).map(|idx| &self.cells[idx])
    }

    pub fn cell_mut(&mut self, pos: Vec2) -> Option<&mut Cell> {
        let idx = self.index_of(pos)?;
        Some(&mut self.cells[idx])
    }

    /// First cell in row-major order that is neither wall, portal nor occupied.
    pub fn first_free(&self) -> Option<Vec2> {
        self.cells
            .iter()
            .position(Cell::is_free)
            .map(|idx| position_of(self.width, idx))
    }

    pub fn count_dots(&self) -> usize {
        self.cells.iter().filter(|cell| cell.has_dot).count()
    }

    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(Cell::glyph).collect())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct LockStats {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl LockStats {
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// Live, shared grid. Cell words and their locks live in parallel arrays.
/// Writes happen only while the cell's lock is held; `peek` reads without it.
#[derive(Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<AtomicU64>,
    locks: Vec<Mutex<()>>,
    stats: LockStats,
}

impl Grid {
    pub fn from_board(board: &Board) -> Self {
        Self {
            width: board.width,
            height: board.height,
            cells: board
                .cells
                .iter()
                .map(|cell| AtomicU64::new(cell.pack()))
                .collect(),
            locks: board.cells.iter().map(|_| Mutex::new(())).collect(),
            stats: LockStats::default(),
        }
    }

    /// Copies every cell without locking. Only exact when no mover is running.
    pub fn to_board(&self) -> Board {
        Board {
            width: self.width,
            height: self.height,
            cells: (0..self.cells.len()).map(|idx| self.peek(idx)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    pub fn index_of(&self, pos: Vec2) -> Option<usize> {
        linear_index(self.width, self.height, pos)
    }

    pub fn position_of(&self, index: usize) -> Vec2 {
        position_of(self.width, index)
    }

    pub fn peek(&self, index: usize) -> Cell {
        Cell::unpack(self.cells[index].load(Ordering::Acquire))
    }

    pub fn lock(&self, index: usize) -> CellLock<'_> {
        let guard = self.locks[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        CellLock {
            grid: self,
            index,
            _guard: guard,
        }
    }

    /// Locks two cells in ascending index order; a shared index is locked once.
    pub fn lock_pair(&self, source: usize, dest: usize) -> CellPair<'_> {
        if source == dest {
            return CellPair {
                source: self.lock(source),
                dest: None,
            };
        }
        if source < dest {
            let source = self.lock(source);
            let dest = self.lock(dest);
            CellPair {
                source,
                dest: Some(dest),
            }
        } else {
            let dest = self.lock(dest);
            let source = self.lock(source);
            CellPair {
                source,
                dest: Some(dest),
            }
        }
    }
}

pub struct CellLock<'a> {
    grid: &'a Grid,
    index: usize,
    _guard: MutexGuard<'a, ()>,
}

impl CellLock<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self) -> Cell {
        Cell::unpack(self.grid.cells[self.index].load(Ordering::Acquire))
    }

    pub fn set(&self, cell: Cell) {
        self.grid.cells[self.index].store(cell.pack(), Ordering::Release);
    }

    pub fn update(&self, apply: impl FnOnce(&mut Cell)) {
        let mut cell = self.get();
        apply(&mut cell);
        self.set(cell);
    }
}

impl Drop for CellLock<'_> {
    fn drop(&mut self) {
        self.grid.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct CellPair<'a> {
    source: CellLock<'a>,
    dest: Option<CellLock<'a>>,
}

impl<'a> CellPair<'a> {
    pub fn source(&self) -> &CellLock<'a> {
        &self.source
    }

    pub fn dest(&self) -> &CellLock<'a> {
        self.dest.as_ref().unwrap_or(&self.source)
    }

    pub fn is_same_cell(&self) -> bool {
        self.dest.is_none()
    }
}

fn linear_index(width: usize, height: usize, pos: Vec2) -> Option<usize> {
    if pos.x < 0 || pos.y < 0 {
        return None;
    }
    let (x, y) = (pos.x as usize, pos.y as usize);
    if x >= width || y >= height {
        return None;
    }
    Some(y * width + x)
}

fn position_of(width: usize, index: usize) -> Vec2 {
    let width = width.max(1);
    Vec2::new((index % width) as i32, (index / width) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_board() -> Board {
        let mut board = Board::new(4, 3);
        for cell in board.cells.iter_mut() {
            *cell = Cell::floor(true);
        }
        *board.cell_mut(Vec2::new(0, 0)).expect("in bounds") = Cell::wall();
        *board.cell_mut(Vec2::new(3, 2)).expect("in bounds") = Cell::portal();
        board.cell_mut(Vec2::new(1, 0)).expect("in bounds").occupant = Some(ActorId::PACMAN);
        board.cell_mut(Vec2::new(2, 1)).expect("in bounds").occupant = Some(ActorId::ghost(7));
        board
    }

    #[test]
    fn grid_preserves_board_contents() {
        let board = sample_board();
        let grid = Grid::from_board(&board);
        assert_eq!(grid.to_board(), board);
        assert_eq!(grid.peek(6).occupant, Some(ActorId::ghost(7)));
    }

    #[test]
    fn rows_render_glyphs() {
        let rows = sample_board().rows();
        assert_eq!(rows, vec!["WP..", "..M.", "...@"]);
    }

    #[test]
    fn index_of_rejects_out_of_bounds() {
        let grid = Grid::from_board(&Board::new(4, 3));
        assert_eq!(grid.index_of(Vec2::new(-1, 0)), None);
        assert_eq!(grid.index_of(Vec2::new(4, 0)), None);
        assert_eq!(grid.index_of(Vec2::new(0, 3)), None);
        assert_eq!(grid.index_of(Vec2::new(3, 2)), Some(11));
        assert_eq!(grid.position_of(11), Vec2::new(3, 2));
    }

    #[test]
    fn first_free_skips_walls_portals_and_occupants() {
        let board = sample_board();
        assert_eq!(board.first_free(), Some(Vec2::new(2, 0)));
    }

    #[test]
    fn lock_pair_on_same_cell_locks_once() {
        let grid = Grid::from_board(&Board::new(2, 2));
        {
            let pair = grid.lock_pair(1, 1);
            assert!(pair.is_same_cell());
            assert_eq!(pair.source().index(), pair.dest().index());
            assert_eq!(grid.stats().held(), 1);
        }
        assert_eq!(grid.stats().acquired(), 1);
        assert_eq!(grid.stats().released(), 1);
    }

    #[test]
    fn lock_pair_keeps_roles_regardless_of_order() {
        let grid = Grid::from_board(&Board::new(3, 1));
        let pair = grid.lock_pair(2, 0);
        assert_eq!(pair.source().index(), 2);
        assert_eq!(pair.dest().index(), 0);
        pair.dest().update(|cell| cell.has_dot = true);
        drop(pair);
        assert!(grid.peek(0).has_dot);
        assert_eq!(grid.stats().held(), 0);
        assert_eq!(grid.stats().acquired(), 2);
    }

    #[test]
    fn opposite_pairs_do_not_deadlock() {
        let grid = Grid::from_board(&Board::new(2, 1));
        std::thread::scope(|scope| {
            for flip in [false, true] {
                let grid = &grid;
                scope.spawn(move || {
                    for _ in 0..2_000 {
                        let (a, b) = if flip { (1, 0) } else { (0, 1) };
                        let pair = grid.lock_pair(a, b);
                        pair.source().update(|cell| cell.has_dot = !cell.has_dot);
                    }
                });
            }
        });
        assert_eq!(grid.stats().held(), 0);
        assert_eq!(grid.stats().acquired(), 8_000);
    }
}
