pub const DEFAULT_TEMPO_MS: u64 = 10;

pub const MAX_COMMANDS_PER_ACTOR: usize = 20;
pub const MAX_GHOSTS: usize = 25;
pub const MAX_LEVELS: usize = 20;
pub const MAX_DIMENSION: usize = 256;

pub const POINTS_PER_DOT: u32 = 1;

pub const LEVEL_EXTENSION: &str = "lvl";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Reserved status of a duplicate that died after a save. Only the
/// supervisor ever sees it.
pub const EXIT_DIED_WHILE_SAVED: i32 = 42;

pub const BANNER_HOLD_MS: u64 = 2_000;

pub fn derive_actor_seed(session_seed: u32, stream: u32) -> u32 {
    session_seed
        .wrapping_mul(0x9e37_79b9)
        .wrapping_add(stream.wrapping_mul(0x85eb_ca6b))
        .rotate_left(13)
}
