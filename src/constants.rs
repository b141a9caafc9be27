//! Board geometry maxima and search parameters.
//!
//! The board is a 1-D array padded with a guard ring of `OB_SIZE`
//! intersections so that pattern lookups two steps past the edge never read
//! out of bounds. All arrays are sized for the largest supported board
//! (19x19); the size actually in play is carried by [`crate::board::Geometry`].

/// Largest supported board edge.
pub const PURE_BOARD_SIZE: usize = 19;

/// Width of the off-board guard ring.
pub const OB_SIZE: usize = 5;

/// Padded board edge for the largest board.
pub const BOARD_SIZE: usize = PURE_BOARD_SIZE + 2 * OB_SIZE;

/// Playable intersections on the largest board.
pub const PURE_BOARD_MAX: usize = PURE_BOARD_SIZE * PURE_BOARD_SIZE;

/// Padded intersections on the largest board.
pub const BOARD_MAX: usize = BOARD_SIZE * BOARD_SIZE;

/// Capacity of the string pool.
pub const MAX_STRING: usize = PURE_BOARD_MAX * 4 / 5;

/// Capacity of a string's neighbor-ID list.
pub const MAX_NEIGHBOR: usize = MAX_STRING;

/// Upper bound on any position index a string can reference.
pub const STRING_POS_MAX: usize = BOARD_SIZE * (PURE_BOARD_SIZE + OB_SIZE);

/// Recorded moves per game.
pub const MAX_RECORDS: usize = PURE_BOARD_MAX * 3;

/// Hard cap on the move counter.
pub const MAX_MOVES: usize = MAX_RECORDS - 1;

/// A point on the padded board, or one of the two sentinels below.
pub type Pos = usize;

/// Pass sentinel. Index 0 lies in the guard ring, so it is never a real move.
pub const PASS: Pos = 0;

/// Resign sentinel.
pub const RESIGN: Pos = usize::MAX;

// Stone colors. Flipping between black and white is `color ^ 0x3`.
pub const S_EMPTY: u8 = 0;
pub const S_BLACK: u8 = 1;
pub const S_WHITE: u8 = 2;
pub const S_OB: u8 = 3;
pub const S_MAX: usize = 4;

/// Flip black to white and vice versa.
#[inline]
pub const fn flip_color(color: u8) -> u8 {
    color ^ 0x3
}

/// Default komi.
pub const KOMI: f64 = 6.5;

// =============================================================================
// Search parameters
// =============================================================================

/// Hard cap on worker threads.
pub const THREAD_MAX: usize = 64;

/// Default total clock in time-setting mode (seconds).
pub const ALL_THINKING_TIME: f64 = 90.0;

/// Default playouts per move in constant-playout mode.
pub const CONST_PLAYOUT: usize = 10_000;

/// Default seconds per move in constant-time mode.
pub const CONST_TIME: f64 = 10.0;

/// Assumed playout speed for the first time-budget estimate.
pub const PLAYOUT_SPEED: usize = 1000;

// Time allocation: a 9x9 game divides the clock by a flat rate, larger
// boards by (C + remaining plies) with a per-size ply horizon.
pub const TIME_RATE_9: usize = 20;
pub const TIME_C_13: usize = 30;
pub const TIME_MAXPLY_13: usize = 30;
pub const TIME_C_19: usize = 60;
pub const TIME_MAXPLY_19: usize = 80;

/// Playouts between ownership/criticality refreshes.
pub const CRITICALITY_INTERVAL: usize = 100;

/// First-play urgency for unvisited children.
pub const FPU: f64 = 5.0;

/// Progressive widening growth factor.
pub const PROGRESSIVE_WIDENING: f64 = 1.8;

// Visits before a child is expanded into a node of its own.
pub const EXPAND_THRESHOLD_9: i32 = 20;
pub const EXPAND_THRESHOLD_13: i32 = 25;
pub const EXPAND_THRESHOLD_19: i32 = 40;

/// Children per node: every intersection plus pass.
pub const UCT_CHILD_MAX: usize = PURE_BOARD_MAX + 1;

/// Child slot not yet expanded into a node.
pub const NOT_EXPANDED: i32 = -1;

/// The pass child is always the first one.
pub const PASS_INDEX: usize = 0;

// UCB rate bonus.
pub const BONUS_EQUIVALENCE: f64 = 1000.0;
pub const BONUS_WEIGHT: f64 = 0.35;

/// Winrate above which a pass answers a pass.
pub const PASS_THRESHOLD: f64 = 0.90;

/// Winrate below which the engine resigns.
pub const RESIGN_THRESHOLD: f64 = 0.20;

/// Pessimistic credit added to a child while a worker descends through it.
pub const VIRTUAL_LOSS: i32 = 1;

/// Ownership histogram buckets (0-5%, 6-15%, ..., 96-100%).
pub const OWNER_MAX: usize = 11;

/// Criticality histogram buckets.
pub const CRITICALITY_MAX: usize = 7;

pub const OWNER_K: f64 = 0.05;
pub const OWNER_BIAS: f64 = 34.0;
pub const CRITICALITY_BIAS: f64 = 0.036;

// =============================================================================
// Simulation parameters
// =============================================================================

/// Distance-2/3 bias applied on top of the learned previous-distance gamma.
pub const NEIGHBOR_BIAS: f64 = 7.52598;

/// Distance-4 (jump) bias.
pub const JUMP_BIAS: f64 = 4.63207;

/// Rate boost for a nakade vital point.
pub const NAKADE_GAMMA: f64 = 10000.0;

/// Intersections within MD2 reach of a move (the point itself included).
pub const MD2_UPDATE_NUM: usize = 13;

/// Learned previous-move-distance categories (distance 2, 3, 4).
pub const PREVIOUS_DISTANCE_MAX: usize = 3;

/// Move-distance saturation for the UCT distance features.
pub const MOVE_DISTANCE_MAX: usize = 16;

/// Distinct positions under the 8-fold board symmetry, plus one for pass.
pub const POS_ID_MAX: usize = 64;

/// Latent factor dimension of the factorization-machines prior.
pub const LFR_DIMENSION: usize = 5;

// =============================================================================
// Pattern spaces
// =============================================================================

/// 2^16 possible 3x3 codes.
pub const PAT3_MAX: usize = 1 << 16;

/// 2^24 possible MD2 codes.
pub const MD2_MAX: usize = 1 << 24;

// =============================================================================
// Transposition table
// =============================================================================

/// Default node-table size. Must stay a power of two.
pub const UCT_HASH_SIZE: usize = 16384;
