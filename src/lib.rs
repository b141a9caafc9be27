//! tengen: a parallel Monte-Carlo tree search Go engine.
//!
//! Three tightly coupled subsystems form the core: the board engine with
//! incremental string/liberty tracking and pattern hashes ([`board`],
//! [`pattern`], [`zobrist`]), the biased playout policy ([`rating`],
//! [`simulation`]), and the parallel UCT search with progressive widening
//! and a transposition table ([`uct`], [`uct_rating`]). The GTP surface in
//! [`gtp`] is the only intended external interface.
//!
//! ## Example
//!
//! ```no_run
//! use tengen::board::{GameState, Geometry};
//! use tengen::constants::S_BLACK;
//! use tengen::rating::SimParams;
//! use tengen::uct::{SearchMode, SearchOptions, UctSearcher};
//! use tengen::uct_rating::UctParams;
//!
//! let geo = Geometry::new(9);
//! let game = GameState::new(geo.clone());
//! let options = SearchOptions {
//!     mode: SearchMode::ConstPlayout,
//!     playout: 1000,
//!     ..SearchOptions::default()
//! };
//! let searcher = UctSearcher::new(
//!     geo,
//!     16384,
//!     options,
//!     SimParams::neutral(),
//!     UctParams::neutral(),
//! )
//! .unwrap();
//! let best = searcher.genmove(&game, S_BLACK);
//! println!("best move index: {best}");
//! ```

pub mod board;
pub mod constants;
pub mod dynamic_komi;
pub mod gtp;
pub mod ladder;
pub mod nakade;
pub mod params;
pub mod pattern;
pub mod pattern_hash;
pub mod point;
pub mod rating;
pub mod search_board;
pub mod seki;
pub mod semeai;
pub mod sgf;
pub mod simulation;
pub mod uct;
pub mod uct_rating;
pub mod zobrist;
