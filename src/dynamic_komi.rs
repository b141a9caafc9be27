//! Dynamic komi for handicap games.
//!
//! With stones on the board before the game starts, a plain komi saturates
//! every playout; the engine instead pretends the komi is larger and shrinks
//! it as the game progresses (linear mode), or nudges it whenever the root
//! winrate leaves the comfortable band (value mode). Off without handicap.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::debug;

use crate::board::GameState;
use crate::constants::*;

/// Relax the komi below this winrate.
const RED: f64 = 0.35;
/// Stress the komi above this winrate.
const GREEN: f64 = 0.75;
/// Ply at which the linear schedule bottoms out.
const LINEAR_THRESHOLD: usize = 200;
/// Extra komi per handicap stone at the start of the schedule.
const HANDICAP_WEIGHT: f64 = 8.0;

const DK_OFF: usize = 0;
const DK_LINEAR: usize = 1;
const DK_VALUE: usize = 2;

pub struct DynamicKomi {
    mode: AtomicUsize,
    handicap_num: AtomicUsize,
    const_handicap: AtomicUsize,
    /// Adjusted komi: shared, then per-color offsets of +-1.
    komi: [AtomicU64; 3],
}

impl DynamicKomi {
    pub fn new() -> DynamicKomi {
        DynamicKomi {
            mode: AtomicUsize::new(DK_OFF),
            handicap_num: AtomicUsize::new(0),
            const_handicap: AtomicUsize::new(0),
            komi: [
                AtomicU64::new(KOMI.to_bits()),
                AtomicU64::new((KOMI + 1.0).to_bits()),
                AtomicU64::new((KOMI - 1.0).to_bits()),
            ],
        }
    }

    pub fn set_komi(&self, komi: f64) {
        self.store(komi);
    }

    pub fn set_handicap_num(&self, num: usize) {
        if self.const_handicap.load(Ordering::Relaxed) == 0 {
            self.handicap_num.store(num, Ordering::Relaxed);
            let mode = self.mode.load(Ordering::Relaxed);
            if mode != DK_OFF && num == 0 {
                self.mode.store(DK_OFF, Ordering::Relaxed);
            } else if mode == DK_OFF && num != 0 {
                self.mode.store(DK_LINEAR, Ordering::Relaxed);
            }
        } else {
            self.handicap_num
                .store(self.const_handicap.load(Ordering::Relaxed), Ordering::Relaxed);
            self.mode.store(DK_LINEAR, Ordering::Relaxed);
        }
    }

    pub fn set_const_handicap_num(&self, num: usize) {
        self.const_handicap.store(num, Ordering::Relaxed);
    }

    /// The adjusted komi for `color` (0 = colorless).
    #[inline]
    pub fn value(&self, color: usize) -> f64 {
        f64::from_bits(self.komi[color].load(Ordering::Relaxed))
    }

    fn store(&self, komi: f64) {
        self.komi[0].store(komi.to_bits(), Ordering::Relaxed);
        self.komi[S_BLACK as usize].store((komi + 1.0).to_bits(), Ordering::Relaxed);
        self.komi[S_WHITE as usize].store((komi - 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Called once before each search with the reused root's winrate.
    pub fn adjust(&self, game: &GameState, root_winrate: f64, color: u8) {
        if self.handicap_num.load(Ordering::Relaxed) == 0 {
            self.store(game.komi[0]);
            return;
        }
        match self.mode.load(Ordering::Relaxed) {
            DK_LINEAR => self.linear_handicap(game),
            DK_VALUE => self.value_situational(root_winrate, color),
            _ => {}
        }
    }

    fn linear_handicap(&self, game: &GameState) {
        let handicap = self.handicap_num.load(Ordering::Relaxed) as f64;
        let new_komi = if game.moves > LINEAR_THRESHOLD - 15 {
            handicap + 0.5
        } else {
            HANDICAP_WEIGHT * handicap * (1.0 - game.moves as f64 / LINEAR_THRESHOLD as f64)
        };
        self.store(new_komi);
        debug!("dynamic komi {new_komi:.1}");
    }

    fn value_situational(&self, winrate: f64, color: u8) {
        let mut komi = self.value(0);
        if color == S_BLACK {
            if winrate < RED {
                komi -= 1.0;
            } else if winrate > GREEN {
                komi += 1.0;
            }
        } else if color == S_WHITE {
            if winrate < RED {
                komi += 1.0;
            } else if winrate > GREEN {
                komi -= 1.0;
            }
        }
        self.store(komi);
        debug!("dynamic komi {komi:.1}");
    }
}

impl Default for DynamicKomi {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    #[test]
    fn no_handicap_tracks_game_komi() {
        let dk = DynamicKomi::new();
        let mut game = GameState::new(Geometry::new(9));
        game.set_komi(5.5);
        dk.adjust(&game, 0.5, S_BLACK);
        assert_eq!(dk.value(0), 5.5);
        assert_eq!(dk.value(S_BLACK as usize), 6.5);
        assert_eq!(dk.value(S_WHITE as usize), 4.5);
    }

    #[test]
    fn linear_handicap_shrinks_with_moves() {
        let dk = DynamicKomi::new();
        dk.set_handicap_num(4);
        let game = GameState::new(Geometry::new(9));
        dk.adjust(&game, 0.5, S_WHITE);
        let early = dk.value(0);
        assert!(early > 20.0, "early handicap komi should be large, got {early}");
    }
}
