//! Zobrist bit-strings and the node transposition table.
//!
//! Three families of 64-bit strings: `hash_bit` for position hashes (pass,
//! black, white, ko per intersection), `move_bit` distinguishing move-order
//! transpositions by (ply, position, color), and `shape_bit` used only for
//! nakade shape recognition.
//!
//! The transposition table maps (position hash, side to move, ply) to a node
//! index by open addressing with linear probing. Entries are never
//! overwritten while a search runs; eviction happens between searches, either
//! wholesale (`clear`) or by discarding entries older than the current game
//! ply (`delete_old`). Crossing 90% occupancy clears the `enough_size` flag,
//! which the workers observe and stop on.

use std::sync::OnceLock;

use anyhow::{Result, bail};

use crate::constants::*;

pub const HASH_PASS: usize = 0;
pub const HASH_BLACK: usize = 1;
pub const HASH_WHITE: usize = 2;
pub const HASH_KO: usize = 3;

pub struct ZobristTable {
    hash_bit: Vec<[u64; 4]>,
    shape_bit: Vec<u64>,
    move_bit: Vec<u64>,
}

impl ZobristTable {
    fn generate() -> Self {
        let mut rng = fastrand::Rng::with_seed(0x9E37_79B9_7F4A_7C15);
        ZobristTable {
            hash_bit: (0..BOARD_MAX)
                .map(|_| [rng.u64(..), rng.u64(..), rng.u64(..), rng.u64(..)])
                .collect(),
            shape_bit: (0..BOARD_MAX).map(|_| rng.u64(..)).collect(),
            move_bit: (0..MAX_RECORDS * BOARD_MAX * 2).map(|_| rng.u64(..)).collect(),
        }
    }

    /// Bit-string for a stone or marker at `pos`.
    #[inline]
    pub fn hash_bit(&self, pos: Pos, kind: usize) -> u64 {
        self.hash_bit[pos][kind]
    }

    /// Bit-string for move number `ply` playing `color` at `pos`.
    #[inline]
    pub fn move_bit(&self, ply: usize, pos: Pos, color: u8) -> u64 {
        self.move_bit[(ply * BOARD_MAX + pos) * 2 + (color as usize - 1)]
    }

    /// Bit-string for shape recognition.
    #[inline]
    pub fn shape_bit(&self, pos: Pos) -> u64 {
        self.shape_bit[pos]
    }
}

static ZOBRIST: OnceLock<ZobristTable> = OnceLock::new();

/// The process-wide bit-string tables, generated on first use.
pub fn zobrist() -> &'static ZobristTable {
    ZOBRIST.get_or_init(ZobristTable::generate)
}

// =============================================================================
// Transposition table
// =============================================================================

#[derive(Clone, Copy, Default)]
struct NodeHashEntry {
    hash: u64,
    color: u8,
    moves: usize,
    flag: bool,
}

pub struct NodeHashTable {
    entries: Vec<NodeHashEntry>,
    size: usize,
    limit: usize,
    used: usize,
    oldest_move: usize,
    enough_size: bool,
}

impl NodeHashTable {
    /// Allocate a table of `size` entries. `size` must be a power of two.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || (size & (size - 1)) != 0 {
            bail!("tree size must be a power of two, got {size}");
        }
        Ok(NodeHashTable {
            entries: vec![NodeHashEntry::default(); size],
            size,
            limit: size * 9 / 10,
            used: 0,
            oldest_move: 1,
            enough_size: true,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// True while occupancy stays under the 90% limit.
    pub fn enough_size(&self) -> bool {
        self.enough_size
    }

    #[inline]
    fn key(&self, hash: u64) -> usize {
        (((hash & 0xFFFF_FFFF) ^ (hash >> 32)) as usize) & (self.size - 1)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = NodeHashEntry::default());
        self.used = 0;
        self.oldest_move = 1;
        self.enough_size = true;
    }

    /// Drop entries recorded before the current game ply, freeing the part of
    /// the tree the game has moved past while keeping the reusable subtree.
    pub fn delete_old(&mut self, current_moves: usize) {
        while self.oldest_move < current_moves {
            for e in self.entries.iter_mut() {
                if e.flag && e.moves == self.oldest_move {
                    *e = NodeHashEntry::default();
                    self.used -= 1;
                }
            }
            self.oldest_move += 1;
        }
        self.enough_size = true;
    }

    /// Claim an unused slot for (hash, color, moves). `None` when full.
    pub fn claim_empty_index(&mut self, hash: u64, color: u8, moves: usize) -> Option<usize> {
        let key = self.key(hash);
        let mut i = key;
        loop {
            if !self.entries[i].flag {
                self.entries[i] = NodeHashEntry { hash, color, moves, flag: true };
                self.used += 1;
                if self.used > self.limit {
                    self.enough_size = false;
                }
                return Some(i);
            }
            i = (i + 1) & (self.size - 1);
            if i == key {
                return None;
            }
        }
    }

    /// Find the slot already holding (hash, color, moves), if any.
    pub fn find_same_index(&self, hash: u64, color: u8, moves: usize) -> Option<usize> {
        let key = self.key(hash);
        let mut i = key;
        loop {
            let e = &self.entries[i];
            if !e.flag {
                return None;
            }
            if e.hash == hash && e.color == color && e.moves == moves {
                return Some(i);
            }
            i = (i + 1) & (self.size - 1);
            if i == key {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(NodeHashTable::new(1000).is_err());
        assert!(NodeHashTable::new(1024).is_ok());
    }

    #[test]
    fn claim_then_find() {
        let mut table = NodeHashTable::new(64).unwrap();
        let idx = table.claim_empty_index(0xDEAD_BEEF, S_BLACK, 10).unwrap();
        assert_eq!(table.find_same_index(0xDEAD_BEEF, S_BLACK, 10), Some(idx));
        assert_eq!(table.find_same_index(0xDEAD_BEEF, S_WHITE, 10), None);
    }

    #[test]
    fn delete_old_drops_stale_plies() {
        let mut table = NodeHashTable::new(64).unwrap();
        table.claim_empty_index(1, S_BLACK, 1).unwrap();
        table.claim_empty_index(2, S_WHITE, 2).unwrap();
        let keep = table.claim_empty_index(3, S_BLACK, 3).unwrap();
        table.delete_old(3);
        assert_eq!(table.find_same_index(1, S_BLACK, 1), None);
        assert_eq!(table.find_same_index(2, S_WHITE, 2), None);
        assert_eq!(table.find_same_index(3, S_BLACK, 3), Some(keep));
    }

    #[test]
    fn occupancy_limit_clears_enough_size() {
        let mut table = NodeHashTable::new(16).unwrap();
        for i in 0..15 {
            let _ = table.claim_empty_index(i as u64 * 7919, S_BLACK, 1);
        }
        assert!(!table.enough_size());
    }
}
