//! 64-bit hashes of the concentric pattern words.
//!
//! Learned large patterns are keyed by a symmetry-invariant hash: all sixteen
//! images of the MD2..MD5 words are generated, the image minimizing the
//! (cumulative) word value picks the canonical orientation, and the canonical
//! words are folded through fixed random bitstrings, one per (shell point,
//! color). Each larger shell XORs in the hashes of the shells it contains so
//! that an MD4 hash identifies the whole disk, not just the ring.

use std::collections::HashMap;

use crate::constants::*;
use crate::pattern::{self, PatternSet};

/// One bitstring per shell point (12 + 12 + 16 + 20) and per field value.
const BIT_MAX: usize = 60;

fn bitstrings() -> &'static [[u64; S_MAX]; BIT_MAX] {
    static BITS: std::sync::OnceLock<[[u64; S_MAX]; BIT_MAX]> = std::sync::OnceLock::new();
    BITS.get_or_init(|| {
        let mut rng = fastrand::Rng::with_seed(0xC96D_191C_F6F6_AEA6);
        std::array::from_fn(|_| std::array::from_fn(|_| rng.u64(..)))
    })
}

/// Canonical hashes of every shell around one intersection.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PatternHashValue {
    pub md2: u64,
    pub md3: u64,
    pub md4: u64,
    pub md5: u64,
}

fn fold(word: u64, points: usize, base: usize) -> u64 {
    let bits = bitstrings();
    let mut hash = 0;
    for i in 0..points {
        hash ^= bits[base + i][((word >> (2 * i)) & 0x3) as usize];
    }
    hash
}

pub fn md2_hash(md2: u32) -> u64 {
    fold(md2 as u64, 12, 0)
}

pub fn md3_hash(md3: u32) -> u64 {
    fold(md3 as u64, 12, 12)
}

pub fn md4_hash(md4: u32) -> u64 {
    fold(md4 as u64, 16, 24)
}

pub fn md5_hash(md5: u64) -> u64 {
    fold(md5, 20, 40)
}

/// Hash every shell at `pos`, canonicalized over the sixteen symmetries.
pub fn pattern_hash(pat: &PatternSet, pos: Pos) -> PatternHashValue {
    let md2 = pattern::md2_transpose16(pat.md2(pos));
    let md3 = pattern::md3_transpose16(pat.md3(pos));
    let md4 = pattern::md4_transpose16(pat.md4(pos));
    let md5 = pattern::md5_transpose16(pat.md5(pos));

    let mut idx2 = 0;
    let mut idx3 = 0;
    let mut idx4 = 0;
    let mut idx5 = 0;
    let mut min2 = md2[0] as u64;
    let mut min3 = md3[0] as u64 + md2[0] as u64;
    let mut min4 = md4[0] as u64 + md3[0] as u64 + md2[0] as u64;
    let mut min5 = md5[0] + md4[0] as u64 + md3[0] as u64 + md2[0] as u64;

    for i in 1..16 {
        let t2 = md2[i] as u64;
        if t2 < min2 {
            min2 = t2;
            idx2 = i;
        }
        let t3 = md3[i] as u64 + md2[i] as u64;
        if t3 < min3 {
            min3 = t3;
            idx3 = i;
        }
        let t4 = md4[i] as u64 + md3[i] as u64 + md2[i] as u64;
        if t4 < min4 {
            min4 = t4;
            idx4 = i;
        }
        let t5 = md5[i] + md4[i] as u64 + md3[i] as u64 + md2[i] as u64;
        if t5 < min5 {
            min5 = t5;
            idx5 = i;
        }
    }

    PatternHashValue {
        md2: md2_hash(md2[idx2]),
        md3: md3_hash(md3[idx3]) ^ md2_hash(md2[idx3]),
        md4: md4_hash(md4[idx4]) ^ md3_hash(md3[idx4]) ^ md2_hash(md2[idx4]),
        md5: md5_hash(md5[idx5]) ^ md4_hash(md4[idx5]) ^ md3_hash(md3[idx5]) ^ md2_hash(md2[idx5]),
    }
}

/// Index of learned large patterns by canonical hash.
#[derive(Default)]
pub struct LargePatternIndex {
    map: HashMap<u64, usize>,
}

impl LargePatternIndex {
    pub fn insert(&mut self, hash: u64, index: usize) {
        self.map.insert(hash, index);
    }

    pub fn lookup(&self, hash: u64) -> Option<usize> {
        self.map.get(&hash).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    #[test]
    fn hash_is_symmetry_invariant() {
        let geo = Geometry::new(19);
        let mut a = PatternSet::new(geo.board_max);
        let mut b = PatternSet::new(geo.board_max);
        a.clear(&geo);
        b.clear(&geo);

        let center = geo.pos(14, 14);
        // An L of stones and its 90-degree rotation around the center.
        a.update_stone(&geo, S_BLACK, geo.north(center));
        a.update_stone(&geo, S_BLACK, geo.east(center));
        a.update_stone(&geo, S_WHITE, geo.east(geo.east(center)));

        b.update_stone(&geo, S_BLACK, geo.east(center));
        b.update_stone(&geo, S_BLACK, geo.south(center));
        b.update_stone(&geo, S_WHITE, geo.south(geo.south(center)));

        assert_eq!(pattern_hash(&a, center), pattern_hash(&b, center));
    }

    #[test]
    fn different_shapes_hash_differently() {
        let geo = Geometry::new(19);
        let mut a = PatternSet::new(geo.board_max);
        let mut b = PatternSet::new(geo.board_max);
        a.clear(&geo);
        b.clear(&geo);

        let center = geo.pos(14, 14);
        a.update_stone(&geo, S_BLACK, geo.north(center));
        b.update_stone(&geo, S_BLACK, geo.north(geo.north(center)));

        assert_ne!(pattern_hash(&a, center).md2, pattern_hash(&b, center).md2);
    }
}
