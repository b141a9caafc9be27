//! Concentric stone-pattern fingerprints.
//!
//! Every intersection carries four pattern words covering the points at
//! Manhattan distance <= 2, 3, 4 and 5: MD2 in 24 bits (the 3x3 ring plus the
//! four two-step extensions), MD3 in 24, MD4 in 32, MD5 in 40. Each point
//! takes two bits (`00` empty, `01` black, `10` white, `11` off-board).
//!
//! The words are maintained incrementally: placing a stone ORs its color pair
//! into the appropriate field of every word whose shell contains it; removal
//! clears the pair. Off-board fields are stamped once at setup, so edge
//! lookups never need a bounds test.
//!
//! The eight dihedral images and the color swap of every word are produced by
//! permutation tables derived from the shell coordinate lists, which is what
//! canonicalizes patterns for hashing and what expands eye templates over all
//! their symmetric variants.

use std::sync::OnceLock;

use crate::board::Geometry;
use crate::constants::*;

/// Points of the 3x3 ring in bit order (row major, center excluded).
pub const MD2_OFFSETS: [(i32, i32); 12] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    // two-step extensions: N, E, S, W
    (0, -2),
    (2, 0),
    (0, 2),
    (-2, 0),
];

/// Manhattan-distance-3 shell, clockwise from north.
pub const MD3_OFFSETS: [(i32, i32); 12] = [
    (0, -3),
    (1, -2),
    (2, -1),
    (3, 0),
    (2, 1),
    (1, 2),
    (0, 3),
    (-1, 2),
    (-2, 1),
    (-3, 0),
    (-2, -1),
    (-1, -2),
];

/// Manhattan-distance-4 shell, clockwise from north.
pub const MD4_OFFSETS: [(i32, i32); 16] = [
    (0, -4),
    (1, -3),
    (2, -2),
    (3, -1),
    (4, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 4),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-4, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Manhattan-distance-5 shell, clockwise from north.
pub const MD5_OFFSETS: [(i32, i32); 20] = [
    (0, -5),
    (1, -4),
    (2, -3),
    (3, -2),
    (4, -1),
    (5, 0),
    (4, 1),
    (3, 2),
    (2, 3),
    (1, 4),
    (0, 5),
    (-1, 4),
    (-2, 3),
    (-3, 2),
    (-4, 1),
    (-5, 0),
    (-4, -1),
    (-3, -2),
    (-2, -3),
    (-1, -4),
];

const MD5_MASK: u64 = (1 << 40) - 1;

/// Per-intersection pattern words for one game state.
#[derive(Clone)]
pub struct PatternSet {
    md2: Vec<u32>,
    md3: Vec<u32>,
    md4: Vec<u32>,
    md5: Vec<u64>,
}

impl PatternSet {
    pub fn new(board_max: usize) -> Self {
        PatternSet {
            md2: vec![0; board_max],
            md3: vec![0; board_max],
            md4: vec![0; board_max],
            md5: vec![0; board_max],
        }
    }

    /// 16-bit 3x3 code at `pos`.
    #[inline]
    pub fn pat3(&self, pos: Pos) -> u32 {
        self.md2[pos] & 0xFFFF
    }

    /// 24-bit MD2 code at `pos`.
    #[inline]
    pub fn md2(&self, pos: Pos) -> u32 {
        self.md2[pos]
    }

    #[inline]
    pub fn md3(&self, pos: Pos) -> u32 {
        self.md3[pos]
    }

    #[inline]
    pub fn md4(&self, pos: Pos) -> u32 {
        self.md4[pos]
    }

    #[inline]
    pub fn md5(&self, pos: Pos) -> u64 {
        self.md5[pos]
    }

    /// Reset every word and stamp the off-board fields for the guard ring.
    pub fn clear(&mut self, geo: &Geometry) {
        self.md2.iter_mut().for_each(|w| *w = 0);
        self.md3.iter_mut().for_each(|w| *w = 0);
        self.md4.iter_mut().for_each(|w| *w = 0);
        self.md5.iter_mut().for_each(|w| *w = 0);

        let start = geo.board_start as i32;
        let end = geo.board_end as i32;
        let onboard = |x: i32, y: i32| x >= start && x <= end && y >= start && y <= end;

        for &pos in &geo.onboard_pos {
            let x = geo.x(pos) as i32;
            let y = geo.y(pos) as i32;
            for (i, &(dx, dy)) in MD2_OFFSETS.iter().enumerate() {
                if !onboard(x + dx, y + dy) {
                    self.md2[pos] |= 0b11 << (2 * i);
                }
            }
            for (i, &(dx, dy)) in MD3_OFFSETS.iter().enumerate() {
                if !onboard(x + dx, y + dy) {
                    self.md3[pos] |= 0b11 << (2 * i);
                }
            }
            for (i, &(dx, dy)) in MD4_OFFSETS.iter().enumerate() {
                if !onboard(x + dx, y + dy) {
                    self.md4[pos] |= 0b11 << (2 * i);
                }
            }
            for (i, &(dx, dy)) in MD5_OFFSETS.iter().enumerate() {
                if !onboard(x + dx, y + dy) {
                    self.md5[pos] |= 0b11 << (2 * i);
                }
            }
        }
    }

    /// Record a stone in the MD2 words around it. Simulation flavor: the
    /// outer shells are left untouched.
    pub fn update_md2_stone(&mut self, geo: &Geometry, color: u8, pos: Pos) {
        let bits = color as u32;
        let stride = geo.board_size as i32;
        for (i, &(dx, dy)) in MD2_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md2[center] |= bits << (2 * i);
        }
    }

    /// Clear a removed stone from the MD2 words around it.
    pub fn update_md2_empty(&mut self, geo: &Geometry, pos: Pos) {
        let stride = geo.board_size as i32;
        for (i, &(dx, dy)) in MD2_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md2[center] &= !(0b11 << (2 * i));
        }
    }

    /// Record a stone in every shell word around it.
    pub fn update_stone(&mut self, geo: &Geometry, color: u8, pos: Pos) {
        self.update_md2_stone(geo, color, pos);
        let bits = color as u64;
        let stride = geo.board_size as i32;
        for (i, &(dx, dy)) in MD3_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md3[center] |= (bits as u32) << (2 * i);
        }
        for (i, &(dx, dy)) in MD4_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md4[center] |= (bits as u32) << (2 * i);
        }
        for (i, &(dx, dy)) in MD5_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md5[center] |= bits << (2 * i);
        }
    }

    /// Clear a removed stone from every shell word around it.
    pub fn update_empty(&mut self, geo: &Geometry, pos: Pos) {
        self.update_md2_empty(geo, pos);
        let stride = geo.board_size as i32;
        for (i, &(dx, dy)) in MD3_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md3[center] &= !(0b11 << (2 * i));
        }
        for (i, &(dx, dy)) in MD4_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md4[center] &= !(0b11 << (2 * i));
        }
        for (i, &(dx, dy)) in MD5_OFFSETS.iter().enumerate() {
            let center = (pos as i32 - dx - dy * stride) as usize;
            self.md5[center] &= !(0b11u64 << (2 * i));
        }
    }

    pub fn copy_from(&mut self, src: &PatternSet) {
        self.md2.copy_from_slice(&src.md2);
        self.md3.copy_from_slice(&src.md3);
        self.md4.copy_from_slice(&src.md4);
        self.md5.copy_from_slice(&src.md5);
    }
}

// =============================================================================
// Symmetries
// =============================================================================

/// Bit-pair permutations realizing the eight dihedral images of each shell.
struct SymmetryTables {
    pat3: [[usize; 8]; 8],
    md2: [[usize; 12]; 8],
    md3: [[usize; 12]; 8],
    md4: [[usize; 16]; 8],
    md5: [[usize; 20]; 8],
}

static SYMMETRY: OnceLock<SymmetryTables> = OnceLock::new();

fn build_perms<const N: usize>(offsets: &[(i32, i32); N]) -> [[usize; N]; 8] {
    // The image under transform t carries, at offset o, the color the source
    // pattern has at map_t(o). Each map is a bijection of the shell.
    let maps: [fn((i32, i32)) -> (i32, i32); 8] = [
        |(x, y)| (x, y),
        |(x, y)| (x, -y),
        |(x, y)| (-x, y),
        |(x, y)| (-x, -y),
        |(x, y)| (y, -x),
        |(x, y)| (y, x),
        |(x, y)| (-y, -x),
        |(x, y)| (-y, x),
    ];
    let mut perms = [[0usize; N]; 8];
    for (t, map) in maps.iter().enumerate() {
        for i in 0..N {
            let target = map(offsets[i]);
            perms[t][i] = offsets
                .iter()
                .position(|&o| o == target)
                .expect("shell closed under symmetry");
        }
    }
    perms
}

fn symmetry_tables() -> &'static SymmetryTables {
    SYMMETRY.get_or_init(|| {
        let md2 = build_perms(&MD2_OFFSETS);
        let mut pat3 = [[0usize; 8]; 8];
        for t in 0..8 {
            for i in 0..8 {
                pat3[t][i] = md2[t][i];
            }
        }
        SymmetryTables {
            pat3,
            md2,
            md3: build_perms(&MD3_OFFSETS),
            md4: build_perms(&MD4_OFFSETS),
            md5: build_perms(&MD5_OFFSETS),
        }
    })
}

#[inline]
fn permute(word: u64, perm: &[usize]) -> u64 {
    let mut out = 0u64;
    for (i, &src) in perm.iter().enumerate() {
        out |= ((word >> (2 * src)) & 0x3) << (2 * i);
    }
    out
}

/// Swap black and white in every field of a pattern word of `n` points.
#[inline]
fn reverse_word(word: u64, n: usize) -> u64 {
    let low = 0x5555_5555_5555_5555u64 & ((1u64 << (2 * n)) - 1);
    ((word & low) << 1) | ((word >> 1) & low)
}

pub fn pat3_reverse(pat3: u32) -> u32 {
    reverse_word(pat3 as u64, 8) as u32
}

pub fn md2_reverse(md2: u32) -> u32 {
    reverse_word(md2 as u64, 12) as u32
}

pub fn md3_reverse(md3: u32) -> u32 {
    reverse_word(md3 as u64, 12) as u32
}

pub fn md4_reverse(md4: u32) -> u32 {
    reverse_word(md4 as u64, 16) as u32
}

pub fn md5_reverse(md5: u64) -> u64 {
    reverse_word(md5, 20)
}

macro_rules! transpose_fns {
    ($t8:ident, $t16:ident, $word:ty, $field:ident, $n:expr) => {
        /// The eight dihedral images of the code.
        pub fn $t8(code: $word) -> [$word; 8] {
            let tables = symmetry_tables();
            let mut out = [0; 8];
            for t in 0..8 {
                out[t] = permute(code as u64, &tables.$field[t]) as $word;
            }
            out
        }

        /// The eight dihedral images plus their color swaps.
        pub fn $t16(code: $word) -> [$word; 16] {
            let eight = $t8(code);
            let mut out = [0; 16];
            for t in 0..8 {
                out[t] = eight[t];
                out[t + 8] = reverse_word(eight[t] as u64, $n) as $word;
            }
            out
        }
    };
}

transpose_fns!(pat3_transpose8, pat3_transpose16, u32, pat3, 8);
transpose_fns!(md2_transpose8, md2_transpose16, u32, md2, 12);
transpose_fns!(md3_transpose8, md3_transpose16, u32, md3, 12);
transpose_fns!(md4_transpose8, md4_transpose16, u32, md4, 16);

pub fn md5_transpose8(code: u64) -> [u64; 8] {
    let tables = symmetry_tables();
    let mut out = [0; 8];
    for t in 0..8 {
        out[t] = permute(code, &tables.md5[t]) & MD5_MASK;
    }
    out
}

pub fn md5_transpose16(code: u64) -> [u64; 16] {
    let eight = md5_transpose8(code);
    let mut out = [0; 16];
    for t in 0..8 {
        out[t] = eight[t];
        out[t + 8] = reverse_word(eight[t], 20);
    }
    out
}

// =============================================================================
// 3x3 template helpers
// =============================================================================

/// Build a 3x3 code from the neighbors in `MD2_OFFSETS` order (NW, N, NE, W,
/// E, SW, S, SE), two bits per point. Used by the eye/territory template
/// tables at startup.
pub fn pat3_from_colors(colors: [u8; 8]) -> u32 {
    let mut code = 0u32;
    for (i, &c) in colors.iter().enumerate() {
        code |= (c as u32) << (2 * i);
    }
    code
}

/// Color of the field `i` of a 3x3 code.
#[inline]
pub fn pat3_color(pat3: u32, i: usize) -> u8 {
    ((pat3 >> (2 * i)) & 0x3) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transposes_are_permutations() {
        let code = 0b01_10_00_11_01_10_00_11_0110_0011u32 & 0xFFFFFF;
        let images = md2_transpose16(code);
        // Identity is the first image.
        assert_eq!(images[0], code);
        // Every image has the same multiset of field values.
        let count = |w: u32| {
            let mut c = [0; 4];
            for i in 0..12 {
                c[((w >> (2 * i)) & 3) as usize] += 1;
            }
            c
        };
        for img in images.iter().take(8) {
            assert_eq!(count(*img), count(code));
        }
    }

    #[test]
    fn reverse_swaps_colors_only() {
        let code = pat3_from_colors([
            S_BLACK, S_WHITE, S_EMPTY, S_OB, S_BLACK, S_BLACK, S_WHITE, S_EMPTY,
        ]);
        let rev = pat3_reverse(code);
        assert_eq!(pat3_color(rev, 0), S_WHITE);
        assert_eq!(pat3_color(rev, 1), S_BLACK);
        assert_eq!(pat3_color(rev, 2), S_EMPTY);
        assert_eq!(pat3_color(rev, 3), S_OB);
        assert_eq!(pat3_reverse(rev), code);
    }

    #[test]
    fn rotation_group_closes() {
        let code = 0x00C5_1234u32 & 0xFFFFFF;
        let mut images: Vec<u32> = md2_transpose8(code).to_vec();
        images.sort_unstable();
        images.dedup();
        // Rotating any image must stay inside the set.
        for &img in images.clone().iter() {
            for next in md2_transpose8(img) {
                assert!(images.contains(&next));
            }
        }
    }
}
