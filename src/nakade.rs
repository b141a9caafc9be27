//! Dead-shape (nakade) recognition.
//!
//! Every 3-, 4-, 5- and 6-stone shape that cannot make two eyes is stored as
//! an XOR of shape bit-strings after shifting the shape so its smallest
//! member sits at a fixed anchor near the board center. A candidate region is
//! recognized by sorting its points, shifting them to the same anchor and
//! comparing hashes; each shape carries its vital point as an offset from the
//! anchor.

use crate::board::{GameState, Geometry};
use crate::constants::*;
use crate::zobrist::zobrist;

/// Shape hashes and vital points for one board geometry.
pub struct NakadeTable {
    start: Pos,
    hash: [Vec<u64>; 4],
    vital: [Vec<usize>; 4],
}

impl NakadeTable {
    pub fn new(geo: &Geometry) -> NakadeTable {
        let bs = geo.board_size;
        let start = geo.board_max / 2;

        // Shape skeletons as offsets from their smallest member, paired with
        // the vital point.
        let shapes3: [(&[usize], usize); 6] = [
            (&[0, 1, 2], 1),
            (&[0, bs, 2 * bs], bs),
            (&[0, 1, bs + 1], 1),
            (&[0, bs - 1, bs], bs),
            (&[0, bs, bs + 1], bs),
            (&[0, 1, bs], 0),
        ];
        let shapes4: [(&[usize], usize); 5] = [
            (&[0, bs - 1, bs, bs + 1], bs),
            (&[0, bs - 1, bs, 2 * bs], bs),
            (&[0, bs, bs + 1, 2 * bs], bs),
            (&[0, 1, 2, bs + 1], 1),
            (&[0, 1, bs, bs + 1], 0),
        ];
        let shapes5: [(&[usize], usize); 9] = [
            (&[0, bs - 1, bs, bs + 1, 2 * bs], bs),
            (&[0, bs - 1, bs, 2 * bs - 1, 2 * bs], bs),
            (&[0, 1, bs, bs + 1, bs + 2], bs + 1),
            (&[0, 1, bs, bs + 1, 2 * bs], bs),
            (&[0, 1, 2, bs + 1, bs + 2], 1),
            (&[0, bs, bs + 1, 2 * bs, 2 * bs + 1], bs),
            (&[0, 1, 2, bs, bs + 1], 1),
            (&[0, 1, bs, bs + 1, 2 * bs + 1], bs + 1),
            (&[0, 1, bs - 1, bs, bs + 1], bs),
        ];
        let shapes6: [(&[usize], usize); 4] = [
            (&[0, bs - 1, bs, bs + 1, 2 * bs - 1, 2 * bs], bs),
            (&[0, 1, bs, bs + 1, bs + 2, 2 * bs], bs + 1),
            (&[0, 1, bs - 1, bs, bs + 1, 2 * bs], bs),
            (&[0, bs - 1, bs, bs + 1, 2 * bs, 2 * bs + 1], bs),
        ];

        let zob = zobrist();
        let hash_of = |offsets: &[usize]| {
            offsets.iter().fold(0u64, |h, &o| h ^ zob.shape_bit(start + o))
        };
        let build = |shapes: &[(&[usize], usize)]| {
            let hash: Vec<u64> = shapes.iter().map(|(s, _)| hash_of(s)).collect();
            let vital: Vec<usize> = shapes.iter().map(|&(_, v)| v).collect();
            (hash, vital)
        };

        let (h3, v3) = build(&shapes3);
        let (h4, v4) = build(&shapes4);
        let (h5, v5) = build(&shapes5);
        let (h6, v6) = build(&shapes6);
        NakadeTable {
            start,
            hash: [h3, h4, h5, h6],
            vital: [v3, v4, v5, v6],
        }
    }

    /// Hash a sorted point set shifted to the anchor.
    fn region_hash(&self, points: &[Pos]) -> u64 {
        let zob = zobrist();
        let reviser = self.start as isize - points[0] as isize;
        points
            .iter()
            .fold(0u64, |h, &p| h ^ zob.shape_bit((p as isize + reviser) as usize))
    }

    /// Does the sorted point set match a stored shape of its size?
    fn matches(&self, points: &[Pos], max_stones: usize) -> bool {
        let n = points.len();
        if !(3..=max_stones).contains(&n) {
            return false;
        }
        let hash = self.region_hash(points);
        self.hash[n - 3].iter().any(|&h| h == hash)
    }

    /// Vital point of the sorted point set, if it is a stored shape.
    fn vital_point(&self, points: &[Pos]) -> Option<Pos> {
        let n = points.len();
        if !(3..=6).contains(&n) {
            return None;
        }
        let hash = self.region_hash(points);
        self.hash[n - 3]
            .iter()
            .position(|&h| h == hash)
            .map(|i| points[0] + self.vital[n - 3][i])
    }
}

/// Collect the stones of the group `color` would form by playing `pos`
/// (the move point included), sorted. `None` when larger than `cap`.
fn self_atari_stones(game: &GameState, pos: Pos, color: u8, cap: usize) -> Option<Vec<Pos>> {
    let geo = &game.geo;
    let mut stones: Vec<Pos> = Vec::with_capacity(cap + 4);
    let mut checked: Vec<usize> = Vec::with_capacity(4);

    for n in geo.neighbor4(pos) {
        if game.board[n] != color {
            continue;
        }
        let id = game.string_id[n];
        if checked.contains(&id) {
            continue;
        }
        stones.extend(game.string_stones(id));
        checked.push(id);
    }
    stones.push(pos);
    if stones.len() > cap {
        return None;
    }
    stones.sort_unstable();
    Some(stones)
}

/// Is the self-atari at `pos` a nakade shape (3 to 5 stones)? Such a
/// sacrifice kills the surrounding group, so the simulation policy keeps it.
pub fn is_nakade_self_atari(table: &NakadeTable, game: &GameState, pos: Pos, color: u8) -> bool {
    match self_atari_stones(game, pos, color, 5) {
        Some(stones) => table.matches(&stones, 5),
        None => false,
    }
}

/// Search variant of [`is_nakade_self_atari`], accepting 6-stone shapes too.
pub fn is_uct_nakade_self_atari(
    table: &NakadeTable,
    game: &GameState,
    pos: Pos,
    color: u8,
) -> bool {
    match self_atari_stones(game, pos, color, 6) {
        Some(stones) => table.matches(&stones, 6),
        None => false,
    }
}

/// Flood the region of non-`color` points from `pos` and return its vital
/// point when the region is a dead shape.
pub fn find_nakade_pos(
    table: &NakadeTable,
    game: &GameState,
    pos: Pos,
    color: u8,
) -> Option<Pos> {
    let geo = &game.geo;
    let mut region: Vec<Pos> = Vec::with_capacity(8);
    let mut queue: Vec<Pos> = vec![pos];
    let mut seen: Vec<Pos> = vec![pos];

    while let Some(cur) = queue.pop() {
        region.push(cur);
        if region.len() > 5 {
            return None;
        }
        for n in geo.neighbor4(cur) {
            if !seen.contains(&n) && (game.board[n] & color) == 0 {
                queue.push(n);
                seen.push(n);
            }
        }
    }
    if region.len() > 5 {
        return None;
    }
    region.sort_unstable();
    table.vital_point(&region)
}

/// Vital points of any region the previous move just enclosed.
pub fn search_nakade(table: &NakadeTable, game: &GameState) -> Vec<Pos> {
    let mut vital = Vec::with_capacity(4);
    if game.moves < 2 {
        return vital;
    }
    let last = game.record[game.moves - 1];
    if last.pos == PASS {
        return vital;
    }
    for n in game.geo.neighbor4(last.pos) {
        // Only an empty or enemy point can seed an enclosed region.
        if (game.board[n] & last.color) == 0 {
            if let Some(v) = find_nakade_pos(table, game, n, last.color) {
                if !vital.contains(&v) {
                    vital.push(v);
                }
            }
        }
    }
    vital
}

/// If the stones the opponent just captured form a dead shape, return its
/// vital point: playing there keeps the capture from living.
pub fn check_removed_stone_nakade(
    table: &NakadeTable,
    game: &GameState,
    color: u8,
) -> Option<Pos> {
    let other = flip_color(color) as usize;
    let captured = &game.capture_pos[other];
    if !(3..=5).contains(&captured.len()) {
        return None;
    }
    let mut stones = captured.clone();
    stones.sort_unstable();
    table.vital_point(&stones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    #[test]
    fn bent_three_has_center_vital_point() {
        let geo = Geometry::new(9);
        let table = NakadeTable::new(&geo);
        let mut game = GameState::new(geo.clone());

        // Black bent-three eye space at the corner: empty points A1, B1, A2
        // walled in by white.
        let a1 = geo.pos(geo.board_start, geo.board_end);
        let b1 = geo.east(a1);
        let a2 = geo.north(a1);
        for pos in [geo.east(b1), geo.north(b1), geo.north(a2), geo.east(a2)] {
            if game.board[pos] == S_EMPTY {
                game.put_stone(pos, S_WHITE);
            }
        }

        let region = [a1, a2, b1];
        let mut sorted = region.to_vec();
        sorted.sort_unstable();
        // The bend point is the vital point.
        assert_eq!(table.vital_point(&sorted), Some(a1));
        assert_eq!(find_nakade_pos(&table, &game, a1, S_WHITE), Some(a1));
    }

    #[test]
    fn straight_three_vital_is_center() {
        let geo = Geometry::new(9);
        let table = NakadeTable::new(&geo);
        let p = geo.pos(9, 9);
        let mut points = vec![p, geo.east(p), geo.east(geo.east(p))];
        points.sort_unstable();
        assert_eq!(table.vital_point(&points), Some(geo.east(p)));
    }

    #[test]
    fn square_four_is_dead_shape() {
        let geo = Geometry::new(9);
        let table = NakadeTable::new(&geo);
        let p = geo.pos(9, 9);
        let mut points = vec![p, geo.east(p), geo.south(p), geo.east(geo.south(p))];
        points.sort_unstable();
        assert!(table.matches(&points, 5));
        // The square four has no single vital point in the 4-shape table
        // entries that list one; it still hashes to a stored shape.
        assert!(table.vital_point(&points).is_some());
    }

    #[test]
    fn six_point_region_is_not_nakade() {
        let geo = Geometry::new(9);
        let table = NakadeTable::new(&geo);
        let game = GameState::new(geo.clone());
        // The whole empty board floods far past the cap.
        assert_eq!(find_nakade_pos(&table, &game, geo.pos(9, 9), S_BLACK), None);
    }
}
