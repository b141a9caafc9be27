//! Board representation with incremental string and liberty tracking.
//!
//! The board is a padded 1-D array. Maximal connected groups of one color
//! ("strings") live in a pool of recycled slots; each string threads its
//! member stones through `string_next`, and keeps its liberties and its
//! adjacent enemy string IDs as intrusive sorted lists so that insertion,
//! deletion and merge are all O(list length) with no allocation.
//!
//! Two stone-placement flavors exist: [`GameState::put_stone`] maintains the
//! full pattern set and all five rolling hashes and is used for real moves
//! and tree descent; [`GameState::put_stone_simulation`] maintains MD2 only
//! and additionally feeds the simulation policy's incremental-update queues.

use std::fmt;
use std::sync::Arc;

use crate::constants::*;
use crate::pattern::{self, PatternSet};
use crate::zobrist::{HASH_KO, HASH_PASS, zobrist};

/// Result of attempting an illegal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// Point is not empty.
    Occupied,
    /// Move violates the ko rule.
    Ko,
    /// Move repeats an earlier position (positional super-ko).
    SuperKo,
    /// Move would leave its own string without liberties.
    Suicide,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MoveError::Occupied => "point not empty",
            MoveError::Ko => "retakes ko",
            MoveError::SuperKo => "repeats position",
            MoveError::Suicide => "suicide",
        };
        write!(f, "illegal move: {msg}")
    }
}

impl std::error::Error for MoveError {}

// =============================================================================
// Geometry
// =============================================================================

/// Runtime board geometry and the derived coordinate tables.
///
/// Process-wide and read-only once built; every worker holds it through an
/// `Arc`. Rebuilt only by `boardsize`.
pub struct Geometry {
    pub pure_board_size: usize,
    pub pure_board_max: usize,
    pub board_size: usize,
    pub board_max: usize,
    pub board_start: usize,
    pub board_end: usize,

    pub max_string: usize,
    pub max_neighbor: usize,
    pub string_pos_max: usize,
    pub string_end: usize,
    pub liberty_end: usize,
    pub neighbor_end: usize,
    pub max_records: usize,
    pub max_moves: usize,

    /// Playable intersections in scan order.
    pub onboard_pos: Vec<Pos>,
    board_x: Vec<usize>,
    board_y: Vec<usize>,
    pub border_dis_x: Vec<i32>,
    pub border_dis_y: Vec<i32>,
    move_dis: Vec<u8>,
    /// Canonical index of each intersection under the 8-fold symmetry.
    pub board_pos_id: Vec<u8>,
    /// Opening-move candidates: one symmetric wedge of the board.
    pub first_move_candidate: Vec<Pos>,

    pub corner: [Pos; 4],
    pub corner_neighbor: [[Pos; 2]; 4],
    /// Diagonal offsets (NW, NE, SW, SE).
    pub cross: [isize; 4],
    /// Offsets of the 13 points within MD2 reach, the point itself included.
    pub md2_reach: [isize; MD2_UPDATE_NUM],
}

impl Geometry {
    pub fn new(size: usize) -> Arc<Geometry> {
        assert!(
            (1..=PURE_BOARD_SIZE).contains(&size),
            "unsupported board size {size}"
        );
        let pure_board_size = size;
        let pure_board_max = size * size;
        let board_size = size + 2 * OB_SIZE;
        let board_max = board_size * board_size;
        let board_start = OB_SIZE;
        let board_end = size + OB_SIZE - 1;
        let string_pos_max = board_size * (size + OB_SIZE);
        let max_string = pure_board_max * 4 / 5;
        let bs = board_size as isize;

        let pos = |x: usize, y: usize| x + y * board_size;

        let mut onboard_pos = Vec::with_capacity(pure_board_max);
        let mut board_x = vec![0; board_max];
        let mut board_y = vec![0; board_max];
        for y in board_start..=board_end {
            for x in board_start..=board_end {
                onboard_pos.push(pos(x, y));
                board_x[pos(x, y)] = x;
                board_y[pos(x, y)] = y;
            }
        }

        let mut border_dis_x = vec![0; board_max];
        let mut border_dis_y = vec![0; board_max];
        for y in board_start..=board_end {
            for x in board_start..=board_end {
                let dx = (x - board_start + 1).min(board_end + 1 - x) as i32;
                let dy = (y - board_start + 1).min(board_end + 1 - y) as i32;
                border_dis_x[pos(x, y)] = dx;
                border_dis_y[pos(x, y)] = dy;
            }
        }

        let mut move_dis = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                let d = x + y + x.max(y);
                move_dis[x + y * size] = d.min(MOVE_DISTANCE_MAX - 1) as u8;
            }
        }

        // One canonical ID per symmetry orbit, assigned over a half-quadrant
        // wedge and mirrored to its 8 images.
        let mut board_pos_id = vec![0u8; board_max];
        let mut id = 1u8;
        for y in board_start..=(board_start + size / 2) {
            for x in board_start..=y {
                let m = board_end + OB_SIZE - x;
                let n = board_end + OB_SIZE - y;
                board_pos_id[pos(x, y)] = id;
                board_pos_id[pos(m, y)] = id;
                board_pos_id[pos(y, x)] = id;
                board_pos_id[pos(y, m)] = id;
                board_pos_id[pos(x, n)] = id;
                board_pos_id[pos(m, n)] = id;
                board_pos_id[pos(n, x)] = id;
                board_pos_id[pos(n, m)] = id;
                id += 1;
            }
        }

        let mut first_move_candidate = Vec::new();
        for y in board_start..=(board_start + board_end) / 2 {
            for x in (board_end + board_start - y)..=board_end {
                first_move_candidate.push(pos(x, y));
            }
        }

        let corner = [
            pos(board_start, board_start),
            pos(board_start, board_end),
            pos(board_end, board_start),
            pos(board_end, board_end),
        ];
        let corner_neighbor = [
            [corner[0] + 1, corner[0] + board_size],
            [corner[1] - board_size, corner[1] + 1],
            [corner[2] - 1, corner[2] + board_size],
            [corner[3] - board_size, corner[3] - 1],
        ];

        Arc::new(Geometry {
            pure_board_size,
            pure_board_max,
            board_size,
            board_max,
            board_start,
            board_end,
            max_string,
            max_neighbor: max_string,
            string_pos_max,
            string_end: string_pos_max - 1,
            liberty_end: string_pos_max - 1,
            neighbor_end: max_string - 1,
            max_records: pure_board_max * 3,
            max_moves: pure_board_max * 3 - 1,
            onboard_pos,
            board_x,
            board_y,
            border_dis_x,
            border_dis_y,
            move_dis,
            board_pos_id,
            first_move_candidate,
            corner,
            corner_neighbor,
            cross: [-bs - 1, -bs + 1, bs - 1, bs + 1],
            md2_reach: [
                -2 * bs,
                -bs - 1,
                -bs,
                -bs + 1,
                -2,
                -1,
                0,
                1,
                2,
                bs - 1,
                bs,
                bs + 1,
                2 * bs,
            ],
        })
    }

    #[inline]
    pub fn pos(&self, x: usize, y: usize) -> Pos {
        x + y * self.board_size
    }

    #[inline]
    pub fn x(&self, pos: Pos) -> usize {
        self.board_x[pos]
    }

    #[inline]
    pub fn y(&self, pos: Pos) -> usize {
        self.board_y[pos]
    }

    #[inline]
    pub fn north(&self, pos: Pos) -> Pos {
        pos - self.board_size
    }

    #[inline]
    pub fn south(&self, pos: Pos) -> Pos {
        pos + self.board_size
    }

    #[inline]
    pub fn east(&self, pos: Pos) -> Pos {
        pos + 1
    }

    #[inline]
    pub fn west(&self, pos: Pos) -> Pos {
        pos - 1
    }

    /// The four orthogonal neighbors (N, W, E, S).
    #[inline]
    pub fn neighbor4(&self, pos: Pos) -> [Pos; 4] {
        [self.north(pos), self.west(pos), self.east(pos), pos + self.board_size]
    }

    /// Move distance |dx| + |dy| + max(|dx|, |dy|), saturated.
    #[inline]
    pub fn move_distance(&self, p1: Pos, p2: Pos) -> usize {
        let dx = self.board_x[p1].abs_diff(self.board_x[p2]);
        let dy = self.board_y[p1].abs_diff(self.board_y[p2]);
        self.move_dis[dx + dy * self.pure_board_size] as usize
    }
}

// =============================================================================
// Eye and territory tables
// =============================================================================

pub const E_NOT_EYE: u8 = 0;
pub const E_COMPLETE_HALF_EYE: u8 = 1;
pub const E_HALF_3_EYE: u8 = 2;
pub const E_HALF_2_EYE: u8 = 3;
pub const E_HALF_1_EYE: u8 = 4;
pub const E_COMPLETE_ONE_EYE: u8 = 5;

/// 3x3-indexed lookups shared by legality, scoring and the policies.
pub struct EyeTables {
    pub eye: Vec<u8>,
    pub false_eye: Vec<u8>,
    pub territory: Vec<u8>,
    pub nb4_empty: Vec<u8>,
    pub eye_condition: Vec<u8>,
}

static EYE_TABLES: std::sync::OnceLock<EyeTables> = std::sync::OnceLock::new();

/// The process-wide 3x3 lookup tables, built on first use.
pub fn eye_tables() -> &'static EyeTables {
    EYE_TABLES.get_or_init(build_eye_tables)
}

fn build_eye_tables() -> EyeTables {
    let mut eye = vec![S_EMPTY; PAT3_MAX];
    let mut false_eye = vec![S_EMPTY; PAT3_MAX];
    let mut territory = vec![S_EMPTY; PAT3_MAX];
    let mut nb4_empty = vec![0u8; PAT3_MAX];
    let mut eye_condition = vec![E_NOT_EYE; PAT3_MAX];

    for code in 0..PAT3_MAX {
        let mut empty = 0;
        for field in [1, 3, 4, 6] {
            if (code >> (2 * field)) & 0x3 == S_EMPTY as usize {
                empty += 1;
            }
        }
        nb4_empty[code] = empty;

        // Surrounded on all four sides by one color.
        if code & 0x1144 == 0x1144 {
            territory[code] = S_BLACK;
        } else if code & 0x2288 == 0x2288 {
            territory[code] = S_WHITE;
        }
    }

    // Eye templates from the center stone's point of view, fields in
    // NW N NE W E SW S SE order: O = own stone, X = enemy, + = empty,
    // # = off board.
    const EYE_PAT3: [u32; 16] = [
        // +OO     XOO     +O+     XO+
        // O*O     O*O     O*O     O*O
        // OOO     OOO     OOO     OOO
        0x5554, 0x5556, 0x5544, 0x5546,
        // +OO     XOO     +O+     XO+
        // O*O     O*O     O*O     O*O
        // OO+     OO+     OO+     OO+
        0x1554, 0x1556, 0x1544, 0x1546,
        // +OX     XO+     +OO     OOO
        // O*O     O*O     O*O     O*O
        // OO+     +O+     ###     ###
        0x1564, 0x1146, 0xFD54, 0xFD55,
        // +O#     OO#     XOX     XOX
        // O*#     O*#     O+O     O+O
        // ###     ###     OOO     ###
        0xFF74, 0xFF75, 0x5566, 0xFD66,
    ];
    const FALSE_EYE_PAT3: [u32; 4] = [
        // OOX     OOO     XOO     XO#
        // O*O     O*O     O*O     O*#
        // XOO     XOX     ###     ###
        0x5965, 0x9955, 0xFD56, 0xFF76,
    ];
    const COMPLETE_HALF_EYE: [u32; 12] = [
        0x5566, 0x5965, 0x5166, 0x5966, 0x1166, 0x1964, 0x1966, 0x9966, 0xFD56, 0xFD46,
        0xFD66, 0xFF76,
    ];
    const HALF_3_EYE: [u32; 2] = [0x1144, 0x1146];
    const HALF_2_EYE: [u32; 4] = [0x5144, 0x5146, 0x5164, 0xFD44];
    const HALF_1_EYE: [u32; 6] = [0x5544, 0x5564, 0x5145, 0x5165, 0xFD54, 0xFF74];
    const COMPLETE_ONE_EYE: [u32; 5] = [0x5555, 0x5554, 0x5556, 0xFD55, 0xFF75];

    let mut stamp = |codes: &[u32], table: &mut [u8], value: u8| {
        for &c in codes {
            for img in pattern::pat3_transpose16(c) {
                table[img as usize] = value;
            }
        }
    };
    stamp(&COMPLETE_HALF_EYE, &mut eye_condition, E_COMPLETE_HALF_EYE);
    stamp(&HALF_3_EYE, &mut eye_condition, E_HALF_3_EYE);
    stamp(&HALF_2_EYE, &mut eye_condition, E_HALF_2_EYE);
    stamp(&HALF_1_EYE, &mut eye_condition, E_HALF_1_EYE);
    stamp(&COMPLETE_ONE_EYE, &mut eye_condition, E_COMPLETE_ONE_EYE);

    eye[0x5555] = S_BLACK;
    eye[pattern::pat3_reverse(0x5555) as usize] = S_WHITE;
    eye[0x1144] = S_BLACK;
    eye[pattern::pat3_reverse(0x1144) as usize] = S_WHITE;

    for &c in &EYE_PAT3 {
        for img in pattern::pat3_transpose8(c) {
            eye[img as usize] = S_BLACK;
            eye[pattern::pat3_reverse(img) as usize] = S_WHITE;
        }
    }
    for &c in &FALSE_EYE_PAT3 {
        for img in pattern::pat3_transpose8(c) {
            false_eye[img as usize] = S_BLACK;
            false_eye[pattern::pat3_reverse(img) as usize] = S_WHITE;
        }
    }

    EyeTables { eye, false_eye, territory, nb4_empty, eye_condition }
}

// =============================================================================
// Stone strings
// =============================================================================

/// One maximal connected group. Liberties and neighbor string IDs are kept
/// as intrusive sorted lists: `lib[p]` holds the next liberty after `p`,
/// `lib[0]` the head, and the geometry's `liberty_end` terminates the list
/// (`neighbor` works the same way over string IDs). A zero entry means
/// "not in the list"; position 0 and string ID 0 are never used.
#[derive(Clone)]
pub struct StoneString {
    pub color: u8,
    pub libs: usize,
    lib: Vec<u16>,
    pub neighbors: usize,
    neighbor: Vec<u16>,
    pub origin: Pos,
    pub size: usize,
    pub flag: bool,
}

impl StoneString {
    fn new(string_pos_max: usize, max_neighbor: usize) -> StoneString {
        StoneString {
            color: S_EMPTY,
            libs: 0,
            lib: vec![0; string_pos_max],
            neighbors: 0,
            neighbor: vec![0; max_neighbor],
            origin: 0,
            size: 0,
            flag: false,
        }
    }

    pub(crate) fn reset(&mut self, color: u8, origin: Pos, liberty_end: usize, neighbor_end: usize) {
        self.lib.iter_mut().for_each(|l| *l = 0);
        self.neighbor.iter_mut().for_each(|n| *n = 0);
        self.lib[0] = liberty_end as u16;
        self.neighbor[0] = neighbor_end as u16;
        self.libs = 0;
        self.neighbors = 0;
        self.color = color;
        self.origin = origin;
        self.size = 1;
        self.flag = true;
    }

    /// First liberty of the string.
    #[inline]
    pub fn lib_head(&self) -> Pos {
        self.lib[0] as Pos
    }

    /// Liberty following `pos` in the sorted list.
    #[inline]
    pub fn next_lib(&self, pos: Pos) -> Pos {
        self.lib[pos] as Pos
    }

    #[inline]
    pub fn neighbor_head(&self) -> usize {
        self.neighbor[0] as usize
    }

    #[inline]
    pub fn next_neighbor(&self, id: usize) -> usize {
        self.neighbor[id] as usize
    }

    /// Whether `id` is in the neighbor list.
    #[inline]
    pub fn has_neighbor(&self, id: usize) -> bool {
        self.neighbor[id] != 0
    }

    /// Liberties in ascending order.
    pub fn liberties(&self, liberty_end: usize) -> LibertyIter<'_> {
        LibertyIter { string: self, cur: self.lib[0] as usize, end: liberty_end }
    }

    /// Adjacent enemy string IDs in ascending order.
    pub fn neighbor_ids(&self, neighbor_end: usize) -> NeighborIter<'_> {
        NeighborIter { string: self, cur: self.neighbor[0] as usize, end: neighbor_end }
    }

    /// Insert liberty `pos`, scanning from `head`. Returns `pos` as the next
    /// scan start so that ascending insertions skip the prefix.
    pub(crate) fn add_liberty(&mut self, pos: Pos, head: usize) -> usize {
        if self.lib[pos] != 0 {
            return pos;
        }
        let mut cur = head;
        while (self.lib[cur] as usize) < pos {
            cur = self.lib[cur] as usize;
        }
        self.lib[pos] = self.lib[cur];
        self.lib[cur] = pos as u16;
        self.libs += 1;
        pos
    }

    pub(crate) fn remove_liberty(&mut self, pos: Pos) {
        if self.lib[pos] == 0 {
            return;
        }
        let mut cur = 0;
        while self.lib[cur] as usize != pos {
            cur = self.lib[cur] as usize;
        }
        self.lib[cur] = self.lib[self.lib[cur] as usize];
        self.lib[pos] = 0;
        self.libs -= 1;
    }

    pub(crate) fn add_neighbor(&mut self, id: usize) {
        if self.neighbor[id] != 0 {
            return;
        }
        let mut cur = 0;
        while (self.neighbor[cur] as usize) < id {
            cur = self.neighbor[cur] as usize;
        }
        self.neighbor[id] = self.neighbor[cur];
        self.neighbor[cur] = id as u16;
        self.neighbors += 1;
    }

    pub(crate) fn remove_neighbor(&mut self, id: usize) {
        if self.neighbor[id] == 0 {
            return;
        }
        let mut cur = 0;
        while self.neighbor[cur] as usize != id {
            cur = self.neighbor[cur] as usize;
        }
        self.neighbor[cur] = self.neighbor[self.neighbor[cur] as usize];
        self.neighbor[id] = 0;
        self.neighbors -= 1;
    }
}

pub struct LibertyIter<'a> {
    string: &'a StoneString,
    cur: usize,
    end: usize,
}

impl Iterator for LibertyIter<'_> {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.cur == self.end {
            return None;
        }
        let pos = self.cur;
        self.cur = self.string.lib[pos] as usize;
        Some(pos)
    }
}

pub struct NeighborIter<'a> {
    string: &'a StoneString,
    cur: usize,
    end: usize,
}

impl Iterator for NeighborIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cur == self.end {
            return None;
        }
        let id = self.cur;
        self.cur = self.string.neighbor[id] as usize;
        Some(id)
    }
}

// =============================================================================
// Game state
// =============================================================================

#[derive(Clone, Copy, Default)]
pub struct MoveRecord {
    pub color: u8,
    pub pos: Pos,
    /// Positional hash after the move, for super-ko.
    pub hash: u64,
}

/// Complete game state. Copied from the root once per playout with
/// [`GameState::copy_from`], which skips dead string slots.
pub struct GameState {
    pub geo: Arc<Geometry>,

    pub record: Vec<MoveRecord>,
    pub moves: usize,
    pub prisoner: [usize; S_MAX],
    pub ko_pos: Pos,
    pub ko_move: usize,
    pub pass_count: usize,

    pub current_hash: u64,
    pub previous1_hash: u64,
    pub previous2_hash: u64,
    pub positional_hash: u64,
    pub move_hash: u64,

    pub board: Vec<u8>,
    pub pat: PatternSet,

    pub string: Vec<StoneString>,
    pub string_id: Vec<usize>,
    pub string_next: Vec<usize>,

    pub candidates: Vec<bool>,
    pub seki: Vec<bool>,

    pub tactical_features1: Vec<u32>,
    pub tactical_features2: Vec<u32>,

    /// Stones captured by the previous move, per capturing color.
    pub capture_pos: [Vec<Pos>; 3],
    /// Intersections whose tactical features the previous move touched.
    pub update_pos: [Vec<Pos>; 3],

    /// Simulation rates, indexed by `color - 1`.
    pub rate: [Vec<i64>; 2],
    pub rate_row_sum: [Vec<i64>; 2],
    pub rate_sum: [i64; 2],

    pub komi: [f64; 3],
    check_superko: bool,
}

impl GameState {
    pub fn new(geo: Arc<Geometry>) -> GameState {
        let board_max = geo.board_max;
        let board_size = geo.board_size;
        let max_string = geo.max_string;
        let string_pos_max = geo.string_pos_max;
        let max_neighbor = geo.max_neighbor;
        let max_records = geo.max_records;
        let mut game = GameState {
            record: vec![MoveRecord::default(); max_records],
            moves: 1,
            prisoner: [0; S_MAX],
            ko_pos: 0,
            ko_move: 0,
            pass_count: 0,
            current_hash: 0,
            previous1_hash: 0,
            previous2_hash: 0,
            positional_hash: 0,
            move_hash: 0,
            board: vec![S_OB; board_max],
            pat: PatternSet::new(board_max),
            string: (0..max_string)
                .map(|_| StoneString::new(string_pos_max, max_neighbor))
                .collect(),
            string_id: vec![0; string_pos_max],
            string_next: vec![0; string_pos_max],
            candidates: vec![false; board_max],
            seki: vec![false; board_max],
            tactical_features1: vec![0; board_max],
            tactical_features2: vec![0; board_max],
            capture_pos: [Vec::new(), Vec::new(), Vec::new()],
            update_pos: [Vec::new(), Vec::new(), Vec::new()],
            rate: [vec![0; board_max], vec![0; board_max]],
            rate_row_sum: [vec![0; board_size], vec![0; board_size]],
            rate_sum: [0; 2],
            komi: [KOMI, KOMI + 1.0, KOMI - 1.0],
            check_superko: false,
            geo,
        };
        game.clear_board();
        game
    }

    /// Reset to an empty board without reallocating.
    pub fn clear_board(&mut self) {
        let geo = self.geo.clone();
        self.record.iter_mut().for_each(|r| *r = MoveRecord::default());
        self.moves = 1;
        self.prisoner = [0; S_MAX];
        self.ko_pos = 0;
        self.ko_move = 0;
        self.pass_count = 0;
        self.current_hash = 0;
        self.previous1_hash = 0;
        self.previous2_hash = 0;
        self.positional_hash = 0;
        self.move_hash = 0;
        self.board.iter_mut().for_each(|b| *b = S_OB);
        self.candidates.iter_mut().for_each(|c| *c = false);
        self.seki.iter_mut().for_each(|s| *s = false);
        self.tactical_features1.iter_mut().for_each(|f| *f = 0);
        self.tactical_features2.iter_mut().for_each(|f| *f = 0);
        for c in 0..3 {
            self.capture_pos[c].clear();
            self.update_pos[c].clear();
        }
        for s in self.string.iter_mut() {
            s.flag = false;
        }
        self.string_id.iter_mut().for_each(|id| *id = 0);
        self.string_next.iter_mut().for_each(|n| *n = 0);
        for &pos in &geo.onboard_pos {
            self.board[pos] = S_EMPTY;
            self.candidates[pos] = true;
        }
        self.pat.clear(&geo);
    }

    pub fn set_superko(&mut self, flag: bool) {
        self.check_superko = flag;
    }

    pub fn set_komi(&mut self, komi: f64) {
        self.komi = [komi, komi + 1.0, komi - 1.0];
    }

    /// Copy `src` into `self`, reusing allocations. Only live string slots
    /// are copied; tactical features start clean.
    pub fn copy_from(&mut self, src: &GameState) {
        debug_assert!(Arc::ptr_eq(&self.geo, &src.geo));
        self.record.copy_from_slice(&src.record);
        self.moves = src.moves;
        self.prisoner = src.prisoner;
        self.ko_pos = src.ko_pos;
        self.ko_move = src.ko_move;
        self.pass_count = src.pass_count;
        self.current_hash = src.current_hash;
        self.previous1_hash = src.previous1_hash;
        self.previous2_hash = src.previous2_hash;
        self.positional_hash = src.positional_hash;
        self.move_hash = src.move_hash;
        self.board.copy_from_slice(&src.board);
        self.pat.copy_from(&src.pat);
        for (dst, s) in self.string.iter_mut().zip(src.string.iter()) {
            if s.flag {
                dst.clone_from(s);
            } else {
                dst.flag = false;
            }
        }
        self.string_id.copy_from_slice(&src.string_id);
        self.string_next.copy_from_slice(&src.string_next);
        self.candidates.copy_from_slice(&src.candidates);
        self.seki.copy_from_slice(&src.seki);
        self.tactical_features1.iter_mut().for_each(|f| *f = 0);
        self.tactical_features2.iter_mut().for_each(|f| *f = 0);
        for c in 0..3 {
            self.capture_pos[c].clone_from(&src.capture_pos[c]);
            self.update_pos[c].clone_from(&src.update_pos[c]);
        }
        self.komi = src.komi;
        self.check_superko = src.check_superko;
    }

    /// The previous move, or `PASS` before the first move.
    #[inline]
    pub fn previous_move(&self) -> Pos {
        if self.moves > 1 { self.record[self.moves - 1].pos } else { PASS }
    }

    #[inline]
    pub fn previous_move2(&self) -> Pos {
        if self.moves > 2 { self.record[self.moves - 2].pos } else { PASS }
    }

    // =========================================================================
    // Legality
    // =========================================================================

    /// Full legality test for search and GTP moves.
    pub fn is_legal(&self, pos: Pos, color: u8) -> bool {
        self.legality(pos, color).is_ok()
    }

    /// Like [`GameState::is_legal`] but reporting which rule failed.
    pub fn legality(&self, pos: Pos, color: u8) -> Result<(), MoveError> {
        if self.board[pos] != S_EMPTY {
            return Err(MoveError::Occupied);
        }
        let tables = eye_tables();
        if tables.nb4_empty[self.pat.pat3(pos) as usize] == 0 && self.is_suicide(pos, color) {
            return Err(MoveError::Suicide);
        }
        if self.ko_pos == pos && self.ko_move == self.moves - 1 {
            return Err(MoveError::Ko);
        }
        if self.check_superko && pos != PASS && self.repeats_position(pos, color) {
            return Err(MoveError::SuperKo);
        }
        Ok(())
    }

    /// Positional super-ko: would playing `pos` reproduce a recorded position?
    fn repeats_position(&self, pos: Pos, color: u8) -> bool {
        let other = flip_color(color);
        let zob = zobrist();
        let mut hash = self.positional_hash;
        let mut checked: Vec<usize> = Vec::with_capacity(4);

        // Remove any neighbor strings this move would capture.
        for n in self.geo.neighbor4(pos) {
            if self.board[n] != other {
                continue;
            }
            let id = self.string_id[n];
            if checked.contains(&id) {
                continue;
            }
            if self.string[id].libs == 1 {
                let mut stone = self.string[id].origin;
                while stone != self.geo.string_end {
                    hash ^= zob.hash_bit(stone, other as usize);
                    stone = self.string_next[stone];
                }
            }
            checked.push(id);
        }
        hash ^= zob.hash_bit(pos, color as usize);

        self.record[..self.moves].iter().any(|r| r.hash == hash)
    }

    /// A move with no empty neighbor is suicide unless it captures an
    /// adjacent enemy string or connects to a friendly string with spare
    /// liberties.
    pub fn is_suicide(&self, pos: Pos, color: u8) -> bool {
        let other = flip_color(color);
        for n in self.geo.neighbor4(pos) {
            let b = self.board[n];
            if b == other && self.string[self.string_id[n]].libs == 1 {
                return false;
            }
            if b == color && self.string[self.string_id[n]].libs > 1 {
                return false;
            }
        }
        true
    }

    /// Simulation legality: also rejects own complete eyes and seki points,
    /// and prunes the candidate flag for anything it rules out for good.
    pub fn is_legal_not_eye(&mut self, pos: Pos, color: u8) -> bool {
        if self.board[pos] != S_EMPTY {
            self.candidates[pos] = false;
            return false;
        }
        if self.seki[pos] {
            return false;
        }
        let tables = eye_tables();
        let pat3 = self.pat.pat3(pos) as usize;
        let in_own_eye = tables.eye[pat3] == color
            && self
                .geo
                .neighbor4(pos)
                .iter()
                .all(|&n| self.string[self.string_id[n]].libs != 1);

        if !in_own_eye {
            if tables.nb4_empty[pat3] == 0 && self.is_suicide(pos, color) {
                return false;
            }
            if self.ko_pos == pos && self.ko_move == self.moves - 1 {
                return false;
            }
            if tables.false_eye[pat3] == color {
                if self.is_false_eye_connection(pos, color) {
                    return true;
                }
                self.candidates[pos] = false;
                return false;
            }
            return true;
        }

        self.candidates[pos] = false;
        false
    }

    /// Edge special case: a false eye may still need to be connected. Play it
    /// only if the friendly strings around it share no liberty besides the
    /// eye itself (then the connection is real), or filling the other shared
    /// liberty would be self-atari.
    fn is_false_eye_connection(&self, pos: Pos, color: u8) -> bool {
        let geo = &self.geo;
        let other = flip_color(color);

        // Strings forming the eye.
        let mut player_ids: Vec<usize> = Vec::with_capacity(4);
        for n in geo.neighbor4(pos) {
            let id = self.string_id[n];
            if !player_ids.contains(&id) {
                player_ids.push(id);
            }
        }

        // A capturable (or almost capturable) diagonal enemy stone means the
        // eye can still be fixed by capturing; connecting now wastes a move.
        for i in 0..4 {
            let d = (pos as isize + geo.cross[i]) as usize;
            if self.board[d] == other {
                let id = self.string_id[d];
                if crate::semeai::is_already_captured(self, other, id, &player_ids) {
                    return false;
                }
            }
        }

        let mut checked_string: Vec<usize> = Vec::with_capacity(4);
        let mut string_libs: Vec<usize> = Vec::with_capacity(4);
        let mut shared: Vec<Pos> = Vec::new();

        for n in geo.neighbor4(pos) {
            if self.board[n] != color {
                continue;
            }
            let id = self.string_id[n];
            let string = &self.string[id];
            if string.libs == 2 {
                let mut lib = string.lib_head();
                if lib == pos {
                    lib = string.next_lib(lib);
                }
                if crate::semeai::is_self_atari(self, color, lib) {
                    return true;
                }
            }
            if checked_string.contains(&id) {
                continue;
            }
            for lib in string.liberties(geo.liberty_end) {
                if lib != pos && !shared.contains(&lib) {
                    shared.push(lib);
                }
            }
            string_libs.push(string.libs);
            checked_string.push(id);
        }

        // An enemy string in atari touching two of the eye strings can be
        // captured instead of connecting.
        if checked_string.len() >= 2 {
            let first = &self.string[checked_string[0]];
            for nid in first.neighbor_ids(geo.neighbor_end) {
                if self.string[nid].libs == 1 && self.string[checked_string[1]].has_neighbor(nid) {
                    return false;
                }
            }
        }

        // A single string cannot have a false eye here.
        if checked_string.len() == 1 {
            return false;
        }

        let lib_sum: usize = string_libs.iter().map(|l| l - 1).sum();
        shared.len() == lib_sum
    }

    // =========================================================================
    // Stone placement
    // =========================================================================

    /// Apply a legal move, maintaining every pattern shell and all hashes.
    pub fn put_stone(&mut self, pos: Pos, color: u8) {
        let geo = self.geo.clone();
        let zob = zobrist();
        let other = flip_color(color);

        self.capture_pos[color as usize].clear();

        self.previous2_hash = self.previous1_hash;
        self.previous1_hash = self.current_hash;

        if self.ko_move != 0 && self.ko_move == self.moves - 1 {
            self.current_hash ^= zob.hash_bit(self.ko_pos, HASH_KO);
        }

        if self.moves < geo.max_records {
            self.record[self.moves].color = color;
            self.record[self.moves].pos = pos;
            if pos != PASS {
                self.move_hash ^= zob.move_bit(self.moves, pos, color);
            }
        }

        if pos == PASS {
            if self.moves < geo.max_records {
                self.record[self.moves].hash = self.positional_hash;
            }
            self.current_hash ^= zob.hash_bit(self.pass_count, HASH_PASS);
            self.pass_count += 1;
            if self.pass_count >= geo.board_max {
                self.pass_count = 0;
            }
            self.moves += 1;
            return;
        }

        self.board[pos] = color;
        self.candidates[pos] = false;
        self.tactical_features1[pos] = 0;
        self.tactical_features2[pos] = 0;
        self.current_hash ^= zob.hash_bit(pos, color as usize);
        self.positional_hash ^= zob.hash_bit(pos, color as usize);
        self.pat.update_stone(&geo, color, pos);

        let mut connect: Vec<usize> = Vec::with_capacity(4);
        let mut prisoner = 0;
        for n in geo.neighbor4(pos) {
            if self.board[n] == color {
                let id = self.string_id[n];
                self.remove_liberty(id, pos);
                connect.push(id);
            } else if self.board[n] == other {
                let id = self.string_id[n];
                self.remove_liberty(id, pos);
                if self.string[id].libs == 0 {
                    prisoner += self.remove_string(id);
                }
            }
        }
        self.prisoner[color as usize] += prisoner;

        self.place_and_connect(pos, color, &connect, prisoner, true);

        if self.moves < geo.max_records {
            self.record[self.moves].hash = self.positional_hash;
        }
        self.moves += 1;
    }

    /// Apply a legal move during simulation: MD2 patterns only, no hashes,
    /// and rate bookkeeping for the incremental policy update.
    pub fn put_stone_simulation(&mut self, pos: Pos, color: u8) {
        let geo = self.geo.clone();
        let other = flip_color(color);

        self.capture_pos[color as usize].clear();

        if self.moves < geo.max_records {
            self.record[self.moves].color = color;
            self.record[self.moves].pos = pos;
        }

        if pos == PASS {
            self.moves += 1;
            return;
        }

        self.board[pos] = color;
        self.candidates[pos] = false;
        self.tactical_features1[pos] = 0;
        self.tactical_features2[pos] = 0;

        // The occupied point can no longer be sampled.
        let row = geo.y(pos);
        for c in 0..2 {
            self.rate_sum[c] -= self.rate[c][pos];
            self.rate_row_sum[c][row] -= self.rate[c][pos];
            self.rate[c][pos] = 0;
        }

        self.pat.update_md2_stone(&geo, color, pos);

        let mut connect: Vec<usize> = Vec::with_capacity(4);
        let mut prisoner = 0;
        for n in geo.neighbor4(pos) {
            if self.board[n] == color {
                let id = self.string_id[n];
                self.po_remove_liberty(id, pos, color);
                connect.push(id);
            } else if self.board[n] == other {
                let id = self.string_id[n];
                self.po_remove_liberty(id, pos, color);
                if self.string[id].libs == 0 {
                    prisoner += self.po_remove_string(id, color);
                }
            }
        }
        self.prisoner[color as usize] += prisoner;

        self.place_and_connect(pos, color, &connect, prisoner, false);

        self.moves += 1;
    }

    /// Shared tail of both flavors: make or extend the string at `pos` and
    /// set ko when a single captured stone left a single-stone,
    /// single-liberty string.
    fn place_and_connect(
        &mut self,
        pos: Pos,
        color: u8,
        connect: &[usize],
        prisoner: usize,
        with_hash: bool,
    ) {
        match connect.len() {
            0 => {
                self.make_string(pos, color);
                let id = self.string_id[pos];
                if prisoner == 1 && self.string[id].libs == 1 {
                    self.ko_move = self.moves;
                    self.ko_pos = self.string[id].lib_head();
                    if with_hash {
                        self.current_hash ^= zobrist().hash_bit(self.ko_pos, HASH_KO);
                    }
                }
            }
            1 => self.add_stone(pos, color, connect[0]),
            _ => self.connect_string(pos, color, connect),
        }
    }

    // =========================================================================
    // String pool maintenance
    // =========================================================================

    fn make_string(&mut self, pos: Pos, color: u8) {
        let geo = self.geo.clone();
        let other = flip_color(color);

        let mut id = 1;
        while self.string[id].flag {
            id += 1;
            debug_assert!(id < geo.max_string, "string pool exhausted");
        }
        self.string[id].reset(color, pos, geo.liberty_end, geo.neighbor_end);
        self.string_id[pos] = id;
        self.string_next[pos] = geo.string_end;

        let mut lib_head = 0;
        for n in geo.neighbor4(pos) {
            if self.board[n] == S_EMPTY {
                lib_head = self.string[id].add_liberty(n, lib_head);
            } else if self.board[n] == other {
                let nid = self.string_id[n];
                self.string[nid].add_neighbor(id);
                self.string[id].add_neighbor(nid);
            }
        }
    }

    /// Thread `pos` into the sorted member list of `string_id`.
    fn add_stone_to_string(&mut self, id: usize, pos: Pos, head: Pos) {
        if pos == self.geo.string_end {
            return;
        }
        if self.string[id].origin > pos {
            self.string_next[pos] = self.string[id].origin;
            self.string[id].origin = pos;
        } else {
            let mut cur = if head != 0 { head } else { self.string[id].origin };
            while self.string_next[cur] < pos {
                cur = self.string_next[cur];
            }
            self.string_next[pos] = self.string_next[cur];
            self.string_next[cur] = pos;
        }
        self.string[id].size += 1;
    }

    fn add_stone(&mut self, pos: Pos, color: u8, id: usize) {
        let geo = self.geo.clone();
        let other = flip_color(color);

        self.string_id[pos] = id;
        self.add_stone_to_string(id, pos, 0);

        let mut lib_head = 0;
        for n in geo.neighbor4(pos) {
            if self.board[n] == S_EMPTY {
                lib_head = self.string[id].add_liberty(n, lib_head);
            } else if self.board[n] == other {
                let nid = self.string_id[n];
                self.string[nid].add_neighbor(id);
                self.string[id].add_neighbor(nid);
            }
        }
    }

    fn connect_string(&mut self, pos: Pos, color: u8, ids: &[usize]) {
        let mut min = ids[0];
        let mut merge: Vec<usize> = Vec::with_capacity(3);
        for &id in &ids[1..] {
            if merge.contains(&id) || id == min {
                continue;
            }
            if min > id {
                merge.push(min);
                min = id;
            } else {
                merge.push(id);
            }
        }
        self.add_stone(pos, color, min);
        if !merge.is_empty() {
            self.merge_string(min, &merge);
        }
    }

    fn merge_string(&mut self, dst: usize, srcs: &[usize]) {
        let geo = self.geo.clone();
        for &src in srcs {
            // Snapshot the source's lists, then fold them into dst.
            let libs: Vec<Pos> = self.string[src].liberties(geo.liberty_end).collect();
            let neighbors: Vec<usize> = self.string[src].neighbor_ids(geo.neighbor_end).collect();
            let mut stones: Vec<Pos> = Vec::with_capacity(self.string[src].size);
            let mut stone = self.string[src].origin;
            while stone != geo.string_end {
                stones.push(stone);
                stone = self.string_next[stone];
            }

            let mut prev = 0;
            for lib in libs {
                prev = self.string[dst].add_liberty(lib, prev);
            }
            let mut prev = 0;
            for stone in stones {
                self.string_id[stone] = dst;
                self.add_stone_to_string(dst, stone, prev);
                prev = stone;
            }
            for nid in neighbors {
                self.string[nid].remove_neighbor(src);
                self.string[dst].add_neighbor(nid);
                self.string[nid].add_neighbor(dst);
            }
            self.string[src].flag = false;
        }
    }

    fn remove_liberty(&mut self, id: usize, pos: Pos) {
        if self.string[id].lib[pos] == 0 {
            return;
        }
        self.string[id].remove_liberty(pos);
        if self.string[id].libs == 1 {
            let lib = self.string[id].lib_head();
            self.candidates[lib] = true;
        }
    }

    fn po_remove_liberty(&mut self, id: usize, pos: Pos, color: u8) {
        if self.string[id].lib[pos] == 0 {
            return;
        }
        self.string[id].remove_liberty(pos);
        if self.string[id].libs == 1 {
            let lib = self.string[id].lib_head();
            self.candidates[lib] = true;
            self.update_pos[color as usize].push(lib);
            self.seki[lib] = false;
        }
    }

    /// Take a dead string off the board, restoring liberties to everything
    /// that touched it. Returns the number of removed stones.
    fn remove_string(&mut self, id: usize) -> usize {
        let geo = self.geo.clone();
        let zob = zobrist();
        let removed_color = self.string[id].color;
        let capturer = flip_color(removed_color) as usize;

        let mut pos = self.string[id].origin;
        while pos != geo.string_end {
            self.board[pos] = S_EMPTY;
            self.candidates[pos] = true;
            self.pat.update_empty(&geo, pos);
            self.current_hash ^= zob.hash_bit(pos, removed_color as usize);
            self.positional_hash ^= zob.hash_bit(pos, removed_color as usize);
            self.capture_pos[capturer].push(pos);

            for n in geo.neighbor4(pos) {
                let nid = self.string_id[n];
                if self.string[nid].flag {
                    self.string[nid].add_liberty(pos, 0);
                }
            }

            let next = self.string_next[pos];
            self.string_next[pos] = 0;
            self.string_id[pos] = 0;
            pos = next;
        }

        let neighbors: Vec<usize> = self.string[id].neighbor_ids(geo.neighbor_end).collect();
        for nid in neighbors {
            self.string[nid].remove_neighbor(id);
        }
        self.string[id].flag = false;
        self.string[id].size
    }

    /// Simulation flavor: also queues the survivors' liberties for rate
    /// recomputation and records the capture points.
    fn po_remove_string(&mut self, id: usize, color: u8) -> usize {
        let geo = self.geo.clone();
        let color = color as usize;

        // Liberties of short-of-breath neighbors change value.
        let neighbors: Vec<usize> = self.string[id].neighbor_ids(geo.neighbor_end).collect();
        for &nid in &neighbors {
            if self.string[nid].libs < 3 {
                let libs: Vec<Pos> = self.string[nid].liberties(geo.liberty_end).collect();
                for lib in libs {
                    self.update_pos[color].push(lib);
                    self.seki[lib] = false;
                }
            }
        }

        let mut pos = self.string[id].origin;
        while pos != geo.string_end {
            self.board[pos] = S_EMPTY;
            self.candidates[pos] = true;
            self.capture_pos[color].push(pos);
            self.pat.update_md2_empty(&geo, pos);

            for n in geo.neighbor4(pos) {
                let nid = self.string_id[n];
                if self.string[nid].flag {
                    self.string[nid].add_liberty(pos, 0);
                }
            }

            let next = self.string_next[pos];
            self.string_next[pos] = 0;
            self.string_id[pos] = 0;
            pos = next;
        }

        for nid in neighbors {
            self.string[nid].remove_neighbor(id);
        }
        self.string[id].flag = false;
        self.string[id].size
    }

    // =========================================================================
    // Scoring
    // =========================================================================

    /// Chinese area score, black minus white, komi not applied.
    pub fn calculate_score(&mut self) -> i32 {
        self.check_bent_four_in_the_corner();
        let tables = eye_tables();
        let mut scores = [0i32; S_MAX];
        for i in 0..self.geo.pure_board_max {
            let pos = self.geo.onboard_pos[i];
            let mut color = self.board[pos];
            if color == S_EMPTY {
                color = tables.territory[self.pat.pat3(pos) as usize];
            }
            scores[color as usize] += 1;
        }
        scores[S_BLACK as usize] - scores[S_WHITE as usize]
    }

    /// Life-and-death correction: a bent three in the corner with exactly two
    /// shared liberties against a single big neighbor is dead, so the
    /// neighbor is recolored before counting.
    fn check_bent_four_in_the_corner(&mut self) {
        let geo = self.geo.clone();
        for i in 0..4 {
            let corner = geo.corner[i];
            let id = self.string_id[corner];
            if !(self.string[id].flag
                && self.string[id].size == 3
                && self.string[id].libs == 2
                && self.string[id].neighbors == 1)
            {
                continue;
            }
            let color = self.string[id].color;
            let lib1 = self.string[id].lib_head();
            let lib2 = self.string[id].next_lib(lib1);
            let n0 = geo.corner_neighbor[i][0];
            let n1 = geo.corner_neighbor[i][1];
            if !((self.board[n0] == S_EMPTY || self.board[n0] == color)
                && (self.board[n1] == S_EMPTY || self.board[n1] == color))
            {
                continue;
            }
            let neighbor = self.string[id].neighbor_head();
            if self.string[neighbor].libs == 2 && self.string[neighbor].size > 6 {
                let nlib1 = self.string[neighbor].lib_head();
                let nlib2 = self.string[neighbor].next_lib(nlib1);
                if (nlib1 == lib1 && nlib2 == lib2) || (nlib1 == lib2 && nlib2 == lib1) {
                    let mut pos = self.string[neighbor].origin;
                    while pos != geo.string_end {
                        self.board[pos] = color;
                        pos = self.string_next[pos];
                    }
                    self.board[nlib1] = color;
                    self.board[nlib2] = color;
                }
            }
        }
    }

    /// Stones of the string containing `pos`.
    pub fn string_stones(&self, id: usize) -> Vec<Pos> {
        let mut stones = Vec::with_capacity(self.string[id].size);
        let mut pos = self.string[id].origin;
        while pos != self.geo.string_end {
            stones.push(pos);
            pos = self.string_next[pos];
        }
        stones
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const COLS: &[u8] = b"ABCDEFGHJKLMNOPQRST";
        let geo = &self.geo;
        writeln!(
            f,
            "Moves: {:<3}  Prisoners B: {}  W: {}  Komi: {:.1}",
            self.moves - 1,
            self.prisoner[S_BLACK as usize],
            self.prisoner[S_WHITE as usize],
            self.komi[0]
        )?;
        for y in geo.board_start..=geo.board_end {
            write!(f, " {:>2} ", geo.board_end + 1 - y)?;
            for x in geo.board_start..=geo.board_end {
                let pos = geo.pos(x, y);
                let c = match self.board[pos] {
                    S_BLACK => 'X',
                    S_WHITE => 'O',
                    S_EMPTY => '.',
                    _ => ' ',
                };
                let mark = if self.previous_move() == pos { '(' } else { ' ' };
                let close = if self.previous_move() == pos { ')' } else { ' ' };
                write!(f, "{mark}{c}{close}")?;
            }
            writeln!(f)?;
        }
        write!(f, "    ")?;
        for x in 0..geo.pure_board_size {
            write!(f, " {} ", COLS[x] as char)?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game9() -> GameState {
        GameState::new(Geometry::new(9))
    }

    #[test]
    fn empty_board_setup() {
        let game = game9();
        assert_eq!(game.moves, 1);
        let center = game.geo.pos(9, 9);
        assert_eq!(game.board[center], S_EMPTY);
        assert!(game.candidates[center]);
        assert_eq!(game.board[0], S_OB);
    }

    #[test]
    fn single_stone_liberties() {
        let mut game = game9();
        let pos = game.geo.pos(9, 9);
        game.put_stone(pos, S_BLACK);
        let id = game.string_id[pos];
        assert_eq!(game.string[id].libs, 4);
        assert_eq!(game.string[id].size, 1);
        assert_eq!(game.string[id].color, S_BLACK);
    }

    #[test]
    fn corner_stone_liberties() {
        let mut game = game9();
        let corner = game.geo.corner[0];
        game.put_stone(corner, S_BLACK);
        assert_eq!(game.string[game.string_id[corner]].libs, 2);
    }

    #[test]
    fn merge_two_strings() {
        let mut game = game9();
        let geo = game.geo.clone();
        game.put_stone(geo.pos(7, 7), S_BLACK);
        game.put_stone(geo.pos(9, 7), S_BLACK);
        assert_ne!(game.string_id[geo.pos(7, 7)], game.string_id[geo.pos(9, 7)]);
        game.put_stone(geo.pos(8, 7), S_BLACK);
        let id = game.string_id[geo.pos(8, 7)];
        assert_eq!(game.string_id[geo.pos(7, 7)], id);
        assert_eq!(game.string_id[geo.pos(9, 7)], id);
        assert_eq!(game.string[id].size, 3);
        assert_eq!(game.string[id].libs, 8);
    }

    #[test]
    fn capture_single_stone() {
        let mut game = game9();
        let geo = game.geo.clone();
        let target = geo.pos(9, 9);
        game.put_stone(target, S_WHITE);
        for n in geo.neighbor4(target) {
            game.put_stone(n, S_BLACK);
        }
        assert_eq!(game.board[target], S_EMPTY);
        assert_eq!(game.prisoner[S_BLACK as usize], 1);
    }

    #[test]
    fn suicide_is_illegal() {
        let mut game = game9();
        let geo = game.geo.clone();
        // Black surrounds A1's neighbors; white at A1 would be suicide.
        let a1 = geo.pos(geo.board_start, geo.board_end);
        game.put_stone(geo.east(a1), S_BLACK);
        game.put_stone(geo.north(a1), S_BLACK);
        assert_eq!(game.legality(a1, S_WHITE), Err(MoveError::Suicide));
        assert!(game.is_legal(a1, S_BLACK));
    }

    #[test]
    fn ko_is_rejected_then_allowed() {
        let mut game = game9();
        let geo = game.geo.clone();
        let (x, y) = (9, 9);
        // Classic ko shape around (x, y).
        game.put_stone(geo.pos(x - 1, y), S_BLACK);
        game.put_stone(geo.pos(x, y - 1), S_BLACK);
        game.put_stone(geo.pos(x, y + 1), S_BLACK);
        game.put_stone(geo.pos(x + 2, y), S_WHITE);
        game.put_stone(geo.pos(x + 1, y - 1), S_WHITE);
        game.put_stone(geo.pos(x + 1, y + 1), S_WHITE);
        game.put_stone(geo.pos(x, y), S_WHITE);
        // Black captures the ko.
        let take = geo.pos(x + 1, y);
        assert!(game.is_legal(take, S_BLACK));
        game.put_stone(take, S_BLACK);
        assert_eq!(game.ko_pos, geo.pos(x, y));
        // Immediate recapture is ko.
        assert_eq!(game.legality(geo.pos(x, y), S_WHITE), Err(MoveError::Ko));
        // After a pair of outside moves the ko may be retaken.
        game.put_stone(geo.pos(5, 5), S_WHITE);
        game.put_stone(geo.pos(6, 5), S_BLACK);
        assert!(game.is_legal(geo.pos(x, y), S_WHITE));
    }

    #[test]
    fn positional_hash_matches_scratch_recomputation() {
        let mut game = game9();
        let geo = game.geo.clone();
        let moves = [
            (geo.pos(7, 7), S_BLACK),
            (geo.pos(8, 7), S_WHITE),
            (geo.pos(7, 8), S_BLACK),
            (geo.pos(8, 8), S_WHITE),
            (geo.pos(7, 9), S_BLACK),
            (geo.pos(8, 9), S_WHITE),
        ];
        for (pos, color) in moves {
            game.put_stone(pos, color);
        }
        let zob = zobrist();
        let mut scratch = 0u64;
        for &pos in &geo.onboard_pos {
            if game.board[pos] == S_BLACK || game.board[pos] == S_WHITE {
                scratch ^= zob.hash_bit(pos, game.board[pos] as usize);
            }
        }
        assert_eq!(scratch, game.positional_hash);
    }

    #[test]
    fn superko_rejects_repetition() {
        let mut game = game9();
        game.set_superko(true);
        let geo = game.geo.clone();
        let (x, y) = (9, 9);
        game.put_stone(geo.pos(x - 1, y), S_BLACK);
        game.put_stone(geo.pos(x, y - 1), S_BLACK);
        game.put_stone(geo.pos(x, y + 1), S_BLACK);
        game.put_stone(geo.pos(x + 2, y), S_WHITE);
        game.put_stone(geo.pos(x + 1, y - 1), S_WHITE);
        game.put_stone(geo.pos(x + 1, y + 1), S_WHITE);
        game.put_stone(geo.pos(x, y), S_WHITE);
        game.put_stone(geo.pos(x + 1, y), S_BLACK);
        // The simple ko is caught by the super-ko rule as well.
        assert!(!game.is_legal(geo.pos(x, y), S_WHITE));
    }

    #[test]
    fn eye_tables_recognize_plain_eye() {
        let tables = eye_tables();
        assert_eq!(tables.eye[0x5555], S_BLACK);
        assert_eq!(tables.territory[0x1144], S_BLACK);
        assert_eq!(tables.nb4_empty[0], 4);
    }

    #[test]
    fn score_counts_territory() {
        let mut game = game9();
        let geo = game.geo.clone();
        // A black stone wall across the second column.
        for y in geo.board_start..=geo.board_end {
            game.put_stone(geo.pos(geo.board_start + 1, y), S_BLACK);
        }
        let score = game.calculate_score();
        assert!(score > 0, "black should lead, got {score}");
    }
}
