//! Undo-capable board flavor for tactical reading.
//!
//! Ladder search plays and retracts long forcing sequences, so this board
//! records, per move, every string the move modified (captured enemy strings
//! and the own strings it extended or merged) together with the pre-move ko
//! state. [`SearchGameState::undo`] removes the move's own string and rebuilds
//! the recorded ones. Only MD2 patterns are maintained; reading never looks
//! further out.

use std::sync::Arc;

use crate::board::{GameState, Geometry, StoneString, eye_tables};
use crate::constants::*;
use crate::pattern::PatternSet;

struct RecordedString {
    id: usize,
    color: u8,
    stones: Vec<Pos>,
}

#[derive(Default)]
struct UndoRecord {
    strings: Vec<RecordedString>,
    ko_move: usize,
    ko_pos: Pos,
}

/// Board state with per-move undo records.
pub struct SearchGameState {
    pub geo: Arc<Geometry>,
    pub record: Vec<(u8, Pos)>,
    pub moves: usize,
    pub prisoner: [usize; S_MAX],
    pub ko_pos: Pos,
    pub ko_move: usize,
    pub board: Vec<u8>,
    pub pat: PatternSet,
    pub string: Vec<StoneString>,
    pub string_id: Vec<usize>,
    pub string_next: Vec<usize>,
    pub candidates: Vec<bool>,
    undo: Vec<UndoRecord>,
}

impl SearchGameState {
    pub fn from_game(src: &GameState) -> SearchGameState {
        let geo = src.geo.clone();
        let mut undo: Vec<UndoRecord> = (0..geo.max_records).map(|_| UndoRecord::default()).collect();
        undo[src.moves].ko_move = src.ko_move;
        undo[src.moves].ko_pos = src.ko_pos;
        SearchGameState {
            record: src.record.iter().map(|r| (r.color, r.pos)).collect(),
            moves: src.moves,
            prisoner: src.prisoner,
            ko_pos: src.ko_pos,
            ko_move: src.ko_move,
            board: src.board.clone(),
            pat: src.pat.clone(),
            string: src.string.clone(),
            string_id: src.string_id.clone(),
            string_next: src.string_next.clone(),
            candidates: src.candidates.clone(),
            undo,
            geo,
        }
    }

    pub fn is_legal_for_search(&self, pos: Pos, color: u8) -> bool {
        if self.board[pos] != S_EMPTY {
            return false;
        }
        let tables = eye_tables();
        if tables.nb4_empty[self.pat.pat3(pos) as usize] == 0 && self.is_suicide(pos, color) {
            return false;
        }
        !(self.ko_pos == pos && self.ko_move == self.moves - 1)
    }

    fn is_suicide(&self, pos: Pos, color: u8) -> bool {
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

    /// Snapshot string `id` into the current move's undo record.
    fn record_string(&mut self, id: usize) {
        let mut stones = Vec::with_capacity(self.string[id].size);
        let mut pos = self.string[id].origin;
        while pos != self.geo.string_end {
            stones.push(pos);
            pos = self.string_next[pos];
        }
        let rec = RecordedString { id, color: self.string[id].color, stones };
        self.undo[self.moves].strings.push(rec);
    }

    pub fn put_stone_for_search(&mut self, pos: Pos, color: u8) {
        let geo = self.geo.clone();
        let other = flip_color(color);

        if self.moves < geo.max_records {
            self.record[self.moves] = (color, pos);
            self.undo[self.moves].strings.clear();
        }

        if pos == PASS {
            self.moves += 1;
            self.roll_undo_base();
            return;
        }

        self.board[pos] = color;
        self.candidates[pos] = false;
        self.pat.update_md2_stone(&geo, color, pos);

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
                    self.record_string(id);
                    prisoner += self.remove_string(id);
                }
            }
        }
        self.prisoner[color as usize] += prisoner;

        match connect.len() {
            0 => {
                self.make_string(pos, color);
                let id = self.string_id[pos];
                if prisoner == 1 && self.string[id].libs == 1 {
                    self.ko_move = self.moves;
                    self.ko_pos = self.string[id].lib_head();
                }
            }
            1 => {
                self.record_string(connect[0]);
                self.add_stone(pos, color, connect[0]);
            }
            _ => {
                let mut distinct: Vec<usize> = Vec::with_capacity(4);
                for &id in &connect {
                    if !distinct.contains(&id) {
                        distinct.push(id);
                    }
                }
                for &id in &distinct {
                    self.record_string(id);
                }
                let min = *distinct.iter().min().unwrap();
                self.add_stone(pos, color, min);
                let merge: Vec<usize> = distinct.into_iter().filter(|&id| id != min).collect();
                if !merge.is_empty() {
                    self.merge_string(min, &merge);
                }
            }
        }

        self.moves += 1;
        self.roll_undo_base();
    }

    fn roll_undo_base(&mut self) {
        if self.moves < self.geo.max_records {
            self.undo[self.moves].strings.clear();
            self.undo[self.moves].ko_move = self.ko_move;
            self.undo[self.moves].ko_pos = self.ko_pos;
        }
    }

    /// Retract the last move.
    pub fn undo(&mut self) {
        let pm = self.moves - 1;
        let (played_color, previous_move) = self.record[pm];
        let opponent = flip_color(played_color);

        if previous_move != PASS {
            self.remove_string(self.string_id[previous_move]);
            let strings = std::mem::take(&mut self.undo[pm].strings);
            for rec in &strings {
                if rec.color == opponent {
                    self.prisoner[played_color as usize] -= rec.stones.len();
                }
                self.restore_chain(rec);
            }
        }

        self.ko_move = self.undo[pm].ko_move;
        self.ko_pos = self.undo[pm].ko_pos;
        self.moves -= 1;
    }

    fn restore_chain(&mut self, rec: &RecordedString) {
        let geo = self.geo.clone();
        let id = rec.id;
        let color = rec.color;
        let other = flip_color(color);
        let stones = &rec.stones;

        self.string[id].reset(color, stones[0], geo.liberty_end, geo.neighbor_end);
        self.string[id].size = stones.len();

        for &pos in stones {
            self.board[pos] = color;
            self.string_id[pos] = id;
            self.pat.update_md2_stone(&geo, color, pos);
        }
        for w in stones.windows(2) {
            self.string_next[w[0]] = w[1];
        }
        self.string_next[*stones.last().unwrap()] = geo.string_end;

        let mut lib_head = 0;
        for &pos in stones {
            for n in geo.neighbor4(pos) {
                if self.board[n] == S_EMPTY {
                    lib_head = self.string[id].add_liberty(n, lib_head);
                } else if self.board[n] == other {
                    let nid = self.string_id[n];
                    self.remove_liberty(nid, pos);
                    self.string[nid].add_neighbor(id);
                    self.string[id].add_neighbor(nid);
                }
            }
        }
        self.string[id].flag = true;
    }

    // String maintenance, mirroring the main board.

    fn make_string(&mut self, pos: Pos, color: u8) {
        let geo = self.geo.clone();
        let other = flip_color(color);
        let mut id = 1;
        while self.string[id].flag {
            id += 1;
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

    fn add_stone_to_string(&mut self, id: usize, pos: Pos) {
        if pos == self.geo.string_end {
            return;
        }
        if self.string[id].origin > pos {
            self.string_next[pos] = self.string[id].origin;
            self.string[id].origin = pos;
        } else {
            let mut cur = self.string[id].origin;
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
        self.add_stone_to_string(id, pos);
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

    fn merge_string(&mut self, dst: usize, srcs: &[usize]) {
        let geo = self.geo.clone();
        for &src in srcs {
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
            for stone in stones {
                self.string_id[stone] = dst;
                self.add_stone_to_string(dst, stone);
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
        self.string[id].remove_liberty(pos);
        if self.string[id].libs == 1 {
            let lib = self.string[id].lib_head();
            self.candidates[lib] = true;
        }
    }

    fn remove_string(&mut self, id: usize) -> usize {
        let geo = self.geo.clone();
        let mut pos = self.string[id].origin;
        while pos != geo.string_end {
            self.board[pos] = S_EMPTY;
            self.candidates[pos] = true;
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
        let neighbors: Vec<usize> = self.string[id].neighbor_ids(geo.neighbor_end).collect();
        for nid in neighbors {
            self.string[nid].remove_neighbor(id);
        }
        self.string[id].flag = false;
        self.string[id].size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;
    use crate::zobrist::zobrist;

    fn positional_hash(state: &SearchGameState) -> u64 {
        let zob = zobrist();
        let mut h = 0u64;
        for &pos in &state.geo.onboard_pos {
            let c = state.board[pos];
            if c == S_BLACK || c == S_WHITE {
                h ^= zob.hash_bit(pos, c as usize);
            }
        }
        h
    }

    fn snapshot(state: &SearchGameState) -> (Vec<u8>, [usize; S_MAX], usize, Pos, u64) {
        (
            state.board.clone(),
            state.prisoner,
            state.ko_move,
            state.ko_pos,
            positional_hash(state),
        )
    }

    #[test]
    fn apply_undo_round_trip() {
        let geo = Geometry::new(9);
        let game = GameState::new(geo.clone());
        let mut search = SearchGameState::from_game(&game);
        let before = snapshot(&search);

        let seq = [
            (geo.pos(8, 8), S_WHITE),
            (geo.pos(8, 7), S_BLACK),
            (geo.pos(7, 8), S_BLACK),
            (geo.pos(9, 8), S_BLACK),
            // The last move fills the final liberty and captures the stone.
            (geo.pos(8, 9), S_BLACK),
        ];
        for &(pos, color) in &seq {
            assert!(search.is_legal_for_search(pos, color));
            search.put_stone_for_search(pos, color);
        }
        assert!(search.prisoner[S_BLACK as usize] > 0);

        for _ in 0..seq.len() {
            search.undo();
        }
        let after = snapshot(&search);
        assert_eq!(before.0, after.0, "board differs after undo");
        assert_eq!(before.1, after.1, "prisoners differ after undo");
        assert_eq!(before.2, after.2, "ko move differs after undo");
        assert_eq!(before.3, after.3, "ko point differs after undo");
        assert_eq!(before.4, after.4, "stones differ after undo");
        assert_eq!(search.moves, 1);
    }

    #[test]
    fn undo_restores_md2_patterns() {
        let geo = Geometry::new(9);
        let game = GameState::new(geo.clone());
        let mut search = SearchGameState::from_game(&game);

        let probe = geo.pos(8, 8);
        let before = search.pat.md2(probe);
        search.put_stone_for_search(geo.pos(8, 7), S_BLACK);
        search.put_stone_for_search(geo.pos(7, 8), S_WHITE);
        assert_ne!(search.pat.md2(probe), before);
        search.undo();
        search.undo();
        assert_eq!(search.pat.md2(probe), before);
    }

    #[test]
    fn undo_after_merge_restores_separate_strings() {
        let geo = Geometry::new(9);
        let game = GameState::new(geo.clone());
        let mut search = SearchGameState::from_game(&game);

        search.put_stone_for_search(geo.pos(7, 7), S_BLACK);
        search.put_stone_for_search(geo.pos(5, 5), S_WHITE);
        search.put_stone_for_search(geo.pos(9, 7), S_BLACK);
        let id1 = search.string_id[geo.pos(7, 7)];
        let id2 = search.string_id[geo.pos(9, 7)];
        assert_ne!(id1, id2);

        search.put_stone_for_search(geo.pos(6, 5), S_WHITE);
        search.put_stone_for_search(geo.pos(8, 7), S_BLACK);
        assert_eq!(search.string_id[geo.pos(7, 7)], search.string_id[geo.pos(9, 7)]);

        search.undo();
        assert_ne!(search.string_id[geo.pos(7, 7)], search.string_id[geo.pos(9, 7)]);
        assert_eq!(search.string[search.string_id[geo.pos(7, 7)]].libs, 4);
        assert_eq!(search.board[geo.pos(8, 7)], S_EMPTY);
    }
}
