//! Capturing-race helpers shared by the rating models and legality tests.
//!
//! The "for simulation" variants reason over the live string lists without
//! touching the board; the search variants play the move out on a per-thread
//! scratch state and inspect the result.

use std::cell::RefCell;
use std::sync::Arc;

use crate::board::GameState;
use crate::constants::*;

/// Liberty trend of a string after a candidate move.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LibertyState {
    Decrease,
    Even,
    Increase,
}

thread_local! {
    static SCRATCH: RefCell<Option<GameState>> = const { RefCell::new(None) };
}

/// Run `f` over a scratch copy of `game`. The copy is reused across calls on
/// the same thread; do not nest.
fn with_scratch<R>(game: &GameState, f: impl FnOnce(&mut GameState) -> R) -> R {
    SCRATCH.with(|cell| {
        let mut slot = cell.borrow_mut();
        let recycle = matches!(slot.as_ref(), Some(s) if Arc::ptr_eq(&s.geo, &game.geo));
        if !recycle {
            *slot = Some(GameState::new(game.geo.clone()));
        }
        let scratch = slot.as_mut().unwrap();
        scratch.copy_from(game);
        f(scratch)
    })
}

/// Would `color` playing `pos` leave its own string with at most one liberty?
pub fn is_self_atari(game: &GameState, color: u8, pos: Pos) -> bool {
    let geo = &game.geo;
    let other = flip_color(color);
    let mut libs: Vec<Pos> = Vec::with_capacity(8);
    let mut merged: Vec<usize> = Vec::with_capacity(4);

    for n in geo.neighbor4(pos) {
        match game.board[n] {
            S_EMPTY => {
                if !libs.contains(&n) {
                    libs.push(n);
                }
            }
            c if c == color => {
                let id = game.string_id[n];
                if merged.contains(&id) {
                    continue;
                }
                if game.string[id].libs > 2 {
                    return false;
                }
                for lib in game.string[id].liberties(geo.liberty_end) {
                    if lib != pos && !libs.contains(&lib) {
                        libs.push(lib);
                    }
                }
                merged.push(id);
            }
            c if c == other => {
                // Capturing restores liberties.
                if game.string[game.string_id[n]].libs == 1 {
                    return false;
                }
            }
            _ => {}
        }
        if libs.len() >= 2 {
            return false;
        }
    }
    true
}

/// An enemy string diagonal to a false eye counts as captured when every one
/// of its liberties is walled in by the strings forming the eye, so the eye
/// does not actually need mending.
pub fn is_already_captured(
    game: &GameState,
    _color: u8,
    id: usize,
    player_ids: &[usize],
) -> bool {
    let geo = &game.geo;
    let string = &game.string[id];
    if !string.flag {
        return false;
    }
    if string.libs == 1 {
        return true;
    }
    for lib in string.liberties(geo.liberty_end) {
        for n in geo.neighbor4(lib) {
            match game.board[n] {
                S_OB => {}
                S_EMPTY => return false,
                _ => {
                    let nid = game.string_id[n];
                    if nid != id && !player_ids.contains(&nid) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Can the atari played at `pos` actually capture the string at
/// `opponent_pos`, even after it runs?
pub fn is_capturable_atari(game: &GameState, pos: Pos, color: u8, opponent_pos: Pos) -> bool {
    if !game.is_legal(pos, color) {
        return false;
    }
    let other = flip_color(color);
    with_scratch(game, |scratch| {
        scratch.put_stone(pos, color);
        let geo = scratch.geo.clone();
        let id = scratch.string_id[opponent_pos];

        // A counter-capture rescues the string.
        for nid in scratch.string[id].neighbor_ids(geo.neighbor_end) {
            if scratch.string[nid].libs == 1 {
                return false;
            }
        }

        let escape = scratch.string[id].lib_head();
        if !scratch.is_legal(escape, other) {
            return true;
        }
        scratch.put_stone(escape, other);
        scratch.string[scratch.string_id[opponent_pos]].libs == 1
    })
}

/// Like [`is_capturable_atari`], returning the size of the string that stays
/// dead after it runs (for the oiotoshi feature). `None` when it escapes.
pub fn check_oiotoshi(game: &GameState, pos: Pos, color: u8, opponent_pos: Pos) -> Option<usize> {
    if !game.is_legal(pos, color) {
        return None;
    }
    let other = flip_color(color);
    with_scratch(game, |scratch| {
        scratch.put_stone(pos, color);
        let geo = scratch.geo.clone();
        let id = scratch.string_id[opponent_pos];

        for nid in scratch.string[id].neighbor_ids(geo.neighbor_end) {
            if scratch.string[nid].libs == 1 {
                return None;
            }
        }

        let escape = scratch.string[id].lib_head();
        if !scratch.is_legal(escape, other) {
            return None;
        }
        scratch.put_stone(escape, other);
        let id = scratch.string_id[opponent_pos];
        if scratch.string[id].libs == 1 {
            Some(scratch.string[id].size)
        } else {
            None
        }
    })
}

/// If exactly one single-stone neighbor of string `id` is in atari, return
/// its liberty (the snapback candidate point).
pub fn capturable_candidate(game: &GameState, id: usize) -> Option<Pos> {
    let geo = &game.geo;
    let mut candidate = None;
    for nid in game.string[id].neighbor_ids(geo.neighbor_end) {
        if game.string[nid].libs == 1 {
            if game.string[nid].size >= 2 || candidate.is_some() {
                return None;
            }
            candidate = Some(game.string[nid].lib_head());
        }
    }
    candidate
}

/// Would the enemy's escape from atari be captured on the spot?
pub fn is_deadly_extension(game: &GameState, color: u8, id: usize) -> bool {
    let other = flip_color(color);
    let pos = game.string[id].lib_head();

    let tables = crate::board::eye_tables();
    if tables.nb4_empty[game.pat.pat3(pos) as usize] == 0 && game.is_suicide(pos, other) {
        return true;
    }
    with_scratch(game, |scratch| {
        scratch.put_stone(pos, other);
        scratch.string[scratch.string_id[pos]].libs == 1
    })
}

/// True when no adjacent enemy string is capturable right now.
pub fn is_capturable_neighbor_none(game: &GameState, id: usize) -> bool {
    game.string[id]
        .neighbor_ids(game.geo.neighbor_end)
        .all(|nid| game.string[nid].libs != 1)
}

/// Does capturing at `pos` leave the capturer's own string in atari?
pub fn is_self_atari_capture(game: &GameState, pos: Pos, color: u8, id: usize) -> bool {
    let string_pos = game.string[id].origin;
    if !game.is_legal(pos, color) {
        return false;
    }
    with_scratch(game, |scratch| {
        scratch.put_stone(pos, color);
        scratch.string[scratch.string_id[string_pos]].libs == 1
    })
}

/// How would the liberty count of string `id` change after `color` plays
/// `pos`?
pub fn check_liberty_state(game: &GameState, pos: Pos, color: u8, id: usize) -> LibertyState {
    let string_pos = game.string[id].origin;
    let libs = game.string[id].libs;
    if !game.is_legal(pos, color) {
        return LibertyState::Decrease;
    }
    with_scratch(game, |scratch| {
        scratch.put_stone(pos, color);
        let new_libs = scratch.string[scratch.string_id[string_pos]].libs;
        if new_libs > libs + 1 {
            LibertyState::Increase
        } else if new_libs > libs {
            LibertyState::Even
        } else {
            LibertyState::Decrease
        }
    })
}

/// Cheap board-only test: does the atari at `pos` against string `id`
/// (two liberties) capture it for sure? Used in the simulation policy where
/// no scratch copies are affordable.
pub fn is_capturable_atari_for_simulation(
    game: &GameState,
    pos: Pos,
    color: u8,
    id: usize,
) -> bool {
    let geo = &game.geo;
    let other = flip_color(color);
    let tables = crate::board::eye_tables();

    let mut lib = game.string[id].lib_head();
    if lib == pos {
        lib = game.string[id].next_lib(lib);
    }

    let empty = tables.nb4_empty[game.pat.pat3(lib) as usize] as usize;
    if empty == 3 {
        return false;
    }

    let distance = lib as isize - pos as isize;
    let bs = geo.board_size as isize;
    let neighbor = distance == 1 || distance == -1 || distance == bs || distance == -bs;

    if (neighbor && empty >= 3) || (!neighbor && empty >= 2) {
        return false;
    }

    // Liberties gained by connecting out through the escape point.
    let mut connect_libs = 0;
    for n in geo.neighbor4(lib) {
        if game.board[n] == other && game.string_id[n] != id {
            let tmp = game.string_id[n];
            if game.string[tmp].libs > 2 {
                return false;
            }
            connect_libs += game.string[tmp].libs - 1;
        }
    }

    (neighbor && connect_libs < 2) || (!neighbor && connect_libs < 1)
}

/// Cheap board-only test: does capturing the single stone whose liberty is
/// `pos` put the capturer itself in atari (a throw-in shape)?
pub fn is_self_atari_capture_for_simulation(
    game: &GameState,
    pos: Pos,
    color: u8,
    lib: Pos,
) -> bool {
    let geo = &game.geo;
    let other = flip_color(color);
    let tables = crate::board::eye_tables();

    if lib != pos || tables.nb4_empty[game.pat.pat3(pos) as usize] != 0 {
        return false;
    }

    let mut size = 0;
    for n in geo.neighbor4(pos) {
        if game.board[n] == color {
            if game.string[game.string_id[n]].libs > 1 {
                return false;
            }
        } else if game.board[n] == other {
            size += game.string[game.string_id[n]].size;
            if size > 1 {
                return false;
            }
        }
    }
    true
}
