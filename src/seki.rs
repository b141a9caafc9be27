//! Mutual-life (seki) detection.
//!
//! A point both sides can only self-atari on is a seki candidate. A short
//! two-liberty string whose both liberties are candidates, facing exactly one
//! enemy string across each, is in seki when the shared outside liberty (or
//! the pair of half-eyes behind the enemy strings) proves neither side can
//! fill first. Marked points are excluded from simulation moves so playouts
//! do not destroy the seki.

use crate::board::{E_COMPLETE_HALF_EYE, E_NOT_EYE, GameState, eye_tables};
use crate::constants::*;
use crate::semeai::is_self_atari;

/// Mark every intersection that keeps a seki alive.
pub fn check_seki(game: &GameState, seki: &mut [bool]) {
    let geo = game.geo.clone();
    let tables = eye_tables();
    let mut candidate = vec![false; geo.board_max];

    for &pos in &geo.onboard_pos {
        if game.board[pos] == S_EMPTY
            && is_self_atari(game, S_BLACK, pos)
            && is_self_atari(game, S_WHITE, pos)
        {
            candidate[pos] = true;
        }
    }

    // Strings adjacent to `lib`, excluding `skip`.
    let ids_around = |lib: Pos, skip: usize| -> Vec<usize> {
        let mut ids = Vec::with_capacity(4);
        for n in geo.neighbor4(lib) {
            let b = game.board[n];
            if b == S_BLACK || b == S_WHITE {
                let id = game.string_id[n];
                if id != skip && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    };

    // The liberty of `id` that is neither `lib1` nor `lib2`.
    let outside_liberty = |id: usize, lib1: Pos, lib2: Pos| -> Pos {
        let string = &game.string[id];
        let mut lib = string.lib_head();
        while lib == lib1 || lib == lib2 {
            lib = string.next_lib(lib);
        }
        lib
    };

    for i in 1..geo.max_string {
        let string = &game.string[i];
        if !string.flag || string.libs != 2 || string.size >= 6 {
            continue;
        }
        let lib1 = string.lib_head();
        let lib2 = string.next_lib(lib1);
        if !candidate[lib1] || !candidate[lib2] {
            continue;
        }

        let lib1_ids = ids_around(lib1, i);
        let lib2_ids = ids_around(lib2, i);
        if lib1_ids.len() != 1 || lib2_ids.len() != 1 {
            continue;
        }

        let n1_lib = outside_liberty(lib1_ids[0], lib1, lib2);
        let n2_lib = outside_liberty(lib2_ids[0], lib1, lib2);
        if n1_lib == geo.liberty_end || n2_lib == geo.liberty_end {
            continue;
        }

        if n1_lib == n2_lib {
            if tables.eye_condition[game.pat.pat3(n1_lib) as usize] != E_NOT_EYE {
                seki[lib1] = true;
                seki[lib2] = true;
                seki[n1_lib] = true;
            }
        } else if tables.eye_condition[game.pat.pat3(n1_lib) as usize] == E_COMPLETE_HALF_EYE
            && tables.eye_condition[game.pat.pat3(n2_lib) as usize] == E_COMPLETE_HALF_EYE
        {
            // Both enemy tails end in half eyes backed by the same string.
            let backer = |lib: Pos| -> usize {
                let mut id = 0;
                for n in geo.neighbor4(lib) {
                    let b = game.board[n];
                    if b == S_BLACK || b == S_WHITE {
                        let nid = game.string_id[n];
                        if nid != lib1_ids[0] && nid != lib2_ids[0] {
                            id = nid;
                        }
                    }
                }
                id
            };
            if backer(n1_lib) == backer(n2_lib) {
                seki[lib1] = true;
                seki[lib2] = true;
                seki[n1_lib] = true;
                seki[n2_lib] = true;
            }
        }
    }
}
