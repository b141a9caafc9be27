//! Ladder reading over the undo-capable board.
//!
//! A string in atari either runs or is saved by a counter-capture; the
//! chasing side answers by filling liberties. The reading is depth-limited to
//! 100 plies and explores counter-captures before extensions, which is enough
//! for real ladders while bounding pathological spirals.

use crate::board::GameState;
use crate::constants::*;
use crate::search_board::SearchGameState;

const LADDER_DEPTH_MAX: usize = 100;

/// Can `turn_color` (alternating) keep the string through `target` alive?
/// Returns true when the escaping side survives.
fn is_ladder_alive(
    depth: usize,
    game: &mut SearchGameState,
    target: Pos,
    turn_color: u8,
) -> bool {
    if depth >= LADDER_DEPTH_MAX {
        return true;
    }
    if game.board[target] == S_EMPTY {
        return false;
    }
    let id = game.string_id[target];
    if game.string[id].libs >= 3 {
        return true;
    }

    let escape_color = game.board[target];
    let capture_color = flip_color(escape_color);
    let geo = game.geo.clone();

    if turn_color == escape_color {
        // Capture any adjacent string in atari first.
        let rescues: Vec<Pos> = game.string[id]
            .neighbor_ids(geo.neighbor_end)
            .filter(|&nid| game.string[nid].libs == 1)
            .map(|nid| game.string[nid].lib_head())
            .collect();
        for pos in rescues {
            if game.is_legal_for_search(pos, escape_color) {
                game.put_stone_for_search(pos, escape_color);
                let alive = is_ladder_alive(depth + 1, game, target, capture_color);
                game.undo();
                if alive {
                    return true;
                }
            }
        }
        // Then try every liberty as an extension.
        let escapes: Vec<Pos> = game.string[id].liberties(geo.liberty_end).collect();
        for pos in escapes {
            if game.is_legal_for_search(pos, escape_color) {
                game.put_stone_for_search(pos, escape_color);
                let alive = is_ladder_alive(depth + 1, game, target, capture_color);
                game.undo();
                if alive {
                    return true;
                }
            }
        }
        false
    } else {
        if game.string[id].libs == 1 {
            return false;
        }
        let chases: Vec<Pos> = game.string[id].liberties(geo.liberty_end).collect();
        for pos in chases {
            if game.is_legal_for_search(pos, capture_color) {
                game.put_stone_for_search(pos, capture_color);
                let alive = is_ladder_alive(depth + 1, game, target, escape_color);
                game.undo();
                if !alive {
                    return false;
                }
            }
        }
        true
    }
}

/// Mark every move that runs a string of `color` into a losing ladder.
/// `ladder_pos` is indexed by intersection.
pub fn ladder_extension(game: &GameState, color: u8, ladder_pos: &mut [bool]) {
    let geo = game.geo.clone();
    let other = flip_color(color);
    let mut checked = vec![false; geo.board_max];
    let mut search: Option<SearchGameState> = None;

    for i in 1..geo.max_string {
        if !game.string[i].flag || game.string[i].color != color || game.string[i].libs != 1 {
            continue;
        }
        let escape = game.string[i].lib_head();
        if checked[escape] {
            continue;
        }

        let search_game = search.get_or_insert_with(|| SearchGameState::from_game(game));
        let mut saved = false;

        // A counter-capture may release the string.
        let rescues: Vec<Pos> = game.string[i]
            .neighbor_ids(geo.neighbor_end)
            .filter(|&nid| game.string[nid].libs == 1)
            .map(|nid| game.string[nid].lib_head())
            .collect();
        for pos in rescues {
            if saved {
                break;
            }
            if game.is_legal(pos, color) {
                search_game.put_stone_for_search(pos, color);
                if !is_ladder_alive(0, search_game, game.string[i].origin, other) {
                    if game.string[i].size >= 2 {
                        ladder_pos[pos] = true;
                    }
                } else {
                    saved = true;
                }
                search_game.undo();
            }
        }

        // Otherwise, running must survive the chase.
        if !saved && game.is_legal(escape, color) {
            search_game.put_stone_for_search(escape, color);
            if game.string[i].size >= 2 && !is_ladder_alive(0, search_game, escape, other) {
                ladder_pos[escape] = true;
            }
            search_game.undo();
        }
        checked[escape] = true;
    }
}

/// Is extending the atari'd string at `pos` a hopeless ladder run?
pub fn check_ladder_extension(game: &GameState, color: u8, pos: Pos) -> bool {
    if game.board[pos] != color {
        return false;
    }
    let id = game.string_id[pos];
    let escape = game.string[id].lib_head();
    if game.string[id].libs != 1 || !game.is_legal(escape, color) {
        return false;
    }
    let mut search_game = SearchGameState::from_game(game);
    search_game.put_stone_for_search(escape, color);
    !is_ladder_alive(0, &mut search_game, escape, flip_color(color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    /// Surround a white stone at `(x, y)` so that its only escape runs a
    /// zigzag ladder to the south-west: black holds north, west, east and the
    /// south-east diagonal, leaving exactly two liberties per extension.
    fn laddered_stone(game: &mut GameState, x: usize, y: usize) -> Pos {
        let geo = game.geo.clone();
        let w = geo.pos(x, y);
        game.put_stone(w, S_WHITE);
        game.put_stone(geo.west(w), S_BLACK);
        game.put_stone(geo.north(w), S_BLACK);
        game.put_stone(geo.east(geo.south(w)), S_BLACK);
        game.put_stone(geo.east(w), S_BLACK);
        w
    }

    #[test]
    fn plain_ladder_is_dead() {
        let geo = Geometry::new(19);
        let mut game = GameState::new(geo.clone());
        let w = laddered_stone(&mut game, 8, 8);
        assert_eq!(game.string[game.string_id[w]].libs, 1);
        assert!(check_ladder_extension(&game, S_WHITE, w));
    }

    #[test]
    fn ladder_with_breaker_is_alive() {
        let geo = Geometry::new(19);
        let mut game = GameState::new(geo.clone());
        // A white stone waiting on the zigzag path breaks the ladder.
        game.put_stone(geo.pos(16, 15), S_WHITE);
        let w = laddered_stone(&mut game, 20, 11);
        assert!(!check_ladder_extension(&game, S_WHITE, w));
    }

    #[test]
    fn ladder_extension_marks_escape_of_two_stone_string() {
        let geo = Geometry::new(19);
        let mut game = GameState::new(geo.clone());
        let w = geo.pos(8, 8);
        let w2 = geo.south(w);
        // Two-stone white string whose run would zigzag to the lower left.
        game.put_stone(w, S_WHITE);
        game.put_stone(w2, S_WHITE);
        for pos in [
            geo.north(w),
            geo.west(w),
            geo.east(w),
            geo.west(w2),
            geo.east(w2),
            // South-east diagonal of the string's head keeps the run a ladder.
            geo.east(geo.south(w2)),
        ] {
            game.put_stone(pos, S_BLACK);
        }

        let id = game.string_id[w];
        assert_eq!(game.string[id].libs, 1);
        let escape = game.string[id].lib_head();

        let mut ladder = vec![false; geo.board_max];
        ladder_extension(&game, S_WHITE, &mut ladder);
        assert!(ladder[escape], "escape move should be flagged as a ladder");
    }
}
