//! Board-engine invariants checked over generated games, plus the concrete
//! capture scenarios.

use pretty_assertions::assert_eq;

use tengen::board::{GameState, Geometry};
use tengen::constants::*;
use tengen::pattern::MD2_OFFSETS;
use tengen::point::gtp_to_pos;
use tengen::zobrist::zobrist;

/// Every string's stored lists must agree with a scratch recomputation from
/// the board.
fn check_string_invariants(game: &GameState) {
    let geo = &game.geo;
    for id in 1..geo.max_string {
        let string = &game.string[id];
        if !string.flag {
            continue;
        }

        let stones = game.string_stones(id);
        assert_eq!(stones.len(), string.size, "string {id} size mismatch");
        for &p in &stones {
            assert_eq!(game.string_id[p], id, "member of string {id} has wrong id");
            assert_eq!(game.board[p], string.color, "member color mismatch");
        }

        let mut libs: Vec<Pos> = Vec::new();
        for &p in &stones {
            for n in geo.neighbor4(p) {
                if game.board[n] == S_EMPTY && !libs.contains(&n) {
                    libs.push(n);
                }
            }
        }
        libs.sort_unstable();
        let listed: Vec<Pos> = string.liberties(geo.liberty_end).collect();
        assert_eq!(listed.len(), string.libs, "liberty count mismatch for string {id}");
        assert_eq!(listed, libs, "liberty list mismatch for string {id}");

        let mut neighbor_ids: Vec<usize> = Vec::new();
        for &p in &stones {
            for n in geo.neighbor4(p) {
                if game.board[n] == flip_color(string.color) {
                    let nid = game.string_id[n];
                    if !neighbor_ids.contains(&nid) {
                        neighbor_ids.push(nid);
                    }
                }
            }
        }
        neighbor_ids.sort_unstable();
        let listed: Vec<usize> = string.neighbor_ids(geo.neighbor_end).collect();
        assert_eq!(listed, neighbor_ids, "neighbor list mismatch for string {id}");
    }
}

fn check_hash_and_patterns(game: &GameState) {
    let geo = &game.geo;
    let zob = zobrist();

    let mut scratch = 0u64;
    for &pos in &geo.onboard_pos {
        let c = game.board[pos];
        if c == S_BLACK || c == S_WHITE {
            scratch ^= zob.hash_bit(pos, c as usize);
        }
    }
    assert_eq!(scratch, game.positional_hash, "incremental positional hash drifted");

    let bs = geo.board_size as i32;
    for &pos in &geo.onboard_pos {
        let mut expect = 0u32;
        for (i, &(dx, dy)) in MD2_OFFSETS.iter().enumerate() {
            let n = (pos as i32 + dx + dy * bs) as usize;
            expect |= (game.board[n] as u32) << (2 * i);
        }
        assert_eq!(
            game.pat.md2(pos),
            expect,
            "incremental MD2 pattern drifted at index {pos}"
        );
    }
}

fn check_stone_accounting(game: &GameState, non_pass_moves: usize) {
    let stones = game
        .geo
        .onboard_pos
        .iter()
        .filter(|&&p| game.board[p] == S_BLACK || game.board[p] == S_WHITE)
        .count();
    let prisoners = game.prisoner[S_BLACK as usize] + game.prisoner[S_WHITE as usize];
    assert_eq!(stones + prisoners, non_pass_moves, "stones plus prisoners must equal placements");
}

fn random_game(seed: u64, moves: usize, size: usize) -> (GameState, usize) {
    let geo = Geometry::new(size);
    let mut game = GameState::new(geo.clone());
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut color = S_BLACK;
    let mut placed = 0;

    for _ in 0..moves {
        let mut tries = 0;
        loop {
            let pos = geo.onboard_pos[rng.usize(..geo.onboard_pos.len())];
            if game.is_legal(pos, color) {
                game.put_stone(pos, color);
                placed += 1;
                break;
            }
            tries += 1;
            if tries > 200 {
                game.put_stone(PASS, color);
                break;
            }
        }
        color = flip_color(color);
    }
    (game, placed)
}

#[test]
fn invariants_hold_over_random_games() {
    for seed in 0..6 {
        let (game, placed) = random_game(seed, 120, 9);
        check_string_invariants(&game);
        check_hash_and_patterns(&game);
        check_stone_accounting(&game, placed);
    }
}

#[test]
fn invariants_hold_on_19x19() {
    let (game, placed) = random_game(99, 260, 19);
    check_string_invariants(&game);
    check_hash_and_patterns(&game);
    check_stone_accounting(&game, placed);
}

#[test]
fn superko_rejects_exactly_recorded_positions() {
    // With super-ko on, a move is rejected if and only if the position after
    // it matches some recorded hash.
    let (mut game, _) = random_game(7, 90, 9);
    game.set_superko(true);
    let geo = game.geo.clone();
    let color = if game.moves % 2 == 1 { S_BLACK } else { S_WHITE };

    let mut probe = GameState::new(geo.clone());
    for &pos in &geo.onboard_pos {
        if game.board[pos] != S_EMPTY {
            continue;
        }
        // Skip moves illegal for other reasons.
        let mut plain = GameState::new(geo.clone());
        plain.copy_from(&game);
        plain.set_superko(false);
        if !plain.is_legal(pos, color) {
            continue;
        }

        probe.copy_from(&game);
        probe.set_superko(false);
        probe.put_stone(pos, color);
        let repeats = game.record[..game.moves].iter().any(|r| r.hash == probe.positional_hash);
        assert_eq!(
            !repeats,
            game.is_legal(pos, color),
            "super-ko decision disagrees with hash replay at {pos}"
        );
    }
}

/// The seven-stone capture: black builds a net around a white dragon, and
/// filling the last liberty takes the whole string off the board at once.
#[test]
fn capture_seven_stone_string() {
    let geo = Geometry::new(9);
    let mut game = GameState::new(geo.clone());
    let mut play = |vertex: &str, color: u8| {
        let pos = gtp_to_pos(vertex, &geo).unwrap();
        assert!(game.is_legal(pos, color), "move {vertex} should be legal");
        game.put_stone(pos, color);
    };

    for (vertex, color) in [
        ("D5", S_BLACK),
        ("E5", S_WHITE),
        ("D6", S_BLACK),
        ("E6", S_WHITE),
        ("D4", S_BLACK),
        ("E7", S_WHITE),
        ("E4", S_BLACK),
        ("F5", S_WHITE),
        ("E3", S_BLACK),
        ("F6", S_WHITE),
        ("F4", S_BLACK),
        ("E8", S_WHITE),
        ("G5", S_BLACK),
        ("D7", S_WHITE),
        ("G6", S_BLACK),
        // White plays away; nothing is captured.
        ("A1", S_WHITE),
        // Black closes the remaining liberties of the white dragon.
        ("C7", S_BLACK),
        ("A2", S_WHITE),
        ("F7", S_BLACK),
        ("B1", S_WHITE),
        ("E9", S_BLACK),
        ("A3", S_WHITE),
        ("F8", S_BLACK),
        ("B2", S_WHITE),
    ] {
        play(vertex, color);
    }
    assert_eq!(game.prisoner[S_BLACK as usize], 0);
    assert_eq!(game.prisoner[S_WHITE as usize], 0);

    // The white string has exactly one liberty left.
    let e5 = gtp_to_pos("E5", &geo).unwrap();
    let id = game.string_id[e5];
    assert_eq!(game.string[id].size, 7);
    assert_eq!(game.string[id].libs, 1);
    assert_eq!(game.string[id].lib_head(), gtp_to_pos("D8", &geo).unwrap());

    let d8 = gtp_to_pos("D8", &geo).unwrap();
    assert!(game.is_legal(d8, S_BLACK));
    game.put_stone(d8, S_BLACK);
    assert_eq!(game.prisoner[S_BLACK as usize], 7);
    assert_eq!(game.board[e5], S_EMPTY);
    check_string_invariants(&game);
    check_hash_and_patterns(&game);
}

#[test]
fn board_display_shows_moves_and_prisoners() {
    let geo = Geometry::new(9);
    let mut game = GameState::new(geo.clone());
    game.put_stone(gtp_to_pos("E5", &geo).unwrap(), S_BLACK);
    let text = format!("{game}");
    assert!(text.contains("Moves: 1"));
    assert!(text.contains('X'));
    assert!(text.contains(" A "));
}
