//! End-to-end engine behavior: policy biases, search properties, nakade and
//! ladder integration.

use std::sync::atomic::Ordering;

use tengen::board::{GameState, Geometry};
use tengen::constants::*;
use tengen::nakade::NakadeTable;
use tengen::point::gtp_to_pos;
use tengen::rating::{self, SimParams};
use tengen::simulation::simulate;
use tengen::uct::{SearchMode, SearchOptions, UctSearcher};
use tengen::uct_rating::UctParams;

fn make_searcher(size: usize, playout: usize, threads: usize) -> UctSearcher {
    let geo = Geometry::new(size);
    let options = SearchOptions {
        threads,
        mode: SearchMode::ConstPlayout,
        playout,
        ..SearchOptions::default()
    };
    UctSearcher::new(geo, 1024, options, SimParams::neutral(), UctParams::neutral()).unwrap()
}

/// The simulation policy must boost the vital point of a freshly enclosed
/// dead shape by orders of magnitude.
#[test]
fn nakade_vital_point_gets_boosted_rate() {
    let geo = Geometry::new(9);
    let nakade = NakadeTable::new(&geo);
    let params = SimParams::neutral();
    let mut game = GameState::new(geo.clone());

    // A bent-three empty region in the corner, walled in by white; the last
    // wall stone is the previous move.
    let a1 = gtp_to_pos("A1", &geo).unwrap();
    let b1 = gtp_to_pos("B1", &geo).unwrap();
    let a2 = gtp_to_pos("A2", &geo).unwrap();
    for vertex in ["C1", "B2", "A3"] {
        game.put_stone(gtp_to_pos(vertex, &geo).unwrap(), S_WHITE);
    }

    // Initialize the rate tables, then run the incremental update that
    // follows the enclosing move.
    for c in 0..2 {
        game.rate[c].iter_mut().for_each(|r| *r = 0);
        game.rate_row_sum[c].iter_mut().for_each(|r| *r = 0);
        game.rate_sum[c] = 0;
    }
    rating::rating(&mut game, S_BLACK, &params, &nakade);
    rating::rating(&mut game, S_WHITE, &params, &nakade);

    let mut rng = fastrand::Rng::with_seed(3);
    let _ = rating::rating_move(&mut game, S_WHITE, &params, &nakade, &mut rng);

    // The vital point of the bent three is the corner point.
    let c = (S_WHITE - 1) as usize;
    let vital_rate = game.rate[c][a1].max(game.rate[c][b1]).max(game.rate[c][a2]);
    let control = gtp_to_pos("E5", &geo).unwrap();
    assert!(
        vital_rate > game.rate[c][control] * 50,
        "vital point rate {vital_rate} should dwarf control {}",
        game.rate[c][control]
    );
}

/// Simulations must never fill a complete own eye.
#[test]
fn playouts_leave_two_eyed_groups_alone() {
    let geo = Geometry::new(9);
    let nakade = NakadeTable::new(&geo);
    let params = SimParams::neutral();

    let mut template = GameState::new(geo.clone());
    // A black corner group with two clean eyes at A1 and C1.
    for vertex in ["A2", "B2", "C2", "D1", "B1", "D2"] {
        template.put_stone(gtp_to_pos(vertex, &geo).unwrap(), S_BLACK);
    }
    let eye1 = gtp_to_pos("A1", &geo).unwrap();
    let eye2 = gtp_to_pos("C1", &geo).unwrap();

    let mut game = GameState::new(geo.clone());
    let mut rng = fastrand::Rng::with_seed(11);
    for _ in 0..5 {
        game.copy_from(&template);
        simulate(&mut game, S_WHITE, &params, &nakade, &mut rng);
        // The group is alive: its stones survive every playout.
        assert_eq!(game.board[gtp_to_pos("B2", &geo).unwrap()], S_BLACK);
        assert!(game.board[eye1] == S_EMPTY || game.board[eye1] == S_BLACK);
        assert!(game.board[eye2] == S_EMPTY || game.board[eye2] == S_BLACK);
    }
}

/// A 19x19 root must not spend its playouts on a hopeless ladder escape.
#[test]
fn root_search_shuns_the_losing_ladder() {
    let searcher = make_searcher(19, 400, 1);
    let geo = searcher.geo.clone();
    let mut game = GameState::new(geo.clone());

    // White stone caught in a working ladder.
    let w = geo.pos(10, 10);
    game.put_stone(w, S_WHITE);
    game.put_stone(geo.west(w), S_BLACK);
    game.put_stone(geo.north(w), S_BLACK);
    game.put_stone(geo.east(geo.south(w)), S_BLACK);
    game.put_stone(geo.east(w), S_BLACK);
    let escape = game.string[game.string_id[w]].lib_head();

    let pos = searcher.genmove(&game, S_WHITE);
    assert_ne!(pos, escape, "the engine ran the dead ladder");
    let rows = searcher.root_analysis(1);
    if let Some(row) = rows.iter().find(|r| r.pos == escape) {
        assert!(
            row.visits <= 1,
            "ladder escape soaked up {} visits",
            row.visits
        );
    }
}

/// Plays a short self-play game through the public search interface.
#[test]
fn short_selfplay_game_stays_legal() {
    let searcher = make_searcher(9, 150, 2);
    let geo = searcher.geo.clone();
    let mut game = GameState::new(geo);
    let mut color = S_BLACK;

    for _ in 0..10 {
        let pos = searcher.genmove(&game, color);
        if pos == RESIGN {
            break;
        }
        if pos != PASS {
            assert!(game.is_legal(pos, color));
        }
        game.put_stone(pos, color);
        color = flip_color(color);
    }
    assert!(game.moves > 1);
}

/// The candidate pruning from cleanup mode must never mark the whole board.
#[test]
fn cleanup_candidates_stay_sane() {
    let searcher = make_searcher(9, 200, 1);
    let geo = searcher.geo.clone();
    let game = GameState::new(geo.clone());
    let pos = searcher.genmove_cleanup(&game, S_BLACK);
    if pos != PASS {
        assert!(game.is_legal(pos, S_BLACK));
    }
    // On an empty board everything is contested.
    let contested = geo
        .onboard_pos
        .iter()
        .filter(|&&p| searcher.candidates[p].load(Ordering::Relaxed))
        .count();
    assert!(contested > 0);
}
