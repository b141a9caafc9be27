//! Playout driver.
//!
//! A simulation rates the whole board once for each color, then alternates
//! policy moves until two consecutive passes or the move-record limit, using
//! the incremental rate updates between moves. Scoring is left to the caller.

use crate::board::GameState;
use crate::constants::*;
use crate::nakade::NakadeTable;
use crate::rating::{self, SimParams};

/// Play out `game` from `starting_color` until the end of the game.
pub fn simulate(
    game: &mut GameState,
    starting_color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    rng: &mut fastrand::Rng,
) {
    let mut color = starting_color;
    let mut pass_count = usize::from(game.moves > 1 && game.previous_move() == PASS);

    let Some(mut length) = game.geo.max_moves.checked_sub(game.moves) else {
        return;
    };

    for c in 0..2 {
        game.rate[c].iter_mut().for_each(|r| *r = 0);
        game.rate_row_sum[c].iter_mut().for_each(|r| *r = 0);
        game.rate_sum[c] = 0;
    }
    rating::rating(game, S_BLACK, params, nakade);
    rating::rating(game, S_WHITE, params, nakade);

    while length > 0 && pass_count < 2 {
        let pos = rating::rating_move(game, color, params, nakade, rng);
        game.put_stone_simulation(pos, color);
        pass_count = if pos == PASS { pass_count + 1 } else { 0 };
        color = flip_color(color);
        length -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    #[test]
    fn playout_terminates_and_fills_board() {
        let geo = Geometry::new(9);
        let nakade = NakadeTable::new(&geo);
        let params = SimParams::neutral();
        let mut game = GameState::new(geo.clone());
        let mut rng = fastrand::Rng::with_seed(42);

        simulate(&mut game, S_BLACK, &params, &nakade, &mut rng);

        // The game ended inside the record limit and left a mostly full board.
        assert!(game.moves < geo.max_records);
        let stones = geo
            .onboard_pos
            .iter()
            .filter(|&&p| game.board[p] != S_EMPTY)
            .count();
        assert!(stones > geo.pure_board_max / 2, "only {stones} stones placed");

        // Scoring runs on the terminal position.
        let score = game.calculate_score();
        assert!(score.abs() <= geo.pure_board_max as i32);
    }

    #[test]
    fn playouts_differ_across_seeds() {
        let geo = Geometry::new(9);
        let nakade = NakadeTable::new(&geo);
        let params = SimParams::neutral();

        let run = |seed: u64| {
            let mut game = GameState::new(geo.clone());
            let mut rng = fastrand::Rng::with_seed(seed);
            simulate(&mut game, S_BLACK, &params, &nakade, &mut rng);
            game.board.clone()
        };
        assert_ne!(run(1), run(2), "distinct seeds should diverge");
    }
}
