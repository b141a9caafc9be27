//! Simulation move policy.
//!
//! Every empty candidate carries a rate: the product of its MD2 pattern
//! gamma, the gammas of its active tactical features, and a distance bonus
//! near the previous move, floored and offset by one. Rates live in the game
//! state together with per-row sums and a grand total, so drawing a move is a
//! uniform integer draw walked first down the rows, then across one row.
//!
//! Tactical features fall in two words whose bits flag mutually exclusive
//! groups (captures/extensions in the first word, ataris/extensions/dame/
//! throw-ins in the second). The gamma product of every possible word value
//! is precomputed at load time, so scoring a point is two table lookups.
//!
//! After a move, only the invalidated rates are recomputed: the twelve
//! points within move distance four, nakade vital points, everything a
//! tactical handler flagged, the MD2 disks of the two preceding moves, and
//! the surroundings of any capture.

use std::path::Path;

use anyhow::Result;

use crate::board::{GameState, eye_tables};
use crate::constants::*;
use crate::nakade::{self, NakadeTable};
use crate::params;
use crate::semeai;

// Tactical feature word 1: saving captures and extensions.
pub const F_SAVE_CAPTURE1_1: u32 = 1 << 0;
pub const F_SAVE_CAPTURE1_2: u32 = 1 << 1;
pub const F_SAVE_CAPTURE1_3: u32 = 1 << 2;
pub const F_SAVE_CAPTURE2_1: u32 = 1 << 3;
pub const F_SAVE_CAPTURE2_2: u32 = 1 << 4;
pub const F_SAVE_CAPTURE2_3: u32 = 1 << 5;
pub const F_SAVE_CAPTURE3_1: u32 = 1 << 6;
pub const F_SAVE_CAPTURE3_2: u32 = 1 << 7;
pub const F_SAVE_CAPTURE3_3: u32 = 1 << 8;
pub const F_SAVE_CAPTURE_SELF_ATARI: u32 = 1 << 9;
pub const F_2POINT_CAPTURE_SMALL: u32 = 1 << 10;
pub const F_2POINT_CAPTURE_LARGE: u32 = 1 << 11;
pub const F_3POINT_CAPTURE_SMALL: u32 = 1 << 12;
pub const F_3POINT_CAPTURE_LARGE: u32 = 1 << 13;
pub const F_CAPTURE: u32 = 1 << 14;
pub const F_CAPTURE_AFTER_KO: u32 = 1 << 15;
pub const F_SAVE_EXTENSION_SAFELY1: u32 = 1 << 16;
pub const F_SAVE_EXTENSION_SAFELY2: u32 = 1 << 17;
pub const F_SAVE_EXTENSION_SAFELY3: u32 = 1 << 18;
pub const F_SAVE_EXTENSION1: u32 = 1 << 19;
pub const F_SAVE_EXTENSION2: u32 = 1 << 20;
pub const F_SAVE_EXTENSION3: u32 = 1 << 21;
pub const FEATURE1_BITS: usize = 22;

// Tactical feature word 2: self-ataris, ataris, extensions, dame, throw-ins.
pub const F_SELF_ATARI_SMALL: u32 = 1 << 0;
pub const F_SELF_ATARI_NAKADE: u32 = 1 << 1;
pub const F_SELF_ATARI_LARGE: u32 = 1 << 2;
pub const F_ATARI: u32 = 1 << 3;
pub const F_2POINT_ATARI_SMALL: u32 = 1 << 4;
pub const F_2POINT_ATARI_LARGE: u32 = 1 << 5;
pub const F_2POINT_C_ATARI_SMALL: u32 = 1 << 6;
pub const F_2POINT_C_ATARI_LARGE: u32 = 1 << 7;
pub const F_3POINT_ATARI_SMALL: u32 = 1 << 8;
pub const F_3POINT_ATARI_LARGE: u32 = 1 << 9;
pub const F_3POINT_C_ATARI_SMALL: u32 = 1 << 10;
pub const F_3POINT_C_ATARI_LARGE: u32 = 1 << 11;
pub const F_3POINT_DAME_SMALL: u32 = 1 << 12;
pub const F_3POINT_DAME_LARGE: u32 = 1 << 13;
pub const F_2POINT_EXTENSION_SAFELY: u32 = 1 << 14;
pub const F_2POINT_EXTENSION: u32 = 1 << 15;
pub const F_3POINT_EXTENSION_SAFELY: u32 = 1 << 16;
pub const F_3POINT_EXTENSION: u32 = 1 << 17;
pub const F_THROW_IN_2: u32 = 1 << 18;
pub const FEATURE2_BITS: usize = 19;

/// Learned gammas for the simulation policy, with the product tables baked.
pub struct SimParams {
    /// Gamma product for every value of tactical word 1.
    set1: Vec<f32>,
    /// Gamma product for every value of tactical word 2.
    set2: Vec<f32>,
    /// Combined MD2 x 3x3 pattern gamma, scaled.
    pattern: Vec<f32>,
    /// Distance-2/3/4 bonus, bias already applied.
    previous_distance: [f64; PREVIOUS_DISTANCE_MAX],
}

impl SimParams {
    /// Neutral weights: every gamma 1.0.
    pub fn neutral() -> SimParams {
        Self::build(
            &[1.0; FEATURE1_BITS + FEATURE2_BITS],
            [1.0; PREVIOUS_DISTANCE_MAX],
            &vec![1.0f64; PAT3_MAX],
            &[],
        )
    }

    /// Load the `sim_params` directory; every file must be present.
    pub fn load(dir: &Path) -> Result<SimParams> {
        let mut tactical = [1.0f64; FEATURE1_BITS + FEATURE2_BITS];
        let read_into = |name: &str, slots: std::ops::Range<usize>| -> Result<Vec<f64>> {
            params::read_floats(&dir.join(name), slots.len())
        };

        let capture = read_into("CaptureFeature.txt", 0..16)?;
        tactical[0..16].copy_from_slice(&capture);
        let save_ext = read_into("SaveExtensionFeature.txt", 16..22)?;
        tactical[16..22].copy_from_slice(&save_ext);
        let atari = read_into("AtariFeature.txt", 0..12)?;
        tactical[FEATURE1_BITS..FEATURE1_BITS + 12].copy_from_slice(&atari);
        let dame = read_into("DameFeature.txt", 0..2)?;
        tactical[FEATURE1_BITS + 12..FEATURE1_BITS + 14].copy_from_slice(&dame);
        let ext = read_into("ExtensionFeature.txt", 0..4)?;
        tactical[FEATURE1_BITS + 14..FEATURE1_BITS + 18].copy_from_slice(&ext);
        let throw_in = read_into("ThrowInFeature.txt", 0..1)?;
        tactical[FEATURE1_BITS + 18] = throw_in[0];

        let distance = params::read_floats(&dir.join("PreviousDistance.txt"), 3)?;
        let pat3 = params::read_floats(&dir.join("Pat3.txt"), PAT3_MAX)?;
        let md2 = params::read_indexed_floats(&dir.join("MD2.txt"))?;

        Ok(Self::build(
            &tactical,
            [distance[0], distance[1], distance[2]],
            &pat3,
            &md2,
        ))
    }

    fn build(
        tactical: &[f64; FEATURE1_BITS + FEATURE2_BITS],
        raw_distance: [f64; PREVIOUS_DISTANCE_MAX],
        pat3: &[f64],
        md2_sparse: &[(usize, f64)],
    ) -> SimParams {
        let gamma2 = |mask: u32| tactical[FEATURE1_BITS + mask.trailing_zeros() as usize];

        // Word 1: within each group only the strongest active feature counts.
        let mut set1 = vec![0f32; 1 << FEATURE1_BITS];
        const CAPTURE_CHAIN: [u32; 16] = [
            F_SAVE_CAPTURE3_3,
            F_SAVE_CAPTURE3_2,
            F_SAVE_CAPTURE3_1,
            F_SAVE_CAPTURE2_3,
            F_SAVE_CAPTURE2_2,
            F_SAVE_CAPTURE2_1,
            F_SAVE_CAPTURE1_3,
            F_SAVE_CAPTURE1_2,
            F_SAVE_CAPTURE1_1,
            F_SAVE_CAPTURE_SELF_ATARI,
            F_CAPTURE_AFTER_KO,
            F_2POINT_CAPTURE_LARGE,
            F_3POINT_CAPTURE_LARGE,
            F_2POINT_CAPTURE_SMALL,
            F_3POINT_CAPTURE_SMALL,
            F_CAPTURE,
        ];
        const EXTENSION_CHAIN: [u32; 6] = [
            F_SAVE_EXTENSION_SAFELY3,
            F_SAVE_EXTENSION_SAFELY2,
            F_SAVE_EXTENSION_SAFELY1,
            F_SAVE_EXTENSION3,
            F_SAVE_EXTENSION2,
            F_SAVE_EXTENSION1,
        ];
        for (word, slot) in set1.iter_mut().enumerate() {
            let word = word as u32;
            let mut rate = 1.0f64;
            if let Some(&m) = CAPTURE_CHAIN.iter().find(|&&m| word & m != 0) {
                rate *= tactical[m.trailing_zeros() as usize];
            }
            if let Some(&m) = EXTENSION_CHAIN.iter().find(|&&m| word & m != 0) {
                rate *= tactical[m.trailing_zeros() as usize];
            }
            *slot = rate as f32;
        }

        let mut set2 = vec![0f32; 1 << FEATURE2_BITS];
        const SELF_ATARI_CHAIN: [u32; 3] =
            [F_SELF_ATARI_SMALL, F_SELF_ATARI_NAKADE, F_SELF_ATARI_LARGE];
        const ATARI_CHAIN: [u32; 9] = [
            F_2POINT_C_ATARI_LARGE,
            F_3POINT_C_ATARI_LARGE,
            F_2POINT_C_ATARI_SMALL,
            F_3POINT_C_ATARI_SMALL,
            F_2POINT_ATARI_LARGE,
            F_3POINT_ATARI_LARGE,
            F_2POINT_ATARI_SMALL,
            F_3POINT_ATARI_SMALL,
            F_ATARI,
        ];
        const EXTENSION2_CHAIN: [u32; 4] = [
            F_2POINT_EXTENSION_SAFELY,
            F_3POINT_EXTENSION_SAFELY,
            F_2POINT_EXTENSION,
            F_3POINT_EXTENSION,
        ];
        const DAME_CHAIN: [u32; 2] = [F_3POINT_DAME_LARGE, F_3POINT_DAME_SMALL];
        for (word, slot) in set2.iter_mut().enumerate() {
            let word = word as u32;
            let mut rate = 1.0f64;
            for chain in [
                &SELF_ATARI_CHAIN[..],
                &ATARI_CHAIN[..],
                &EXTENSION2_CHAIN[..],
                &DAME_CHAIN[..],
            ] {
                if let Some(&m) = chain.iter().find(|&&m| word & m != 0) {
                    rate *= gamma2(m);
                }
            }
            if word & F_THROW_IN_2 != 0 {
                rate *= gamma2(F_THROW_IN_2);
            }
            *slot = rate as f32;
        }

        // Fold the sparse MD2 gammas over the 3x3 gammas.
        let mut pattern = vec![0f32; MD2_MAX];
        for (code, slot) in pattern.iter_mut().enumerate() {
            *slot = (pat3[code & 0xFFFF] * 100.0) as f32;
        }
        for &(code, gamma) in md2_sparse {
            if code < MD2_MAX {
                pattern[code] = (gamma * pat3[code & 0xFFFF] * 100.0) as f32;
            }
        }

        SimParams {
            set1,
            set2,
            pattern,
            previous_distance: [
                raw_distance[0] * NEIGHBOR_BIAS,
                raw_distance[1] * NEIGHBOR_BIAS,
                raw_distance[2] * JUMP_BIAS,
            ],
        }
    }

    #[inline]
    fn gamma(&self, game: &GameState, pos: Pos) -> f64 {
        self.pattern[game.pat.md2(pos) as usize] as f64
            * self.set1[game.tactical_features1[pos] as usize] as f64
            * self.set2[game.tactical_features2[pos] as usize] as f64
    }
}

// =============================================================================
// Move selection
// =============================================================================

/// Draw the next simulation move for `color`, updating only the rates the
/// previous move invalidated. Returns `PASS` when no rated point remains.
pub fn rating_move(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    rng: &mut fastrand::Rng,
) -> Pos {
    partial_rating(game, color, params, nakade);

    let c = (color - 1) as usize;
    let geo = game.geo.clone();
    loop {
        if game.rate_sum[c] == 0 {
            return PASS;
        }
        let mut rand_num = (rng.u64(..) % game.rate_sum[c] as u64) as i64 + 1;

        let mut y = geo.board_start;
        while rand_num > game.rate_row_sum[c][y] {
            rand_num -= game.rate_row_sum[c][y];
            y += 1;
        }
        let mut pos = geo.pos(geo.board_start, y);
        loop {
            rand_num -= game.rate[c][pos];
            if rand_num <= 0 {
                break;
            }
            pos += 1;
        }

        if game.is_legal_not_eye(pos, color) {
            return pos;
        }
        // Stale rate: zero it and redraw.
        game.rate_sum[c] -= game.rate[c][pos];
        game.rate_row_sum[c][y] -= game.rate[c][pos];
        game.rate[c][pos] = 0;
    }
}

/// Rate the whole board for `color` from scratch. Assumes the rate arrays
/// were zeroed by the caller.
pub fn rating(game: &mut GameState, color: u8, params: &SimParams, nakade: &NakadeTable) {
    let geo = game.geo.clone();
    let c = (color - 1) as usize;
    let pm1 = game.previous_move();

    check_features(game, color);
    if game.ko_move != 0 && game.ko_move == game.moves - 2 {
        check_capture_after_ko(game, color);
    }

    for i in 0..geo.pure_board_max {
        let pos = geo.onboard_pos[i];
        if !game.candidates[pos] || !game.is_legal_not_eye(pos, color) {
            continue;
        }
        let playable = check_self_atari(game, color, pos, nakade);
        check_capture_and_atari(game, color, pos);

        let rate = if !playable {
            0
        } else {
            let mut gamma = params.gamma(game, pos);
            if pm1 != PASS {
                let dis = geo.move_distance(pos, pm1);
                if dis < 5 {
                    gamma *= params.previous_distance[dis - 2];
                }
            }
            gamma as i64 + 1
        };

        game.rate[c][pos] = rate;
        game.rate_sum[c] += rate;
        game.rate_row_sum[c][geo.y(pos)] += rate;

        game.tactical_features1[pos] = 0;
        game.tactical_features2[pos] = 0;
    }
}

/// Recompute the rates the previous moves invalidated.
pub fn partial_rating(game: &mut GameState, color: u8, params: &SimParams, nakade: &NakadeTable) {
    let geo = game.geo.clone();
    let other = flip_color(color) as usize;
    let mut flag = vec![false; geo.board_max];

    let prev_feature_pos = std::mem::take(&mut game.update_pos[color as usize]);

    let pm1 = game.previous_move();
    let pm2 = game.previous_move2();
    let pm3 = if game.moves > 3 { game.record[game.moves - 3].pos } else { PASS };

    if game.ko_move != 0 && game.ko_move == game.moves - 2 {
        check_capture_after_ko(game, color);
    }

    if pm1 != PASS {
        check_features(game, color);
        check_remove2_stones(game, color);

        let vitals = nakade::search_nakade(nakade, game);
        nakade_update(game, color, params, nakade, &vitals, &mut flag, pm1);

        let bs = geo.board_size as isize;
        let at = |d: isize| (pm1 as isize + d) as Pos;
        let distance2 = [at(-bs), at(-1), at(1), at(bs)];
        let distance3 = [at(-bs - 1), at(-bs + 1), at(bs - 1), at(bs + 1)];
        let distance4 = [at(-2 * bs), at(-2), at(2), at(2 * bs)];
        neighbor_update(game, color, params, nakade, &distance2, &mut flag, 0);
        neighbor_update(game, color, params, nakade, &distance3, &mut flag, 1);
        neighbor_update(game, color, params, nakade, &distance4, &mut flag, 2);
    }

    if pm2 != PASS {
        neighbor12_update(game, color, params, nakade, &[pm2], &mut flag);
    }
    if pm3 != PASS {
        neighbor12_update(game, color, params, nakade, &[pm3], &mut flag);
    }

    other_update(game, color, params, nakade, &prev_feature_pos, &mut flag);
    let own_updates = game.update_pos[color as usize].clone();
    other_update(game, color, params, nakade, &own_updates, &mut flag);
    let other_updates = game.update_pos[other].clone();
    other_update(game, color, params, nakade, &other_updates, &mut flag);

    let own_captures = game.capture_pos[color as usize].clone();
    neighbor12_update(game, color, params, nakade, &own_captures, &mut flag);
    let other_captures = game.capture_pos[other].clone();
    neighbor12_update(game, color, params, nakade, &other_captures, &mut flag);
}

/// Shared tail of the update helpers: clear the old rate, recompute the
/// gamma (zero for a vetoed self-atari), and post the new rate.
fn refresh_rate(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    pos: Pos,
    bonus: f64,
) {
    let c = (color - 1) as usize;
    let row = game.geo.y(pos);
    let playable = check_self_atari(game, color, pos, nakade);

    game.rate_sum[c] -= game.rate[c][pos];
    game.rate_row_sum[c][row] -= game.rate[c][pos];

    if !playable {
        game.rate[c][pos] = 0;
    } else {
        check_capture_and_atari(game, color, pos);
        let rate = (params.gamma(game, pos) * bonus) as i64 + 1;
        game.rate[c][pos] = rate;
        game.rate_sum[c] += rate;
        game.rate_row_sum[c][row] += rate;
    }

    game.tactical_features1[pos] = 0;
    game.tactical_features2[pos] = 0;
}

/// Refresh the four points at one move distance from the previous move,
/// applying the matching distance bonus. `index` 1 (the keima points) gets a
/// large extra bias near the board edge.
fn neighbor_update(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    update: &[Pos; 4],
    flag: &mut [bool],
    index: usize,
) {
    let geo = game.geo.clone();
    let mut bias = [1.0f64; 4];

    if index == 1 {
        let pm = game.record[game.moves - 1].pos;
        let on_edge_keima = |p: Pos| {
            (geo.border_dis_x[p] == 1 && geo.border_dis_y[p] == 2)
                || (geo.border_dis_x[p] == 2 && geo.border_dis_y[p] == 1)
        };
        if on_edge_keima(pm) {
            for (i, &pos) in update.iter().enumerate() {
                if on_edge_keima(pos) {
                    bias[i] = 1000.0;
                    break;
                }
            }
        }
    }

    for (i, &pos) in update.iter().enumerate() {
        if game.candidates[pos] {
            if flag[pos] && bias[i] == 1.0 {
                continue;
            }
            refresh_rate(game, color, params, nakade, pos, params.previous_distance[index] * bias[i]);
        }
        flag[pos] = true;
    }
}

/// Refresh nakade vital points with their large fixed gamma.
fn nakade_update(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    vitals: &[Pos],
    flag: &mut [bool],
    pm1: Pos,
) {
    let geo = game.geo.clone();
    for &pos in vitals {
        if !game.candidates[pos] {
            continue;
        }
        let dis = geo.move_distance(pm1, pos);
        let bonus = if dis < 5 {
            NAKADE_GAMMA * params.previous_distance[dis - 2]
        } else {
            NAKADE_GAMMA
        };
        // The nakade bonus replaces the pattern product's distance term.
        let c = (color - 1) as usize;
        let row = geo.y(pos);
        let playable = check_self_atari(game, color, pos, nakade);
        game.rate_sum[c] -= game.rate[c][pos];
        game.rate_row_sum[c][row] -= game.rate[c][pos];
        if !playable {
            game.rate[c][pos] = 0;
        } else {
            check_capture_and_atari(game, color, pos);
            let gamma = bonus
                * params.pattern[game.pat.md2(pos) as usize] as f64
                * params.set1[game.tactical_features1[pos] as usize] as f64
                * params.set2[game.tactical_features2[pos] as usize] as f64;
            let rate = gamma as i64 + 1;
            game.rate[c][pos] = rate;
            game.rate_sum[c] += rate;
            game.rate_row_sum[c][row] += rate;
        }
        game.tactical_features1[pos] = 0;
        game.tactical_features2[pos] = 0;
        flag[pos] = true;
    }
}

/// Refresh a flat list of touched points, no distance bonus.
fn other_update(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    update: &[Pos],
    flag: &mut [bool],
) {
    for &pos in update {
        if flag[pos] {
            continue;
        }
        if game.candidates[pos] {
            refresh_rate(game, color, params, nakade, pos, 1.0);
        }
        flag[pos] = true;
    }
}

/// Refresh the full MD2 disk around each listed point.
fn neighbor12_update(
    game: &mut GameState,
    color: u8,
    params: &SimParams,
    nakade: &NakadeTable,
    update: &[Pos],
    flag: &mut [bool],
) {
    let reach = game.geo.md2_reach;
    for &center in update {
        for d in reach {
            let pos = (center as isize + d) as Pos;
            if flag[pos] {
                continue;
            }
            if game.candidates[pos] {
                refresh_rate(game, color, params, nakade, pos, 1.0);
            }
            flag[pos] = true;
        }
    }
}

// =============================================================================
// Tactical feature detection
// =============================================================================

/// Flag features created by the previous move on the friendly strings it
/// touched, classified by their remaining liberties.
fn check_features(game: &mut GameState, color: u8) {
    if game.moves < 2 {
        return;
    }
    let previous_move = game.record[game.moves - 1].pos;
    if previous_move == PASS {
        return;
    }
    let geo = game.geo.clone();
    let mut checked: Vec<usize> = Vec::with_capacity(4);
    for n in geo.neighbor4(previous_move) {
        if game.board[n] != color {
            continue;
        }
        let id = game.string_id[n];
        if checked.contains(&id) {
            continue;
        }
        match game.string[id].libs {
            1 => check_features_lib1(game, color, id),
            2 => check_features_lib2(game, color, id),
            3 => check_features_lib3(game, color, id),
            _ => {}
        }
        checked.push(id);
    }
}

fn check_features_lib1(game: &mut GameState, color: u8, id: usize) {
    let geo = game.geo.clone();
    let other = flip_color(color);
    let lib = game.string[id].lib_head();
    let size = game.string[id].size;

    let contact = geo.neighbor4(lib).iter().any(|&n| game.board[n] == other);
    let extension = match (contact, size) {
        (true, 1) => F_SAVE_EXTENSION1,
        (true, 2) => F_SAVE_EXTENSION2,
        (true, _) => F_SAVE_EXTENSION3,
        (false, 1) => F_SAVE_EXTENSION_SAFELY1,
        (false, 2) => F_SAVE_EXTENSION_SAFELY2,
        (false, _) => F_SAVE_EXTENSION_SAFELY3,
    };
    game.tactical_features1[lib] |= extension;
    game.update_pos[color as usize].push(lib);

    // Rescue by capturing an adjacent string in atari.
    let neighbors: Vec<(usize, Pos, usize)> = game.string[id]
        .neighbor_ids(geo.neighbor_end)
        .filter(|&nid| game.string[nid].libs == 1)
        .map(|nid| (nid, game.string[nid].lib_head(), game.string[nid].size))
        .collect();
    for (_, nlib, nsize) in neighbors {
        let feature = match (size, nsize) {
            (1, 1) => F_SAVE_CAPTURE1_1,
            (1, 2) => F_SAVE_CAPTURE1_2,
            (1, _) => F_SAVE_CAPTURE1_3,
            (_, 1) => {
                if semeai::is_self_atari_capture_for_simulation(game, nlib, color, lib) {
                    F_SAVE_CAPTURE_SELF_ATARI
                } else if size == 2 {
                    F_SAVE_CAPTURE2_1
                } else {
                    F_SAVE_CAPTURE3_1
                }
            }
            (2, 2) => F_SAVE_CAPTURE2_2,
            (2, _) => F_SAVE_CAPTURE2_3,
            (_, 2) => F_SAVE_CAPTURE3_2,
            (_, _) => F_SAVE_CAPTURE3_3,
        };
        game.tactical_features1[nlib] |= feature;
        game.update_pos[color as usize].push(nlib);
    }
}

/// Can the liberty connect out: three empty sides, or a friendly string
/// (other than `id`) with three or more liberties?
fn can_extend_safely(game: &GameState, color: u8, id: usize, lib: Pos) -> bool {
    let tables = eye_tables();
    if tables.nb4_empty[game.pat.pat3(lib) as usize] == 3 {
        return true;
    }
    game.geo.neighbor4(lib).iter().any(|&n| {
        game.board[n] == color
            && game.string_id[n] != id
            && game.string[game.string_id[n]].libs >= 3
    })
}

fn check_features_lib2(game: &mut GameState, color: u8, id: usize) {
    let geo = game.geo.clone();
    let lib1 = game.string[id].lib_head();
    let lib2 = game.string[id].next_lib(lib1);

    for lib in [lib1, lib2] {
        let feature = if can_extend_safely(game, color, id, lib) {
            F_2POINT_EXTENSION_SAFELY
        } else {
            F_2POINT_EXTENSION
        };
        game.tactical_features2[lib] |= feature;
        game.update_pos[color as usize].push(lib);
    }

    let neighbors: Vec<usize> = game.string[id].neighbor_ids(geo.neighbor_end).collect();
    for nid in neighbors {
        let small = game.string[nid].size <= 2;
        match game.string[nid].libs {
            1 => {
                let nlib = game.string[nid].lib_head();
                game.tactical_features1[nlib] |=
                    if small { F_2POINT_CAPTURE_SMALL } else { F_2POINT_CAPTURE_LARGE };
                game.update_pos[color as usize].push(nlib);
            }
            2 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                for nlib in [nlib1, nlib2] {
                    let capturable =
                        semeai::is_capturable_atari_for_simulation(game, nlib, color, nid);
                    let feature = match (capturable, small) {
                        (true, true) => F_2POINT_C_ATARI_SMALL,
                        (true, false) => F_2POINT_C_ATARI_LARGE,
                        (false, true) => F_2POINT_ATARI_SMALL,
                        (false, false) => F_2POINT_ATARI_LARGE,
                    };
                    game.tactical_features2[nlib] |= feature;
                    game.update_pos[color as usize].push(nlib);
                }
            }
            _ => {}
        }
    }
}

fn check_features_lib3(game: &mut GameState, color: u8, id: usize) {
    let geo = game.geo.clone();
    let lib1 = game.string[id].lib_head();
    let lib2 = game.string[id].next_lib(lib1);
    let lib3 = game.string[id].next_lib(lib2);

    for lib in [lib1, lib2, lib3] {
        let feature = if can_extend_safely(game, color, id, lib) {
            F_3POINT_EXTENSION_SAFELY
        } else {
            F_3POINT_EXTENSION
        };
        game.tactical_features2[lib] |= feature;
        game.update_pos[color as usize].push(lib);
    }

    let neighbors: Vec<usize> = game.string[id].neighbor_ids(geo.neighbor_end).collect();
    for nid in neighbors {
        let small = game.string[nid].size <= 2;
        match game.string[nid].libs {
            1 => {
                let nlib = game.string[nid].lib_head();
                game.tactical_features1[nlib] |=
                    if small { F_3POINT_CAPTURE_SMALL } else { F_3POINT_CAPTURE_LARGE };
                game.update_pos[color as usize].push(nlib);
            }
            2 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                for nlib in [nlib1, nlib2] {
                    let capturable =
                        semeai::is_capturable_atari_for_simulation(game, nlib, color, nid);
                    let feature = match (capturable, small) {
                        (true, true) => F_3POINT_C_ATARI_SMALL,
                        (true, false) => F_3POINT_C_ATARI_LARGE,
                        (false, true) => F_3POINT_ATARI_SMALL,
                        (false, false) => F_3POINT_ATARI_LARGE,
                    };
                    game.tactical_features2[nlib] |= feature;
                    game.update_pos[color as usize].push(nlib);
                }
            }
            3 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                let nlib3 = game.string[nid].next_lib(nlib2);
                let feature = if small { F_3POINT_DAME_SMALL } else { F_3POINT_DAME_LARGE };
                for nlib in [nlib1, nlib2, nlib3] {
                    game.tactical_features2[nlib] |= feature;
                    game.update_pos[color as usize].push(nlib);
                }
            }
            _ => {}
        }
    }
}

/// A capture resolving the ko the move before last.
fn check_capture_after_ko(game: &mut GameState, color: u8) {
    if game.moves < 3 {
        return;
    }
    let pm2 = game.record[game.moves - 2].pos;
    if pm2 == PASS {
        return;
    }
    let geo = game.geo.clone();
    let other = flip_color(color);
    let mut checked: Vec<usize> = Vec::with_capacity(4);
    for n in geo.neighbor4(pm2) {
        if game.board[n] != other {
            continue;
        }
        let id = game.string_id[n];
        if checked.contains(&id) {
            continue;
        }
        checked.push(id);
        if game.string[id].libs == 1 {
            let lib = game.string[id].lib_head();
            game.tactical_features1[lib] |= F_CAPTURE_AFTER_KO;
            game.update_pos[color as usize].push(lib);
        }
    }
}

/// Self-atari test with feature flagging. Returns whether the point stays
/// playable: small sacrifices always, medium ones only as nakade.
fn check_self_atari(game: &mut GameState, color: u8, pos: Pos, nakade: &NakadeTable) -> bool {
    let geo = game.geo.clone();
    let other = flip_color(color);
    let mut libs: Vec<Pos> = Vec::with_capacity(10);
    let mut merged: Vec<usize> = Vec::with_capacity(4);
    let mut size = 0;

    for n in geo.neighbor4(pos) {
        if game.board[n] == S_EMPTY && !libs.contains(&n) {
            libs.push(n);
        }
    }
    if libs.len() >= 2 {
        return true;
    }

    for n in geo.neighbor4(pos) {
        if game.board[n] == color {
            let id = game.string_id[n];
            if merged.contains(&id) {
                continue;
            }
            if game.string[id].libs > 2 {
                return true;
            }
            for lib in game.string[id].liberties(geo.liberty_end) {
                if lib != pos && !libs.contains(&lib) {
                    libs.push(lib);
                }
            }
            size += game.string[id].size;
            merged.push(id);
            if libs.len() >= 2 {
                return true;
            }
        } else if game.board[n] == other && game.string[game.string_id[n]].libs == 1 {
            return true;
        }
    }

    if size < 2 {
        game.tactical_features2[pos] |= F_SELF_ATARI_SMALL;
        true
    } else if size < 5 {
        if nakade::is_nakade_self_atari(nakade, game, pos, color) {
            game.tactical_features2[pos] |= F_SELF_ATARI_NAKADE;
            true
        } else {
            game.tactical_features2[pos] |= F_SELF_ATARI_LARGE;
            false
        }
    } else {
        game.tactical_features2[pos] |= F_SELF_ATARI_LARGE;
        false
    }
}

/// Capture and atari flags against adjacent enemy strings.
fn check_capture_and_atari(game: &mut GameState, color: u8, pos: Pos) {
    let geo = game.geo.clone();
    let other = flip_color(color);
    for n in geo.neighbor4(pos) {
        if game.board[n] != other {
            continue;
        }
        match game.string[game.string_id[n]].libs {
            1 => game.tactical_features1[pos] |= F_CAPTURE,
            2 => game.tactical_features2[pos] |= F_ATARI,
            _ => {}
        }
    }
}

/// Throw-in after the opponent captured exactly two adjacent stones.
fn check_remove2_stones(game: &mut GameState, color: u8) {
    let other = flip_color(color) as usize;
    if game.capture_pos[other].len() != 2 {
        return;
    }
    let rm1 = game.capture_pos[other][0];
    let rm2 = game.capture_pos[other][1];
    let bs = game.geo.board_size;
    let d = rm1.abs_diff(rm2);
    if d != 1 && d != bs {
        return;
    }
    let cross = game.geo.cross;
    for rm in [rm1, rm2] {
        let support = cross
            .iter()
            .filter(|&&c| (game.board[(rm as isize + c) as usize] & color) == color)
            .count();
        if support >= 2 {
            game.tactical_features2[rm] |= F_THROW_IN_2;
            game.update_pos[color as usize].push(rm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    fn setup() -> (GameState, SimParams, NakadeTable) {
        let geo = Geometry::new(9);
        let nakade = NakadeTable::new(&geo);
        (GameState::new(geo), SimParams::neutral(), nakade)
    }

    fn zero_rates(game: &mut GameState) {
        for c in 0..2 {
            game.rate[c].iter_mut().for_each(|r| *r = 0);
            game.rate_row_sum[c].iter_mut().for_each(|r| *r = 0);
            game.rate_sum[c] = 0;
        }
    }

    #[test]
    fn rates_are_consistent_with_row_sums() {
        let (mut game, params, nakade) = setup();
        let geo = game.geo.clone();
        game.put_stone(geo.pos(9, 9), S_BLACK);
        zero_rates(&mut game);
        rating(&mut game, S_WHITE, &params, &nakade);

        let c = (S_WHITE - 1) as usize;
        let total: i64 = game.rate[c].iter().sum();
        let row_total: i64 = game.rate_row_sum[c].iter().sum();
        assert_eq!(total, game.rate_sum[c]);
        assert_eq!(row_total, game.rate_sum[c]);
        assert!(total > 0);
    }

    #[test]
    fn sampler_matches_rates() {
        let (mut game, params, nakade) = setup();
        let geo = game.geo.clone();
        game.put_stone(geo.pos(9, 9), S_BLACK);

        zero_rates(&mut game);
        rating(&mut game, S_WHITE, &params, &nakade);
        rating(&mut game, S_BLACK, &params, &nakade);

        // With fixed rates, the sampler's empirical distribution follows
        // rate/total. Compare two draw counts against expectation loosely.
        let c = (S_WHITE - 1) as usize;
        let total = game.rate_sum[c];
        let probe = geo.pos(8, 9);
        let expect = game.rate[c][probe] as f64 / total as f64;

        let mut rng = fastrand::Rng::with_seed(7);
        let trials = 20_000;
        let mut hits = 0;
        let mut copy = GameState::new(geo.clone());
        for _ in 0..trials {
            copy.copy_from(&game);
            zero_rates(&mut copy);
            rating(&mut copy, S_WHITE, &params, &nakade);
            rating(&mut copy, S_BLACK, &params, &nakade);
            let pos = rating_move(&mut copy, S_WHITE, &params, &nakade, &mut rng);
            if pos == probe {
                hits += 1;
            }
        }
        let freq = hits as f64 / trials as f64;
        assert!(
            (freq - expect).abs() < 0.01,
            "sampled {freq:.4}, expected {expect:.4}"
        );
    }

    #[test]
    fn capture_feature_boosts_capturing_point() {
        let (mut game, params, nakade) = setup();
        let geo = game.geo.clone();
        // White stone in atari; black just played next to it.
        let w = geo.pos(9, 9);
        game.put_stone(w, S_WHITE);
        game.put_stone(geo.west(w), S_BLACK);
        game.put_stone(geo.north(w), S_BLACK);
        game.put_stone(geo.south(w), S_BLACK);

        let capture_point = geo.east(w);
        let mut probe = GameState::new(geo.clone());
        probe.copy_from(&game);
        check_capture_and_atari(&mut probe, S_BLACK, capture_point);
        assert_ne!(probe.tactical_features1[capture_point] & F_CAPTURE, 0);
    }

    #[test]
    fn save_extension_feature_fires_for_ataried_string() {
        let (mut game, _params, _nakade) = setup();
        let geo = game.geo.clone();
        // Black stone atari'd by white's last move; black to answer.
        let b = geo.pos(9, 9);
        game.put_stone(b, S_BLACK);
        game.put_stone(geo.west(b), S_WHITE);
        game.put_stone(geo.north(b), S_WHITE);
        game.put_stone(geo.south(b), S_WHITE);

        check_features(&mut game, S_BLACK);
        let escape = geo.east(b);
        assert_ne!(
            game.tactical_features1[escape]
                & (F_SAVE_EXTENSION1 | F_SAVE_EXTENSION_SAFELY1),
            0
        );
        assert!(game.update_pos[S_BLACK as usize].contains(&escape));
    }

    #[test]
    fn large_self_atari_is_vetoed() {
        let (mut game, _params, nakade) = setup();
        let geo = game.geo.clone();
        // A six-stone black string in atari; filling its last liberty from
        // the inside would be a large pointless sacrifice.
        for i in 0..6 {
            game.put_stone(geo.pos(5 + i, 5), S_BLACK);
        }
        for i in 0..6 {
            game.put_stone(geo.pos(5 + i, 6), S_WHITE);
        }
        for i in 0..7 {
            if game.board[geo.pos(5 + i, 4)] == S_EMPTY {
                game.put_stone(geo.pos(5 + i, 4), S_WHITE);
            }
        }
        let last = geo.pos(11, 5);
        assert_eq!(game.string[game.string_id[geo.pos(5, 5)]].libs, 1);
        assert!(!check_self_atari(&mut game, S_BLACK, last, &nakade));
        assert_ne!(game.tactical_features2[last] & F_SELF_ATARI_LARGE, 0);
    }
}
