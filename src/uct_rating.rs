//! Move priors for node expansion.
//!
//! Each candidate's prior is a factorization-machines score: a global bias,
//! the scalar weights of every active feature, and the pairwise dot products
//! of their latent vectors. Features are the tactical flags below, the
//! board-position orbit ID, the distances to the two previous moves, pass
//! context, and the most specific pattern available (MD5 down to 3x3).
//!
//! Unlike the simulation policy this model may consult the slow search-based
//! tests (snapback, oiotoshi, capturable atari): node expansion is rare.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::board::GameState;
use crate::constants::*;
use crate::nakade::{self, NakadeTable};
use crate::params::{self, LatentFactor};
use crate::pattern;
use crate::pattern_hash::{self, LargePatternIndex};
use crate::semeai::{self, LibertyState};

// Tactical features, one bit each in a single 64-bit word.
pub const UCT_SAVE_CAPTURE_1_1: usize = 0;
pub const UCT_SAVE_CAPTURE_1_2: usize = 1;
pub const UCT_SAVE_CAPTURE_1_3: usize = 2;
pub const UCT_SAVE_CAPTURE_2_1: usize = 3;
pub const UCT_SAVE_CAPTURE_2_2: usize = 4;
pub const UCT_SAVE_CAPTURE_2_3: usize = 5;
pub const UCT_SAVE_CAPTURE_3_1: usize = 6;
pub const UCT_SAVE_CAPTURE_3_2: usize = 7;
pub const UCT_SAVE_CAPTURE_3_3: usize = 8;
pub const UCT_SAVE_CAPTURE_SELF_ATARI: usize = 9;
pub const UCT_CAPTURE: usize = 10;
pub const UCT_CAPTURE_AFTER_KO: usize = 11;
pub const UCT_SEMEAI_CAPTURE: usize = 12;
pub const UCT_SELF_ATARI_SMALL: usize = 13;
pub const UCT_SELF_ATARI_NAKADE: usize = 14;
pub const UCT_SELF_ATARI_LARGE: usize = 15;
pub const UCT_SAVE_EXTENSION_1: usize = 16;
pub const UCT_SAVE_EXTENSION_2: usize = 17;
pub const UCT_SAVE_EXTENSION_3: usize = 18;
pub const UCT_LADDER_EXTENSION: usize = 19;
pub const UCT_ATARI: usize = 20;
pub const UCT_CAPTURABLE_ATARI: usize = 21;
pub const UCT_OIOTOSHI: usize = 22;
pub const UCT_SNAPBACK: usize = 23;
pub const UCT_2POINT_CAPTURE_S_S: usize = 24;
pub const UCT_2POINT_CAPTURE_S_L: usize = 25;
pub const UCT_2POINT_CAPTURE_L_S: usize = 26;
pub const UCT_2POINT_CAPTURE_L_L: usize = 27;
pub const UCT_3POINT_CAPTURE_S_S: usize = 28;
pub const UCT_3POINT_CAPTURE_S_L: usize = 29;
pub const UCT_3POINT_CAPTURE_L_S: usize = 30;
pub const UCT_3POINT_CAPTURE_L_L: usize = 31;
pub const UCT_2POINT_ATARI_S_S: usize = 32;
pub const UCT_2POINT_ATARI_S_L: usize = 33;
pub const UCT_2POINT_ATARI_L_S: usize = 34;
pub const UCT_2POINT_ATARI_L_L: usize = 35;
pub const UCT_2POINT_C_ATARI_S_S: usize = 36;
pub const UCT_2POINT_C_ATARI_S_L: usize = 37;
pub const UCT_2POINT_C_ATARI_L_S: usize = 38;
pub const UCT_2POINT_C_ATARI_L_L: usize = 39;
pub const UCT_3POINT_ATARI_S_S: usize = 40;
pub const UCT_3POINT_ATARI_S_L: usize = 41;
pub const UCT_3POINT_ATARI_L_S: usize = 42;
pub const UCT_3POINT_ATARI_L_L: usize = 43;
pub const UCT_3POINT_C_ATARI_S_S: usize = 44;
pub const UCT_3POINT_C_ATARI_S_L: usize = 45;
pub const UCT_3POINT_C_ATARI_L_S: usize = 46;
pub const UCT_3POINT_C_ATARI_L_L: usize = 47;
pub const UCT_3POINT_DAME_S_S: usize = 48;
pub const UCT_3POINT_DAME_S_L: usize = 49;
pub const UCT_3POINT_DAME_L_S: usize = 50;
pub const UCT_3POINT_DAME_L_L: usize = 51;
pub const UCT_2POINT_EXTENSION_DECREASE: usize = 52;
pub const UCT_2POINT_EXTENSION_EVEN: usize = 53;
pub const UCT_2POINT_EXTENSION_INCREASE: usize = 54;
pub const UCT_3POINT_EXTENSION_DECREASE: usize = 55;
pub const UCT_3POINT_EXTENSION_EVEN: usize = 56;
pub const UCT_3POINT_EXTENSION_INCREASE: usize = 57;
pub const UCT_THROW_IN_2: usize = 58;
pub const UCT_NAKADE_3: usize = 59;
pub const UCT_KEIMA_TSUKEKOSHI: usize = 60;
pub const UCT_DOUBLE_KEIMA: usize = 61;
pub const UCT_KO_CONNECTION: usize = 62;
pub const UCT_FEATURE_MAX: usize = 63;

#[inline]
const fn bit(feature: usize) -> u64 {
    1u64 << feature
}

/// Any capture-flavored bit.
const CAPTURE_MASK: u64 = bit(UCT_SAVE_CAPTURE_1_1)
    | bit(UCT_SAVE_CAPTURE_1_2)
    | bit(UCT_SAVE_CAPTURE_1_3)
    | bit(UCT_SAVE_CAPTURE_2_1)
    | bit(UCT_SAVE_CAPTURE_2_2)
    | bit(UCT_SAVE_CAPTURE_2_3)
    | bit(UCT_SAVE_CAPTURE_3_1)
    | bit(UCT_SAVE_CAPTURE_3_2)
    | bit(UCT_SAVE_CAPTURE_3_3)
    | bit(UCT_SAVE_CAPTURE_SELF_ATARI)
    | bit(UCT_CAPTURE)
    | bit(UCT_CAPTURE_AFTER_KO)
    | bit(UCT_SEMEAI_CAPTURE)
    | bit(UCT_2POINT_CAPTURE_S_S)
    | bit(UCT_2POINT_CAPTURE_S_L)
    | bit(UCT_2POINT_CAPTURE_L_S)
    | bit(UCT_2POINT_CAPTURE_L_L)
    | bit(UCT_3POINT_CAPTURE_S_S)
    | bit(UCT_3POINT_CAPTURE_S_L)
    | bit(UCT_3POINT_CAPTURE_L_S)
    | bit(UCT_3POINT_CAPTURE_L_L);

/// Any atari-flavored bit.
const ATARI_MASK: u64 = bit(UCT_ATARI)
    | bit(UCT_CAPTURABLE_ATARI)
    | bit(UCT_2POINT_ATARI_S_S)
    | bit(UCT_2POINT_ATARI_S_L)
    | bit(UCT_2POINT_ATARI_L_S)
    | bit(UCT_2POINT_ATARI_L_L)
    | bit(UCT_2POINT_C_ATARI_S_S)
    | bit(UCT_2POINT_C_ATARI_S_L)
    | bit(UCT_2POINT_C_ATARI_L_S)
    | bit(UCT_2POINT_C_ATARI_L_L)
    | bit(UCT_3POINT_ATARI_S_S)
    | bit(UCT_3POINT_ATARI_S_L)
    | bit(UCT_3POINT_ATARI_L_S)
    | bit(UCT_3POINT_ATARI_L_L)
    | bit(UCT_3POINT_C_ATARI_S_S)
    | bit(UCT_3POINT_C_ATARI_S_L)
    | bit(UCT_3POINT_C_ATARI_L_S)
    | bit(UCT_3POINT_C_ATARI_L_L);

/// Learned prior model.
pub struct UctParams {
    weight_zero: f64,
    tactical: Vec<LatentFactor>,
    pos_id: Vec<LatentFactor>,
    /// Pass after a normal move, pass after a pass.
    pass: [LatentFactor; 2],
    move_distance_1: Vec<LatentFactor>,
    move_distance_2: Vec<LatentFactor>,
    pat3: HashMap<u32, LatentFactor>,
    md2: HashMap<u32, LatentFactor>,
    md3: Vec<LatentFactor>,
    md3_index: LargePatternIndex,
    md4: Vec<LatentFactor>,
    md4_index: LargePatternIndex,
    md5: Vec<LatentFactor>,
    md5_index: LargePatternIndex,
    /// Ownership bonus per owner bucket.
    pub owner: [f64; OWNER_MAX],
    /// Criticality bonus per criticality bucket.
    pub criticality: [f64; CRITICALITY_MAX],
}

impl UctParams {
    /// Neutral model: zero weights, bonuses from their closed forms.
    pub fn neutral() -> UctParams {
        UctParams {
            weight_zero: 0.0,
            tactical: vec![LatentFactor::default(); UCT_FEATURE_MAX],
            pos_id: vec![LatentFactor::default(); POS_ID_MAX],
            pass: [LatentFactor::default(); 2],
            move_distance_1: vec![LatentFactor::default(); MOVE_DISTANCE_MAX],
            move_distance_2: vec![LatentFactor::default(); MOVE_DISTANCE_MAX],
            pat3: HashMap::new(),
            md2: HashMap::new(),
            md3: Vec::new(),
            md3_index: LargePatternIndex::default(),
            md4: Vec::new(),
            md4_index: LargePatternIndex::default(),
            md5: Vec::new(),
            md5_index: LargePatternIndex::default(),
            owner: std::array::from_fn(|i| {
                OWNER_K * (-((i as f64 - 5.0).powi(2)) / OWNER_BIAS).exp()
            }),
            criticality: std::array::from_fn(|i| (CRITICALITY_BIAS * i as f64).exp() - 1.0),
        }
    }

    /// Load the `uct_params` directory; every file must be present.
    pub fn load(dir: &Path) -> Result<UctParams> {
        let mut out = Self::neutral();
        out.weight_zero = params::read_floats(&dir.join("WeightZero.txt"), 1)?[0];
        out.tactical =
            params::read_latent_factors(&dir.join("TacticalFeature.txt"), UCT_FEATURE_MAX)?;
        out.pos_id = params::read_latent_factors(&dir.join("PosID.txt"), POS_ID_MAX)?;
        let pass = params::read_latent_factors(&dir.join("Pass.txt"), 2)?;
        out.pass = [pass[0], pass[1]];
        out.move_distance_1 =
            params::read_latent_factors(&dir.join("MoveDistance1.txt"), MOVE_DISTANCE_MAX)?;
        out.move_distance_2 =
            params::read_latent_factors(&dir.join("MoveDistance2.txt"), MOVE_DISTANCE_MAX)?;

        for (key, factor) in params::read_keyed_latent_factors(&dir.join("Pat3.txt"))? {
            let canonical = *pattern::pat3_transpose16(key as u32).iter().min().unwrap();
            out.pat3.insert(canonical, factor);
        }
        for (key, factor) in params::read_keyed_latent_factors(&dir.join("MD2.txt"))? {
            let canonical = *pattern::md2_transpose16(key as u32).iter().min().unwrap();
            out.md2.insert(canonical, factor);
        }
        for (name, table, index) in [
            ("MD3.txt", &mut out.md3, &mut out.md3_index),
            ("MD4.txt", &mut out.md4, &mut out.md4_index),
            ("MD5.txt", &mut out.md5, &mut out.md5_index),
        ] {
            for (hash, factor) in params::read_keyed_latent_factors(&dir.join(name))? {
                index.insert(hash, table.len());
                table.push(factor);
            }
        }
        Ok(out)
    }
}

/// Tactical feature words for one expansion pass.
pub struct UctFeatures {
    pub tactical: Vec<u64>,
}

impl UctFeatures {
    pub fn new(board_max: usize) -> UctFeatures {
        UctFeatures { tactical: vec![0; board_max] }
    }
}

// =============================================================================
// Feature checks driven by the previous move
// =============================================================================

/// Flag features arising from the previous move: rescues, captures, ataris
/// and extensions on the friendly strings it touched.
pub fn check_features(game: &GameState, color: u8, f: &mut UctFeatures) {
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
        checked.push(id);
        match game.string[id].libs {
            1 => check_features_lib1(game, color, id, f),
            2 => check_features_lib2(game, color, id, f),
            3 => check_features_lib3(game, color, id, f),
            _ => {}
        }
    }
}

fn check_features_lib1(game: &GameState, color: u8, id: usize, f: &mut UctFeatures) {
    let geo = &game.geo;
    let lib = game.string[id].lib_head();
    let size = game.string[id].size;

    let extension = match size {
        1 => UCT_SAVE_EXTENSION_1,
        2 => UCT_SAVE_EXTENSION_2,
        _ => UCT_SAVE_EXTENSION_3,
    };
    f.tactical[lib] |= bit(extension);
    if crate::ladder::check_ladder_extension(game, color, game.string[id].origin) {
        f.tactical[lib] |= bit(UCT_LADDER_EXTENSION);
    }

    for nid in game.string[id].neighbor_ids(geo.neighbor_end) {
        if game.string[nid].libs != 1 {
            continue;
        }
        let nlib = game.string[nid].lib_head();
        let nsize = game.string[nid].size;
        let feature = match (size, nsize) {
            (1, 1) => UCT_SAVE_CAPTURE_1_1,
            (1, 2) => UCT_SAVE_CAPTURE_1_2,
            (1, _) => UCT_SAVE_CAPTURE_1_3,
            (_, 1) => {
                if semeai::is_self_atari_capture(game, nlib, color, id) {
                    UCT_SAVE_CAPTURE_SELF_ATARI
                } else if size == 2 {
                    UCT_SAVE_CAPTURE_2_1
                } else {
                    UCT_SAVE_CAPTURE_3_1
                }
            }
            (2, 2) => UCT_SAVE_CAPTURE_2_2,
            (2, _) => UCT_SAVE_CAPTURE_2_3,
            (_, 2) => UCT_SAVE_CAPTURE_3_2,
            (_, _) => UCT_SAVE_CAPTURE_3_3,
        };
        f.tactical[nlib] |= bit(feature);
        // Capturing here also wins the adjacent capturing race.
        if semeai::is_capturable_neighbor_none(game, nid) {
            f.tactical[nlib] |= bit(UCT_SEMEAI_CAPTURE);
        }
    }
}

fn check_features_lib2(game: &GameState, color: u8, id: usize, f: &mut UctFeatures) {
    let geo = &game.geo;
    let small = game.string[id].size <= 2;
    let lib1 = game.string[id].lib_head();
    let lib2 = game.string[id].next_lib(lib1);

    for lib in [lib1, lib2] {
        let feature = match semeai::check_liberty_state(game, lib, color, id) {
            LibertyState::Increase => UCT_2POINT_EXTENSION_INCREASE,
            LibertyState::Even => UCT_2POINT_EXTENSION_EVEN,
            LibertyState::Decrease => UCT_2POINT_EXTENSION_DECREASE,
        };
        f.tactical[lib] |= bit(feature);
    }

    for nid in game.string[id].neighbor_ids(geo.neighbor_end) {
        let nsmall = game.string[nid].size <= 2;
        match game.string[nid].libs {
            1 => {
                let nlib = game.string[nid].lib_head();
                let feature = match (small, nsmall) {
                    (true, true) => UCT_2POINT_CAPTURE_S_S,
                    (true, false) => UCT_2POINT_CAPTURE_S_L,
                    (false, true) => UCT_2POINT_CAPTURE_L_S,
                    (false, false) => UCT_2POINT_CAPTURE_L_L,
                };
                f.tactical[nlib] |= bit(feature);
            }
            2 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                for nlib in [nlib1, nlib2] {
                    let capturable =
                        semeai::is_capturable_atari(game, nlib, color, game.string[nid].origin);
                    let feature = match (capturable, small, nsmall) {
                        (true, true, true) => UCT_2POINT_C_ATARI_S_S,
                        (true, true, false) => UCT_2POINT_C_ATARI_S_L,
                        (true, false, true) => UCT_2POINT_C_ATARI_L_S,
                        (true, false, false) => UCT_2POINT_C_ATARI_L_L,
                        (false, true, true) => UCT_2POINT_ATARI_S_S,
                        (false, true, false) => UCT_2POINT_ATARI_S_L,
                        (false, false, true) => UCT_2POINT_ATARI_L_S,
                        (false, false, false) => UCT_2POINT_ATARI_L_L,
                    };
                    f.tactical[nlib] |= bit(feature);
                }
            }
            _ => {}
        }
    }
}

fn check_features_lib3(game: &GameState, color: u8, id: usize, f: &mut UctFeatures) {
    let geo = &game.geo;
    let small = game.string[id].size <= 2;
    let lib1 = game.string[id].lib_head();
    let lib2 = game.string[id].next_lib(lib1);
    let lib3 = game.string[id].next_lib(lib2);

    for lib in [lib1, lib2, lib3] {
        let feature = match semeai::check_liberty_state(game, lib, color, id) {
            LibertyState::Increase => UCT_3POINT_EXTENSION_INCREASE,
            LibertyState::Even => UCT_3POINT_EXTENSION_EVEN,
            LibertyState::Decrease => UCT_3POINT_EXTENSION_DECREASE,
        };
        f.tactical[lib] |= bit(feature);
    }

    for nid in game.string[id].neighbor_ids(geo.neighbor_end) {
        let nsmall = game.string[nid].size <= 2;
        match game.string[nid].libs {
            1 => {
                let nlib = game.string[nid].lib_head();
                let feature = match (small, nsmall) {
                    (true, true) => UCT_3POINT_CAPTURE_S_S,
                    (true, false) => UCT_3POINT_CAPTURE_S_L,
                    (false, true) => UCT_3POINT_CAPTURE_L_S,
                    (false, false) => UCT_3POINT_CAPTURE_L_L,
                };
                f.tactical[nlib] |= bit(feature);
            }
            2 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                for nlib in [nlib1, nlib2] {
                    let capturable =
                        semeai::is_capturable_atari(game, nlib, color, game.string[nid].origin);
                    let feature = match (capturable, small, nsmall) {
                        (true, true, true) => UCT_3POINT_C_ATARI_S_S,
                        (true, true, false) => UCT_3POINT_C_ATARI_S_L,
                        (true, false, true) => UCT_3POINT_C_ATARI_L_S,
                        (true, false, false) => UCT_3POINT_C_ATARI_L_L,
                        (false, true, true) => UCT_3POINT_ATARI_S_S,
                        (false, true, false) => UCT_3POINT_ATARI_S_L,
                        (false, false, true) => UCT_3POINT_ATARI_L_S,
                        (false, false, false) => UCT_3POINT_ATARI_L_L,
                    };
                    f.tactical[nlib] |= bit(feature);
                }
            }
            3 => {
                let nlib1 = game.string[nid].lib_head();
                let nlib2 = game.string[nid].next_lib(nlib1);
                let nlib3 = game.string[nid].next_lib(nlib2);
                let feature = match (small, nsmall) {
                    (true, true) => UCT_3POINT_DAME_S_S,
                    (true, false) => UCT_3POINT_DAME_S_L,
                    (false, true) => UCT_3POINT_DAME_L_S,
                    (false, false) => UCT_3POINT_DAME_L_L,
                };
                for nlib in [nlib1, nlib2, nlib3] {
                    f.tactical[nlib] |= bit(feature);
                }
            }
            _ => {}
        }
    }
}

/// Throw-in after a two-stone capture by the opponent.
pub fn check_remove2_stones(game: &GameState, color: u8, f: &mut UctFeatures) {
    let other = flip_color(color) as usize;
    if game.capture_pos[other].len() != 2 {
        return;
    }
    let rm1 = game.capture_pos[other][0];
    let rm2 = game.capture_pos[other][1];
    let d = rm1.abs_diff(rm2);
    if d != 1 && d != game.geo.board_size {
        return;
    }
    for rm in [rm1, rm2] {
        let support = game
            .geo
            .cross
            .iter()
            .filter(|&&c| (game.board[(rm as isize + c) as usize] & color) == color)
            .count();
        if support >= 2 {
            f.tactical[rm] |= bit(UCT_THROW_IN_2);
        }
    }
}

/// Vital point of a three-stone capture the opponent just made.
pub fn check_remove3_stones(
    game: &GameState,
    color: u8,
    nakade: &NakadeTable,
    f: &mut UctFeatures,
) {
    if game.capture_pos[flip_color(color) as usize].len() != 3 {
        return;
    }
    if let Some(vital) = nakade::check_removed_stone_nakade(nakade, game, color) {
        f.tactical[vital] |= bit(UCT_NAKADE_3);
    }
}

/// A capture resolving the ko started two moves ago.
pub fn check_capture_after_ko(game: &GameState, color: u8, f: &mut UctFeatures) {
    if game.moves < 3 {
        return;
    }
    let pm2 = game.record[game.moves - 2].pos;
    if pm2 == PASS {
        return;
    }
    let geo = &game.geo;
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
            f.tactical[game.string[id].lib_head()] |= bit(UCT_CAPTURE_AFTER_KO);
        }
    }
}

/// Filling the active ko point connects the ko.
pub fn check_ko_connection(game: &GameState, f: &mut UctFeatures) {
    if game.ko_pos != 0 && game.board[game.ko_pos] == S_EMPTY {
        f.tactical[game.ko_pos] |= bit(UCT_KO_CONNECTION);
    }
}

// =============================================================================
// Per-candidate checks
// =============================================================================

/// Self-atari classification. Returns false only for a pointless large
/// sacrifice, which the caller scores as hopeless.
pub fn check_self_atari(
    game: &GameState,
    color: u8,
    pos: Pos,
    nakade: &NakadeTable,
    f: &mut UctFeatures,
) -> bool {
    let geo = &game.geo;
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
        f.tactical[pos] |= bit(UCT_SELF_ATARI_SMALL);
        true
    } else if nakade::is_uct_nakade_self_atari(nakade, game, pos, color) {
        f.tactical[pos] |= bit(UCT_SELF_ATARI_NAKADE);
        true
    } else {
        f.tactical[pos] |= bit(UCT_SELF_ATARI_LARGE);
        false
    }
}

/// Capture flags, including the oiotoshi refinement.
pub fn check_capture(game: &GameState, color: u8, pos: Pos, f: &mut UctFeatures) {
    let geo = &game.geo;
    let other = flip_color(color);
    for n in geo.neighbor4(pos) {
        if game.board[n] != other {
            continue;
        }
        let id = game.string_id[n];
        if game.string[id].libs == 1 {
            f.tactical[pos] |= bit(UCT_CAPTURE);
        } else if game.string[id].libs == 2
            && check_oiotoshi_at(game, color, pos, n)
        {
            f.tactical[pos] |= bit(UCT_OIOTOSHI);
        }
    }
}

fn check_oiotoshi_at(game: &GameState, color: u8, pos: Pos, opponent_pos: Pos) -> bool {
    matches!(semeai::check_oiotoshi(game, pos, color, opponent_pos), Some(n) if n > 0)
}

/// Atari flags against two-liberty enemy strings.
pub fn check_atari(game: &GameState, color: u8, pos: Pos, f: &mut UctFeatures) {
    let geo = &game.geo;
    let other = flip_color(color);
    for n in geo.neighbor4(pos) {
        if game.board[n] != other {
            continue;
        }
        let id = game.string_id[n];
        if game.string[id].libs == 2 {
            if semeai::is_capturable_atari(game, pos, color, n) {
                f.tactical[pos] |= bit(UCT_CAPTURABLE_ATARI);
            } else {
                f.tactical[pos] |= bit(UCT_ATARI);
            }
        }
    }
}

/// Snapback: the capture at `pos` gives a stone straight back, then takes
/// more.
pub fn check_snapback(game: &GameState, color: u8, pos: Pos, f: &mut UctFeatures) {
    let geo = &game.geo;
    let other = flip_color(color);
    for n in geo.neighbor4(pos) {
        if game.board[n] != other {
            continue;
        }
        let id = game.string_id[n];
        if game.string[id].libs == 1
            && game.string[id].size == 1
            && semeai::is_self_atari_capture(game, pos, color, id)
            && semeai::capturable_candidate(game, id).is_some()
        {
            f.tactical[pos] |= bit(UCT_SNAPBACK);
            return;
        }
    }
}

/// Keima tsukekoshi: `pos` touches an enemy stone orthogonally and sits on
/// the diagonal of its knight's-move partner.
pub fn check_keima_tsukekoshi(game: &GameState, color: u8, pos: Pos, f: &mut UctFeatures) {
    let geo = &game.geo;
    let other = flip_color(color);
    let bs = geo.board_size as isize;
    let p = pos as isize;
    // (orthogonal enemy, its keima partner through pos)
    let keima_pairs: [(isize, [isize; 2]); 4] = [
        (-bs, [bs - 1, bs + 1]),
        (bs, [-bs - 1, -bs + 1]),
        (-1, [bs + 1, -bs + 1]),
        (1, [bs - 1, -bs - 1]),
    ];
    for (contact, partners) in keima_pairs {
        if game.board[(p + contact) as usize] != other {
            continue;
        }
        for partner in partners {
            let q = (p + partner) as usize;
            if game.board[q] == other && game.string_id[q] != game.string_id[(p + contact) as usize]
            {
                f.tactical[pos] |= bit(UCT_KEIMA_TSUKEKOSHI);
                return;
            }
        }
    }
}

/// Double keima: `pos` is a knight's move from two own stones across open
/// space.
pub fn check_double_keima(game: &GameState, color: u8, pos: Pos, f: &mut UctFeatures) {
    let geo = &game.geo;
    let bs = geo.board_size as isize;
    let p = pos as isize;
    if geo
        .neighbor4(pos)
        .iter()
        .any(|&n| game.board[n] != S_EMPTY)
    {
        return;
    }
    let keima: [isize; 8] = [
        -2 * bs - 1,
        -2 * bs + 1,
        -bs - 2,
        -bs + 2,
        bs - 2,
        bs + 2,
        2 * bs - 1,
        2 * bs + 1,
    ];
    let own = keima
        .iter()
        .filter(|&&d| game.board[(p + d) as usize] == color)
        .count();
    if own >= 2 {
        f.tactical[pos] |= bit(UCT_DOUBLE_KEIMA);
    }
}

/// Capture/atari helpers share the "already flagged" masks with the caller.
pub fn has_capture_feature(f: &UctFeatures, pos: Pos) -> bool {
    f.tactical[pos] & CAPTURE_MASK != 0
}

pub fn has_atari_feature(f: &UctFeatures, pos: Pos) -> bool {
    f.tactical[pos] & ATARI_MASK != 0
}

// =============================================================================
// Scoring
// =============================================================================

/// Large-pattern indices at `pos`: MD3, MD4, MD5 (compact table indices).
pub fn large_pattern_indices(
    game: &GameState,
    pos: Pos,
    params: &UctParams,
) -> [Option<usize>; 3] {
    if params.md3.is_empty() && params.md4.is_empty() && params.md5.is_empty() {
        return [None; 3];
    }
    let hashes = pattern_hash::pattern_hash(&game.pat, pos);
    [
        params.md3_index.lookup(hashes.md3),
        params.md4_index.lookup(hashes.md4),
        params.md5_index.lookup(hashes.md5),
    ]
}

/// Factorization-machines score of `pos` (or pass): w0 plus the active
/// features' weights plus their pairwise latent interactions.
pub fn lfr_score(
    game: &GameState,
    pos: Pos,
    pat_index: &[Option<usize>; 3],
    f: &UctFeatures,
    params: &UctParams,
) -> f64 {
    let geo = &game.geo;
    let mut active: Vec<&LatentFactor> = Vec::with_capacity(16);
    let mut score = params.weight_zero;

    if pos == PASS {
        let after_pass = game.moves > 1 && game.previous_move() == PASS;
        return score + params.pass[usize::from(after_pass)].w;
    }

    let word = f.tactical[pos];
    let mut bits = word;
    while bits != 0 {
        let feature = bits.trailing_zeros() as usize;
        active.push(&params.tactical[feature]);
        bits &= bits - 1;
    }

    active.push(&params.pos_id[geo.board_pos_id[pos] as usize]);

    let pm1 = game.previous_move();
    if game.moves > 1 && pm1 != PASS {
        let dis = geo.move_distance(pm1, pos).min(MOVE_DISTANCE_MAX - 1);
        active.push(&params.move_distance_1[dis]);
    }
    let pm2 = game.previous_move2();
    if game.moves > 2 && pm2 != PASS {
        let dis = geo.move_distance(pm2, pos).min(MOVE_DISTANCE_MAX - 1);
        active.push(&params.move_distance_2[dis]);
    }

    // The most specific pattern knowledge available.
    if let Some(i) = pat_index[2] {
        active.push(&params.md5[i]);
    } else if let Some(i) = pat_index[1] {
        active.push(&params.md4[i]);
    } else if let Some(i) = pat_index[0] {
        active.push(&params.md3[i]);
    } else {
        let md2_canonical = *pattern::md2_transpose16(game.pat.md2(pos)).iter().min().unwrap();
        if let Some(lf) = params.md2.get(&md2_canonical) {
            active.push(lf);
        } else {
            let pat3_canonical =
                *pattern::pat3_transpose16(game.pat.pat3(pos)).iter().min().unwrap();
            if let Some(lf) = params.pat3.get(&pat3_canonical) {
                active.push(lf);
            }
        }
    }

    for lf in &active {
        score += lf.w;
    }
    for dim in 0..LFR_DIMENSION {
        for i in 0..active.len() {
            let mut tail = 0.0;
            for j in (i + 1)..active.len() {
                tail += active[j].v[dim];
            }
            score += tail * active[i].v[dim];
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Geometry;

    #[test]
    fn capture_feature_raises_score() {
        let geo = Geometry::new(9);
        let nakade = NakadeTable::new(&geo);
        let mut game = GameState::new(geo.clone());
        let w = geo.pos(9, 9);
        game.put_stone(w, S_WHITE);
        game.put_stone(geo.west(w), S_BLACK);
        game.put_stone(geo.north(w), S_BLACK);
        game.put_stone(geo.south(w), S_BLACK);

        let mut params = UctParams::neutral();
        params.tactical[UCT_CAPTURE].w = 2.0;

        let mut f = UctFeatures::new(geo.board_max);
        let capture_point = geo.east(w);
        let ok = check_self_atari(&game, S_BLACK, capture_point, &nakade, &mut f);
        assert!(ok);
        check_capture(&game, S_BLACK, capture_point, &mut f);
        assert!(has_capture_feature(&f, capture_point));

        let none = [None; 3];
        let scored = lfr_score(&game, capture_point, &none, &f, &params);
        let quiet = lfr_score(&game, geo.pos(5, 5), &none, &f, &params);
        assert!(scored > quiet);
    }

    #[test]
    fn latent_interactions_contribute() {
        let geo = Geometry::new(9);
        let mut game = GameState::new(geo.clone());
        game.put_stone(geo.pos(9, 9), S_BLACK);

        let mut params = UctParams::neutral();
        // Two features with aligned latent vectors reinforce each other.
        params.tactical[UCT_CAPTURE].v[0] = 1.0;
        for lf in params.pos_id.iter_mut() {
            lf.v[0] = 1.0;
        }

        let mut f = UctFeatures::new(geo.board_max);
        let pos = geo.pos(6, 6);
        f.tactical[pos] |= bit(UCT_CAPTURE);
        let none = [None; 3];
        let score = lfr_score(&game, pos, &none, &f, &params);
        // w terms are zero, so the score is exactly the interaction product.
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pass_uses_pass_weights() {
        let geo = Geometry::new(9);
        let mut game = GameState::new(geo.clone());
        let mut params = UctParams::neutral();
        params.pass[0].w = -0.25;
        params.pass[1].w = 0.75;

        let f = UctFeatures::new(geo.board_max);
        let none = [None; 3];
        assert_eq!(lfr_score(&game, PASS, &none, &f, &params), -0.25);
        game.put_stone(PASS, S_BLACK);
        assert_eq!(lfr_score(&game, PASS, &none, &f, &params), 0.75);
    }
}
