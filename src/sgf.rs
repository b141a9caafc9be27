//! Minimal SGF reader for `loadsgf`.
//!
//! Only what the command needs: board size, komi, handicap placements and
//! the main-line move sequence. Variations are ignored by taking the first
//! branch.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::constants::*;

pub struct SgfMove {
    pub color: u8,
    /// SGF point text, e.g. `"dd"`, empty for pass.
    pub point: String,
}

#[derive(Default)]
pub struct SgfGame {
    pub board_size: usize,
    pub komi: Option<f64>,
    pub handicap_black: Vec<String>,
    pub handicap_white: Vec<String>,
    pub moves: Vec<SgfMove>,
}

/// Parse the main line of an SGF file.
pub fn load_sgf(path: &Path) -> Result<SgfGame> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot open {}", path.display()))?;
    parse_sgf(&text)
}

pub fn parse_sgf(text: &str) -> Result<SgfGame> {
    let mut game = SgfGame { board_size: 19, ..SgfGame::default() };
    let bytes = text.as_bytes();
    let mut i = 0;
    // Whether a child branch was already taken at each nesting level; the
    // first branch is the main line, its siblings are variations.
    let mut taken: Vec<bool> = vec![false];

    let mut ident = String::new();
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                if *taken.last().unwrap() {
                    // A sibling variation: skip it wholesale.
                    let mut nest = 1;
                    i += 1;
                    while i < bytes.len() && nest > 0 {
                        match bytes[i] {
                            b'(' => nest += 1,
                            b')' => nest -= 1,
                            b'[' => {
                                i += 1;
                                while i < bytes.len() && bytes[i] != b']' {
                                    if bytes[i] == b'\\' {
                                        i += 1;
                                    }
                                    i += 1;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                    continue;
                }
                *taken.last_mut().unwrap() = true;
                taken.push(false);
                i += 1;
            }
            b')' => {
                taken.pop();
                if taken.is_empty() {
                    taken.push(true);
                }
                i += 1;
            }
            b';' => {
                ident.clear();
                i += 1;
            }
            b'[' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b']' {
                    if bytes[end] == b'\\' {
                        end += 1;
                    }
                    end += 1;
                }
                if end >= bytes.len() {
                    bail!("unterminated SGF property value");
                }
                let value = text[start..end].to_string();
                apply_property(&mut game, &ident, &value)?;
                i = end + 1;
            }
            c if c.is_ascii_uppercase() => {
                ident.clear();
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    if bytes[i].is_ascii_uppercase() {
                        ident.push(bytes[i] as char);
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Ok(game)
}

fn apply_property(game: &mut SgfGame, ident: &str, value: &str) -> Result<()> {
    match ident {
        "SZ" => {
            game.board_size = value.parse().with_context(|| format!("bad SZ[{value}]"))?;
        }
        "KM" => {
            game.komi = Some(value.parse().with_context(|| format!("bad KM[{value}]"))?);
        }
        "AB" => game.handicap_black.push(value.to_string()),
        "AW" => game.handicap_white.push(value.to_string()),
        "B" => game.moves.push(SgfMove { color: S_BLACK, point: value.to_string() }),
        "W" => game.moves.push(SgfMove { color: S_WHITE, point: value.to_string() }),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_game() {
        let game =
            parse_sgf("(;GM[1]SZ[9]KM[6.5];B[dd];W[ee];B[tt])").unwrap();
        assert_eq!(game.board_size, 9);
        assert_eq!(game.komi, Some(6.5));
        assert_eq!(game.moves.len(), 3);
        assert_eq!(game.moves[0].color, S_BLACK);
        assert_eq!(game.moves[0].point, "dd");
        assert_eq!(game.moves[2].point, "tt");
    }

    #[test]
    fn parses_handicap_placements() {
        let game = parse_sgf("(;SZ[19]HA[2]AB[dd]AB[pp];W[qd])").unwrap();
        assert_eq!(game.handicap_black, vec!["dd".to_string(), "pp".to_string()]);
        assert_eq!(game.moves.len(), 1);
        assert_eq!(game.moves[0].color, S_WHITE);
    }

    #[test]
    fn ignores_variations() {
        let game = parse_sgf("(;SZ[9];B[aa](;W[bb];B[cc])(;W[dd]))").unwrap();
        let points: Vec<&str> = game.moves.iter().map(|m| m.point.as_str()).collect();
        assert_eq!(points, vec!["aa", "bb", "cc"]);
    }
}
