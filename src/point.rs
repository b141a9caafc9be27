//! Coordinate codecs.
//!
//! GTP uses letters `A..T` skipping `I` for the column and a 1-based row
//! counted from the bottom; SGF uses two lowercase letters column-row from
//! the top with `tt` standing for pass. Internally everything is the padded
//! 1-D index.

use crate::board::Geometry;
use crate::constants::*;

const GTP_COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRST";

/// Parse a GTP vertex. `None` for malformed input.
pub fn gtp_to_pos(s: &str, geo: &Geometry) -> Option<Pos> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("pass") {
        return Some(PASS);
    }
    if s.eq_ignore_ascii_case("resign") {
        return Some(RESIGN);
    }
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let col_char = bytes[0].to_ascii_uppercase();
    let x = GTP_COLUMNS.iter().position(|&c| c == col_char)?;
    if x >= geo.pure_board_size {
        return None;
    }
    let row: usize = s[1..].parse().ok()?;
    if row == 0 || row > geo.pure_board_size {
        return None;
    }
    let y = geo.pure_board_size - row;
    Some(geo.pos(x + OB_SIZE, y + OB_SIZE))
}

/// Format a point as a GTP vertex.
pub fn pos_to_gtp(pos: Pos, geo: &Geometry) -> String {
    if pos == PASS {
        return "pass".to_string();
    }
    if pos == RESIGN {
        return "resign".to_string();
    }
    let x = geo.x(pos) - OB_SIZE;
    let y = geo.y(pos) - OB_SIZE;
    format!("{}{}", GTP_COLUMNS[x] as char, geo.pure_board_size - y)
}

/// Parse an SGF point (`""` and `tt` mean pass).
pub fn sgf_to_pos(s: &str, geo: &Geometry) -> Option<Pos> {
    if s.is_empty() || s == "tt" {
        return Some(PASS);
    }
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let x = (bytes[0].to_ascii_lowercase()).checked_sub(b'a')? as usize;
    let y = (bytes[1].to_ascii_lowercase()).checked_sub(b'a')? as usize;
    if x >= geo.pure_board_size || y >= geo.pure_board_size {
        return None;
    }
    Some(geo.pos(x + OB_SIZE, y + OB_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gtp_round_trip() {
        let geo = Geometry::new(19);
        for &name in &["A1", "T19", "J10", "C7", "Q16"] {
            let pos = gtp_to_pos(name, &geo).unwrap();
            assert_eq!(pos_to_gtp(pos, &geo), name.to_string());
        }
    }

    #[test]
    fn gtp_skips_i_column() {
        let geo = Geometry::new(19);
        assert!(gtp_to_pos("I5", &geo).is_none());
        let h = gtp_to_pos("H5", &geo).unwrap();
        let j = gtp_to_pos("J5", &geo).unwrap();
        assert_eq!(j, h + 1, "J must be the column after H");
    }

    #[test]
    fn gtp_bottom_left_is_a1() {
        let geo = Geometry::new(9);
        let a1 = gtp_to_pos("A1", &geo).unwrap();
        assert_eq!(geo.x(a1), geo.board_start);
        assert_eq!(geo.y(a1), geo.board_end);
    }

    #[test]
    fn sgf_corners() {
        let geo = Geometry::new(9);
        // SGF "aa" is the top-left corner.
        let aa = sgf_to_pos("aa", &geo).unwrap();
        assert_eq!(geo.x(aa), geo.board_start);
        assert_eq!(geo.y(aa), geo.board_start);
        assert_eq!(sgf_to_pos("tt", &geo), Some(PASS));
        assert!(sgf_to_pos("zz", &geo).is_none());
    }

    #[test]
    fn pass_and_resign() {
        let geo = Geometry::new(9);
        assert_eq!(gtp_to_pos("PASS", &geo), Some(PASS));
        assert_eq!(pos_to_gtp(RESIGN, &geo), "resign");
    }
}
