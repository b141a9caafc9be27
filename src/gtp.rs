//! Go Text Protocol front end.
//!
//! Implements GTP version 2 plus the analysis extensions (`lz-analyze`,
//! `lz-genmove_analyze`, `cgos-genmove_analyze`). Protocol responses go to
//! stdout; diagnostics go through the logger on stderr so GUIs stay happy.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use log::warn;

use crate::board::{GameState, Geometry};
use crate::constants::*;
use crate::point::{gtp_to_pos, pos_to_gtp, sgf_to_pos};
use crate::rating::SimParams;
use crate::sgf;
use crate::uct::{SearchMode, SearchOptions, UctSearcher};
use crate::uct_rating::UctParams;

const KNOWN_COMMANDS: &[&str] = &[
    "boardsize",
    "cgos-genmove_analyze",
    "clear_board",
    "final_score",
    "final_status_list",
    "fixed_handicap",
    "genmove",
    "kgs-genmove_cleanup",
    "known_command",
    "komi",
    "list_commands",
    "loadsgf",
    "lz-analyze",
    "lz-genmove_analyze",
    "name",
    "play",
    "protocol_version",
    "quit",
    "set_free_handicap",
    "showboard",
    "time_left",
    "time_settings",
    "version",
];

/// Everything needed to rebuild the engine for a new board size.
pub struct EngineConfig {
    pub size: usize,
    pub komi: f64,
    pub tree_size: usize,
    pub superko: bool,
    pub handicap: usize,
    pub threads: usize,
    pub mode: SearchMode,
    pub playout: usize,
    pub const_thinking_time: f64,
    pub total_time: f64,
    pub reuse_subtree: bool,
    pub pondering: bool,
    pub resign_threshold: f64,
    pub debug: bool,
    pub cgos: bool,
    pub sim_params_dir: Option<PathBuf>,
    pub uct_params_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            size: PURE_BOARD_SIZE,
            komi: KOMI,
            tree_size: UCT_HASH_SIZE,
            superko: false,
            handicap: 0,
            threads: 1,
            mode: SearchMode::ConstTime,
            playout: CONST_PLAYOUT,
            const_thinking_time: CONST_TIME,
            total_time: ALL_THINKING_TIME,
            reuse_subtree: false,
            pondering: false,
            resign_threshold: RESIGN_THRESHOLD,
            debug: true,
            cgos: false,
            sim_params_dir: None,
            uct_params_dir: None,
        }
    }
}

impl EngineConfig {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            threads: self.threads,
            mode: self.mode,
            playout: self.playout,
            const_thinking_time: self.const_thinking_time,
            total_time: self.total_time,
            reuse_subtree: self.reuse_subtree || self.pondering,
            pondering: self.pondering,
            resign_threshold: self.resign_threshold,
            debug: self.debug,
        }
    }

    fn load_params(&self) -> Result<(SimParams, UctParams)> {
        let sim = match &self.sim_params_dir {
            Some(dir) => SimParams::load(dir)?,
            None => SimParams::neutral(),
        };
        let uct = match &self.uct_params_dir {
            Some(dir) => UctParams::load(dir)?,
            None => UctParams::neutral(),
        };
        Ok((sim, uct))
    }

    pub fn build(&self, size: usize) -> Result<(GameState, Arc<UctSearcher>)> {
        let geo = Geometry::new(size);
        let (sim, uct) = self.load_params()?;
        let searcher =
            Arc::new(UctSearcher::new(geo.clone(), self.tree_size, self.options(), sim, uct)?);
        let mut game = GameState::new(geo);
        game.set_komi(self.komi);
        game.set_superko(self.superko);
        searcher.dynamic_komi.set_komi(self.komi);
        searcher.dynamic_komi.set_const_handicap_num(self.handicap);
        if self.handicap > 0 {
            searcher.dynamic_komi.set_handicap_num(self.handicap);
        }
        Ok((game, searcher))
    }
}

enum Response {
    /// Ordinary response, already formatted payload.
    Done(bool, String),
    /// The command streamed its own output, including the terminator.
    Streamed,
}

pub struct GtpEngine {
    config: EngineConfig,
    game: GameState,
    searcher: Arc<UctSearcher>,
    ponder_handles: Vec<JoinHandle<()>>,
    pending_line: Option<String>,
    quit: bool,
}

impl GtpEngine {
    pub fn new(config: EngineConfig) -> Result<GtpEngine> {
        let (game, searcher) = config.build(config.size)?;
        Ok(GtpEngine {
            game,
            searcher,
            ponder_handles: Vec::new(),
            pending_line: None,
            quit: false,
            config,
        })
    }

    /// Run the GTP loop until `quit` or end of input.
    pub fn run(&mut self) {
        while !self.quit {
            let Some(line) = self.next_line() else { break };
            let line = line.trim().to_string();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (id, rest) = parse_id(&line);
            let parts: Vec<String> = rest.split_whitespace().map(str::to_lowercase).collect();
            if parts.is_empty() {
                continue;
            }
            let command = parts[0].clone();
            let args: Vec<&str> = parts[1..].iter().map(String::as_str).collect();

            match self.execute(&command, &args, id) {
                Response::Done(ok, message) => {
                    let prefix = if ok { '=' } else { '?' };
                    let id_str = id.map(|i| i.to_string()).unwrap_or_default();
                    println!("{prefix}{id_str} {message}\n");
                    let _ = io::stdout().flush();
                }
                Response::Streamed => {}
            }
        }
        self.stop_ponder();
    }

    fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.pending_line.take() {
            return Some(line);
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(_) => None,
        }
    }

    fn stop_ponder(&mut self) {
        if !self.ponder_handles.is_empty() {
            let handles = std::mem::take(&mut self.ponder_handles);
            self.searcher.stop_pondering(handles);
        }
    }

    fn start_ponder(&mut self, color: u8) {
        if self.config.pondering && self.ponder_handles.is_empty() {
            self.ponder_handles = self.searcher.ponder(&self.game, color);
        }
    }

    fn rebuild(&mut self, size: usize) -> Result<()> {
        self.stop_ponder();
        let (game, searcher) = self.config.build(size)?;
        self.game = game;
        self.searcher = searcher;
        Ok(())
    }

    fn parse_color(arg: &str) -> Option<u8> {
        match arg {
            "b" | "black" => Some(S_BLACK),
            "w" | "white" => Some(S_WHITE),
            _ => None,
        }
    }

    fn play_move(&mut self, pos: Pos, color: u8) -> Result<(), String> {
        if pos == PASS {
            self.game.put_stone(PASS, color);
            return Ok(());
        }
        match self.game.legality(pos, color) {
            Ok(()) => {
                self.game.put_stone(pos, color);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn generate_move(&mut self, color: u8, cleanup: bool) -> Pos {
        self.stop_ponder();
        let cleanup = cleanup || self.config.cgos;
        let pos = if cleanup {
            self.searcher.genmove_cleanup(&self.game, color)
        } else {
            self.searcher.genmove(&self.game, color)
        };
        if pos != RESIGN {
            self.game.put_stone(pos, color);
        }
        pos
    }

    fn handicap_points(&self, stones: usize) -> Option<Vec<Pos>> {
        let geo = &self.game.geo;
        let size = geo.pure_board_size;
        if size < 7 || !(2..=9).contains(&stones) || (size == 7 && stones > 4) {
            return None;
        }
        let edge = if size < 13 { 2 } else { 3 };
        let lo = geo.board_start + edge;
        let hi = geo.board_end - edge;
        let mid = (geo.board_start + geo.board_end) / 2;
        let corner = [
            geo.pos(hi, lo),
            geo.pos(lo, hi),
            geo.pos(hi, hi),
            geo.pos(lo, lo),
        ];
        let side = [geo.pos(lo, mid), geo.pos(hi, mid), geo.pos(mid, lo), geo.pos(mid, hi)];
        let center = geo.pos(mid, mid);

        let mut points: Vec<Pos> = corner[..stones.min(4)].to_vec();
        match stones {
            5 => points.push(center),
            6 => points.extend(&side[..2]),
            7 => {
                points.extend(&side[..2]);
                points.push(center);
            }
            8 => points.extend(&side),
            9 => {
                points.extend(&side);
                points.push(center);
            }
            _ => {}
        }
        Some(points)
    }

    fn execute(&mut self, command: &str, args: &[&str], id: Option<u32>) -> Response {
        let done = |ok, msg: String| Response::Done(ok, msg);
        match command {
            "name" => done(true, "tengen".to_string()),
            "version" => done(true, env!("CARGO_PKG_VERSION").to_string()),
            "protocol_version" => done(true, "2".to_string()),
            "list_commands" => done(true, KNOWN_COMMANDS.join("\n")),
            "known_command" => match args.first() {
                Some(cmd) => done(true, KNOWN_COMMANDS.contains(cmd).to_string()),
                None => done(false, "missing argument".to_string()),
            },
            "quit" => {
                self.quit = true;
                done(true, String::new())
            }
            "showboard" => done(true, format!("\n{}", self.game)),

            "boardsize" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
                Some(size) if (1..=PURE_BOARD_SIZE).contains(&size) => match self.rebuild(size) {
                    Ok(()) => done(true, String::new()),
                    Err(e) => done(false, format!("cannot set size: {e}")),
                },
                _ => done(false, "unacceptable size".to_string()),
            },

            "clear_board" => {
                self.stop_ponder();
                self.game.clear_board();
                self.searcher.clear();
                done(true, String::new())
            }

            "komi" => match args.first().and_then(|a| a.parse::<f64>().ok()) {
                Some(komi) => {
                    self.game.set_komi(komi);
                    self.searcher.dynamic_komi.set_komi(komi);
                    done(true, String::new())
                }
                None => done(false, "invalid komi".to_string()),
            },

            "play" => {
                let (Some(color), Some(&vertex)) =
                    (args.first().copied().and_then(Self::parse_color), args.get(1))
                else {
                    return done(false, "invalid arguments".to_string());
                };
                let Some(pos) = gtp_to_pos(vertex, &self.game.geo) else {
                    return done(false, "invalid vertex".to_string());
                };
                self.stop_ponder();
                match self.play_move(pos, color) {
                    Ok(()) => {
                        self.start_ponder(flip_color(color));
                        done(true, String::new())
                    }
                    Err(e) => done(false, e),
                }
            }

            "genmove" | "kgs-genmove_cleanup" => {
                let Some(color) = args.first().copied().and_then(Self::parse_color) else {
                    return done(false, "invalid color".to_string());
                };
                let pos = self.generate_move(color, command == "kgs-genmove_cleanup");
                let reply = pos_to_gtp(pos, &self.game.geo);
                if pos != RESIGN {
                    self.start_ponder(flip_color(color));
                }
                done(true, reply)
            }

            "final_score" => {
                self.stop_ponder();
                let score = self.searcher.analyze(&self.game, S_BLACK) as f64 - self.game.komi[0];
                let result = if score > 0.0 {
                    format!("B+{score:.1}")
                } else if score < 0.0 {
                    format!("W+{:.1}", -score)
                } else {
                    "0".to_string()
                };
                done(true, result)
            }

            "final_status_list" => {
                let Some(&kind) = args.first() else {
                    return done(false, "missing argument".to_string());
                };
                if kind != "dead" && kind != "alive" {
                    return done(false, "unknown status".to_string());
                }
                self.stop_ponder();
                self.searcher.analyze(&self.game, S_BLACK);
                let owners = self.searcher.owner_rates(S_BLACK);
                let geo = self.game.geo.clone();
                let mut vertices = Vec::new();
                for (i, &pos) in geo.onboard_pos.iter().enumerate() {
                    let stone = self.game.board[pos];
                    if stone != S_BLACK && stone != S_WHITE {
                        continue;
                    }
                    // Ownership from black's side: a black stone on a point
                    // black rarely owns is dead, as is a white stone on a
                    // point black usually owns.
                    let dead = (stone == S_BLACK && owners[i] < 0.30)
                        || (stone == S_WHITE && owners[i] > 0.70);
                    if (kind == "dead") == dead {
                        vertices.push(pos_to_gtp(pos, &geo));
                    }
                }
                done(true, vertices.join(" "))
            }

            "time_settings" => {
                let nums: Vec<f64> =
                    args.iter().filter_map(|a| a.parse::<f64>().ok()).collect();
                if nums.len() < 3 {
                    return done(false, "invalid arguments".to_string());
                }
                self.searcher.set_time_settings(nums[0], nums[1], nums[2] as usize);
                done(true, String::new())
            }

            "time_left" => {
                let (Some(color), Some(seconds)) = (
                    args.first().copied().and_then(Self::parse_color),
                    args.get(1).and_then(|a| a.parse::<f64>().ok()),
                ) else {
                    return done(false, "invalid arguments".to_string());
                };
                self.searcher.set_time_left(color, seconds);
                done(true, String::new())
            }

            "fixed_handicap" => {
                let Some(stones) = args.first().and_then(|a| a.parse::<usize>().ok()) else {
                    return done(false, "invalid number of stones".to_string());
                };
                if self.game.moves > 1 {
                    return done(false, "board not empty".to_string());
                }
                let Some(points) = self.handicap_points(stones) else {
                    return done(false, "invalid number of stones".to_string());
                };
                let geo = self.game.geo.clone();
                for &pos in &points {
                    self.game.put_stone(pos, S_BLACK);
                }
                self.searcher.dynamic_komi.set_handicap_num(stones);
                let list: Vec<String> = points.iter().map(|&p| pos_to_gtp(p, &geo)).collect();
                done(true, list.join(" "))
            }

            "set_free_handicap" => {
                if self.game.moves > 1 {
                    return done(false, "board not empty".to_string());
                }
                let geo = self.game.geo.clone();
                let mut placed = 0;
                for &vertex in args {
                    let Some(pos) = gtp_to_pos(vertex, &geo) else {
                        return done(false, format!("invalid vertex {vertex}"));
                    };
                    if pos != PASS && self.game.is_legal(pos, S_BLACK) {
                        self.game.put_stone(pos, S_BLACK);
                        placed += 1;
                    }
                }
                self.searcher.dynamic_komi.set_handicap_num(placed);
                done(true, String::new())
            }

            "loadsgf" => {
                let Some(&path) = args.first() else {
                    return done(false, "missing filename".to_string());
                };
                let move_number = args.get(1).and_then(|a| a.parse::<usize>().ok());
                match self.load_sgf(path, move_number) {
                    Ok(to_move) => done(true, if to_move == S_BLACK { "black" } else { "white" }.to_string()),
                    Err(e) => done(false, format!("cannot load sgf: {e}")),
                }
            }

            "lz-analyze" => {
                let (color, centis) = self.parse_analyze_args(args);
                self.lz_analyze(color, centis, id);
                Response::Streamed
            }

            "lz-genmove_analyze" => {
                let (color, centis) = self.parse_analyze_args(args);
                self.lz_genmove_analyze(color, centis, id);
                Response::Streamed
            }

            "cgos-genmove_analyze" => {
                let (color, _centis) = self.parse_analyze_args(args);
                self.cgos_genmove_analyze(color, id);
                Response::Streamed
            }

            _ => done(false, format!("unknown command: {command}")),
        }
    }

    fn parse_analyze_args(&self, args: &[&str]) -> (u8, u64) {
        let mut color = if self.game.moves > 1 {
            flip_color(self.game.record[self.game.moves - 1].color)
        } else {
            S_BLACK
        };
        let mut centis = 100;
        for &arg in args {
            if let Some(c) = Self::parse_color(arg) {
                color = c;
            } else if let Ok(n) = arg.parse::<u64>() {
                centis = n.max(1);
            }
        }
        (color, centis)
    }

    fn load_sgf(&mut self, path: &str, move_number: Option<usize>) -> Result<u8> {
        let record = sgf::load_sgf(std::path::Path::new(path))?;
        if record.board_size != self.game.geo.pure_board_size {
            self.rebuild(record.board_size)?;
        } else {
            self.game.clear_board();
            self.searcher.clear();
        }
        if let Some(komi) = record.komi {
            self.game.set_komi(komi);
            self.searcher.dynamic_komi.set_komi(komi);
        }
        let geo = self.game.geo.clone();
        for point in &record.handicap_black {
            if let Some(pos) = sgf_to_pos(point, &geo) {
                self.game.put_stone(pos, S_BLACK);
            }
        }
        for point in &record.handicap_white {
            if let Some(pos) = sgf_to_pos(point, &geo) {
                self.game.put_stone(pos, S_WHITE);
            }
        }
        if !record.handicap_black.is_empty() {
            self.searcher.dynamic_komi.set_handicap_num(record.handicap_black.len());
        }
        let limit = move_number.map(|n| n.saturating_sub(1)).unwrap_or(record.moves.len());
        let mut to_move = if record.handicap_black.is_empty() { S_BLACK } else { S_WHITE };
        for mv in record.moves.iter().take(limit) {
            let Some(pos) = sgf_to_pos(&mv.point, &geo) else { continue };
            if pos == PASS || self.game.is_legal(pos, mv.color) {
                self.game.put_stone(pos, mv.color);
                to_move = flip_color(mv.color);
            } else {
                warn!("skipping illegal sgf move {}", mv.point);
            }
        }
        Ok(to_move)
    }

    // =========================================================================
    // Analysis commands
    // =========================================================================

    fn emit_header(&self, id: Option<u32>) {
        let id_str = id.map(|i| i.to_string()).unwrap_or_default();
        println!("={id_str}");
        let _ = io::stdout().flush();
    }

    fn analysis_lines(&self) -> String {
        let geo = &self.game.geo;
        let mut rows = self.searcher.root_analysis(8);
        // Winrate order, as the protocol asks for.
        rows.sort_by(|a, b| {
            b.winrate.partial_cmp(&a.winrate).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut out = String::new();
        for (order, row) in rows.iter().enumerate() {
            let winrate = (row.winrate * 10000.0) as i64;
            let prior = (row.prior.clamp(0.0, 1.0) * 10000.0) as i64;
            let lcb = winrate;
            let pv: Vec<String> = row.pv.iter().map(|&p| pos_to_gtp(p, geo)).collect();
            out.push_str(&format!(
                "info move {} visits {} winrate {} prior {} lcb {} order {} pv {} ",
                pos_to_gtp(row.pos, geo),
                row.visits,
                winrate,
                prior,
                lcb,
                order,
                pv.join(" ")
            ));
        }
        out.push('\n');
        out
    }

    /// Search until the next GTP command arrives, reporting periodically.
    fn lz_analyze(&mut self, color: u8, centis: u64, id: Option<u32>) {
        self.stop_ponder();
        self.emit_header(id);

        // One reader waits for the next command while the search runs.
        let (tx, rx) = std::sync::mpsc::channel::<String>();
        std::thread::spawn(move || {
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line).is_ok() {
                let _ = tx.send(line);
            }
        });

        let handles = self.searcher.background_search(&self.game, color);

        loop {
            std::thread::sleep(Duration::from_millis(centis * 10));
            print!("{}", self.analysis_lines());
            let _ = io::stdout().flush();
            match rx.try_recv() {
                Ok(line) => {
                    self.pending_line = Some(line);
                    break;
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => break,
                Err(std::sync::mpsc::TryRecvError::Empty) => {}
            }
        }
        self.searcher.stop_pondering(handles);
        println!();
        let _ = io::stdout().flush();
    }

    fn lz_genmove_analyze(&mut self, color: u8, centis: u64, id: Option<u32>) {
        self.stop_ponder();
        self.emit_header(id);
        let searcher = Arc::clone(&self.searcher);
        let game_ref = &self.game;
        let pos = std::thread::scope(|scope| {
            let handle = scope.spawn(move || searcher.genmove(game_ref, color));
            loop {
                std::thread::sleep(Duration::from_millis(centis * 10));
                if handle.is_finished() {
                    break;
                }
                print!("{}", self.analysis_lines());
                let _ = io::stdout().flush();
            }
            handle.join().unwrap_or(PASS)
        });
        if pos != RESIGN {
            self.game.put_stone(pos, color);
        }
        println!("play {}\n", pos_to_gtp(pos, &self.game.geo));
        let _ = io::stdout().flush();
    }

    fn cgos_genmove_analyze(&mut self, color: u8, id: Option<u32>) {
        self.stop_ponder();
        self.emit_header(id);

        let pos = self.searcher.genmove(&self.game, color);
        if pos != RESIGN {
            self.game.put_stone(pos, color);
        }

        let geo = self.game.geo.clone();
        let rows = self.searcher.root_analysis(8);
        let total_visits: i32 = rows.iter().map(|r| r.visits).sum();
        let winrate = self.searcher.best_winrate();

        let moves_json: Vec<String> = rows
            .iter()
            .take(8)
            .map(|row| {
                let pv: Vec<String> = row.pv.iter().map(|&p| pos_to_gtp(p, &geo)).collect();
                format!(
                    "{{\"move\":\"{}\",\"winrate\":{:.4},\"prior\":{:.4},\"pv\":\"{}\",\"visits\":{}}}",
                    pos_to_gtp(row.pos, &geo),
                    row.winrate,
                    row.prior.clamp(0.0, 1.0),
                    pv.join(" "),
                    row.visits
                )
            })
            .collect();

        // One base-62 digit per intersection.
        const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
        let ownership: String = self
            .searcher
            .owner_rates(color)
            .iter()
            .map(|&o| DIGITS[((o * 61.0) as usize).min(61)] as char)
            .collect();

        println!(
            "{{\"winrate\":{winrate:.4},\"visits\":{total_visits},\"moves\":[{}],\"ownership\":\"{ownership}\",\"comment\":\"tengen {}\"}}",
            moves_json.join(","),
            env!("CARGO_PKG_VERSION")
        );
        println!("play {}\n", pos_to_gtp(pos, &geo));
        let _ = io::stdout().flush();
    }
}

fn parse_id(line: &str) -> (Option<u32>, &str) {
    let trimmed = line.trim();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    if end > 0 {
        if let Ok(id) = trimmed[..end].parse::<u32>() {
            return (Some(id), trimmed[end..].trim_start());
        }
    }
    (None, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GtpEngine {
        let config = EngineConfig {
            size: 9,
            mode: SearchMode::ConstPlayout,
            playout: 100,
            tree_size: 256,
            ..EngineConfig::default()
        };
        GtpEngine::new(config).unwrap()
    }

    fn run(engine: &mut GtpEngine, command: &str, args: &[&str]) -> (bool, String) {
        match engine.execute(command, args, None) {
            Response::Done(ok, msg) => (ok, msg),
            Response::Streamed => panic!("unexpected streamed response"),
        }
    }

    #[test]
    fn parse_id_variants() {
        assert_eq!(parse_id("42 name"), (Some(42), "name"));
        assert_eq!(parse_id("name"), (None, "name"));
    }

    #[test]
    fn protocol_basics() {
        let mut e = engine();
        assert_eq!(run(&mut e, "name", &[]), (true, "tengen".to_string()));
        assert_eq!(run(&mut e, "protocol_version", &[]), (true, "2".to_string()));
        let (ok, msg) = run(&mut e, "known_command", &["genmove"]);
        assert!(ok);
        assert_eq!(msg, "true");
    }

    #[test]
    fn play_and_clear() {
        let mut e = engine();
        let (ok, _) = run(&mut e, "play", &["black", "e5"]);
        assert!(ok);
        let (ok, msg) = run(&mut e, "play", &["white", "e5"]);
        assert!(!ok, "occupied point must be rejected, got {msg}");
        let (ok, _) = run(&mut e, "clear_board", &[]);
        assert!(ok);
        assert_eq!(e.game.moves, 1);
    }

    #[test]
    fn boardsize_rebuilds() {
        let mut e = engine();
        let (ok, _) = run(&mut e, "boardsize", &["13"]);
        assert!(ok);
        assert_eq!(e.game.geo.pure_board_size, 13);
        let (ok, _) = run(&mut e, "boardsize", &["25"]);
        assert!(!ok);
    }

    #[test]
    fn fixed_handicap_places_stars() {
        let mut e = engine();
        let (ok, msg) = run(&mut e, "fixed_handicap", &["4"]);
        assert!(ok);
        assert_eq!(msg.split_whitespace().count(), 4);
        // Stones actually on the board.
        let stones = e
            .game
            .geo
            .onboard_pos
            .iter()
            .filter(|&&p| e.game.board[p] == S_BLACK)
            .count();
        assert_eq!(stones, 4);
    }

    #[test]
    fn genmove_plays_its_own_move() {
        let mut e = engine();
        let (ok, vertex) = run(&mut e, "genmove", &["b"]);
        assert!(ok);
        if vertex != "pass" && vertex != "resign" {
            let pos = gtp_to_pos(&vertex, &e.game.geo).unwrap();
            assert_eq!(e.game.board[pos], S_BLACK);
        }
    }
}
