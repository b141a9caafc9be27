//! Parallel UCT search.
//!
//! Nodes live in a fixed array the size of the transposition table; the
//! table maps (position hash, side to move, ply) to a slot, so transposing
//! lines share work. Each node owns a small mutex serializing child
//! selection; visit/win counters and the per-intersection statistics are
//! atomics, so back-propagation never takes a lock. One process-wide mutex
//! serializes node allocation only.
//!
//! A worker iteration copies the root game, descends by UCB1-TUNED with a
//! rate bonus over the progressively widened child set, adds a virtual loss
//! per edge, runs one biased playout from the leaf, scores it, and folds the
//! result back up with the virtual loss reversed. Thread 0 additionally
//! watches the clock and the interrupt condition and refreshes
//! ownership/criticality every hundred playouts; every thread observes the
//! shared stop flag and the table-occupancy flag.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::Result;
use log::{debug, info};

use crate::board::{GameState, Geometry, eye_tables};
use crate::constants::*;
use crate::dynamic_komi::DynamicKomi;
use crate::ladder;
use crate::nakade::NakadeTable;
use crate::point::pos_to_gtp;
use crate::rating::SimParams;
use crate::seki::check_seki;
use crate::simulation::simulate;
use crate::uct_rating::{self, UctFeatures, UctParams};
use crate::zobrist::NodeHashTable;

/// How a search is budgeted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    ConstPlayout,
    ConstTime,
    TimeSetting,
    TimeSettingWithByoyomi,
}

/// Engine options fixed at startup.
pub struct SearchOptions {
    pub threads: usize,
    pub mode: SearchMode,
    pub playout: usize,
    pub const_thinking_time: f64,
    pub total_time: f64,
    pub reuse_subtree: bool,
    pub pondering: bool,
    pub resign_threshold: f64,
    pub debug: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            threads: 1,
            mode: SearchMode::ConstTime,
            playout: CONST_PLAYOUT,
            const_thinking_time: CONST_TIME,
            total_time: ALL_THINKING_TIME,
            reuse_subtree: false,
            pondering: false,
            resign_threshold: RESIGN_THRESHOLD,
            debug: true,
        }
    }
}

/// Mutable time bookkeeping, adjusted between searches.
struct TimeControl {
    mode: SearchMode,
    playout: usize,
    const_thinking_time: f64,
    remaining_time: [f64; 3],
    time_limit: f64,
    next_playouts: usize,
    extend_time: bool,
}

struct ChildNode {
    pos: AtomicUsize,
    ladder: AtomicBool,
    move_count: AtomicI32,
    win: AtomicI32,
    index: AtomicI32,
    rate: AtomicU64,
    /// In the progressive-widening frontier.
    flag: AtomicBool,
    /// Forced into the frontier regardless of widening.
    open: AtomicBool,
}

impl ChildNode {
    fn empty() -> ChildNode {
        ChildNode {
            pos: AtomicUsize::new(PASS),
            ladder: AtomicBool::new(false),
            move_count: AtomicI32::new(0),
            win: AtomicI32::new(0),
            index: AtomicI32::new(NOT_EXPANDED),
            rate: AtomicU64::new(0f64.to_bits()),
            flag: AtomicBool::new(false),
            open: AtomicBool::new(false),
        }
    }

    fn init(&self, pos: Pos, ladder: bool) {
        self.pos.store(pos, Ordering::Relaxed);
        self.ladder.store(ladder, Ordering::Relaxed);
        self.move_count.store(0, Ordering::Relaxed);
        self.win.store(0, Ordering::Relaxed);
        self.index.store(NOT_EXPANDED, Ordering::Relaxed);
        self.rate.store(0f64.to_bits(), Ordering::Relaxed);
        self.flag.store(false, Ordering::Relaxed);
        self.open.store(false, Ordering::Relaxed);
    }

    #[inline]
    fn pos(&self) -> Pos {
        self.pos.load(Ordering::Relaxed)
    }

    #[inline]
    fn ladder(&self) -> bool {
        self.ladder.load(Ordering::Relaxed)
    }

    #[inline]
    fn visits(&self) -> i32 {
        self.move_count.load(Ordering::Acquire)
    }

    #[inline]
    fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    fn set_rate(&self, rate: f64) {
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    fn winrate(&self) -> f64 {
        let visits = self.visits();
        if visits > 0 {
            self.win.load(Ordering::Acquire) as f64 / visits as f64
        } else {
            0.0
        }
    }
}

struct NodeMeta {
    previous_move1: Pos,
    previous_move2: Pos,
    width: usize,
    child_num: usize,
    seki: Vec<bool>,
}

struct UctNode {
    meta: Mutex<NodeMeta>,
    move_count: AtomicI32,
    win: AtomicI32,
    children: Vec<ChildNode>,
    /// `colors[0]`: winner owned the point; `colors[1..=2]`: per-color owner.
    statistic: Vec<[AtomicI32; 3]>,
}

impl UctNode {
    fn meta(&self) -> MutexGuard<'_, NodeMeta> {
        self.meta.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock_table(table: &Mutex<NodeHashTable>) -> MutexGuard<'_, NodeHashTable> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// One analysis row for the root.
pub struct AnalysisMove {
    pub pos: Pos,
    pub visits: i32,
    pub winrate: f64,
    pub prior: f64,
    pub pv: Vec<Pos>,
}

struct SearchCtx {
    begin: Instant,
    time_limit: f64,
    check_time: bool,
}

pub struct UctSearcher {
    pub geo: Arc<Geometry>,
    pub nakade: NakadeTable,
    pub sim: SimParams,
    pub uct: UctParams,

    nodes: Vec<UctNode>,
    table: Mutex<NodeHashTable>,
    enough_size: AtomicBool,
    expand_mutex: Mutex<()>,

    pw: Vec<i32>,
    expand_threshold: i32,

    stop: AtomicBool,
    po_count: AtomicI32,
    po_halt: AtomicI32,
    current_root: AtomicUsize,
    my_color: AtomicUsize,

    statistic: Vec<[AtomicI32; 3]>,
    criticality: Vec<AtomicU64>,
    criticality_index: Vec<AtomicI32>,
    owner: Vec<AtomicU64>,
    owner_index: Vec<AtomicI32>,
    pub candidates: Vec<AtomicBool>,

    pub dynamic_komi: DynamicKomi,
    time: Mutex<TimeControl>,
    pondered: AtomicBool,

    pub options: SearchOptions,
    seed: u64,
}

impl UctSearcher {
    pub fn new(
        geo: Arc<Geometry>,
        table_size: usize,
        options: SearchOptions,
        sim: SimParams,
        uct: UctParams,
    ) -> Result<UctSearcher> {
        let table = NodeHashTable::new(table_size)?;
        let child_max = geo.pure_board_max + 1;
        let board_max = geo.board_max;

        // Widening thresholds: pw[k] - pw[k-1] = 40 * 1.8^(k-1).
        let mut pw = vec![0i32; geo.pure_board_max + 2];
        for i in 1..pw.len() {
            let step = (40.0 * PROGRESSIVE_WIDENING.powi(i as i32 - 1)) as i64;
            let next = pw[i - 1] as i64 + step;
            if next > 10_000_000 {
                for slot in pw.iter_mut().skip(i) {
                    *slot = i32::MAX;
                }
                break;
            }
            pw[i] = next as i32;
        }

        let expand_threshold = if geo.pure_board_size < 11 {
            EXPAND_THRESHOLD_9
        } else if geo.pure_board_size < 16 {
            EXPAND_THRESHOLD_13
        } else {
            EXPAND_THRESHOLD_19
        };

        let nodes = (0..table_size)
            .map(|_| UctNode {
                meta: Mutex::new(NodeMeta {
                    previous_move1: PASS,
                    previous_move2: PASS,
                    width: 0,
                    child_num: 0,
                    seki: vec![false; board_max],
                }),
                move_count: AtomicI32::new(0),
                win: AtomicI32::new(0),
                children: (0..child_max).map(|_| ChildNode::empty()).collect(),
                statistic: (0..board_max)
                    .map(|_| [AtomicI32::new(0), AtomicI32::new(0), AtomicI32::new(0)])
                    .collect(),
            })
            .collect();

        let nakade = NakadeTable::new(&geo);
        let time = TimeControl {
            mode: options.mode,
            playout: options.playout,
            const_thinking_time: options.const_thinking_time,
            remaining_time: [options.total_time; 3],
            time_limit: 0.0,
            next_playouts: options.playout,
            extend_time: false,
        };

        let searcher = UctSearcher {
            nakade,
            sim,
            uct,
            nodes,
            table: Mutex::new(table),
            enough_size: AtomicBool::new(true),
            expand_mutex: Mutex::new(()),
            pw,
            expand_threshold,
            stop: AtomicBool::new(false),
            po_count: AtomicI32::new(0),
            po_halt: AtomicI32::new(0),
            current_root: AtomicUsize::new(0),
            my_color: AtomicUsize::new(S_BLACK as usize),
            statistic: (0..board_max)
                .map(|_| [AtomicI32::new(0), AtomicI32::new(0), AtomicI32::new(0)])
                .collect(),
            criticality: (0..board_max).map(|_| AtomicU64::new(0f64.to_bits())).collect(),
            criticality_index: (0..board_max).map(|_| AtomicI32::new(0)).collect(),
            owner: (0..board_max).map(|_| AtomicU64::new(50f64.to_bits())).collect(),
            owner_index: (0..board_max).map(|_| AtomicI32::new(5)).collect(),
            candidates: (0..board_max).map(|_| AtomicBool::new(true)).collect(),
            dynamic_komi: DynamicKomi::new(),
            time: Mutex::new(time),
            pondered: AtomicBool::new(false),
            options,
            geo,
            seed: 0x5DEE_CE66
                ^ std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(1),
        };
        searcher.init_search_setting();
        Ok(searcher)
    }

    /// Reset owner/criticality state and compute the first time budget.
    pub fn init_search_setting(&self) {
        for pos in 0..self.geo.board_max {
            self.owner[pos].store(50f64.to_bits(), Ordering::Relaxed);
            self.owner_index[pos].store(5, Ordering::Relaxed);
            self.candidates[pos].store(true, Ordering::Relaxed);
        }
        let mut time = self.time.lock().unwrap();
        time.remaining_time = [self.options.total_time; 3];
        match time.mode {
            SearchMode::ConstPlayout => {
                time.time_limit = 100_000.0;
                time.next_playouts = time.playout;
                time.extend_time = false;
            }
            SearchMode::ConstTime => {
                time.time_limit = time.const_thinking_time;
                time.next_playouts = 100_000_000;
                time.extend_time = false;
            }
            SearchMode::TimeSetting | SearchMode::TimeSettingWithByoyomi => {
                let size = self.geo.pure_board_size;
                time.time_limit = if size < 11 {
                    time.remaining_time[0] / TIME_RATE_9 as f64
                } else if size < 13 {
                    time.remaining_time[0] / (TIME_MAXPLY_13 + TIME_C_13) as f64
                } else {
                    time.remaining_time[0] / (TIME_MAXPLY_19 + TIME_C_19) as f64
                };
                time.next_playouts = (PLAYOUT_SPEED as f64 * time.time_limit) as usize;
                time.extend_time = true;
            }
        }
    }

    /// `time_settings` GTP command.
    pub fn set_time_settings(&self, main_time: f64, byoyomi: f64, stones: usize) {
        {
            let mut time = self.time.lock().unwrap();
            if main_time == 0.0 {
                time.const_thinking_time = byoyomi * 0.85;
                time.mode = SearchMode::ConstTime;
            } else if byoyomi == 0.0 {
                time.mode = SearchMode::TimeSetting;
            } else {
                time.const_thinking_time = byoyomi / stones.max(1) as f64;
                time.mode = SearchMode::TimeSettingWithByoyomi;
            }
        }
        self.init_search_setting();
        let mut time = self.time.lock().unwrap();
        if main_time != 0.0 {
            time.remaining_time = [main_time; 3];
        }
    }

    /// `time_left` GTP command.
    pub fn set_time_left(&self, color: u8, seconds: f64) {
        self.time.lock().unwrap().remaining_time[color as usize] = seconds;
    }

    pub fn clear(&self) {
        lock_table(&self.table).clear();
        self.enough_size.store(true, Ordering::Relaxed);
        self.pondered.store(false, Ordering::Relaxed);
        self.init_search_setting();
    }

    // =========================================================================
    // Search entry points
    // =========================================================================

    /// Generate a move for `color`. `game` is not modified.
    pub fn genmove(&self, game: &GameState, color: u8) -> Pos {
        let begin = Instant::now();
        self.prepare_search(game);

        let Some(root) = self.expand_root(game, color) else {
            return PASS;
        };
        self.current_root.store(root, Ordering::SeqCst);
        let pre_simulated = self.nodes[root].move_count.load(Ordering::Relaxed);
        if self.nodes[root].meta().child_num <= 1 {
            return PASS;
        }

        let (halt, time_limit, extend_allowed) = {
            let time = self.time.lock().unwrap();
            (time.next_playouts, time.time_limit, time.extend_time)
        };
        self.po_halt.store(halt.min(i32::MAX as usize) as i32, Ordering::SeqCst);
        self.my_color.store(color as usize, Ordering::SeqCst);
        self.dynamic_komi.adjust(game, self.root_winrate(root), color);

        debug!("search: time limit {time_limit:.2}s, {halt} playouts, reused {pre_simulated}");

        let ctx = SearchCtx { begin, time_limit, check_time: true };
        self.run_workers(game, color, root, &ctx);

        // Close finishes get half the original budget again.
        if game.moves > self.geo.pure_board_size * 3 - 17
            && extend_allowed
            && self.extend_time_condition(root)
        {
            let halt = (self.po_halt.load(Ordering::SeqCst) as f64 * 1.5) as i32;
            self.po_halt.store(halt, Ordering::SeqCst);
            let ctx = SearchCtx { begin, time_limit: time_limit * 1.5, check_time: true };
            info!("extending thinking time");
            self.run_workers(game, color, root, &ctx);
        }

        let finish_time = begin.elapsed().as_secs_f64();
        let pos = self.select_move(game, root);

        self.calculate_next_playouts(game, color, finish_time);
        if self.options.debug {
            self.log_search_result(root, finish_time, pre_simulated);
        }
        pos
    }

    /// Cleanup-mode move generation: keep playing while dead stones remain.
    pub fn genmove_cleanup(&self, game: &GameState, color: u8) -> Pos {
        let begin = Instant::now();
        self.prepare_search(game);

        let Some(root) = self.expand_root(game, color) else {
            return PASS;
        };
        self.current_root.store(root, Ordering::SeqCst);
        if self.nodes[root].meta().child_num <= 1 {
            return PASS;
        }
        self.my_color.store(color as usize, Ordering::SeqCst);
        let (halt, time_limit) = {
            let time = self.time.lock().unwrap();
            (time.next_playouts, time.time_limit)
        };
        self.po_halt.store(halt.min(i32::MAX as usize) as i32, Ordering::SeqCst);
        let ctx = SearchCtx { begin, time_limit, check_time: true };
        self.run_workers(game, color, root, &ctx);

        let node = &self.nodes[root];
        let count = node.move_count.load(Ordering::Relaxed).max(1);
        let child_num = node.meta().child_num;

        let mut select = PASS_INDEX;
        let mut max_count = node.children[PASS_INDEX].visits();
        for i in 1..child_num {
            let mc = node.children[i].visits();
            if mc > max_count {
                select = i;
                max_count = mc;
            }
        }

        // Keep only contested points as candidates for the next pass.
        let mut contested = 0;
        for &pos in &self.geo.onboard_pos {
            let owned =
                node.statistic[pos][color as usize].load(Ordering::Relaxed) as f64 / count as f64;
            let keep = (0.05..=0.95).contains(&owned);
            self.candidates[pos].store(keep, Ordering::Relaxed);
            if keep {
                contested += 1;
            }
        }

        let child = &node.children[select];
        if contested == 0 || child.winrate() < self.options.resign_threshold {
            return PASS;
        }
        child.pos()
    }

    /// Start pondering on the opponent's clock. Returns worker handles; stop
    /// them with [`UctSearcher::stop_pondering`]. The gathered statistics stay
    /// in the table and are reused when the predicted position arrives.
    pub fn ponder(self: &Arc<Self>, game: &GameState, color: u8) -> Vec<std::thread::JoinHandle<()>> {
        if !self.options.pondering {
            return Vec::new();
        }
        self.background_search(game, color)
    }

    /// Open-ended search (pondering, analysis): workers run until stopped
    /// with [`UctSearcher::stop_pondering`].
    pub fn background_search(
        self: &Arc<Self>,
        game: &GameState,
        color: u8,
    ) -> Vec<std::thread::JoinHandle<()>> {
        self.prepare_search(game);
        let Some(root) = self.expand_root(game, color) else {
            return Vec::new();
        };
        self.current_root.store(root, Ordering::SeqCst);
        if self.nodes[root].meta().child_num <= 1 {
            return Vec::new();
        }
        self.my_color.store(color as usize, Ordering::SeqCst);
        self.stop.store(false, Ordering::SeqCst);
        self.po_halt.store(i32::MAX, Ordering::SeqCst);
        self.pondered.store(true, Ordering::SeqCst);

        let mut handles = Vec::new();
        for tid in 0..self.options.threads {
            let searcher = Arc::clone(self);
            let mut root_game = GameState::new(self.geo.clone());
            root_game.copy_from(game);
            handles.push(std::thread::spawn(move || {
                let ctx = SearchCtx {
                    begin: Instant::now(),
                    time_limit: f64::INFINITY,
                    check_time: false,
                };
                searcher.worker_loop(tid, &root_game, color, root, &ctx);
            }));
        }
        handles
    }

    pub fn stop_pondering(&self, handles: Vec<std::thread::JoinHandle<()>>) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in handles {
            let _ = handle.join();
        }
        debug!(
            "pondering stopped after {} playouts",
            self.po_count.load(Ordering::Relaxed)
        );
    }

    /// Run a fixed-size search for ownership estimation; returns black
    /// points minus white points.
    pub fn analyze(&self, game: &GameState, color: u8) -> i32 {
        self.pondered.store(false, Ordering::SeqCst);
        lock_table(&self.table).clear();
        self.prepare_search(game);
        let Some(root) = self.expand_root(game, color) else {
            return 0;
        };
        self.current_root.store(root, Ordering::SeqCst);
        self.my_color.store(color as usize, Ordering::SeqCst);
        self.po_halt.store(10_000, Ordering::SeqCst);
        let ctx = SearchCtx { begin: Instant::now(), time_limit: f64::INFINITY, check_time: false };
        self.run_workers(game, color, root, &ctx);

        let count = self.po_count.load(Ordering::Relaxed).max(1) as f64;
        let mut black = 0;
        let mut white = 0;
        for &pos in &self.geo.onboard_pos {
            let owned = self.statistic[pos][S_BLACK as usize].load(Ordering::Relaxed) as f64;
            if owned / count > 0.5 {
                black += 1;
            } else {
                white += 1;
            }
        }
        black - white
    }

    /// Ownership of each playable intersection for `color`, in [0, 1], from
    /// the last search's statistics.
    pub fn owner_rates(&self, color: u8) -> Vec<f64> {
        let count = self.po_count.load(Ordering::Relaxed).max(1) as f64;
        self.geo
            .onboard_pos
            .iter()
            .map(|&pos| self.statistic[pos][color as usize].load(Ordering::Relaxed) as f64 / count)
            .collect()
    }

    /// Root statistics for the analysis commands, most visited first.
    pub fn root_analysis(&self, max_pv: usize) -> Vec<AnalysisMove> {
        let root = self.current_root.load(Ordering::SeqCst);
        let node = &self.nodes[root];
        let child_num = node.meta().child_num;
        let mut rows: Vec<AnalysisMove> = (0..child_num)
            .map(|i| {
                let child = &node.children[i];
                AnalysisMove {
                    pos: child.pos(),
                    visits: child.visits(),
                    winrate: child.winrate(),
                    prior: child.rate(),
                    pv: self.principal_variation(root, i, max_pv),
                }
            })
            .filter(|row| row.visits > 0)
            .collect();
        rows.sort_by(|a, b| b.visits.cmp(&a.visits));
        rows
    }

    /// Criticality of an intersection from the last refresh.
    pub fn criticality_at(&self, pos: Pos) -> f64 {
        f64::from_bits(self.criticality[pos].load(Ordering::Relaxed))
    }

    /// Ownership percentage of an intersection from the last refresh.
    pub fn owner_at(&self, pos: Pos) -> f64 {
        f64::from_bits(self.owner[pos].load(Ordering::Relaxed))
    }

    /// Total playouts of the last search.
    pub fn playout_count(&self) -> i32 {
        self.po_count.load(Ordering::Relaxed)
    }

    /// Winrate of the most visited root child.
    pub fn best_winrate(&self) -> f64 {
        let root = self.current_root.load(Ordering::SeqCst);
        let node = &self.nodes[root];
        let child_num = node.meta().child_num;
        let mut best_visits = 0;
        let mut best = 0.0;
        for i in 0..child_num {
            let child = &node.children[i];
            if child.visits() > best_visits {
                best_visits = child.visits();
                best = child.winrate();
            }
        }
        best
    }

    fn principal_variation(&self, root: usize, child_index: usize, depth: usize) -> Vec<Pos> {
        let mut pv = Vec::with_capacity(depth);
        let mut node_index = root;
        let mut child = child_index;
        for _ in 0..depth {
            let node = &self.nodes[node_index];
            let c = &node.children[child];
            pv.push(c.pos());
            let next = c.index.load(Ordering::Acquire);
            if next == NOT_EXPANDED {
                break;
            }
            node_index = next as usize;
            let next_node = &self.nodes[node_index];
            let child_num = next_node.meta().child_num;
            let mut best = 0;
            let mut best_count = 0;
            for i in 0..child_num {
                let mc = next_node.children[i].visits();
                if mc > best_count {
                    best_count = mc;
                    best = i;
                }
            }
            if best_count == 0 {
                break;
            }
            child = best;
        }
        pv
    }

    // =========================================================================
    // Search internals
    // =========================================================================

    fn prepare_search(&self, game: &GameState) {
        if !self.pondered.load(Ordering::SeqCst) {
            for pos in 0..self.geo.board_max {
                for c in 0..3 {
                    self.statistic[pos][c].store(0, Ordering::Relaxed);
                }
                self.criticality[pos].store(0f64.to_bits(), Ordering::Relaxed);
                self.criticality_index[pos].store(0, Ordering::Relaxed);
            }
        }
        self.pondered.store(false, Ordering::SeqCst);
        self.po_count.store(0, Ordering::SeqCst);
        for &pos in &self.geo.onboard_pos {
            self.owner[pos].store(50f64.to_bits(), Ordering::Relaxed);
            self.owner_index[pos].store(5, Ordering::Relaxed);
            self.candidates[pos].store(true, Ordering::Relaxed);
        }
        self.stop.store(false, Ordering::SeqCst);
        self.enough_size.store(true, Ordering::SeqCst);

        let mut table = lock_table(&self.table);
        if self.options.reuse_subtree {
            table.delete_old(game.moves);
        } else {
            table.clear();
        }
    }

    fn run_workers(&self, game: &GameState, color: u8, root: usize, ctx: &SearchCtx) {
        self.stop.store(false, Ordering::SeqCst);
        std::thread::scope(|scope| {
            for tid in 0..self.options.threads {
                let ctx_ref = &*ctx;
                scope.spawn(move || self.worker_loop(tid, game, color, root, ctx_ref));
            }
        });
    }

    fn worker_loop(
        &self,
        tid: usize,
        root_game: &GameState,
        color: u8,
        root: usize,
        ctx: &SearchCtx,
    ) {
        let mut game = GameState::new(self.geo.clone());
        let mut rng =
            fastrand::Rng::with_seed(self.seed ^ (tid as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A));
        let mut seki = vec![false; self.geo.board_max];
        check_seki(root_game, &mut seki);
        let mut interval = CRITICALITY_INTERVAL as i32;

        loop {
            self.po_count.fetch_add(1, Ordering::AcqRel);
            game.copy_from(root_game);
            game.seki.copy_from_slice(&seki);
            let mut winner = S_EMPTY;
            self.uct_search(&mut game, color, &mut rng, root, &mut winner);

            if self.stop.load(Ordering::Acquire) || !self.enough_size.load(Ordering::Acquire) {
                break;
            }
            let count = self.po_count.load(Ordering::Acquire);
            if count >= self.po_halt.load(Ordering::Acquire) {
                break;
            }
            // Thread 0 owns the interrupt and clock duties and the periodic
            // ownership/criticality refresh; everyone else only watches the
            // shared flags.
            if tid == 0 {
                if self.interruption_check(root, ctx) {
                    self.stop.store(true, Ordering::Release);
                    break;
                }
                if ctx.check_time && ctx.begin.elapsed().as_secs_f64() > ctx.time_limit {
                    self.stop.store(true, Ordering::Release);
                    break;
                }
                if count > interval {
                    self.calculate_owner(color, count);
                    self.calculate_criticality(color);
                    interval += CRITICALITY_INTERVAL as i32;
                }
            }
        }
    }

    /// One playout: descend, simulate, propagate. Returns the result from
    /// the parent's perspective.
    fn uct_search(
        &self,
        game: &mut GameState,
        color: u8,
        rng: &mut fastrand::Rng,
        current: usize,
        winner: &mut u8,
    ) -> i32 {
        let node = &self.nodes[current];
        let next_color = flip_color(color);

        let mut meta = node.meta();
        let next_index = self.select_max_ucb_child(node, &mut meta, color);
        let child = &node.children[next_index];
        let child_visits = child.visits();

        // Virtual loss repels other workers from this edge until the real
        // result replaces it.
        node.move_count.fetch_add(VIRTUAL_LOSS, Ordering::AcqRel);
        child.move_count.fetch_add(VIRTUAL_LOSS, Ordering::AcqRel);

        game.put_stone(child.pos(), color);

        let result = if child_visits < self.expand_threshold {
            game.seki.copy_from_slice(&meta.seki);
            drop(meta);
            self.leaf_simulation(game, next_color, rng, winner)
        } else {
            if child.index.load(Ordering::Acquire) == NOT_EXPANDED {
                let _expand = self.expand_mutex.lock().unwrap_or_else(|e| e.into_inner());
                if child.index.load(Ordering::Acquire) == NOT_EXPANDED {
                    match self.expand_node(game, next_color, node, &meta) {
                        Some(index) => child.index.store(index as i32, Ordering::Release),
                        None => self.enough_size.store(false, Ordering::Release),
                    }
                }
            }
            drop(meta);
            let next_node = child.index.load(Ordering::Acquire);
            if next_node == NOT_EXPANDED {
                // Table full: degrade to a playout from here.
                self.leaf_simulation(game, next_color, rng, winner)
            } else {
                self.uct_search(game, next_color, rng, next_node as usize, winner)
            }
        };

        // Fold the result in and take the virtual loss back out.
        node.win.fetch_add(result, Ordering::AcqRel);
        node.move_count.fetch_add(1 - VIRTUAL_LOSS, Ordering::AcqRel);
        child.win.fetch_add(result, Ordering::AcqRel);
        child.move_count.fetch_add(1 - VIRTUAL_LOSS, Ordering::AcqRel);

        self.update_node_statistic(game, *winner, current);

        1 - result
    }

    fn leaf_simulation(
        &self,
        game: &mut GameState,
        color: u8,
        rng: &mut fastrand::Rng,
        winner: &mut u8,
    ) -> i32 {
        simulate(game, color, &self.sim, &self.nakade, rng);
        let score = game.calculate_score() as f64;
        let my_color = self.my_color.load(Ordering::Relaxed);
        let komi = self.dynamic_komi.value(my_color);
        let mut result = 0;
        if score - komi > 0.0 {
            result = i32::from(color != S_BLACK);
            *winner = S_BLACK;
        } else if score - komi < 0.0 {
            result = i32::from(color != S_WHITE);
            *winner = S_WHITE;
        }
        self.record_statistic(game, *winner);
        result
    }

    /// UCB1-TUNED over the widened children, with the rate bonus and FPU.
    fn select_max_ucb_child(&self, node: &UctNode, meta: &mut NodeMeta, color: u8) -> usize {
        let sum = node.move_count.load(Ordering::Acquire);
        let child_num = meta.child_num;

        // Every 128 visits, re-rank by rate + ownership + criticality so the
        // frontier drifts toward what the statistics favor.
        if sum != 0 && (sum & 0x7F) == 0 {
            let c_index = self.node_criticality_index(node, color, child_num);
            let o_index = self.node_owner_index(node, color, child_num);
            let mut order: Vec<(f64, usize)> = (0..child_num)
                .map(|i| {
                    let child = &node.children[i];
                    let dynamic = if child.pos() == PASS {
                        0.0
                    } else {
                        self.uct.owner[o_index[i]] + self.uct.criticality[c_index[i]]
                    };
                    child.flag.store(false, Ordering::Relaxed);
                    (child.rate() + dynamic, i)
                })
                .collect();
            order.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            for &(_, i) in order.iter().take(meta.width.min(child_num)) {
                node.children[i].flag.store(true, Ordering::Relaxed);
            }
        }

        // Progressive widening: admit one more child past the threshold.
        if meta.width < self.pw.len() && sum > self.pw[meta.width] {
            let mut max_index = None;
            let mut max_rate = 0.0;
            for (i, child) in node.children.iter().enumerate().take(child_num) {
                if child.flag.load(Ordering::Relaxed) {
                    continue;
                }
                let pos = child.pos();
                let dynamic = if pos == PASS {
                    0.0
                } else {
                    self.uct.owner[self.owner_index[pos].load(Ordering::Relaxed) as usize]
                        + self.uct.criticality
                            [self.criticality_index[pos].load(Ordering::Relaxed) as usize]
                };
                if child.rate() + dynamic > max_rate {
                    max_rate = child.rate() + dynamic;
                    max_index = Some(i);
                }
            }
            if let Some(i) = max_index {
                node.children[i].flag.store(true, Ordering::Relaxed);
            }
            meta.width += 1;
        }

        let ucb_bonus_weight =
            BONUS_WEIGHT * (BONUS_EQUIVALENCE / (sum as f64 + BONUS_EQUIVALENCE)).sqrt();
        let mut max_value = f64::NEG_INFINITY;
        let mut max_child = 0;
        for (i, child) in node.children.iter().enumerate().take(child_num) {
            if !(child.flag.load(Ordering::Relaxed) || child.open.load(Ordering::Relaxed)) {
                continue;
            }
            let visits = child.visits();
            let ucb = if visits == 0 {
                FPU
            } else {
                let p = child.win.load(Ordering::Acquire) as f64 / visits as f64;
                let div = (sum.max(1) as f64).ln() / visits as f64;
                let v = p - p * p + (2.0 * div).sqrt();
                p + (div * v.min(0.25)).sqrt() + ucb_bonus_weight * child.rate()
            };
            if ucb > max_value {
                max_value = ucb;
                max_child = i;
            }
        }
        max_child
    }

    /// Expand the root, reusing a transposed node when the table has one.
    fn expand_root(&self, game: &GameState, color: u8) -> Option<usize> {
        let geo = &self.geo;
        let pm1 = game.previous_move();
        let pm2 = game.previous_move2();

        let mut ladder = vec![false; geo.board_max];
        if geo.pure_board_size != 9 {
            ladder::ladder_extension(game, color, &mut ladder);
        }

        let mut table = lock_table(&self.table);
        if let Some(index) = table.find_same_index(game.current_hash, color, game.moves) {
            drop(table);
            let node = &self.nodes[index];
            let mut meta = node.meta();
            if meta.previous_move1 != pm1 || meta.previous_move2 != pm2 {
                debug!("reused root was reached through a different move order");
            }
            meta.previous_move1 = pm1;
            meta.previous_move2 = pm2;
            for i in 0..meta.child_num {
                let child = &node.children[i];
                child.set_rate(0.0);
                child.flag.store(false, Ordering::Relaxed);
                child.open.store(false, Ordering::Relaxed);
                if ladder[child.pos()] {
                    // A hopeless escape keeps no credit from the reuse.
                    node.move_count.fetch_sub(child.visits(), Ordering::AcqRel);
                    node.win.fetch_sub(child.win.load(Ordering::Relaxed), Ordering::AcqRel);
                    child.move_count.store(0, Ordering::Relaxed);
                    child.win.store(0, Ordering::Relaxed);
                }
                child.ladder.store(ladder[child.pos()], Ordering::Relaxed);
            }
            meta.width = 1;
            let child_num = meta.child_num;
            drop(meta);
            self.rating_node(game, color, index, child_num);
            debug!(
                "reusing subtree with {} playouts",
                self.nodes[index].move_count.load(Ordering::Relaxed)
            );
            return Some(index);
        }

        let index = table.claim_empty_index(game.current_hash, color, game.moves)?;
        if !table.enough_size() {
            self.enough_size.store(false, Ordering::Relaxed);
        }
        drop(table);

        let node = &self.nodes[index];
        let mut meta = node.meta();
        meta.previous_move1 = pm1;
        meta.previous_move2 = pm2;
        node.move_count.store(0, Ordering::Relaxed);
        node.win.store(0, Ordering::Relaxed);
        for stat in node.statistic.iter() {
            for c in stat {
                c.store(0, Ordering::Relaxed);
            }
        }
        meta.seki.iter_mut().for_each(|s| *s = false);

        let mut child_num = 0;
        node.children[PASS_INDEX].init(PASS, ladder[PASS]);
        child_num += 1;

        // The opening move searches one symmetric wedge only.
        let candidates: &[Pos] =
            if game.moves == 1 { &geo.first_move_candidate } else { &geo.onboard_pos };
        for &pos in candidates {
            if self.candidates[pos].load(Ordering::Relaxed) && game.is_legal(pos, color) {
                node.children[child_num].init(pos, ladder[pos]);
                child_num += 1;
            }
        }
        meta.child_num = child_num;
        check_seki(game, &mut meta.seki);
        meta.width = 1;
        drop(meta);

        self.rating_node(game, color, index, child_num);
        Some(index)
    }

    /// Expand an interior node, folding into a transposition when one
    /// exists. The caller holds the expansion mutex and the parent's meta
    /// lock.
    fn expand_node(
        &self,
        game: &GameState,
        color: u8,
        parent: &UctNode,
        parent_meta: &NodeMeta,
    ) -> Option<usize> {
        let geo = &self.geo;
        let mut table = lock_table(&self.table);
        if let Some(index) = table.find_same_index(game.current_hash, color, game.moves) {
            return Some(index);
        }
        let index = table.claim_empty_index(game.current_hash, color, game.moves)?;
        if !table.enough_size() {
            self.enough_size.store(false, Ordering::Relaxed);
        }
        drop(table);

        let node = &self.nodes[index];
        let mut meta = node.meta();
        meta.previous_move1 = game.previous_move();
        meta.previous_move2 = game.previous_move2();
        node.move_count.store(0, Ordering::Relaxed);
        node.win.store(0, Ordering::Relaxed);
        for stat in node.statistic.iter() {
            for c in stat {
                c.store(0, Ordering::Relaxed);
            }
        }
        meta.seki.iter_mut().for_each(|s| *s = false);

        let mut child_num = 0;
        node.children[PASS_INDEX].init(PASS, false);
        child_num += 1;
        for &pos in &geo.onboard_pos {
            if self.candidates[pos].load(Ordering::Relaxed) && game.is_legal(pos, color) {
                node.children[child_num].init(pos, false);
                child_num += 1;
            }
        }
        meta.child_num = child_num;
        check_seki(game, &mut meta.seki);
        meta.width = 1;
        drop(meta);

        self.rating_node(game, color, index, child_num);

        // Guarantee forward progress: pre-open the move the parent rated
        // best among the new node's children.
        let pm1 = game.previous_move();
        let mut max_rate = 0.0;
        let mut max_pos = PASS;
        for i in 0..parent_meta.child_num {
            let sibling = &parent.children[i];
            if sibling.pos() != pm1 && sibling.rate() > max_rate {
                max_rate = sibling.rate();
                max_pos = sibling.pos();
            }
        }
        let meta = node.meta();
        for i in 0..meta.child_num {
            let child = &node.children[i];
            if child.pos() == max_pos {
                if !child.flag.load(Ordering::Relaxed) {
                    child.open.store(true, Ordering::Relaxed);
                }
                break;
            }
        }
        drop(meta);

        Some(index)
    }

    /// Prior-rate every child of `index` and flag the best one.
    fn rating_node(&self, game: &GameState, color: u8, index: usize, child_num: usize) {
        let node = &self.nodes[index];
        let mut features = UctFeatures::new(self.geo.board_max);

        uct_rating::check_features(game, color, &mut features);
        uct_rating::check_remove2_stones(game, color, &mut features);
        uct_rating::check_remove3_stones(game, color, &self.nakade, &mut features);
        if game.ko_move != 0 && game.ko_move == game.moves - 2 {
            uct_rating::check_capture_after_ko(game, color, &mut features);
            uct_rating::check_ko_connection(game, &mut features);
        }

        let none = [None; 3];
        let pass_rate = uct_rating::lfr_score(game, PASS, &none, &features, &self.uct);
        node.children[PASS_INDEX].set_rate(pass_rate);

        let mut max_index = PASS_INDEX;
        let mut max_score = pass_rate;
        for i in 1..child_num {
            let child = &node.children[i];
            let pos = child.pos();

            let self_atari_ok =
                uct_rating::check_self_atari(game, color, pos, &self.nakade, &mut features);
            uct_rating::check_snapback(game, color, pos, &mut features);
            if !uct_rating::has_capture_feature(&features, pos) {
                uct_rating::check_capture(game, color, pos, &mut features);
            }
            if !uct_rating::has_atari_feature(&features, pos) {
                uct_rating::check_atari(game, color, pos, &mut features);
            }
            uct_rating::check_double_keima(game, color, pos, &mut features);
            uct_rating::check_keima_tsukekoshi(game, color, pos, &mut features);

            let score = if !self_atari_ok {
                0.0
            } else if child.ladder() {
                -1.0
            } else {
                let pat_index = uct_rating::large_pattern_indices(game, pos, &self.uct);
                uct_rating::lfr_score(game, pos, &pat_index, &features, &self.uct)
            };
            child.set_rate(score);

            let dynamic = self.uct.owner[self.owner_index[pos].load(Ordering::Relaxed) as usize]
                + self.uct.criticality
                    [self.criticality_index[pos].load(Ordering::Relaxed) as usize];
            if score + dynamic > max_score {
                max_index = i;
                max_score = score + dynamic;
            }
        }
        node.children[max_index].flag.store(true, Ordering::Relaxed);
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    fn record_statistic(&self, game: &GameState, winner: u8) {
        let tables = eye_tables();
        for &pos in &self.geo.onboard_pos {
            let mut color = game.board[pos];
            if color == S_EMPTY {
                color = tables.territory[game.pat.pat3(pos) as usize];
            }
            self.statistic[pos][(color & 0x3) as usize].fetch_add(1, Ordering::AcqRel);
            if color == winner {
                self.statistic[pos][0].fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    fn update_node_statistic(&self, game: &GameState, winner: u8, current: usize) {
        let tables = eye_tables();
        let node = &self.nodes[current];
        for &pos in &self.geo.onboard_pos {
            let mut color = game.board[pos];
            if color == S_EMPTY {
                color = tables.territory[game.pat.pat3(pos) as usize];
            }
            node.statistic[pos][(color & 0x3) as usize].fetch_add(1, Ordering::AcqRel);
            if color == winner {
                node.statistic[pos][0].fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    fn node_criticality_index(&self, node: &UctNode, color: u8, child_num: usize) -> Vec<usize> {
        let count = node.move_count.load(Ordering::Relaxed).max(1) as f64;
        let win = node.win.load(Ordering::Relaxed) as f64 / count;
        let lose = 1.0 - win;
        let other = flip_color(color) as usize;
        let mut index = vec![0; child_num];
        for (i, slot) in index.iter_mut().enumerate().skip(1) {
            let pos = node.children[i].pos();
            let winner_share = node.statistic[pos][0].load(Ordering::Relaxed) as f64 / count;
            let own = node.statistic[pos][color as usize].load(Ordering::Relaxed) as f64 / count;
            let opp = node.statistic[pos][other].load(Ordering::Relaxed) as f64 / count;
            let tmp = (winner_share - (own * win + opp * lose)).max(0.0);
            *slot = ((tmp * 40.0) as usize).min(CRITICALITY_MAX - 1);
        }
        index
    }

    fn node_owner_index(&self, node: &UctNode, color: u8, child_num: usize) -> Vec<usize> {
        let count = node.move_count.load(Ordering::Relaxed).max(1) as f64;
        let mut index = vec![0; child_num];
        for (i, slot) in index.iter_mut().enumerate().skip(1) {
            let pos = node.children[i].pos();
            let own = node.statistic[pos][color as usize].load(Ordering::Relaxed) as f64;
            *slot = ((own * 10.0 / count + 0.5) as usize).min(OWNER_MAX - 1);
        }
        index
    }

    fn calculate_criticality(&self, color: u8) {
        let root = self.current_root.load(Ordering::SeqCst);
        let node = &self.nodes[root];
        let count = self.po_count.load(Ordering::Relaxed).max(1) as f64;
        let win = node.win.load(Ordering::Relaxed) as f64
            / node.move_count.load(Ordering::Relaxed).max(1) as f64;
        let lose = 1.0 - win;
        let other = flip_color(color) as usize;

        for &pos in &self.geo.onboard_pos {
            let winner_share = self.statistic[pos][0].load(Ordering::Relaxed) as f64 / count;
            let own = self.statistic[pos][color as usize].load(Ordering::Relaxed) as f64 / count;
            let opp = self.statistic[pos][other].load(Ordering::Relaxed) as f64 / count;
            let tmp = winner_share - (own * win + opp * lose);
            self.criticality[pos].store(tmp.to_bits(), Ordering::Relaxed);
            let idx = ((tmp.max(0.0) * 40.0) as usize).min(CRITICALITY_MAX - 1);
            self.criticality_index[pos].store(idx as i32, Ordering::Relaxed);
        }
    }

    fn calculate_owner(&self, color: u8, count: i32) {
        for &pos in &self.geo.onboard_pos {
            let own = self.statistic[pos][color as usize].load(Ordering::Relaxed) as f64;
            let idx = ((own * 10.0 / count.max(1) as f64 + 0.5) as usize).min(OWNER_MAX - 1);
            self.owner_index[pos].store(idx as i32, Ordering::Relaxed);
            self.owner[pos]
                .store((own * 100.0 / count.max(1) as f64).to_bits(), Ordering::Relaxed);
        }
    }

    // =========================================================================
    // Stopping rules and move selection
    // =========================================================================

    /// The outcome is settled once the runner-up can no longer catch up.
    /// Only meaningful after a tenth of the budget.
    fn interruption_check(&self, root: usize, ctx: &SearchCtx) -> bool {
        if ctx.check_time && ctx.begin.elapsed().as_secs_f64() * 10.0 < ctx.time_limit {
            return false;
        }
        let node = &self.nodes[root];
        let child_num = node.meta().child_num;
        let rest = self.po_halt.load(Ordering::Relaxed) - self.po_count.load(Ordering::Relaxed);
        let mut max = 0;
        let mut second = 0;
        for i in 0..child_num {
            let count = node.children[i].visits();
            if count > max {
                second = max;
                max = count;
            } else if count > second {
                second = count;
            }
        }
        max - second > rest
    }

    /// Extend when the leader is within 20% of the runner-up.
    fn extend_time_condition(&self, root: usize) -> bool {
        let node = &self.nodes[root];
        let child_num = node.meta().child_num;
        let mut max = 0;
        let mut second = 0;
        for i in 0..child_num {
            let count = node.children[i].visits();
            if count > max {
                second = max;
                max = count;
            } else if count > second {
                second = count;
            }
        }
        (max as f64) < second as f64 * 1.2
    }

    fn root_winrate(&self, root: usize) -> f64 {
        let node = &self.nodes[root];
        let count = node.move_count.load(Ordering::Relaxed);
        if count > 0 {
            node.win.load(Ordering::Relaxed) as f64 / count as f64
        } else {
            0.5
        }
    }

    /// Pick the most-visited child, then apply the pass and resign rules.
    fn select_move(&self, game: &GameState, root: usize) -> Pos {
        let node = &self.nodes[root];
        let child_num = node.meta().child_num;

        let mut select = PASS_INDEX;
        let mut max_count = node.children[PASS_INDEX].visits();
        for i in 1..child_num {
            let count = node.children[i].visits();
            if count > max_count {
                select = i;
                max_count = count;
            }
        }

        let pass_wp = node.children[PASS_INDEX].winrate();
        let best = &node.children[select];
        let best_wp = best.winrate();

        if pass_wp >= PASS_THRESHOLD && game.previous_move() == PASS {
            PASS
        } else if game.moves >= self.geo.max_moves {
            PASS
        } else if game.moves > 3
            && game.record[game.moves - 1].pos == PASS
            && game.record[game.moves - 3].pos == PASS
        {
            PASS
        } else if best_wp <= self.options.resign_threshold {
            RESIGN
        } else {
            best.pos()
        }
    }

    fn calculate_next_playouts(&self, game: &GameState, color: u8, finish_time: f64) {
        let count = self.po_count.load(Ordering::Relaxed) as f64;
        let best_wp = self.best_winrate();
        let mut time = self.time.lock().unwrap();
        let po_per_sec = if finish_time > 0.0 {
            count / finish_time
        } else {
            (PLAYOUT_SPEED * self.options.threads) as f64
        };
        match time.mode {
            SearchMode::ConstPlayout => {}
            SearchMode::ConstTime => {
                let scale = if best_wp > 0.90 { 0.5 } else { 1.0 };
                time.next_playouts = (po_per_sec * time.const_thinking_time * scale) as usize;
            }
            SearchMode::TimeSetting | SearchMode::TimeSettingWithByoyomi => {
                time.remaining_time[color as usize] -= finish_time;
                let size = self.geo.pure_board_size;
                let remaining = time.remaining_time[color as usize];
                time.time_limit = if size < 11 {
                    remaining / TIME_RATE_9 as f64
                } else if size < 16 {
                    remaining / (TIME_C_13 + TIME_MAXPLY_13.saturating_sub(game.moves + 1)) as f64
                } else {
                    remaining / (TIME_C_19 + TIME_MAXPLY_19.saturating_sub(game.moves + 1)) as f64
                };
                if time.mode == SearchMode::TimeSettingWithByoyomi
                    && time.time_limit < time.const_thinking_time * 0.5
                {
                    time.time_limit = time.const_thinking_time * 0.5;
                }
                time.next_playouts = (po_per_sec * time.time_limit) as usize;
            }
        }
    }

    fn log_search_result(&self, root: usize, finish_time: f64, pre_simulated: i32) {
        let node = &self.nodes[root];
        let count = self.po_count.load(Ordering::Relaxed);
        let move_count = node.move_count.load(Ordering::Relaxed).max(1);
        let winrate = node.win.load(Ordering::Relaxed) as f64 / move_count as f64;
        info!(
            "{count} playouts in {finish_time:.2}s ({:.0}/s), winrate {winrate:.3}, reused {pre_simulated}",
            count as f64 / finish_time.max(1e-9)
        );
        for row in self.root_analysis(5).into_iter().take(5) {
            debug!(
                "  {:>4} {:>6} visits, winrate {:.3}, prior {:.3}",
                pos_to_gtp(row.pos, &self.geo),
                row.visits,
                row.winrate,
                row.prior
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn searcher(size: usize, playout: usize, threads: usize) -> (UctSearcher, GameState) {
        let geo = Geometry::new(size);
        let options = SearchOptions {
            threads,
            mode: SearchMode::ConstPlayout,
            playout,
            ..SearchOptions::default()
        };
        let searcher = UctSearcher::new(
            geo.clone(),
            1024,
            options,
            SimParams::neutral(),
            UctParams::neutral(),
        )
        .unwrap();
        (searcher, GameState::new(geo))
    }

    #[test]
    fn genmove_returns_legal_move() {
        let (searcher, game) = searcher(9, 300, 1);
        let pos = searcher.genmove(&game, S_BLACK);
        assert!(pos != RESIGN);
        if pos != PASS {
            assert!(game.is_legal(pos, S_BLACK));
        }
    }

    #[test]
    fn first_move_stays_in_candidate_wedge() {
        let (searcher, game) = searcher(9, 1000, 1);
        let pos = searcher.genmove(&game, S_BLACK);
        // On the opening move, any stone played must come from the wedge.
        assert!(pos == PASS || searcher.geo.first_move_candidate.contains(&pos));
        for row in searcher.root_analysis(1) {
            assert!(
                row.pos == PASS || searcher.geo.first_move_candidate.contains(&row.pos),
                "visited a move outside the opening wedge"
            );
        }
    }

    #[test]
    fn no_virtual_loss_leaks() {
        let (searcher, game) = searcher(9, 200, 2);
        searcher.genmove(&game, S_BLACK);
        let root = searcher.current_root.load(Ordering::SeqCst);
        let node = &searcher.nodes[root];
        let total = node.move_count.load(Ordering::Relaxed);
        let sum: i32 = {
            let child_num = node.meta().child_num;
            (0..child_num).map(|i| node.children[i].visits()).sum()
        };
        assert_eq!(total, sum, "node total must equal the sum over children");
        assert_eq!(
            total,
            searcher.playout_count(),
            "every playout must appear exactly once at the root"
        );
        assert!(total > 0);
    }

    #[test]
    fn descent_only_visits_widened_children() {
        // Below 128 root visits the frontier never re-sorts, so the flags
        // seen afterwards are exactly the ones selection used.
        let (searcher, game) = searcher(9, 100, 1);
        searcher.genmove(&game, S_BLACK);
        let root = searcher.current_root.load(Ordering::SeqCst);
        let node = &searcher.nodes[root];
        let child_num = node.meta().child_num;
        for i in 0..child_num {
            let child = &node.children[i];
            if child.visits() > 0 {
                assert!(
                    child.flag.load(Ordering::Relaxed) || child.open.load(Ordering::Relaxed),
                    "visited child must be in the frontier"
                );
            }
        }
    }

    #[test]
    fn mcts_converges_on_the_decisive_capture() {
        // A five-stone white string sits in atari. Capturing it wins the
        // game outright; letting it out loses the surrounding black wall's
        // shape. The search must converge on the capture.
        let (searcher, mut game) = searcher(9, 5000, 1);
        let geo = game.geo.clone();
        for x in 6..=10 {
            game.put_stone(geo.pos(x, 6), S_WHITE);
            game.put_stone(geo.pos(x, 5), S_BLACK);
            game.put_stone(geo.pos(x, 7), S_BLACK);
        }
        game.put_stone(geo.pos(5, 6), S_BLACK);
        let id = game.string_id[geo.pos(6, 6)];
        assert_eq!(game.string[id].libs, 1);
        let capture = game.string[id].lib_head();
        assert_eq!(capture, geo.pos(11, 6));

        let pos = searcher.genmove(&game, S_BLACK);
        assert_eq!(
            pos,
            capture,
            "expected the capture at {}, got {}",
            pos_to_gtp(capture, &geo),
            pos_to_gtp(pos, &geo)
        );
    }
}
