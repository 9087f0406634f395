#![forbid(unsafe_code)]

//! The per-tick render pipeline.
//!
//! Each call to [`RenderPipeline::render`] turns a [`Snapshot`] into bytes
//! on the output:
//!
//! 1. derive a [`DashboardModel`] from the snapshot and the UI state
//! 2. allocate panel rectangles for the terminal size
//! 3. build, measure and render the dashboard tree into a fresh buffer
//! 4. diff against the previous buffer (or repaint everything)
//! 5. encode the ops and hand them to the [`OutputWriter`]
//!
//! A pass whose inputs are unchanged (same snapshot sequence, same size,
//! no pending dirt) is skipped. Passes are serialized by one mutex.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dterm_core::{Point, Size};
use dterm_layout::{LayoutManager, PanelType};
use dterm_render::{DiffStats, FrameDiffer, PresentStats, Presenter, TerminalBuffer};
use dterm_text::{SharedWidthCache, WidthCache};
use dterm_widgets::{
    ActivityRowModel, BalanceRowModel, Dashboard, DashboardModel, DirtyReason, PanelCaches,
    PriceRowModel, Renderable, RowContext, StatusModel, SwapRowModel, TextMetrics,
};
use tracing::{debug, debug_span, warn};

use crate::command::Command;
use crate::config::RenderConfig;
use crate::snapshot::{Snapshot, TransactionKind};
use crate::writer::{OutputWriter, WriterMode};

/// Title shown in the header.
pub const DEFAULT_TITLE: &str = "dterm";

/// Panels that can be shown, in focus order.
pub const PANELS: [PanelType; 6] = [
    PanelType::Status,
    PanelType::Balances,
    PanelType::Activity,
    PanelType::Price,
    PanelType::Swap,
    PanelType::Logs,
];

/// UI state changed by commands between passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub visible: BTreeSet<PanelType>,
    pub focused: Option<PanelType>,
    /// Keep showing the data of the last unpaused pass.
    pub paused: bool,
    pub show_help: bool,
    pub start_requested: bool,
    dirty: DirtyReason,
    full_repaint: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            visible: PANELS.into_iter().collect(),
            focused: None,
            paused: false,
            show_help: false,
            start_requested: false,
            dirty: DirtyReason::empty(),
            full_repaint: false,
        }
    }
}

impl DashboardState {
    /// Apply `command`. `Break` means the caller should stop.
    pub fn apply_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Pause => {
                self.paused = true;
                self.dirty |= DirtyReason::STATE;
            }
            Command::Resume => {
                self.paused = false;
                self.dirty |= DirtyReason::STATE;
            }
            Command::Logs => {
                if !self.visible.remove(&PanelType::Logs) {
                    self.visible.insert(PanelType::Logs);
                } else if self.focused == Some(PanelType::Logs) {
                    self.focused = None;
                }
                self.dirty |= DirtyReason::VISIBILITY | DirtyReason::LAYOUT;
            }
            Command::Start => {
                self.start_requested = true;
                self.dirty |= DirtyReason::STATE;
            }
            Command::Help => {
                self.show_help = !self.show_help;
                self.dirty |= DirtyReason::STATE;
            }
            Command::Refresh => {
                self.full_repaint = true;
                self.dirty |= DirtyReason::ENV;
            }
            Command::FocusNext => {
                self.focused = self.next_focus();
                self.dirty |= DirtyReason::FOCUS;
            }
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Reasons accumulated since the last pass.
    #[must_use]
    pub fn pending(&self) -> DirtyReason {
        self.dirty
    }

    fn next_focus(&self) -> Option<PanelType> {
        let mut order = PANELS.iter().copied().filter(|p| self.visible.contains(p));
        match self.focused {
            None => order.next(),
            Some(current) => {
                let rest: Vec<PanelType> = order.collect();
                let at = rest.iter().position(|p| *p == current);
                match at {
                    Some(i) if i + 1 < rest.len() => Some(rest[i + 1]),
                    _ => rest.first().copied(),
                }
            }
        }
    }

    fn take(&mut self) -> (DirtyReason, bool) {
        (
            std::mem::replace(&mut self.dirty, DirtyReason::empty()),
            std::mem::take(&mut self.full_repaint),
        )
    }
}

/// What one pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub tick: u64,
    /// Nothing changed; no frame was produced.
    pub skipped: bool,
    pub full_repaint: bool,
    /// Why this pass ran. Empty for a skipped pass.
    pub reasons: DirtyReason,
    pub panels: usize,
    pub diff: DiffStats,
    pub present: PresentStats,
    /// Bytes handed to the writer.
    pub bytes: usize,
    pub mode: Option<WriterMode>,
}

#[derive(Debug)]
struct PipelineState<W: Write> {
    previous: Option<TerminalBuffer>,
    writer: OutputWriter<W>,
    differ: FrameDiffer,
    presenter: Presenter<io::Sink>,
    layout: LayoutManager,
    scratch: Vec<u8>,
    tick: u64,
    last_size: Option<Size>,
    last_sequence: Option<u64>,
    /// Prices of the snapshot before the current one.
    prev_prices: BTreeMap<String, f64>,
    cur_prices: BTreeMap<String, f64>,
    /// Model of the last unpaused pass.
    held: Option<DashboardModel>,
    pending: DirtyReason,
    force_full: bool,
}

/// Owns everything that persists between passes.
#[derive(Debug)]
pub struct RenderPipeline<W: Write> {
    state: Mutex<PipelineState<W>>,
    caches: PanelCaches,
    width_cache: SharedWidthCache,
    config: RenderConfig,
    title: String,
}

impl RenderPipeline<io::Stdout> {
    /// Pipeline writing to stdout, configured from the environment.
    #[must_use]
    pub fn stdout(config: RenderConfig) -> Self {
        let writer = OutputWriter::new(io::stdout(), config.fallback_log.clone());
        Self::new(writer, config)
    }
}

impl<W: Write> RenderPipeline<W> {
    pub fn new(writer: OutputWriter<W>, config: RenderConfig) -> Self {
        let state = PipelineState {
            previous: None,
            writer,
            differ: FrameDiffer::new(config.diff),
            presenter: Presenter::new(io::sink(), config.env),
            layout: LayoutManager::new(config.layout),
            scratch: Vec::with_capacity(16 * 1024),
            tick: 0,
            last_size: None,
            last_sequence: None,
            prev_prices: BTreeMap::new(),
            cur_prices: BTreeMap::new(),
            held: None,
            pending: DirtyReason::empty(),
            force_full: false,
        };
        Self {
            state: Mutex::new(state),
            caches: PanelCaches::new(),
            width_cache: SharedWidthCache::new(WidthCache::DEFAULT_CAPACITY),
            config,
            title: DEFAULT_TITLE.to_owned(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn caches(&self) -> &PanelCaches {
        &self.caches
    }

    #[must_use]
    pub fn width_cache(&self) -> &SharedWidthCache {
        &self.width_cache
    }

    /// Redraw everything on the next pass.
    pub fn request_full_repaint(&self) {
        let mut st = self.lock();
        st.force_full = true;
        st.pending |= DirtyReason::ENV;
    }

    /// The terminal changed size; the next pass relayouts and repaints.
    pub fn on_resize(&self, size: Size) {
        let mut st = self.lock();
        if st.last_size != Some(size) {
            debug!(width = size.width, height = size.height, "resize");
        }
        st.pending |= DirtyReason::LAYOUT | DirtyReason::ENV;
        st.force_full = true;
    }

    #[must_use]
    pub fn writer_mode(&self) -> WriterMode {
        self.lock().writer.mode()
    }

    /// Run `f` against the output writer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut OutputWriter<W>) -> R) -> R {
        f(&mut self.lock().writer)
    }

    /// Plain text of the last rendered frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<Vec<String>> {
        self.lock().previous.as_ref().map(TerminalBuffer::to_plain_lines)
    }

    /// Render one pass.
    pub fn render(&self, snapshot: &Snapshot, ui: &mut DashboardState, size: Size) -> FrameReport {
        let mut guard = self.lock();
        let st = &mut *guard;
        st.tick += 1;
        let _span = debug_span!("render", tick = st.tick, seq = snapshot.sequence).entered();

        let (ui_dirty, ui_full) = ui.take();
        let mut reasons = std::mem::replace(&mut st.pending, DirtyReason::empty()) | ui_dirty;
        st.writer.poll();
        let mut force = std::mem::take(&mut st.force_full)
            || ui_full
            || st.writer.take_force_full_repaint()
            || st.previous.is_none();
        if st.last_size != Some(size) {
            reasons |= DirtyReason::LAYOUT;
            force |= st.last_size.is_some_and(|old| old.height != size.height);
        }
        let new_data = st.last_sequence != Some(snapshot.sequence);
        if new_data {
            reasons |= DirtyReason::STATE;
        }
        if reasons.is_empty() && !force {
            return FrameReport {
                tick: st.tick,
                skipped: true,
                mode: Some(st.writer.mode()),
                ..FrameReport::default()
            };
        }

        if new_data {
            st.prev_prices = std::mem::replace(&mut st.cur_prices, snapshot.prices.clone());
            st.last_sequence = Some(snapshot.sequence);
        }
        let held = if ui.paused { st.held.clone() } else { None };
        let mut model = match held {
            Some(held) => held,
            None => {
                let model = self.build_model(snapshot, &st.prev_prices);
                st.held = Some(model.clone());
                model
            }
        };
        model.status.paused = ui.paused;
        model.status.show_help = ui.show_help;
        model.status.start_requested = ui.start_requested;

        let layouts = st.layout.calculate_layout(size, Some(&ui.visible));
        let ctx = RowContext::new(
            TextMetrics::with_cache(self.config.env, self.width_cache.clone()),
            self.config.glyphs,
        );
        let mut dashboard = Dashboard::build(
            &model,
            &layouts,
            &self.caches,
            &ctx,
            ui.focused,
            self.config.layout.header_height,
        );
        dashboard.measure(size);
        let mut buffer = TerminalBuffer::with_env(size, self.config.env);
        dashboard.render(&mut buffer, Point::ZERO);

        let previous = if force { None } else { st.previous.as_ref() };
        let ops = st.differ.diff(previous, &buffer);
        let diff = st.differ.last_stats();

        let mut bytes = std::mem::take(&mut st.scratch);
        bytes.clear();
        if force {
            st.presenter.invalidate();
        }
        let present = match st.presenter.encode(&ops, &mut bytes) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "frame encoding failed");
                st.presenter.invalidate();
                st.force_full = true;
                bytes.clear();
                PresentStats::default()
            }
        };
        let mode = st.writer.write_frame(&bytes);
        let report = FrameReport {
            tick: st.tick,
            skipped: false,
            full_repaint: force,
            reasons,
            panels: dashboard.panels().count(),
            diff,
            present,
            bytes: bytes.len(),
            mode: Some(mode),
        };
        st.scratch = bytes;
        st.previous = Some(buffer);
        st.last_size = Some(size);

        if self.config.debug_cache {
            self.log_cache_stats();
        }
        report
    }

    fn log_cache_stats(&self) {
        for (panel, stats) in self.caches.stats() {
            debug!(
                panel = %panel,
                entries = stats.entries,
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = stats.hit_rate(),
                "row cache"
            );
        }
        self.caches.reset_stats();
        let width = self.width_cache.stats();
        debug!(
            size = width.size,
            hits = width.hits,
            misses = width.misses,
            fast_path = width.fast_path,
            hit_rate = width.hit_rate(),
            "width cache"
        );
    }

    fn build_model(&self, snapshot: &Snapshot, prev_prices: &BTreeMap<String, f64>) -> DashboardModel {
        let auto = &snapshot.automation;
        let balances = snapshot
            .holdings
            .iter()
            .map(|h| BalanceRowModel {
                id: format!("{}@{}", h.asset, h.exchange),
                asset: h.asset.clone(),
                available: h.available,
                pending: h.pending,
                staked: h.staked,
                value: snapshot.prices.get(&h.asset).map(|p| p * h.total()),
                exchange: h.exchange.clone(),
            })
            .collect();
        let activity = snapshot
            .transactions
            .iter()
            .map(|t| ActivityRowModel {
                id: t.id.clone(),
                timestamp: t.timestamp,
                kind: t.kind.label().to_owned(),
                asset: t.asset.clone(),
                amount: t.amount,
                status: t.status.clone(),
            })
            .collect();
        let prices = snapshot
            .prices
            .iter()
            .map(|(symbol, &price)| PriceRowModel {
                symbol: symbol.clone(),
                price,
                change_pct: prev_prices
                    .get(symbol)
                    .filter(|prev| prev.is_finite() && **prev != 0.0)
                    .map(|prev| (price - prev) / prev * 100.0),
            })
            .collect();
        let swaps = snapshot
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Swap)
            .map(|t| SwapRowModel {
                id: t.id.clone(),
                timestamp: t.timestamp,
                from_asset: t.asset.clone(),
                from_amount: t.amount,
                to_asset: t.counter_asset.clone().unwrap_or_default(),
                to_amount: t.counter_amount.unwrap_or(f64::NAN),
            })
            .collect();
        DashboardModel {
            title: self.title.clone(),
            now: snapshot.taken_at,
            status: StatusModel {
                running: auto.running,
                mode: auto.mode.clone(),
                started_at: auto.started_at,
                last_exec: auto.last_exec,
                next_exec: auto.next_exec,
                sequence: snapshot.sequence,
                ..StatusModel::default()
            },
            balances,
            activity,
            prices,
            swaps,
            logs: snapshot.logs.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_shows_every_panel() {
        let state = DashboardState::default();
        assert_eq!(state.visible.len(), 6);
        assert!(state.focused.is_none());
        assert!(state.pending().is_empty());
    }

    #[test]
    fn commands_update_state() {
        let mut state = DashboardState::default();
        assert!(state.apply_command(Command::Pause).is_continue());
        assert!(state.paused);
        state.apply_command(Command::Resume);
        assert!(!state.paused);
        state.apply_command(Command::Help);
        assert!(state.show_help);
        state.apply_command(Command::Start);
        assert!(state.start_requested);
        assert!(state.pending().contains(DirtyReason::STATE));
        assert!(state.apply_command(Command::Quit).is_break());
    }

    #[test]
    fn logs_toggles_visibility_and_drops_focus() {
        let mut state = DashboardState::default();
        state.focused = Some(PanelType::Logs);
        state.apply_command(Command::Logs);
        assert!(!state.visible.contains(&PanelType::Logs));
        assert_eq!(state.focused, None);
        assert!(state.pending().contains(DirtyReason::LAYOUT));
        state.apply_command(Command::Logs);
        assert!(state.visible.contains(&PanelType::Logs));
    }

    #[test]
    fn focus_cycles_through_visible_panels() {
        let mut state = DashboardState::default();
        state.visible.remove(&PanelType::Balances);
        let mut seen = Vec::new();
        for _ in 0..6 {
            state.apply_command(Command::FocusNext);
            seen.push(state.focused.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                PanelType::Status,
                PanelType::Activity,
                PanelType::Price,
                PanelType::Swap,
                PanelType::Logs,
                PanelType::Status,
            ]
        );
    }

    #[test]
    fn refresh_requests_full_repaint_once() {
        let mut state = DashboardState::default();
        state.apply_command(Command::Refresh);
        assert_eq!(state.take(), (DirtyReason::ENV, true));
        assert_eq!(state.take(), (DirtyReason::empty(), false));
    }
}
