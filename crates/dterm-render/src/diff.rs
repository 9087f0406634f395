#![forbid(unsafe_code)]

//! Frame differ: two buffers in, a minimal [`Op`] list out.
//!
//! # Algorithm
//!
//! 1. No previous buffer, a width change, or an environment change: clear
//!    the screen and paint every non-empty line.
//! 2. Otherwise find the first and last changed rows. Rows present in only
//!    one buffer (height grow/shrink) extend the range.
//! 3. Each changed row takes one of two paths:
//!    - **char run**: for a small localized edit, move to the first
//!      changed column and rewrite only the differing bytes;
//!    - **full line**: move to column 0, erase the row, rewrite it.
//! 4. Rows that disappeared are erased, then the cursor is parked on the
//!    last remaining row.
//!
//! Cursor moves are coalesced: a move to where the cursor already is, after
//! the previous write, is never emitted. Attribute ops are emitted directly
//! before the bytes they style and never for default styling.
//!
//! # Usage
//!
//! ```
//! use dterm_core::{Point, Size};
//! use dterm_render::{FrameDiffer, Op, TerminalBuffer};
//!
//! let mut old = TerminalBuffer::new(Size::new(20, 2));
//! old.write("ASSET   1.000000", Point::new(0, 0), None);
//! let mut new = old.clone();
//! new.write("1", Point::new(15, 0), None);
//!
//! let ops = FrameDiffer::default().diff(Some(&old), &new);
//! assert_eq!(ops, vec![Op::move_to(15, 0), Op::write("1")]);
//! ```

use std::ops::Range;

use dterm_core::TerminalEnv;
use dterm_core::env::{env_override_bool, process_env};
use dterm_text::str_width;
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::buffer::TerminalBuffer;
use crate::line::Line;
use crate::op::{ClearMode, Op};

/// Disable the character-run path (`1/0/true/false`).
pub const ENV_DISABLE_CHAR_DIFF: &str = "DTERM_DISABLE_CHAR_DIFF";

/// Tunables for the char-run path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Use the char-run path at all.
    pub char_diff_enabled: bool,
    /// Largest byte-length difference between old and new line.
    pub max_len_delta: usize,
    /// Largest changed middle span, in bytes.
    pub max_span: usize,
    /// Largest new line, in bytes.
    pub max_window: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            char_diff_enabled: true,
            max_len_delta: 6,
            max_span: 24,
            max_window: 100,
        }
    }
}

impl DiffConfig {
    /// Defaults with `DTERM_DISABLE_CHAR_DIFF` applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(process_env)
    }

    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let disabled = env_override_bool(&get_env, ENV_DISABLE_CHAR_DIFF).unwrap_or(false);
        Self {
            char_diff_enabled: !disabled,
            ..Self::default()
        }
    }

    /// Always rewrite whole lines.
    #[must_use]
    pub fn full_line_only() -> Self {
        Self {
            char_diff_enabled: false,
            ..Self::default()
        }
    }
}

/// Counters for the most recent diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub full_repaint: bool,
    /// Rows that produced any op.
    pub lines_changed: usize,
    pub char_runs: usize,
    pub full_lines: usize,
    /// Trailing rows erased after a shrink.
    pub cleared_lines: usize,
    /// Payload bytes across all `WriteBytes`.
    pub bytes: usize,
}

/// Stateless apart from configuration and the last run's counters.
#[derive(Debug, Clone, Default)]
pub struct FrameDiffer {
    config: DiffConfig,
    last_stats: DiffStats,
}

impl FrameDiffer {
    #[must_use]
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            last_stats: DiffStats::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DiffConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn last_stats(&self) -> DiffStats {
        self.last_stats
    }

    /// Ops that turn the screen showing `previous` into `next`.
    pub fn diff(&mut self, previous: Option<&TerminalBuffer>, next: &TerminalBuffer) -> Vec<Op> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("frame_diff", rows = next.lines().len()).entered();

        let mut stats = DiffStats::default();
        let ops = match previous {
            Some(prev)
                if prev.size().width == next.size().width && prev.env() == next.env() =>
            {
                self.incremental(prev, next, &mut stats)
            }
            _ => full_render(next, &mut stats),
        };
        stats.bytes = ops.iter().map(Op::payload_len).sum();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            full = stats.full_repaint,
            changed = stats.lines_changed,
            char_runs = stats.char_runs,
            bytes = stats.bytes,
            "diff complete"
        );

        self.last_stats = stats;
        ops
    }

    fn incremental(
        &self,
        prev: &TerminalBuffer,
        next: &TerminalBuffer,
        stats: &mut DiffStats,
    ) -> Vec<Op> {
        let Some((first, last)) = changed_range(prev, next) else {
            return Vec::new();
        };
        let mut sink = OpSink::new(next.env());
        let next_rows = next.lines().len();

        for y in first..=last.min(next_rows.saturating_sub(1)) {
            let Some(new) = next.line(y) else { break };
            let old = prev.line(y);
            if old == Some(new) {
                continue;
            }
            stats.lines_changed += 1;

            let plan = old.and_then(|old| self.plan_char_run(old, new));
            match (old, plan) {
                (Some(old), Some(plan)) => {
                    stats.char_runs += 1;
                    sink.char_run(old, new, y, &plan);
                }
                _ => {
                    stats.full_lines += 1;
                    sink.full_line(new, y);
                }
            }
        }

        let prev_rows = prev.lines().len();
        if prev_rows > next_rows {
            for y in next_rows..prev_rows {
                sink.move_to(0, y);
                sink.clear_line(ClearMode::Whole);
                stats.cleared_lines += 1;
            }
            sink.move_to(0, next_rows.saturating_sub(1));
        }
        sink.ops
    }

    /// Decide whether the char-run path applies to this edit.
    fn plan_char_run(&self, old: &Line, new: &Line) -> Option<CharRun> {
        let cfg = &self.config;
        if !cfg.char_diff_enabled || old.attrs() != new.attrs() {
            return None;
        }
        let (o, n) = (old.as_str(), new.as_str());
        if n.len() > cfg.max_window || o.len().abs_diff(n.len()) > cfg.max_len_delta {
            return None;
        }

        let prefix = snapped_prefix(o, n);
        // Suffix is searched only after the shared prefix so the two never
        // overlap.
        let suffix = snapped_suffix(&o[prefix..], &n[prefix..]);
        let old_mid = prefix..o.len() - suffix;
        let new_mid = prefix..n.len() - suffix;
        if old_mid.is_empty() && new_mid.is_empty() {
            return None;
        }
        if old_mid.len().max(new_mid.len()) > cfg.max_span {
            return None;
        }
        Some(CharRun {
            prefix,
            old_mid,
            new_mid,
        })
    }
}

/// First and last row indices that differ, including rows present in only
/// one of the buffers. `None` when nothing changed.
#[must_use]
pub fn changed_range(prev: &TerminalBuffer, next: &TerminalBuffer) -> Option<(usize, usize)> {
    let (a, b) = (prev.lines(), next.lines());
    let common = a.len().min(b.len());
    let mut first = (0..common).find(|&y| a[y] != b[y]);
    let mut last = (0..common).rev().find(|&y| a[y] != b[y]);
    if a.len() != b.len() {
        first = Some(first.map_or(common, |f| f.min(common)));
        last = Some(a.len().max(b.len()) - 1);
    }
    first.zip(last)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CharRun {
    prefix: usize,
    old_mid: Range<usize>,
    new_mid: Range<usize>,
}

fn full_render(next: &TerminalBuffer, stats: &mut DiffStats) -> Vec<Op> {
    stats.full_repaint = true;
    let mut sink = OpSink::new(next.env());
    sink.clear_screen();
    for (y, line) in next.lines().iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        stats.lines_changed += 1;
        sink.move_to(0, y);
        sink.write_range(line, 0..line.len());
    }
    sink.ops
}

/// Op accumulator that tracks the logical cursor to coalesce moves.
struct OpSink<'a> {
    ops: Vec<Op>,
    cursor: Option<(usize, usize)>,
    env: &'a TerminalEnv,
}

impl<'a> OpSink<'a> {
    fn new(env: &'a TerminalEnv) -> Self {
        Self {
            ops: Vec::new(),
            cursor: None,
            env,
        }
    }

    fn move_to(&mut self, x: usize, y: usize) {
        if self.cursor == Some((x, y)) {
            return;
        }
        self.ops.push(Op::move_to(clamp_u16(x), clamp_u16(y)));
        self.cursor = Some((x, y));
    }

    fn clear_line(&mut self, mode: ClearMode) {
        self.ops.push(Op::ClearLine(mode));
    }

    fn clear_screen(&mut self) {
        self.ops.push(Op::ClearScreen);
        self.cursor = Some((0, 0));
    }

    fn write_range(&mut self, line: &Line, range: Range<usize>) {
        for seg in line.segments(range) {
            let Some(text) = line.as_str().get(seg.range.clone()) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            if let Some(run) = seg.run {
                self.ops.push(Op::SetAttr(run));
            }
            self.ops.push(Op::write(text));
            if let Some((x, _)) = self.cursor.as_mut() {
                *x += str_width(text, self.env);
            }
        }
    }

    fn full_line(&mut self, new: &Line, y: usize) {
        self.move_to(0, y);
        self.clear_line(ClearMode::Whole);
        self.write_range(new, 0..new.len());
    }

    fn char_run(&mut self, old: &Line, new: &Line, y: usize, plan: &CharRun) {
        let (o, n) = (old.as_str(), new.as_str());
        let old_mid = &o[plan.old_mid.clone()];
        let new_mid = &n[plan.new_mid.clone()];
        let same_shape = old_mid.len() == new_mid.len()
            && str_width(old_mid, self.env) == str_width(new_mid, self.env);

        self.move_to(str_width(&n[..plan.prefix], self.env), y);
        if same_shape {
            self.write_range(new, plan.new_mid.clone());
        } else {
            self.write_range(new, plan.prefix..n.len());
            if new.width(self.env) < old.width(self.env) {
                self.clear_line(ClearMode::ToEnd);
            }
        }
    }
}

#[inline]
fn clamp_u16(v: usize) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

fn boundaries(s: &str) -> SmallVec<[usize; 64]> {
    s.grapheme_indices(true)
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect()
}

/// Longest common byte prefix, shortened to a grapheme boundary of both.
fn snapped_prefix(o: &str, n: &str) -> usize {
    let raw = o
        .bytes()
        .zip(n.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    if raw == 0 {
        return 0;
    }
    let (ob, nb) = (boundaries(o), boundaries(n));
    nb.iter()
        .rev()
        .copied()
        .find(|&b| b <= raw && ob.binary_search(&b).is_ok())
        .unwrap_or(0)
}

/// Longest common byte suffix, shortened to a grapheme boundary of both.
fn snapped_suffix(o: &str, n: &str) -> usize {
    let raw = o
        .bytes()
        .rev()
        .zip(n.bytes().rev())
        .take_while(|(a, b)| a == b)
        .count();
    if raw == 0 {
        return 0;
    }
    let (ob, nb) = (boundaries(o), boundaries(n));
    let floor = n.len() - raw;
    nb.iter()
        .copied()
        .filter(|&b| b >= floor)
        .map(|b| n.len() - b)
        .find(|&s| ob.binary_search(&(o.len() - s)).is_ok())
        .unwrap_or(0)
}
