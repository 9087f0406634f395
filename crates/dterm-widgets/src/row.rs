#![forbid(unsafe_code)]

//! Cached single-line rows built from a view-model.

use std::hash::Hasher;

use dterm_core::{Point, Size};
use dterm_render::{Attr, Line, TerminalBuffer};
use rustc_hash::FxHasher;

use crate::format::MISSING;
use crate::node::{DirtyReason, NodeState};
use crate::renderable::Renderable;
use crate::row_cache::RowCache;
use crate::view_model::{RowContext, RowModel};

/// A leaf that draws one [`RowModel`] through a [`RowCache`].
///
/// The line is resolved in `measure` (a cache hit when neither the width
/// nor the rounded hash moved) and drawn in `render`. A model that fails to
/// format draws a dim `-` instead.
pub struct Row<M: RowModel> {
    node: NodeState,
    model: M,
    cache: RowCache,
    ctx: RowContext,
    line: Option<Line>,
    failed: bool,
}

impl<M: RowModel> Row<M> {
    #[must_use]
    pub fn new(model: M, cache: RowCache, ctx: RowContext) -> Self {
        Self {
            node: NodeState::new(),
            model,
            cache,
            ctx,
            line: None,
            failed: false,
        }
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Swap in a new model, marking the row dirty when its hash moved.
    pub fn set_model(&mut self, model: M) {
        if model.rounded_hash() != self.model.rounded_hash() {
            self.node.mark(DirtyReason::STATE);
        }
        self.model = model;
    }

    fn cache_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.model.rounded_hash());
        hasher.write_u64(self.ctx.fingerprint());
        hasher.finish()
    }

    /// Whether the last `measure` fell back to the placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.failed
    }
}

impl<M: RowModel> Renderable for Row<M> {
    fn id(&self) -> &str {
        self.model.key()
    }

    fn node(&self) -> &NodeState {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeState {
        &mut self.node
    }

    fn measure(&mut self, available: Size) -> Size {
        if available.is_empty() {
            self.line = None;
            return Size::ZERO;
        }
        let width = available.width;
        let built = self.cache.get_or_try_build(
            self.model.key(),
            width,
            self.cache_hash(),
            || self.model.format(width, &self.ctx),
        );
        self.failed = built.is_err();
        self.line = Some(built.unwrap_or_else(|_| Line::styled(MISSING, Attr::DEFAULT.fg(8))));
        Size::new(width, 1)
    }

    fn render(&self, buffer: &mut TerminalBuffer, at: Point) {
        if let Some(line) = &self.line {
            buffer.write_line(line, at);
        }
    }

    fn hash_content(&self, hasher: &mut dyn Hasher) {
        hasher.write_u64(self.model.rounded_hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_model::{BalanceRowModel, PriceRowModel};

    fn price(p: f64) -> PriceRowModel {
        PriceRowModel {
            symbol: "BTC".into(),
            price: p,
            change_pct: None,
        }
    }

    #[test]
    fn measure_hits_cache_on_unchanged_model() {
        let cache = RowCache::new();
        let mut row = Row::new(price(1.0), cache.clone(), RowContext::default());
        assert_eq!(row.measure(Size::new(30, 5)), Size::new(30, 1));
        assert_eq!(row.measure(Size::new(30, 5)), Size::new(30, 1));
        assert_eq!((cache.stats().hits, cache.stats().misses), (1, 1));

        row.set_model(price(1.000_000_2));
        row.measure(Size::new(30, 5));
        assert_eq!(cache.stats().hits, 2);

        row.set_model(price(1.5));
        row.measure(Size::new(30, 5));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn glyph_or_env_change_misses_the_cache() {
        use dterm_core::{GlyphMode, GlyphPolicy, TerminalEnv};

        use crate::metrics::TextMetrics;

        let cache = RowCache::new();
        let env = TerminalEnv {
            cjk: false,
            utf8: true,
            color: true,
        };
        let ctx = |env, mode| RowContext::new(TextMetrics::new(env), GlyphPolicy::for_mode(mode));

        let mut row = Row::new(price(1.0), cache.clone(), ctx(env, GlyphMode::Unicode));
        row.measure(Size::new(30, 1));
        row.measure(Size::new(30, 1));
        assert_eq!((cache.stats().hits, cache.stats().misses), (1, 1));

        let mut row = Row::new(price(1.0), cache.clone(), ctx(env, GlyphMode::Ascii));
        row.measure(Size::new(30, 1));
        assert_eq!(cache.stats().misses, 2);

        let cjk = TerminalEnv { cjk: true, ..env };
        let mut row = Row::new(price(1.0), cache.clone(), ctx(cjk, GlyphMode::Ascii));
        row.measure(Size::new(30, 1));
        assert_eq!((cache.stats().hits, cache.stats().misses), (1, 3));
    }

    #[test]
    fn set_model_marks_dirty_only_on_visible_change() {
        let mut row = Row::new(price(1.0), RowCache::new(), RowContext::default());
        row.clear_dirty();
        row.set_model(price(1.000_000_1));
        assert!(!row.is_dirty());
        row.set_model(price(2.0));
        assert!(row.is_dirty());
    }

    #[test]
    fn format_failure_renders_placeholder() {
        let model = BalanceRowModel {
            id: "empty".into(),
            asset: String::new(),
            available: 1.0,
            pending: 0.0,
            staked: 0.0,
            value: None,
            exchange: String::new(),
        };
        let mut row = Row::new(model, RowCache::new(), RowContext::default());
        row.measure(Size::new(20, 1));
        assert!(row.is_placeholder());
        let mut buf = TerminalBuffer::new(Size::new(20, 1));
        row.render(&mut buf, Point::ZERO);
        assert_eq!(buf.to_plain_lines(), vec!["-"]);
    }

    #[test]
    fn zero_area_draws_nothing() {
        let mut row = Row::new(price(1.0), RowCache::new(), RowContext::default());
        assert_eq!(row.measure(Size::new(0, 1)), Size::ZERO);
        let mut buf = TerminalBuffer::new(Size::new(5, 1));
        row.render(&mut buf, Point::ZERO);
        assert_eq!(buf, TerminalBuffer::new(Size::new(5, 1)));
    }
}
