#![forbid(unsafe_code)]

//! The dashboard tree: header, the allocated panels, and a key-hint footer.
//!
//! [`Dashboard::build`] assembles a fresh tree from a [`DashboardModel`] and
//! the panel rectangles chosen by the allocator. Row panels go through their
//! own [`RowCache`] from [`PanelCaches`], so rebuilding the tree every tick
//! only reformats rows whose width or rounded hash moved.

use std::hash::Hasher;

use dterm_core::{Point, Rect, Size};
use dterm_layout::{FlexLayout, JustifyContent, PanelLayouts, PanelType};
use dterm_render::{Attr, TerminalBuffer};
use rustc_hash::FxHashSet;

use crate::format;
use crate::node::{DirtyReason, NodeState};
use crate::panel::Panel;
use crate::renderable::{Renderable, validate_unique_ids};
use crate::row::Row;
use crate::row_cache::{RowCache, RowCacheStats};
use crate::stack::Stack;
use crate::text::Text;
use crate::view_model::{
    ActivityRowModel, BalanceRowModel, PriceRowModel, RowContext, RowModel, SwapRowModel,
};

const TITLE: Attr = Attr::DEFAULT.fg(6);
const MUTED: Attr = Attr::DEFAULT.fg(8);
const WARN: Attr = Attr::DEFAULT.fg(3);

/// Key hints shown in the footer and the help line.
pub const KEY_HINTS: &str =
    "q quit  p pause  r resume  s start  l logs  f refresh  h help  tab focus";

/// Automation state shown by the status panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusModel {
    pub running: bool,
    pub mode: String,
    pub started_at: Option<i64>,
    pub last_exec: Option<i64>,
    pub next_exec: Option<i64>,
    pub sequence: u64,
    pub paused: bool,
    pub show_help: bool,
    pub start_requested: bool,
}

/// Everything the dashboard draws for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardModel {
    pub title: String,
    /// Unix time of the snapshot, shown in the header.
    pub now: i64,
    pub status: StatusModel,
    pub balances: Vec<BalanceRowModel>,
    /// Most recent first.
    pub activity: Vec<ActivityRowModel>,
    pub prices: Vec<PriceRowModel>,
    /// Most recent first.
    pub swaps: Vec<SwapRowModel>,
    pub logs: Vec<String>,
}

/// One [`RowCache`] per row-bearing panel type.
#[derive(Debug, Clone, Default)]
pub struct PanelCaches {
    pub balances: RowCache,
    pub activity: RowCache,
    pub price: RowCache,
    pub swap: RowCache,
}

impl PanelCaches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache serving `panel`, if it has rows.
    #[must_use]
    pub fn for_panel(&self, panel: PanelType) -> Option<&RowCache> {
        match panel.canonical() {
            PanelType::Balances => Some(&self.balances),
            PanelType::Activity => Some(&self.activity),
            PanelType::Price => Some(&self.price),
            PanelType::Swap => Some(&self.swap),
            _ => None,
        }
    }

    /// Stats of every cache, labelled by panel.
    #[must_use]
    pub fn stats(&self) -> [(PanelType, RowCacheStats); 4] {
        [
            (PanelType::Balances, self.balances.stats()),
            (PanelType::Activity, self.activity.stats()),
            (PanelType::Price, self.price.stats()),
            (PanelType::Swap, self.swap.stats()),
        ]
    }

    pub fn reset_stats(&self) {
        for cache in [&self.balances, &self.activity, &self.price, &self.swap] {
            cache.reset_stats();
        }
    }

    pub fn clear(&self) {
        for cache in [&self.balances, &self.activity, &self.price, &self.swap] {
            cache.clear();
        }
    }
}

/// Title shown on a panel's border.
#[must_use]
pub fn panel_title(panel: PanelType) -> &'static str {
    match panel.canonical() {
        PanelType::Status => "Status",
        PanelType::Balances => "Balances",
        PanelType::Activity => "Activity",
        PanelType::Price => "Prices",
        PanelType::Swap => "Swaps",
        PanelType::Logs => "Logs",
        _ => "Panel",
    }
}

fn muted(id: &str, text: &str, ctx: &RowContext) -> Text {
    Text::new(id, text).attr(MUTED).metrics(ctx.metrics.clone())
}

fn rows<M: RowModel + Clone + 'static>(
    id: &str,
    models: &[M],
    limit: usize,
    cache: &RowCache,
    ctx: &RowContext,
    empty: &str,
) -> Stack {
    let mut stack = Stack::vstack(id);
    if models.is_empty() {
        stack.push(Box::new(muted("empty", empty, ctx)));
    }
    // A repeated key keeps its first row.
    let mut seen = FxHashSet::default();
    let shown: Vec<&M> = models
        .iter()
        .filter(|m| seen.insert(m.key()))
        .take(limit)
        .collect();
    for model in &shown {
        stack.push(Box::new(Row::new((*model).clone(), cache.clone(), ctx.clone())));
    }
    cache.retain_keys(shown.iter().map(|m| m.key()));
    stack
}

fn status_body(status: &StatusModel, ctx: &RowContext) -> Stack {
    let icons = &ctx.glyphs.icons;
    let (icon, state, state_attr) = if status.running {
        (icons.running, "running", Attr::DEFAULT.fg(2).bold())
    } else {
        (icons.stopped, "stopped", Attr::DEFAULT.fg(1).bold())
    };
    let text = |id: &str, s: String| Text::new(id, s).metrics(ctx.metrics.clone());
    let mode = if status.mode.is_empty() {
        format::MISSING
    } else {
        status.mode.as_str()
    };
    let mut stack = Stack::vstack("status-body")
        .child(
            Stack::hstack("state")
                .spacing(1)
                .child(text("state", format!("{icon} Automation {state}")).attr(state_attr))
                .child(text("mode", format!("mode: {mode}"))),
        )
        .child(text(
            "started",
            format!("Started:   {}", format::maybe_datetime(status.started_at)),
        ))
        .child(text(
            "last",
            format!("Last exec: {}", format::maybe_datetime(status.last_exec)),
        ))
        .child(text(
            "next",
            format!("Next exec: {}", format::maybe_datetime(status.next_exec)),
        ));
    let mut flags = format!("Sequence:  {}", status.sequence);
    if status.paused {
        flags.push_str("  [PAUSED]");
    }
    if status.start_requested {
        flags.push_str("  [START REQUESTED]");
    }
    let flag_attr = if status.paused { WARN } else { Attr::DEFAULT };
    stack.push(Box::new(text("flags", flags).attr(flag_attr)));
    if status.show_help {
        stack.push(Box::new(muted("help", KEY_HINTS, ctx)));
    }
    stack
}

fn logs_body(logs: &[String], limit: usize, ctx: &RowContext) -> Stack {
    let mut stack = Stack::vstack("logs-body");
    if logs.is_empty() {
        stack.push(Box::new(muted("empty", "no log lines", ctx)));
    }
    let start = logs.len().saturating_sub(limit);
    for (i, line) in logs.iter().enumerate().skip(start) {
        stack.push(Box::new(
            Text::new(format!("log-{i}"), line.as_str()).metrics(ctx.metrics.clone()),
        ));
    }
    stack
}

/// Build the bordered panel for `kind`, showing at most `rows` body rows.
#[must_use]
pub fn build_panel(
    kind: PanelType,
    model: &DashboardModel,
    caches: &PanelCaches,
    ctx: &RowContext,
    rows_hint: usize,
) -> Panel {
    let kind = kind.canonical();
    let body: Box<dyn Renderable> = match (kind, caches.for_panel(kind)) {
        (PanelType::Balances, Some(cache)) => Box::new(rows(
            "balances-body",
            &model.balances,
            rows_hint,
            cache,
            ctx,
            "no holdings",
        )),
        (PanelType::Activity, Some(cache)) => Box::new(rows(
            "activity-body",
            &model.activity,
            rows_hint,
            cache,
            ctx,
            "no recent activity",
        )),
        (PanelType::Price, Some(cache)) => Box::new(rows(
            "price-body",
            &model.prices,
            rows_hint,
            cache,
            ctx,
            "no prices",
        )),
        (PanelType::Swap, Some(cache)) => Box::new(rows(
            "swap-body",
            &model.swaps,
            rows_hint,
            cache,
            ctx,
            "no swaps",
        )),
        (PanelType::Status, _) => Box::new(status_body(&model.status, ctx)),
        (PanelType::Logs, _) => Box::new(logs_body(&model.logs, rows_hint, ctx)),
        _ => Box::new(muted("empty", format::MISSING, ctx)),
    };
    Panel::new(kind.name(), panel_title(kind), body)
        .glyphs(ctx.glyphs)
        .metrics(ctx.metrics.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Header,
    Footer,
    Panel(PanelType, Rect),
}

/// Root of the dashboard tree.
pub struct Dashboard {
    node: NodeState,
    nodes: Vec<Box<dyn Renderable>>,
    slots: Vec<Slot>,
    header_height: u16,
    /// Areas from the last `measure`, parallel to `nodes`.
    areas: Vec<Rect>,
}

impl Dashboard {
    /// Assemble the tree for `model` with panels placed per `layouts`.
    #[must_use]
    pub fn build(
        model: &DashboardModel,
        layouts: &PanelLayouts,
        caches: &PanelCaches,
        ctx: &RowContext,
        focused: Option<PanelType>,
        header_height: u16,
    ) -> Self {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("Dashboard::build", panels = layouts.len()).entered();

        let mut nodes: Vec<Box<dyn Renderable>> = Vec::with_capacity(layouts.len() + 2);
        let mut slots = Vec::with_capacity(layouts.len() + 2);

        let header = Stack::vstack("header")
            .child(
                Stack::hstack("header-top")
                    .flex(FlexLayout::row().justify(JustifyContent::SpaceBetween))
                    .child(
                        Text::new("title", model.title.as_str())
                            .attr(TITLE.bold())
                            .metrics(ctx.metrics.clone()),
                    )
                    .child(
                        Text::new("clock", format::datetime(model.now))
                            .attr(MUTED)
                            .metrics(ctx.metrics.clone()),
                    ),
            )
            .child(muted(
                "subtitle",
                &format!(
                    "seq {}  {} holdings  {} prices",
                    model.status.sequence,
                    model.balances.len(),
                    model.prices.len()
                ),
                ctx,
            ));
        nodes.push(Box::new(header));
        slots.push(Slot::Header);

        for (&kind, layout) in layouts {
            if kind.canonical() != kind || kind == PanelType::Custom {
                continue;
            }
            let rows_hint = usize::from(layout.height.saturating_sub(2));
            let mut panel = build_panel(kind, model, caches, ctx, rows_hint);
            if focused.map(PanelType::canonical) == Some(kind) {
                panel.on_focus_change(true);
            }
            nodes.push(Box::new(panel));
            slots.push(Slot::Panel(kind, layout.rect()));
        }

        nodes.push(Box::new(muted("footer", KEY_HINTS, ctx)));
        slots.push(Slot::Footer);

        let dashboard = Self {
            node: NodeState::new(),
            nodes,
            slots,
            header_height,
            areas: Vec::new(),
        };
        debug_assert_eq!(validate_unique_ids(&dashboard), Ok(()));
        dashboard
    }

    /// Panel types present in the tree, in drawing order.
    pub fn panels(&self) -> impl Iterator<Item = PanelType> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Panel(kind, _) => Some(*kind),
            _ => None,
        })
    }

    /// Mutable access to the panel node for `kind`.
    pub fn panel_mut(&mut self, kind: PanelType) -> Option<&mut Box<dyn Renderable>> {
        let kind = kind.canonical();
        let index = self
            .slots
            .iter()
            .position(|s| matches!(s, Slot::Panel(k, _) if *k == kind))?;
        self.nodes.get_mut(index)
    }

    /// Header and footer are drawn only where no panel sits.
    fn chrome_areas(&self, size: Size) -> (Rect, Rect) {
        let panels: Vec<Rect> = self
            .slots
            .iter()
            .filter_map(|s| match s {
                Slot::Panel(_, rect) => Some(*rect),
                _ => None,
            })
            .collect();
        let top = panels.iter().map(Rect::y).min().unwrap_or(i32::from(size.height));
        let bottom = panels.iter().map(Rect::bottom).max().unwrap_or(0);
        let header_h = i32::from(self.header_height).min(top).max(0) as u16;
        let footer = if size.height > 0 && bottom < i32::from(size.height) {
            Rect::new(0, i32::from(size.height) - 1, size.width, 1)
        } else {
            Rect::default()
        };
        (Rect::new(0, 0, size.width, header_h), footer)
    }
}

impl Renderable for Dashboard {
    fn id(&self) -> &str {
        "dashboard"
    }

    fn node(&self) -> &NodeState {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeState {
        &mut self.node
    }

    fn measure(&mut self, available: Size) -> Size {
        let (header, footer) = self.chrome_areas(available);
        let screen = Rect::from_size(available);
        self.areas = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Header => header,
                Slot::Footer => footer,
                Slot::Panel(_, rect) => rect.intersection(&screen),
            })
            .collect();
        for (node, area) in self.nodes.iter_mut().zip(&self.areas) {
            node.measure(area.size);
        }
        available
    }

    fn render(&self, buffer: &mut TerminalBuffer, at: Point) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("Dashboard::render", nodes = self.nodes.len()).entered();

        for (node, area) in self.nodes.iter().zip(&self.areas) {
            if area.is_empty() {
                continue;
            }
            let area = Rect {
                origin: area.origin.offset(at.x, at.y),
                size: area.size,
            };
            node.render_in(buffer, area);
        }
    }

    fn children(&self) -> &[Box<dyn Renderable>] {
        &self.nodes
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut self.nodes
    }

    fn hash_content(&self, hasher: &mut dyn Hasher) {
        for kind in self.panels() {
            hasher.write(kind.name().as_bytes());
        }
    }

    fn mark_dirty(&mut self, reasons: DirtyReason) {
        self.node.mark(reasons);
        if reasons.intersects(DirtyReason::ENV | DirtyReason::LAYOUT) {
            for node in &mut self.nodes {
                node.mark_dirty(reasons);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dterm_core::{GlyphMode, GlyphPolicy};
    use dterm_layout::LayoutManager;

    use crate::metrics::TextMetrics;

    fn model() -> DashboardModel {
        DashboardModel {
            title: "dterm".into(),
            now: 0,
            status: StatusModel {
                running: true,
                mode: "auto".into(),
                sequence: 7,
                ..StatusModel::default()
            },
            balances: vec![BalanceRowModel {
                id: "BTC@kraken".into(),
                asset: "BTC".into(),
                available: 0.5,
                pending: 0.0,
                staked: 0.0,
                value: Some(30_000.0),
                exchange: "kraken".into(),
            }],
            prices: vec![PriceRowModel {
                symbol: "BTC".into(),
                price: 60_000.0,
                change_pct: Some(0.5),
            }],
            logs: (0..10).map(|i| format!("log line {i}")).collect(),
            ..DashboardModel::default()
        }
    }

    fn ctx() -> RowContext {
        RowContext::new(TextMetrics::default(), GlyphPolicy::for_mode(GlyphMode::Ascii))
    }

    fn draw(size: Size, caches: &PanelCaches) -> (Dashboard, Vec<String>) {
        let layouts = LayoutManager::default().calculate_layout(size, None);
        let mut dash = Dashboard::build(&model(), &layouts, caches, &ctx(), None, 3);
        dash.measure(size);
        let mut buf = TerminalBuffer::new(size);
        dash.render(&mut buf, Point::ZERO);
        (dash, buf.to_plain_lines())
    }

    #[test]
    fn full_size_draws_every_panel_once() {
        let (dash, lines) = draw(Size::new(80, 24), &PanelCaches::new());
        let kinds: Vec<_> = dash.panels().collect();
        assert_eq!(kinds.len(), 6);
        assert!(!kinds.contains(&PanelType::Balance));
        assert!(lines[0].starts_with("dterm"));
        assert!(lines[0].trim_end().ends_with("1970-01-01 00:00:00"));
        assert!(lines[3].starts_with("+- Status "));
        assert!(lines.iter().any(|l| l.contains("Automation running")));
        assert!(lines.iter().any(|l| l.contains("$30,000.00")));
        assert!(lines[23].starts_with("q quit"));
    }

    #[test]
    fn repeated_row_keys_keep_the_first_row() {
        let size = Size::new(80, 24);
        let mut m = model();
        let mut dup = m.balances[0].clone();
        dup.available = 9.0;
        let mut other = m.balances[0].clone();
        other.id = "BTC@binance".into();
        other.exchange = "binance".into();
        m.balances.extend([dup, other]);

        let layouts = LayoutManager::default().calculate_layout(size, None);
        let caches = PanelCaches::new();
        let mut dash = Dashboard::build(&m, &layouts, &caches, &ctx(), None, 3);
        assert_eq!(validate_unique_ids(&dash), Ok(()));
        let balances = dash.panel_mut(PanelType::Balances).map(|p| p.children()[0].children().len());
        assert_eq!(balances, Some(2));

        dash.measure(size);
        let mut buf = TerminalBuffer::new(size);
        dash.render(&mut buf, Point::ZERO);
        let lines = buf.to_plain_lines();
        assert_eq!(lines.iter().filter(|l| l.contains("0.500000")).count(), 2);
        assert!(!lines.iter().any(|l| l.contains("9.0000")));
    }

    #[test]
    fn logs_panel_shows_tail() {
        let (_, lines) = draw(Size::new(80, 24), &PanelCaches::new());
        let text = lines.join("\n");
        assert!(text.contains("log line 9"));
        assert!(!text.contains("log line 0"));
    }

    #[test]
    fn rebuilding_hits_row_caches() {
        let caches = PanelCaches::new();
        let _ = draw(Size::new(80, 24), &caches);
        let _ = draw(Size::new(80, 24), &caches);
        let [(_, balances), _, (_, price), _] = caches.stats();
        assert_eq!((balances.hits, balances.misses), (1, 1));
        assert_eq!((price.hits, price.misses), (1, 1));
    }

    #[test]
    fn degraded_size_never_writes_out_of_bounds() {
        for (w, h) in [(40, 10), (20, 6), (79, 23), (10, 3), (1, 1)] {
            let size = Size::new(w, h);
            let (_, lines) = draw(size, &PanelCaches::new());
            assert_eq!(lines.len(), usize::from(h));
        }
    }

    #[test]
    fn env_dirt_reaches_panels() {
        let size = Size::new(80, 24);
        let layouts = LayoutManager::default().calculate_layout(size, None);
        let mut dash = Dashboard::build(
            &model(),
            &layouts,
            &PanelCaches::new(),
            &ctx(),
            Some(PanelType::Balance),
            3,
        );
        assert!(dash.panel_mut(PanelType::Balances).is_some());
        dash.clear_dirty();
        assert!(!crate::renderable::any_dirty(&dash));
        dash.mark_dirty(DirtyReason::ENV);
        assert!(dash.panel_mut(PanelType::Balances).is_some_and(|p| p.is_dirty()));
    }
}
