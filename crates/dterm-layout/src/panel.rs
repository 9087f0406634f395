#![forbid(unsafe_code)]

//! Panel allocator: maps the dashboard's fixed panel set to rectangles.
//!
//! # Normal layout
//!
//! At or above the minimum terminal size the panels follow a fixed tree:
//!
//! ```text
//! header (reserved)
//! status
//! balances
//! activity | price | swap
//! logs
//! footer (reserved)
//! ```
//!
//! Each row gets a height budget from its priority. When the budgets do not
//! fit, rows are shortened toward the minimum usable height starting with
//! the least important, and dropped only if that is still not enough. Spare
//! height goes to the activity/price/swap band, or to the last row when
//! that band is hidden.
//!
//! # Degraded layout
//!
//! Below the minimum size only the most important panels are shown, stacked
//! full-width with no gaps. `status` is always among them when visible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use dterm_core::geometry::{Rect, Size};

/// Dashboard panels. `Balance` is an alias of `Balances`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelType {
    Status,
    Balances,
    Balance,
    Activity,
    Price,
    Swap,
    Logs,
    Custom,
}

impl PanelType {
    pub const ALL: [PanelType; 8] = [
        PanelType::Status,
        PanelType::Balances,
        PanelType::Balance,
        PanelType::Activity,
        PanelType::Price,
        PanelType::Swap,
        PanelType::Logs,
        PanelType::Custom,
    ];

    /// Resolve aliases.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            PanelType::Balance => PanelType::Balances,
            other => other,
        }
    }

    /// Smallest height the panel's height budget is raised to.
    #[must_use]
    pub const fn min_height(self) -> u16 {
        match self.canonical() {
            PanelType::Status => 6,
            PanelType::Balances => 8,
            PanelType::Activity => 5,
            PanelType::Price => 6,
            PanelType::Swap => 8,
            PanelType::Logs => 6,
            _ => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PanelType::Status => "status",
            PanelType::Balances => "balances",
            PanelType::Balance => "balance",
            PanelType::Activity => "activity",
            PanelType::Price => "price",
            PanelType::Swap => "swap",
            PanelType::Logs => "logs",
            PanelType::Custom => "custom",
        }
    }

    #[must_use]
    pub const fn default_priority(self) -> PanelPriority {
        match self.canonical() {
            PanelType::Status => PanelPriority::Critical,
            PanelType::Balances => PanelPriority::High,
            PanelType::Activity | PanelType::Price | PanelType::Swap => PanelPriority::Medium,
            _ => PanelPriority::Low,
        }
    }
}

impl fmt::Display for PanelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Importance of a panel. Orders from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// Rectangle assigned to one panel for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelLayout {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl PanelLayout {
    /// Origin clamped to `>= 0`, size clamped to `>= 1`.
    #[must_use]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        let dim = |v: i32| v.clamp(1, i32::from(u16::MAX)) as u16;
        Self {
            x: x.max(0),
            y: y.max(0),
            width: dim(width),
            height: dim(height),
        }
    }

    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

impl From<PanelLayout> for Rect {
    fn from(layout: PanelLayout) -> Self {
        layout.rect()
    }
}

pub type PanelLayouts = BTreeMap<PanelType, PanelLayout>;

/// Allocator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Below this in either dimension the degraded layout is used.
    pub min_size: Size,
    pub header_height: u16,
    pub footer_height: u16,
    pub min_panel_width: u16,
    pub min_panel_height: u16,
    /// Panels shown by the degraded layout.
    pub degraded_panels: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_size: Size::new(80, 24),
            header_height: 3,
            footer_height: 1,
            min_panel_width: 20,
            min_panel_height: 5,
            degraded_panels: 3,
        }
    }
}

/// A layout validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    NegativeOrigin {
        panel: PanelType,
        x: i32,
        y: i32,
    },
    EmptyArea {
        panel: PanelType,
    },
    OutOfBounds {
        panel: PanelType,
        layout: PanelLayout,
        bounds: Size,
    },
    Overlap {
        first: PanelType,
        second: PanelType,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::NegativeOrigin { panel, x, y } => {
                write!(f, "panel {panel} has negative origin ({x}, {y})")
            }
            LayoutError::EmptyArea { panel } => write!(f, "panel {panel} has zero size"),
            LayoutError::OutOfBounds {
                panel,
                layout,
                bounds,
            } => write!(
                f,
                "panel {panel} at ({}, {}) size {}x{} exceeds terminal {}x{}",
                layout.x, layout.y, layout.width, layout.height, bounds.width, bounds.height
            ),
            LayoutError::Overlap { first, second } => {
                write!(f, "panels {first} and {second} overlap")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Check a computed layout. Returns the first violation found.
///
/// Aliased panels (`balance`/`balances`) share a rectangle and are not
/// reported as overlapping.
pub fn validate_layout(layouts: &PanelLayouts, size: Size) -> Result<(), LayoutError> {
    for (&panel, layout) in layouts {
        if layout.x < 0 || layout.y < 0 {
            return Err(LayoutError::NegativeOrigin {
                panel,
                x: layout.x,
                y: layout.y,
            });
        }
        if layout.width == 0 || layout.height == 0 {
            return Err(LayoutError::EmptyArea { panel });
        }
        if layout.right() > i32::from(size.width) || layout.bottom() > i32::from(size.height) {
            return Err(LayoutError::OutOfBounds {
                panel,
                layout: *layout,
                bounds: size,
            });
        }
    }
    let entries: Vec<(PanelType, Rect)> = layouts.iter().map(|(p, l)| (*p, l.rect())).collect();
    for (i, (first, a)) in entries.iter().enumerate() {
        for (second, b) in &entries[i + 1..] {
            if first.canonical() == second.canonical() {
                continue;
            }
            if a.intersects(b) {
                return Err(LayoutError::Overlap {
                    first: *first,
                    second: *second,
                });
            }
        }
    }
    Ok(())
}

/// One row of the fixed layout tree.
#[derive(Debug, Clone)]
struct Band {
    panels: Vec<PanelType>,
    height: u16,
    priority: PanelPriority,
    index: usize,
}

const TREE: [&[PanelType]; 4] = [
    &[PanelType::Status],
    &[PanelType::Balances],
    &[PanelType::Activity, PanelType::Price, PanelType::Swap],
    &[PanelType::Logs],
];

/// Index of the horizontal band in [`TREE`].
const GROUP_BAND: usize = 2;

type CacheKey = (Size, Option<BTreeSet<PanelType>>);

/// Computes panel rectangles for a terminal size and visible set.
///
/// The last result is memoized so an unchanged size and visible set yields
/// the identical layout without recomputation.
#[derive(Debug, Clone)]
pub struct LayoutManager {
    config: LayoutConfig,
    priorities: BTreeMap<PanelType, PanelPriority>,
    cached: Option<(CacheKey, PanelLayouts)>,
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutManager {
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        let priorities = PanelType::ALL
            .iter()
            .filter(|p| p.canonical() == **p)
            .map(|&p| (p, p.default_priority()))
            .collect();
        Self {
            config,
            priorities,
            cached: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    #[must_use]
    pub fn priority(&self, panel: PanelType) -> PanelPriority {
        self.priorities
            .get(&panel.canonical())
            .copied()
            .unwrap_or(PanelPriority::Low)
    }

    pub fn set_priority(&mut self, panel: PanelType, priority: PanelPriority) {
        self.priorities.insert(panel.canonical(), priority);
        self.cached = None;
    }

    /// Layout for `size`. `visible` of `None` shows every panel.
    pub fn calculate_layout(
        &mut self,
        size: Size,
        visible: Option<&BTreeSet<PanelType>>,
    ) -> PanelLayouts {
        let key: CacheKey = (
            size,
            visible.map(|v| v.iter().map(|p| p.canonical()).collect()),
        );
        if let Some((cached_key, layouts)) = &self.cached
            && *cached_key == key
        {
            return layouts.clone();
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "LayoutManager::calculate_layout",
            width = size.width,
            height = size.height
        )
        .entered();

        let layouts = self.compute(size, key.1.as_ref());
        self.cached = Some((key, layouts.clone()));
        layouts
    }

    fn compute(&self, size: Size, visible: Option<&BTreeSet<PanelType>>) -> PanelLayouts {
        let mut layouts = PanelLayouts::new();
        if size.is_empty() {
            return layouts;
        }
        let shown = |p: PanelType| visible.is_none_or(|v| v.contains(&p.canonical()));
        if size.width < self.config.min_size.width || size.height < self.config.min_size.height {
            self.degraded(size, shown, &mut layouts);
        } else {
            self.normal(size, shown, &mut layouts);
        }
        if let Some(balances) = layouts.get(&PanelType::Balances).copied() {
            layouts.insert(PanelType::Balance, balances);
        }
        layouts
    }

    /// Height budget before fitting.
    fn height_budget(&self, panel: PanelType, available: u16) -> u16 {
        let avail = u32::from(available);
        let raw = match (self.priority(panel), panel.canonical()) {
            (PanelPriority::Critical, PanelType::Status) => avail / 4,
            (PanelPriority::Critical, _) => avail / 5,
            (PanelPriority::High, PanelType::Balances) => 2 * avail / 5,
            (PanelPriority::High, _) => avail / 5,
            (PanelPriority::Medium, _) => avail / 6,
            (PanelPriority::Low, _) => avail / 8,
        };
        (raw as u16).max(panel.min_height()).min(available)
    }

    fn normal(&self, size: Size, shown: impl Fn(PanelType) -> bool, out: &mut PanelLayouts) {
        let cfg = &self.config;
        let available = size
            .height
            .saturating_sub(cfg.header_height)
            .saturating_sub(cfg.footer_height);

        let mut bands: Vec<Band> = TREE
            .iter()
            .enumerate()
            .filter_map(|(index, members)| {
                let panels: Vec<PanelType> = members.iter().copied().filter(|&p| shown(p)).collect();
                let height = panels
                    .iter()
                    .map(|&p| self.height_budget(p, available))
                    .max()?;
                let priority = panels.iter().map(|&p| self.priority(p)).min()?;
                Some(Band {
                    panels,
                    height,
                    priority,
                    index,
                })
            })
            .collect();

        fit_bands(&mut bands, available, cfg.min_panel_height);

        let mut y = i32::from(cfg.header_height);
        for band in &bands {
            if band.height < cfg.min_panel_height {
                continue;
            }
            let count = band.panels.len() as u32;
            let base = u32::from(size.width) / count;
            let rem = u32::from(size.width) % count;
            let mut x = 0i32;
            for (i, &panel) in band.panels.iter().enumerate() {
                let width = base + u32::from((i as u32) < rem);
                if width >= u32::from(cfg.min_panel_width) {
                    out.insert(
                        panel,
                        PanelLayout::new(x, y, width as i32, i32::from(band.height)),
                    );
                }
                x += width as i32;
            }
            y += i32::from(band.height);
        }
    }

    fn degraded(&self, size: Size, shown: impl Fn(PanelType) -> bool, out: &mut PanelLayouts) {
        let cfg = &self.config;
        let order: Vec<PanelType> = TREE.iter().flat_map(|b| b.iter().copied()).collect();
        let mut ranked: Vec<PanelType> = order.iter().copied().filter(|&p| shown(p)).collect();
        ranked.sort_by_key(|&p| self.priority(p));

        let mut chosen: Vec<PanelType> = ranked.iter().copied().take(cfg.degraded_panels).collect();
        // Status leads so it also survives the truncation to the row count.
        if let Some(pos) = chosen.iter().position(|&p| p == PanelType::Status) {
            chosen.remove(pos);
            chosen.insert(0, PanelType::Status);
        } else if shown(PanelType::Status) {
            if chosen.len() >= cfg.degraded_panels {
                chosen.pop();
            }
            chosen.insert(0, PanelType::Status);
        }

        let reserved = cfg.header_height.saturating_add(cfg.footer_height);
        let (top, mut remaining) = if size.height > reserved
            && usize::from(size.height - reserved) >= chosen.len()
        {
            (cfg.header_height, size.height - reserved)
        } else {
            (0, size.height)
        };
        chosen.truncate(usize::from(remaining));
        chosen.sort_by_key(|p| order.iter().position(|o| o == p));

        let mut y = i32::from(top);
        let count = chosen.len();
        for (i, &panel) in chosen.iter().enumerate() {
            let height = remaining / (count - i) as u16;
            out.insert(
                panel,
                PanelLayout::new(0, y, i32::from(size.width), i32::from(height)),
            );
            y += i32::from(height);
            remaining -= height;
        }
    }
}

/// Shrink, then drop, bands until they fit `available`. Spare height goes
/// to the horizontal band or the last band.
fn fit_bands(bands: &mut Vec<Band>, available: u16, floor: u16) {
    fn total(bands: &[Band]) -> u32 {
        bands.iter().map(|b| u32::from(b.height)).sum()
    }
    let mut by_importance: Vec<usize> = (0..bands.len()).collect();
    // Least important first; among equals the lower band gives way first.
    by_importance.sort_by_key(|&i| (std::cmp::Reverse(bands[i].priority), std::cmp::Reverse(i)));

    let mut overflow = total(bands).saturating_sub(u32::from(available));
    for &i in &by_importance {
        if overflow == 0 {
            break;
        }
        let slack = u32::from(bands[i].height.saturating_sub(floor));
        let cut = slack.min(overflow);
        bands[i].height -= cut as u16;
        overflow -= cut;
    }

    if overflow > 0 {
        let mut drop = Vec::new();
        for &i in &by_importance {
            if overflow == 0 {
                break;
            }
            overflow = overflow.saturating_sub(u32::from(bands[i].height));
            drop.push(bands[i].index);
        }
        bands.retain(|b| !drop.contains(&b.index));
    }

    let spare = u32::from(available).saturating_sub(total(bands));
    if spare > 0 {
        let target = bands
            .iter()
            .position(|b| b.index == GROUP_BAND)
            .or_else(|| bands.len().checked_sub(1));
        if let Some(i) = target {
            bands[i].height = bands[i].height.saturating_add(spare as u16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: Size) -> PanelLayouts {
        LayoutManager::default().calculate_layout(size, None)
    }

    fn set(panels: &[PanelType]) -> BTreeSet<PanelType> {
        panels.iter().copied().collect()
    }

    #[test]
    fn standard_80x24() {
        let l = layout(Size::new(80, 24));
        assert_eq!(l[&PanelType::Status], PanelLayout::new(0, 3, 80, 5));
        assert_eq!(l[&PanelType::Balances], PanelLayout::new(0, 8, 80, 5));
        assert_eq!(l[&PanelType::Activity], PanelLayout::new(0, 13, 27, 5));
        assert_eq!(l[&PanelType::Price], PanelLayout::new(27, 13, 27, 5));
        assert_eq!(l[&PanelType::Swap], PanelLayout::new(54, 13, 26, 5));
        assert_eq!(l[&PanelType::Logs], PanelLayout::new(0, 18, 80, 5));
        assert!(l.values().all(|p| p.bottom() <= 24 - 1));
        assert_eq!(validate_layout(&l, Size::new(80, 24)), Ok(()));
    }

    #[test]
    fn balance_alias_matches_balances() {
        let l = layout(Size::new(120, 40));
        assert_eq!(l[&PanelType::Balance], l[&PanelType::Balances]);

        let mut mgr = LayoutManager::default();
        let only_alias = mgr.calculate_layout(Size::new(100, 30), Some(&set(&[PanelType::Balance])));
        assert!(only_alias.contains_key(&PanelType::Balances));
        assert_eq!(only_alias[&PanelType::Balance], only_alias[&PanelType::Balances]);
    }

    #[test]
    fn large_terminal_uses_budgets_and_spare_goes_to_group() {
        let l = layout(Size::new(120, 60));
        // available 56: status 56/4, balances 2*56/5, logs max(56/8, 6)
        assert_eq!(l[&PanelType::Status].height, 14);
        assert_eq!(l[&PanelType::Balances].height, 22);
        assert_eq!(l[&PanelType::Logs].height, 7);
        assert_eq!(l[&PanelType::Price].height, 56 - 14 - 22 - 7);
        assert_eq!(l[&PanelType::Logs].bottom(), 59);
    }

    #[test]
    fn hidden_panels_are_skipped() {
        let mut mgr = LayoutManager::default();
        let l = mgr.calculate_layout(
            Size::new(90, 30),
            Some(&set(&[PanelType::Status, PanelType::Price, PanelType::Logs])),
        );
        assert_eq!(
            l.keys().copied().collect::<Vec<_>>(),
            vec![PanelType::Status, PanelType::Price, PanelType::Logs]
        );
        assert_eq!(l[&PanelType::Price].width, 90);
        assert_eq!(l[&PanelType::Price].y, l[&PanelType::Status].bottom());
    }

    #[test]
    fn group_remainder_goes_to_first_panels() {
        let l = layout(Size::new(82, 30));
        assert_eq!(l[&PanelType::Activity].width, 28);
        assert_eq!(l[&PanelType::Price].width, 27);
        assert_eq!(l[&PanelType::Swap].width, 27);
        assert_eq!(l[&PanelType::Swap].right(), 82);
    }

    #[test]
    fn narrow_group_members_are_skipped() {
        let config = LayoutConfig {
            min_panel_width: 30,
            ..LayoutConfig::default()
        };
        let l = LayoutManager::new(config).calculate_layout(Size::new(80, 30), None);
        assert!(!l.contains_key(&PanelType::Activity));
        assert!(!l.contains_key(&PanelType::Swap));
        assert!(l.contains_key(&PanelType::Status));
    }

    #[test]
    fn degraded_shows_top_three() {
        let l = layout(Size::new(60, 20));
        let keys: Vec<_> = l.keys().copied().collect();
        // status (critical), balances (high, plus alias), activity (first medium)
        assert_eq!(
            keys,
            vec![
                PanelType::Status,
                PanelType::Balances,
                PanelType::Balance,
                PanelType::Activity
            ]
        );
        // 16 rows: 16/3, 11/2, 6/1
        assert_eq!(l[&PanelType::Status], PanelLayout::new(0, 3, 60, 5));
        assert_eq!(l[&PanelType::Balances], PanelLayout::new(0, 8, 60, 5));
        assert_eq!(l[&PanelType::Activity], PanelLayout::new(0, 13, 60, 6));
        assert_eq!(validate_layout(&l, Size::new(60, 20)), Ok(()));
    }

    #[test]
    fn degraded_always_includes_status() {
        let mut mgr = LayoutManager::default();
        mgr.set_priority(PanelType::Status, PanelPriority::Low);
        mgr.set_priority(PanelType::Logs, PanelPriority::Critical);
        let l = mgr.calculate_layout(Size::new(40, 12), None);
        assert!(l.contains_key(&PanelType::Status));
        assert!(l.contains_key(&PanelType::Logs));
        assert!(l.contains_key(&PanelType::Balances));
        assert!(!l.contains_key(&PanelType::Activity));
        // Stacked in tree order.
        assert!(l[&PanelType::Status].y < l[&PanelType::Balances].y);
        assert!(l[&PanelType::Balances].y < l[&PanelType::Logs].y);
    }

    #[test]
    fn tiny_terminal_drops_header_and_panels() {
        let l = layout(Size::new(10, 2));
        assert_eq!(l[&PanelType::Status], PanelLayout::new(0, 0, 10, 1));
        assert_eq!(l[&PanelType::Balances], PanelLayout::new(0, 1, 10, 1));
        assert!(!l.contains_key(&PanelType::Activity));
        assert!(layout(Size::new(0, 10)).is_empty());
    }

    #[test]
    fn layout_is_memoized_until_priorities_change() {
        let mut mgr = LayoutManager::default();
        let a = mgr.calculate_layout(Size::new(100, 40), None);
        let b = mgr.calculate_layout(Size::new(100, 40), None);
        assert_eq!(a, b);
        mgr.set_priority(PanelType::Logs, PanelPriority::Critical);
        let c = mgr.calculate_layout(Size::new(100, 40), None);
        assert_ne!(a[&PanelType::Logs], c[&PanelType::Logs]);
    }

    #[test]
    fn panel_layout_clamps() {
        let p = PanelLayout::new(-3, -1, 0, -5);
        assert_eq!(p, PanelLayout { x: 0, y: 0, width: 1, height: 1 });
    }

    #[test]
    fn validate_reports_violations() {
        let size = Size::new(40, 10);
        let mut l = PanelLayouts::new();
        l.insert(PanelType::Status, PanelLayout { x: -1, y: 0, width: 5, height: 5 });
        assert!(matches!(
            validate_layout(&l, size),
            Err(LayoutError::NegativeOrigin { panel: PanelType::Status, .. })
        ));

        l.insert(PanelType::Status, PanelLayout::new(0, 0, 41, 5));
        assert!(matches!(validate_layout(&l, size), Err(LayoutError::OutOfBounds { .. })));

        l.insert(PanelType::Status, PanelLayout::new(0, 0, 20, 5));
        l.insert(PanelType::Logs, PanelLayout::new(10, 4, 20, 5));
        let err = validate_layout(&l, size).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Overlap {
                first: PanelType::Status,
                second: PanelType::Logs
            }
        );
        assert_eq!(err.to_string(), "panels status and logs overlap");

        l.insert(PanelType::Logs, PanelLayout { x: 0, y: 5, width: 0, height: 5 });
        assert_eq!(
            validate_layout(&l, size),
            Err(LayoutError::EmptyArea { panel: PanelType::Logs })
        );
    }
}
