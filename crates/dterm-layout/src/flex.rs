#![forbid(unsafe_code)]

//! Flexbox-style one-dimensional layout.
//!
//! Children are measured against the container's available size, the
//! remaining main-axis space is handed out in proportion to `grow` (or
//! taken back in proportion to `shrink`), and the result is positioned
//! according to [`JustifyContent`] along the main axis and [`AlignItems`]
//! across it.
//!
//! Integer division remainders are given one cell at a time to the first
//! eligible children, so growth and shrinkage are exact: when every cell of
//! slack can be absorbed, the children plus gaps fill the main axis exactly.
//!
//! # Example
//!
//! ```
//! use dterm_core::{Rect, Size};
//! use dterm_layout::{FlexLayout, FlexProperties};
//!
//! let flex = FlexLayout::row().gap(1);
//! let props = [FlexProperties::fixed(), FlexProperties::grow(1)];
//! let rects = flex.arrange(Rect::new(0, 0, 20, 1), &props, |_, _| Size::new(4, 1));
//! assert_eq!(rects[0], Rect::new(0, 0, 4, 1));
//! assert_eq!(rects[1], Rect::new(5, 0, 15, 1));
//! ```

use dterm_core::geometry::{Rect, Size};

/// Main axis of a flex container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlexDirection {
    /// Left to right.
    #[default]
    Row,
    /// Top to bottom.
    Column,
}

impl FlexDirection {
    #[inline]
    fn main(self, size: Size) -> u16 {
        match self {
            FlexDirection::Row => size.width,
            FlexDirection::Column => size.height,
        }
    }

    #[inline]
    fn cross(self, size: Size) -> u16 {
        match self {
            FlexDirection::Row => size.height,
            FlexDirection::Column => size.width,
        }
    }

    #[inline]
    fn size(self, main: u16, cross: u16) -> Size {
        match self {
            FlexDirection::Row => Size::new(main, cross),
            FlexDirection::Column => Size::new(cross, main),
        }
    }
}

/// Main-axis distribution of leftover space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JustifyContent {
    #[default]
    FlexStart,
    FlexEnd,
    Center,
    /// Leftover between items only. A single item sits at the start.
    SpaceBetween,
    /// Equal space around each item; edges get half a unit.
    SpaceAround,
    /// Equal space between items and at both edges.
    SpaceEvenly,
}

/// Cross-axis placement of each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlignItems {
    #[default]
    Start,
    End,
    Center,
    /// Fill the cross axis. Measurement is not redone.
    Stretch,
}

/// Per-child flex factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlexProperties {
    pub grow: u16,
    pub shrink: u16,
    /// Main-axis size used instead of the measured one.
    pub basis: Option<u16>,
}

impl Default for FlexProperties {
    fn default() -> Self {
        Self {
            grow: 0,
            shrink: 1,
            basis: None,
        }
    }
}

impl FlexProperties {
    /// Neither grows nor shrinks.
    #[must_use]
    pub const fn fixed() -> Self {
        Self {
            grow: 0,
            shrink: 0,
            basis: None,
        }
    }

    /// Grows with weight `weight` and shrinks with weight 1.
    #[must_use]
    pub const fn grow(weight: u16) -> Self {
        Self {
            grow: weight,
            shrink: 1,
            basis: None,
        }
    }

    #[must_use]
    pub const fn with_shrink(mut self, weight: u16) -> Self {
        self.shrink = weight;
        self
    }

    #[must_use]
    pub const fn with_basis(mut self, basis: u16) -> Self {
        self.basis = Some(basis);
        self
    }
}

/// A flex container configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlexLayout {
    pub direction: FlexDirection,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: u16,
}

impl FlexLayout {
    #[must_use]
    pub fn row() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column() -> Self {
        Self {
            direction: FlexDirection::Column,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn justify(mut self, justify: JustifyContent) -> Self {
        self.justify_content = justify;
        self
    }

    #[must_use]
    pub fn align(mut self, align: AlignItems) -> Self {
        self.align_items = align;
        self
    }

    #[must_use]
    pub fn gap(mut self, gap: u16) -> Self {
        self.gap = gap;
        self
    }

    /// Natural size of the container: children measured, summed along the
    /// main axis with gaps, maxed across it, then clipped to `available`.
    /// No grow or shrink is applied.
    pub fn measure<M>(&self, available: Size, children: &[FlexProperties], measure: M) -> Size
    where
        M: FnMut(usize, Size) -> Size,
    {
        if children.is_empty() {
            return Size::ZERO;
        }
        let sizes = self.measure_children(available, children, measure);
        let main = self.natural_main(&sizes);
        let cross = sizes
            .iter()
            .map(|s| self.direction.cross(*s))
            .max()
            .unwrap_or(0);
        let main = main.min(u32::from(self.direction.main(available)));
        self.direction
            .size(main as u16, cross.min(self.direction.cross(available)))
    }

    /// Final rectangle of each child inside `area`, in child order.
    pub fn arrange<M>(&self, area: Rect, children: &[FlexProperties], measure: M) -> Vec<Rect>
    where
        M: FnMut(usize, Size) -> Size,
    {
        let n = children.len();
        if n == 0 {
            return Vec::new();
        }
        let dir = self.direction;
        let available = area.size;
        let measured = self.measure_children(available, children, measure);

        let avail_main = i64::from(dir.main(available));
        let mut mains: Vec<u16> = measured.iter().map(|s| dir.main(*s)).collect();
        let remaining = avail_main - i64::from(self.natural_main(&measured));
        if remaining > 0 {
            grow(&mut mains, children, remaining as u64);
        } else if remaining < 0 {
            shrink(&mut mains, children, remaining.unsigned_abs());
        }

        let used = mains.iter().map(|&m| u32::from(m)).sum::<u32>() + self.total_gap(n);
        let leftover = (avail_main as u32).saturating_sub(used);
        let (start, between) = justify(self.justify_content, leftover, n);

        let avail_cross = dir.cross(available);
        let (main_origin, cross_origin) = match dir {
            FlexDirection::Row => (area.origin.x, area.origin.y),
            FlexDirection::Column => (area.origin.y, area.origin.x),
        };

        let mut pos = i64::from(main_origin) + i64::from(start);
        let mut rects = Vec::with_capacity(n);
        for (i, (&main, size)) in mains.iter().zip(&measured).enumerate() {
            let child_cross = dir.cross(*size).min(avail_cross);
            let (cross_offset, cross) = match self.align_items {
                AlignItems::Start => (0, child_cross),
                AlignItems::End => (avail_cross - child_cross, child_cross),
                AlignItems::Center => ((avail_cross - child_cross) / 2, child_cross),
                AlignItems::Stretch => (0, avail_cross),
            };
            let main_pos = clamp_i32(pos);
            let cross_pos = cross_origin.saturating_add(i32::from(cross_offset));
            rects.push(match dir {
                FlexDirection::Row => Rect::new(main_pos, cross_pos, main, cross),
                FlexDirection::Column => Rect::new(cross_pos, main_pos, cross, main),
            });
            pos += i64::from(main) + i64::from(self.gap) + i64::from(between(i));
        }
        rects
    }

    fn measure_children<M>(&self, available: Size, children: &[FlexProperties], mut measure: M) -> Vec<Size>
    where
        M: FnMut(usize, Size) -> Size,
    {
        children
            .iter()
            .enumerate()
            .map(|(i, props)| {
                let size = measure(i, available).min(available);
                match props.basis {
                    Some(basis) => {
                        let main = basis.min(self.direction.main(available));
                        self.direction.size(main, self.direction.cross(size))
                    }
                    None => size,
                }
            })
            .collect()
    }

    fn natural_main(&self, sizes: &[Size]) -> u32 {
        sizes
            .iter()
            .map(|s| u32::from(self.direction.main(*s)))
            .sum::<u32>()
            + self.total_gap(sizes.len())
    }

    fn total_gap(&self, n: usize) -> u32 {
        u32::from(self.gap) * n.saturating_sub(1) as u32
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Hand `extra` cells to children in proportion to `grow`.
fn grow(mains: &mut [u16], children: &[FlexProperties], extra: u64) {
    let total: u64 = children.iter().map(|c| u64::from(c.grow)).sum();
    if total == 0 {
        return;
    }
    let mut given = 0u64;
    for (main, props) in mains.iter_mut().zip(children) {
        let share = extra * u64::from(props.grow) / total;
        let share = share.min(u64::from(u16::MAX - *main));
        *main += share as u16;
        given += share;
    }
    let mut rest = extra - given;
    for (main, props) in mains.iter_mut().zip(children) {
        if rest == 0 {
            break;
        }
        if props.grow > 0 && *main < u16::MAX {
            *main += 1;
            rest -= 1;
        }
    }
}

/// Take `deficit` cells back in proportion to `shrink`. Children never go
/// below zero; what one cannot give is taken from the others.
fn shrink(mains: &mut [u16], children: &[FlexProperties], mut deficit: u64) {
    while deficit > 0 {
        let active: Vec<usize> = (0..mains.len())
            .filter(|&i| children[i].shrink > 0 && mains[i] > 0)
            .collect();
        let total: u64 = active.iter().map(|&i| u64::from(children[i].shrink)).sum();
        if total == 0 {
            return;
        }
        let mut taken = 0u64;
        for &i in &active {
            let cut = (deficit * u64::from(children[i].shrink) / total).min(u64::from(mains[i]));
            mains[i] -= cut as u16;
            taken += cut;
        }
        for &i in &active {
            if taken == deficit {
                break;
            }
            if mains[i] > 0 {
                mains[i] -= 1;
                taken += 1;
            }
        }
        if taken == 0 {
            return;
        }
        deficit -= taken;
    }
}

/// Initial offset and the extra space after item `i`.
fn justify(justify: JustifyContent, leftover: u32, n: usize) -> (u32, impl Fn(usize) -> u32) {
    let n = n as u32;
    let (start, unit, rem) = match justify {
        JustifyContent::FlexStart => (0, 0, 0),
        JustifyContent::FlexEnd => (leftover, 0, 0),
        JustifyContent::Center => (leftover / 2, 0, 0),
        JustifyContent::SpaceBetween if n > 1 => (0, leftover / (n - 1), leftover % (n - 1)),
        JustifyContent::SpaceBetween => (0, 0, 0),
        JustifyContent::SpaceAround => {
            let unit = leftover / n;
            (unit / 2, unit, 0)
        }
        JustifyContent::SpaceEvenly => {
            let unit = leftover / (n + 1);
            (unit, unit, 0)
        }
    };
    (start, move |i: usize| unit + u32::from((i as u32) < rem))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_measure(sizes: &'static [(u16, u16)]) -> impl FnMut(usize, Size) -> Size {
        move |i, _| Size::new(sizes[i].0, sizes[i].1)
    }

    fn xs(rects: &[Rect]) -> Vec<(i32, u16)> {
        rects.iter().map(|r| (r.x(), r.width())).collect()
    }

    #[test]
    fn zero_children() {
        let flex = FlexLayout::row();
        assert_eq!(flex.measure(Size::new(10, 10), &[], |_, s| s), Size::ZERO);
        assert!(flex.arrange(Rect::new(0, 0, 10, 10), &[], |_, s| s).is_empty());
    }

    #[test]
    fn measure_is_natural_size_without_distribution() {
        let flex = FlexLayout::row().gap(2);
        let props = [FlexProperties::grow(1); 2];
        let size = flex.measure(Size::new(40, 5), &props, fixed_measure(&[(3, 1), (5, 2)]));
        assert_eq!(size, Size::new(10, 2));
    }

    #[test]
    fn measure_clips_to_available() {
        let flex = FlexLayout::column();
        let props = [FlexProperties::fixed(); 3];
        let size = flex.measure(Size::new(4, 5), &props, fixed_measure(&[(9, 2), (1, 2), (1, 2)]));
        assert_eq!(size, Size::new(4, 5));
    }

    #[test]
    fn grow_distributes_proportionally_with_remainder_first() {
        let flex = FlexLayout::row();
        let props = [
            FlexProperties::grow(1),
            FlexProperties::grow(2),
            FlexProperties::fixed(),
        ];
        let rects = flex.arrange(
            Rect::new(0, 0, 20, 1),
            &props,
            fixed_measure(&[(2, 1), (2, 1), (2, 1)]),
        );
        // 14 extra: 14/3 = 4 and 28/3 = 9, one left over for the first grower.
        assert_eq!(xs(&rects), vec![(0, 7), (7, 11), (18, 2)]);
    }

    #[test]
    fn shrink_takes_back_overflow() {
        let flex = FlexLayout::row().gap(1);
        let props = [FlexProperties::default(), FlexProperties::fixed()];
        let rects = flex.arrange(
            Rect::new(0, 0, 10, 1),
            &props,
            fixed_measure(&[(8, 1), (4, 1)]),
        );
        assert_eq!(xs(&rects), vec![(0, 5), (6, 4)]);
    }

    #[test]
    fn shrink_spills_to_other_children() {
        let flex = FlexLayout::row();
        let props = [FlexProperties::default().with_shrink(10), FlexProperties::default()];
        let rects = flex.arrange(
            Rect::new(0, 0, 6, 1),
            &props,
            fixed_measure(&[(2, 1), (8, 1)]),
        );
        assert_eq!(xs(&rects), vec![(0, 0), (0, 6)]);
    }

    #[test]
    fn no_factors_leaves_space_unused() {
        let flex = FlexLayout::row().justify(JustifyContent::FlexEnd);
        let props = [FlexProperties::fixed(); 2];
        let rects = flex.arrange(
            Rect::new(0, 0, 10, 1),
            &props,
            fixed_measure(&[(2, 1), (3, 1)]),
        );
        assert_eq!(xs(&rects), vec![(5, 2), (7, 3)]);
    }

    #[test]
    fn justify_variants() {
        let props = [FlexProperties::fixed(); 3];
        let area = Rect::new(0, 0, 14, 1);
        let measure = || fixed_measure(&[(2, 1), (2, 1), (2, 1)]);
        let run = |j| xs(&FlexLayout::row().justify(j).arrange(area, &props, measure()));

        assert_eq!(run(JustifyContent::FlexStart), vec![(0, 2), (2, 2), (4, 2)]);
        assert_eq!(run(JustifyContent::Center), vec![(4, 2), (6, 2), (8, 2)]);
        // leftover 8 over 2 gaps
        assert_eq!(run(JustifyContent::SpaceBetween), vec![(0, 2), (6, 2), (12, 2)]);
        // unit 8/3 = 2, half a unit at the edge
        assert_eq!(run(JustifyContent::SpaceAround), vec![(1, 2), (5, 2), (9, 2)]);
        // unit 8/4 = 2
        assert_eq!(run(JustifyContent::SpaceEvenly), vec![(2, 2), (6, 2), (10, 2)]);
    }

    #[test]
    fn space_between_single_child_is_flex_start() {
        let flex = FlexLayout::row().justify(JustifyContent::SpaceBetween);
        let rects = flex.arrange(
            Rect::new(3, 0, 10, 1),
            &[FlexProperties::fixed()],
            fixed_measure(&[(4, 1)]),
        );
        assert_eq!(xs(&rects), vec![(3, 4)]);
    }

    #[test]
    fn align_items_cross_axis() {
        let props = [FlexProperties::fixed()];
        let area = Rect::new(0, 10, 5, 6);
        let place = |a| {
            let r = FlexLayout::row()
                .align(a)
                .arrange(area, &props, fixed_measure(&[(5, 2)]))[0];
            (r.y(), r.height())
        };
        assert_eq!(place(AlignItems::Start), (10, 2));
        assert_eq!(place(AlignItems::End), (14, 2));
        assert_eq!(place(AlignItems::Center), (12, 2));
        assert_eq!(place(AlignItems::Stretch), (10, 6));
    }

    #[test]
    fn column_direction_uses_height() {
        let flex = FlexLayout::column().gap(1);
        let props = [FlexProperties::fixed(), FlexProperties::grow(1)];
        let rects = flex.arrange(
            Rect::new(2, 1, 8, 10),
            &props,
            fixed_measure(&[(8, 3), (8, 1)]),
        );
        assert_eq!(rects, vec![Rect::new(2, 1, 8, 3), Rect::new(2, 5, 8, 6)]);
    }

    #[test]
    fn basis_overrides_measured_main() {
        let flex = FlexLayout::row();
        let props = [FlexProperties::fixed().with_basis(7)];
        let rects = flex.arrange(Rect::new(0, 0, 20, 1), &props, fixed_measure(&[(2, 1)]));
        assert_eq!(xs(&rects), vec![(0, 7)]);
    }
}
