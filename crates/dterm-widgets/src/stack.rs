#![forbid(unsafe_code)]

//! Vertical and horizontal stacks.
//!
//! A stack runs in one of two modes:
//!
//! * **simple**: children follow each other with fixed `spacing` and are
//!   aligned leading/center/trailing against the widest child (or the
//!   tallest, for a horizontal stack);
//! * **flex**: placement is delegated to a [`FlexLayout`], with each
//!   child's [`Renderable::flex_properties`] as its factors.
//!
//! Both modes remember child placements from `measure` and replay them in
//! `render`.

use std::hash::Hasher;

use dterm_core::{Point, Rect, Size};
use dterm_layout::{FlexDirection, FlexLayout, FlexProperties};
use dterm_render::TerminalBuffer;

use crate::node::{DirtyReason, NodeState};
use crate::renderable::Renderable;

/// Stacking axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Cross-axis alignment in simple mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StackAlignment {
    #[default]
    Leading,
    Center,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Simple {
        spacing: u16,
        alignment: StackAlignment,
    },
    Flex(FlexLayout),
}

/// A container laying out its children along one axis.
pub struct Stack {
    node: NodeState,
    id: String,
    axis: Axis,
    mode: Mode,
    flex: FlexProperties,
    children: Vec<Box<dyn Renderable>>,
    /// Child areas relative to the stack origin, from the last `measure`.
    placements: Vec<Rect>,
}

impl Stack {
    /// A top-to-bottom stack.
    #[must_use]
    pub fn vstack(id: impl Into<String>) -> Self {
        Self::new(id, Axis::Vertical)
    }

    /// A left-to-right stack.
    #[must_use]
    pub fn hstack(id: impl Into<String>) -> Self {
        Self::new(id, Axis::Horizontal)
    }

    fn new(id: impl Into<String>, axis: Axis) -> Self {
        Self {
            node: NodeState::new(),
            id: id.into(),
            axis,
            mode: Mode::Simple {
                spacing: 0,
                alignment: StackAlignment::Leading,
            },
            flex: FlexProperties::default(),
            children: Vec::new(),
            placements: Vec::new(),
        }
    }

    /// Simple mode with `spacing` cells between children.
    #[must_use]
    pub fn spacing(mut self, spacing: u16) -> Self {
        let alignment = match self.mode {
            Mode::Simple { alignment, .. } => alignment,
            Mode::Flex(_) => StackAlignment::Leading,
        };
        self.mode = Mode::Simple { spacing, alignment };
        self
    }

    /// Simple mode with the given cross-axis alignment.
    #[must_use]
    pub fn alignment(mut self, alignment: StackAlignment) -> Self {
        let spacing = match self.mode {
            Mode::Simple { spacing, .. } => spacing,
            Mode::Flex(_) => 0,
        };
        self.mode = Mode::Simple { spacing, alignment };
        self
    }

    /// Switch to flex mode. The layout's direction is forced to the stack
    /// axis.
    #[must_use]
    pub fn flex(mut self, mut layout: FlexLayout) -> Self {
        layout.direction = match self.axis {
            Axis::Vertical => FlexDirection::Column,
            Axis::Horizontal => FlexDirection::Row,
        };
        self.mode = Mode::Flex(layout);
        self
    }

    /// Factors used when this stack is itself a flex child.
    #[must_use]
    pub fn flex_item(mut self, flex: FlexProperties) -> Self {
        self.flex = flex;
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Renderable + 'static) -> Self {
        self.push(Box::new(child));
        self
    }

    pub fn push(&mut self, child: Box<dyn Renderable>) {
        self.children.push(child);
        self.node.mark(DirtyReason::LAYOUT);
    }

    #[must_use]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child areas relative to the stack origin, as of the last `measure`.
    #[must_use]
    pub fn placements(&self) -> &[Rect] {
        &self.placements
    }

    fn main(&self, size: Size) -> u16 {
        match self.axis {
            Axis::Vertical => size.height,
            Axis::Horizontal => size.width,
        }
    }

    fn cross(&self, size: Size) -> u16 {
        match self.axis {
            Axis::Vertical => size.width,
            Axis::Horizontal => size.height,
        }
    }

    fn oriented(&self, main: u16, cross: u16) -> Size {
        match self.axis {
            Axis::Vertical => Size::new(cross, main),
            Axis::Horizontal => Size::new(main, cross),
        }
    }

    fn measure_simple(&mut self, available: Size, spacing: u16, alignment: StackAlignment) -> Size {
        let sizes: Vec<Size> = self
            .children
            .iter_mut()
            .map(|c| c.measure(available).min(available))
            .collect();
        let widest = sizes.iter().map(|s| self.cross(*s)).max().unwrap_or(0);
        let avail_main = u32::from(self.main(available));

        self.placements.clear();
        let mut pos = 0u32;
        for (i, size) in sizes.iter().enumerate() {
            if i > 0 {
                pos += u32::from(spacing);
            }
            let main = u32::from(self.main(*size));
            // Children starting past the end get an empty slot and are
            // skipped at render time.
            let start = pos.min(avail_main);
            let len = main.min(avail_main - start);
            let cross = self.cross(*size);
            let offset = match alignment {
                StackAlignment::Leading => 0,
                StackAlignment::Center => (widest - cross) / 2,
                StackAlignment::Trailing => widest - cross,
            };
            let extent = self.oriented(len as u16, cross);
            let (x, y) = match self.axis {
                Axis::Vertical => (i32::from(offset), start as i32),
                Axis::Horizontal => (start as i32, i32::from(offset)),
            };
            self.placements.push(Rect::new(x, y, extent.width, extent.height));
            pos += main;
        }
        self.settle(&sizes);
        let total = pos.min(avail_main) as u16;
        self.oriented(total, widest.min(self.cross(available)))
    }

    /// Re-measure every child whose slot differs from the size it asked for,
    /// so what it caches for `render` matches the area it is given.
    fn settle(&mut self, measured: &[Size]) {
        for ((child, rect), size) in self.children.iter_mut().zip(&self.placements).zip(measured) {
            if !rect.is_empty() && rect.size != *size {
                child.measure(rect.size);
            }
        }
    }

    fn measure_flex(&mut self, available: Size, layout: FlexLayout) -> Size {
        let props: Vec<FlexProperties> = self.children.iter().map(|c| c.flex_properties()).collect();
        let children = &mut self.children;
        let natural = layout.measure(available, &props, |i, s| children[i].measure(s));
        let mut sizes = vec![Size::ZERO; children.len()];
        self.placements = layout.arrange(Rect::from_size(available), &props, |i, s| {
            sizes[i] = children[i].measure(s);
            sizes[i]
        });
        self.settle(&sizes);
        let used = self.placements.iter().fold(Size::ZERO, |acc, r| {
            Size::new(
                acc.width.max(r.right().clamp(0, i32::from(u16::MAX)) as u16),
                acc.height.max(r.bottom().clamp(0, i32::from(u16::MAX)) as u16),
            )
        });
        // Growth may extend past the natural size; report what is occupied.
        Size::new(
            natural.width.max(used.width),
            natural.height.max(used.height),
        )
        .min(available)
    }
}

impl Renderable for Stack {
    fn id(&self) -> &str {
        &self.id
    }

    fn node(&self) -> &NodeState {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeState {
        &mut self.node
    }

    fn measure(&mut self, available: Size) -> Size {
        if self.children.is_empty() || available.is_empty() {
            self.placements.clear();
            return Size::ZERO;
        }
        match self.mode {
            Mode::Simple { spacing, alignment } => {
                self.measure_simple(available, spacing, alignment)
            }
            Mode::Flex(layout) => self.measure_flex(available, layout),
        }
    }

    fn render(&self, buffer: &mut TerminalBuffer, at: Point) {
        for (child, rect) in self.children.iter().zip(&self.placements) {
            if rect.is_empty() {
                continue;
            }
            let area = Rect::new(
                at.x.saturating_add(rect.x()),
                at.y.saturating_add(rect.y()),
                rect.width(),
                rect.height(),
            );
            child.render_in(buffer, area);
        }
    }

    fn children(&self) -> &[Box<dyn Renderable>] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut self.children
    }

    fn hash_content(&self, hasher: &mut dyn Hasher) {
        hasher.write_u8(match self.axis {
            Axis::Vertical => 0,
            Axis::Horizontal => 1,
        });
    }

    fn flex_properties(&self) -> FlexProperties {
        self.flex
    }
}
