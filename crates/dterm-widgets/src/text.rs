#![forbid(unsafe_code)]

//! Single-line text leaf.

use std::hash::Hasher;

use dterm_core::{Point, Size};
use dterm_layout::FlexProperties;
use dterm_render::{Attr, TerminalBuffer};

use crate::metrics::TextMetrics;
use crate::node::{DirtyReason, NodeState};
use crate::renderable::Renderable;

/// One line of uniformly styled text.
///
/// Text wider than the measured width is cut at render time, so a label in
/// a narrow column never spills into its neighbour.
#[derive(Debug, Clone)]
pub struct Text {
    node: NodeState,
    id: String,
    content: String,
    attr: Attr,
    metrics: TextMetrics,
    flex: FlexProperties,
    /// Width chosen by the last `measure`.
    measured: u16,
}

impl Text {
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            node: NodeState::new(),
            id: id.into(),
            content: content.into(),
            attr: Attr::DEFAULT,
            metrics: TextMetrics::default(),
            flex: FlexProperties::default(),
            measured: 0,
        }
    }

    #[must_use]
    pub fn attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: TextMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn flex(mut self, flex: FlexProperties) -> Self {
        self.flex = flex;
        self
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the text, marking the node dirty when it changed.
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.content = content;
            self.node.mark(DirtyReason::STATE);
        }
    }

    pub fn set_attr(&mut self, attr: Attr) {
        if attr != self.attr {
            self.attr = attr;
            self.node.mark(DirtyReason::STYLE);
        }
    }
}

impl Renderable for Text {
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
        if available.is_empty() || self.content.is_empty() {
            self.measured = 0;
            return Size::ZERO;
        }
        let width = self.metrics.width(&self.content);
        self.measured = u16::try_from(width)
            .unwrap_or(u16::MAX)
            .min(available.width);
        Size::new(self.measured, 1)
    }

    fn render(&self, buffer: &mut TerminalBuffer, at: Point) {
        if self.measured == 0 {
            return;
        }
        let text = self
            .metrics
            .truncate(&self.content, usize::from(self.measured), "");
        buffer.write(&text, at, (!self.attr.is_default()).then_some(self.attr));
    }

    fn hash_content(&self, hasher: &mut dyn Hasher) {
        hasher.write(self.content.as_bytes());
        hasher.write_u8(self.attr.flags.bits());
        hasher.write_u16(self.attr.foreground.map_or(u16::MAX, u16::from));
        hasher.write_u16(self.attr.background.map_or(u16::MAX, u16::from));
    }

    fn flex_properties(&self) -> FlexProperties {
        self.flex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderable::structural_hash_of;

    #[test]
    fn measure_clips_to_available() {
        let mut t = Text::new("t", "hello world");
        assert_eq!(t.measure(Size::new(80, 1)), Size::new(11, 1));
        assert_eq!(t.measure(Size::new(5, 3)), Size::new(5, 1));
        assert_eq!(t.measure(Size::new(5, 0)), Size::ZERO);
        assert_eq!(Text::new("e", "").measure(Size::new(5, 5)), Size::ZERO);
    }

    #[test]
    fn measure_is_idempotent() {
        let mut t = Text::new("t", "\u{4E00}abc");
        let a = t.measure(Size::new(4, 2));
        let b = t.measure(Size::new(4, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn render_cuts_at_measured_width() {
        let mut t = Text::new("t", "abcdef");
        t.measure(Size::new(3, 1));
        let mut buf = TerminalBuffer::new(Size::new(10, 1));
        t.render(&mut buf, Point::new(1, 0));
        assert_eq!(buf.to_plain_lines(), vec![" abc"]);
    }

    #[test]
    fn render_out_of_bounds_is_noop() {
        let mut t = Text::new("t", "abc");
        t.measure(Size::new(10, 1));
        let mut buf = TerminalBuffer::new(Size::new(4, 1));
        t.render(&mut buf, Point::new(0, 5));
        t.render(&mut buf, Point::new(9, 0));
        assert_eq!(buf, TerminalBuffer::new(Size::new(4, 1)));
    }

    #[test]
    fn set_content_marks_dirty_only_on_change() {
        let mut t = Text::new("t", "a");
        t.clear_dirty();
        t.set_content("a");
        assert!(!t.is_dirty());
        t.set_content("b");
        assert_eq!(t.dirty_reasons(), DirtyReason::STATE);
    }

    #[test]
    fn hash_tracks_content_not_layout() {
        let mut t = Text::new("t", "a");
        let before = structural_hash_of(&t);
        t.measure(Size::new(1, 1));
        assert_eq!(before, structural_hash_of(&t));
        t.set_content("b");
        assert_ne!(before, structural_hash_of(&t));
    }
}
