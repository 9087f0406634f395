#![forbid(unsafe_code)]

//! Bordered panel around a single body component.

use std::hash::Hasher;

use dterm_core::{GlyphPolicy, Point, Rect, Size};
use dterm_render::{Attr, TerminalBuffer};

use crate::metrics::TextMetrics;
use crate::node::{DirtyReason, NodeState};
use crate::renderable::Renderable;

const BORDER: Attr = Attr::DEFAULT.fg(8);
const FOCUSED_BORDER: Attr = Attr::DEFAULT.fg(6);

/// A titled box. The body is measured against the inner area (the panel
/// size minus the border) and drawn inside it.
pub struct Panel {
    node: NodeState,
    id: String,
    title: String,
    glyphs: GlyphPolicy,
    metrics: TextMetrics,
    focused: bool,
    body: Vec<Box<dyn Renderable>>,
    extent: Size,
}

impl Panel {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: Box<dyn Renderable>) -> Self {
        Self {
            node: NodeState::new(),
            id: id.into(),
            title: title.into(),
            glyphs: GlyphPolicy::default(),
            metrics: TextMetrics::default(),
            focused: false,
            body: vec![body],
            extent: Size::ZERO,
        }
    }

    #[must_use]
    pub fn glyphs(mut self, glyphs: GlyphPolicy) -> Self {
        self.glyphs = glyphs;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: TextMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    fn inner(&self) -> Option<Size> {
        (self.extent.width > 2 && self.extent.height > 2)
            .then(|| Size::new(self.extent.width - 2, self.extent.height - 2))
    }

    fn draw_border(&self, buffer: &mut TerminalBuffer, at: Point) {
        let Size { width, height } = self.extent;
        if width < 2 || height < 2 {
            return;
        }
        let b = self.glyphs.border;
        let attr = Some(if self.focused {
            FOCUSED_BORDER.bold()
        } else {
            BORDER
        });
        let span = usize::from(width - 2);

        let mut top = String::with_capacity(usize::from(width) * 3);
        top.push(b.top_left);
        let title = self
            .metrics
            .truncate(&self.title, span.saturating_sub(3), self.glyphs.icons.ellipsis);
        let mut used = 0;
        if !title.is_empty() && span >= 4 {
            top.push(b.horizontal);
            top.push(' ');
            top.push_str(&title);
            top.push(' ');
            used = self.metrics.width(&title) + 3;
        }
        top.extend(std::iter::repeat_n(b.horizontal, span.saturating_sub(used)));
        top.push(b.top_right);
        buffer.write(&top, at, attr);

        let right = at.x.saturating_add(i32::from(width) - 1);
        for dy in 1..i32::from(height) - 1 {
            let y = at.y.saturating_add(dy);
            buffer.write(&b.vertical.to_string(), Point::new(at.x, y), attr);
            buffer.write(&b.vertical.to_string(), Point::new(right, y), attr);
        }

        let mut bottom = String::with_capacity(usize::from(width) * 3);
        bottom.push(b.bottom_left);
        bottom.extend(std::iter::repeat_n(b.horizontal, span));
        bottom.push(b.bottom_right);
        buffer.write(
            &bottom,
            Point::new(at.x, at.y.saturating_add(i32::from(height) - 1)),
            attr,
        );
    }
}

impl Renderable for Panel {
    fn id(&self) -> &str {
        &self.id
    }

    fn node(&self) -> &NodeState {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeState {
        &mut self.node
    }

    /// Panels fill whatever they are given.
    fn measure(&mut self, available: Size) -> Size {
        self.extent = available;
        if let Some(inner) = self.inner() {
            for body in &mut self.body {
                body.measure(inner);
            }
        }
        available
    }

    fn render(&self, buffer: &mut TerminalBuffer, at: Point) {
        self.draw_border(buffer, at);
        if let Some(inner) = self.inner() {
            let area = Rect {
                origin: at.offset(1, 1),
                size: inner,
            };
            for body in &self.body {
                body.render_in(buffer, area);
            }
        }
    }

    fn children(&self) -> &[Box<dyn Renderable>] {
        &self.body
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut self.body
    }

    fn hash_content(&self, hasher: &mut dyn Hasher) {
        hasher.write(self.title.as_bytes());
        hasher.write_u8(u8::from(self.focused));
    }

    fn on_focus_change(&mut self, focused: bool) {
        if self.focused != focused {
            self.focused = focused;
            self.node.mark(DirtyReason::FOCUS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Text;
    use dterm_core::GlyphMode;

    fn panel(title: &str, body: &str) -> Panel {
        Panel::new("p", title, Box::new(Text::new("body", body)))
            .glyphs(GlyphPolicy::for_mode(GlyphMode::Ascii))
    }

    fn draw(p: &mut Panel, size: Size) -> Vec<String> {
        assert_eq!(p.measure(size), size);
        let mut buf = TerminalBuffer::new(size);
        p.render(&mut buf, Point::ZERO);
        buf.to_plain_lines()
    }

    #[test]
    fn draws_border_title_and_body() {
        let lines = draw(&mut panel("Prices", "BTC 1.0"), Size::new(16, 4));
        assert_eq!(lines[0], "+- Prices -----+");
        assert_eq!(lines[1], "|BTC 1.0       |");
        assert_eq!(lines[2], "|              |");
        assert_eq!(lines[3], "+--------------+");
    }

    #[test]
    fn body_is_clipped_to_inner_area() {
        let lines = draw(&mut panel("", "a very long body line"), Size::new(8, 3));
        assert_eq!(lines[1], "|a very|");
        assert_eq!(lines[0], "+------+");
    }

    #[test]
    fn long_title_is_truncated() {
        let lines = draw(&mut panel("Automation status", "x"), Size::new(12, 3));
        assert_eq!(lines[0], "+- Automa~ +");
    }

    #[test]
    fn degenerate_sizes_do_not_panic() {
        for size in [Size::new(1, 1), Size::new(2, 2), Size::new(3, 1), Size::new(0, 5)] {
            let _ = draw(&mut panel("t", "x"), size);
        }
    }

    #[test]
    fn focus_change_marks_dirty() {
        let mut p = panel("t", "x");
        p.clear_dirty();
        p.on_focus_change(false);
        assert!(!p.is_dirty());
        p.on_focus_change(true);
        assert_eq!(p.dirty_reasons(), DirtyReason::FOCUS);
        assert!(p.is_focused());
    }
}
