#![forbid(unsafe_code)]

//! Frame buffer: one rendered frame as a list of styled lines.
//!
//! A fresh buffer is created for every render pass. The previous pass's
//! buffer is kept only so the differ can compare against it.

use std::borrow::Cow;

use dterm_core::{Point, Size, TerminalEnv};
use dterm_text::{grapheme_width, str_width};
use unicode_segmentation::UnicodeSegmentation;

use crate::attr::Attr;
use crate::line::Line;

/// A grid of [`Line`]s owning exactly `size.height` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalBuffer {
    lines: Vec<Line>,
    size: Size,
    env: TerminalEnv,
}

impl TerminalBuffer {
    /// An empty buffer for a modern terminal.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self::with_env(size, TerminalEnv::default())
    }

    /// An empty buffer whose column math follows `env`.
    #[must_use]
    pub fn with_env(size: Size, env: TerminalEnv) -> Self {
        Self {
            lines: vec![Line::new(); usize::from(size.height)],
            size,
            env,
        }
    }

    /// Build a buffer from prepared lines. Extra lines are dropped and
    /// missing lines are blank; lines are not re-clipped to `width`.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = Line>, size: Size, env: TerminalEnv) -> Self {
        let mut lines: Vec<Line> = lines
            .into_iter()
            .take(usize::from(size.height))
            .collect();
        lines.resize(usize::from(size.height), Line::new());
        Self { lines, size, env }
    }

    #[inline]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[inline]
    pub const fn env(&self) -> &TerminalEnv {
        &self.env
    }

    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[inline]
    pub fn line(&self, y: usize) -> Option<&Line> {
        self.lines.get(y)
    }

    /// Overlay `text` at `at`, clipping to the buffer bounds.
    ///
    /// Rows outside the buffer are a silent no-op. Columns left of zero are
    /// clipped from the start of the text, columns past the width from the
    /// end. `attributes` of `None` writes default-styled text.
    pub fn write(&mut self, text: &str, at: Point, attributes: Option<Attr>) {
        if at.y < 0 || at.y >= i32::from(self.size.height) {
            return;
        }
        let width = usize::from(self.size.width);
        if at.x >= i32::from(self.size.width) || width == 0 {
            return;
        }
        let attr = attributes.unwrap_or_default();
        let env = self.env;
        let y = at.y as usize;

        let (col, text) = if at.x < 0 {
            match skip_columns(text, at.x.unsigned_abs() as usize, &env) {
                Some(clipped) => clipped,
                None => return,
            }
        } else {
            (at.x as usize, Cow::Borrowed(text))
        };

        if let Some(line) = self.lines.get_mut(y) {
            line.overlay(col, &text, attr, width, &env);
        }
    }

    /// Overlay a styled line at `at`, keeping each run's styling.
    ///
    /// Clipping follows [`write`](Self::write) piece by piece.
    pub fn write_line(&mut self, line: &Line, at: Point) {
        if at.y < 0 || at.y >= i32::from(self.size.height) {
            return;
        }
        let mut x = at.x;
        for seg in line.segments(0..line.len()) {
            let text = &line.as_str()[seg.range];
            if x >= i32::from(self.size.width) {
                break;
            }
            self.write(text, Point::new(x, at.y), seg.run.map(|r| r.attr));
            let cols = str_width(text, &self.env);
            x = x.saturating_add(i32::try_from(cols).unwrap_or(i32::MAX));
        }
    }

    /// Fill `count` columns starting at `at` with `ch`.
    pub fn fill(&mut self, ch: char, count: usize, at: Point, attributes: Option<Attr>) {
        if count == 0 {
            return;
        }
        let text: String = std::iter::repeat_n(ch, count).collect();
        self.write(&text, at, attributes);
    }

    /// Reset every line to blank.
    pub fn clear(&mut self) {
        for line in &mut self.lines {
            *line = Line::new();
        }
    }

    /// Plain text of each line, for assertions and fallback logging.
    #[must_use]
    pub fn to_plain_lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.as_str().to_owned()).collect()
    }
}

/// Drop the first `skip` columns of `text`. A wide glyph straddling the cut
/// becomes a blank. Returns `None` when nothing remains.
fn skip_columns<'a>(
    text: &'a str,
    skip: usize,
    env: &TerminalEnv,
) -> Option<(usize, Cow<'a, str>)> {
    let mut col = 0usize;
    for (byte, g) in text.grapheme_indices(true) {
        if col >= skip {
            return Some((0, Cow::Borrowed(&text[byte..])));
        }
        let w = grapheme_width(g, env);
        if col + w > skip {
            let rest = &text[byte + g.len()..];
            let blanks = col + w - skip;
            let mut owned = " ".repeat(blanks);
            owned.push_str(rest);
            return Some((0, Cow::Owned(owned)));
        }
        col += w;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(w: u16, h: u16) -> TerminalBuffer {
        TerminalBuffer::new(Size::new(w, h))
    }

    #[test]
    fn owns_exactly_height_lines() {
        let b = buf(10, 4);
        assert_eq!(b.lines().len(), 4);
        assert!(b.lines().iter().all(Line::is_empty));
    }

    #[test]
    fn write_at_offset() {
        let mut b = buf(10, 2);
        b.write("hi", Point::new(3, 1), None);
        assert_eq!(b.line(1).map(Line::as_str), Some("   hi"));
    }

    #[test]
    fn out_of_bounds_rows_and_columns_are_noops() {
        let mut b = buf(5, 2);
        b.write("x", Point::new(0, -1), None);
        b.write("x", Point::new(0, 2), None);
        b.write("x", Point::new(5, 0), None);
        assert_eq!(b, buf(5, 2));
    }

    #[test]
    fn negative_x_clips_leading_columns() {
        let mut b = buf(10, 1);
        b.write("abcdef", Point::new(-2, 0), None);
        assert_eq!(b.line(0).map(Line::as_str), Some("cdef"));
        b.write("zz", Point::new(-5, 0), None);
        assert_eq!(b.line(0).map(Line::as_str), Some("cdef"));
    }

    #[test]
    fn negative_x_cutting_wide_glyph_leaves_blank() {
        let mut b = buf(10, 1);
        b.write("\u{4E00}b", Point::new(-1, 0), None);
        assert_eq!(b.line(0).map(Line::as_str), Some(" b"));
    }

    #[test]
    fn write_clips_at_width() {
        let mut b = buf(4, 1);
        b.write("abcdef", Point::new(1, 0), Some(Attr::default().bold()));
        assert_eq!(b.line(0).map(Line::as_str), Some(" abc"));
        assert_eq!(b.line(0).map(|l| l.attrs().len()), Some(1));
    }

    #[test]
    fn write_line_keeps_runs() {
        let mut b = buf(12, 1);
        let mut builder = crate::line::LineBuilder::new();
        builder.push("BTC", Attr::default().bold());
        builder.push(" 1.5", Attr::DEFAULT);
        b.write_line(&builder.finish(), Point::new(2, 0));
        let line = b.line(0).cloned().unwrap_or_default();
        assert_eq!(line.as_str(), "  BTC 1.5");
        assert!(line.attr_at(2).is_bold());
        assert!(line.attr_at(5).is_default());
    }

    #[test]
    fn write_line_clips_and_skips_offscreen_rows() {
        let mut b = buf(4, 1);
        b.write_line(&Line::from("abcdef"), Point::new(1, 0));
        assert_eq!(b.line(0).map(Line::as_str), Some(" abc"));
        b.write_line(&Line::from("zz"), Point::new(0, 3));
        assert_eq!(b.line(0).map(Line::as_str), Some(" abc"));
    }

    #[test]
    fn fill_and_clear() {
        let mut b = buf(6, 1);
        b.fill('-', 4, Point::new(1, 0), None);
        assert_eq!(b.to_plain_lines(), vec![" ----".to_string()]);
        b.clear();
        assert_eq!(b.to_plain_lines(), vec![String::new()]);
    }

    #[test]
    fn from_lines_pads_and_truncates() {
        let env = TerminalEnv::modern();
        let b = TerminalBuffer::from_lines(["a".into(), "b".into(), "c".into()], Size::new(4, 2), env);
        assert_eq!(b.to_plain_lines(), vec!["a".to_string(), "b".to_string()]);
        let b = TerminalBuffer::from_lines([Line::from("a")], Size::new(4, 3), env);
        assert_eq!(b.lines().len(), 3);
    }
}
