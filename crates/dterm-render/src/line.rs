#![forbid(unsafe_code)]

//! One row of terminal content: UTF-8 text plus styled runs.
//!
//! A line is a contiguous sequence of grapheme clusters starting at column
//! zero. Attribute runs address the text by byte offset, so two lines compare
//! equal exactly when their bytes and runs match; the differ relies on this
//! being cheap (length mismatch short-circuits).

use std::ops::Range;

use dterm_core::TerminalEnv;
use dterm_text::{grapheme_width, str_width};
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::attr::{Attr, AttrRun};

type Runs = SmallVec<[AttrRun; 4]>;

/// A styled line of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Line {
    text: String,
    attrs: Runs,
}

/// A grapheme cluster positioned within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph<'a> {
    pub text: &'a str,
    /// Byte offset of the cluster in the line.
    pub byte: usize,
    /// First column occupied.
    pub col: usize,
    /// Columns occupied (0, 1 or 2).
    pub width: usize,
    pub attr: Attr,
}

/// A byte range of a line with uniform styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub range: Range<usize>,
    /// The styling run clipped to `range`, or `None` for default styling.
    pub run: Option<AttrRun>,
}

impl Line {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A line whose whole text carries `attr`.
    #[must_use]
    pub fn styled(text: impl Into<String>, attr: Attr) -> Self {
        let text = text.into();
        let len = text.len();
        let mut line = Self {
            text,
            attrs: Runs::new(),
        };
        line.push_run(AttrRun::new(0, len, attr));
        line
    }

    /// Builder form of [`Line::push_run`].
    #[must_use]
    pub fn with_run(mut self, run: AttrRun) -> Self {
        self.push_run(run);
        self
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[inline]
    pub fn attrs(&self) -> &[AttrRun] {
        &self.attrs
    }

    /// Display width in columns.
    #[must_use]
    pub fn width(&self, env: &TerminalEnv) -> usize {
        str_width(&self.text, env)
    }

    /// Style the bytes covered by `run`, replacing any styling already there.
    ///
    /// The run is clamped to the text and widened to char boundaries. A
    /// default-styled run clears styling from its range.
    pub fn push_run(&mut self, run: AttrRun) {
        let len = self.text.len();
        let start = floor_char_boundary(&self.text, run.start.min(len));
        let end = ceil_char_boundary(&self.text, run.end().min(len));
        if start >= end {
            return;
        }

        let mut next = Runs::new();
        for existing in self.attrs.drain(..) {
            if let Some(left) = existing.clipped(existing.start, start) {
                next.push(left);
            }
            if let Some(right) = existing.clipped(end, existing.end()) {
                next.push(right);
            }
        }
        if !run.attr.is_default() {
            next.push(AttrRun::new(start, end - start, run.attr));
        }
        next.sort_by_key(|r| r.start);
        self.attrs = next;
    }

    /// Styling in effect at byte offset `byte`.
    #[must_use]
    pub fn attr_at(&self, byte: usize) -> Attr {
        self.attrs
            .iter()
            .find(|r| r.start <= byte && byte < r.end())
            .map_or(Attr::DEFAULT, |r| r.attr)
    }

    /// The first run with non-default styling.
    #[must_use]
    pub fn leading_styled_run(&self) -> Option<&AttrRun> {
        self.attrs.iter().find(|r| !r.is_default())
    }

    /// Split `range` into pieces of uniform styling, in order.
    #[must_use]
    pub fn segments(&self, range: Range<usize>) -> SmallVec<[Segment; 4]> {
        let mut out = SmallVec::new();
        let mut pos = range.start;
        for run in self.attrs.iter().filter(|r| !r.is_default()) {
            if run.end() <= pos {
                continue;
            }
            if run.start >= range.end {
                break;
            }
            if run.start > pos {
                out.push(Segment {
                    range: pos..run.start,
                    run: None,
                });
            }
            if let Some(clip) = run.clipped(pos, range.end) {
                pos = clip.end();
                out.push(Segment {
                    range: clip.start..clip.end(),
                    run: Some(clip),
                });
            }
        }
        if pos < range.end {
            out.push(Segment {
                range: pos..range.end,
                run: None,
            });
        }
        out
    }

    /// Grapheme clusters with their columns and styling.
    pub fn glyphs<'a>(&'a self, env: &'a TerminalEnv) -> impl Iterator<Item = Glyph<'a>> + 'a {
        let mut col = 0usize;
        let mut runs = self.attrs.iter().peekable();
        self.text.grapheme_indices(true).map(move |(byte, text)| {
            while runs.peek().is_some_and(|r| r.end() <= byte) {
                runs.next();
            }
            let attr = runs
                .peek()
                .filter(|r| r.start <= byte)
                .map_or(Attr::DEFAULT, |r| r.attr);
            let width = grapheme_width(text, env);
            let glyph = Glyph {
                text,
                byte,
                col,
                width,
                attr,
            };
            col += width;
            glyph
        })
    }

    /// Overwrite columns starting at `col` with `text` styled `attr`.
    ///
    /// Text past `max_cols` is clipped. Writing past the current end pads
    /// with blanks. A wide glyph cut by either edge of the written span is
    /// replaced by blanks so columns stay aligned. ASCII control characters
    /// are drawn as blanks and stray zero-width clusters are dropped.
    pub fn overlay(
        &mut self,
        col: usize,
        text: &str,
        attr: Attr,
        max_cols: usize,
        env: &TerminalEnv,
    ) {
        if col >= max_cols {
            return;
        }
        let mut incoming: SmallVec<[(&str, usize); 32]> = SmallVec::new();
        let mut end = col;
        for g in text.graphemes(true) {
            let (g, w) = if g.is_ascii() && g.bytes().any(|b| b < 0x20 || b == 0x7f) {
                (" ", 1)
            } else {
                (g, grapheme_width(g, env))
            };
            if w == 0 {
                continue;
            }
            if end + w > max_cols {
                break;
            }
            incoming.push((g, w));
            end += w;
        }
        if end == col {
            return;
        }

        let mut out = LineBuilder::with_capacity(self.text.len() + text.len());
        let mut old_width = 0usize;
        let mut after: SmallVec<[Glyph<'_>; 16]> = SmallVec::new();
        let mut tail_pad: Option<(usize, Attr)> = None;
        for g in self.glyphs(env) {
            old_width = g.col + g.width;
            if g.col + g.width <= col {
                out.push(g.text, g.attr);
            } else if g.col >= end {
                after.push(g);
            } else {
                if g.col < col {
                    out.push_blanks(col - g.col, g.attr);
                }
                if g.col + g.width > end {
                    tail_pad = Some((g.col + g.width - end, g.attr));
                }
            }
        }
        if old_width < col {
            out.push_blanks(col - old_width, Attr::DEFAULT);
        }
        for (g, _) in &incoming {
            out.push(g, attr);
        }
        if let Some((n, pad_attr)) = tail_pad {
            out.push_blanks(n, pad_attr);
        }
        for g in &after {
            out.push(g.text, g.attr);
        }
        drop(after);
        *self = out.finish();
    }
}

impl From<&str> for Line {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            attrs: Runs::new(),
        }
    }
}

impl From<String> for Line {
    fn from(text: String) -> Self {
        Self {
            text,
            attrs: Runs::new(),
        }
    }
}

/// Incrementally assemble a [`Line`] from styled pieces.
///
/// Adjacent pieces with identical non-default styling merge into one run.
#[derive(Debug, Default)]
pub struct LineBuilder {
    text: String,
    attrs: Runs,
}

impl LineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            text: String::with_capacity(bytes),
            attrs: Runs::new(),
        }
    }

    pub fn push(&mut self, text: &str, attr: Attr) -> &mut Self {
        let start = self.text.len();
        self.text.push_str(text);
        self.extend_run(start, text.len(), attr);
        self
    }

    pub fn push_blanks(&mut self, count: usize, attr: Attr) -> &mut Self {
        let start = self.text.len();
        self.text.extend(std::iter::repeat_n(' ', count));
        self.extend_run(start, count, attr);
        self
    }

    #[must_use]
    pub fn finish(self) -> Line {
        Line {
            text: self.text,
            attrs: self.attrs,
        }
    }

    fn extend_run(&mut self, start: usize, len: usize, attr: Attr) {
        if len == 0 || attr.is_default() {
            return;
        }
        if let Some(last) = self.attrs.last_mut()
            && last.attr == attr
            && last.end() == start
        {
            last.length += len;
            return;
        }
        self.attrs.push(AttrRun::new(start, len, attr));
    }
}

pub(crate) fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

pub(crate) fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV: TerminalEnv = TerminalEnv::modern();

    fn bold() -> Attr {
        Attr::default().bold()
    }

    #[test]
    fn equality_is_bytes_plus_attrs() {
        assert_eq!(Line::from("abc"), Line::from("abc"));
        assert_ne!(Line::from("abc"), Line::from("abd"));
        assert_ne!(Line::from("abc"), Line::styled("abc", bold()));
    }

    #[test]
    fn styled_with_default_attr_has_no_runs() {
        assert!(Line::styled("abc", Attr::DEFAULT).attrs().is_empty());
    }

    #[test]
    fn push_run_replaces_overlap_and_keeps_order() {
        let red = Attr::default().fg(1);
        let line = Line::from("abcdefgh")
            .with_run(AttrRun::new(0, 6, red))
            .with_run(AttrRun::new(2, 2, bold()));
        assert_eq!(
            line.attrs(),
            &[
                AttrRun::new(0, 2, red),
                AttrRun::new(2, 2, bold()),
                AttrRun::new(4, 2, red),
            ]
        );
    }

    #[test]
    fn push_run_snaps_to_char_boundaries() {
        let line = Line::from("a\u{4E00}b").with_run(AttrRun::new(2, 1, bold()));
        assert_eq!(line.attrs(), &[AttrRun::new(1, 3, bold())]);
    }

    #[test]
    fn default_run_clears_styling() {
        let line = Line::styled("abcd", bold()).with_run(AttrRun::new(1, 2, Attr::DEFAULT));
        assert_eq!(
            line.attrs(),
            &[AttrRun::new(0, 1, bold()), AttrRun::new(3, 1, bold())]
        );
    }

    #[test]
    fn segments_split_on_runs() {
        let line = Line::from("0123456789").with_run(AttrRun::new(3, 3, bold()));
        let segs = line.segments(0..10);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].range, 0..3);
        assert!(segs[0].run.is_none());
        assert_eq!(segs[1].run, Some(AttrRun::new(3, 3, bold())));
        assert_eq!(segs[2].range, 6..10);

        let partial = line.segments(4..8);
        assert_eq!(partial[0].run, Some(AttrRun::new(4, 2, bold())));
        assert_eq!(partial[1].range, 6..8);
    }

    #[test]
    fn glyph_columns_account_for_wide_chars() {
        let line = Line::from("a\u{4E00}b");
        let cols: Vec<_> = line.glyphs(&ENV).map(|g| (g.col, g.width)).collect();
        assert_eq!(cols, vec![(0, 1), (1, 2), (3, 1)]);
    }

    #[test]
    fn overlay_pads_past_end() {
        let mut line = Line::from("ab");
        line.overlay(4, "xy", bold(), 80, &ENV);
        assert_eq!(line.as_str(), "ab  xy");
        assert_eq!(line.attrs(), &[AttrRun::new(4, 2, bold())]);
    }

    #[test]
    fn overlay_replaces_middle_and_keeps_tail_style() {
        let mut line = Line::styled("abcdef", Attr::default().fg(2));
        line.overlay(2, "XY", Attr::DEFAULT, 80, &ENV);
        assert_eq!(line.as_str(), "abXYef");
        assert_eq!(
            line.attrs(),
            &[
                AttrRun::new(0, 2, Attr::default().fg(2)),
                AttrRun::new(4, 2, Attr::default().fg(2)),
            ]
        );
    }

    #[test]
    fn overlay_clips_at_max_cols() {
        let mut line = Line::new();
        line.overlay(0, "hello world", Attr::DEFAULT, 5, &ENV);
        assert_eq!(line.as_str(), "hello");
        line.overlay(5, "more", Attr::DEFAULT, 5, &ENV);
        assert_eq!(line.as_str(), "hello");
    }

    #[test]
    fn overlay_splitting_wide_glyph_leaves_blanks() {
        let mut line = Line::from("a\u{4E00}b");
        line.overlay(2, "x", Attr::DEFAULT, 80, &ENV);
        assert_eq!(line.as_str(), "a xb");

        let mut line = Line::from("a\u{4E00}b");
        line.overlay(1, "y", Attr::DEFAULT, 80, &ENV);
        assert_eq!(line.as_str(), "ay b");
    }

    #[test]
    fn overlay_wide_glyph_does_not_split_at_edge() {
        let mut line = Line::new();
        line.overlay(0, "ab\u{4E00}", Attr::DEFAULT, 3, &ENV);
        assert_eq!(line.as_str(), "ab");
    }

    #[test]
    fn overlay_sanitizes_controls() {
        let mut line = Line::new();
        line.overlay(0, "a\tb", Attr::DEFAULT, 80, &ENV);
        assert_eq!(line.as_str(), "a b");

        let mut line = Line::new();
        line.overlay(0, "\u{200D}x", Attr::DEFAULT, 80, &ENV);
        assert_eq!(line.as_str(), "x");
    }

    #[test]
    fn builder_merges_adjacent_equal_runs() {
        let mut b = LineBuilder::new();
        b.push("ab", bold()).push("cd", bold()).push("ef", Attr::DEFAULT);
        let line = b.finish();
        assert_eq!(line.attrs(), &[AttrRun::new(0, 4, bold())]);
        assert_eq!(line.leading_styled_run(), Some(&AttrRun::new(0, 4, bold())));
        assert_eq!(line.attr_at(5), Attr::DEFAULT);
    }
}
