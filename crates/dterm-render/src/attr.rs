#![forbid(unsafe_code)]

//! Text attributes and styled runs.

use bitflags::bitflags;

bitflags! {
    /// Boolean text styles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b0000_0001;
        const DIM       = 0b0000_0010;
        const ITALIC    = 0b0000_0100;
        const UNDERLINE = 0b0000_1000;
        const REVERSE   = 0b0001_0000;
    }
}

/// Styling for a span of text: optional 256-color indices plus flags.
///
/// The default value (no colors, no flags) is the terminal's reset state.
/// Nothing in the render path emits attribute ops for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attr {
    pub foreground: Option<u8>,
    pub background: Option<u8>,
    pub flags: AttrFlags,
}

impl Attr {
    pub const DEFAULT: Attr = Attr {
        foreground: None,
        background: None,
        flags: AttrFlags::empty(),
    };

    /// `true` when every field is unset.
    #[inline]
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.foreground.is_none() && self.background.is_none() && self.flags.is_empty()
    }

    #[must_use]
    pub const fn fg(mut self, index: u8) -> Self {
        self.foreground = Some(index);
        self
    }

    #[must_use]
    pub const fn bg(mut self, index: u8) -> Self {
        self.background = Some(index);
        self
    }

    #[must_use]
    pub fn with(mut self, flags: AttrFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn bold(self) -> Self {
        self.with(AttrFlags::BOLD)
    }

    #[must_use]
    pub fn dim(self) -> Self {
        self.with(AttrFlags::DIM)
    }

    #[must_use]
    pub fn reverse(self) -> Self {
        self.with(AttrFlags::REVERSE)
    }

    #[must_use]
    pub fn is_bold(&self) -> bool {
        self.flags.contains(AttrFlags::BOLD)
    }

    #[must_use]
    pub fn is_dim(&self) -> bool {
        self.flags.contains(AttrFlags::DIM)
    }

    #[must_use]
    pub fn is_italic(&self) -> bool {
        self.flags.contains(AttrFlags::ITALIC)
    }

    #[must_use]
    pub fn is_underline(&self) -> bool {
        self.flags.contains(AttrFlags::UNDERLINE)
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flags.contains(AttrFlags::REVERSE)
    }
}

/// A styled byte span within one line.
///
/// `start` and `length` are byte offsets into the line's UTF-8 text. Runs in
/// a line are sorted by `start` and never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrRun {
    pub start: usize,
    pub length: usize,
    pub attr: Attr,
}

impl AttrRun {
    #[inline]
    pub const fn new(start: usize, length: usize, attr: Attr) -> Self {
        Self {
            start,
            length,
            attr,
        }
    }

    /// One past the last byte covered.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.length
    }

    #[inline]
    pub const fn is_default(&self) -> bool {
        self.attr.is_default()
    }

    /// The part of this run inside `[start, end)`, if any.
    #[must_use]
    pub fn clipped(&self, start: usize, end: usize) -> Option<AttrRun> {
        let s = self.start.max(start);
        let e = self.end().min(end);
        (s < e).then(|| AttrRun::new(s, e - s, self.attr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_predicate_requires_every_field_unset() {
        assert!(Attr::DEFAULT.is_default());
        assert!(Attr::default().is_default());
        assert!(!Attr::default().fg(1).is_default());
        assert!(!Attr::default().bg(0).is_default());
        assert!(!Attr::default().bold().is_default());
    }

    #[test]
    fn flag_accessors() {
        let a = Attr::default().bold().dim().with(AttrFlags::UNDERLINE);
        assert!(a.is_bold() && a.is_dim() && a.is_underline());
        assert!(!a.is_italic() && !a.is_reverse());
    }

    #[test]
    fn clipped_run() {
        let r = AttrRun::new(4, 6, Attr::default().bold());
        assert_eq!(r.end(), 10);
        assert_eq!(r.clipped(0, 6), Some(AttrRun::new(4, 2, r.attr)));
        assert_eq!(r.clipped(8, 20), Some(AttrRun::new(8, 2, r.attr)));
        assert_eq!(r.clipped(10, 12), None);
    }
}
