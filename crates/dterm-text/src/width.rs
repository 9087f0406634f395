#![forbid(unsafe_code)]

//! Display width of grapheme clusters.
//!
//! ASCII graphemes take the fast path and measure as their byte length.
//! Everything else is classified per scalar: zero-width scalars contribute
//! nothing, wide East Asian scalars contribute two columns when the
//! environment enables CJK width, and the rest contribute one. A single
//! cluster never occupies more than two columns.

use dterm_core::TerminalEnv;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Iterate the extended grapheme clusters of `text`.
#[inline]
pub fn graphemes(text: &str) -> unicode_segmentation::Graphemes<'_> {
    text.graphemes(true)
}

/// Width in columns of a single grapheme cluster.
///
/// Non-ASCII clusters sum their scalar widths, capped at 2. Terminals draw a
/// joined sequence such as a ZWJ emoji family in one wide cell, so an
/// uncapped sum would put the tracked cursor ahead of the real one.
#[must_use]
pub fn grapheme_width(grapheme: &str, env: &TerminalEnv) -> usize {
    if grapheme.is_ascii() {
        return grapheme.len();
    }
    let width: usize = grapheme.chars().map(|c| scalar_width(c, env.cjk)).sum();
    width.min(2)
}

/// Width in columns of arbitrary text, summed over its graphemes.
#[must_use]
pub fn str_width(text: &str, env: &TerminalEnv) -> usize {
    if text.is_ascii() {
        return text.len();
    }
    graphemes(text).map(|g| grapheme_width(g, env)).sum()
}

#[inline]
fn scalar_width(c: char, cjk: bool) -> usize {
    if is_zero_width(c) {
        0
    } else if cjk && is_wide(c) {
        2
    } else {
        1
    }
}

/// Scalars that never occupy a column: controls, combining marks, zero-width
/// spaces and joiners, bidi controls, and variation selectors.
#[must_use]
pub fn is_zero_width(c: char) -> bool {
    let u = c as u32;
    matches!(u, 0x0000..=0x001F | 0x007F..=0x009F)
        || matches!(u, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
        || matches!(u, 0xFE20..=0xFE2F)
        || matches!(u, 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
        || matches!(
            u,
            0x00AD | 0x034F | 0x180E | 0x200B | 0x200C | 0x200D | 0x200E | 0x200F | 0x2060 | 0xFEFF
        )
        || matches!(u, 0x202A..=0x202E | 0x2066..=0x2069 | 0x206A..=0x206F)
}

/// East Asian Wide and Fullwidth scalars (Hangul, CJK ideographs and their
/// extensions, fullwidth forms, wide emoji).
#[inline]
#[must_use]
pub fn is_wide(c: char) -> bool {
    c.width() == Some(2)
}
