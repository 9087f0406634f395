#![forbid(unsafe_code)]

//! Column measurement shared by text-bearing components.

use dterm_core::TerminalEnv;
use dterm_text::{SharedWidthCache, graphemes, str_width};

/// Terminal environment plus an optional shared width cache.
///
/// Cloning is cheap; clones share the cache.
#[derive(Debug, Clone, Default)]
pub struct TextMetrics {
    env: TerminalEnv,
    cache: Option<SharedWidthCache>,
}

impl TextMetrics {
    #[must_use]
    pub fn new(env: TerminalEnv) -> Self {
        Self { env, cache: None }
    }

    #[must_use]
    pub fn with_cache(env: TerminalEnv, cache: SharedWidthCache) -> Self {
        Self {
            env,
            cache: Some(cache),
        }
    }

    #[inline]
    #[must_use]
    pub const fn env(&self) -> &TerminalEnv {
        &self.env
    }

    /// Display columns of `text`.
    #[must_use]
    pub fn width(&self, text: &str) -> usize {
        match &self.cache {
            Some(cache) => cache.str_width(text, &self.env),
            None => str_width(text, &self.env),
        }
    }

    fn grapheme_width(&self, grapheme: &str) -> usize {
        match &self.cache {
            Some(cache) => cache.width(grapheme, &self.env),
            None => str_width(grapheme, &self.env),
        }
    }

    /// Cut `text` to at most `max_cols` columns, ending with `ellipsis`
    /// when anything was dropped.
    #[must_use]
    pub fn truncate(&self, text: &str, max_cols: usize, ellipsis: &str) -> String {
        if self.width(text) <= max_cols {
            return text.to_owned();
        }
        let marker = self.width(ellipsis);
        let (budget, marker) = if marker < max_cols {
            (max_cols - marker, ellipsis)
        } else {
            (max_cols, "")
        };
        let mut out = String::with_capacity(text.len());
        let mut used = 0usize;
        for g in graphemes(text) {
            let w = self.grapheme_width(g);
            if used + w > budget {
                break;
            }
            out.push_str(g);
            used += w;
        }
        out.push_str(marker);
        out
    }

    /// Left-pad or right-pad `text` with spaces to exactly `cols` columns,
    /// truncating first when it is too wide.
    #[must_use]
    pub fn fit(&self, text: &str, cols: usize, align: Align, ellipsis: &str) -> String {
        let mut text = self.truncate(text, cols, ellipsis);
        let pad = cols.saturating_sub(self.width(&text));
        match align {
            Align::Left => text.extend(std::iter::repeat_n(' ', pad)),
            Align::Right => {
                let mut padded = " ".repeat(pad);
                padded.push_str(&text);
                text = padded;
            }
        }
        text
    }
}

/// Horizontal alignment of a fitted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}
