#![forbid(unsafe_code)]

//! Glyph policy: Unicode or ASCII box drawing and status icons.
//!
//! Decisions are deterministic given the environment and a detected
//! [`TerminalEnv`], so panels can be drawn identically in tests.

use crate::env::process_env;
use crate::terminal_env::{TerminalEnv, is_basic_term};

/// Environment variable to override glyph mode (`unicode` or `ascii`).
pub const ENV_GLYPH_MODE: &str = "DTERM_GLYPH_MODE";

/// Overall glyph rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphMode {
    /// Use Unicode glyphs (box drawing, symbols, arrows).
    Unicode,
    /// Use ASCII-only fallbacks.
    Ascii,
}

impl GlyphMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unicode" | "uni" | "u" => Some(Self::Unicode),
            "ascii" | "ansi" | "a" => Some(Self::Ascii),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unicode => "unicode",
            Self::Ascii => "ascii",
        }
    }
}

/// Characters used to draw a panel border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderGlyphs {
    pub top_left: char,
    pub top_right: char,
    pub bottom_left: char,
    pub bottom_right: char,
    pub horizontal: char,
    pub vertical: char,
}

impl BorderGlyphs {
    pub const ROUNDED: Self = Self {
        top_left: '╭',
        top_right: '╮',
        bottom_left: '╰',
        bottom_right: '╯',
        horizontal: '─',
        vertical: '│',
    };

    pub const ASCII: Self = Self {
        top_left: '+',
        top_right: '+',
        bottom_left: '+',
        bottom_right: '+',
        horizontal: '-',
        vertical: '|',
    };
}

/// Small status symbols shown inside rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconGlyphs {
    pub running: &'static str,
    pub stopped: &'static str,
    pub up: &'static str,
    pub down: &'static str,
    pub flat: &'static str,
    pub bullet: &'static str,
    pub ellipsis: &'static str,
}

impl IconGlyphs {
    pub const UNICODE: Self = Self {
        running: "●",
        stopped: "○",
        up: "▲",
        down: "▼",
        flat: "•",
        bullet: "•",
        ellipsis: "…",
    };

    pub const ASCII: Self = Self {
        running: "*",
        stopped: "o",
        up: "^",
        down: "v",
        flat: "=",
        bullet: "-",
        ellipsis: "~",
    };
}

/// Resolved glyph choices for the current terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPolicy {
    pub mode: GlyphMode,
    pub border: BorderGlyphs,
    pub icons: IconGlyphs,
}

impl Default for GlyphPolicy {
    fn default() -> Self {
        Self::for_mode(GlyphMode::Unicode)
    }
}

impl GlyphPolicy {
    /// Detect using the process environment.
    #[must_use]
    pub fn detect(env: &TerminalEnv) -> Self {
        Self::from_env_with(process_env, env)
    }

    /// Detect using a caller-supplied environment lookup.
    ///
    /// `DTERM_GLYPH_MODE` wins. Otherwise ASCII is chosen when the terminal
    /// is not UTF-8 or `TERM` names a basic terminal.
    pub fn from_env_with<F>(get_env: F, env: &TerminalEnv) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = get_env(ENV_GLYPH_MODE)
            .and_then(|value| GlyphMode::parse(&value))
            .unwrap_or_else(|| {
                let term = get_env("TERM").unwrap_or_default();
                if !env.utf8 || is_basic_term(&term) {
                    GlyphMode::Ascii
                } else {
                    GlyphMode::Unicode
                }
            });
        Self::for_mode(mode)
    }

    /// Fixed glyph sets for a mode.
    #[must_use]
    pub const fn for_mode(mode: GlyphMode) -> Self {
        match mode {
            GlyphMode::Unicode => Self {
                mode,
                border: BorderGlyphs::ROUNDED,
                icons: IconGlyphs::UNICODE,
            },
            GlyphMode::Ascii => Self {
                mode,
                border: BorderGlyphs::ASCII,
                icons: IconGlyphs::ASCII,
            },
        }
    }

    #[must_use]
    pub const fn is_ascii(&self) -> bool {
        matches!(self.mode, GlyphMode::Ascii)
    }
}
