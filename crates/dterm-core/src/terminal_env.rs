#![forbid(unsafe_code)]

//! Terminal environment detection.
//!
//! [`TerminalEnv`] captures the few terminal properties that change how text
//! is measured and drawn: whether wide East Asian glyphs occupy two columns,
//! whether the terminal speaks UTF-8, and whether SGR colors are wanted.
//! It is `Hash + Eq` because the width cache keys its contents on it.

use crate::env::{env_non_empty, env_override_bool, process_env};

/// Force UTF-8 on/off (`1/0/true/false`).
pub const ENV_UTF8: &str = "DTERM_UTF8";
/// Force wide East Asian width classification on/off.
pub const ENV_CJK_WIDTH: &str = "DTERM_CJK_WIDTH";

/// Terminal types whose fonts lack box drawing and wide glyph support.
const BASIC_TERMS: &[&str] = &["dumb", "linux", "vt100", "vt102", "vt220", "ansi"];

/// Terminal properties that affect width and glyph decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalEnv {
    /// Classify wide East Asian ranges as two columns.
    pub cjk: bool,
    /// The terminal accepts UTF-8 output.
    pub utf8: bool,
    /// SGR colors may be emitted.
    pub color: bool,
}

impl Default for TerminalEnv {
    fn default() -> Self {
        Self::modern()
    }
}

impl TerminalEnv {
    /// A UTF-8 color terminal with wide glyph support.
    #[must_use]
    pub const fn modern() -> Self {
        Self {
            cjk: true,
            utf8: true,
            color: true,
        }
    }

    /// A 7-bit, colorless, narrow-only terminal.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            cjk: false,
            utf8: false,
            color: false,
        }
    }

    /// Detect from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_env_with(process_env)
    }

    /// Detect using a caller-supplied environment lookup.
    ///
    /// Precedence:
    /// - `utf8`: `DTERM_UTF8`, then the first non-empty of `LC_ALL`,
    ///   `LC_CTYPE`, `LANG`; a missing locale counts as UTF-8 unless `TERM`
    ///   names a basic terminal.
    /// - `cjk`: `DTERM_CJK_WIDTH`, otherwise follows `utf8`.
    /// - `color`: off when `NO_COLOR` is set or `TERM=dumb`.
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let term = get_env("TERM").unwrap_or_default();
        let basic_term = is_basic_term(&term);

        let utf8 = env_override_bool(&get_env, ENV_UTF8).unwrap_or_else(|| {
            ["LC_ALL", "LC_CTYPE", "LANG"]
                .iter()
                .find_map(|key| env_non_empty(&get_env, key))
                .map_or(!basic_term, |locale| locale_is_utf8(&locale))
        });

        let cjk = env_override_bool(&get_env, ENV_CJK_WIDTH).unwrap_or(utf8);
        let color = get_env("NO_COLOR").is_none() && term != "dumb";

        Self { cjk, utf8, color }
    }
}

/// `true` if `TERM` names a terminal without Unicode line drawing.
#[must_use]
pub fn is_basic_term(term: &str) -> bool {
    let term = term.trim();
    BASIC_TERMS.iter().any(|basic| term.eq_ignore_ascii_case(basic))
}

fn locale_is_utf8(locale: &str) -> bool {
    let lower = locale.to_ascii_lowercase();
    lower.contains("utf-8") || lower.contains("utf8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn detect(pairs: &[(&str, &str)]) -> TerminalEnv {
        let map = map_env(pairs);
        TerminalEnv::from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn utf8_locale_enables_utf8_and_cjk() {
        let env = detect(&[("LANG", "en_US.UTF-8"), ("TERM", "xterm-256color")]);
        assert!(env.utf8);
        assert!(env.cjk);
        assert!(env.color);
    }

    #[test]
    fn lc_all_wins_over_lang() {
        let env = detect(&[("LC_ALL", "C"), ("LANG", "en_US.UTF-8")]);
        assert!(!env.utf8);
        assert!(!env.cjk);
    }

    #[test]
    fn missing_locale_on_basic_term_is_not_utf8() {
        assert!(!detect(&[("TERM", "linux")]).utf8);
        assert!(detect(&[("TERM", "xterm")]).utf8);
    }

    #[test]
    fn overrides_take_precedence() {
        let env = detect(&[
            ("LANG", "C"),
            ("DTERM_UTF8", "1"),
            ("DTERM_CJK_WIDTH", "off"),
        ]);
        assert!(env.utf8);
        assert!(!env.cjk);
    }

    #[test]
    fn no_color_and_dumb_disable_color() {
        assert!(!detect(&[("NO_COLOR", "1")]).color);
        assert!(!detect(&[("TERM", "dumb")]).color);
    }

    #[test]
    fn basic_term_matching_is_case_insensitive() {
        assert!(is_basic_term("VT100"));
        assert!(!is_basic_term("xterm-kitty"));
    }
}
