#![forbid(unsafe_code)]

//! Render configuration, read from the environment.
//!
//! | variable | effect |
//! |----------|--------|
//! | `DTERM_DISABLE_CHAR_DIFF` | always rewrite whole lines |
//! | `DTERM_DEBUG_CACHE` | log row and width cache hit rates each tick |
//! | `DTERM_FALLBACK_LOG` | where output goes while stdout is not a TTY |
//!
//! Terminal detection (`DTERM_UTF8`, `DTERM_CJK_WIDTH`, `NO_COLOR`, `TERM`)
//! and glyph selection (`DTERM_GLYPH_MODE`) are read through the same
//! lookup.

use std::path::PathBuf;

use dterm_core::env::{env_non_empty, env_override_bool, process_env};
use dterm_core::{GlyphPolicy, TerminalEnv};
use dterm_layout::LayoutConfig;
use dterm_render::DiffConfig;

pub const ENV_DEBUG_CACHE: &str = "DTERM_DEBUG_CACHE";
pub const ENV_FALLBACK_LOG: &str = "DTERM_FALLBACK_LOG";

/// File name of the fallback log inside the temp directory.
pub const DEFAULT_FALLBACK_LOG: &str = "dterm-fallback.log";

/// Everything the pipeline needs to know about its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub diff: DiffConfig,
    pub debug_cache: bool,
    pub fallback_log: PathBuf,
    pub env: TerminalEnv,
    pub glyphs: GlyphPolicy,
    pub layout: LayoutConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            debug_cache: false,
            fallback_log: std::env::temp_dir().join(DEFAULT_FALLBACK_LOG),
            env: TerminalEnv::default(),
            glyphs: GlyphPolicy::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl RenderConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(process_env)
    }

    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = TerminalEnv::from_env_with(&get_env);
        let fallback_log = env_non_empty(&get_env, ENV_FALLBACK_LOG)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                env_non_empty(&get_env, "TMPDIR")
                    .map_or_else(std::env::temp_dir, PathBuf::from)
                    .join(DEFAULT_FALLBACK_LOG)
            });
        Self {
            diff: DiffConfig::from_env_with(&get_env),
            debug_cache: env_override_bool(&get_env, ENV_DEBUG_CACHE).unwrap_or(false),
            fallback_log,
            glyphs: GlyphPolicy::from_env_with(&get_env, &env),
            env,
            layout: LayoutConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_empty_environment() {
        let config = RenderConfig::from_env_with(lookup(&[("TMPDIR", "/tmp/x")]));
        assert!(config.diff.char_diff_enabled);
        assert!(!config.debug_cache);
        assert_eq!(config.fallback_log, PathBuf::from("/tmp/x/dterm-fallback.log"));
        assert!(!config.glyphs.is_ascii());
    }

    #[test]
    fn toggles_are_read() {
        let config = RenderConfig::from_env_with(lookup(&[
            ("DTERM_DISABLE_CHAR_DIFF", "1"),
            ("DTERM_DEBUG_CACHE", "yes"),
            ("DTERM_FALLBACK_LOG", "/var/log/dterm.log"),
            ("DTERM_GLYPH_MODE", "ascii"),
            ("NO_COLOR", "1"),
        ]));
        assert!(!config.diff.char_diff_enabled);
        assert!(config.debug_cache);
        assert_eq!(config.fallback_log, PathBuf::from("/var/log/dterm.log"));
        assert!(config.glyphs.is_ascii());
        assert!(!config.env.color);
    }

    #[test]
    fn basic_term_selects_ascii() {
        let config = RenderConfig::from_env_with(lookup(&[("TERM", "vt100")]));
        assert!(config.glyphs.is_ascii());
        assert!(!config.env.utf8);
    }
}
