#![forbid(unsafe_code)]

//! Subscriber setup.
//!
//! Diagnostics go to stderr, or to the file named by `DTERM_LOG_FILE`, and
//! never to stdout where the frames are written. The filter directive comes
//! from `DTERM_LOG` and defaults to `warn`.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;

use dterm_core::env::{env_non_empty, process_env};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const ENV_LOG: &str = "DTERM_LOG";
pub const ENV_LOG_FILE: &str = "DTERM_LOG_FILE";
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Filter built from `DTERM_LOG`, falling back to [`DEFAULT_DIRECTIVE`] when
/// unset or unparsable.
pub fn env_filter_with<F>(get_env: &F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    env_non_empty(get_env, ENV_LOG)
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_tracing() -> bool {
    init_tracing_with(process_env)
}

pub fn init_tracing_with<F>(get_env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let filter = env_filter_with(&get_env);
    let file = env_non_empty(&get_env, ENV_LOG_FILE).and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("dterm: cannot open log file {path}: {err}");
                None
            }
        }
    });
    let (writer, ansi) = match file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        None => (
            BoxMakeWriter::new(std::io::stderr),
            std::io::stderr().is_terminal(),
        ),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_to_warn() {
        let filter = env_filter_with(&|_: &str| None);
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn filter_reads_directive() {
        let filter = env_filter_with(&|key: &str| {
            (key == ENV_LOG).then(|| "dterm_runtime=debug".to_owned())
        });
        assert_eq!(filter.to_string(), "dterm_runtime=debug");
    }
}
