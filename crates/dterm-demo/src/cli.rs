#![forbid(unsafe_code)]

//! Command-line parsing for the demo. Hand-rolled; the surface is two flags.

use std::fmt;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
dterm demo: a live crypto dashboard fed by synthetic data

USAGE:
    dterm-demo [OPTIONS]

OPTIONS:
    --ticks N           Stop after N snapshot ticks (default: run until q)
    --interval-ms N     Milliseconds between ticks (default: 500)
    --help, -h          Show this help message
    --version, -V       Show version

KEYS:
    q / Esc / Ctrl+C    Quit
    p / r               Pause / resume data updates
    l                   Toggle the logs panel
    s                   Request automation start
    f                   Repaint the whole screen
    h / ?               Toggle the help line
    Tab                 Focus the next panel

ENVIRONMENT:
    DTERM_LOG                 tracing filter (default: warn)
    DTERM_LOG_FILE            write diagnostics to a file instead of stderr
    DTERM_FALLBACK_LOG        frame log used while stdout is not a terminal
    DTERM_GLYPH_MODE          unicode | ascii
    DTERM_DISABLE_CHAR_DIFF   always rewrite whole lines
    DTERM_DEBUG_CACHE         log cache hit rates every tick";

pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Parsed options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub ticks: Option<u64>,
    pub interval_ms: u64,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            ticks: None,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

/// What the caller should do after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Run(Opts),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    MissingValue(&'static str),
    InvalidValue { flag: &'static str, value: String },
    Unknown(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(flag) => write!(f, "{flag} needs a value"),
            Self::InvalidValue { flag, value } => write!(f, "invalid {flag} value: {value}"),
            Self::Unknown(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliError {}

#[must_use]
pub fn version() -> String {
    format!("dterm-demo {VERSION}")
}

/// Parse arguments, not including the program name.
pub fn parse<I, S>(args: I) -> Result<Parsed, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut opts = Opts::default();
    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_owned(), Some(value.to_owned())),
            None => (arg.clone(), None),
        };
        match flag.as_str() {
            "--help" | "-h" => return Ok(Parsed::Help),
            "--version" | "-V" => return Ok(Parsed::Version),
            "--ticks" => {
                let value = inline.or_else(|| args.next()).ok_or(CliError::MissingValue("--ticks"))?;
                opts.ticks = Some(number("--ticks", value)?);
            }
            "--interval-ms" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or(CliError::MissingValue("--interval-ms"))?;
                opts.interval_ms = number("--interval-ms", value)?.max(1);
            }
            _ => return Err(CliError::Unknown(arg)),
        }
    }
    Ok(Parsed::Run(opts))
}

fn number(flag: &'static str, value: String) -> Result<u64, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidValue { flag, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(parse(Vec::<String>::new()), Ok(Parsed::Run(Opts::default())));
    }

    #[test]
    fn separate_and_inline_values() {
        let parsed = parse(["--ticks", "20", "--interval-ms=100"]).unwrap();
        assert_eq!(
            parsed,
            Parsed::Run(Opts {
                ticks: Some(20),
                interval_ms: 100
            })
        );
    }

    #[test]
    fn zero_interval_is_clamped() {
        let Ok(Parsed::Run(opts)) = parse(["--interval-ms", "0"]) else {
            panic!("expected run");
        };
        assert_eq!(opts.interval_ms, 1);
    }

    #[test]
    fn errors_name_the_flag() {
        assert_eq!(parse(["--ticks"]), Err(CliError::MissingValue("--ticks")));
        let err = parse(["--ticks", "many"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid --ticks value: many");
        assert_eq!(
            parse(["--bogus"]),
            Err(CliError::Unknown("--bogus".to_owned()))
        );
    }

    #[test]
    fn help_and_version() {
        assert_eq!(parse(["-h"]), Ok(Parsed::Help));
        assert_eq!(parse(["--version"]), Ok(Parsed::Version));
        assert!(version().starts_with("dterm-demo "));
        assert!(HELP_TEXT.contains("--interval-ms"));
    }
}
