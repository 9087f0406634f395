#![forbid(unsafe_code)]

//! Helpers for reading environment overrides.
//!
//! Every detector in the workspace takes a `get_env` closure instead of
//! calling [`std::env::var`] directly, so tests can inject a fixed map.

/// Parse a boolean toggle value.
///
/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitive and
/// surrounding whitespace ignored.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Look up `key` and parse it as a boolean toggle.
pub fn env_override_bool<F>(get_env: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    get_env(key).and_then(|value| parse_bool(&value))
}

/// Look up `key`, treating empty values as unset.
pub fn env_non_empty<F>(get_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get_env(key).filter(|value| !value.trim().is_empty())
}

/// Read from the real process environment.
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
