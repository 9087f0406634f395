#![forbid(unsafe_code)]

//! Value formatting for dashboard rows.
//!
//! Anything that cannot be formatted (non-finite numbers, timestamps out of
//! range) renders as [`MISSING`] rather than failing the row.

use std::fmt;

use dterm_render::{Attr, Line, LineBuilder};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::metrics::{Align, TextMetrics};

/// Placeholder for a value that could not be formatted.
pub const MISSING: &str = "-";

/// A row that could not be built at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A field the row cannot be drawn without is empty.
    MissingField(&'static str),
    /// Writing into the row buffer failed.
    Write,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "row is missing required field `{field}`"),
            Self::Write => write!(f, "failed to write row text"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<fmt::Error> for FormatError {
    fn from(_: fmt::Error) -> Self {
        Self::Write
    }
}

/// A quantity with precision chosen by magnitude.
#[must_use]
pub fn quantity(value: f64) -> String {
    if !value.is_finite() {
        return MISSING.to_owned();
    }
    let abs = value.abs();
    let decimals = if abs >= 1000.0 {
        2
    } else if abs >= 1.0 {
        4
    } else {
        6
    };
    format!("{value:.decimals$}")
}

/// A fixed-precision number.
#[must_use]
pub fn fixed(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        MISSING.to_owned()
    }
}

/// A signed percentage such as `+1.25%`.
#[must_use]
pub fn percent(value: f64) -> String {
    if value.is_finite() {
        format!("{value:+.2}%")
    } else {
        MISSING.to_owned()
    }
}

/// A dollar amount with thousands separators, e.g. `$12,345.67`.
#[must_use]
pub fn usd(value: f64) -> String {
    if !value.is_finite() {
        return MISSING.to_owned();
    }
    let cents = format!("{:.2}", value.abs());
    let (int, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

/// `HH:MM:SS` (UTC) of a unix timestamp.
#[must_use]
pub fn clock(unix_secs: i64) -> String {
    OffsetDateTime::from_unix_timestamp(unix_secs)
        .ok()
        .and_then(|t| {
            t.format(format_description!("[hour]:[minute]:[second]"))
                .ok()
        })
        .unwrap_or_else(|| MISSING.to_owned())
}

/// `YYYY-MM-DD HH:MM:SS` (UTC) of a unix timestamp.
#[must_use]
pub fn datetime(unix_secs: i64) -> String {
    OffsetDateTime::from_unix_timestamp(unix_secs)
        .ok()
        .and_then(|t| {
            t.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok()
        })
        .unwrap_or_else(|| MISSING.to_owned())
}

/// An optional timestamp, `-` when absent.
#[must_use]
pub fn maybe_datetime(unix_secs: Option<i64>) -> String {
    unix_secs.map_or_else(|| MISSING.to_owned(), datetime)
}

/// Width and alignment of one row column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub width: u16,
    pub align: Align,
}

impl Column {
    #[must_use]
    pub const fn left(width: u16) -> Self {
        Self {
            width,
            align: Align::Left,
        }
    }

    #[must_use]
    pub const fn right(width: u16) -> Self {
        Self {
            width,
            align: Align::Right,
        }
    }
}

/// Lay `cells` out in `columns`, one space apart, within `width` columns.
///
/// The last column takes whatever width is left. Columns that do not fit
/// are cut, and the ones after them dropped.
#[must_use]
pub fn columns(
    metrics: &TextMetrics,
    width: u16,
    columns: &[Column],
    cells: &[(String, Attr)],
    ellipsis: &str,
) -> Line {
    let mut remaining = usize::from(width);
    let mut out = LineBuilder::new();
    let last = columns.len().min(cells.len()).saturating_sub(1);
    for (i, (column, (text, attr))) in columns.iter().zip(cells).enumerate() {
        if remaining == 0 {
            break;
        }
        if i > 0 {
            out.push(" ", Attr::DEFAULT);
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        let cols = if i == last {
            remaining
        } else {
            usize::from(column.width).min(remaining)
        };
        let fitted = metrics.fit(text, cols, column.align, ellipsis);
        out.push(&fitted, *attr);
        remaining -= cols;
    }
    out.finish()
}
