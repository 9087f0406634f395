#![forbid(unsafe_code)]

//! Row view-models.
//!
//! A view-model carries only the values that change what a row looks like.
//! Its [`RowModel::rounded_hash`] rounds every number to six decimals first,
//! so float noise below display precision does not invalidate the cached
//! row.

use std::hash::{Hash, Hasher};

use dterm_core::GlyphPolicy;
use dterm_render::{Attr, Line};
use rustc_hash::FxHasher;

use crate::format::{self, Column, FormatError};
use crate::metrics::TextMetrics;

/// Decimal places kept by [`round6`].
pub const HASH_DECIMALS: i32 = 6;

/// `value` scaled to micro-units and rounded. Non-finite values map to
/// fixed sentinels so they still hash deterministically.
#[must_use]
pub fn round6(value: f64) -> i64 {
    if value.is_nan() {
        i64::MIN
    } else if value == f64::INFINITY {
        i64::MAX
    } else if value == f64::NEG_INFINITY {
        i64::MIN + 1
    } else {
        (value * 10f64.powi(HASH_DECIMALS)).round() as i64
    }
}

/// Builder over `FxHasher` for view-model hashes.
#[derive(Default)]
pub struct RoundedHasher(FxHasher);

impl RoundedHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.0.write(value.as_bytes());
        self.0.write_u8(0xff);
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.0.write_i64(round6(value));
        self
    }

    pub fn opt_f64(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) => {
                self.0.write_u8(1);
                self.f64(v)
            }
            None => {
                self.0.write_u8(0);
                self
            }
        }
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.0.write_i64(value);
        self
    }

    #[must_use]
    pub fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// What a row needs from its surroundings to format itself.
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    pub metrics: TextMetrics,
    pub glyphs: GlyphPolicy,
}

impl RowContext {
    #[must_use]
    pub fn new(metrics: TextMetrics, glyphs: GlyphPolicy) -> Self {
        Self { metrics, glyphs }
    }

    /// Hash of everything here that changes how a row is drawn. Cached rows
    /// from a different environment or glyph mode must not be reused.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.metrics.env().hash(&mut hasher);
        self.glyphs.mode.hash(&mut hasher);
        hasher.finish()
    }

    fn columns(&self, width: u16, spec: &[Column], cells: &[(String, Attr)]) -> Line {
        format::columns(&self.metrics, width, spec, cells, self.glyphs.icons.ellipsis)
    }
}

/// A view-model that can be drawn as one row.
pub trait RowModel: Send {
    /// Stable identity of the row across snapshots.
    fn key(&self) -> &str;

    /// Hash of the render-affecting values, numbers rounded.
    fn rounded_hash(&self) -> u64;

    /// Format the row for `width` columns.
    fn format(&self, width: u16, ctx: &RowContext) -> Result<Line, FormatError>;
}

const ASSET: Attr = Attr::DEFAULT.fg(6);
const DIM: Attr = Attr::DEFAULT.fg(8);
const UP: Attr = Attr::DEFAULT.fg(2);
const DOWN: Attr = Attr::DEFAULT.fg(1);

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, FormatError> {
    if value.trim().is_empty() {
        Err(FormatError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// One holding in the balances panel.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRowModel {
    /// Row key, unique per asset and exchange.
    pub id: String,
    pub asset: String,
    pub available: f64,
    pub pending: f64,
    pub staked: f64,
    /// Quote value of the whole position, when a price is known.
    pub value: Option<f64>,
    pub exchange: String,
}

impl BalanceRowModel {
    pub const COLUMNS: [Column; 6] = [
        Column::left(6),
        Column::right(14),
        Column::right(12),
        Column::right(12),
        Column::right(13),
        Column::left(10),
    ];
}

impl RowModel for BalanceRowModel {
    fn key(&self) -> &str {
        &self.id
    }

    fn rounded_hash(&self) -> u64 {
        RoundedHasher::new()
            .str(&self.asset)
            .f64(self.available)
            .f64(self.pending)
            .f64(self.staked)
            .opt_f64(self.value)
            .str(&self.exchange)
            .finish()
    }

    fn format(&self, width: u16, ctx: &RowContext) -> Result<Line, FormatError> {
        let asset = required(&self.asset, "asset")?;
        let cells = [
            (asset.to_owned(), ASSET.bold()),
            (format::quantity(self.available), Attr::DEFAULT),
            (format::quantity(self.pending), DIM),
            (format::quantity(self.staked), DIM),
            (
                self.value
                    .map_or_else(|| format::MISSING.to_owned(), format::usd),
                Attr::DEFAULT,
            ),
            (self.exchange.clone(), DIM),
        ];
        Ok(ctx.columns(width, &Self::COLUMNS, &cells))
    }
}

/// One symbol in the price panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRowModel {
    pub symbol: String,
    pub price: f64,
    /// Change since the previous snapshot, in percent.
    pub change_pct: Option<f64>,
}

impl PriceRowModel {
    pub const COLUMNS: [Column; 3] = [Column::left(8), Column::right(14), Column::right(9)];
}

impl RowModel for PriceRowModel {
    fn key(&self) -> &str {
        &self.symbol
    }

    fn rounded_hash(&self) -> u64 {
        RoundedHasher::new()
            .str(&self.symbol)
            .f64(self.price)
            .opt_f64(self.change_pct)
            .finish()
    }

    fn format(&self, width: u16, ctx: &RowContext) -> Result<Line, FormatError> {
        let symbol = required(&self.symbol, "symbol")?;
        let icons = &ctx.glyphs.icons;
        let (arrow, trend) = match self.change_pct {
            Some(c) if c > 0.0 => (icons.up, UP),
            Some(c) if c < 0.0 => (icons.down, DOWN),
            _ => (icons.flat, DIM),
        };
        let cells = [
            (format!("{arrow} {symbol}"), ASSET),
            (format::quantity(self.price), Attr::DEFAULT),
            (
                self.change_pct
                    .map_or_else(|| format::MISSING.to_owned(), format::percent),
                trend,
            ),
        ];
        Ok(ctx.columns(width, &Self::COLUMNS, &cells))
    }
}

/// One transaction in the activity panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRowModel {
    pub id: String,
    pub timestamp: i64,
    pub kind: String,
    pub asset: String,
    pub amount: f64,
    pub status: String,
}

impl ActivityRowModel {
    pub const COLUMNS: [Column; 5] = [
        Column::left(8),
        Column::left(7),
        Column::left(6),
        Column::right(12),
        Column::left(9),
    ];
}

impl RowModel for ActivityRowModel {
    fn key(&self) -> &str {
        &self.id
    }

    fn rounded_hash(&self) -> u64 {
        RoundedHasher::new()
            .str(&self.id)
            .i64(self.timestamp)
            .str(&self.kind)
            .str(&self.asset)
            .f64(self.amount)
            .str(&self.status)
            .finish()
    }

    fn format(&self, width: u16, ctx: &RowContext) -> Result<Line, FormatError> {
        required(&self.id, "id")?;
        let status_attr = match self.status.as_str() {
            "failed" | "rejected" => DOWN,
            "pending" => DIM,
            _ => Attr::DEFAULT,
        };
        let cells = [
            (format::clock(self.timestamp), DIM),
            (self.kind.clone(), Attr::DEFAULT.bold()),
            (self.asset.clone(), ASSET),
            (format::quantity(self.amount), Attr::DEFAULT),
            (self.status.clone(), status_attr),
        ];
        Ok(ctx.columns(width, &Self::COLUMNS, &cells))
    }
}

/// One conversion in the swap panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRowModel {
    pub id: String,
    pub timestamp: i64,
    pub from_asset: String,
    pub from_amount: f64,
    pub to_asset: String,
    pub to_amount: f64,
}

impl SwapRowModel {
    pub const COLUMNS: [Column; 3] = [Column::left(8), Column::right(16), Column::left(16)];
}

impl RowModel for SwapRowModel {
    fn key(&self) -> &str {
        &self.id
    }

    fn rounded_hash(&self) -> u64 {
        RoundedHasher::new()
            .str(&self.id)
            .i64(self.timestamp)
            .str(&self.from_asset)
            .f64(self.from_amount)
            .str(&self.to_asset)
            .f64(self.to_amount)
            .finish()
    }

    fn format(&self, width: u16, ctx: &RowContext) -> Result<Line, FormatError> {
        required(&self.id, "id")?;
        let from = required(&self.from_asset, "from_asset")?;
        let to = required(&self.to_asset, "to_asset")?;
        let arrow = if ctx.glyphs.is_ascii() { ">" } else { "→" };
        let cells = [
            (format::clock(self.timestamp), DIM),
            (format!("{} {from}", format::quantity(self.from_amount)), Attr::DEFAULT),
            (format!("{arrow} {} {to}", format::quantity(self.to_amount)), ASSET),
        ];
        Ok(ctx.columns(width, &Self::COLUMNS, &cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dterm_core::GlyphMode;

    fn balance(available: f64) -> BalanceRowModel {
        BalanceRowModel {
            id: "BTC@kraken".into(),
            asset: "BTC".into(),
            available,
            pending: 0.0,
            staked: 0.25,
            value: Some(31_000.0),
            exchange: "kraken".into(),
        }
    }

    #[test]
    fn hash_ignores_noise_below_six_decimals() {
        assert_eq!(
            balance(1.000_000_1).rounded_hash(),
            balance(1.000_000_4).rounded_hash()
        );
        assert_ne!(balance(1.0).rounded_hash(), balance(1.000_001).rounded_hash());
        assert_eq!(balance(-0.0).rounded_hash(), balance(0.0).rounded_hash());
    }

    #[test]
    fn round6_sentinels() {
        assert_eq!(round6(f64::NAN), i64::MIN);
        assert_eq!(round6(f64::INFINITY), i64::MAX);
        assert_eq!(round6(1.5), 1_500_000);
    }

    #[test]
    fn optional_values_hash_distinctly() {
        let mut a = balance(1.0);
        let mut b = balance(1.0);
        a.value = None;
        b.value = Some(0.0);
        assert_ne!(a.rounded_hash(), b.rounded_hash());
    }

    #[test]
    fn balance_row_format() {
        let line = balance(1.5).format(80, &RowContext::default()).unwrap_or_default();
        assert!(line.as_str().starts_with("BTC    "));
        assert!(line.as_str().contains("1.5000"));
        assert!(line.as_str().contains("$31,000.00"));
        assert!(line.as_str().trim_end().ends_with("kraken"));
        assert!(line.attr_at(0).is_bold());
    }

    #[test]
    fn non_finite_fields_render_dash() {
        let mut b = balance(f64::NAN);
        b.value = Some(f64::INFINITY);
        let line = b.format(80, &RowContext::default()).unwrap_or_default();
        assert_eq!(line.as_str().matches(" -").count(), 2);
    }

    #[test]
    fn empty_key_is_a_row_error() {
        let mut b = balance(1.0);
        b.asset = "  ".into();
        assert_eq!(
            b.format(40, &RowContext::default()),
            Err(FormatError::MissingField("asset"))
        );
    }

    #[test]
    fn price_trend_icons_follow_glyph_policy() {
        let row = PriceRowModel {
            symbol: "ETH".into(),
            price: 2500.0,
            change_pct: Some(-1.0),
        };
        let unicode = row.format(40, &RowContext::default()).unwrap_or_default();
        assert!(unicode.as_str().starts_with("▼ ETH"));
        let ascii = RowContext::new(TextMetrics::default(), GlyphPolicy::for_mode(GlyphMode::Ascii));
        let line = row.format(40, &ascii).unwrap_or_default();
        assert!(line.as_str().starts_with("v ETH"));
        assert!(line.as_str().contains("-1.00%"));
    }

    #[test]
    fn rows_fit_requested_width() {
        let ctx = RowContext::default();
        let swap = SwapRowModel {
            id: "s1".into(),
            timestamp: 0,
            from_asset: "USDC".into(),
            from_amount: 100.0,
            to_asset: "SOL".into(),
            to_amount: 0.65,
        };
        for width in [0u16, 5, 12, 26, 60] {
            let line = swap.format(width, &ctx).unwrap_or_default();
            assert!(line.width(ctx.metrics.env()) <= usize::from(width));
        }
    }
}
