#![forbid(unsafe_code)]

//! Text measurement: grapheme widths and the width cache.

pub mod width;
pub mod width_cache;

pub use width::{grapheme_width, graphemes, str_width};
pub use width_cache::{CacheStats, SharedWidthCache, WidthCache};
