#![forbid(unsafe_code)]

//! Core: geometry, terminal environment detection, glyph selection, and the
//! terminal session guard.

pub mod env;
pub mod geometry;
pub mod glyph_policy;
pub mod terminal_env;
#[cfg(not(target_arch = "wasm32"))]
pub mod terminal_session;

pub use geometry::{Point, Rect, Sides, Size};
pub use glyph_policy::{GlyphMode, GlyphPolicy};
pub use terminal_env::TerminalEnv;
