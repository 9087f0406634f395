#![forbid(unsafe_code)]

//! Render kernel: styled lines, frame buffers, the frame differ, and the
//! ANSI presenter.
//!
//! # Pipeline
//!
//! ```text
//! components ──render──▶ TerminalBuffer ──diff──▶ Vec<Op> ──present──▶ bytes
//! ```
//!
//! The op list is the only contract between the differ and whatever writes
//! to the terminal; the presenter knows nothing about buffers.

pub mod ansi;
pub mod attr;
pub mod buffer;
pub mod diff;
pub mod line;
pub mod op;
pub mod presenter;
pub mod terminal_model;

pub use attr::{Attr, AttrFlags, AttrRun};
pub use buffer::TerminalBuffer;
pub use diff::{DiffConfig, DiffStats, FrameDiffer};
pub use line::{Line, LineBuilder};
pub use op::{ClearMode, Op};
pub use presenter::{PresentStats, Presenter};
