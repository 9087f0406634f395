#![forbid(unsafe_code)]

//! dterm public facade crate.
//!
//! Re-exports the types a dashboard host needs from the internal crates and
//! offers a small prelude.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use dterm_core::terminal_session::{SessionEvent, SessionOptions, TerminalSession};
pub use dterm_core::{GlyphMode, GlyphPolicy, Point, Rect, Size, TerminalEnv};

// --- Layout re-exports -----------------------------------------------------

pub use dterm_layout::{
    FlexLayout, FlexProperties, LayoutConfig, LayoutError, LayoutManager, PanelLayout,
    PanelLayouts, PanelType,
};

// --- Render re-exports -----------------------------------------------------

pub use dterm_render::{Attr, DiffConfig, FrameDiffer, Line, Op, Presenter, TerminalBuffer};

// --- Widget re-exports -----------------------------------------------------

pub use dterm_widgets::{Dashboard, DirtyReason, Panel, Renderable, RowCache, Stack, Text};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use dterm_runtime::{
    Command, DashboardState, FrameReport, OutputWriter, RenderConfig, RenderPipeline, Snapshot,
    SnapshotSource, WriterMode,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for dterm hosts.
#[derive(Debug)]
pub enum Error {
    /// I/O failure during terminal setup or input.
    Io(std::io::Error),
    /// A computed layout failed validation.
    Layout(LayoutError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Layout(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Layout(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

/// Standard result type for dterm APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, PanelType, Point, Rect, Renderable, Result, SessionEvent, SessionOptions, Size,
        TerminalBuffer, TerminalSession,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{Command, DashboardState, RenderConfig, RenderPipeline, Snapshot};

    pub use crate::{core, layout, render, text, widgets};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use dterm_core as core;
pub use dterm_layout as layout;
pub use dterm_render as render;
#[cfg(feature = "runtime")]
pub use dterm_runtime as runtime;
pub use dterm_text as text;
pub use dterm_widgets as widgets;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_error_converts() {
        let err: Error = LayoutError::EmptyArea {
            panel: PanelType::Logs,
        }
        .into();
        assert_eq!(err.to_string(), "panel logs has zero size");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_error_converts() {
        let err: Error = std::io::Error::other("no tty").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "no tty");
    }
}
