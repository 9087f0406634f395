#![forbid(unsafe_code)]

//! User commands and their key bindings.

use std::fmt;

use dterm_core::terminal_session::SessionEvent;

/// An action requested from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Pause,
    Resume,
    /// Toggle the logs panel.
    Logs,
    /// Ask the automation to start.
    Start,
    Quit,
    /// Toggle the help line.
    Help,
    /// Repaint the whole screen.
    Refresh,
    /// Move focus to the next visible panel.
    FocusNext,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Pause,
        Command::Resume,
        Command::Logs,
        Command::Start,
        Command::Quit,
        Command::Help,
        Command::Refresh,
        Command::FocusNext,
    ];

    /// Command bound to a single printable key. Case-insensitive.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(Self::Pause),
            'r' => Some(Self::Resume),
            'l' => Some(Self::Logs),
            's' => Some(Self::Start),
            'q' => Some(Self::Quit),
            'h' | '?' => Some(Self::Help),
            'f' => Some(Self::Refresh),
            '\t' => Some(Self::FocusNext),
            _ => None,
        }
    }

    /// Command for a session input event. Ctrl+C and Esc quit.
    #[must_use]
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Char(c) => Self::from_char(*c),
            SessionEvent::Interrupt | SessionEvent::Escape => Some(Self::Quit),
            SessionEvent::Resize { .. } | SessionEvent::Focus(_) => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Logs => "logs",
            Self::Start => "start",
            Self::Quit => "quit",
            Self::Help => "help",
            Self::Refresh => "refresh",
            Self::FocusNext => "focus-next",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
