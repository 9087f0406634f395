#![forbid(unsafe_code)]

//! Terminal session lifecycle guard.
//!
//! [`TerminalSession`] enters raw mode, optionally switches to the alternate
//! screen and hides the cursor, and undoes all of it on drop. Cleanup also
//! runs from a panic hook and, on unix, from a SIGINT/SIGTERM handler
//! thread, so the user's shell is never left in raw mode.
//!
//! # Cleanup Order
//!
//! 1. Stop the signal thread
//! 2. Reset SGR and show the cursor
//! 3. Leave the alternate screen (if entered)
//! 4. Exit raw mode
//! 5. Flush stdout
//!
//! Signal handling is the only process-wide state in the workspace: a
//! handler cannot capture the render context, so SIGWINCH only raises a
//! flag that the host polls with [`take_resize_pending`].
//!
//! # Usage
//!
//! ```no_run
//! use dterm_core::terminal_session::{SessionOptions, TerminalSession};
//!
//! let session = TerminalSession::new(SessionOptions {
//!     alternate_screen: true,
//!     hide_cursor: true,
//! })?;
//! let (cols, rows) = session.size()?;
//! # let _ = (cols, rows);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Write};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::iterator::Signals;

static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

/// Returns `true` once per SIGWINCH (or resize event) since the last call.
pub fn take_resize_pending() -> bool {
    RESIZE_PENDING.swap(false, Ordering::AcqRel)
}

/// Which terminal modes the session enables.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Switch to the alternate screen buffer (`CSI ? 1049 h`).
    pub alternate_screen: bool,
    /// Hide the cursor while the session is active.
    pub hide_cursor: bool,
}

/// Input relevant to the dashboard host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A printable key without modifiers other than shift.
    Char(char),
    /// Ctrl+C in raw mode.
    Interrupt,
    Escape,
    Resize { width: u16, height: u16 },
    Focus(bool),
}

/// RAII guard for raw mode and the alternate screen.
///
/// Only one session should exist at a time.
#[derive(Debug)]
pub struct TerminalSession {
    options: SessionOptions,
    alternate_screen_enabled: bool,
    cursor_hidden: bool,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl TerminalSession {
    /// Enter raw mode and enable the requested modes.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be enabled or a mode switch fails.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        install_panic_hook();

        crossterm::terminal::enable_raw_mode()?;
        #[cfg(feature = "tracing")]
        tracing::info!("terminal raw mode enabled");

        let mut session = Self {
            options: options.clone(),
            alternate_screen_enabled: false,
            cursor_hidden: false,
            #[cfg(unix)]
            signal_guard: Some(SignalGuard::new()?),
        };

        let mut stdout = io::stdout();

        if options.alternate_screen {
            crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
            session.alternate_screen_enabled = true;
            #[cfg(feature = "tracing")]
            tracing::info!("alternate screen enabled");
        }

        if options.hide_cursor {
            crossterm::execute!(stdout, crossterm::cursor::Hide)?;
            session.cursor_hidden = true;
        }

        Ok(session)
    }

    /// Current terminal size as `(columns, rows)`.
    pub fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    /// Wait up to `timeout` for input. Returns `Ok(true)` if an event is ready.
    pub fn poll_event(&self, timeout: Duration) -> io::Result<bool> {
        crossterm::event::poll(timeout)
    }

    /// Read the next event, blocking until one is available.
    ///
    /// Returns `Ok(None)` for input the dashboard does not act on.
    pub fn read_event(&self) -> io::Result<Option<SessionEvent>> {
        let event = crossterm::event::read()?;
        let mapped = map_crossterm_event(event);
        if let Some(SessionEvent::Resize { .. }) = mapped {
            RESIZE_PENDING.store(true, Ordering::Release);
        }
        Ok(mapped)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn cleanup(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();

        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x1b[0m");

        if self.cursor_hidden {
            let _ = crossterm::execute!(stdout, crossterm::cursor::Show);
            self.cursor_hidden = false;
        }

        if self.alternate_screen_enabled {
            let _ = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen);
            self.alternate_screen_enabled = false;
            #[cfg(feature = "tracing")]
            tracing::info!("alternate screen disabled");
        }

        let _ = crossterm::terminal::disable_raw_mode();
        #[cfg(feature = "tracing")]
        tracing::info!("terminal raw mode disabled");

        let _ = stdout.flush();
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(b"\x1b[0m");
    let _ = crossterm::execute!(stdout, crossterm::cursor::Show);
    let _ = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGWINCH => {
                        RESIZE_PENDING.store(true, Ordering::Release);
                        #[cfg(feature = "tracing")]
                        tracing::debug!("SIGWINCH received");
                    }
                    SIGINT | SIGTERM => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("termination signal received, cleaning up");
                        best_effort_cleanup();
                        std::process::exit(128 + signal);
                    }
                    _ => {}
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn map_crossterm_event(event: crossterm::event::Event) -> Option<SessionEvent> {
    use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};

    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(SessionEvent::Interrupt)
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                Some(SessionEvent::Char(c))
            }
            KeyCode::Tab => Some(SessionEvent::Char('\t')),
            KeyCode::Esc => Some(SessionEvent::Escape),
            _ => None,
        },
        Event::Resize(width, height) => Some(SessionEvent::Resize { width, height }),
        Event::FocusGained => Some(SessionEvent::Focus(true)),
        Event::FocusLost => Some(SessionEvent::Focus(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn maps_plain_chars() {
        let ev = key(KeyCode::Char('q'), KeyModifiers::NONE, KeyEventKind::Press);
        assert_eq!(map_crossterm_event(ev), Some(SessionEvent::Char('q')));
        let ev = key(KeyCode::Char('Q'), KeyModifiers::SHIFT, KeyEventKind::Press);
        assert_eq!(map_crossterm_event(ev), Some(SessionEvent::Char('Q')));
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        let ev = key(KeyCode::Char('c'), KeyModifiers::CONTROL, KeyEventKind::Press);
        assert_eq!(map_crossterm_event(ev), Some(SessionEvent::Interrupt));
    }

    #[test]
    fn releases_and_alt_chords_are_ignored() {
        let ev = key(KeyCode::Char('p'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(map_crossterm_event(ev), None);
        let ev = key(KeyCode::Char('p'), KeyModifiers::ALT, KeyEventKind::Press);
        assert_eq!(map_crossterm_event(ev), None);
    }

    #[test]
    fn resize_and_focus_map_through() {
        assert_eq!(
            map_crossterm_event(Event::Resize(100, 30)),
            Some(SessionEvent::Resize {
                width: 100,
                height: 30
            })
        );
        assert_eq!(
            map_crossterm_event(Event::FocusLost),
            Some(SessionEvent::Focus(false))
        );
    }

    #[test]
    fn resize_flag_is_consumed_once() {
        RESIZE_PENDING.store(true, Ordering::Release);
        assert!(take_resize_pending());
        assert!(!take_resize_pending());
    }
}
