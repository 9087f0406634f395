#![forbid(unsafe_code)]

//! Presenter: state-tracked serialization of [`Op`]s to ANSI bytes.
//!
//! The presenter tracks the cursor and the active pen so it can skip a CUP
//! that would land where the cursor already is and reset SGR exactly once
//! when a styled run ends. Each frame is encoded into a reusable scratch
//! buffer and handed to the sink with a single `write_all` + `flush`.
//!
//! # Usage
//!
//! ```
//! use dterm_core::TerminalEnv;
//! use dterm_render::{Op, Presenter};
//!
//! let mut presenter = Presenter::new(Vec::new(), TerminalEnv::modern());
//! presenter.present(&[Op::move_to(2, 1), Op::write("hi")])?;
//! assert_eq!(presenter.into_inner()?, b"\x1b[2;3Hhi");
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, BufWriter, Write};

use dterm_core::TerminalEnv;
use dterm_text::str_width;

use crate::ansi;
use crate::op::Op;

/// Size of the internal write buffer (64KB).
const BUFFER_CAPACITY: usize = 64 * 1024;

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentStats {
    pub ops: usize,
    pub bytes_emitted: usize,
    /// Cursor moves dropped because the cursor was already in place.
    pub moves_elided: usize,
}

/// Serializes op lists to a byte sink.
#[derive(Debug)]
pub struct Presenter<W: Write> {
    writer: BufWriter<W>,
    scratch: Vec<u8>,
    cursor: Option<(u16, u16)>,
    /// Bytes left before the active styled run ends.
    pen_remaining: usize,
    env: TerminalEnv,
}

impl<W: Write> Presenter<W> {
    pub fn new(writer: W, env: TerminalEnv) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_CAPACITY, writer),
            scratch: Vec::with_capacity(4096),
            cursor: None,
            pen_remaining: 0,
            env,
        }
    }

    /// Encode `ops`, write them, and flush.
    pub fn present(&mut self, ops: &[Op]) -> io::Result<PresentStats> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let result = self.encode(ops, &mut scratch);
        let written = result.and_then(|stats| {
            self.writer.write_all(&scratch)?;
            self.writer.flush()?;
            Ok(stats)
        });
        self.scratch = scratch;
        if written.is_err() {
            self.invalidate();
        }
        written
    }

    /// Encode `ops` into `out` without touching the sink.
    pub fn encode(&mut self, ops: &[Op], out: &mut Vec<u8>) -> io::Result<PresentStats> {
        let start = out.len();
        let mut stats = PresentStats {
            ops: ops.len(),
            ..PresentStats::default()
        };
        for op in ops {
            match op {
                Op::MoveCursor { x, y } => {
                    if self.cursor == Some((*x, *y)) {
                        stats.moves_elided += 1;
                    } else {
                        ansi::cup(out, *y, *x)?;
                        self.cursor = Some((*x, *y));
                    }
                }
                Op::ClearLine(mode) => ansi::erase_line(out, *mode)?,
                Op::ClearScreen => {
                    ansi::clear_screen(out)?;
                    self.cursor = Some((0, 0));
                }
                Op::SetAttr(run) => {
                    ansi::sgr_attr(out, &run.attr, self.env.color)?;
                    self.pen_remaining = run.length;
                }
                Op::WriteBytes(bytes) => {
                    out.extend_from_slice(bytes);
                    if let Some((x, _)) = self.cursor.as_mut() {
                        let advance = std::str::from_utf8(bytes)
                            .map_or(bytes.len(), |s| str_width(s, &self.env));
                        *x = x.saturating_add(u16::try_from(advance).unwrap_or(u16::MAX));
                    }
                    if self.pen_remaining > 0 {
                        self.pen_remaining = self.pen_remaining.saturating_sub(bytes.len());
                        if self.pen_remaining == 0 {
                            ansi::sgr_reset(out)?;
                        }
                    }
                }
            }
        }
        stats.bytes_emitted = out.len() - start;
        Ok(stats)
    }

    /// Forget the tracked cursor, e.g. after something else wrote to the
    /// terminal. The next move is always emitted.
    pub fn invalidate(&mut self) {
        self.cursor = None;
        self.pen_remaining = 0;
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(io::IntoInnerError::into_error)
    }
}

/// Encode `ops` with a fresh presenter state.
#[must_use]
pub fn ops_to_bytes(ops: &[Op], env: &TerminalEnv) -> Vec<u8> {
    let mut presenter = Presenter::new(io::sink(), *env);
    let mut out = Vec::new();
    // Encoding into a Vec cannot fail.
    let _ = presenter.encode(ops, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Attr, AttrRun};
    use crate::op::ClearMode;

    fn env() -> TerminalEnv {
        TerminalEnv::modern()
    }

    #[test]
    fn redundant_move_is_elided() {
        let mut p = Presenter::new(Vec::new(), env());
        let stats = p
            .present(&[
                Op::move_to(0, 0),
                Op::write("ab"),
                Op::move_to(2, 0),
                Op::write("c"),
            ])
            .unwrap();
        assert_eq!(stats.moves_elided, 1);
        assert_eq!(p.into_inner().unwrap(), b"\x1b[1;1Habc");
    }

    #[test]
    fn styled_run_resets_after_length() {
        let run = AttrRun::new(0, 3, Attr::default().bold());
        let bytes = ops_to_bytes(&[Op::SetAttr(run), Op::write("abc"), Op::write("d")], &env());
        assert_eq!(bytes, b"\x1b[0;1mabc\x1b[0md");
    }

    #[test]
    fn clear_ops() {
        let bytes = ops_to_bytes(
            &[Op::ClearScreen, Op::ClearLine(ClearMode::ToEnd)],
            &env(),
        );
        assert_eq!(bytes, b"\x1b[2J\x1b[H\x1b[K");
    }

    #[test]
    fn clear_screen_homes_cursor() {
        let bytes = ops_to_bytes(&[Op::ClearScreen, Op::move_to(0, 0), Op::write("x")], &env());
        assert_eq!(bytes, b"\x1b[2J\x1b[Hx");
    }

    #[test]
    fn wide_text_advances_by_columns() {
        let bytes = ops_to_bytes(
            &[Op::move_to(0, 0), Op::write("\u{4E00}"), Op::move_to(2, 0), Op::write("x")],
            &env(),
        );
        assert_eq!(bytes, "\x1b[1;1H\u{4E00}x".as_bytes());
    }

    #[test]
    fn no_color_drops_color_params() {
        let run = AttrRun::new(0, 1, Attr::default().fg(1));
        let plain = TerminalEnv {
            color: false,
            ..env()
        };
        assert_eq!(
            ops_to_bytes(&[Op::SetAttr(run), Op::write("x")], &plain),
            b"\x1b[0mx\x1b[0m"
        );
    }

    #[test]
    fn invalidate_forces_next_move() {
        let mut p = Presenter::new(Vec::new(), env());
        p.present(&[Op::move_to(1, 1)]).unwrap();
        p.invalidate();
        p.present(&[Op::move_to(1, 1)]).unwrap();
        assert_eq!(p.into_inner().unwrap(), b"\x1b[2;2H\x1b[2;2H");
    }

    #[test]
    fn write_errors_invalidate_cursor() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
        }
        let mut p = Presenter::new(Broken, env());
        assert!(p.present(&[Op::move_to(0, 0), Op::write("x")]).is_err());
        assert!(p.cursor.is_none());
    }
}
