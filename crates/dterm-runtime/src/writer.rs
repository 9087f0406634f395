#![forbid(unsafe_code)]

//! Frame output with TTY detection and a fallback log.
//!
//! [`OutputWriter`] owns the byte sink (normally stdout). Each frame is
//! written in one go. While the sink is not a terminal, frames are instead
//! reduced to plain text and appended to a log file, one timestamped line
//! per cursor-addressed chunk. The writer never reports a failure to its
//! caller: transient errors are retried, hard errors switch it to the log.
//!
//! # Modes
//!
//! - **Tty**: bytes go to the sink.
//! - **Fallback**: bytes are stripped and appended to the fallback log.
//!
//! The TTY probe runs at most once per [`PROBE_INTERVAL`]. When it observes
//! the terminal coming back, the writer returns to `Tty` and asks for a
//! full repaint through [`OutputWriter::take_force_full_repaint`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dterm_render::ansi::strip_ansi;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

/// Minimum time between two TTY probes.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// First `WouldBlock` backoff.
pub const BACKOFF_INITIAL: Duration = Duration::from_millis(1);

/// Largest `WouldBlock` backoff.
pub const BACKOFF_MAX: Duration = Duration::from_millis(50);

/// `WouldBlock` attempts before a frame is dropped.
pub const MAX_WOULD_BLOCK_ATTEMPTS: u32 = 8;

/// Answers whether the output is an interactive terminal.
pub trait TtyProbe: Send {
    fn is_tty(&self) -> bool;
}

/// Probes the process's stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutProbe;

impl TtyProbe for StdoutProbe {
    fn is_tty(&self) -> bool {
        io::stdout().is_terminal()
    }
}

impl<F> TtyProbe for F
where
    F: Fn() -> bool + Send,
{
    fn is_tty(&self) -> bool {
        self()
    }
}

/// Where frames currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    Tty,
    Fallback,
}

impl fmt::Display for WriterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tty => f.write_str("tty"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub frames: u64,
    /// Bytes accepted by the sink.
    pub bytes_written: u64,
    pub interrupted_retries: u64,
    pub backoffs: u64,
    /// Frames dropped after exhausting `WouldBlock` retries.
    pub dropped_frames: u64,
    pub fallback_lines: u64,
}

#[derive(Debug)]
enum WriterError {
    /// The sink failed with a non-retryable error.
    Sink(io::Error),
    /// The sink kept returning `WouldBlock`.
    Exhausted { attempts: u32 },
    Fallback { path: PathBuf, source: io::Error },
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink(err) => write!(f, "output write failed: {err}"),
            Self::Exhausted { attempts } => {
                write!(f, "output would block after {attempts} attempts")
            }
            Self::Fallback { path, source } => {
                write!(f, "fallback log {} failed: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for WriterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sink(err) | Self::Fallback { source: err, .. } => Some(err),
            Self::Exhausted { .. } => None,
        }
    }
}

type Clock = Box<dyn Fn() -> Instant + Send>;
type Sleeper = Box<dyn FnMut(Duration) + Send>;

/// Single owner of the output sink.
pub struct OutputWriter<W: Write> {
    sink: W,
    probe: Box<dyn TtyProbe>,
    clock: Clock,
    sleeper: Sleeper,
    mode: WriterMode,
    last_probe: Option<Instant>,
    last_seen_tty: Option<bool>,
    fallback_path: PathBuf,
    fallback: Option<File>,
    force_full: bool,
    stats: WriterStats,
}

impl<W: Write> fmt::Debug for OutputWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputWriter")
            .field("mode", &self.mode)
            .field("fallback_path", &self.fallback_path)
            .field("force_full", &self.force_full)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<W: Write> OutputWriter<W> {
    /// Writer over `sink` that probes stdout and falls back to `fallback_path`.
    pub fn new(sink: W, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            probe: Box::new(StdoutProbe),
            clock: Box::new(Instant::now),
            sleeper: Box::new(std::thread::sleep),
            mode: WriterMode::Tty,
            last_probe: None,
            last_seen_tty: None,
            fallback_path: fallback_path.into(),
            fallback: None,
            force_full: false,
            stats: WriterStats::default(),
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: impl TtyProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> Instant + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + Send + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    #[must_use]
    pub fn mode(&self) -> WriterMode {
        self.mode
    }

    #[must_use]
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    #[must_use]
    pub fn fallback_path(&self) -> &Path {
        &self.fallback_path
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Returns `true` once after the terminal came back or a frame was lost.
    pub fn take_force_full_repaint(&mut self) -> bool {
        std::mem::take(&mut self.force_full)
    }

    /// Run the debounced probe without writing anything.
    pub fn poll(&mut self) -> WriterMode {
        self.refresh_mode();
        self.mode
    }

    /// Probe now, ignoring the debounce.
    pub fn reprobe(&mut self) -> WriterMode {
        self.last_probe = None;
        self.refresh_mode();
        self.mode
    }

    /// Deliver one frame. Never fails; see the module docs.
    pub fn write_frame(&mut self, bytes: &[u8]) -> WriterMode {
        self.refresh_mode();
        self.stats.frames += 1;
        if bytes.is_empty() {
            return self.mode;
        }
        if self.mode == WriterMode::Tty {
            match self.write_sink(bytes) {
                Ok(()) => return self.mode,
                Err(WriterError::Exhausted { attempts }) => {
                    warn!(attempts, "output stayed blocked, dropping frame");
                    self.stats.dropped_frames += 1;
                    self.force_full = true;
                    return self.mode;
                }
                Err(err) => {
                    warn!(error = %err, "switching output to fallback log");
                    self.switch(WriterMode::Fallback);
                }
            }
        }
        if let Err(err) = self.write_fallback(bytes) {
            warn!(error = %err, "fallback frame lost");
        }
        self.mode
    }

    fn refresh_mode(&mut self) {
        let now = (self.clock)();
        if let Some(at) = self.last_probe
            && now.saturating_duration_since(at) < PROBE_INTERVAL
        {
            return;
        }
        let is_tty = self.probe.is_tty();
        let previous = self.last_seen_tty.replace(is_tty);
        self.last_probe = Some(now);
        match (self.mode, is_tty) {
            (WriterMode::Tty, false) => self.switch(WriterMode::Fallback),
            // A fallback caused by a write error only ends when the probe
            // sees the terminal disappear and return.
            (WriterMode::Fallback, true) if previous == Some(false) => {
                self.switch(WriterMode::Tty);
                self.force_full = true;
            }
            _ => {}
        }
    }

    fn switch(&mut self, mode: WriterMode) {
        if self.mode == mode {
            return;
        }
        info!(from = %self.mode, to = %mode, fallback = %self.fallback_path.display(), "output mode changed");
        self.mode = mode;
        if mode == WriterMode::Tty {
            self.fallback = None;
        }
    }

    fn write_sink(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        let mut rest = bytes;
        let mut attempts = 0u32;
        let mut backoff = BACKOFF_INITIAL;
        while !rest.is_empty() {
            match self.sink.write(rest) {
                Ok(0) => return Err(WriterError::Sink(io::ErrorKind::WriteZero.into())),
                Ok(n) => {
                    self.stats.bytes_written += n as u64;
                    rest = &rest[n..];
                }
                Err(err) => self.retry(err, &mut attempts, &mut backoff)?,
            }
        }
        loop {
            match self.sink.flush() {
                Ok(()) => return Ok(()),
                Err(err) => self.retry(err, &mut attempts, &mut backoff)?,
            }
        }
    }

    /// Decide whether `err` is worth another attempt, sleeping if needed.
    fn retry(
        &mut self,
        err: io::Error,
        attempts: &mut u32,
        backoff: &mut Duration,
    ) -> Result<(), WriterError> {
        match err.kind() {
            io::ErrorKind::Interrupted => {
                self.stats.interrupted_retries += 1;
                Ok(())
            }
            io::ErrorKind::WouldBlock => {
                *attempts += 1;
                if *attempts >= MAX_WOULD_BLOCK_ATTEMPTS {
                    return Err(WriterError::Exhausted {
                        attempts: *attempts,
                    });
                }
                debug!(attempt = *attempts, backoff_ms = backoff.as_millis() as u64, "output would block");
                self.stats.backoffs += 1;
                (self.sleeper)(*backoff);
                *backoff = (*backoff * 2).min(BACKOFF_MAX);
                Ok(())
            }
            _ => Err(WriterError::Sink(err)),
        }
    }

    fn write_fallback(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        let lines = fallback_lines(bytes);
        if lines.is_empty() {
            return Ok(());
        }
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("-"));
        let path = self.fallback_path.clone();
        let wrap = |source: io::Error| WriterError::Fallback {
            path: path.clone(),
            source,
        };
        if self.fallback.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.fallback_path)
                .map_err(wrap)?;
            self.fallback = Some(file);
        }
        let Some(file) = self.fallback.as_mut() else {
            return Ok(());
        };
        let mut out = String::new();
        for line in &lines {
            out.push_str(&stamp);
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
        if let Err(source) = file.write_all(out.as_bytes()) {
            self.fallback = None;
            return Err(wrap(source));
        }
        self.stats.fallback_lines += lines.len() as u64;
        Ok(())
    }
}

/// Plain-text lines of a frame.
///
/// The frame is split wherever the cursor is repositioned (CUP) or the
/// screen is cleared, each piece is stripped of escape sequences, and blank
/// pieces are dropped.
#[must_use]
pub fn fallback_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while let Some(rel) = memchr::memchr(0x1b, &bytes[i..]) {
        let esc = i + rel;
        if bytes.get(esc + 1) != Some(&b'[') {
            i = esc + 1;
            continue;
        }
        let mut end = esc + 2;
        while end < bytes.len() && !(0x40..=0x7e).contains(&bytes[end]) {
            end += 1;
        }
        if matches!(bytes.get(end), Some(b'H' | b'J')) {
            push_line(&mut lines, &bytes[start..esc]);
            start = end + 1;
        }
        i = (end + 1).min(bytes.len());
        if i >= bytes.len() {
            break;
        }
    }
    if start < bytes.len() {
        push_line(&mut lines, &bytes[start..]);
    }
    lines
}

fn push_line(lines: &mut Vec<String>, chunk: &[u8]) {
    let stripped = strip_ansi(chunk);
    let text = String::from_utf8_lossy(&stripped);
    let text = text.trim_end();
    if !text.trim_start().is_empty() {
        lines.push(text.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Sink that replays scripted results, then accepts everything.
    #[derive(Default)]
    struct ScriptedSink {
        script: VecDeque<io::Result<usize>>,
        written: Vec<u8>,
    }

    impl Write for ScriptedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(n)) => {
                    let n = n.min(buf.len());
                    self.written.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
                Some(Err(err)) => Err(err),
                None => {
                    self.written.extend_from_slice(buf);
                    Ok(buf.len())
                }
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sink(script: Vec<io::Result<usize>>) -> ScriptedSink {
        ScriptedSink {
            script: script.into(),
            written: Vec::new(),
        }
    }

    fn tty_writer(sink: ScriptedSink) -> OutputWriter<ScriptedSink> {
        OutputWriter::new(sink, std::env::temp_dir().join("dterm-writer-unit.log"))
            .with_probe(|| true)
            .with_sleeper(|_| {})
    }

    #[test]
    fn interrupted_is_retried_immediately() {
        let mut w = tty_writer(sink(vec![Err(io::ErrorKind::Interrupted.into())]));
        assert_eq!(w.write_frame(b"hello"), WriterMode::Tty);
        assert_eq!(w.get_ref().written, b"hello");
        assert_eq!(w.stats().interrupted_retries, 1);
        assert_eq!(w.stats().backoffs, 0);
    }

    #[test]
    fn would_block_backs_off_exponentially() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&sleeps);
        let script = (0..7)
            .map(|_| Err(io::ErrorKind::WouldBlock.into()))
            .collect();
        let mut w = tty_writer(sink(script)).with_sleeper(move |d| {
            record.lock().unwrap().push(d.as_millis() as u64);
        });
        w.write_frame(b"abc");
        assert_eq!(w.get_ref().written, b"abc");
        assert_eq!(*sleeps.lock().unwrap(), vec![1, 2, 4, 8, 16, 32, 50]);
        assert!(!w.take_force_full_repaint());
    }

    #[test]
    fn exhausted_would_block_drops_frame_and_requests_repaint() {
        let script = (0..MAX_WOULD_BLOCK_ATTEMPTS)
            .map(|_| Err(io::ErrorKind::WouldBlock.into()))
            .collect();
        let mut w = tty_writer(sink(script));
        assert_eq!(w.write_frame(b"lost"), WriterMode::Tty);
        assert_eq!(w.stats().dropped_frames, 1);
        assert!(w.take_force_full_repaint());
        assert!(!w.take_force_full_repaint());
    }

    #[test]
    fn partial_writes_are_completed() {
        let mut w = tty_writer(sink(vec![Ok(2), Ok(1)]));
        w.write_frame(b"abcdef");
        assert_eq!(w.get_ref().written, b"abcdef");
        assert_eq!(w.stats().bytes_written, 6);
    }

    #[test]
    fn probe_is_debounced() {
        let tty = Arc::new(AtomicBool::new(true));
        let probe_flag = Arc::clone(&tty);
        let base = Instant::now();
        let offset = Arc::new(Mutex::new(Duration::ZERO));
        let clock_offset = Arc::clone(&offset);
        let mut w = OutputWriter::new(sink(vec![]), std::env::temp_dir().join("dterm-debounce.log"))
            .with_probe(move || probe_flag.load(Ordering::SeqCst))
            .with_clock(move || base + *clock_offset.lock().unwrap());

        w.write_frame(b"");
        tty.store(false, Ordering::SeqCst);
        *offset.lock().unwrap() = Duration::from_millis(100);
        w.write_frame(b"");
        assert_eq!(w.mode(), WriterMode::Tty);

        *offset.lock().unwrap() = Duration::from_millis(600);
        w.write_frame(b"");
        assert_eq!(w.mode(), WriterMode::Fallback);
    }

    #[test]
    fn fallback_lines_split_on_cursor_moves() {
        let frame = b"\x1b[2J\x1b[H\x1b[0;1mBTC\x1b[0m  1.5   \x1b[2;1HETH  2.0\x1b[3;1H\x1b[2K";
        assert_eq!(fallback_lines(frame), vec!["BTC  1.5", "ETH  2.0"]);
    }

    #[test]
    fn fallback_lines_without_escapes() {
        assert_eq!(fallback_lines(b"plain"), vec!["plain"]);
        assert!(fallback_lines(b"\x1b[1;1H   ").is_empty());
        assert!(fallback_lines(b"").is_empty());
    }

    #[test]
    fn error_display_names_cause() {
        let err = WriterError::Exhausted { attempts: 8 };
        assert_eq!(err.to_string(), "output would block after 8 attempts");
        let err = WriterError::Sink(io::ErrorKind::BrokenPipe.into());
        assert!(err.to_string().starts_with("output write failed"));
    }
}
