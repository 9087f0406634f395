#![forbid(unsafe_code)]

//! Terminal model for presenter and differ testing.
//!
//! A minimal grid that can consume either [`Op`] lists or the ANSI bytes the
//! [`Presenter`](crate::Presenter) produces. Tests use it to check that
//! applying a diff to the previous frame yields the same visible screen as
//! painting the next frame directly.
//!
//! Only what the presenter emits is understood: CUP, EL (`K`, `2K`), ED
//! (`2J`), and SGR with the flag and 256-color parameters. Anything else is
//! ignored. Writes past the right edge are clipped instead of wrapping.
//!
//! # Example
//!
//! ```
//! use dterm_core::{Size, TerminalEnv};
//! use dterm_render::terminal_model::TerminalModel;
//!
//! let mut model = TerminalModel::new(Size::new(10, 2), TerminalEnv::modern());
//! model.process(b"\x1b[2;3Hhi");
//! assert_eq!(model.row_text(1), "  hi");
//! ```

use dterm_core::{Size, TerminalEnv};
use dterm_text::grapheme_width;
use unicode_segmentation::UnicodeSegmentation;

use crate::attr::{Attr, AttrFlags};
use crate::buffer::TerminalBuffer;
use crate::op::{ClearMode, Op};

/// One screen cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCell {
    /// Grapheme drawn in the cell. Blank cells hold a space.
    pub text: String,
    pub attr: Attr,
    /// Second column of a wide glyph.
    pub continuation: bool,
}

impl ModelCell {
    fn blank() -> Self {
        Self {
            text: " ".to_string(),
            attr: Attr::DEFAULT,
            continuation: false,
        }
    }

    fn tail(attr: Attr) -> Self {
        Self {
            text: String::new(),
            attr,
            continuation: true,
        }
    }
}

/// Screen grid with a cursor and a pen.
#[derive(Debug, Clone)]
pub struct TerminalModel {
    width: u16,
    height: u16,
    env: TerminalEnv,
    cells: Vec<ModelCell>,
    cursor: (u16, u16),
    pen: Attr,
    /// Bytes the pen stays active for. `None` keeps it until the next SGR.
    pen_budget: Option<usize>,
    /// Incomplete escape or UTF-8 tail from the previous `process` call.
    pending: Vec<u8>,
}

impl TerminalModel {
    #[must_use]
    pub fn new(size: Size, env: TerminalEnv) -> Self {
        let cells = vec![ModelCell::blank(); usize::from(size.width) * usize::from(size.height)];
        Self {
            width: size.width,
            height: size.height,
            env,
            cells,
            cursor: (0, 0),
            pen: Attr::DEFAULT,
            pen_budget: None,
            pending: Vec::new(),
        }
    }

    /// Paint `buffer` directly, bypassing ops.
    #[must_use]
    pub fn from_buffer(buffer: &TerminalBuffer) -> Self {
        Self::from_buffer_with_height(buffer, buffer.size().height)
    }

    /// Like [`from_buffer`](Self::from_buffer) on a grid `height` rows tall.
    /// Extra rows stay blank; lines past `height` are dropped.
    #[must_use]
    pub fn from_buffer_with_height(buffer: &TerminalBuffer, height: u16) -> Self {
        let size = Size::new(buffer.size().width, height);
        let env = *buffer.env();
        let mut model = Self::new(size, env);
        for (y, line) in buffer.lines().iter().enumerate().take(usize::from(height)) {
            let Ok(y) = u16::try_from(y) else { break };
            for glyph in line.glyphs(&env).filter(|g| g.width > 0) {
                let Ok(x) = u16::try_from(glyph.col) else { break };
                model.put(x, y, glyph.text, glyph.width, glyph.attr);
            }
        }
        model
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    #[must_use]
    pub fn cells(&self) -> &[ModelCell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, x: u16, y: u16) -> Option<&ModelCell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Cells of row `y`, empty if out of range.
    #[must_use]
    pub fn row(&self, y: u16) -> &[ModelCell] {
        if y >= self.height {
            return &[];
        }
        let w = usize::from(self.width);
        let start = usize::from(y) * w;
        &self.cells[start..start + w]
    }

    /// Text of row `y` with trailing blanks trimmed.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        let mut text: String = self
            .row(y)
            .iter()
            .filter(|c| !c.continuation)
            .map(|c| c.text.as_str())
            .collect();
        let trimmed = text.trim_end_matches(' ').len();
        text.truncate(trimmed);
        text
    }

    /// Attribute of each glyph in row `y`, one entry per non-continuation
    /// cell.
    #[must_use]
    pub fn row_attrs(&self, y: u16) -> Vec<Attr> {
        self.row(y)
            .iter()
            .filter(|c| !c.continuation)
            .map(|c| c.attr)
            .collect()
    }

    /// Rows whose cells differ between the two models.
    #[must_use]
    pub fn mismatched_rows(&self, other: &TerminalModel) -> Vec<u16> {
        let height = self.height.max(other.height);
        (0..height).filter(|&y| self.row(y) != other.row(y)).collect()
    }

    /// Same dimensions and same cells. Cursor and pen are ignored.
    #[must_use]
    pub fn same_screen(&self, other: &TerminalModel) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }

    pub fn apply_all<'a>(&mut self, ops: impl IntoIterator<Item = &'a Op>) {
        for op in ops {
            self.apply(op);
        }
    }

    pub fn apply(&mut self, op: &Op) {
        match op {
            Op::SetAttr(run) => {
                self.pen = run.attr;
                self.pen_budget = Some(run.length);
            }
            Op::MoveCursor { x, y } => self.cursor = (*x, *y),
            Op::WriteBytes(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                self.write_text(&text);
            }
            Op::ClearLine(mode) => self.clear_line(*mode),
            Op::ClearScreen => {
                self.clear_screen();
                self.cursor = (0, 0);
            }
        }
    }

    /// Feed raw terminal output.
    pub fn process(&mut self, bytes: &[u8]) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);
        let mut i = 0;
        let mut text_start = 0;
        while i < data.len() {
            match data[i] {
                0x1b => {
                    self.flush_text(&data[text_start..i]);
                    match parse_csi(&data[i..]) {
                        CsiParse::Complete { params, final_byte, len } => {
                            self.csi(&params, final_byte);
                            i += len;
                        }
                        CsiParse::Skip(len) => i += len,
                        CsiParse::Incomplete => {
                            self.pending = data[i..].to_vec();
                            return;
                        }
                    }
                    text_start = i;
                }
                b'\r' | b'\n' => {
                    self.flush_text(&data[text_start..i]);
                    if data[i] == b'\r' {
                        self.cursor.0 = 0;
                    } else {
                        self.cursor.1 = self.cursor.1.saturating_add(1);
                    }
                    i += 1;
                    text_start = i;
                }
                _ => i += 1,
            }
        }
        let tail = &data[text_start..];
        match std::str::from_utf8(tail) {
            Ok(text) => self.write_text(text),
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                let text = String::from_utf8_lossy(&tail[..valid]).into_owned();
                self.write_text(&text);
                self.pending = tail[valid..].to_vec();
            }
            Err(_) => {
                let text = String::from_utf8_lossy(tail).into_owned();
                self.write_text(&text);
            }
        }
    }

    /// Write a text span that precedes a control byte.
    fn flush_text(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            let text = String::from_utf8_lossy(bytes).into_owned();
            self.write_text(&text);
        }
    }

    fn csi(&mut self, params: &[u16], final_byte: u8) {
        match final_byte {
            b'H' | b'f' => {
                let row = params.first().copied().unwrap_or(1).max(1) - 1;
                let col = params.get(1).copied().unwrap_or(1).max(1) - 1;
                self.cursor = (col, row);
            }
            b'K' => match params.first().copied().unwrap_or(0) {
                2 => self.clear_line(ClearMode::Whole),
                0 => self.clear_line(ClearMode::ToEnd),
                _ => {}
            },
            b'J' => {
                if params.first().copied() == Some(2) {
                    self.clear_screen();
                }
            }
            b'm' => self.sgr(params),
            _ => {}
        }
    }

    fn sgr(&mut self, params: &[u16]) {
        self.pen_budget = None;
        if params.is_empty() {
            self.pen = Attr::DEFAULT;
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.pen = Attr::DEFAULT,
                1 => self.pen.flags.insert(AttrFlags::BOLD),
                2 => self.pen.flags.insert(AttrFlags::DIM),
                3 => self.pen.flags.insert(AttrFlags::ITALIC),
                4 => self.pen.flags.insert(AttrFlags::UNDERLINE),
                7 => self.pen.flags.insert(AttrFlags::REVERSE),
                22 => self.pen.flags.remove(AttrFlags::BOLD | AttrFlags::DIM),
                23 => self.pen.flags.remove(AttrFlags::ITALIC),
                24 => self.pen.flags.remove(AttrFlags::UNDERLINE),
                27 => self.pen.flags.remove(AttrFlags::REVERSE),
                39 => self.pen.foreground = None,
                49 => self.pen.background = None,
                code @ (38 | 48) => {
                    if params.get(i + 1) == Some(&5)
                        && let Some(&index) = params.get(i + 2)
                    {
                        let index = u8::try_from(index).ok();
                        if code == 38 {
                            self.pen.foreground = index;
                        } else {
                            self.pen.background = index;
                        }
                        i += 2;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn write_text(&mut self, text: &str) {
        for grapheme in text.graphemes(true) {
            let attr = self.pen;
            if let Some(budget) = self.pen_budget.as_mut() {
                *budget = budget.saturating_sub(grapheme.len());
                if *budget == 0 {
                    self.pen = Attr::DEFAULT;
                    self.pen_budget = None;
                }
            }
            let width = grapheme_width(grapheme, &self.env);
            if width == 0 {
                continue;
            }
            let (x, y) = self.cursor;
            self.put(x, y, grapheme, width, attr);
            self.cursor.0 = x.saturating_add(u16::try_from(width).unwrap_or(2));
        }
    }

    fn put(&mut self, x: u16, y: u16, text: &str, width: usize, attr: Attr) {
        if y >= self.height || usize::from(x) + width > usize::from(self.width) {
            return;
        }
        self.detach(x, y);
        if width == 2 {
            self.detach(x + 1, y);
        }
        if let Some(i) = self.index(x, y) {
            self.cells[i] = ModelCell {
                text: text.to_string(),
                attr,
                continuation: false,
            };
        }
        if width == 2
            && let Some(i) = self.index(x + 1, y)
        {
            self.cells[i] = ModelCell::tail(attr);
        }
    }

    /// Blank the other half of a wide glyph that overlaps `(x, y)`.
    fn detach(&mut self, x: u16, y: u16) {
        let Some(i) = self.index(x, y) else { return };
        if self.cells[i].continuation {
            if x > 0 {
                self.cells[i - 1] = ModelCell::blank();
            }
            self.cells[i] = ModelCell::blank();
        } else if x + 1 < self.width && self.cells[i + 1].continuation {
            self.cells[i + 1] = ModelCell::blank();
        }
    }

    fn clear_line(&mut self, mode: ClearMode) {
        let (x, y) = self.cursor;
        if y >= self.height {
            return;
        }
        let from = match mode {
            ClearMode::Whole => 0,
            ClearMode::ToEnd => {
                self.detach(x, y);
                x
            }
        };
        for col in from..self.width {
            if let Some(i) = self.index(col, y) {
                self.cells[i] = ModelCell::blank();
            }
        }
    }

    fn clear_screen(&mut self) {
        self.cells.fill(ModelCell::blank());
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| usize::from(y) * usize::from(self.width) + usize::from(x))
    }
}

enum CsiParse {
    Complete {
        params: Vec<u16>,
        final_byte: u8,
        len: usize,
    },
    /// A non-CSI escape of this many bytes.
    Skip(usize),
    Incomplete,
}

/// Parse an escape sequence starting at `bytes[0] == ESC`.
fn parse_csi(bytes: &[u8]) -> CsiParse {
    match bytes.get(1) {
        None => CsiParse::Incomplete,
        Some(b'[') => {
            let mut params = Vec::new();
            let mut current: Option<u16> = None;
            for (offset, &b) in bytes[2..].iter().enumerate() {
                match b {
                    b'0'..=b'9' => {
                        let digit = u16::from(b - b'0');
                        current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                    }
                    b';' => params.push(current.take().unwrap_or(0)),
                    0x40..=0x7e => {
                        if let Some(value) = current {
                            params.push(value);
                        } else if !params.is_empty() {
                            params.push(0);
                        }
                        return CsiParse::Complete {
                            params,
                            final_byte: b,
                            len: offset + 3,
                        };
                    }
                    _ => {}
                }
            }
            CsiParse::Incomplete
        }
        Some(_) => CsiParse::Skip(2),
    }
}
