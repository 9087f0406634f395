#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte-generation functions with no state tracking; the
//! [`Presenter`](crate::presenter::Presenter) decides when to call them.
//!
//! # Sequence Reference
//!
//! | Category | Sequence | Description |
//! |----------|----------|-------------|
//! | CSI | `ESC [ n ; ... m` | SGR (Select Graphic Rendition) |
//! | CSI | `ESC [ row ; col H` | CUP (Cursor Position, 1-indexed) |
//! | CSI | `ESC [ n K` | EL (Erase Line) |
//! | CSI | `ESC [ n J` | ED (Erase Display) |

use std::io::{self, Write};

use crate::attr::{Attr, AttrFlags};
use crate::op::ClearMode;

// =============================================================================
// SGR (Select Graphic Rendition)
// =============================================================================

/// SGR reset: `CSI 0 m`
pub const SGR_RESET: &[u8] = b"\x1b[0m";

/// SGR on/off code pair.
#[derive(Debug, Clone, Copy)]
pub struct SgrCodes {
    pub on: u8,
    pub off: u8,
}

pub const SGR_BOLD: SgrCodes = SgrCodes { on: 1, off: 22 };
pub const SGR_DIM: SgrCodes = SgrCodes { on: 2, off: 22 };
pub const SGR_ITALIC: SgrCodes = SgrCodes { on: 3, off: 23 };
pub const SGR_UNDERLINE: SgrCodes = SgrCodes { on: 4, off: 24 };
pub const SGR_REVERSE: SgrCodes = SgrCodes { on: 7, off: 27 };

/// Ordered table of (flag, on/off codes) for iteration.
pub const FLAG_TABLE: [(AttrFlags, SgrCodes); 5] = [
    (AttrFlags::BOLD, SGR_BOLD),
    (AttrFlags::DIM, SGR_DIM),
    (AttrFlags::ITALIC, SGR_ITALIC),
    (AttrFlags::UNDERLINE, SGR_UNDERLINE),
    (AttrFlags::REVERSE, SGR_REVERSE),
];

#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

/// Write a single SGR sequence establishing `attr` from a clean state.
///
/// Emits `CSI 0 ; flags ; 38;5;fg ; 48;5;bg m`. The leading `0` makes the
/// sequence independent of whatever pen the terminal had. With
/// `color == false` the color parameters are omitted (flags are kept).
pub fn sgr_attr<W: Write>(w: &mut W, attr: &Attr, color: bool) -> io::Result<()> {
    let mut seq = String::with_capacity(24);
    seq.push_str("\x1b[0");
    for (flag, codes) in FLAG_TABLE {
        if attr.flags.contains(flag) {
            seq.push(';');
            push_dec(&mut seq, codes.on);
        }
    }
    if color {
        if let Some(fg) = attr.foreground {
            seq.push_str(";38;5;");
            push_dec(&mut seq, fg);
        }
        if let Some(bg) = attr.background {
            seq.push_str(";48;5;");
            push_dec(&mut seq, bg);
        }
    }
    seq.push('m');
    w.write_all(seq.as_bytes())
}

fn push_dec(s: &mut String, n: u8) {
    use std::fmt::Write as _;
    let _ = write!(s, "{n}");
}

// =============================================================================
// Cursor Positioning
// =============================================================================

/// CUP (Cursor Position): `CSI row ; col H`.
///
/// Inputs are 0-indexed and converted to the 1-indexed wire form.
pub fn cup<W: Write>(w: &mut W, row: u16, col: u16) -> io::Result<()> {
    write!(
        w,
        "\x1b[{};{}H",
        u32::from(row) + 1,
        u32::from(col) + 1
    )
}

// =============================================================================
// Erase
// =============================================================================

/// EL (Erase Line): `CSI K` or `CSI 2 K`.
pub fn erase_line<W: Write>(w: &mut W, mode: ClearMode) -> io::Result<()> {
    match mode {
        ClearMode::ToEnd => w.write_all(b"\x1b[K"),
        ClearMode::Whole => w.write_all(b"\x1b[2K"),
    }
}

/// ED (Erase Display) followed by cursor home: `CSI 2 J CSI H`.
pub fn clear_screen<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b[2J\x1b[H")
}

// =============================================================================
// Stripping
// =============================================================================

/// Remove escape sequences from `bytes`.
///
/// Handles CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`)
/// and two-byte escapes. Other C0 controls except `\n` and `\t` are dropped.
#[must_use]
pub fn strip_ansi(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let Some(rel) = memchr::memchr(0x1b, &bytes[i..]) else {
            push_printable(&mut out, &bytes[i..]);
            break;
        };
        push_printable(&mut out, &bytes[i..i + rel]);
        i += rel + 1;
        match bytes.get(i) {
            Some(b'[') => {
                i += 1;
                while i < bytes.len() && !(0x40..=0x7e).contains(&bytes[i]) {
                    i += 1;
                }
                i += 1;
            }
            Some(b']') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            Some(_) => i += 1,
            None => {}
        }
    }
    out
}

fn push_printable(out: &mut Vec<u8>, chunk: &[u8]) {
    out.extend(
        chunk
            .iter()
            .copied()
            .filter(|&b| b >= 0x20 || b == b'\n' || b == b'\t'),
    );
}
