#![forbid(unsafe_code)]

//! Terminal operations: the differ's output and the writer's input.

use crate::attr::AttrRun;

/// How much of the current row [`Op::ClearLine`] erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearMode {
    /// The whole row.
    Whole,
    /// From the cursor to the end of the row.
    ToEnd,
}

/// One terminal operation.
///
/// Ops must be applied in the order emitted. Coordinates are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Style the next `run.length` bytes written. Never carries default
    /// styling.
    SetAttr(AttrRun),
    /// Absolute cursor move to column `x`, row `y`.
    MoveCursor { x: u16, y: u16 },
    /// UTF-8 text written at the cursor.
    WriteBytes(Vec<u8>),
    /// Erase part of the current row. The cursor does not move.
    ClearLine(ClearMode),
    /// Erase the screen and home the cursor.
    ClearScreen,
}

impl Op {
    #[inline]
    #[must_use]
    pub fn move_to(x: u16, y: u16) -> Self {
        Op::MoveCursor { x, y }
    }

    #[inline]
    #[must_use]
    pub fn write(bytes: impl Into<Vec<u8>>) -> Self {
        Op::WriteBytes(bytes.into())
    }

    /// Bytes carried by a [`Op::WriteBytes`], zero otherwise.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Op::WriteBytes(bytes) => bytes.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(Op::move_to(3, 4), Op::MoveCursor { x: 3, y: 4 });
        assert_eq!(Op::write("ab"), Op::WriteBytes(b"ab".to_vec()));
        assert_eq!(Op::write("ab").payload_len(), 2);
        assert_eq!(Op::ClearScreen.payload_len(), 0);
    }
}
