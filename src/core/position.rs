/*!
# Source position types (Position, Span)

Location types shared by the scanner, the source graph span tables and the
diagnostics stream.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in source text: 1-based line and column plus a 0-based byte offset.
///
/// Columns count Unicode scalar values; every byte of an invalid UTF-8 run
/// counts as one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Position of the first byte of a document.
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }

    /// Advances over `text`, bumping the line on every `\n`.
    pub fn advance_str(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += text.len();
    }

    /// Advances over raw bytes that could not be decoded.
    pub fn advance_bytes(&mut self, len: usize) {
        self.column += len;
        self.offset += len;
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open range `[start, end)` in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start.offset <= end.offset, "span end precedes start");
        Self { start, end }
    }

    /// Empty span located at `pos`.
    pub fn point(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    pub fn zero() -> Self {
        Self::point(Position::start())
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
