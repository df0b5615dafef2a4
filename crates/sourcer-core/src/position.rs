//! Offsets, line/column positions and spans.
//!
//! Offsets are byte offsets into the input. Lines and columns are 1-based;
//! columns count characters, not bytes. `\n`, `\r\n` and a lone `\r` each
//! terminate a line.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    #[error("offset {offset} is outside the input (length {len})")]
    OutOfRange { offset: usize, len: usize },

    #[error("span start {start} is after its end {end}")]
    InvalidSpan { start: usize, end: usize },
}

/// A location in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// The position of offset 0.
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open region `[start, end)` of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    start: Position,
    end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Result<Self, SpanError> {
        if start.offset > end.offset {
            return Err(SpanError::InvalidSpan {
                start: start.offset,
                end: end.offset,
            });
        }
        Ok(Self { start, end })
    }

    /// Zero-width span at `at`.
    pub fn empty(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start.offset..self.end.offset
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start.offset <= other.start.offset && other.end.offset <= self.end.offset
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start.offset < other.end.offset && other.start.offset < self.end.offset
    }

    /// The text covered by this span.
    ///
    /// Returns `None` if the span does not fit `source`.
    pub fn slice<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.range())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Precomputed line starts for one input.
///
/// Built once per parse; `locate` is a binary search.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(input: &str) -> Self {
        let bytes = input.as_bytes();
        let mut line_starts = vec![0];
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'\n' => line_starts.push(i + 1),
                b'\r' if bytes.get(i + 1) != Some(&b'\n') => line_starts.push(i + 1),
                _ => {}
            }
        }
        Self {
            line_starts,
            len: input.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Position of `offset` within `input`, which must be the text this index was built from.
    pub fn locate(&self, input: &str, offset: usize) -> Result<Position, SpanError> {
        if offset > self.len || input.len() != self.len {
            return Err(SpanError::OutOfRange {
                offset,
                len: self.len,
            });
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        // Count characters by skipping UTF-8 continuation bytes.
        let column = input.as_bytes()[line_start..offset]
            .iter()
            .filter(|&&b| b & 0xC0 != 0x80)
            .count();

        Ok(Position {
            offset,
            line: line + 1,
            column: column + 1,
        })
    }

    pub fn span(&self, input: &str, range: Range<usize>) -> Result<Span, SpanError> {
        let start = self.locate(input, range.start)?;
        let end = self.locate(input, range.end)?;
        Span::new(start, end)
    }
}

/// Position of `offset` in `input`.
///
/// Rebuilds the line table on every call; hold a [`LineIndex`] for repeated lookups.
pub fn locate(input: &str, offset: usize) -> Result<Position, SpanError> {
    LineIndex::new(input).locate(input, offset)
}
