//! Source location tracking

use std::fmt;

/// A source position, 1-based line and column.
///
/// Program-level diagnostics with no meaningful position ("No main
/// function", "Missing return value") use the dummy position 0:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    /// Create a new span
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Create a dummy span (position 0:0)
    pub fn dummy() -> Self {
        Self { line: 0, col: 0 }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
