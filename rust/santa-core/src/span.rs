use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position, 1-based, counted over Unicode code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Half-open source range `[start, end)` carried by every token, AST node,
/// and emitted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn point(line: usize, column: usize) -> Self {
        let p = Position::new(line, column);
        Self { start: p, end: p }
    }

    pub fn dummy() -> Self {
        Self::point(0, 0)
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_outermost_bounds() {
        let a = Span::new(Position::new(1, 4), Position::new(1, 7));
        let b = Span::new(Position::new(1, 6), Position::new(2, 2));
        let merged = a.merge(b);
        assert_eq!(merged.start, Position::new(1, 4));
        assert_eq!(merged.end, Position::new(2, 2));
    }
}
