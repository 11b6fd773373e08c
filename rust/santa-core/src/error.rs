//! Diagnostic taxonomy shared by every phase, plus the source-snippet
//! renderer used by embedders.

use crate::span::Span;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which phase produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    LexError,
    SyntaxError,
    ResolveError,
    RuntimeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::LexError => "LexError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ResolveError => "ResolveError",
            ErrorKind::RuntimeError => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// A failure raised while evaluating emitted code. The span is attached by
/// the machine from the instruction that faulted.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub span: Option<Span>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    /// Attach a span if none was recorded closer to the fault.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }
}

/// The uniform error surface handed to embedders.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Render the diagnostic with a source snippet:
    ///
    /// ```text
    /// RuntimeError: Cannot add Integer and String
    ///   --> line 2, column 9
    ///     |
    ///   2 | let x = 1 + "a"
    ///     |         ^
    /// ```
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        let Some(span) = self.span else {
            return out;
        };
        out.push_str(&format!("\n  --> {}", span.start));
        let line_no = span.start.line;
        if let Some(line) = source_line(source, line_no) {
            let number = line_no.to_string();
            let gutter = " ".repeat(number.len());
            out.push_str(&format!("\n  {} |", gutter));
            out.push_str(&format!("\n  {} | {}", number, line));
            let caret_pad = " ".repeat(span.start.column.saturating_sub(1));
            out.push_str(&format!("\n  {} | {}^", gutter, caret_pad));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({})", span.start)?;
        }
        Ok(())
    }
}

impl From<RuntimeError> for Diagnostic {
    fn from(err: RuntimeError) -> Self {
        Diagnostic::new(ErrorKind::RuntimeError, err.message, err.span)
    }
}

/// Extract one line of source, normalizing `\r\n` and bare `\r` to `\n`.
fn source_line(source: &str, line: usize) -> Option<String> {
    if line == 0 {
        return None;
    }
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .split('\n')
        .nth(line - 1)
        .map(|l| l.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn renders_snippet_with_caret() {
        let source = "let a = 1\nlet x = 1 + \"a\"\n";
        let diag = Diagnostic::new(
            ErrorKind::RuntimeError,
            "Cannot add Integer and String",
            Some(Span::point(2, 9)),
        );
        let rendered = diag.render(source);
        assert_eq!(
            rendered,
            "RuntimeError: Cannot add Integer and String\n  --> line 2, column 9\n    |\n  2 | let x = 1 + \"a\"\n    |         ^"
        );
    }

    #[test]
    fn renders_without_span() {
        let diag = Diagnostic::new(ErrorKind::LexError, "Unterminated string", None);
        assert_eq!(diag.render(""), "LexError: Unterminated string");
    }

    #[test]
    fn normalizes_carriage_returns() {
        let source = "a\r\nb + c\rlast";
        let diag = Diagnostic::new(ErrorKind::SyntaxError, "Expected expression", Some(Span::point(2, 3)));
        assert!(diag.render(source).contains("2 | b + c"));
    }
}
