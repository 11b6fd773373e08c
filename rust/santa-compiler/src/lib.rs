//! santa-compiler
//!
//! The santa-lang front-end: lexing, parsing, desugaring, name resolution,
//! tail-call analysis, and emission of the value-stack artifact executed by
//! `santa-rt`.

pub mod ast;
pub mod desugar;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod resolve;
pub mod tailcall;
pub mod tokens;

use santa_core::code::Artifact;
use santa_core::error::{Diagnostic, ErrorKind};
use santa_core::span::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("{0}")]
    Lex(#[from] lexer::LexError),
    #[error("{0}")]
    Parse(#[from] parser::ParseError),
    #[error("{0}")]
    Resolve(#[from] resolve::ResolveError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lex(_) => ErrorKind::LexError,
            CompileError::Parse(_) => ErrorKind::SyntaxError,
            CompileError::Resolve(_) => ErrorKind::ResolveError,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            CompileError::Lex(err) => err.span(),
            CompileError::Parse(err) => err.span(),
            CompileError::Resolve(err) => err.span(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.kind(), self.to_string(), Some(self.span()))
    }
}

/// Run the front-end over a source text: lex, parse, desugar, resolve,
/// analyze tail calls, and emit. Any phase's error halts the pipeline.
pub fn compile_to_artifact(source: &str) -> Result<Artifact, CompileError> {
    let tokens = lexer::Lexer::new(source).tokenize()?;
    let program = parser::Parser::new(tokens).parse_program()?;
    let mut program = desugar::desugar(program);
    resolve::resolve(&mut program)?;
    tailcall::mark_tail_calls(&mut program);
    Ok(lower::lower(&program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_report_their_error_kind() {
        assert_eq!(
            compile_to_artifact("\"open").unwrap_err().kind(),
            ErrorKind::LexError
        );
        assert_eq!(
            compile_to_artifact("let = 5").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
        assert_eq!(
            compile_to_artifact("nope").unwrap_err().kind(),
            ErrorKind::ResolveError
        );
    }

    #[test]
    fn diagnostics_carry_location() {
        let err = compile_to_artifact("let x = 1\nx + y").unwrap_err();
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.message, "Undefined identifier y");
        assert_eq!(diagnostic.span.unwrap().start.line, 2);
    }
}
