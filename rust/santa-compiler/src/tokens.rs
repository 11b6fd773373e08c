use santa_core::span::Span;
use serde::Serialize;
use std::fmt;

/// Token kinds for santa-lang source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Decimal(f64),
    Str(String),

    // Names
    Ident(String),
    /// Backtick-quoted infix identifier: `` `max` ``
    InfixIdent(String),
    /// `input:` / `part_one:` / `part_two:` / `test:` at the head of a line
    SectionHeader(String),
    /// `_`
    Underscore,

    // Keywords
    Let,
    Mut,
    If,
    Else,
    Match,
    Return,
    Break,
    True,
    False,
    Nil,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `#{`
    HashBrace,
    Comma,
    Semicolon,
    Colon,
    Pipe,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Bang,
    AndAnd,
    OrOr,
    PipeForward,
    /// `>>`
    Compose,
    DotDot,
    DotDotEq,

    /// Only produced by `tokenize_with_comments`.
    Comment(String),
    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "{n}"),
            TokenKind::Decimal(d) => write!(f, "{d}"),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::Ident(name) => f.write_str(name),
            TokenKind::InfixIdent(name) => write!(f, "`{name}`"),
            TokenKind::SectionHeader(name) => write!(f, "{name}:"),
            TokenKind::Underscore => f.write_str("_"),
            TokenKind::Let => f.write_str("let"),
            TokenKind::Mut => f.write_str("mut"),
            TokenKind::If => f.write_str("if"),
            TokenKind::Else => f.write_str("else"),
            TokenKind::Match => f.write_str("match"),
            TokenKind::Return => f.write_str("return"),
            TokenKind::Break => f.write_str("break"),
            TokenKind::True => f.write_str("true"),
            TokenKind::False => f.write_str("false"),
            TokenKind::Nil => f.write_str("nil"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::HashBrace => f.write_str("#{"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Semicolon => f.write_str(";"),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Pipe => f.write_str("|"),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::Assign => f.write_str("="),
            TokenKind::Eq => f.write_str("=="),
            TokenKind::NotEq => f.write_str("!="),
            TokenKind::Lt => f.write_str("<"),
            TokenKind::LtEq => f.write_str("<="),
            TokenKind::Gt => f.write_str(">"),
            TokenKind::GtEq => f.write_str(">="),
            TokenKind::Bang => f.write_str("!"),
            TokenKind::AndAnd => f.write_str("&&"),
            TokenKind::OrOr => f.write_str("||"),
            TokenKind::PipeForward => f.write_str("|>"),
            TokenKind::Compose => f.write_str(">>"),
            TokenKind::DotDot => f.write_str(".."),
            TokenKind::DotDotEq => f.write_str("..="),
            TokenKind::Comment(_) => f.write_str("comment"),
            TokenKind::Newline => f.write_str("newline"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}
