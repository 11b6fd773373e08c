//! Single-pass scanner with line/column tracking.
//!
//! Newlines are significant (statement separation, section headers), so each
//! physical newline becomes a token. Columns count Unicode code points.

use crate::tokens::{Token, TokenKind};
use santa_core::span::{Position, Span};
use thiserror::Error;

const SECTION_NAMES: [&str; 4] = ["input", "part_one", "part_two", "test"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("Unterminated string")]
    UnterminatedString { span: Span },
    #[error("Invalid escape '\\{escape}'")]
    InvalidEscape { escape: char, span: Span },
    #[error("Unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::UnexpectedCharacter { span, .. } => *span,
        }
    }
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Whether a non-newline token has been emitted on the current line;
    /// section headers only lex at the head of a line.
    line_dirty: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            line_dirty: false,
        }
    }

    /// Lex the whole source, stripping comments.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        let mut tokens = self.tokenize_with_comments()?;
        tokens.retain(|t| !matches!(t.kind, TokenKind::Comment(_)));
        Ok(tokens)
    }

    /// Lex the whole source, keeping comment tokens.
    pub fn tokenize_with_comments(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        while matches!(self.current(), Some(' ') | Some('\t')) {
            self.advance();
        }
        let start = self.position();
        let start_pos = self.pos;
        let at_line_head = !self.line_dirty;

        let Some(ch) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, "", Span::new(start, start)));
        };

        if ch == '\n' || ch == '\r' {
            self.advance();
            if ch == '\r' && self.current() == Some('\n') {
                self.advance();
            }
            self.line_dirty = false;
            return Ok(Token::new(
                TokenKind::Newline,
                "\n",
                Span::new(start, self.position()),
            ));
        }

        self.line_dirty = true;

        if ch == '/' && self.peek() == Some('/') {
            while self.current().is_some_and(|c| c != '\n') {
                self.advance();
            }
            let text: String = self.source[start_pos..self.pos].iter().collect();
            return Ok(Token::new(
                TokenKind::Comment(text.clone()),
                text,
                Span::new(start, self.position()),
            ));
        }

        if ch.is_ascii_digit() {
            return self.lex_number(start, start_pos);
        }
        if ch == '"' {
            return self.lex_string(start, start_pos);
        }
        if ch == '`' {
            return self.lex_infix_ident(start, start_pos);
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.lex_identifier(start, start_pos, at_line_head));
        }

        self.advance();
        let two = |lexer: &mut Lexer, kind: TokenKind| {
            lexer.advance();
            kind
        };
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '#' if self.current() == Some('{') => two(self, TokenKind::HashBrace),
            '=' if self.current() == Some('=') => two(self, TokenKind::Eq),
            '=' => TokenKind::Assign,
            '!' if self.current() == Some('=') => two(self, TokenKind::NotEq),
            '!' => TokenKind::Bang,
            '<' if self.current() == Some('=') => two(self, TokenKind::LtEq),
            '<' => TokenKind::Lt,
            '>' if self.current() == Some('>') => two(self, TokenKind::Compose),
            '>' if self.current() == Some('=') => two(self, TokenKind::GtEq),
            '>' => TokenKind::Gt,
            '&' if self.current() == Some('&') => two(self, TokenKind::AndAnd),
            '|' if self.current() == Some('>') => two(self, TokenKind::PipeForward),
            '|' if self.current() == Some('|') => two(self, TokenKind::OrOr),
            '|' => TokenKind::Pipe,
            '.' if self.current() == Some('.') => {
                self.advance();
                if self.current() == Some('=') {
                    two(self, TokenKind::DotDotEq)
                } else {
                    TokenKind::DotDot
                }
            }
            other => {
                return Err(LexError::UnexpectedCharacter {
                    ch: other,
                    span: Span::new(start, self.position()),
                })
            }
        };
        Ok(self.finish(kind, start, start_pos))
    }

    fn finish(&self, kind: TokenKind, start: Position, start_pos: usize) -> Token {
        let lexeme: String = self.source[start_pos..self.pos].iter().collect();
        Token::new(kind, lexeme, Span::new(start, self.position()))
    }

    fn lex_number(&mut self, start: Position, start_pos: usize) -> Result<Token, LexError> {
        while self.current().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.advance();
        }
        let mut is_decimal = false;
        // A '.' opens a fraction only when a digit follows; `1..` is a range.
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.advance();
            }
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            let mut lookahead = self.pos + 1;
            if matches!(self.source.get(lookahead), Some('+') | Some('-')) {
                lookahead += 1;
            }
            if self.source.get(lookahead).is_some_and(|c| c.is_ascii_digit()) {
                is_decimal = true;
                while self.pos < lookahead {
                    self.advance();
                }
                while self.current().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let digits: String = self.source[start_pos..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let kind = if is_decimal {
            TokenKind::Decimal(digits.parse().unwrap_or(0.0))
        } else {
            TokenKind::Int(digits.parse().unwrap_or(0))
        };
        Ok(self.finish(kind, start, start_pos))
    }

    fn lex_string(&mut self, start: Position, start_pos: usize) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.current() {
                None => {
                    return Err(LexError::UnterminatedString {
                        span: Span::new(start, self.position()),
                    })
                }
                Some('"') => {
                    self.advance();
                    return Ok(self.finish(TokenKind::Str(value), start, start_pos));
                }
                Some('\\') => {
                    let escape_start = self.position();
                    self.advance();
                    let Some(escape) = self.advance() else {
                        return Err(LexError::UnterminatedString {
                            span: Span::new(start, self.position()),
                        });
                    };
                    match escape {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{0008}'),
                        'f' => value.push('\u{000C}'),
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        other => {
                            return Err(LexError::InvalidEscape {
                                escape: other,
                                span: Span::new(escape_start, self.position()),
                            })
                        }
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn lex_infix_ident(&mut self, start: Position, start_pos: usize) -> Result<Token, LexError> {
        self.advance(); // opening backtick
        let mut name = String::new();
        while self
            .current()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            name.push(self.advance().unwrap());
        }
        if name.is_empty() || self.current() != Some('`') {
            return Err(LexError::UnexpectedCharacter {
                ch: '`',
                span: Span::new(start, self.position()),
            });
        }
        self.advance(); // closing backtick
        Ok(self.finish(TokenKind::InfixIdent(name), start, start_pos))
    }

    fn lex_identifier(&mut self, start: Position, start_pos: usize, at_line_head: bool) -> Token {
        while self
            .current()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let name: String = self.source[start_pos..self.pos].iter().collect();
        if at_line_head && SECTION_NAMES.contains(&name.as_str()) && self.current() == Some(':') {
            self.advance();
            return self.finish(TokenKind::SectionHeader(name), start, start_pos);
        }
        let kind = match name.as_str() {
            "_" => TokenKind::Underscore,
            "let" => TokenKind::Let,
            "mut" => TokenKind::Mut,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "match" => TokenKind::Match,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            _ => TokenKind::Ident(name),
        };
        self.finish(kind, start, start_pos)
    }
}
