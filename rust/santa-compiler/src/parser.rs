//! Recursive descent parser with Pratt expression parsing.
//!
//! Binding powers, low to high: assignment, `||`, `&&`, comparison
//! (non-associative), range, additive, multiplicative, `|>`, `>>`, unary,
//! postfix. A newline run followed by a binary operator continues the
//! current expression, which is what makes pipeline-per-line layout parse.

use crate::ast::*;
use crate::tokens::{Token, TokenKind};
use santa_core::span::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Expected expression, found {found}")]
    ExpectedExpression { found: String, span: Span },
    #[error("Expected '{expected}', found {found}")]
    ExpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Expected '=' in let")]
    ExpectedLetAssign { span: Span },
    #[error("Expected identifier, found {found}")]
    ExpectedIdentifier { found: String, span: Span },
    #[error("Invalid pattern")]
    InvalidPattern { span: Span },
    #[error("Comparison operators cannot be chained")]
    ChainedComparison { span: Span },
    #[error("Expected string literal in test block")]
    ExpectedTestString { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::ExpectedExpression { span, .. }
            | ParseError::ExpectedToken { span, .. }
            | ParseError::ExpectedLetAssign { span }
            | ParseError::ExpectedIdentifier { span, .. }
            | ParseError::InvalidPattern { span }
            | ParseError::ChainedComparison { span }
            | ParseError::ExpectedTestString { span } => *span,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with EOF"))
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.current();
            Err(ParseError::ExpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
                span: token.span,
            })
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::RBrace
                | TokenKind::SectionHeader(_)
        )
    }

    // ── Program structure ───────────────────────────────────────────

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let start = self.current().span;
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            if let TokenKind::SectionHeader(_) = self.peek() {
                items.push(Item::Section(self.parse_section()?));
                continue;
            }
            let stmt = self.parse_statement()?;
            if !self.at_terminator() {
                let token = self.current();
                return Err(ParseError::ExpectedToken {
                    expected: "newline".to_string(),
                    found: token.kind.to_string(),
                    span: token.span,
                });
            }
            items.push(Item::Statement(stmt));
        }
        let span = start.merge(self.prev_span());
        Ok(Program { items, span })
    }

    fn parse_section(&mut self) -> Result<Section, ParseError> {
        let header = self.advance();
        let TokenKind::SectionHeader(name) = header.kind else {
            unreachable!("caller checked for a section header");
        };
        let body = if name == "test" {
            SectionBody::TestBlocks(self.parse_test_blocks()?)
        } else {
            self.skip_newlines();
            SectionBody::Expr(self.parse_expr(0)?)
        };
        let span = header.span.merge(self.prev_span());
        Ok(Section { name, body, span })
    }

    fn parse_test_blocks(&mut self) -> Result<Vec<TestBlock>, ParseError> {
        self.skip_newlines();
        let braced = self.eat(&TokenKind::LBrace);
        let mut blocks = Vec::new();
        loop {
            self.skip_separators();
            if braced && self.eat(&TokenKind::RBrace) {
                break;
            }
            match self.peek().clone() {
                TokenKind::SectionHeader(sub) if sub != "test" => {
                    let header = self.advance();
                    self.skip_newlines();
                    let TokenKind::Str(value) = self.peek().clone() else {
                        return Err(ParseError::ExpectedTestString {
                            span: self.current().span,
                        });
                    };
                    let value_token = self.advance();
                    blocks.push(TestBlock {
                        name: sub,
                        value,
                        span: header.span.merge(value_token.span),
                    });
                }
                TokenKind::Eof if !braced => break,
                _ if !braced => break,
                other => {
                    return Err(ParseError::ExpectedToken {
                        expected: "}".to_string(),
                        found: other.to_string(),
                        span: self.current().span,
                    })
                }
            }
        }
        Ok(blocks)
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => {
                let keyword = self.advance();
                let value = if self.at_terminator() {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                let span = keyword.span.merge(self.prev_span());
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    span,
                })
            }
            TokenKind::Break => {
                let keyword = self.advance();
                let value = if self.at_terminator() {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                let span = keyword.span.merge(self.prev_span());
                Ok(Stmt {
                    kind: StmtKind::Break(value),
                    span,
                })
            }
            _ => {
                let expr = self.parse_expr(0)?;
                let span = expr.span;
                Ok(Stmt {
                    kind: StmtKind::Expr(expr),
                    span,
                })
            }
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.advance();
        let mutable = self.eat(&TokenKind::Mut);
        let pattern = self.parse_pattern()?;
        if !self.eat(&TokenKind::Assign) {
            return Err(ParseError::ExpectedLetAssign {
                span: self.current().span,
            });
        }
        let value = self.parse_expr(0)?;
        let span = keyword.span.merge(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::Let {
                mutable,
                pattern,
                value,
            },
            span,
        })
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            // A newline run followed by a binary operator continues the
            // expression.
            if matches!(self.peek(), TokenKind::Newline) {
                let mut i = 0;
                while matches!(self.peek_at(i), Some(TokenKind::Newline)) {
                    i += 1;
                }
                if self.peek_at(i).is_some_and(is_infix_operator) {
                    for _ in 0..i {
                        self.advance();
                    }
                } else {
                    break;
                }
            }

            let (op, l_bp, r_bp) = match self.peek() {
                TokenKind::Assign => {
                    if min_bp > 2 {
                        break;
                    }
                    let ExprKind::Ident { name, .. } = &lhs.kind else {
                        return Err(ParseError::ExpectedIdentifier {
                            found: "expression".to_string(),
                            span: lhs.span,
                        });
                    };
                    let name = name.clone();
                    self.advance();
                    let value = self.parse_expr(2)?;
                    let span = lhs.span.merge(value.span);
                    lhs = Expr::new(
                        ExprKind::Assign {
                            name,
                            binding: None,
                            value: Box::new(value),
                        },
                        span,
                    );
                    continue;
                }
                TokenKind::OrOr => (BinOp::Or, 4, 5),
                TokenKind::AndAnd => (BinOp::And, 6, 7),
                TokenKind::Eq => (BinOp::Eq, 8, 9),
                TokenKind::NotEq => (BinOp::Ne, 8, 9),
                TokenKind::Lt => (BinOp::Lt, 8, 9),
                TokenKind::LtEq => (BinOp::Le, 8, 9),
                TokenKind::Gt => (BinOp::Gt, 8, 9),
                TokenKind::GtEq => (BinOp::Ge, 8, 9),
                TokenKind::DotDot | TokenKind::DotDotEq => {
                    if min_bp > 10 {
                        break;
                    }
                    let inclusive = matches!(self.peek(), TokenKind::DotDotEq);
                    self.advance();
                    let end = if !inclusive && !can_start_expr(self.peek()) {
                        None
                    } else {
                        Some(Box::new(self.parse_expr(11)?))
                    };
                    let span = lhs
                        .span
                        .merge(end.as_ref().map(|e| e.span).unwrap_or(self.prev_span()));
                    lhs = Expr::new(
                        ExprKind::Range {
                            start: Box::new(lhs),
                            end,
                            inclusive,
                        },
                        span,
                    );
                    continue;
                }
                TokenKind::Plus => (BinOp::Add, 12, 13),
                TokenKind::Minus => (BinOp::Sub, 12, 13),
                TokenKind::Star => (BinOp::Mul, 14, 15),
                TokenKind::Slash => (BinOp::Div, 14, 15),
                TokenKind::Percent => (BinOp::Mod, 14, 15),
                TokenKind::PipeForward => (BinOp::Pipeline, 16, 17),
                // Right-associative.
                TokenKind::Compose => (BinOp::Compose, 18, 18),
                _ => break,
            };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(r_bp)?;
            let span = lhs.span.merge(rhs.span);
            let comparison = matches!(
                op,
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
            );
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
            if comparison
                && matches!(
                    self.peek(),
                    TokenKind::Eq
                        | TokenKind::NotEq
                        | TokenKind::Lt
                        | TokenKind::LtEq
                        | TokenKind::Gt
                        | TokenKind::GtEq
                )
            {
                return Err(ParseError::ChainedComparison {
                    span: self.current().span,
                });
            }
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            TokenKind::Minus => {
                let op_token = self.advance();
                let operand = self.parse_expr(19)?;
                let span = op_token.span.merge(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::Bang => {
                let op_token = self.advance();
                let operand = self.parse_expr(19)?;
                let span = op_token.span.merge(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = self.parse_elements(&TokenKind::RParen, ")")?;
                    // Trailing-lambda sugar: `f(x) |p| body`.
                    if matches!(self.peek(), TokenKind::Pipe) {
                        let lambda = self.parse_function_lit()?;
                        args.push(Element {
                            spread: false,
                            value: lambda,
                        });
                    }
                    let span = expr.span.merge(self.prev_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            tail: false,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr(0)?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket, "]")?;
                    let span = expr.span.merge(self.prev_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::InfixIdent(name) => {
                    let name = name.clone();
                    let op_token = self.advance();
                    let rhs = self.parse_expr(19)?;
                    let span = expr.span.merge(rhs.span);
                    let callee = Expr::new(
                        ExprKind::Ident {
                            name,
                            binding: None,
                        },
                        op_token.span,
                    );
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(callee),
                            args: vec![
                                Element {
                                    spread: false,
                                    value: expr,
                                },
                                Element {
                                    spread: false,
                                    value: rhs,
                                },
                            ],
                            tail: false,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), token.span))
            }
            TokenKind::Decimal(d) => {
                self.advance();
                Ok(Expr::new(ExprKind::Decimal(d), token.span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), token.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), token.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), token.span))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::Nil, token.span))
            }
            TokenKind::Underscore => {
                self.advance();
                Ok(Expr::new(ExprKind::Placeholder, token.span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Ident {
                        name,
                        binding: None,
                    },
                    token.span,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr(0)?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, ")")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_elements(&TokenKind::RBracket, "]")?;
                Ok(Expr::new(
                    ExprKind::List(elements),
                    token.span.merge(self.prev_span()),
                ))
            }
            TokenKind::HashBrace => self.parse_dict(),
            TokenKind::LBrace => self.parse_block_or_set(),
            TokenKind::Pipe | TokenKind::OrOr => self.parse_function_lit(),
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            other => Err(ParseError::ExpectedExpression {
                found: other.to_string(),
                span: token.span,
            }),
        }
    }

    /// Comma-separated elements with spread support, up to `terminator`.
    fn parse_elements(
        &mut self,
        terminator: &TokenKind,
        expected: &str,
    ) -> Result<Vec<Element>, ParseError> {
        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(terminator) {
                return Ok(elements);
            }
            let spread = self.eat(&TokenKind::DotDot);
            let value = self.parse_expr(0)?;
            elements.push(Element { spread, value });
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(terminator, expected)?;
            return Ok(elements);
        }
    }

    fn parse_dict(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance();
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.eat(&TokenKind::DotDot) {
                entries.push(DictEntry::Spread(self.parse_expr(0)?));
            } else {
                let key = self.parse_expr(0)?;
                if self.eat(&TokenKind::Colon) {
                    self.skip_newlines();
                    let value = self.parse_expr(0)?;
                    entries.push(DictEntry::Pair { key, value });
                } else {
                    let ExprKind::Ident { name, .. } = key.kind else {
                        return Err(ParseError::ExpectedToken {
                            expected: ":".to_string(),
                            found: self.peek().to_string(),
                            span: self.current().span,
                        });
                    };
                    entries.push(DictEntry::Shorthand {
                        name,
                        span: key.span,
                    });
                }
            }
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RBrace, "}")?;
            break;
        }
        Ok(Expr::new(
            ExprKind::Dict(entries),
            open.span.merge(self.prev_span()),
        ))
    }

    /// `{` in expression position: an empty brace pair or a leading
    /// statement forms a block; a leading expression followed by `,` or `}`
    /// forms a set literal.
    fn parse_block_or_set(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance();
        self.skip_newlines();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::new(
                ExprKind::Block(Vec::new()),
                open.span.merge(self.prev_span()),
            ));
        }
        if matches!(
            self.peek(),
            TokenKind::Let | TokenKind::Return | TokenKind::Break
        ) {
            let stmts = self.parse_block_body()?;
            return Ok(Expr::new(
                ExprKind::Block(stmts),
                open.span.merge(self.prev_span()),
            ));
        }
        if matches!(self.peek(), TokenKind::DotDot) {
            // A leading spread can only belong to a set literal.
            let elements = self.parse_elements(&TokenKind::RBrace, "}")?;
            return Ok(Expr::new(
                ExprKind::Set(elements),
                open.span.merge(self.prev_span()),
            ));
        }
        let first = self.parse_expr(0)?;
        match self.peek() {
            TokenKind::Comma => {
                self.advance();
                let mut elements = vec![Element {
                    spread: false,
                    value: first,
                }];
                elements.extend(self.parse_elements(&TokenKind::RBrace, "}")?);
                Ok(Expr::new(
                    ExprKind::Set(elements),
                    open.span.merge(self.prev_span()),
                ))
            }
            TokenKind::RBrace => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Set(vec![Element {
                        spread: false,
                        value: first,
                    }]),
                    open.span.merge(self.prev_span()),
                ))
            }
            _ => {
                let first_span = first.span;
                let mut stmts = vec![Stmt {
                    kind: StmtKind::Expr(first),
                    span: first_span,
                }];
                stmts.extend(self.parse_block_body()?);
                Ok(Expr::new(
                    ExprKind::Block(stmts),
                    open.span.merge(self.prev_span()),
                ))
            }
        }
    }

    /// Statements up to and including the closing `}`. The opening brace
    /// (and possibly a first statement) has already been consumed.
    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.eat(&TokenKind::RBrace) {
                return Ok(stmts);
            }
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(ParseError::ExpectedToken {
                    expected: "}".to_string(),
                    found: self.peek().to_string(),
                    span: self.current().span,
                });
            }
            let stmt = self.parse_statement()?;
            stmts.push(stmt);
            if !self.at_terminator() {
                return Err(ParseError::ExpectedToken {
                    expected: "}".to_string(),
                    found: self.peek().to_string(),
                    span: self.current().span,
                });
            }
        }
    }

    /// An explicit `{ … }` block (if/match/function bodies).
    fn parse_block_expr(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(&TokenKind::LBrace, "{")?;
        let stmts = self.parse_block_body()?;
        Ok(Expr::new(
            ExprKind::Block(stmts),
            open.span.merge(self.prev_span()),
        ))
    }

    fn parse_function_lit(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance();
        let mut params = Vec::new();
        if open.kind == TokenKind::Pipe {
            loop {
                self.skip_newlines();
                if self.eat(&TokenKind::Pipe) {
                    break;
                }
                match self.peek().clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        params.push(Param::Named {
                            name,
                            captured: false,
                        });
                    }
                    _ => params.push(Param::Pattern(self.parse_pattern()?)),
                }
                self.skip_newlines();
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::Pipe, "|")?;
                break;
            }
        }
        self.skip_newlines();
        // A braced body is always a block, as in if/match arms.
        let body = if matches!(self.peek(), TokenKind::LBrace) {
            self.parse_block_expr()?
        } else {
            self.parse_expr(0)?
        };
        let span = open.span.merge(body.span);
        Ok(Expr::new(
            ExprKind::Function(FunctionLit {
                params,
                body: Box::new(body),
                captures: Vec::new(),
                tail_recursive: false,
            }),
            span,
        ))
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        let keyword = self.advance();
        if self.eat(&TokenKind::Let) {
            let pattern = self.parse_pattern()?;
            if !self.eat(&TokenKind::Assign) {
                return Err(ParseError::ExpectedLetAssign {
                    span: self.current().span,
                });
            }
            let value = self.parse_expr(0)?;
            let then = self.parse_block_expr()?;
            let alt = self.parse_else_branch()?;
            let span = keyword.span.merge(self.prev_span());
            return Ok(Expr::new(
                ExprKind::IfLet {
                    pattern,
                    value: Box::new(value),
                    then: Box::new(then),
                    alt: alt.map(Box::new),
                },
                span,
            ));
        }
        let cond = self.parse_expr(0)?;
        let then = self.parse_block_expr()?;
        let alt = self.parse_else_branch()?;
        let span = keyword.span.merge(self.prev_span());
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                alt: alt.map(Box::new),
            },
            span,
        ))
    }

    fn parse_else_branch(&mut self) -> Result<Option<Expr>, ParseError> {
        let mut i = 0;
        while matches!(self.peek_at(i), Some(TokenKind::Newline)) {
            i += 1;
        }
        if !matches!(self.peek_at(i), Some(TokenKind::Else)) {
            return Ok(None);
        }
        for _ in 0..=i {
            self.advance();
        }
        self.skip_newlines();
        if matches!(self.peek(), TokenKind::If) {
            Ok(Some(self.parse_if()?))
        } else {
            Ok(Some(self.parse_block_expr()?))
        }
    }

    fn parse_match(&mut self) -> Result<Expr, ParseError> {
        let keyword = self.advance();
        let subject = self.parse_expr(0)?;
        self.expect(&TokenKind::LBrace, "{")?;
        let mut arms = Vec::new();
        loop {
            self.skip_separators();
            while matches!(self.peek(), TokenKind::Comma) {
                self.advance();
            }
            self.skip_separators();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            let pattern = self.parse_pattern()?;
            let body = self.parse_block_expr()?;
            let span = pattern.span.merge(body.span);
            arms.push(MatchArm {
                pattern,
                body,
                span,
            });
        }
        let span = keyword.span.merge(self.prev_span());
        Ok(Expr::new(
            ExprKind::Match {
                subject: Box::new(subject),
                arms,
            },
            span,
        ))
    }

    // ── Patterns ────────────────────────────────────────────────────

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Underscore => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Wildcard,
                    span: token.span,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Ident {
                        name,
                        captured: false,
                    },
                    span: token.span,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Str(s),
                    span: token.span,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Bool(true),
                    span: token.span,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Bool(false),
                    span: token.span,
                })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Nil,
                    span: token.span,
                })
            }
            TokenKind::Decimal(d) => {
                self.advance();
                Ok(Pattern {
                    kind: PatternKind::Decimal(d),
                    span: token.span,
                })
            }
            TokenKind::Int(_) | TokenKind::Minus => self.parse_int_or_range_pattern(),
            TokenKind::LBracket => self.parse_list_pattern(),
            _ => Err(ParseError::InvalidPattern { span: token.span }),
        }
    }

    fn parse_pattern_int(&mut self) -> Result<(i64, Span), ParseError> {
        let negative = self.eat(&TokenKind::Minus);
        let token = self.current().clone();
        let TokenKind::Int(n) = token.kind else {
            return Err(ParseError::InvalidPattern { span: token.span });
        };
        self.advance();
        Ok((if negative { -n } else { n }, token.span))
    }

    fn parse_int_or_range_pattern(&mut self) -> Result<Pattern, ParseError> {
        let (start, start_span) = self.parse_pattern_int()?;
        match self.peek() {
            TokenKind::DotDotEq => {
                self.advance();
                let (end, end_span) = self.parse_pattern_int()?;
                Ok(Pattern {
                    kind: PatternKind::Range {
                        start: Some(start),
                        end: Some(end),
                        inclusive: true,
                    },
                    span: start_span.merge(end_span),
                })
            }
            TokenKind::DotDot => {
                self.advance();
                let end = if matches!(self.peek(), TokenKind::Int(_) | TokenKind::Minus) {
                    Some(self.parse_pattern_int()?)
                } else {
                    None
                };
                let span = start_span.merge(end.map(|(_, s)| s).unwrap_or(self.prev_span()));
                Ok(Pattern {
                    kind: PatternKind::Range {
                        start: Some(start),
                        end: end.map(|(n, _)| n),
                        inclusive: false,
                    },
                    span,
                })
            }
            _ => Ok(Pattern {
                kind: PatternKind::Int(start),
                span: start_span,
            }),
        }
    }

    fn parse_list_pattern(&mut self) -> Result<Pattern, ParseError> {
        let open = self.advance();
        let mut items = Vec::new();
        let mut seen_rest = false;
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            if self.eat(&TokenKind::DotDot) {
                if seen_rest {
                    return Err(ParseError::InvalidPattern {
                        span: self.prev_span(),
                    });
                }
                seen_rest = true;
                let rest_span = self.prev_span();
                let name = if let TokenKind::Ident(name) = self.peek().clone() {
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                items.push(Pattern {
                    kind: PatternKind::Rest {
                        name,
                        captured: false,
                    },
                    span: rest_span.merge(self.prev_span()),
                });
            } else {
                items.push(self.parse_pattern()?);
            }
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RBracket, "]")?;
            break;
        }
        Ok(Pattern {
            kind: PatternKind::List(items),
            span: open.span.merge(self.prev_span()),
        })
    }
}

fn is_infix_operator(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::AndAnd
            | TokenKind::OrOr
            | TokenKind::PipeForward
            | TokenKind::Compose
    )
}

fn can_start_expr(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Int(_)
            | TokenKind::Decimal(_)
            | TokenKind::Str(_)
            | TokenKind::Ident(_)
            | TokenKind::Underscore
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Nil
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::HashBrace
            | TokenKind::Pipe
            | TokenKind::If
            | TokenKind::Match
            | TokenKind::Minus
            | TokenKind::Bang
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap_err()
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.items[0] {
            Item::Statement(Stmt {
                kind: StmtKind::Expr(e),
                ..
            }) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let program = parse("1 + 2 * 3");
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &first_expr(&program).kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn pipeline_binds_tighter_than_additive() {
        let program = parse("a + b |> f");
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &first_expr(&program).kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Pipeline, .. }
        ));
    }

    #[test]
    fn compose_is_right_associative() {
        let program = parse("f >> g >> h");
        let ExprKind::Binary { op: BinOp::Compose, rhs, .. } = &first_expr(&program).kind else {
            panic!("expected composition at the root");
        };
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Compose, .. }
        ));
    }

    #[test]
    fn chained_comparison_is_rejected() {
        assert!(matches!(
            parse_err("1 < 2 < 3"),
            ParseError::ChainedComparison { .. }
        ));
    }

    #[test]
    fn statements_split_on_semicolons_and_newlines() {
        let program = parse("let x = 10; x = x + 2; x >= 12");
        assert_eq!(program.items.len(), 3);
        let program = parse("let x = 1\nx + 1");
        assert_eq!(program.items.len(), 2);
    }

    #[test]
    fn pipeline_continues_across_newlines() {
        let program = parse("input\n|> lines\n|> size");
        assert_eq!(program.items.len(), 1);
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Binary { op: BinOp::Pipeline, .. }
        ));
    }

    #[test]
    fn unbounded_range() {
        let program = parse("1..");
        let ExprKind::Range { end, inclusive, .. } = &first_expr(&program).kind else {
            panic!("expected a range");
        };
        assert!(end.is_none());
        assert!(!inclusive);
    }

    #[test]
    fn trailing_lambda_sugar() {
        let program = parse("map(xs) |x| x * 2");
        let ExprKind::Call { args, .. } = &first_expr(&program).kind else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].value.kind, ExprKind::Function(_)));
    }

    #[test]
    fn or_after_call_is_not_a_trailing_lambda() {
        let program = parse("f(x) || y");
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Binary { op: BinOp::Or, .. }
        ));
    }

    #[test]
    fn infix_backtick_call() {
        let program = parse("a `max` b");
        let ExprKind::Call { callee, args, .. } = &first_expr(&program).kind else {
            panic!("expected a call");
        };
        assert!(matches!(&callee.kind, ExprKind::Ident { name, .. } if name == "max"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn braced_function_bodies_are_blocks() {
        let program = parse("|x| { x }");
        let ExprKind::Function(f) = &first_expr(&program).kind else {
            panic!("expected function");
        };
        assert!(matches!(f.body.kind, ExprKind::Block(_)));
    }

    #[test]
    fn empty_braces_are_a_block_and_commas_make_sets() {
        let program = parse("{}");
        assert!(matches!(first_expr(&program).kind, ExprKind::Block(ref s) if s.is_empty()));
        let program = parse("{1, 2}");
        assert!(matches!(first_expr(&program).kind, ExprKind::Set(ref e) if e.len() == 2));
        let program = parse("{ let a = 1; a }");
        assert!(matches!(first_expr(&program).kind, ExprKind::Block(ref s) if s.len() == 2));
    }

    #[test]
    fn dict_shorthand_and_spread() {
        let program = parse("#{a, \"b\": 2, ..rest}");
        let ExprKind::Dict(entries) = &first_expr(&program).kind else {
            panic!("expected a dict");
        };
        assert!(matches!(entries[0], DictEntry::Shorthand { ref name, .. } if name == "a"));
        assert!(matches!(entries[1], DictEntry::Pair { .. }));
        assert!(matches!(entries[2], DictEntry::Spread(_)));
    }

    #[test]
    fn if_let_and_else_chain() {
        let program = parse("if let [x] = xs { x } else { 0 }");
        assert!(matches!(first_expr(&program).kind, ExprKind::IfLet { .. }));
        let program = parse("if a { 1 } else if b { 2 } else { 3 }");
        let ExprKind::If { alt: Some(alt), .. } = &first_expr(&program).kind else {
            panic!("expected if");
        };
        assert!(matches!(alt.kind, ExprKind::If { .. }));
    }

    #[test]
    fn match_arms_with_patterns() {
        let program = parse("match x { 1 { \"one\" } [a, ..rest] { a } _ { 0 } }");
        let ExprKind::Match { arms, .. } = &first_expr(&program).kind else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 3);
        assert!(matches!(arms[0].pattern.kind, PatternKind::Int(1)));
        assert!(matches!(arms[2].pattern.kind, PatternKind::Wildcard));
    }

    #[test]
    fn range_patterns() {
        let program = parse("match x { 1..5 { \"low\" } 5..=9 { \"high\" } 10.. { \"big\" } }");
        let ExprKind::Match { arms, .. } = &first_expr(&program).kind else {
            panic!("expected match");
        };
        assert!(matches!(
            arms[0].pattern.kind,
            PatternKind::Range { start: Some(1), end: Some(5), inclusive: false }
        ));
        assert!(matches!(
            arms[1].pattern.kind,
            PatternKind::Range { start: Some(5), end: Some(9), inclusive: true }
        ));
        assert!(matches!(
            arms[2].pattern.kind,
            PatternKind::Range { start: Some(10), end: None, inclusive: false }
        ));
    }

    #[test]
    fn double_rest_is_invalid() {
        assert!(matches!(
            parse_err("let [..a, ..b] = xs"),
            ParseError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn let_requires_assignment() {
        assert!(matches!(
            parse_err("let x 5"),
            ParseError::ExpectedLetAssign { .. }
        ));
    }

    #[test]
    fn missing_expression_reports_found_token() {
        assert!(matches!(
            parse_err("1 + *"),
            ParseError::ExpectedExpression { .. }
        ));
    }

    #[test]
    fn sections_with_expressions() {
        let program = parse("input: read(\"input.txt\")\n\npart_one: {\n  input\n}\n");
        assert_eq!(program.items.len(), 2);
        let Item::Section(section) = &program.items[0] else {
            panic!("expected section");
        };
        assert_eq!(section.name, "input");
        assert!(matches!(section.body, SectionBody::Expr(_)));
    }

    #[test]
    fn test_section_sub_blocks() {
        let source = "test: {\n  input: \"1 2 3\"\n  part_one: \"6\"\n}";
        let program = parse(source);
        let Item::Section(section) = &program.items[0] else {
            panic!("expected section");
        };
        let SectionBody::TestBlocks(blocks) = &section.body else {
            panic!("expected test blocks");
        };
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "input");
        assert_eq!(blocks[0].value, "1 2 3");
    }

    #[test]
    fn call_spread_arguments() {
        let program = parse("f(..xs, 1)");
        let ExprKind::Call { args, .. } = &first_expr(&program).kind else {
            panic!("expected call");
        };
        assert!(args[0].spread);
        assert!(!args[1].spread);
    }

    #[test]
    fn assignment_is_right_associative_and_targets_identifiers() {
        let program = parse("x = y = 1");
        let ExprKind::Assign { value, .. } = &first_expr(&program).kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
        assert!(matches!(
            parse_err("1 = 2"),
            ParseError::ExpectedIdentifier { .. }
        ));
    }
}
