//! Syntax-level rewrites that run between parsing and resolution.
//!
//! 1. Placeholder lifting: the smallest expression enclosing `_` that is not
//!    itself an operand becomes a lambda over fresh `$0, $1, …` parameters.
//!    Placeholders climb only through unary, binary, and index operand
//!    positions; every other position is a lift boundary.
//! 2. Pattern parameters: `|[a, b]| body` becomes `|$arg0| { let [a, b] =
//!    $arg0; body }`.

use crate::ast::*;
use santa_core::span::Span;

pub fn desugar(program: Program) -> Program {
    let program = lift_placeholders(program);
    lower_pattern_params(program)
}

// ── Pass 1: placeholder lifting ─────────────────────────────────────

fn lift_placeholders(program: Program) -> Program {
    Program {
        items: program.items.into_iter().map(lift_item).collect(),
        span: program.span,
    }
}

fn lift_item(item: Item) -> Item {
    match item {
        Item::Section(section) => Item::Section(Section {
            name: section.name,
            body: match section.body {
                SectionBody::Expr(e) => SectionBody::Expr(lift_boundary(e)),
                blocks @ SectionBody::TestBlocks(_) => blocks,
            },
            span: section.span,
        }),
        Item::Statement(stmt) => Item::Statement(lift_stmt(stmt)),
    }
}

fn lift_stmt(stmt: Stmt) -> Stmt {
    let kind = match stmt.kind {
        StmtKind::Expr(e) => StmtKind::Expr(lift_boundary(e)),
        StmtKind::Let {
            mutable,
            pattern,
            value,
        } => StmtKind::Let {
            mutable,
            pattern,
            value: lift_boundary(value),
        },
        StmtKind::Return(value) => StmtKind::Return(value.map(lift_boundary)),
        StmtKind::Break(value) => StmtKind::Break(value.map(lift_boundary)),
    };
    Stmt {
        kind,
        span: stmt.span,
    }
}

/// Lift at a boundary: collect placeholders in the operand spine and wrap
/// the expression into a lambda when any were found.
fn lift_boundary(expr: Expr) -> Expr {
    let mut params: Vec<String> = Vec::new();
    let expr = lift_operand(expr, &mut params);
    if params.is_empty() {
        return expr;
    }
    let span = expr.span;
    Expr::new(
        ExprKind::Function(FunctionLit {
            params: params
                .into_iter()
                .map(|name| Param::Named {
                    name,
                    captured: false,
                })
                .collect(),
            body: Box::new(expr),
            captures: Vec::new(),
            tail_recursive: false,
        }),
        span,
    )
}

fn lift_operand(expr: Expr, params: &mut Vec<String>) -> Expr {
    let span = expr.span;
    match expr.kind {
        ExprKind::Placeholder => {
            let name = format!("${}", params.len());
            params.push(name.clone());
            Expr::new(
                ExprKind::Ident {
                    name,
                    binding: None,
                },
                span,
            )
        }
        ExprKind::Unary { op, operand } => Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(lift_operand(*operand, params)),
            },
            span,
        ),
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = lift_operand(*lhs, params);
            let rhs = lift_operand(*rhs, params);
            Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            )
        }
        ExprKind::Index { target, index } => {
            let target = lift_operand(*target, params);
            let index = lift_operand(*index, params);
            Expr::new(
                ExprKind::Index {
                    target: Box::new(target),
                    index: Box::new(index),
                },
                span,
            )
        }
        other => Expr::new(lift_kind(other), span),
    }
}

/// Non-operand positions: every child expression is its own boundary.
fn lift_kind(kind: ExprKind) -> ExprKind {
    match kind {
        ExprKind::List(elements) => ExprKind::List(lift_elements(elements)),
        ExprKind::Set(elements) => ExprKind::Set(lift_elements(elements)),
        ExprKind::Dict(entries) => ExprKind::Dict(
            entries
                .into_iter()
                .map(|entry| match entry {
                    DictEntry::Pair { key, value } => DictEntry::Pair {
                        key: lift_boundary(key),
                        value: lift_boundary(value),
                    },
                    shorthand @ DictEntry::Shorthand { .. } => shorthand,
                    DictEntry::Spread(e) => DictEntry::Spread(lift_boundary(e)),
                })
                .collect(),
        ),
        ExprKind::Assign {
            name,
            binding,
            value,
        } => ExprKind::Assign {
            name,
            binding,
            value: Box::new(lift_boundary(*value)),
        },
        ExprKind::Range {
            start,
            end,
            inclusive,
        } => ExprKind::Range {
            start: Box::new(lift_boundary(*start)),
            end: end.map(|e| Box::new(lift_boundary(*e))),
            inclusive,
        },
        ExprKind::Call { callee, args, tail } => ExprKind::Call {
            callee: Box::new(lift_boundary(*callee)),
            args: lift_elements(args),
            tail,
        },
        ExprKind::Function(f) => ExprKind::Function(FunctionLit {
            params: f.params,
            // A nested lambda shields its own placeholders.
            body: Box::new(lift_boundary(*f.body)),
            captures: f.captures,
            tail_recursive: f.tail_recursive,
        }),
        ExprKind::Block(stmts) => ExprKind::Block(stmts.into_iter().map(lift_stmt).collect()),
        ExprKind::If { cond, then, alt } => ExprKind::If {
            cond: Box::new(lift_boundary(*cond)),
            then: Box::new(lift_boundary(*then)),
            alt: alt.map(|e| Box::new(lift_boundary(*e))),
        },
        ExprKind::IfLet {
            pattern,
            value,
            then,
            alt,
        } => ExprKind::IfLet {
            pattern,
            value: Box::new(lift_boundary(*value)),
            then: Box::new(lift_boundary(*then)),
            alt: alt.map(|e| Box::new(lift_boundary(*e))),
        },
        ExprKind::Match { subject, arms } => ExprKind::Match {
            subject: Box::new(lift_boundary(*subject)),
            arms: arms
                .into_iter()
                .map(|arm| MatchArm {
                    pattern: arm.pattern,
                    body: lift_boundary(arm.body),
                    span: arm.span,
                })
                .collect(),
        },
        leaf => leaf,
    }
}

fn lift_elements(elements: Vec<Element>) -> Vec<Element> {
    elements
        .into_iter()
        .map(|e| Element {
            spread: e.spread,
            value: lift_boundary(e.value),
        })
        .collect()
}

// ── Pass 2: pattern parameters ──────────────────────────────────────

fn lower_pattern_params(program: Program) -> Program {
    Program {
        items: program.items.into_iter().map(lower_item).collect(),
        span: program.span,
    }
}

fn lower_item(item: Item) -> Item {
    match item {
        Item::Section(section) => Item::Section(Section {
            name: section.name,
            body: match section.body {
                SectionBody::Expr(e) => SectionBody::Expr(lower_expr(e)),
                blocks @ SectionBody::TestBlocks(_) => blocks,
            },
            span: section.span,
        }),
        Item::Statement(stmt) => Item::Statement(lower_stmt(stmt)),
    }
}

fn lower_stmt(stmt: Stmt) -> Stmt {
    let kind = match stmt.kind {
        StmtKind::Expr(e) => StmtKind::Expr(lower_expr(e)),
        StmtKind::Let {
            mutable,
            pattern,
            value,
        } => StmtKind::Let {
            mutable,
            pattern,
            value: lower_expr(value),
        },
        StmtKind::Return(value) => StmtKind::Return(value.map(lower_expr)),
        StmtKind::Break(value) => StmtKind::Break(value.map(lower_expr)),
    };
    Stmt {
        kind,
        span: stmt.span,
    }
}

fn lower_expr(expr: Expr) -> Expr {
    let span = expr.span;
    let kind = match expr.kind {
        ExprKind::Function(f) => ExprKind::Function(lower_function(f, span)),
        ExprKind::List(elements) => ExprKind::List(lower_elements(elements)),
        ExprKind::Set(elements) => ExprKind::Set(lower_elements(elements)),
        ExprKind::Dict(entries) => ExprKind::Dict(
            entries
                .into_iter()
                .map(|entry| match entry {
                    DictEntry::Pair { key, value } => DictEntry::Pair {
                        key: lower_expr(key),
                        value: lower_expr(value),
                    },
                    // `#{a}` ≡ `#{"a": a}`
                    DictEntry::Shorthand { name, span } => DictEntry::Pair {
                        key: Expr::new(ExprKind::Str(name.clone()), span),
                        value: Expr::new(
                            ExprKind::Ident {
                                name,
                                binding: None,
                            },
                            span,
                        ),
                    },
                    DictEntry::Spread(e) => DictEntry::Spread(lower_expr(e)),
                })
                .collect(),
        ),
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: Box::new(lower_expr(*operand)),
        },
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: Box::new(lower_expr(*lhs)),
            rhs: Box::new(lower_expr(*rhs)),
        },
        ExprKind::Assign {
            name,
            binding,
            value,
        } => ExprKind::Assign {
            name,
            binding,
            value: Box::new(lower_expr(*value)),
        },
        ExprKind::Range {
            start,
            end,
            inclusive,
        } => ExprKind::Range {
            start: Box::new(lower_expr(*start)),
            end: end.map(|e| Box::new(lower_expr(*e))),
            inclusive,
        },
        ExprKind::Call { callee, args, tail } => ExprKind::Call {
            callee: Box::new(lower_expr(*callee)),
            args: lower_elements(args),
            tail,
        },
        ExprKind::Index { target, index } => ExprKind::Index {
            target: Box::new(lower_expr(*target)),
            index: Box::new(lower_expr(*index)),
        },
        ExprKind::Block(stmts) => ExprKind::Block(stmts.into_iter().map(lower_stmt).collect()),
        ExprKind::If { cond, then, alt } => ExprKind::If {
            cond: Box::new(lower_expr(*cond)),
            then: Box::new(lower_expr(*then)),
            alt: alt.map(|e| Box::new(lower_expr(*e))),
        },
        ExprKind::IfLet {
            pattern,
            value,
            then,
            alt,
        } => ExprKind::IfLet {
            pattern,
            value: Box::new(lower_expr(*value)),
            then: Box::new(lower_expr(*then)),
            alt: alt.map(|e| Box::new(lower_expr(*e))),
        },
        ExprKind::Match { subject, arms } => ExprKind::Match {
            subject: Box::new(lower_expr(*subject)),
            arms: arms
                .into_iter()
                .map(|arm| MatchArm {
                    pattern: arm.pattern,
                    body: lower_expr(arm.body),
                    span: arm.span,
                })
                .collect(),
        },
        leaf => leaf,
    };
    Expr::new(kind, span)
}

fn lower_elements(elements: Vec<Element>) -> Vec<Element> {
    elements
        .into_iter()
        .map(|e| Element {
            spread: e.spread,
            value: lower_expr(e.value),
        })
        .collect()
}

fn lower_function(f: FunctionLit, span: Span) -> FunctionLit {
    let mut params = Vec::with_capacity(f.params.len());
    let mut prelude: Vec<Stmt> = Vec::new();
    for (i, param) in f.params.into_iter().enumerate() {
        match param {
            named @ Param::Named { .. } => params.push(named),
            Param::Pattern(pattern) => {
                let name = format!("$arg{i}");
                let pattern_span = pattern.span;
                // A bare wildcard just discards the argument.
                if !matches!(pattern.kind, PatternKind::Wildcard) {
                    prelude.push(Stmt {
                        kind: StmtKind::Let {
                            mutable: false,
                            pattern,
                            value: Expr::new(
                                ExprKind::Ident {
                                    name: name.clone(),
                                    binding: None,
                                },
                                pattern_span,
                            ),
                        },
                        span: pattern_span,
                    });
                }
                params.push(Param::Named {
                    name,
                    captured: false,
                });
            }
        }
    }
    let body = lower_expr(*f.body);
    let body = if prelude.is_empty() {
        body
    } else {
        let body_span = body.span;
        let mut stmts = prelude;
        match body.kind {
            ExprKind::Block(inner) => stmts.extend(inner),
            _ => stmts.push(Stmt {
                kind: StmtKind::Expr(body),
                span: body_span,
            }),
        }
        Expr::new(ExprKind::Block(stmts), span)
    };
    FunctionLit {
        params,
        body: Box::new(body),
        captures: f.captures,
        tail_recursive: f.tail_recursive,
    }
}
