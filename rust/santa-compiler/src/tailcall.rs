//! Self-tail-call analysis.
//!
//! For every `let name = |…| …`, find the calls to `name` inside the body
//! (not descending into nested function literals, which form their own tail
//! context). When at least one self-call exists and every one of them sits
//! in tail position, the function is tagged for loop dispatch and each such
//! call site is marked; the emitter then rebinds parameters and jumps to
//! the entry instead of growing the call stack.
//!
//! Tail positions: the body itself, the last statement-expression of a
//! block, both branches of an `if` in tail position, and every arm body of
//! a `match` in tail position. Operands, call arguments, indexes, `return`
//! values, and assignments are not tail.

use crate::ast::*;

pub fn mark_tail_calls(program: &mut Program) {
    for item in &mut program.items {
        match item {
            Item::Statement(stmt) => mark_stmt(stmt),
            Item::Section(section) => {
                if let SectionBody::Expr(e) = &mut section.body {
                    mark_expr(e);
                }
            }
        }
    }
}

/// Recurse looking for named function bindings to analyze.
fn mark_stmt(stmt: &mut Stmt) {
    if let StmtKind::Let {
        mutable: false,
        pattern,
        value,
    } = &mut stmt.kind
    {
        if let PatternKind::Ident { name, .. } = &pattern.kind {
            if let ExprKind::Function(_) = &value.kind {
                let name = name.clone();
                let ExprKind::Function(f) = &mut value.kind else {
                    unreachable!();
                };
                analyze_function(&name, f);
            }
        }
    }
    match &mut stmt.kind {
        StmtKind::Expr(e) | StmtKind::Let { value: e, .. } => mark_expr(e),
        StmtKind::Return(Some(e)) | StmtKind::Break(Some(e)) => mark_expr(e),
        StmtKind::Return(None) | StmtKind::Break(None) => {}
    }
}

fn mark_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Function(f) => mark_expr(&mut f.body),
        ExprKind::Block(stmts) => stmts.iter_mut().for_each(mark_stmt),
        ExprKind::List(elements) | ExprKind::Set(elements) => {
            elements.iter_mut().for_each(|e| mark_expr(&mut e.value));
        }
        ExprKind::Dict(entries) => {
            for entry in entries {
                match entry {
                    DictEntry::Pair { key, value } => {
                        mark_expr(key);
                        mark_expr(value);
                    }
                    DictEntry::Shorthand { .. } => {}
                    DictEntry::Spread(e) => mark_expr(e),
                }
            }
        }
        ExprKind::Unary { operand, .. } => mark_expr(operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            mark_expr(lhs);
            mark_expr(rhs);
        }
        ExprKind::Assign { value, .. } => mark_expr(value),
        ExprKind::Range { start, end, .. } => {
            mark_expr(start);
            if let Some(end) = end {
                mark_expr(end);
            }
        }
        ExprKind::Call { callee, args, .. } => {
            mark_expr(callee);
            args.iter_mut().for_each(|a| mark_expr(&mut a.value));
        }
        ExprKind::Index { target, index } => {
            mark_expr(target);
            mark_expr(index);
        }
        ExprKind::If { cond, then, alt } => {
            mark_expr(cond);
            mark_expr(then);
            if let Some(alt) = alt {
                mark_expr(alt);
            }
        }
        ExprKind::IfLet {
            value, then, alt, ..
        } => {
            mark_expr(value);
            mark_expr(then);
            if let Some(alt) = alt {
                mark_expr(alt);
            }
        }
        ExprKind::Match { subject, arms } => {
            mark_expr(subject);
            arms.iter_mut().for_each(|arm| mark_expr(&mut arm.body));
        }
        _ => {}
    }
}

#[derive(Default)]
struct Stats {
    total: usize,
    non_tail: usize,
}

fn analyze_function(name: &str, f: &mut FunctionLit) {
    // A parameter of the same name shadows the binding throughout.
    let shadowed_by_param = f.params.iter().any(
        |p| matches!(p, Param::Named { name: param, .. } if param == name),
    );
    if shadowed_by_param {
        return;
    }
    let mut stats = Stats::default();
    visit(&mut f.body, name, true, &mut stats);
    if stats.total > 0 && stats.non_tail == 0 {
        f.tail_recursive = true;
    } else {
        clear_marks(&mut f.body, name);
    }
}

/// Tentatively mark self-calls in tail position and count the rest.
/// Returns whether `name` became shadowed for the remainder of the scope.
fn visit(expr: &mut Expr, name: &str, tail: bool, stats: &mut Stats) {
    match &mut expr.kind {
        ExprKind::Call { callee, args, tail: call_tail } => {
            let is_self_call = matches!(
                &callee.kind,
                ExprKind::Ident { name: callee_name, .. } if callee_name == name
            );
            if is_self_call {
                stats.total += 1;
                if tail {
                    *call_tail = true;
                } else {
                    stats.non_tail += 1;
                }
            } else {
                visit(callee, name, false, stats);
            }
            args.iter_mut()
                .for_each(|a| visit(&mut a.value, name, false, stats));
        }
        ExprKind::Block(stmts) => {
            let last = stmts.len().saturating_sub(1);
            for (i, stmt) in stmts.iter_mut().enumerate() {
                let stmt_tail = tail && i == last;
                match &mut stmt.kind {
                    StmtKind::Expr(e) => visit(e, name, stmt_tail, stats),
                    StmtKind::Let { pattern, value, .. } => {
                        visit(value, name, false, stats);
                        if pattern.bound_names().contains(&name) {
                            // Shadowed; later references are a new binding.
                            return;
                        }
                    }
                    StmtKind::Return(Some(e)) | StmtKind::Break(Some(e)) => {
                        visit(e, name, false, stats)
                    }
                    StmtKind::Return(None) | StmtKind::Break(None) => {}
                }
            }
        }
        ExprKind::If { cond, then, alt } => {
            visit(cond, name, false, stats);
            visit(then, name, tail, stats);
            if let Some(alt) = alt {
                visit(alt, name, tail, stats);
            }
        }
        ExprKind::IfLet {
            pattern,
            value,
            then,
            alt,
        } => {
            visit(value, name, false, stats);
            if !pattern.bound_names().contains(&name) {
                visit(then, name, tail, stats);
            }
            if let Some(alt) = alt {
                visit(alt, name, tail, stats);
            }
        }
        ExprKind::Match { subject, arms } => {
            visit(subject, name, false, stats);
            for arm in arms {
                if !arm.pattern.bound_names().contains(&name) {
                    visit(&mut arm.body, name, tail, stats);
                }
            }
        }
        ExprKind::Unary { operand, .. } => visit(operand, name, false, stats),
        ExprKind::Binary { lhs, rhs, .. } => {
            visit(lhs, name, false, stats);
            visit(rhs, name, false, stats);
        }
        ExprKind::Assign { value, .. } => visit(value, name, false, stats),
        ExprKind::Range { start, end, .. } => {
            visit(start, name, false, stats);
            if let Some(end) = end {
                visit(end, name, false, stats);
            }
        }
        ExprKind::Index { target, index } => {
            visit(target, name, false, stats);
            visit(index, name, false, stats);
        }
        ExprKind::List(elements) | ExprKind::Set(elements) => {
            elements
                .iter_mut()
                .for_each(|e| visit(&mut e.value, name, false, stats));
        }
        ExprKind::Dict(entries) => {
            for entry in entries {
                match entry {
                    DictEntry::Pair { key, value } => {
                        visit(key, name, false, stats);
                        visit(value, name, false, stats);
                    }
                    DictEntry::Shorthand { .. } => {}
                    DictEntry::Spread(e) => visit(e, name, false, stats),
                }
            }
        }
        // Nested function literals own their tail context.
        ExprKind::Function(_) => {}
        _ => {}
    }
}

fn clear_marks(expr: &mut Expr, name: &str) {
    unmark(expr, name);
}

fn unmark(expr: &mut Expr, name: &str) {
    if let ExprKind::Call { callee, tail, .. } = &mut expr.kind {
        if matches!(&callee.kind, ExprKind::Ident { name: n, .. } if n == name) {
            *tail = false;
        }
    }
    unmark_children(expr, name);
}

fn unmark_children(expr: &mut Expr, name: &str) {
    match &mut expr.kind {
        ExprKind::Call { callee, args, .. } => {
            unmark(callee, name);
            args.iter_mut().for_each(|a| unmark(&mut a.value, name));
        }
        ExprKind::Block(stmts) => {
            for stmt in stmts {
                match &mut stmt.kind {
                    StmtKind::Expr(e) | StmtKind::Let { value: e, .. } => unmark(e, name),
                    StmtKind::Return(Some(e)) | StmtKind::Break(Some(e)) => unmark(e, name),
                    _ => {}
                }
            }
        }
        ExprKind::If { cond, then, alt } => {
            unmark(cond, name);
            unmark(then, name);
            if let Some(alt) = alt {
                unmark(alt, name);
            }
        }
        ExprKind::IfLet {
            value, then, alt, ..
        } => {
            unmark(value, name);
            unmark(then, name);
            if let Some(alt) = alt {
                unmark(alt, name);
            }
        }
        ExprKind::Match { subject, arms } => {
            unmark(subject, name);
            arms.iter_mut().for_each(|arm| unmark(&mut arm.body, name));
        }
        ExprKind::Unary { operand, .. } => unmark(operand, name),
        ExprKind::Binary { lhs, rhs, .. } => {
            unmark(lhs, name);
            unmark(rhs, name);
        }
        ExprKind::Assign { value, .. } => unmark(value, name),
        ExprKind::Range { start, end, .. } => {
            unmark(start, name);
            if let Some(end) = end {
                unmark(end, name);
            }
        }
        ExprKind::Index { target, index } => {
            unmark(target, name);
            unmark(index, name);
        }
        ExprKind::List(elements) | ExprKind::Set(elements) => {
            elements.iter_mut().for_each(|e| unmark(&mut e.value, name));
        }
        ExprKind::Dict(entries) => {
            for entry in entries {
                match entry {
                    DictEntry::Pair { key, value } => {
                        unmark(key, name);
                        unmark(value, name);
                    }
                    DictEntry::Shorthand { .. } => {}
                    DictEntry::Spread(e) => unmark(e, name),
                }
            }
        }
        ExprKind::Function(_) => {}
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desugar::desugar;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn analyzed(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut program = desugar(program);
        mark_tail_calls(&mut program);
        program
    }

    fn let_function(program: &Program) -> &FunctionLit {
        let Item::Statement(Stmt {
            kind: StmtKind::Let { value, .. },
            ..
        }) = &program.items[0]
        else {
            panic!("expected let");
        };
        let ExprKind::Function(f) = &value.kind else {
            panic!("expected function value");
        };
        f
    }

    #[test]
    fn counting_loop_is_tail_recursive() {
        let program = analyzed("let loop = |n, acc| if n == 0 { acc } else { loop(n - 1, acc + n) }");
        assert!(let_function(&program).tail_recursive);
    }

    #[test]
    fn operand_position_self_call_is_not_tail() {
        let program = analyzed("let fact = |n| if n == 0 { 1 } else { n * fact(n - 1) }");
        let f = let_function(&program);
        assert!(!f.tail_recursive);
        // The call mark must have been cleared again.
        let json = serde_json::to_string(&f.body).unwrap();
        assert!(!json.contains("\"tail\":true"));
    }

    #[test]
    fn match_arms_are_tail_positions() {
        let program =
            analyzed("let walk = |xs| match xs { [] { nil } [x, ..rest] { walk(rest) } }");
        assert!(let_function(&program).tail_recursive);
    }

    #[test]
    fn last_block_statement_is_tail() {
        let program = analyzed("let go = |n| { puts(n); go(n - 1) }");
        assert!(let_function(&program).tail_recursive);
    }

    #[test]
    fn return_value_is_not_a_tail_position() {
        let program = analyzed("let go = |n| { return go(n - 1) }");
        assert!(!let_function(&program).tail_recursive);
    }

    #[test]
    fn functions_without_self_calls_are_untagged() {
        let program = analyzed("let double = |n| n * 2");
        assert!(!let_function(&program).tail_recursive);
    }

    #[test]
    fn nested_functions_form_their_own_context() {
        let program = analyzed("let f = |n| { let g = || f(n); g() }");
        // The self-call happens inside g, not in f's tail context.
        assert!(!let_function(&program).tail_recursive);
    }
}
