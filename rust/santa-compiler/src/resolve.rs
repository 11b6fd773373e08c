//! Name resolution.
//!
//! Walks the desugared tree with a scope stack, annotating every identifier
//! with its binding origin, collecting each function literal's captures in
//! declaration order, and marking captured binding sites so the emitter can
//! box them as shared cells.

use crate::ast::*;
use santa_core::builtins::BuiltinId;
use santa_core::span::Span;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("Undefined identifier {name}")]
    UndefinedIdentifier { name: String, span: Span },
    #[error("Cannot shadow built-in {name}")]
    ShadowBuiltin { name: String, span: Span },
    #[error("Cannot assign to immutable variable")]
    AssignImmutable { name: String, span: Span },
    #[error("Duplicate section {name}")]
    DuplicateSection { name: String, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::UndefinedIdentifier { span, .. }
            | ResolveError::ShadowBuiltin { span, .. }
            | ResolveError::AssignImmutable { span, .. }
            | ResolveError::DuplicateSection { span, .. } => *span,
        }
    }
}

#[derive(Debug)]
struct Info {
    mutable: bool,
    captured: bool,
    global: bool,
    /// Declaration order, used to sort capture lists.
    seq: usize,
}

#[derive(Debug, Default)]
struct FnScope {
    blocks: Vec<HashMap<String, Info>>,
    /// Captured names with the declaring binding's sequence number.
    captures: Vec<(String, usize)>,
}

pub fn resolve(program: &mut Program) -> Result<(), ResolveError> {
    let mut resolver = Resolver::default();
    resolver.run(program)
}

#[derive(Default)]
struct Resolver {
    fns: Vec<FnScope>,
    next_seq: usize,
}

impl Resolver {
    fn run(&mut self, program: &mut Program) -> Result<(), ResolveError> {
        self.push_fn();

        // A declared input section binds `input` for the part bodies.
        let has_input_section = program
            .items
            .iter()
            .any(|item| matches!(item, Item::Section(s) if s.name == "input"));
        if has_input_section {
            self.declare("input", false, true);
        }

        let mut sections_seen: HashSet<String> = HashSet::new();
        for item in &mut program.items {
            match item {
                Item::Statement(stmt) => self.resolve_stmt(stmt)?,
                Item::Section(section) => {
                    if !sections_seen.insert(section.name.clone()) {
                        return Err(ResolveError::DuplicateSection {
                            name: section.name.clone(),
                            span: section.span,
                        });
                    }
                    if let SectionBody::Expr(body) = &mut section.body {
                        // Each section compiles to its own thunk.
                        self.push_fn();
                        self.resolve_expr(body)?;
                        self.pop_fn();
                    }
                }
            }
        }
        self.pop_fn();
        Ok(())
    }

    // ── Scope bookkeeping ───────────────────────────────────────────

    fn push_fn(&mut self) {
        self.fns.push(FnScope {
            blocks: vec![HashMap::new()],
            captures: Vec::new(),
        });
    }

    fn pop_fn(&mut self) -> FnScope {
        self.fns.pop().expect("function scope stack underflow")
    }

    fn push_block(&mut self) {
        self.fns
            .last_mut()
            .expect("no active function scope")
            .blocks
            .push(HashMap::new());
    }

    fn pop_block(&mut self) -> HashMap<String, Info> {
        self.fns
            .last_mut()
            .expect("no active function scope")
            .blocks
            .pop()
            .expect("block scope stack underflow")
    }

    fn at_top_level(&self) -> bool {
        self.fns.len() == 1 && self.fns[0].blocks.len() == 1
    }

    fn declare(&mut self, name: &str, mutable: bool, global: bool) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.fns
            .last_mut()
            .expect("no active function scope")
            .blocks
            .last_mut()
            .expect("no active block scope")
            .insert(
                name.to_string(),
                Info {
                    mutable,
                    captured: false,
                    global,
                    seq,
                },
            );
    }

    /// Locate `name`, registering captures along the way. Returns the
    /// binding kind plus its mutability.
    fn lookup(&mut self, name: &str) -> Option<(Binding, bool)> {
        let current = self.fns.len() - 1;
        let mut found: Option<(usize, usize)> = None;
        'search: for fi in (0..=current).rev() {
            for bi in (0..self.fns[fi].blocks.len()).rev() {
                if self.fns[fi].blocks[bi].contains_key(name) {
                    found = Some((fi, bi));
                    break 'search;
                }
            }
        }
        let (fi, bi) = found?;
        let info = self.fns[fi].blocks[bi].get_mut(name).expect("just located");
        let mutable = info.mutable;
        if info.global {
            return Some((Binding::Global, mutable));
        }
        if fi == current {
            return Some((Binding::Local, mutable));
        }
        info.captured = true;
        let seq = info.seq;
        for f in fi + 1..=current {
            if !self.fns[f].captures.iter().any(|(n, _)| n == name) {
                self.fns[f].captures.push((name.to_string(), seq));
            }
        }
        Some((Binding::Captured, mutable))
    }

    // ── Statements ──────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<(), ResolveError> {
        match &mut stmt.kind {
            StmtKind::Expr(e) => self.resolve_expr(e),
            StmtKind::Let {
                mutable,
                pattern,
                value,
            } => {
                let top_level = self.at_top_level();
                if top_level {
                    for name in pattern.bound_names() {
                        if BuiltinId::lookup(name).is_some() {
                            return Err(ResolveError::ShadowBuiltin {
                                name: name.to_string(),
                                span: pattern.span,
                            });
                        }
                    }
                }
                let mutable = *mutable;
                if let Some(name) = recursive_let_name(pattern, value) {
                    let name = name.to_string();
                    self.declare(&name, mutable, top_level);
                    self.resolve_expr(value)?;
                } else {
                    self.resolve_expr(value)?;
                    for name in pattern.bound_names() {
                        self.declare(name, mutable, top_level);
                    }
                }
                Ok(())
            }
            StmtKind::Return(value) | StmtKind::Break(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
        }
    }

    /// Copy capture flags from a popped block back onto the `let` patterns
    /// that declared the bindings.
    fn mark_captured_lets(block: &HashMap<String, Info>, stmts: &mut [Stmt]) {
        for stmt in stmts {
            if let StmtKind::Let { pattern, .. } = &mut stmt.kind {
                mark_captured_pattern(block, pattern);
            }
        }
    }

    fn resolve_block(&mut self, stmts: &mut [Stmt]) -> Result<(), ResolveError> {
        self.push_block();
        let result = stmts.iter_mut().try_for_each(|stmt| self.resolve_stmt(stmt));
        let block = self.pop_block();
        result?;
        Self::mark_captured_lets(&block, stmts);
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &mut Expr) -> Result<(), ResolveError> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_)
            | ExprKind::Decimal(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Nil => Ok(()),
            ExprKind::Placeholder => Err(ResolveError::UndefinedIdentifier {
                name: "_".to_string(),
                span,
            }),
            ExprKind::Ident { name, binding } => {
                let resolved = self
                    .lookup(name)
                    .map(|(binding, _)| binding)
                    .or_else(|| BuiltinId::lookup(name).map(Binding::Builtin))
                    .ok_or_else(|| ResolveError::UndefinedIdentifier {
                        name: name.clone(),
                        span,
                    })?;
                *binding = Some(resolved);
                Ok(())
            }
            ExprKind::Assign {
                name,
                binding,
                value,
            } => {
                self.resolve_expr(value)?;
                let Some((resolved, mutable)) = self.lookup(name) else {
                    return Err(ResolveError::UndefinedIdentifier {
                        name: name.clone(),
                        span,
                    });
                };
                if !mutable {
                    return Err(ResolveError::AssignImmutable {
                        name: name.clone(),
                        span,
                    });
                }
                *binding = Some(resolved);
                Ok(())
            }
            ExprKind::List(elements) | ExprKind::Set(elements) => elements
                .iter_mut()
                .try_for_each(|e| self.resolve_expr(&mut e.value)),
            ExprKind::Dict(entries) => {
                for entry in entries {
                    match entry {
                        DictEntry::Pair { key, value } => {
                            self.resolve_expr(key)?;
                            self.resolve_expr(value)?;
                        }
                        DictEntry::Shorthand { .. } => {
                            unreachable!("dict shorthand survives desugaring")
                        }
                        DictEntry::Spread(e) => self.resolve_expr(e)?,
                    }
                }
                Ok(())
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
            ExprKind::Range { start, end, .. } => {
                self.resolve_expr(start)?;
                if let Some(end) = end {
                    self.resolve_expr(end)?;
                }
                Ok(())
            }
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                args.iter_mut()
                    .try_for_each(|a| self.resolve_expr(&mut a.value))
            }
            ExprKind::Index { target, index } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)
            }
            ExprKind::Function(f) => self.resolve_function(f),
            ExprKind::Block(stmts) => self.resolve_block(stmts),
            ExprKind::If { cond, then, alt } => {
                self.resolve_expr(cond)?;
                self.resolve_expr(then)?;
                if let Some(alt) = alt {
                    self.resolve_expr(alt)?;
                }
                Ok(())
            }
            ExprKind::IfLet {
                pattern,
                value,
                then,
                alt,
            } => {
                self.resolve_expr(value)?;
                self.push_block();
                for name in pattern.bound_names() {
                    self.declare(name, false, false);
                }
                let result = self.resolve_expr(then);
                let block = self.pop_block();
                result?;
                mark_captured_pattern(&block, pattern);
                if let Some(alt) = alt {
                    self.resolve_expr(alt)?;
                }
                Ok(())
            }
            ExprKind::Match { subject, arms } => {
                self.resolve_expr(subject)?;
                for arm in arms {
                    self.push_block();
                    for name in arm.pattern.bound_names() {
                        self.declare(name, false, false);
                    }
                    let result = self.resolve_expr(&mut arm.body);
                    let block = self.pop_block();
                    result?;
                    mark_captured_pattern(&block, &mut arm.pattern);
                }
                Ok(())
            }
        }
    }

    fn resolve_function(&mut self, f: &mut FunctionLit) -> Result<(), ResolveError> {
        self.push_fn();
        for param in &f.params {
            match param {
                Param::Named { name, .. } => self.declare(name, false, false),
                Param::Pattern(_) => unreachable!("pattern params survive desugaring"),
            }
        }
        let result = self.resolve_expr(&mut f.body);
        let scope = self.pop_fn();
        result?;

        let mut captures = scope.captures;
        captures.sort_by_key(|(_, seq)| *seq);
        f.captures = captures.into_iter().map(|(name, _)| name).collect();

        let params_block = &scope.blocks[0];
        for param in &mut f.params {
            if let Param::Named { name, captured } = param {
                if let Some(info) = params_block.get(name) {
                    *captured = info.captured;
                }
            }
        }
        Ok(())
    }
}

fn mark_captured_pattern(block: &HashMap<String, Info>, pattern: &mut Pattern) {
    match &mut pattern.kind {
        PatternKind::Ident { name, captured } => {
            if let Some(info) = block.get(name) {
                *captured = info.captured;
            }
        }
        PatternKind::Rest {
            name: Some(name),
            captured,
        } => {
            if let Some(info) = block.get(name) {
                *captured = info.captured;
            }
        }
        PatternKind::List(items) => {
            for item in items {
                mark_captured_pattern(block, item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desugar::desugar;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolved(source: &str) -> Result<Program, ResolveError> {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut program = desugar(program);
        resolve(&mut program)?;
        Ok(program)
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
    fn undefined_identifier_is_reported() {
        let err = resolved("missing + 1").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UndefinedIdentifier { ref name, .. } if name == "missing"
        ));
    }

    #[test]
    fn builtins_resolve_by_name() {
        let program = resolved("size").unwrap();
        let ExprKind::Ident { binding, .. } = &first_expr(&program).kind else {
            panic!("expected identifier");
        };
        assert_eq!(*binding, Some(Binding::Builtin(BuiltinId::Size)));
    }

    #[test]
    fn top_level_bindings_are_global() {
        let program = resolved("let x = 1\nx").unwrap();
        let Item::Statement(Stmt {
            kind: StmtKind::Expr(e),
            ..
        }) = &program.items[1]
        else {
            panic!("expected expression");
        };
        assert!(matches!(
            e.kind,
            ExprKind::Ident {
                binding: Some(Binding::Global),
                ..
            }
        ));
    }

    #[test]
    fn cannot_shadow_builtin_at_top_level() {
        let err = resolved("let size = 1").unwrap_err();
        assert!(matches!(err, ResolveError::ShadowBuiltin { ref name, .. } if name == "size"));
        // Locals may shadow built-ins.
        assert!(resolved("let f = |size| size + 1").is_ok());
    }

    #[test]
    fn assignment_requires_mut() {
        assert!(matches!(
            resolved("let x = 1; x = 2").unwrap_err(),
            ResolveError::AssignImmutable { .. }
        ));
        assert!(resolved("let mut x = 1; x = 2").is_ok());
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let err = resolved("part_one: 1\npart_one: 2").unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateSection { ref name, .. } if name == "part_one"));
    }

    #[test]
    fn captures_are_collected_in_declaration_order() {
        let program = resolved("let f = |a, b| { let g = || b + a; g() }").unwrap();
        let Item::Statement(Stmt {
            kind: StmtKind::Let { value, .. },
            ..
        }) = &program.items[0]
        else {
            panic!("expected let");
        };
        let ExprKind::Function(outer) = &value.kind else {
            panic!("expected function");
        };
        let ExprKind::Block(stmts) = &outer.body.kind else {
            panic!("expected block body");
        };
        let StmtKind::Let { value: inner, .. } = &stmts[0].kind else {
            panic!("expected inner let");
        };
        let ExprKind::Function(inner) = &inner.kind else {
            panic!("expected inner function");
        };
        // Used b-then-a, but captures follow declaration order.
        assert_eq!(inner.captures, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn captured_params_are_marked() {
        let program = resolved("let f = |a| || a").unwrap();
        let Item::Statement(Stmt {
            kind: StmtKind::Let { value, .. },
            ..
        }) = &program.items[0]
        else {
            panic!("expected let");
        };
        let ExprKind::Function(outer) = &value.kind else {
            panic!("expected function");
        };
        assert!(matches!(
            outer.params[0],
            Param::Named { captured: true, .. }
        ));
    }

    #[test]
    fn memoized_recursion_resolves_to_the_wrapper_slot() {
        let program =
            resolved("let f = |n| { let g = memoize(|k| if k < 2 { k } else { g(k - 1) }); g(n) }")
                .unwrap();
        // The inner lambda captures `g`, the binding that holds the wrapper.
        let json = serde_json::to_string(&program).unwrap();
        assert!(json.contains("\"captures\":[\"g\"]"));
    }

    #[test]
    fn input_section_provides_the_input_global() {
        assert!(resolved("input: \"abc\"\npart_one: size(input)").is_ok());
        assert!(matches!(
            resolved("part_one: size(input)").unwrap_err(),
            ResolveError::UndefinedIdentifier { ref name, .. } if name == "input"
        ));
    }
}
