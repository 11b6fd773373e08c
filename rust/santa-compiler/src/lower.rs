//! Lowers a resolved program to the value-stack artifact.
//!
//! Slot indices grow monotonically per function. Captured binding sites are
//! boxed as shared cells before their initializer runs, so a recursive
//! lambda (or its memoized wrapper) observes the slot it is being bound to.

use crate::ast::{self, *};
use santa_core::code::{Artifact, CaptureSource, FunctionProto, Instr, Pat, Target};
use santa_core::ops::{BinaryOp, UnaryOp};
use santa_core::span::Span;
use santa_core::value::Value;
use std::collections::HashMap;

pub fn lower(program: &Program) -> Artifact {
    let mut lowerer = Lowerer::default();
    lowerer.run(program)
}

#[derive(Default)]
struct Lowerer {
    constants: Vec<Value>,
    protos: Vec<FunctionProto>,
    patterns: Vec<Pat>,
    globals: HashMap<String, u16>,
    global_count: u16,
    ctxs: Vec<FnCtx>,
}

struct FnCtx {
    name: Option<String>,
    code: Vec<Instr>,
    spans: Vec<Span>,
    scopes: Vec<HashMap<String, u16>>,
    next_slot: u16,
    arity: u8,
    cell_params: Vec<u16>,
    captures: Vec<String>,
    /// Top-level statement frame: depth-zero `let`s bind globals.
    global_frame: bool,
}

impl Lowerer {
    fn run(&mut self, program: &Program) -> Artifact {
        let has_input_section = program
            .items
            .iter()
            .any(|item| matches!(item, Item::Section(s) if s.name == "input"));
        let input_global = has_input_section.then(|| self.declare_global("input"));

        // Top-level statements become the main prototype; intermediate
        // results are discarded and the last value is returned.
        self.push_ctx(None, &[], &[], true);
        let statements: Vec<&Stmt> = program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Statement(stmt) => Some(stmt),
                Item::Section(_) => None,
            })
            .collect();
        if statements.is_empty() {
            let nil = self.constant(Value::Nil);
            self.emit(Instr::Const(nil), program.span);
        } else {
            let last = statements.len() - 1;
            for (i, stmt) in statements.into_iter().enumerate() {
                self.lower_stmt(stmt);
                if i < last {
                    self.emit(Instr::Pop, stmt.span);
                }
            }
        }
        self.emit(Instr::Return, program.span);
        let main = self.finish_ctx(false);

        let mut sections = Vec::new();
        for item in &program.items {
            let Item::Section(section) = item else {
                continue;
            };
            self.push_ctx(Some(section.name.clone()), &[], &[], false);
            match &section.body {
                SectionBody::Expr(body) => self.lower_expr(body),
                SectionBody::TestBlocks(blocks) => {
                    for block in blocks {
                        let key = self.constant(Value::string(block.name.clone()));
                        self.emit(Instr::Const(key), block.span);
                        let value = self.constant(Value::string(block.value.clone()));
                        self.emit(Instr::Const(value), block.span);
                    }
                    self.emit(Instr::MakeDict(blocks.len() as u16), section.span);
                }
            }
            self.emit(Instr::Return, section.span);
            let proto = self.finish_ctx(false);
            sections.push((section.name.clone(), proto));
        }

        Artifact {
            constants: std::mem::take(&mut self.constants),
            protos: std::mem::take(&mut self.protos),
            main,
            patterns: std::mem::take(&mut self.patterns),
            sections,
            globals: self.global_count,
            input_global,
        }
    }

    // ── Context helpers ─────────────────────────────────────────────

    fn push_ctx(
        &mut self,
        name: Option<String>,
        params: &[Param],
        captures: &[String],
        global_frame: bool,
    ) {
        let mut scope = HashMap::new();
        let mut cell_params = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let Param::Named { name, captured } = param else {
                unreachable!("pattern params survive desugaring");
            };
            scope.insert(name.clone(), i as u16);
            if *captured {
                cell_params.push(i as u16);
            }
        }
        self.ctxs.push(FnCtx {
            name,
            code: Vec::new(),
            spans: Vec::new(),
            scopes: vec![scope],
            next_slot: params.len() as u16,
            arity: params.len() as u8,
            cell_params,
            captures: captures.to_vec(),
            global_frame,
        });
    }

    fn finish_ctx(&mut self, tail_recursive: bool) -> usize {
        let ctx = self.ctxs.pop().expect("context stack underflow");
        self.protos.push(FunctionProto {
            name: ctx.name,
            arity: ctx.arity,
            locals: ctx.next_slot,
            cell_params: ctx.cell_params,
            captures: Vec::new(),
            tail_recursive,
            code: ctx.code,
            spans: ctx.spans,
        });
        self.protos.len() - 1
    }

    fn ctx(&mut self) -> &mut FnCtx {
        self.ctxs.last_mut().expect("no active context")
    }

    fn emit(&mut self, instr: Instr, span: Span) -> usize {
        let ctx = self.ctx();
        ctx.code.push(instr);
        ctx.spans.push(span);
        ctx.code.len() - 1
    }

    fn here(&mut self) -> usize {
        self.ctx().code.len()
    }

    fn patch_jump(&mut self, at: usize) {
        let target = self.here();
        match &mut self.ctx().code[at] {
            Instr::Jump(t)
            | Instr::JumpIfFalse(t)
            | Instr::JumpIfFalseKeep(t)
            | Instr::JumpIfTrueKeep(t) => *t = target,
            other => unreachable!("patching non-jump instruction {other:?}"),
        }
    }

    fn constant(&mut self, value: Value) -> u16 {
        if let Some(found) = self.constants.iter().position(|c| *c == value) {
            return found as u16;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    fn add_pattern(&mut self, pat: Pat) -> u16 {
        self.patterns.push(pat);
        (self.patterns.len() - 1) as u16
    }

    fn declare_global(&mut self, name: &str) -> u16 {
        let idx = self.global_count;
        self.global_count += 1;
        self.globals.insert(name.to_string(), idx);
        idx
    }

    /// Bind `name` at the current scope depth; top-level frame depth zero
    /// allocates a global.
    fn declare(&mut self, name: &str) -> Target {
        if self.ctx().global_frame && self.ctx().scopes.len() == 1 {
            return Target::Global(self.declare_global(name));
        }
        let ctx = self.ctx();
        let slot = ctx.next_slot;
        ctx.next_slot += 1;
        ctx.scopes
            .last_mut()
            .expect("no active scope")
            .insert(name.to_string(), slot);
        Target::Local(slot)
    }

    fn resolve_local(&mut self, name: &str) -> Option<u16> {
        self.ctx()
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn capture_index(&mut self, name: &str) -> Option<u16> {
        self.ctx()
            .captures
            .iter()
            .position(|c| c == name)
            .map(|i| i as u16)
    }

    // ── Statements ──────────────────────────────────────────────────

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.lower_expr(e),
            StmtKind::Let { pattern, value, .. } => self.lower_let(pattern, value, stmt.span),
            StmtKind::Return(value) => {
                self.lower_optional_value(value, stmt.span);
                self.emit(Instr::Return, stmt.span);
            }
            StmtKind::Break(value) => {
                self.lower_optional_value(value, stmt.span);
                self.emit(Instr::Break, stmt.span);
            }
        }
    }

    fn lower_optional_value(&mut self, value: &Option<Expr>, span: Span) {
        match value {
            Some(value) => self.lower_expr(value),
            None => {
                let nil = self.constant(Value::Nil);
                self.emit(Instr::Const(nil), span);
            }
        }
    }

    fn lower_let(&mut self, pattern: &Pattern, value: &Expr, span: Span) {
        if let PatternKind::Ident { name, captured } = &pattern.kind {
            let recursive = ast::recursive_let_name(pattern, value).is_some();
            let hint = Some(name.clone());
            if recursive {
                // The slot (and cell) exists before the initializer runs.
                let target = self.declare(name);
                if *captured {
                    if let Target::Local(slot) = target {
                        self.emit(Instr::MakeCell(slot), span);
                    }
                }
                self.lower_named_expr(value, hint);
                self.emit(Instr::Dup, span);
                self.store(target, span);
            } else {
                self.lower_named_expr(value, hint);
                let target = self.declare(name);
                if *captured {
                    if let Target::Local(slot) = target {
                        self.emit(Instr::MakeCell(slot), span);
                    }
                }
                self.emit(Instr::Dup, span);
                self.store(target, span);
            }
            return;
        }
        self.lower_expr(value);
        let mut cells = Vec::new();
        let pat = self.lower_pattern(pattern, &mut cells);
        let pat = self.add_pattern(pat);
        for slot in cells {
            self.emit(Instr::MakeCell(slot), span);
        }
        self.emit(Instr::Dup, span);
        self.emit(Instr::BindPattern(pat), span);
    }

    fn store(&mut self, target: Target, span: Span) {
        match target {
            Target::Local(slot) => self.emit(Instr::StoreLocal(slot), span),
            Target::Global(idx) => self.emit(Instr::StoreGlobal(idx), span),
        };
    }

    // ── Patterns ────────────────────────────────────────────────────

    fn lower_pattern(&mut self, pattern: &Pattern, cells: &mut Vec<u16>) -> Pat {
        match &pattern.kind {
            PatternKind::Wildcard => Pat::Wildcard,
            PatternKind::Ident { name, captured } => {
                let target = self.declare(name);
                if *captured {
                    if let Target::Local(slot) = target {
                        cells.push(slot);
                    }
                }
                Pat::Bind(target)
            }
            PatternKind::Rest { .. } => unreachable!("rest patterns only occur inside lists"),
            PatternKind::List(items) => {
                let mut before = Vec::new();
                let mut rest = None;
                let mut after = Vec::new();
                for item in items {
                    if let PatternKind::Rest { name, captured } = &item.kind {
                        let target = name.as_ref().map(|name| {
                            let target = self.declare(name);
                            if *captured {
                                if let Target::Local(slot) = target {
                                    cells.push(slot);
                                }
                            }
                            target
                        });
                        rest = Some(target);
                        continue;
                    }
                    let compiled = self.lower_pattern(item, cells);
                    if rest.is_some() {
                        after.push(compiled);
                    } else {
                        before.push(compiled);
                    }
                }
                Pat::List {
                    before,
                    rest,
                    after,
                }
            }
            PatternKind::Int(n) => Pat::Literal(self.constant(Value::Int(*n))),
            PatternKind::Decimal(d) => Pat::Literal(self.constant(Value::Decimal(*d))),
            PatternKind::Str(s) => Pat::Literal(self.constant(Value::string(s.clone()))),
            PatternKind::Bool(b) => Pat::Literal(self.constant(Value::Bool(*b))),
            PatternKind::Nil => Pat::Literal(self.constant(Value::Nil)),
            PatternKind::Range {
                start,
                end,
                inclusive,
            } => Pat::Range {
                start: *start,
                end: *end,
                inclusive: *inclusive,
            },
        }
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn lower_named_expr(&mut self, expr: &Expr, name: Option<String>) {
        if let ExprKind::Function(f) = &expr.kind {
            self.lower_function(f, name, expr.span);
            return;
        }
        self.lower_expr(expr);
    }

    fn lower_expr(&mut self, expr: &Expr) {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(n) => {
                let c = self.constant(Value::Int(*n));
                self.emit(Instr::Const(c), span);
            }
            ExprKind::Decimal(d) => {
                let c = self.constant(Value::Decimal(*d));
                self.emit(Instr::Const(c), span);
            }
            ExprKind::Str(s) => {
                let c = self.constant(Value::string(s.clone()));
                self.emit(Instr::Const(c), span);
            }
            ExprKind::Bool(b) => {
                let c = self.constant(Value::Bool(*b));
                self.emit(Instr::Const(c), span);
            }
            ExprKind::Nil => {
                let c = self.constant(Value::Nil);
                self.emit(Instr::Const(c), span);
            }
            ExprKind::Placeholder => unreachable!("placeholders survive desugaring"),
            ExprKind::Ident { name, binding } => self.lower_ident(name, *binding, span),
            ExprKind::Unary { op, operand } => {
                // Fold negation of numeric literals.
                if *op == UnOp::Neg {
                    match operand.kind {
                        ExprKind::Int(n) => {
                            let c = self.constant(Value::Int(-n));
                            self.emit(Instr::Const(c), span);
                            return;
                        }
                        ExprKind::Decimal(d) => {
                            let c = self.constant(Value::Decimal(-d));
                            self.emit(Instr::Const(c), span);
                            return;
                        }
                        _ => {}
                    }
                }
                self.lower_expr(operand);
                let op = match op {
                    UnOp::Neg => UnaryOp::Negate,
                    UnOp::Not => UnaryOp::Not,
                };
                self.emit(Instr::Unary(op), span);
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, span),
            ExprKind::Assign {
                name,
                binding,
                value,
            } => {
                self.lower_expr(value);
                self.emit(Instr::Dup, span);
                match binding.expect("assignment resolved") {
                    Binding::Local => {
                        let slot = self.resolve_local(name).expect("local slot allocated");
                        self.emit(Instr::StoreLocal(slot), span);
                    }
                    Binding::Global => {
                        let idx = self.globals[name];
                        self.emit(Instr::StoreGlobal(idx), span);
                    }
                    Binding::Captured => {
                        let idx = self.capture_index(name).expect("capture recorded");
                        self.emit(Instr::StoreCapture(idx), span);
                    }
                    Binding::Builtin(_) => unreachable!("assignment to built-in"),
                }
            }
            ExprKind::Range {
                start,
                end,
                inclusive,
            } => {
                self.lower_expr(start);
                match end {
                    Some(end) => {
                        self.lower_expr(end);
                        self.emit(
                            Instr::MakeRange {
                                inclusive: *inclusive,
                            },
                            span,
                        );
                    }
                    None => {
                        self.emit(Instr::MakeRangeFrom, span);
                    }
                }
            }
            ExprKind::List(elements) => {
                self.lower_collection(
                    elements,
                    span,
                    Instr::MakeList(elements.len() as u16),
                    Instr::MakeList(0),
                    Instr::ListAppend,
                    Instr::ListExtend,
                );
            }
            ExprKind::Set(elements) => {
                self.lower_collection(
                    elements,
                    span,
                    Instr::MakeSet(elements.len() as u16),
                    Instr::MakeSet(0),
                    Instr::SetAdd,
                    Instr::SetExtend,
                );
            }
            ExprKind::Dict(entries) => self.lower_dict(entries, span),
            ExprKind::Call { callee, args, tail } => self.lower_call(callee, args, *tail, span),
            ExprKind::Index { target, index } => {
                self.lower_expr(target);
                self.lower_expr(index);
                self.emit(Instr::Index, span);
            }
            ExprKind::Function(f) => self.lower_function(f, None, span),
            ExprKind::Block(stmts) => self.lower_block(stmts, span),
            ExprKind::If { cond, then, alt } => {
                self.lower_expr(cond);
                let to_else = self.emit(Instr::JumpIfFalse(0), span);
                self.lower_expr(then);
                let to_end = self.emit(Instr::Jump(0), span);
                self.patch_jump(to_else);
                match alt {
                    Some(alt) => self.lower_expr(alt),
                    None => {
                        let nil = self.constant(Value::Nil);
                        self.emit(Instr::Const(nil), span);
                    }
                }
                self.patch_jump(to_end);
            }
            ExprKind::IfLet {
                pattern,
                value,
                then,
                alt,
            } => {
                self.lower_expr(value);
                self.ctx().scopes.push(HashMap::new());
                let mut cells = Vec::new();
                let pat = self.lower_pattern(pattern, &mut cells);
                let pat = self.add_pattern(pat);
                for slot in cells {
                    self.emit(Instr::MakeCell(slot), span);
                }
                self.emit(Instr::MatchPattern(pat), span);
                let to_else = self.emit(Instr::JumpIfFalse(0), span);
                self.lower_expr(then);
                self.ctx().scopes.pop();
                let to_end = self.emit(Instr::Jump(0), span);
                self.patch_jump(to_else);
                match alt {
                    Some(alt) => self.lower_expr(alt),
                    None => {
                        let nil = self.constant(Value::Nil);
                        self.emit(Instr::Const(nil), span);
                    }
                }
                self.patch_jump(to_end);
            }
            ExprKind::Match { subject, arms } => self.lower_match(subject, arms, span),
        }
    }

    fn lower_ident(&mut self, name: &str, binding: Option<Binding>, span: Span) {
        match binding.expect("identifier resolved") {
            Binding::Local => {
                let slot = self.resolve_local(name).expect("local slot allocated");
                self.emit(Instr::LoadLocal(slot), span);
            }
            Binding::Captured => {
                let idx = self.capture_index(name).expect("capture recorded");
                self.emit(Instr::LoadCapture(idx), span);
            }
            Binding::Global => {
                let idx = self.globals[name];
                self.emit(Instr::LoadGlobal(idx), span);
            }
            Binding::Builtin(id) => {
                self.emit(Instr::LoadBuiltin(id), span);
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) {
        match op {
            BinOp::And => {
                self.lower_expr(lhs);
                let short = self.emit(Instr::JumpIfFalseKeep(0), span);
                self.emit(Instr::Pop, span);
                self.lower_expr(rhs);
                self.patch_jump(short);
            }
            BinOp::Or => {
                self.lower_expr(lhs);
                let short = self.emit(Instr::JumpIfTrueKeep(0), span);
                self.emit(Instr::Pop, span);
                self.lower_expr(rhs);
                self.patch_jump(short);
            }
            BinOp::Pipeline => {
                // `x |> f` evaluates x first, then calls f with it.
                self.lower_expr(lhs);
                self.lower_expr(rhs);
                self.emit(Instr::Swap, span);
                self.emit(Instr::Call(1), span);
            }
            BinOp::Compose => {
                self.lower_expr(lhs);
                self.lower_expr(rhs);
                self.emit(Instr::Binary(BinaryOp::Compose), span);
            }
            _ => {
                self.lower_expr(lhs);
                self.lower_expr(rhs);
                let op = match op {
                    BinOp::Add => BinaryOp::Add,
                    BinOp::Sub => BinaryOp::Sub,
                    BinOp::Mul => BinaryOp::Mul,
                    BinOp::Div => BinaryOp::Div,
                    BinOp::Mod => BinaryOp::Mod,
                    BinOp::Eq => BinaryOp::Eq,
                    BinOp::Ne => BinaryOp::Ne,
                    BinOp::Lt => BinaryOp::Lt,
                    BinOp::Le => BinaryOp::Le,
                    BinOp::Gt => BinaryOp::Gt,
                    BinOp::Ge => BinaryOp::Ge,
                    BinOp::And | BinOp::Or | BinOp::Pipeline | BinOp::Compose => unreachable!(),
                };
                self.emit(Instr::Binary(op), span);
            }
        }
    }

    fn lower_collection(
        &mut self,
        elements: &[Element],
        span: Span,
        direct: Instr,
        empty: Instr,
        append: Instr,
        extend: Instr,
    ) {
        if elements.iter().all(|e| !e.spread) {
            for element in elements {
                self.lower_expr(&element.value);
            }
            self.emit(direct, span);
            return;
        }
        self.emit(empty, span);
        for element in elements {
            self.lower_expr(&element.value);
            self.emit(if element.spread { extend } else { append }, span);
        }
    }

    fn lower_dict(&mut self, entries: &[DictEntry], span: Span) {
        let spreadless = entries.iter().all(|e| !matches!(e, DictEntry::Spread(_)));
        if spreadless {
            for entry in entries {
                let DictEntry::Pair { key, value } = entry else {
                    unreachable!("dict shorthand survives desugaring");
                };
                self.lower_expr(key);
                self.lower_expr(value);
            }
            self.emit(Instr::MakeDict(entries.len() as u16), span);
            return;
        }
        self.emit(Instr::MakeDict(0), span);
        for entry in entries {
            match entry {
                DictEntry::Pair { key, value } => {
                    self.lower_expr(key);
                    self.lower_expr(value);
                    self.emit(Instr::DictInsert, span);
                }
                DictEntry::Shorthand { .. } => unreachable!("dict shorthand survives desugaring"),
                DictEntry::Spread(e) => {
                    self.lower_expr(e);
                    self.emit(Instr::DictExtend, span);
                }
            }
        }
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Element], tail: bool, span: Span) {
        let spreadless = args.iter().all(|a| !a.spread);
        if tail && spreadless && args.len() == self.ctx().arity as usize {
            for arg in args {
                self.lower_expr(&arg.value);
            }
            self.emit(Instr::TailCall(args.len() as u8), span);
            return;
        }
        self.lower_expr(callee);
        if spreadless {
            for arg in args {
                self.lower_expr(&arg.value);
            }
            self.emit(Instr::Call(args.len() as u8), span);
            return;
        }
        self.emit(Instr::MakeList(0), span);
        for arg in args {
            self.lower_expr(&arg.value);
            self.emit(
                if arg.spread {
                    Instr::ListExtend
                } else {
                    Instr::ListAppend
                },
                span,
            );
        }
        self.emit(Instr::CallSpread, span);
    }

    fn lower_function(&mut self, f: &FunctionLit, name: Option<String>, span: Span) {
        self.push_ctx(name, &f.params, &f.captures, false);
        self.lower_expr(&f.body);
        self.emit(Instr::Return, f.body.span);
        let proto = self.finish_ctx(f.tail_recursive);

        // Resolve capture sources against the enclosing frame.
        let sources: Vec<CaptureSource> = f
            .captures
            .iter()
            .map(|capture| {
                if let Some(slot) = self.resolve_local(capture) {
                    CaptureSource::Local(slot)
                } else if let Some(idx) = self.capture_index(capture) {
                    CaptureSource::Capture(idx)
                } else {
                    unreachable!("capture {capture} resolved to no enclosing binding")
                }
            })
            .collect();
        self.protos[proto].captures = sources;
        self.emit(Instr::MakeFunction(proto as u16), span);
    }

    fn lower_block(&mut self, stmts: &[Stmt], span: Span) {
        if stmts.is_empty() {
            let nil = self.constant(Value::Nil);
            self.emit(Instr::Const(nil), span);
            return;
        }
        self.ctx().scopes.push(HashMap::new());
        let last = stmts.len() - 1;
        for (i, stmt) in stmts.iter().enumerate() {
            self.lower_stmt(stmt);
            if i < last {
                self.emit(Instr::Pop, stmt.span);
            }
        }
        self.ctx().scopes.pop();
    }

    fn lower_match(&mut self, subject: &Expr, arms: &[MatchArm], span: Span) {
        self.lower_expr(subject);
        let mut exits = Vec::new();
        for arm in arms {
            self.ctx().scopes.push(HashMap::new());
            let mut cells = Vec::new();
            let pat = self.lower_pattern(&arm.pattern, &mut cells);
            let pat = self.add_pattern(pat);
            for slot in cells {
                self.emit(Instr::MakeCell(slot), arm.span);
            }
            self.emit(Instr::Dup, arm.span);
            self.emit(Instr::MatchPattern(pat), arm.span);
            let to_next = self.emit(Instr::JumpIfFalse(0), arm.span);
            self.emit(Instr::Pop, arm.span);
            self.lower_expr(&arm.body);
            self.ctx().scopes.pop();
            exits.push(self.emit(Instr::Jump(0), arm.span));
            self.patch_jump(to_next);
        }
        self.emit(Instr::Pop, span);
        let message = self.constant(Value::string("Unhandled match value"));
        self.emit(Instr::Throw(message), span);
        for exit in exits {
            self.patch_jump(exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desugar::desugar;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolve::resolve;
    use crate::tailcall::mark_tail_calls;

    fn lowered(source: &str) -> Artifact {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut program = desugar(program);
        resolve(&mut program).unwrap();
        mark_tail_calls(&mut program);
        lower(&program)
    }

    #[test]
    fn empty_program_returns_nil() {
        let artifact = lowered("");
        let main = &artifact.protos[artifact.main];
        assert!(matches!(main.code[0], Instr::Const(_)));
        assert!(matches!(main.code[1], Instr::Return));
        assert_eq!(artifact.constants[0], Value::Nil);
    }

    #[test]
    fn spans_parallel_the_code() {
        let artifact = lowered("1 + 2\nlet x = [1, 2]\nx");
        for proto in &artifact.protos {
            assert_eq!(proto.code.len(), proto.spans.len());
        }
    }

    #[test]
    fn negated_literals_fold_to_constants() {
        let artifact = lowered("-42");
        assert!(artifact.constants.contains(&Value::Int(-42)));
        let main = &artifact.protos[artifact.main];
        assert!(!main
            .code
            .iter()
            .any(|i| matches!(i, Instr::Unary(UnaryOp::Negate))));
    }

    #[test]
    fn tail_recursive_functions_emit_tail_calls() {
        let artifact =
            lowered("let count = |n, acc| if n == 0 { acc } else { count(n - 1, acc + 1) }");
        let proto = artifact
            .protos
            .iter()
            .find(|p| p.name.as_deref() == Some("count"))
            .expect("count prototype");
        assert!(proto.tail_recursive);
        assert!(proto.code.iter().any(|i| matches!(i, Instr::TailCall(2))));
    }

    #[test]
    fn captured_recursive_binding_gets_a_cell() {
        let artifact =
            lowered("let run = || { let f = |n| if n == 0 { 0 } else { f(n - 1) }; f(3) }");
        let run = artifact
            .protos
            .iter()
            .find(|p| p.name.as_deref() == Some("run"))
            .expect("run prototype");
        assert!(run.code.iter().any(|i| matches!(i, Instr::MakeCell(_))));
        let f = artifact
            .protos
            .iter()
            .find(|p| p.name.as_deref() == Some("f"))
            .expect("f prototype");
        assert_eq!(f.captures.len(), 1);
    }

    #[test]
    fn sections_become_separate_prototypes() {
        let artifact = lowered("let parse = |s| s\ninput: \"abc\"\npart_one: size(input)");
        assert_eq!(artifact.sections.len(), 2);
        assert!(artifact.input_global.is_some());
        assert!(artifact.section("part_one").is_some());
        assert!(artifact.section("part_two").is_none());
    }

    #[test]
    fn test_section_builds_a_dict_thunk() {
        let artifact = lowered("test: {\n  input: \"1 2\"\n  part_one: \"3\"\n}");
        let idx = artifact.section("test").unwrap();
        let proto = &artifact.protos[idx];
        assert!(proto.code.iter().any(|i| matches!(i, Instr::MakeDict(2))));
    }

    #[test]
    fn globals_are_allocated_for_top_level_lets() {
        let artifact = lowered("let a = 1\nlet b = 2\nb");
        assert_eq!(artifact.globals, 2);
        let main = &artifact.protos[artifact.main];
        assert!(main.code.iter().any(|i| matches!(i, Instr::StoreGlobal(0))));
        assert!(main.code.iter().any(|i| matches!(i, Instr::LoadGlobal(1))));
    }

    #[test]
    fn pipeline_swaps_callee_under_argument() {
        let artifact = lowered("[1] |> size");
        let main = &artifact.protos[artifact.main];
        let swap = main
            .code
            .iter()
            .position(|i| matches!(i, Instr::Swap))
            .expect("swap emitted");
        assert!(matches!(main.code[swap + 1], Instr::Call(1)));
    }
}
