//! The value-stack machine that executes emitted artifacts.
//!
//! Each invocation runs one frame: a slot array for locals (captured slots
//! hold shared cells), an operand stack, and an instruction pointer.
//! Self-tail-calls rebind the parameter slots and jump back to the entry
//! instead of recursing.

use crate::builtins;
use crate::cursor::Cursor;
use crate::io::ScriptIo;
use im::{HashMap as PHashMap, HashSet as PHashSet, Vector};
use regex::Regex;
use santa_core::code::{Artifact, CaptureSource, Instr, Pat, Target};
use santa_core::error::RuntimeError;
use santa_core::span::Span;
use santa_core::value::{FunctionValue, Value};
use santa_core::ops;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const MAX_CALL_DEPTH: usize = 1024;

/// Non-local exits: runtime faults, plus `break` unwinding toward the
/// nearest iterating built-in.
#[derive(Debug)]
pub enum Flow {
    Error(RuntimeError),
    Break(Value),
}

impl From<RuntimeError> for Flow {
    fn from(err: RuntimeError) -> Self {
        Flow::Error(err)
    }
}

impl Flow {
    fn with_span(self, span: Span) -> Flow {
        match self {
            Flow::Error(err) => Flow::Error(err.with_span(span)),
            other => other,
        }
    }

    fn into_runtime_error(self) -> RuntimeError {
        match self {
            Flow::Error(err) => err,
            Flow::Break(_) => RuntimeError::new("Unexpected break"),
        }
    }
}

/// A local slot: plain storage, or a shared cell when the binding is
/// captured by a closure.
#[derive(Debug, Clone)]
enum Slot {
    Plain(Value),
    Cell(Rc<RefCell<Value>>),
}

impl Slot {
    fn get(&self) -> Value {
        match self {
            Slot::Plain(v) => v.clone(),
            Slot::Cell(cell) => cell.borrow().clone(),
        }
    }

    fn set(&mut self, value: Value) {
        match self {
            Slot::Plain(v) => *v = value,
            Slot::Cell(cell) => *cell.borrow_mut() = value,
        }
    }
}

pub struct Machine {
    artifact: Rc<Artifact>,
    globals: Vec<Value>,
    io: Rc<dyn ScriptIo>,
    regexes: HashMap<String, Regex>,
    depth: usize,
}

impl Machine {
    pub fn new(artifact: Rc<Artifact>, io: Rc<dyn ScriptIo>) -> Self {
        let globals = vec![Value::Nil; artifact.globals as usize];
        Self {
            artifact,
            globals,
            io,
            regexes: HashMap::new(),
            depth: 0,
        }
    }

    pub fn set_global(&mut self, index: u16, value: Value) {
        self.globals[index as usize] = value;
    }

    /// Run the top-level statements.
    pub fn run_main(&mut self) -> Result<Value, RuntimeError> {
        self.run_entry(self.artifact.main)
    }

    /// Run a zero-argument prototype (a section thunk or main).
    pub fn run_entry(&mut self, proto: usize) -> Result<Value, RuntimeError> {
        self.run_proto(proto, &[], Vec::new())
            .map_err(Flow::into_runtime_error)
    }

    pub(crate) fn io(&self) -> Rc<dyn ScriptIo> {
        Rc::clone(&self.io)
    }

    /// Compile (or fetch) a cached regex.
    pub(crate) fn regex(&mut self, pattern: &str) -> Result<Regex, RuntimeError> {
        if let Some(found) = self.regexes.get(pattern) {
            return Ok(found.clone());
        }
        let compiled = Regex::new(pattern)
            .map_err(|_| RuntimeError::new(format!("Invalid regular expression {pattern}")))?;
        self.regexes.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    // ── Calls ───────────────────────────────────────────────────────

    /// Invoke any function value. Fewer arguments than the arity curries;
    /// more is an error.
    pub(crate) fn call_function(
        &mut self,
        f: &Rc<FunctionValue>,
        args: Vec<Value>,
    ) -> Result<Value, Flow> {
        let arity = f.arity();
        if arity >= 0 {
            let expected = arity as usize;
            if args.len() < expected {
                return Ok(Value::function(FunctionValue::Partial {
                    target: Rc::clone(f),
                    applied: args,
                }));
            }
            if args.len() > expected {
                return Err(Flow::Error(RuntimeError::new(format!(
                    "Expected {} arguments, found {}",
                    expected,
                    args.len()
                ))));
            }
        }
        match &**f {
            FunctionValue::Builtin(id) => builtins::call(self, *id, args),
            FunctionValue::Closure {
                proto, captures, ..
            } => self.run_proto(*proto, captures, args),
            FunctionValue::Partial { target, applied } => {
                let mut combined = applied.clone();
                combined.extend(args);
                self.call_function(target, combined)
            }
            FunctionValue::Composed { first, second } => {
                let intermediate = self.call_function(first, args)?;
                self.call_function(second, vec![intermediate])
            }
            FunctionValue::Memoized { target, cache } => {
                for arg in &args {
                    if !arg.is_hashable() {
                        return Err(Flow::Error(RuntimeError::new(format!(
                            "Cannot hash {}",
                            arg.type_name()
                        ))));
                    }
                }
                if let Some(cached) = cache.borrow().get(&args) {
                    return Ok(cached.clone());
                }
                let result = self.call_function(target, args.clone())?;
                cache.borrow_mut().insert(args, result.clone());
                Ok(result)
            }
        }
    }

    pub(crate) fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Flow> {
        match callee {
            Value::Function(f) => self.call_function(f, args),
            other => Err(Flow::Error(RuntimeError::new(format!(
                "Cannot call {}",
                other.type_name()
            )))),
        }
    }

    // ── Frame execution ─────────────────────────────────────────────

    fn run_proto(
        &mut self,
        proto: usize,
        captures: &[Rc<RefCell<Value>>],
        args: Vec<Value>,
    ) -> Result<Value, Flow> {
        self.depth += 1;
        if self.depth > MAX_CALL_DEPTH {
            self.depth -= 1;
            return Err(Flow::Error(RuntimeError::new(
                "Maximum call stack depth exceeded",
            )));
        }
        let result = self.run_frame(proto, captures, args);
        self.depth -= 1;
        result
    }

    fn run_frame(
        &mut self,
        proto_idx: usize,
        captures: &[Rc<RefCell<Value>>],
        args: Vec<Value>,
    ) -> Result<Value, Flow> {
        let artifact = Rc::clone(&self.artifact);
        let proto = &artifact.protos[proto_idx];

        let mut slots: Vec<Slot> = Vec::with_capacity(proto.locals as usize);
        for arg in args {
            slots.push(Slot::Plain(arg));
        }
        slots.resize(proto.locals as usize, Slot::Plain(Value::Nil));
        for &param in &proto.cell_params {
            let value = slots[param as usize].get();
            slots[param as usize] = Slot::Cell(Rc::new(RefCell::new(value)));
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut ip = 0usize;

        macro_rules! pop {
            () => {
                stack.pop().expect("operand stack underflow")
            };
        }

        loop {
            let span = proto.spans[ip];
            match proto.code[ip] {
                Instr::Const(c) => stack.push(artifact.constants[c as usize].clone()),
                Instr::Pop => {
                    pop!();
                }
                Instr::Dup => {
                    let top = stack.last().expect("operand stack underflow").clone();
                    stack.push(top);
                }
                Instr::Swap => {
                    let len = stack.len();
                    stack.swap(len - 1, len - 2);
                }
                Instr::LoadLocal(s) => stack.push(slots[s as usize].get()),
                Instr::StoreLocal(s) => {
                    let value = pop!();
                    slots[s as usize].set(value);
                }
                Instr::MakeCell(s) => {
                    slots[s as usize] = Slot::Cell(Rc::new(RefCell::new(Value::Nil)));
                }
                Instr::LoadCapture(i) => stack.push(captures[i as usize].borrow().clone()),
                Instr::StoreCapture(i) => {
                    let value = pop!();
                    *captures[i as usize].borrow_mut() = value;
                }
                Instr::LoadGlobal(i) => stack.push(self.globals[i as usize].clone()),
                Instr::StoreGlobal(i) => {
                    let value = pop!();
                    self.globals[i as usize] = value;
                }
                Instr::LoadBuiltin(id) => {
                    stack.push(Value::function(FunctionValue::Builtin(id)));
                }
                Instr::Jump(target) => {
                    ip = target;
                    continue;
                }
                Instr::JumpIfFalse(target) => {
                    let cond = pop!();
                    if !cond.is_truthy() {
                        ip = target;
                        continue;
                    }
                }
                Instr::JumpIfFalseKeep(target) => {
                    let keep = !stack.last().expect("operand stack underflow").is_truthy();
                    if keep {
                        ip = target;
                        continue;
                    }
                }
                Instr::JumpIfTrueKeep(target) => {
                    let keep = stack.last().expect("operand stack underflow").is_truthy();
                    if keep {
                        ip = target;
                        continue;
                    }
                }
                Instr::Unary(op) => {
                    let operand = pop!();
                    let result =
                        ops::unary(op, &operand).map_err(|e| Flow::Error(e.with_span(span)))?;
                    stack.push(result);
                }
                Instr::Binary(op) => {
                    let rhs = pop!();
                    let lhs = pop!();
                    let result =
                        ops::binary(op, &lhs, &rhs).map_err(|e| Flow::Error(e.with_span(span)))?;
                    stack.push(result);
                }
                Instr::MakeRange { inclusive } => {
                    let end = pop!();
                    let start = pop!();
                    let range = ops::make_range(&start, &end, inclusive)
                        .map_err(|e| Flow::Error(e.with_span(span)))?;
                    stack.push(range);
                }
                Instr::MakeRangeFrom => {
                    let start = pop!();
                    let range = ops::make_range_from(&start)
                        .map_err(|e| Flow::Error(e.with_span(span)))?;
                    stack.push(range);
                }
                Instr::Index => {
                    let index = pop!();
                    let target = pop!();
                    let result = ops::index(&target, &index)
                        .map_err(|e| Flow::Error(e.with_span(span)))?;
                    stack.push(result);
                }
                Instr::MakeList(n) => {
                    let items: Vector<Value> = stack.split_off(stack.len() - n as usize).into();
                    stack.push(Value::List(items));
                }
                Instr::MakeSet(n) => {
                    let items = stack.split_off(stack.len() - n as usize);
                    let mut set = PHashSet::new();
                    for item in items {
                        Self::check_hashable(&item, span)?;
                        set.insert(item);
                    }
                    stack.push(Value::Set(set));
                }
                Instr::MakeDict(n) => {
                    let items = stack.split_off(stack.len() - 2 * n as usize);
                    let mut dict = PHashMap::new();
                    let mut iter = items.into_iter();
                    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                        Self::check_hashable(&key, span)?;
                        dict.insert(key, value);
                    }
                    stack.push(Value::Dict(dict));
                }
                Instr::ListAppend => {
                    let value = pop!();
                    let Value::List(mut list) = pop!() else {
                        unreachable!("list construction invariant");
                    };
                    list.push_back(value);
                    stack.push(Value::List(list));
                }
                Instr::ListExtend => {
                    let source = pop!();
                    let Value::List(mut list) = pop!() else {
                        unreachable!("list construction invariant");
                    };
                    let mut cursor =
                        Cursor::new(&source).map_err(|e| Flow::Error(e.with_span(span)))?;
                    while let Some(item) = cursor.next(self).map_err(|e| e.with_span(span))? {
                        list.push_back(item);
                    }
                    stack.push(Value::List(list));
                }
                Instr::SetAdd => {
                    let value = pop!();
                    let Value::Set(mut set) = pop!() else {
                        unreachable!("set construction invariant");
                    };
                    Self::check_hashable(&value, span)?;
                    set.insert(value);
                    stack.push(Value::Set(set));
                }
                Instr::SetExtend => {
                    let source = pop!();
                    let Value::Set(mut set) = pop!() else {
                        unreachable!("set construction invariant");
                    };
                    let mut cursor =
                        Cursor::new(&source).map_err(|e| Flow::Error(e.with_span(span)))?;
                    while let Some(item) = cursor.next(self).map_err(|e| e.with_span(span))? {
                        Self::check_hashable(&item, span)?;
                        set.insert(item);
                    }
                    stack.push(Value::Set(set));
                }
                Instr::DictInsert => {
                    let value = pop!();
                    let key = pop!();
                    let Value::Dict(mut dict) = pop!() else {
                        unreachable!("dict construction invariant");
                    };
                    Self::check_hashable(&key, span)?;
                    dict.insert(key, value);
                    stack.push(Value::Dict(dict));
                }
                Instr::DictExtend => {
                    let source = pop!();
                    let Value::Dict(mut dict) = pop!() else {
                        unreachable!("dict construction invariant");
                    };
                    let other = match source {
                        Value::Dict(d) => d,
                        other => {
                            return Err(Flow::Error(RuntimeError::at(
                                format!("Cannot spread {} into a Dictionary", other.type_name()),
                                span,
                            )))
                        }
                    };
                    for (key, value) in other {
                        dict.insert(key, value);
                    }
                    stack.push(Value::Dict(dict));
                }
                Instr::Call(n) => {
                    let args = stack.split_off(stack.len() - n as usize);
                    let callee = pop!();
                    let result = self
                        .call_value(&callee, args)
                        .map_err(|e| e.with_span(span))?;
                    stack.push(result);
                }
                Instr::CallSpread => {
                    let Value::List(args) = pop!() else {
                        unreachable!("spread-call arguments are a list");
                    };
                    let callee = pop!();
                    let result = self
                        .call_value(&callee, args.into_iter().collect())
                        .map_err(|e| e.with_span(span))?;
                    stack.push(result);
                }
                Instr::TailCall(n) => {
                    let args = stack.split_off(stack.len() - n as usize);
                    stack.clear();
                    for (i, arg) in args.into_iter().enumerate() {
                        if proto.cell_params.contains(&(i as u16)) {
                            slots[i] = Slot::Cell(Rc::new(RefCell::new(arg)));
                        } else {
                            slots[i] = Slot::Plain(arg);
                        }
                    }
                    ip = 0;
                    continue;
                }
                Instr::MakeFunction(p) => {
                    let target = &artifact.protos[p as usize];
                    let closure_captures: Vec<Rc<RefCell<Value>>> = target
                        .captures
                        .iter()
                        .map(|source| match source {
                            CaptureSource::Local(s) => {
                                let slot = &mut slots[*s as usize];
                                if let Slot::Plain(value) = slot {
                                    *slot = Slot::Cell(Rc::new(RefCell::new(value.clone())));
                                }
                                match slot {
                                    Slot::Cell(cell) => Rc::clone(cell),
                                    Slot::Plain(_) => unreachable!(),
                                }
                            }
                            CaptureSource::Capture(i) => Rc::clone(&captures[*i as usize]),
                        })
                        .collect();
                    stack.push(Value::function(FunctionValue::Closure {
                        proto: p as usize,
                        arity: target.arity,
                        captures: closure_captures,
                    }));
                }
                Instr::BindPattern(p) => {
                    let value = pop!();
                    let matched = self.match_pattern(
                        &artifact,
                        &artifact.patterns[p as usize],
                        &value,
                        &mut slots,
                    );
                    if !matched {
                        return Err(Flow::Error(RuntimeError::at("Pattern match failed", span)));
                    }
                }
                Instr::MatchPattern(p) => {
                    let value = pop!();
                    let matched = self.match_pattern(
                        &artifact,
                        &artifact.patterns[p as usize],
                        &value,
                        &mut slots,
                    );
                    stack.push(Value::Bool(matched));
                }
                Instr::Break => {
                    let value = pop!();
                    return Err(Flow::Break(value));
                }
                Instr::Return => {
                    return Ok(stack.pop().unwrap_or(Value::Nil));
                }
                Instr::Throw(c) => {
                    let message = artifact.constants[c as usize].display_raw();
                    return Err(Flow::Error(RuntimeError::at(message, span)));
                }
            }
            ip += 1;
        }
    }

    fn check_hashable(value: &Value, span: Span) -> Result<(), Flow> {
        if value.is_hashable() {
            Ok(())
        } else {
            Err(Flow::Error(RuntimeError::at(
                format!("Cannot hash {}", value.type_name()),
                span,
            )))
        }
    }

    fn match_pattern(
        &mut self,
        artifact: &Artifact,
        pat: &Pat,
        value: &Value,
        slots: &mut [Slot],
    ) -> bool {
        match pat {
            Pat::Wildcard => true,
            Pat::Bind(target) => {
                self.bind_target(*target, value.clone(), slots);
                true
            }
            Pat::Literal(c) => value == &artifact.constants[*c as usize],
            Pat::Range {
                start,
                end,
                inclusive,
            } => {
                let Value::Int(n) = value else {
                    return false;
                };
                if start.is_some_and(|s| *n < s) {
                    return false;
                }
                match end {
                    Some(e) if *inclusive => *n <= *e,
                    Some(e) => *n < *e,
                    None => true,
                }
            }
            Pat::List {
                before,
                rest,
                after,
            } => {
                let Value::List(items) = value else {
                    return false;
                };
                let fixed = before.len() + after.len();
                match rest {
                    None if items.len() != fixed => return false,
                    Some(_) if items.len() < fixed => return false,
                    _ => {}
                }
                for (pat, item) in before.iter().zip(items.iter()) {
                    if !self.match_pattern(artifact, pat, item, slots) {
                        return false;
                    }
                }
                if let Some(rest_target) = rest {
                    let middle: Vector<Value> = items
                        .iter()
                        .skip(before.len())
                        .take(items.len() - fixed)
                        .cloned()
                        .collect();
                    if let Some(target) = rest_target {
                        self.bind_target(*target, Value::List(middle), slots);
                    }
                    let tail = items.iter().skip(items.len() - after.len());
                    for (pat, item) in after.iter().zip(tail) {
                        if !self.match_pattern(artifact, pat, item, slots) {
                            return false;
                        }
                    }
                }
                true
            }
        }
    }

    fn bind_target(&mut self, target: Target, value: Value, slots: &mut [Slot]) {
        match target {
            Target::Local(s) => slots[s as usize].set(value),
            Target::Global(g) => self.globals[g as usize] = value,
        }
    }
}
