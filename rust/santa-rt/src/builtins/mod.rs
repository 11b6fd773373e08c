//! The built-in function library.
//!
//! `call` dispatches a [`BuiltinId`] to its implementation. Arity was
//! already enforced by the calling convention (partial application for
//! missing arguments), so implementations destructure exact argument
//! counts; `puts` is the one variadic entry.

mod collections;
mod misc;
mod sequences;
mod strings;

use crate::machine::{Flow, Machine};
use santa_core::builtins::BuiltinId;
use santa_core::error::RuntimeError;
use santa_core::value::{FunctionValue, Value};
use std::rc::Rc;

pub fn call(m: &mut Machine, id: BuiltinId, args: Vec<Value>) -> Result<Value, Flow> {
    use BuiltinId::*;
    match id {
        Abs => misc::abs(args),
        Assoc => collections::assoc(args),
        Chars => strings::chars(args),
        Contains => collections::contains(args),
        Cons => sequences::cons(args),
        Cycle => sequences::cycle(m, args),
        Each => sequences::each(m, args),
        Filter => sequences::filter(m, args),
        FilterMap => sequences::filter_map(m, args),
        Find => sequences::find(m, args),
        First => sequences::first(m, args),
        FlatMap => sequences::flat_map(m, args),
        Fold => sequences::fold(m, args),
        FoldS => sequences::fold_s(m, args),
        Get => collections::get(args),
        Int => misc::int(args),
        Ints => strings::ints(m, args),
        Iterate => sequences::iterate(args),
        Join => strings::join(m, args),
        Keys => collections::keys(args),
        Last => collections::last(args),
        Lines => strings::lines(args),
        Map => sequences::map(m, args),
        Max => collections::max(m, args),
        Memoize => misc::memoize(args),
        Min => collections::min(m, args),
        Push => collections::push(args),
        Puts => misc::puts(args),
        Read => misc::read(m, args),
        Reduce => sequences::reduce(m, args),
        RegexMatch => strings::regex_match(m, args),
        RegexMatchAll => strings::regex_match_all(m, args),
        Repeat => sequences::repeat(args),
        Rest => sequences::rest(args),
        Reverse => collections::reverse(args),
        Second => collections::second(args),
        Size => collections::size(args),
        Skip => sequences::skip(m, args),
        Sort => collections::sort(m, args),
        SortBy => collections::sort_by(m, args),
        Split => strings::split(args),
        Sum => sequences::sum(m, args),
        Take => sequences::take(m, args),
        Type => misc::type_of(args),
        Update => collections::update(m, args),
        Values => collections::values(args),
        Zip => sequences::zip(m, args),
    }
}

// ── Argument helpers ────────────────────────────────────────────────

pub(crate) fn one(args: Vec<Value>) -> Value {
    let mut iter = args.into_iter();
    iter.next().expect("arity checked")
}

pub(crate) fn two(args: Vec<Value>) -> (Value, Value) {
    let mut iter = args.into_iter();
    (
        iter.next().expect("arity checked"),
        iter.next().expect("arity checked"),
    )
}

pub(crate) fn three(args: Vec<Value>) -> (Value, Value, Value) {
    let mut iter = args.into_iter();
    (
        iter.next().expect("arity checked"),
        iter.next().expect("arity checked"),
        iter.next().expect("arity checked"),
    )
}

pub(crate) fn as_function(value: &Value) -> Result<Rc<FunctionValue>, Flow> {
    match value {
        Value::Function(f) => Ok(Rc::clone(f)),
        other => Err(Flow::Error(RuntimeError::new(format!(
            "Expected a Function, found {}",
            other.type_name()
        )))),
    }
}

pub(crate) fn as_int(value: &Value) -> Result<i64, Flow> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(Flow::Error(RuntimeError::new(format!(
            "Expected an Integer, found {}",
            other.type_name()
        )))),
    }
}

pub(crate) fn as_str(value: &Value) -> Result<Rc<str>, Flow> {
    match value {
        Value::Str(s) => Ok(Rc::clone(s)),
        other => Err(Flow::Error(RuntimeError::new(format!(
            "Expected a String, found {}",
            other.type_name()
        )))),
    }
}

pub(crate) fn fail(message: String) -> Flow {
    Flow::Error(RuntimeError::new(message))
}
