//! Conversions, introspection, memoization, and the I/O built-ins.

use super::{as_function, as_str, fail, one};
use crate::console;
use crate::machine::{Flow, Machine};
use santa_core::value::{FunctionValue, Value};
use std::cell::RefCell;
use std::collections::HashMap;

pub fn abs(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| fail("Integer overflow".to_string())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        other => Err(fail(format!(
            "Cannot take the absolute value of {}",
            other.type_name()
        ))),
    }
}

/// Parse strings, truncate decimals.
pub fn int(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        n @ Value::Int(_) => Ok(n),
        Value::Decimal(d) => Ok(Value::Int(d.trunc() as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| fail(format!("Unable to parse \"{s}\" as an Integer"))),
        other => Err(fail(format!(
            "Cannot convert {} to an Integer",
            other.type_name()
        ))),
    }
}

pub fn type_of(args: Vec<Value>) -> Result<Value, Flow> {
    Ok(Value::string(one(args).type_name()))
}

/// Wrap a function with an argument-tuple cache; the wrapper keeps the
/// target's arity. Arguments must be hashable at call time.
pub fn memoize(args: Vec<Value>) -> Result<Value, Flow> {
    let target = as_function(&one(args))?;
    Ok(Value::function(FunctionValue::Memoized {
        target,
        cache: RefCell::new(HashMap::new()),
    }))
}

/// Space-joined rendering to the console sink; zero arguments emit
/// nothing.
pub fn puts(args: Vec<Value>) -> Result<Value, Flow> {
    if !args.is_empty() {
        let message = args
            .iter()
            .map(Value::display_raw)
            .collect::<Vec<_>>()
            .join(" ");
        console::emit(&message);
    }
    Ok(Value::Nil)
}

/// File contents, or `Nil` on absence; `aoc://` paths hit the puzzle-input
/// provider.
pub fn read(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let path = as_str(&one(args))?;
    Ok(m.io()
        .read(&path)
        .map(Value::string)
        .unwrap_or(Value::Nil))
}
