//! Polymorphic operator dispatch over [`Value`].
//!
//! Every operator is total over the value sum: unsupported operand types
//! fail with a verb-prefixed `RuntimeError` naming both types. Container
//! lookup is total in the other direction: absent elements are `Nil`,
//! never an error.

use crate::error::RuntimeError;
use crate::value::{FunctionValue, RangeValue, Value};
use im::Vector;
use serde::Serialize;
use std::cmp::Ordering;
use std::rc::Rc;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Compose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => arithmetic("subtract", lhs, rhs, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => mul(lhs, rhs),
        BinaryOp::Div => div(lhs, rhs),
        BinaryOp::Mod => rem(lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt => Ok(Value::Bool(compare(lhs, rhs)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(lhs, rhs)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(lhs, rhs)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(lhs, rhs)? != Ordering::Less)),
        BinaryOp::Compose => compose(lhs, rhs),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Negate => match operand {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::new("Integer overflow")),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            other => Err(RuntimeError::new(format!(
                "Cannot negate {}",
                other.type_name()
            ))),
        },
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => {
            let mut s = a.to_string();
            s.push_str(b);
            Ok(Value::string(s))
        }
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.append(b.clone());
            Ok(Value::List(out))
        }
        (Value::Set(a), Value::Set(b)) => Ok(Value::Set(a.clone().union(b.clone()))),
        (Value::Dict(a), Value::Dict(b)) => {
            // Right-hand entries win on key collisions.
            let mut out = a.clone();
            for (k, v) in b {
                out.insert(k.clone(), v.clone());
            }
            Ok(Value::Dict(out))
        }
        _ => arithmetic("add", lhs, rhs, i64::checked_add, |a, b| a + b),
    }
}

fn mul(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Str(s), Value::Int(n)) => {
            Ok(Value::string(s.repeat((*n).max(0) as usize)))
        }
        (Value::List(l), Value::Int(n)) => {
            let mut out = Vector::new();
            for _ in 0..(*n).max(0) {
                out.append(l.clone());
            }
            Ok(Value::List(out))
        }
        _ => arithmetic("multiply", lhs, rhs, i64::checked_mul, |a, b| a * b),
    }
}

fn div(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::new("Division by zero")),
        _ => arithmetic("divide", lhs, rhs, i64::checked_div, |a, b| a / b),
    }
}

fn rem(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::new("Division by zero")),
        _ => arithmetic("divide", lhs, rhs, i64::checked_rem, |a, b| a % b),
    }
}

/// Numeric dispatch: int pairs stay integral, any decimal operand promotes
/// both sides.
fn arithmetic(
    verb: &str,
    lhs: &Value,
    rhs: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::new("Integer overflow")),
        (Value::Int(a), Value::Decimal(b)) => Ok(Value::Decimal(dec_op(*a as f64, *b))),
        (Value::Decimal(a), Value::Int(b)) => Ok(Value::Decimal(dec_op(*a, *b as f64))),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(Value::Decimal(dec_op(*a, *b))),
        _ => Err(RuntimeError::new(format!(
            "Cannot {verb} {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

/// Ordering for `< <= > >=` and `sort`: numerics cross-compare, strings
/// compare lexicographically, everything else is an error.
pub fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    let incomparable = || {
        RuntimeError::new(format!(
            "Cannot compare {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Int(a), Value::Decimal(b)) => (*a as f64).partial_cmp(b).ok_or_else(incomparable),
        (Value::Decimal(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)).ok_or_else(incomparable),
        (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b).ok_or_else(incomparable),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(incomparable()),
    }
}

fn compose(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Function(f), Value::Function(g)) => Ok(Value::function(FunctionValue::Composed {
            first: Rc::clone(f),
            second: Rc::clone(g),
        })),
        _ => Err(RuntimeError::new(format!(
            "Cannot compose {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

pub fn make_range(start: &Value, end: &Value, inclusive: bool) -> Result<Value, RuntimeError> {
    match (start, end) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Range(if inclusive {
            RangeValue::Inclusive(*a, *b)
        } else {
            RangeValue::Exclusive(*a, *b)
        })),
        _ => Err(RuntimeError::new(format!(
            "Cannot range over {} and {}",
            start.type_name(),
            end.type_name()
        ))),
    }
}

pub fn make_range_from(start: &Value) -> Result<Value, RuntimeError> {
    match start {
        Value::Int(a) => Ok(Value::Range(RangeValue::From(*a))),
        _ => Err(RuntimeError::new(format!(
            "Cannot range over {}",
            start.type_name()
        ))),
    }
}

/// `t[i]`: integer and range indexing of lists and strings (grapheme
/// clusters), keyed lookup of dictionaries, membership test on sets.
pub fn index(target: &Value, idx: &Value) -> Result<Value, RuntimeError> {
    match (target, idx) {
        (Value::List(l), Value::Int(i)) => {
            Ok(resolve_index(*i, l.len())
                .and_then(|i| l.get(i).cloned())
                .unwrap_or(Value::Nil))
        }
        (Value::List(l), Value::Range(r)) => {
            let (start, end) = slice_bounds(*r, l.len());
            Ok(Value::List(l.clone().slice(start..end)))
        }
        (Value::Str(s), Value::Int(i)) => {
            let graphemes: Vec<&str> = s.graphemes(true).collect();
            Ok(resolve_index(*i, graphemes.len())
                .map(|i| Value::string(graphemes[i]))
                .unwrap_or(Value::Nil))
        }
        (Value::Str(s), Value::Range(r)) => {
            let graphemes: Vec<&str> = s.graphemes(true).collect();
            let (start, end) = slice_bounds(*r, graphemes.len());
            Ok(Value::string(graphemes[start..end].concat()))
        }
        (Value::Dict(d), key) => Ok(d.get(key).cloned().unwrap_or(Value::Nil)),
        (Value::Set(s), member) => Ok(Value::Bool(s.contains(member))),
        _ => Err(RuntimeError::new(format!(
            "Cannot index {} with {}",
            target.type_name(),
            idx.type_name()
        ))),
    }
}

/// Map a possibly-negative index onto `0..len`, `None` when out of bounds.
pub fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if i < 0 { len + i } else { i };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// Clamped `[start, end)` bounds of a slice, resolving negative endpoints
/// from the back. A descending range slices nothing.
fn slice_bounds(range: RangeValue, len: usize) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        let len = len as i64;
        let resolved = if i < 0 { len + i } else { i };
        resolved.clamp(0, len) as usize
    };
    let (start, end) = match range {
        RangeValue::Exclusive(a, b) => (clamp(a), clamp(b)),
        RangeValue::Inclusive(a, b) => (clamp(a), clamp(b).saturating_add(1).min(len)),
        RangeValue::From(a) => (clamp(a), len),
    };
    (start, start.max(end))
}
