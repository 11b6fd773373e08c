//! Runtime values.
//!
//! Collections are the persistent structures from `im` (a bit-mapped vector
//! trie for lists, hash-array-mapped tries for sets and dictionaries), so
//! every update returns a new version sharing structure with the old. Values
//! clone cheaply; nothing here mutates in place.

use crate::builtins::BuiltinId;
use crate::lazy::LazySequence;
use im::{HashMap, HashSet, Vector};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Str(Rc<str>),
    List(Vector<Value>),
    Set(HashSet<Value>),
    Dict(HashMap<Value, Value>),
    Range(RangeValue),
    Lazy(Rc<LazySequence>),
    Function(Rc<FunctionValue>),
}

/// The three range shapes. Bounds are always integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeValue {
    Exclusive(i64, i64),
    Inclusive(i64, i64),
    From(i64),
}

/// First-class functions. `Closure` is the only variant produced by emitted
/// code; the others are built by the runtime (`memoize`, partial
/// application, `>>`).
pub enum FunctionValue {
    Builtin(BuiltinId),
    Closure {
        proto: usize,
        arity: u8,
        captures: Vec<Rc<RefCell<Value>>>,
    },
    Partial {
        target: Rc<FunctionValue>,
        applied: Vec<Value>,
    },
    Composed {
        first: Rc<FunctionValue>,
        second: Rc<FunctionValue>,
    },
    Memoized {
        target: Rc<FunctionValue>,
        cache: RefCell<std::collections::HashMap<Vec<Value>, Value>>,
    },
}

impl FunctionValue {
    /// Remaining parameter count; `-1` for variadic.
    pub fn arity(&self) -> i32 {
        match self {
            FunctionValue::Builtin(id) => id.arity(),
            FunctionValue::Closure { arity, .. } => i32::from(*arity),
            FunctionValue::Partial { target, applied } => match target.arity() {
                -1 => -1,
                n => n - applied.len() as i32,
            },
            FunctionValue::Composed { first, .. } => first.arity(),
            FunctionValue::Memoized { target, .. } => target.arity(),
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Captures may contain the function itself; never walk them here.
        match self {
            FunctionValue::Builtin(id) => write!(f, "Builtin({id})"),
            FunctionValue::Closure { proto, arity, .. } => {
                write!(f, "Closure(proto {proto}, arity {arity})")
            }
            FunctionValue::Partial { applied, .. } => write!(f, "Partial({} applied)", applied.len()),
            FunctionValue::Composed { .. } => write!(f, "Composed"),
            FunctionValue::Memoized { .. } => write!(f, "Memoized"),
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::from(s.into()))
    }

    pub fn function(f: FunctionValue) -> Value {
        Value::Function(Rc::new(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Decimal(_) => "Decimal",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Set(_) => "Set",
            Value::Dict(_) => "Dictionary",
            Value::Range(_) => "Range",
            Value::Lazy(_) => "LazySequence",
            Value::Function(_) => "Function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Decimal(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Range(_) | Value::Lazy(_) | Value::Function(_) => true,
        }
    }

    /// Whether the value may be a set element, dictionary key, or memoize
    /// cache key.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Decimal(_) | Value::Str(_) => true,
            Value::List(l) => l.iter().all(Value::is_hashable),
            Value::Set(_) => true,
            Value::Dict(d) => d.iter().all(|(k, v)| k.is_hashable() && v.is_hashable()),
            Value::Range(_) | Value::Lazy(_) | Value::Function(_) => false,
        }
    }

    /// Rendering used by `puts`: top-level strings print without quotes.
    pub fn display_raw(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

/// Normalize `-0.0` so equal decimals always share a bit pattern; `NaN`
/// therefore equals itself, keeping the equal-implies-equal-hash invariant
/// for container keys.
fn decimal_bits(d: f64) -> u64 {
    if d == 0.0 {
        0.0f64.to_bits()
    } else {
        d.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => decimal_bits(*a) == decimal_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Lazy(a), Value::Lazy(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Int(n) => {
                state.write_u8(2);
                n.hash(state);
            }
            Value::Decimal(d) => {
                state.write_u8(3);
                decimal_bits(*d).hash(state);
            }
            Value::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Value::List(l) => {
                state.write_u8(5);
                for item in l {
                    item.hash(state);
                }
            }
            Value::Set(s) => {
                state.write_u8(6);
                // Equal sets share trie layout, so iteration order matches.
                for item in s {
                    item.hash(state);
                }
            }
            Value::Dict(d) => {
                state.write_u8(7);
                for (k, v) in d {
                    k.hash(state);
                    v.hash(state);
                }
            }
            // Unhashable variants are rejected before insertion; the
            // discriminant keeps this impl total.
            Value::Range(_) => state.write_u8(8),
            Value::Lazy(_) => state.write_u8(9),
            Value::Function(_) => state.write_u8(10),
        }
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeValue::Exclusive(a, b) => write!(f, "{a}..{b}"),
            RangeValue::Inclusive(a, b) => write!(f, "{a}..={b}"),
            RangeValue::From(a) => write!(f, "{a}.."),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d:?}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::List(l) => {
                let parts: Vec<String> = l.iter().map(Value::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Set(s) => {
                let mut parts: Vec<String> = s.iter().map(Value::to_string).collect();
                parts.sort();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Dict(d) => {
                let mut parts: Vec<String> =
                    d.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                parts.sort();
                write!(f, "#{{{}}}", parts.join(", "))
            }
            Value::Range(r) => write!(f, "{r}"),
            Value::Lazy(_) => f.write_str("<lazy sequence>"),
            Value::Function(_) => f.write_str("<function>"),
        }
    }
}
