//! Lazy sequence shapes.
//!
//! A `LazySequence` is passive data: a source (or a wrapper around another
//! sequence-like value) that the runtime's cursor drives one element at a
//! time. Nothing is evaluated until a consumer pulls.

use crate::value::{FunctionValue, Value};
use im::Vector;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum LazySequence {
    /// `seed, f(seed), f(f(seed)), …`
    Iterate { seed: Value, f: Rc<FunctionValue> },
    /// The same value forever.
    Repeat(Value),
    /// Endless rotation over a materialized list; empty input yields an
    /// empty sequence.
    Cycle(Vector<Value>),
    /// Element-wise transform over any sequence-like value.
    Map { f: Rc<FunctionValue>, inner: Box<Value> },
    /// Keep elements whose predicate result is truthy.
    Filter { f: Rc<FunctionValue>, inner: Box<Value> },
    /// Drop the first `n` elements.
    Skip { n: usize, inner: Box<Value> },
    /// Prepend a single element.
    Cons { head: Value, tail: Box<Value> },
    /// Pair elements of the sources positionally. Only built when every
    /// source is unbounded; otherwise `zip` materializes eagerly.
    Zip { sources: Vec<Value> },
}

impl LazySequence {
    pub fn into_value(self) -> Value {
        Value::Lazy(Rc::new(self))
    }
}
