//! Uniform pull-iteration over sequence-like values.
//!
//! A `Cursor` walks lists, strings (by grapheme), ranges, sets,
//! dictionaries (as `[key, value]` pairs), and lazy sequences. Lazy links
//! that apply user functions pull through the machine, so evaluation is
//! driven strictly by the consumer.

use crate::machine::{Flow, Machine};
use im::Vector;
use santa_core::error::RuntimeError;
use santa_core::lazy::LazySequence;
use santa_core::value::{FunctionValue, RangeValue, Value};
use std::rc::Rc;
use unicode_segmentation::UnicodeSegmentation;

pub enum Cursor {
    List {
        items: Vector<Value>,
        idx: usize,
    },
    Str {
        graphemes: Vec<String>,
        idx: usize,
    },
    Range {
        next: i64,
        end: i64,
        inclusive: bool,
        step: i64,
        done: bool,
    },
    RangeFrom {
        next: i64,
    },
    Iterate {
        current: Value,
        f: Rc<FunctionValue>,
        seeded: bool,
    },
    Repeat {
        value: Value,
    },
    Cycle {
        items: Vector<Value>,
        idx: usize,
    },
    Map {
        f: Rc<FunctionValue>,
        inner: Box<Cursor>,
    },
    Filter {
        f: Rc<FunctionValue>,
        inner: Box<Cursor>,
    },
    Skip {
        remaining: usize,
        inner: Box<Cursor>,
    },
    Cons {
        head: Option<Value>,
        tail: Box<Cursor>,
    },
    Zip {
        sources: Vec<Cursor>,
    },
}

impl Cursor {
    pub fn new(value: &Value) -> Result<Cursor, RuntimeError> {
        match value {
            Value::List(items) => Ok(Cursor::List {
                items: items.clone(),
                idx: 0,
            }),
            Value::Str(s) => Ok(Cursor::Str {
                graphemes: s.graphemes(true).map(str::to_string).collect(),
                idx: 0,
            }),
            Value::Set(set) => Ok(Cursor::List {
                items: set.iter().cloned().collect(),
                idx: 0,
            }),
            Value::Dict(dict) => Ok(Cursor::List {
                items: dict
                    .iter()
                    .map(|(k, v)| Value::List(Vector::from(vec![k.clone(), v.clone()])))
                    .collect(),
                idx: 0,
            }),
            Value::Range(range) => Ok(match *range {
                RangeValue::Exclusive(start, end) => Cursor::Range {
                    next: start,
                    end,
                    inclusive: false,
                    step: if start > end { -1 } else { 1 },
                    done: false,
                },
                RangeValue::Inclusive(start, end) => Cursor::Range {
                    next: start,
                    end,
                    inclusive: true,
                    step: if start > end { -1 } else { 1 },
                    done: false,
                },
                RangeValue::From(start) => Cursor::RangeFrom { next: start },
            }),
            Value::Lazy(seq) => Cursor::from_lazy(seq.as_ref()),
            other => Err(RuntimeError::new(format!(
                "Cannot iterate over {}",
                other.type_name()
            ))),
        }
    }

    fn from_lazy(seq: &LazySequence) -> Result<Cursor, RuntimeError> {
        Ok(match seq {
            LazySequence::Iterate { seed, f } => Cursor::Iterate {
                current: seed.clone(),
                f: Rc::clone(f),
                seeded: false,
            },
            LazySequence::Repeat(value) => Cursor::Repeat {
                value: value.clone(),
            },
            LazySequence::Cycle(items) => Cursor::Cycle {
                items: items.clone(),
                idx: 0,
            },
            LazySequence::Map { f, inner } => Cursor::Map {
                f: Rc::clone(f),
                inner: Box::new(Cursor::new(inner.as_ref())?),
            },
            LazySequence::Filter { f, inner } => Cursor::Filter {
                f: Rc::clone(f),
                inner: Box::new(Cursor::new(inner.as_ref())?),
            },
            LazySequence::Skip { n, inner } => Cursor::Skip {
                remaining: *n,
                inner: Box::new(Cursor::new(inner.as_ref())?),
            },
            LazySequence::Cons { head, tail } => Cursor::Cons {
                head: Some(head.clone()),
                tail: Box::new(Cursor::new(tail.as_ref())?),
            },
            LazySequence::Zip { sources } => Cursor::Zip {
                sources: sources
                    .iter()
                    .map(Cursor::new)
                    .collect::<Result<Vec<_>, _>>()?,
            },
        })
    }

    pub fn next(&mut self, machine: &mut Machine) -> Result<Option<Value>, Flow> {
        match self {
            Cursor::List { items, idx } => {
                let item = items.get(*idx).cloned();
                if item.is_some() {
                    *idx += 1;
                }
                Ok(item)
            }
            Cursor::Str { graphemes, idx } => {
                let item = graphemes.get(*idx).map(|g| Value::string(g.clone()));
                if item.is_some() {
                    *idx += 1;
                }
                Ok(item)
            }
            Cursor::Range {
                next,
                end,
                inclusive,
                step,
                done,
            } => {
                if *done {
                    return Ok(None);
                }
                if *inclusive {
                    let value = *next;
                    if value == *end {
                        *done = true;
                    } else {
                        *next += *step;
                    }
                    Ok(Some(Value::Int(value)))
                } else {
                    if *next == *end {
                        *done = true;
                        return Ok(None);
                    }
                    let value = *next;
                    *next += *step;
                    Ok(Some(Value::Int(value)))
                }
            }
            Cursor::RangeFrom { next } => {
                let value = *next;
                *next += 1;
                Ok(Some(Value::Int(value)))
            }
            Cursor::Iterate { current, f, seeded } => {
                if !*seeded {
                    *seeded = true;
                    return Ok(Some(current.clone()));
                }
                let stepped = machine.call_function(f, vec![current.clone()])?;
                *current = stepped.clone();
                Ok(Some(stepped))
            }
            Cursor::Repeat { value } => Ok(Some(value.clone())),
            Cursor::Cycle { items, idx } => {
                if items.is_empty() {
                    return Ok(None);
                }
                let item = items[*idx % items.len()].clone();
                *idx += 1;
                Ok(Some(item))
            }
            Cursor::Map { f, inner } => match inner.next(machine)? {
                Some(item) => Ok(Some(machine.call_function(f, vec![item])?)),
                None => Ok(None),
            },
            Cursor::Filter { f, inner } => loop {
                let Some(item) = inner.next(machine)? else {
                    return Ok(None);
                };
                if machine.call_function(f, vec![item.clone()])?.is_truthy() {
                    return Ok(Some(item));
                }
            },
            Cursor::Skip { remaining, inner } => {
                while *remaining > 0 {
                    *remaining -= 1;
                    if inner.next(machine)?.is_none() {
                        return Ok(None);
                    }
                }
                inner.next(machine)
            }
            Cursor::Cons { head, tail } => match head.take() {
                Some(value) => Ok(Some(value)),
                None => tail.next(machine),
            },
            Cursor::Zip { sources } => {
                let mut row = Vector::new();
                for source in sources {
                    match source.next(machine)? {
                        Some(item) => row.push_back(item),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::List(row)))
            }
        }
    }

    /// Drain the whole cursor into a list. Diverges on unbounded input, so
    /// callers gate with [`is_bounded`] where that matters.
    pub fn collect(&mut self, machine: &mut Machine) -> Result<Vector<Value>, Flow> {
        let mut out = Vector::new();
        while let Some(item) = self.next(machine)? {
            out.push_back(item);
        }
        Ok(out)
    }
}

/// Whether a sequence-like value is known to terminate.
pub fn is_bounded(value: &Value) -> bool {
    match value {
        Value::Range(RangeValue::From(_)) => false,
        Value::Lazy(seq) => lazy_is_bounded(seq.as_ref()),
        _ => true,
    }
}

fn lazy_is_bounded(seq: &LazySequence) -> bool {
    match seq {
        LazySequence::Iterate { .. } | LazySequence::Repeat(_) => false,
        LazySequence::Cycle(items) => items.is_empty(),
        LazySequence::Map { inner, .. }
        | LazySequence::Filter { inner, .. }
        | LazySequence::Skip { inner, .. } => is_bounded(inner.as_ref()),
        LazySequence::Cons { tail, .. } => is_bounded(tail.as_ref()),
        LazySequence::Zip { sources } => sources.iter().any(is_bounded),
    }
}
