//! Sequence transformers and consumers. Collection parameters come last so
//! curried pipelines read naturally; transformers stay lazy over unbounded
//! sources and materialize otherwise.

use super::{as_function, as_int, fail, one, three, two};
use crate::cursor::{is_bounded, Cursor};
use crate::machine::{Flow, Machine};
use im::Vector;
use santa_core::lazy::LazySequence;
use santa_core::ops::{self, BinaryOp};
use santa_core::value::{RangeValue, Value};

fn lazy_input(value: &Value) -> bool {
    matches!(value, Value::Lazy(_) | Value::Range(RangeValue::From(_)))
}

pub fn map(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    match coll {
        // Dictionaries map their values, keeping keys.
        Value::Dict(d) => {
            let mut out = d.clone();
            for (k, v) in &d {
                let mapped = m.call_function(&f, vec![v.clone()])?;
                out.insert(k.clone(), mapped);
            }
            Ok(Value::Dict(out))
        }
        coll if lazy_input(&coll) => Ok(LazySequence::Map {
            f,
            inner: Box::new(coll),
        }
        .into_value()),
        coll => {
            let mut cursor = Cursor::new(&coll)?;
            let mut out = Vector::new();
            while let Some(item) = cursor.next(m)? {
                out.push_back(m.call_function(&f, vec![item])?);
            }
            Ok(Value::List(out))
        }
    }
}

pub fn filter(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    match coll {
        Value::Dict(d) => {
            let mut out = d.clone();
            for (k, v) in &d {
                if !m.call_function(&f, vec![v.clone()])?.is_truthy() {
                    out.remove(k);
                }
            }
            Ok(Value::Dict(out))
        }
        Value::Set(s) => {
            let mut out = s.clone();
            for item in &s {
                if !m.call_function(&f, vec![item.clone()])?.is_truthy() {
                    out.remove(item);
                }
            }
            Ok(Value::Set(out))
        }
        coll if lazy_input(&coll) => Ok(LazySequence::Filter {
            f,
            inner: Box::new(coll),
        }
        .into_value()),
        coll => {
            let mut cursor = Cursor::new(&coll)?;
            let mut out = Vector::new();
            while let Some(item) = cursor.next(m)? {
                if m.call_function(&f, vec![item.clone()])?.is_truthy() {
                    out.push_back(item);
                }
            }
            Ok(Value::List(out))
        }
    }
}

pub fn filter_map(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let mut out = Vector::new();
    while let Some(item) = cursor.next(m)? {
        let mapped = m.call_function(&f, vec![item])?;
        if mapped != Value::Nil {
            out.push_back(mapped);
        }
    }
    Ok(Value::List(out))
}

pub fn flat_map(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let mut out = Vector::new();
    while let Some(item) = cursor.next(m)? {
        match m.call_function(&f, vec![item])? {
            Value::List(items) => out.append(items),
            other => out.push_back(other),
        }
    }
    Ok(Value::List(out))
}

pub fn fold(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (init, f, coll) = three(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let mut acc = init;
    loop {
        let item = match cursor.next(m) {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(acc),
            Err(Flow::Break(v)) => return Ok(v),
            Err(e) => return Err(e),
        };
        acc = match m.call_function(&f, vec![acc, item]) {
            Ok(acc) => acc,
            Err(Flow::Break(v)) => return Ok(v),
            Err(e) => return Err(e),
        };
    }
}

/// Scanning fold: the list of successive accumulator states.
pub fn fold_s(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (init, f, coll) = three(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let mut acc = init;
    let mut states = Vector::new();
    loop {
        let item = match cursor.next(m) {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(Value::List(states)),
            Err(Flow::Break(_)) => return Ok(Value::List(states)),
            Err(e) => return Err(e),
        };
        acc = match m.call_function(&f, vec![acc.clone(), item]) {
            Ok(acc) => acc,
            Err(Flow::Break(_)) => return Ok(Value::List(states)),
            Err(e) => return Err(e),
        };
        states.push_back(acc.clone());
    }
}

pub fn reduce(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let Some(mut acc) = cursor.next(m)? else {
        return Ok(Value::Nil);
    };
    loop {
        let item = match cursor.next(m) {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(acc),
            Err(Flow::Break(v)) => return Ok(v),
            Err(e) => return Err(e),
        };
        acc = match m.call_function(&f, vec![acc, item]) {
            Ok(acc) => acc,
            Err(Flow::Break(v)) => return Ok(v),
            Err(e) => return Err(e),
        };
    }
}

pub fn each(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    loop {
        let item = match cursor.next(m) {
            Ok(Some(item)) => item,
            Ok(None) | Err(Flow::Break(_)) => return Ok(Value::Nil),
            Err(e) => return Err(e),
        };
        match m.call_function(&f, vec![item]) {
            Ok(_) => {}
            Err(Flow::Break(_)) => return Ok(Value::Nil),
            Err(e) => return Err(e),
        }
    }
}

pub fn find(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    loop {
        let item = match cursor.next(m) {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(Value::Nil),
            Err(Flow::Break(v)) => return Ok(v),
            Err(e) => return Err(e),
        };
        if m.call_function(&f, vec![item.clone()])?.is_truthy() {
            return Ok(item);
        }
    }
}

/// `take` always materializes.
pub fn take(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (n, coll) = two(args);
    let n = as_int(&n)?.max(0) as usize;
    let mut cursor = Cursor::new(&coll)?;
    let mut out = Vector::new();
    while out.len() < n {
        match cursor.next(m)? {
            Some(item) => out.push_back(item),
            None => break,
        }
    }
    Ok(Value::List(out))
}

pub fn skip(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (n, coll) = two(args);
    let n = as_int(&n)?.max(0) as usize;
    if !is_bounded(&coll) {
        return Ok(LazySequence::Skip {
            n,
            inner: Box::new(coll),
        }
        .into_value());
    }
    let mut cursor = Cursor::new(&coll)?;
    for _ in 0..n {
        if cursor.next(m)?.is_none() {
            break;
        }
    }
    Ok(Value::List(cursor.collect(m)?))
}

/// Pair up two sequences, the primary (last) collection's element first.
/// Any finite source materializes the result; all-infinite input stays
/// lazy.
pub fn zip(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (with, source) = two(args);
    if !is_bounded(&with) && !is_bounded(&source) {
        return Ok(LazySequence::Zip {
            sources: vec![source, with],
        }
        .into_value());
    }
    let mut left = Cursor::new(&source)?;
    let mut right = Cursor::new(&with)?;
    let mut out = Vector::new();
    loop {
        let (Some(a), Some(b)) = (left.next(m)?, right.next(m)?) else {
            return Ok(Value::List(out));
        };
        out.push_back(Value::List(Vector::from(vec![a, b])));
    }
}

pub fn iterate(args: Vec<Value>) -> Result<Value, Flow> {
    let (seed, f) = two(args);
    let f = as_function(&f)?;
    Ok(LazySequence::Iterate { seed, f }.into_value())
}

pub fn repeat(args: Vec<Value>) -> Result<Value, Flow> {
    Ok(LazySequence::Repeat(one(args)).into_value())
}

pub fn cycle(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let coll = one(args);
    if !is_bounded(&coll) {
        return Err(fail("Cannot cycle over an unbounded sequence".to_string()));
    }
    let mut cursor = Cursor::new(&coll)?;
    Ok(LazySequence::Cycle(cursor.collect(m)?).into_value())
}

pub fn cons(args: Vec<Value>) -> Result<Value, Flow> {
    let (head, tail) = two(args);
    // Validate the tail is sequence-like up front.
    Cursor::new(&tail)?;
    Ok(LazySequence::Cons {
        head,
        tail: Box::new(tail),
    }
    .into_value())
}

pub fn first(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let coll = one(args);
    let mut cursor = Cursor::new(&coll)?;
    Ok(cursor.next(m)?.unwrap_or(Value::Nil))
}

pub fn rest(args: Vec<Value>) -> Result<Value, Flow> {
    let coll = one(args);
    match coll {
        Value::List(mut items) => {
            if !items.is_empty() {
                items.pop_front();
            }
            Ok(Value::List(items))
        }
        Value::Str(s) => {
            use unicode_segmentation::UnicodeSegmentation;
            let rest: String = s.graphemes(true).skip(1).collect();
            Ok(Value::string(rest))
        }
        Value::Range(RangeValue::From(a)) => Ok(Value::Range(RangeValue::From(a + 1))),
        Value::Range(RangeValue::Exclusive(a, b)) => {
            if a == b {
                Ok(Value::List(Vector::new()))
            } else {
                let step = if a > b { -1 } else { 1 };
                Ok(Value::Range(RangeValue::Exclusive(a + step, b)))
            }
        }
        Value::Range(RangeValue::Inclusive(a, b)) => {
            if a == b {
                Ok(Value::List(Vector::new()))
            } else {
                let step = if a > b { -1 } else { 1 };
                Ok(Value::Range(RangeValue::Inclusive(a + step, b)))
            }
        }
        lazy @ Value::Lazy(_) => Ok(LazySequence::Skip {
            n: 1,
            inner: Box::new(lazy),
        }
        .into_value()),
        other => Err(fail(format!("Cannot get the rest of {}", other.type_name()))),
    }
}

pub fn sum(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let coll = one(args);
    let mut cursor = Cursor::new(&coll)?;
    let mut total = Value::Int(0);
    while let Some(item) = cursor.next(m)? {
        total = ops::binary(BinaryOp::Add, &total, &item).map_err(Flow::Error)?;
    }
    Ok(total)
}
