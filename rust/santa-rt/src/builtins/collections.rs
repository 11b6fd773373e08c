//! Collection accessors and editors over the persistent structures.

use super::{as_function, as_int, fail, one, three, two};
use crate::cursor::Cursor;
use crate::machine::{Flow, Machine};
use santa_core::error::RuntimeError;
use santa_core::ops::{self};
use santa_core::value::{RangeValue, Value};
use std::cmp::Ordering;
use unicode_segmentation::UnicodeSegmentation;

pub fn size(args: Vec<Value>) -> Result<Value, Flow> {
    let value = one(args);
    let count = match &value {
        Value::Str(s) => s.graphemes(true).count(),
        Value::List(l) => l.len(),
        Value::Set(s) => s.len(),
        Value::Dict(d) => d.len(),
        Value::Range(RangeValue::Exclusive(a, b)) => a.abs_diff(*b) as usize,
        Value::Range(RangeValue::Inclusive(a, b)) => a.abs_diff(*b) as usize + 1,
        Value::Range(RangeValue::From(_)) => {
            return Err(fail("Cannot get the size of an unbounded Range".to_string()))
        }
        other => {
            return Err(fail(format!(
                "Cannot get the size of {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(count as i64))
}

pub fn keys(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        Value::Dict(d) => Ok(Value::List(d.keys().cloned().collect())),
        other => Err(fail(format!("Cannot get the keys of {}", other.type_name()))),
    }
}

pub fn values(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        Value::Dict(d) => Ok(Value::List(d.values().cloned().collect())),
        other => Err(fail(format!(
            "Cannot get the values of {}",
            other.type_name()
        ))),
    }
}

pub fn push(args: Vec<Value>) -> Result<Value, Flow> {
    let (value, coll) = two(args);
    match coll {
        Value::List(mut items) => {
            items.push_back(value);
            Ok(Value::List(items))
        }
        Value::Set(mut items) => {
            if !value.is_hashable() {
                return Err(fail(format!("Cannot hash {}", value.type_name())));
            }
            items.insert(value);
            Ok(Value::Set(items))
        }
        other => Err(fail(format!("Cannot push onto {}", other.type_name()))),
    }
}

/// `update(key, fn, dict|list)`: the function receives the current value
/// (`Nil` for an absent dictionary key).
pub fn update(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (key, f, coll) = three(args);
    let f = as_function(&f)?;
    match coll {
        Value::Dict(mut d) => {
            if !key.is_hashable() {
                return Err(fail(format!("Cannot hash {}", key.type_name())));
            }
            let current = d.get(&key).cloned().unwrap_or(Value::Nil);
            let updated = m.call_function(&f, vec![current])?;
            d.insert(key, updated);
            Ok(Value::Dict(d))
        }
        Value::List(mut items) => {
            let index = as_int(&key)?;
            let Some(resolved) = ops::resolve_index(index, items.len()) else {
                return Err(fail(format!("Index {index} is out of bounds")));
            };
            let current = items[resolved].clone();
            let updated = m.call_function(&f, vec![current])?;
            items.set(resolved, updated);
            Ok(Value::List(items))
        }
        other => Err(fail(format!("Cannot update {}", other.type_name()))),
    }
}

/// `assoc(key, value, dict|list)`; a list index equal to the length
/// appends.
pub fn assoc(args: Vec<Value>) -> Result<Value, Flow> {
    let (key, value, coll) = three(args);
    match coll {
        Value::Dict(mut d) => {
            if !key.is_hashable() {
                return Err(fail(format!("Cannot hash {}", key.type_name())));
            }
            d.insert(key, value);
            Ok(Value::Dict(d))
        }
        Value::List(mut items) => {
            let index = as_int(&key)?;
            if index == items.len() as i64 {
                items.push_back(value);
                return Ok(Value::List(items));
            }
            let Some(resolved) = ops::resolve_index(index, items.len()) else {
                return Err(fail(format!("Index {index} is out of bounds")));
            };
            items.set(resolved, value);
            Ok(Value::List(items))
        }
        other => Err(fail(format!("Cannot update {}", other.type_name()))),
    }
}

/// Function form of indexing; total like `t[k]`.
pub fn get(args: Vec<Value>) -> Result<Value, Flow> {
    let (key, coll) = two(args);
    ops::index(&coll, &key).map_err(Flow::Error)
}

pub fn contains(args: Vec<Value>) -> Result<Value, Flow> {
    let (needle, coll) = two(args);
    let found = match &coll {
        Value::List(items) => items.iter().any(|item| item == &needle),
        Value::Set(items) => items.contains(&needle),
        Value::Dict(d) => d.contains_key(&needle),
        Value::Str(s) => match &needle {
            Value::Str(sub) => s.contains(&**sub),
            other => {
                return Err(fail(format!(
                    "Cannot search a String for {}",
                    other.type_name()
                )))
            }
        },
        other => {
            return Err(fail(format!(
                "Cannot search {} for {}",
                other.type_name(),
                needle.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

pub fn reverse(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        Value::List(items) => Ok(Value::List(items.iter().rev().cloned().collect())),
        Value::Str(s) => {
            let reversed: String = s.graphemes(true).rev().collect();
            Ok(Value::string(reversed))
        }
        other => Err(fail(format!("Cannot reverse {}", other.type_name()))),
    }
}

pub fn last(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        coll @ (Value::List(_) | Value::Str(_)) => {
            ops::index(&coll, &Value::Int(-1)).map_err(Flow::Error)
        }
        other => Err(fail(format!(
            "Cannot get the last element of {}",
            other.type_name()
        ))),
    }
}

pub fn second(args: Vec<Value>) -> Result<Value, Flow> {
    match one(args) {
        coll @ (Value::List(_) | Value::Str(_)) => {
            ops::index(&coll, &Value::Int(1)).map_err(Flow::Error)
        }
        other => Err(fail(format!(
            "Cannot get the second element of {}",
            other.type_name()
        ))),
    }
}

fn sorted_by<F>(items: Vec<Value>, mut key_compare: F) -> Result<Vec<Value>, Flow>
where
    F: FnMut(&Value, &Value) -> Result<Ordering, RuntimeError>,
{
    let mut failure: Option<RuntimeError> = None;
    let mut items = items;
    items.sort_by(|a, b| match key_compare(a, b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(Flow::Error(err)),
        None => Ok(items),
    }
}

pub fn sort(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let coll = one(args);
    let mut cursor = Cursor::new(&coll)?;
    let items: Vec<Value> = cursor.collect(m)?.into_iter().collect();
    let sorted = sorted_by(items, ops::compare)?;
    Ok(Value::List(sorted.into_iter().collect()))
}

/// `sort_by(f, coll)` orders by the key function's result.
pub fn sort_by(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (f, coll) = two(args);
    let f = as_function(&f)?;
    let mut cursor = Cursor::new(&coll)?;
    let items: Vec<Value> = cursor.collect(m)?.into_iter().collect();
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let key = m.call_function(&f, vec![item.clone()])?;
        keyed.push(Value::List(im::Vector::from(vec![key, item])));
    }
    let sorted = sorted_by(keyed, |a, b| {
        let (Value::List(a), Value::List(b)) = (a, b) else {
            unreachable!("keyed pairs");
        };
        ops::compare(&a[0], &b[0])
    })?;
    Ok(Value::List(
        sorted
            .into_iter()
            .map(|pair| {
                let Value::List(pair) = pair else {
                    unreachable!("keyed pairs");
                };
                pair[1].clone()
            })
            .collect(),
    ))
}

pub fn min(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    extremum(m, args, Ordering::Less)
}

pub fn max(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    extremum(m, args, Ordering::Greater)
}

fn extremum(m: &mut Machine, args: Vec<Value>, keep: Ordering) -> Result<Value, Flow> {
    let coll = one(args);
    let mut cursor = Cursor::new(&coll)?;
    let mut best: Option<Value> = None;
    while let Some(item) = cursor.next(m)? {
        best = Some(match best {
            None => item,
            Some(current) => {
                if ops::compare(&item, &current).map_err(Flow::Error)? == keep {
                    item
                } else {
                    current
                }
            }
        });
    }
    Ok(best.unwrap_or(Value::Nil))
}
