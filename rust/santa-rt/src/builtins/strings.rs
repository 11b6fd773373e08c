//! String plumbing: splitting, joining, grapheme access, and the regex
//! helpers.

use super::{as_str, one, two};
use crate::cursor::Cursor;
use crate::machine::{Flow, Machine};
use im::Vector;
use santa_core::value::Value;
use unicode_segmentation::UnicodeSegmentation;

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

pub fn lines(args: Vec<Value>) -> Result<Value, Flow> {
    let s = as_str(&one(args))?;
    let lines: Vector<Value> = normalize_newlines(&s)
        .lines()
        .map(Value::string)
        .collect();
    Ok(Value::List(lines))
}

pub fn split(args: Vec<Value>) -> Result<Value, Flow> {
    let (separator, s) = two(args);
    let separator = as_str(&separator)?;
    let s = as_str(&s)?;
    if separator.is_empty() {
        return chars(vec![Value::Str(s)]);
    }
    let parts: Vector<Value> = s.split(&*separator).map(Value::string).collect();
    Ok(Value::List(parts))
}

pub fn join(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (separator, coll) = two(args);
    let separator = as_str(&separator)?;
    let mut cursor = Cursor::new(&coll)?;
    let mut parts: Vec<String> = Vec::new();
    while let Some(item) = cursor.next(m)? {
        parts.push(item.display_raw());
    }
    Ok(Value::string(parts.join(&separator)))
}

pub fn chars(args: Vec<Value>) -> Result<Value, Flow> {
    let s = as_str(&one(args))?;
    let graphemes: Vector<Value> = s.graphemes(true).map(Value::string).collect();
    Ok(Value::List(graphemes))
}

/// Signed integer substrings, in order, skipping everything else.
pub fn ints(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let s = as_str(&one(args))?;
    let pattern = m.regex(r"-?\d+").map_err(Flow::Error)?;
    let mut out = Vector::new();
    for found in pattern.find_iter(&s) {
        if let Ok(n) = found.as_str().parse::<i64>() {
            out.push_back(Value::Int(n));
        }
    }
    Ok(Value::List(out))
}

/// Capture groups of the first match (the whole match when the pattern has
/// no groups); `[]` when nothing matches.
pub fn regex_match(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (pattern, s) = two(args);
    let pattern = m.regex(&as_str(&pattern)?).map_err(Flow::Error)?;
    let s = as_str(&s)?;
    let Some(captures) = pattern.captures(&s) else {
        return Ok(Value::List(Vector::new()));
    };
    if captures.len() == 1 {
        let whole = captures.get(0).expect("capture zero always present");
        return Ok(Value::List(Vector::from(vec![Value::string(
            whole.as_str(),
        )])));
    }
    let groups: Vector<Value> = captures
        .iter()
        .skip(1)
        .map(|group| match group {
            Some(found) => Value::string(found.as_str()),
            None => Value::Nil,
        })
        .collect();
    Ok(Value::List(groups))
}

/// Every whole match in order.
pub fn regex_match_all(m: &mut Machine, args: Vec<Value>) -> Result<Value, Flow> {
    let (pattern, s) = two(args);
    let pattern = m.regex(&as_str(&pattern)?).map_err(Flow::Error)?;
    let s = as_str(&s)?;
    let matches: Vector<Value> = pattern
        .find_iter(&s)
        .map(|found| Value::string(found.as_str()))
        .collect();
    Ok(Value::List(matches))
}
