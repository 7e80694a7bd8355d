//! Conversion between graph values and `serde_json` trees.
//!
//! JSON is a tree format: [`to_json`] rejects cycles outright, and values
//! JSON has no notion of follow the usual serialization rules — `undefined`
//! and atom fields are skipped inside objects and become `null` inside
//! arrays, big integers and weak containers are rejected.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::{Composite, Value};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("value graph contains a cycle")]
    Cyclic,
    #[error("{kind} value cannot be represented as JSON")]
    Unrepresentable { kind: &'static str },
}

/// Builds a graph value from a JSON tree. Object field order is preserved.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) => Value::Num(f),
            None => Value::Null,
        },
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => Value::arr(items.iter().map(from_json).collect()),
        serde_json::Value::Object(fields) => {
            let mut map = IndexMap::with_capacity(fields.len());
            for (key, val) in fields {
                map.insert(key.clone(), from_json(val));
            }
            Value::obj_from(map)
        }
    }
}

/// Renders an acyclic graph value as a JSON tree.
pub fn to_json(value: &Value) -> Result<serde_json::Value, GraphError> {
    let mut visiting = HashSet::new();
    match convert(value, &mut visiting)? {
        Some(json) => Ok(json),
        None => Err(GraphError::Unrepresentable {
            kind: value.kind(),
        }),
    }
}

/// Integral doubles render as JSON integers; NaN and infinities serialize
/// as `null`, as JSON.stringify does. The range check is half-open because
/// `i64::MAX as f64` rounds up to 2^63, which does not fit an `i64`.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&n) {
        return serde_json::Value::Number(serde_json::Number::from(n as i64));
    }
    match serde_json::Number::from_f64(n) {
        Some(num) => serde_json::Value::Number(num),
        None => serde_json::Value::Null,
    }
}

/// `None` marks a value that is skipped in object position (`undefined`,
/// atoms) rather than being an error.
fn convert(
    value: &Value,
    visiting: &mut HashSet<usize>,
) -> Result<Option<serde_json::Value>, GraphError> {
    match value {
        Value::Undefined | Value::Atom(_) => Ok(None),
        Value::Null => Ok(Some(serde_json::Value::Null)),
        Value::Bool(b) => Ok(Some(serde_json::Value::Bool(*b))),
        Value::Num(n) => Ok(Some(number_to_json(*n))),
        Value::BigInt(_) => Err(GraphError::Unrepresentable { kind: "bigint" }),
        Value::Str(s) => Ok(Some(serde_json::Value::String(s.to_string()))),
        Value::Composite(c) => {
            if !visiting.insert(c.id()) {
                return Err(GraphError::Cyclic);
            }
            let json = match &*c.borrow() {
                Composite::Obj(map) => {
                    let mut out = serde_json::Map::new();
                    for (key, val) in map {
                        if let Some(converted) = convert(val, visiting)? {
                            out.insert(key.clone(), converted);
                        }
                    }
                    serde_json::Value::Object(out)
                }
                Composite::Arr(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(
                            convert(item, visiting)?.unwrap_or(serde_json::Value::Null),
                        );
                    }
                    serde_json::Value::Array(out)
                }
                Composite::Set(_) | Composite::Map(_) => {
                    return Err(GraphError::Unrepresentable {
                        kind: c.borrow().kind(),
                    })
                }
                Composite::WeakSet(_) | Composite::WeakMap(_) => {
                    return Err(GraphError::Unrepresentable {
                        kind: c.borrow().kind(),
                    })
                }
            };
            visiting.remove(&c.id());
            Ok(Some(json))
        }
    }
}
