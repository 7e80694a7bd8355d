//! Diagnostic text rendering for graph values.
//!
//! `Display` renders a value in a JSON-ish single-line form. A composite
//! already on the render stack prints as `[Circular]`, so cyclic graphs
//! render without diverging; weak containers print as opaque markers since
//! their members cannot be enumerated.

use std::fmt;

use crate::value::{Composite, Value};

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendering = Vec::new();
        write_value(f, self, &mut rendering)
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, rendering: &mut Vec<usize>) -> fmt::Result {
    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Num(n) => write!(f, "{n}"),
        Value::BigInt(n) => write!(f, "{n}n"),
        Value::Str(s) => write_quoted(f, s),
        Value::Atom(atom) => write!(f, "Symbol({})", atom.description()),
        Value::Composite(c) => {
            if rendering.contains(&c.id()) {
                return write!(f, "[Circular]");
            }
            rendering.push(c.id());
            let result = match &*c.borrow() {
                Composite::Obj(map) => {
                    write!(f, "{{")?;
                    for (i, (key, val)) in map.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write_quoted(f, key)?;
                        write!(f, ":")?;
                        write_value(f, val, rendering)?;
                    }
                    write!(f, "}}")
                }
                Composite::Arr(items) => write_seq(f, "[", items, "]", rendering),
                Composite::Set(items) => write_seq(f, "Set([", items, "])", rendering),
                Composite::Map(entries) => {
                    write!(f, "Map([")?;
                    for (i, (key, val)) in entries.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "[")?;
                        write_value(f, key, rendering)?;
                        write!(f, ",")?;
                        write_value(f, val, rendering)?;
                        write!(f, "]")?;
                    }
                    write!(f, "])")
                }
                Composite::WeakSet(_) => write!(f, "WeakSet"),
                Composite::WeakMap(_) => write!(f, "WeakMap"),
            };
            rendering.pop();
            result
        }
    }
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[Value],
    close: &str,
    rendering: &mut Vec<usize>,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write_value(f, item, rendering)?;
    }
    write!(f, "{close}")
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in text.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}
