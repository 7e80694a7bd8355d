//! Cycle-safe structural equality.

use std::collections::HashSet;

use crate::value::{Composite, Value};

/// Performs a deep structural equality check between two graph values.
///
/// Scalars compare by value, objects by key set and per-key recursion,
/// arrays/sets/maps element-wise in order. A pair of composites already
/// under comparison is presumed equal, so cyclic graphs terminate and two
/// structurally-identical cycles compare equal. Weak containers are not
/// enumerable and compare by identity only.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    eq(a, b, &mut visiting)
}

fn eq(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Atom(a), Value::Atom(b)) => a == b,
        (Value::Composite(x), Value::Composite(y)) => {
            if x.same(y) {
                return true;
            }
            if !visiting.insert((x.id(), y.id())) {
                return true;
            }
            match (&*x.borrow(), &*y.borrow()) {
                (Composite::Obj(ma), Composite::Obj(mb)) => {
                    if ma.len() != mb.len() {
                        return false;
                    }
                    ma.iter().all(|(key, va)| match mb.get(key) {
                        Some(vb) => eq(va, vb, visiting),
                        None => false,
                    })
                }
                (Composite::Arr(xs), Composite::Arr(ys))
                | (Composite::Set(xs), Composite::Set(ys)) => {
                    xs.len() == ys.len()
                        && xs.iter().zip(ys).all(|(va, vb)| eq(va, vb, visiting))
                }
                (Composite::Map(xs), Composite::Map(ys)) => {
                    xs.len() == ys.len()
                        && xs.iter().zip(ys).all(|((ka, va), (kb, vb))| {
                            eq(ka, kb, visiting) && eq(va, vb, visiting)
                        })
                }
                // Not enumerable; identity was already ruled out above.
                _ => false,
            }
        }
        _ => false,
    }
}
