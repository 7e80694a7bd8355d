//! Structural clone engine.
//!
//! [`deep_clone`] copies an arbitrary value graph: cycles terminate, shared
//! substructure stays shared, and sequence order is preserved. The
//! traversal runs over an explicit work list with a visited map from source
//! identity to clone handle, so depth is bounded by heap, not by the call
//! stack, and cost is O(reachable composites).
//!
//! Weak containers cannot be enumerated, so they are "cloned" as facades
//! over the source container (see [`crate::weak`]); this is the engine's
//! one documented approximation. The composite enum is closed, so the
//! exotic-container fallback of dynamic-language clone routines has no
//! counterpart here.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::value::{Composite, CompositeRef, Value};
use crate::weak;

/// Maps a source composite's identity to its already-built clone, scoped to
/// a single clone invocation.
type Visited = HashMap<usize, CompositeRef>;

type WorkList = Vec<(CompositeRef, CompositeRef)>;

/// Structurally copies a value graph. Scalars come back as-is; every
/// reachable composite is cloned exactly once.
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Composite(src) => Value::Composite(clone_graph(src)),
        scalar => scalar.clone(),
    }
}

/// Copies only the top-level composite; children share handles with the
/// source. A top-level weak container still yields a facade, since its
/// entries cannot be copied at any depth.
pub fn shallow_clone(value: &Value) -> Value {
    let Value::Composite(src) = value else {
        return value.clone();
    };
    let copied = {
        let guard = src.borrow();
        match &*guard {
            Composite::Obj(map) => Some(Composite::Obj(map.clone())),
            Composite::Arr(items) => Some(Composite::Arr(items.clone())),
            Composite::Set(items) => Some(Composite::Set(items.clone())),
            Composite::Map(entries) => Some(Composite::Map(entries.clone())),
            Composite::WeakSet(_) | Composite::WeakMap(_) => None,
        }
    };
    match copied {
        Some(composite) => Value::Composite(CompositeRef::new(composite)),
        None => Value::Composite(weak::facade_of(src)),
    }
}

fn clone_graph(root: &CompositeRef) -> CompositeRef {
    let mut visited = Visited::new();
    let mut work = WorkList::new();
    let out = shell_for(root, &mut visited, &mut work);
    while let Some((src, dst)) = work.pop() {
        fill(&src, &dst, &mut visited, &mut work);
    }
    out
}

/// Returns the clone handle for `src`, creating an empty shell (queued for
/// filling) on first sight. The visited check runs before any borrow, so a
/// self-referential child resolves to the shell already on the work list.
fn shell_for(src: &CompositeRef, visited: &mut Visited, work: &mut WorkList) -> CompositeRef {
    if let Some(existing) = visited.get(&src.id()) {
        return existing.clone();
    }
    let shell = {
        let guard = src.borrow();
        match &*guard {
            Composite::Obj(_) => Some(Composite::Obj(IndexMap::new())),
            Composite::Arr(_) => Some(Composite::Arr(Vec::new())),
            Composite::Set(_) => Some(Composite::Set(Vec::new())),
            Composite::Map(_) => Some(Composite::Map(Vec::new())),
            Composite::WeakSet(_) | Composite::WeakMap(_) => None,
        }
    };
    let Some(shell) = shell else {
        let facade = weak::facade_of(src);
        visited.insert(src.id(), facade.clone());
        return facade;
    };
    let shell = CompositeRef::new(shell);
    visited.insert(src.id(), shell.clone());
    work.push((src.clone(), shell.clone()));
    shell
}

fn clone_child(value: &Value, visited: &mut Visited, work: &mut WorkList) -> Value {
    match value {
        Value::Composite(c) => Value::Composite(shell_for(c, visited, work)),
        scalar => scalar.clone(),
    }
}

fn fill(src: &CompositeRef, dst: &CompositeRef, visited: &mut Visited, work: &mut WorkList) {
    let copied = {
        let guard = src.borrow();
        match &*guard {
            Composite::Obj(map) => Composite::Obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), clone_child(v, visited, work)))
                    .collect(),
            ),
            Composite::Arr(items) => Composite::Arr(
                items.iter().map(|v| clone_child(v, visited, work)).collect(),
            ),
            Composite::Set(items) => Composite::Set(
                items.iter().map(|v| clone_child(v, visited, work)).collect(),
            ),
            Composite::Map(entries) => Composite::Map(
                entries
                    .iter()
                    .map(|(k, v)| {
                        (
                            clone_child(k, visited, work),
                            clone_child(v, visited, work),
                        )
                    })
                    .collect(),
            ),
            // Weak containers never enter the work list; they become
            // facades in shell_for.
            Composite::WeakSet(_) | Composite::WeakMap(_) => return,
        }
    };
    *dst.borrow_mut() = copied;
}
