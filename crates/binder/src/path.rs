use state_binder_graph::{Composite, CompositeRef, Value};

/// One navigation step from a composite into a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// Resolves a path against a value, returning the value at its end. Scalars
/// come back as copies, composites as shared handles.
pub fn value_at_path(root: &Value, path: &[PathStep]) -> Option<Value> {
    let mut cur = root.clone();
    for step in path {
        let next = match (&cur, step) {
            (Value::Composite(c), PathStep::Key(key)) => match &*c.borrow() {
                Composite::Obj(map) => map.get(key).cloned(),
                _ => None,
            },
            (Value::Composite(c), PathStep::Index(index)) => match &*c.borrow() {
                Composite::Arr(items) => items.get(*index).cloned(),
                _ => None,
            },
            _ => None,
        }?;
        cur = next;
    }
    Some(cur)
}

pub(crate) fn composite_at_path(root: &Value, path: &[PathStep]) -> Option<CompositeRef> {
    match value_at_path(root, path)? {
        Value::Composite(c) => Some(c),
        _ => None,
    }
}
