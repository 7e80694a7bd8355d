use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::weak::{WeakMap, WeakSet};

/// A value in the graph.
///
/// Scalars are held inline and copied by value. Composites are shared
/// handles: cloning a `Value` clones the handle, not the structure, so two
/// clones of a composite `Value` observe each other's mutations. Structural
/// copies are made explicitly through [`crate::clone`].
#[derive(Clone, Debug)]
pub enum Value {
    /// The absent-value marker, distinct from `Null`.
    Undefined,
    Null,
    Bool(bool),
    /// IEEE 754 double, the only "number" kind.
    Num(f64),
    /// Arbitrary-precision-ish integer, kept apart from `Num`.
    BigInt(i128),
    Str(Rc<str>),
    /// Interned symbolic atom; equal only to itself.
    Atom(Atom),
    Composite(CompositeRef),
}

/// A symbolic atom: a unique identity with a diagnostic description.
///
/// Two atoms are equal only if they were produced by the same
/// [`Atom::new`] call, regardless of description.
#[derive(Clone, Debug)]
pub struct Atom {
    id: u64,
    description: Rc<str>,
}

thread_local! {
    static NEXT_ATOM_ID: Cell<u64> = const { Cell::new(1) };
}

impl Atom {
    pub fn new(description: &str) -> Self {
        let id = NEXT_ATOM_ID.with(|next| {
            let id = next.get();
            next.set(id.saturating_add(1));
            id
        });
        Self {
            id,
            description: Rc::from(description),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Atom {}

/// Shared handle to a composite. Identity is the allocation address.
#[derive(Clone, Debug)]
pub struct CompositeRef(Rc<RefCell<Composite>>);

/// The composite kinds a graph value can take.
#[derive(Debug)]
pub enum Composite {
    /// Field-ordered plain object.
    Obj(IndexMap<String, Value>),
    /// Ordered sequence.
    Arr(Vec<Value>),
    /// Insertion-ordered set, deduplicated by [`Value::same`].
    Set(Vec<Value>),
    /// Insertion-ordered map with arbitrary keys, looked up by [`Value::same`].
    Map(Vec<(Value, Value)>),
    WeakSet(WeakSet),
    WeakMap(WeakMap),
}

impl CompositeRef {
    pub fn new(composite: Composite) -> Self {
        Self(Rc::new(RefCell::new(composite)))
    }

    /// Reference identity of this composite, stable for its lifetime.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn same(&self, other: &CompositeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, Composite> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Composite> {
        self.0.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<Composite>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn as_cell_ptr(&self) -> *const RefCell<Composite> {
        Rc::as_ptr(&self.0)
    }
}

impl Composite {
    pub fn empty_obj() -> Self {
        Composite::Obj(IndexMap::new())
    }

    pub fn as_obj(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Composite::Obj(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_obj_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Composite::Obj(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_arr(&self) -> Option<&Vec<Value>> {
        match self {
            Composite::Arr(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_arr_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Composite::Arr(items) => Some(items),
            _ => None,
        }
    }

    /// Adds an element to a set, deduplicated by [`Value::same`]. Returns
    /// `true` if the element was inserted. No-op on non-set composites.
    pub fn set_add(&mut self, value: Value) -> bool {
        match self {
            Composite::Set(items) => {
                if items.iter().any(|v| v.same(&value)) {
                    return false;
                }
                items.push(value);
                true
            }
            _ => false,
        }
    }

    pub fn set_has(&self, value: &Value) -> bool {
        match self {
            Composite::Set(items) => items.iter().any(|v| v.same(value)),
            _ => false,
        }
    }

    /// Inserts or overwrites a map entry, keyed by [`Value::same`].
    pub fn map_insert(&mut self, key: Value, value: Value) {
        if let Composite::Map(entries) = self {
            for (k, v) in entries.iter_mut() {
                if k.same(&key) {
                    *v = value;
                    return;
                }
            }
            entries.push((key, value));
        }
    }

    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Composite::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.same(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Composite::Obj(_) => "object",
            Composite::Arr(_) => "array",
            Composite::Set(_) => "set",
            Composite::Map(_) => "map",
            Composite::WeakSet(_) => "weakset",
            Composite::WeakMap(_) => "weakmap",
        }
    }
}

impl Value {
    /// Empty plain object.
    pub fn obj() -> Self {
        Value::Composite(CompositeRef::new(Composite::empty_obj()))
    }

    pub fn obj_from(fields: IndexMap<String, Value>) -> Self {
        Value::Composite(CompositeRef::new(Composite::Obj(fields)))
    }

    pub fn arr(items: Vec<Value>) -> Self {
        Value::Composite(CompositeRef::new(Composite::Arr(items)))
    }

    pub fn set() -> Self {
        Value::Composite(CompositeRef::new(Composite::Set(Vec::new())))
    }

    pub fn map() -> Self {
        Value::Composite(CompositeRef::new(Composite::Map(Vec::new())))
    }

    pub fn weak_set() -> Self {
        Value::Composite(CompositeRef::new(Composite::WeakSet(WeakSet::new())))
    }

    pub fn weak_map() -> Self {
        Value::Composite(CompositeRef::new(Composite::WeakMap(WeakMap::new())))
    }

    pub fn str(text: &str) -> Self {
        Value::Str(Rc::from(text))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Composite(_))
    }

    pub fn as_composite(&self) -> Option<&CompositeRef> {
        match self {
            Value::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Identity-style equality: scalars by value, composites by reference
    /// identity. `Num(NaN)` is never `same` as anything, itself included.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::Composite(a), Value::Composite(b)) => a.same(b),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::Str(_) => "string",
            Value::Atom(_) => "atom",
            Value::Composite(c) => c.borrow().kind(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_same_by_value() {
        assert!(Value::Num(1.0).same(&Value::Num(1.0)));
        assert!(Value::str("a").same(&Value::str("a")));
        assert!(!Value::Num(1.0).same(&Value::Num(2.0)));
        assert!(!Value::Null.same(&Value::Undefined));
        assert!(!Value::Num(0.0).same(&Value::Bool(false)));
    }

    #[test]
    fn test_nan_never_same() {
        let nan = Value::Num(f64::NAN);
        assert!(!nan.same(&nan));
    }

    #[test]
    fn test_composite_same_by_identity() {
        let a = Value::obj();
        let b = a.clone();
        let c = Value::obj();
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    #[test]
    fn test_atom_identity() {
        let a = Atom::new("tag");
        let b = Atom::new("tag");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.description(), "tag");
    }

    #[test]
    fn test_set_dedup_by_same() {
        let set = Value::set();
        let obj = Value::obj();
        let c = set.as_composite().unwrap();
        assert!(c.borrow_mut().set_add(obj.clone()));
        assert!(!c.borrow_mut().set_add(obj.clone()));
        assert!(c.borrow_mut().set_add(Value::obj()));
        assert!(c.borrow().set_has(&obj));
    }

    #[test]
    fn test_map_keyed_by_same() {
        let map = Value::map();
        let key = Value::obj();
        let c = map.as_composite().unwrap();
        c.borrow_mut().map_insert(key.clone(), Value::Num(1.0));
        c.borrow_mut().map_insert(key.clone(), Value::Num(2.0));
        let got = c.borrow().map_get(&key).cloned();
        assert!(got.unwrap().same(&Value::Num(2.0)));
        assert!(c.borrow().map_get(&Value::obj()).is_none());
    }

    #[test]
    fn test_handle_clone_aliases() {
        let v = Value::obj();
        let alias = v.clone();
        if let Value::Composite(c) = &v {
            c.borrow_mut()
                .as_obj_mut()
                .unwrap()
                .insert("a".to_string(), Value::Num(1.0));
        }
        let c = alias.as_composite().unwrap();
        assert!(c.borrow().as_obj().unwrap().contains_key("a"));
    }
}
