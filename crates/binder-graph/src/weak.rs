//! Weak-reference containers.
//!
//! A weak container associates metadata with a composite's *identity*
//! without extending its lifetime and without permitting enumeration of its
//! members. Because membership cannot be enumerated, a structural copy of a
//! weak container is impossible; the clone engine produces a *facade*
//! instead (see [`facade_of`]): a view that delegates untouched keys to the
//! source container, shadows keys written through the facade in a private
//! side store, and promotes shadowed source entries into every facade
//! before a deletion changes what the source would answer. This is a
//! best-effort approximation, not a faithful copy.

use std::cell::RefCell;
use std::rc::Weak;

use crate::value::{Composite, CompositeRef, Value};

/// Weak handle to a composite, compared by allocation identity.
///
/// A dead key matches nothing: the liveness check guards against an address
/// being reused by a later allocation.
#[derive(Clone, Debug)]
pub struct WeakKey(Weak<RefCell<Composite>>);

impl WeakKey {
    pub fn new(target: &CompositeRef) -> Self {
        WeakKey(target.downgrade())
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn matches(&self, target: &CompositeRef) -> bool {
        self.is_alive() && std::ptr::eq(self.0.as_ptr(), target.as_cell_ptr())
    }
}

#[derive(Debug, Default)]
pub struct WeakSet {
    /// Members held through this view.
    members: Vec<WeakKey>,
    /// Keys whose membership (or absence) this view owns, shadowing `source`.
    owned: Vec<WeakKey>,
    /// Container this view was cloned from, when this set is a facade.
    source: Option<CompositeRef>,
    /// Facades layered over this container by the clone engine.
    facades: Vec<Weak<RefCell<Composite>>>,
}

impl WeakSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn facade(source: CompositeRef) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Whether this view has diverged from its source for `key`. A
    /// non-facade set owns every key.
    fn owns(&self, key: &CompositeRef) -> bool {
        self.source.is_none() || self.owned.iter().any(|k| k.matches(key))
    }

    pub fn has(&self, key: &CompositeRef) -> bool {
        if !self.owns(key) {
            if let Some(source) = &self.source {
                return match &*source.borrow() {
                    Composite::WeakSet(ws) => ws.has(key),
                    _ => false,
                };
            }
        }
        self.members.iter().any(|k| k.matches(key))
    }

    pub fn add(&mut self, key: &CompositeRef) {
        self.prune();
        if !self.members.iter().any(|k| k.matches(key)) {
            self.members.push(WeakKey::new(key));
        }
        if self.source.is_some() && !self.owned.iter().any(|k| k.matches(key)) {
            self.owned.push(WeakKey::new(key));
        }
    }

    /// Removes `key` from this view. The source container, if any, is left
    /// untouched; from here on this view owns the key's absence.
    pub fn delete(&mut self, key: &CompositeRef) -> bool {
        self.prune();
        self.promote(key);
        if self.owns(key) {
            let before = self.members.len();
            self.members.retain(|k| !k.matches(key));
            return self.members.len() != before;
        }
        let present = self.has(key);
        self.owned.push(WeakKey::new(key));
        present
    }

    /// Before this container's answer for `key` changes, hands the current
    /// membership to every facade that has not diverged for it.
    fn promote(&mut self, key: &CompositeRef) {
        if !self.has(key) {
            return;
        }
        for facade in &self.facades {
            let Some(cell) = facade.upgrade() else { continue };
            let mut guard = cell.borrow_mut();
            if let Composite::WeakSet(fs) = &mut *guard {
                if !fs.owns(key) {
                    fs.members.push(WeakKey::new(key));
                    fs.owned.push(WeakKey::new(key));
                }
            }
        }
    }

    fn prune(&mut self) {
        self.members.retain(WeakKey::is_alive);
        self.owned.retain(WeakKey::is_alive);
        self.facades.retain(|f| f.strong_count() > 0);
    }
}

#[derive(Debug, Default)]
pub struct WeakMap {
    entries: Vec<(WeakKey, Value)>,
    owned: Vec<WeakKey>,
    source: Option<CompositeRef>,
    facades: Vec<Weak<RefCell<Composite>>>,
}

impl WeakMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn facade(source: CompositeRef) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    fn owns(&self, key: &CompositeRef) -> bool {
        self.source.is_none() || self.owned.iter().any(|k| k.matches(key))
    }

    pub fn get(&self, key: &CompositeRef) -> Option<Value> {
        if !self.owns(key) {
            if let Some(source) = &self.source {
                return match &*source.borrow() {
                    Composite::WeakMap(wm) => wm.get(key),
                    _ => None,
                };
            }
        }
        self.entries
            .iter()
            .find(|(k, _)| k.matches(key))
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &CompositeRef) -> bool {
        if !self.owns(key) {
            if let Some(source) = &self.source {
                return match &*source.borrow() {
                    Composite::WeakMap(wm) => wm.has(key),
                    _ => false,
                };
            }
        }
        self.entries.iter().any(|(k, _)| k.matches(key))
    }

    pub fn insert(&mut self, key: &CompositeRef, value: Value) {
        self.prune();
        self.promote(key);
        let mark_owned = self.source.is_some() && !self.owned.iter().any(|k| k.matches(key));
        match self.entries.iter().position(|(k, _)| k.matches(key)) {
            Some(pos) => self.entries[pos].1 = value,
            None => self.entries.push((WeakKey::new(key), value)),
        }
        if mark_owned {
            self.owned.push(WeakKey::new(key));
        }
    }

    /// Removes `key` from this view, leaving the source untouched.
    pub fn delete(&mut self, key: &CompositeRef) -> bool {
        self.prune();
        self.promote(key);
        if self.owns(key) {
            let before = self.entries.len();
            self.entries.retain(|(k, _)| !k.matches(key));
            return self.entries.len() != before;
        }
        let present = self.has(key);
        self.owned.push(WeakKey::new(key));
        present
    }

    fn promote(&mut self, key: &CompositeRef) {
        let Some(visible) = self.get(key) else { return };
        for facade in &self.facades {
            let Some(cell) = facade.upgrade() else { continue };
            let mut guard = cell.borrow_mut();
            if let Composite::WeakMap(fm) = &mut *guard {
                if !fm.owns(key) {
                    fm.entries.push((WeakKey::new(key), visible.clone()));
                    fm.owned.push(WeakKey::new(key));
                }
            }
        }
    }

    fn prune(&mut self) {
        self.entries.retain(|(k, _)| k.is_alive());
        self.owned.retain(WeakKey::is_alive);
        self.facades.retain(|f| f.strong_count() > 0);
    }
}

/// Builds the clone facade for a weak container and registers it with the
/// source so later source-side deletions promote entries into it. Non-weak
/// composites come back unchanged.
pub(crate) fn facade_of(source: &CompositeRef) -> CompositeRef {
    let facade = {
        let guard = source.borrow();
        match &*guard {
            Composite::WeakSet(_) => Composite::WeakSet(WeakSet::facade(source.clone())),
            Composite::WeakMap(_) => Composite::WeakMap(WeakMap::facade(source.clone())),
            _ => return source.clone(),
        }
    };
    let facade = CompositeRef::new(facade);
    match &mut *source.borrow_mut() {
        Composite::WeakSet(ws) => ws.facades.push(facade.downgrade()),
        Composite::WeakMap(wm) => wm.facades.push(facade.downgrade()),
        _ => {}
    }
    facade
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn key() -> CompositeRef {
        Value::obj().as_composite().unwrap().clone()
    }

    fn weak_set() -> CompositeRef {
        Value::weak_set().as_composite().unwrap().clone()
    }

    fn weak_map() -> CompositeRef {
        Value::weak_map().as_composite().unwrap().clone()
    }

    fn set_of(cell: &CompositeRef, f: impl FnOnce(&mut WeakSet)) {
        match &mut *cell.borrow_mut() {
            Composite::WeakSet(ws) => f(ws),
            _ => panic!("not a weak set"),
        }
    }

    fn set_has(cell: &CompositeRef, k: &CompositeRef) -> bool {
        match &*cell.borrow() {
            Composite::WeakSet(ws) => ws.has(k),
            _ => panic!("not a weak set"),
        }
    }

    fn map_of(cell: &CompositeRef, f: impl FnOnce(&mut WeakMap)) {
        match &mut *cell.borrow_mut() {
            Composite::WeakMap(wm) => f(wm),
            _ => panic!("not a weak map"),
        }
    }

    fn map_get(cell: &CompositeRef, k: &CompositeRef) -> Option<Value> {
        match &*cell.borrow() {
            Composite::WeakMap(wm) => wm.get(k),
            _ => panic!("not a weak map"),
        }
    }

    #[test]
    fn test_weak_set_membership() {
        let set = weak_set();
        let k = key();
        set_of(&set, |ws| ws.add(&k));
        assert!(set_has(&set, &k));
        let mut deleted = false;
        set_of(&set, |ws| deleted = ws.delete(&k));
        assert!(deleted);
        assert!(!set_has(&set, &k));
    }

    #[test]
    fn test_weak_set_key_does_not_outlive() {
        let set = weak_set();
        let k = key();
        set_of(&set, |ws| ws.add(&k));
        drop(k);
        // The next mutation prunes the dead entry.
        let other = key();
        set_of(&set, |ws| ws.add(&other));
        let guard = set.borrow();
        match &*guard {
            Composite::WeakSet(ws) => assert_eq!(ws.members.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_facade_delegates_untouched_keys() {
        let orig = weak_set();
        let inherited = key();
        set_of(&orig, |ws| ws.add(&inherited));
        let facade = facade_of(&orig);
        assert!(set_has(&facade, &inherited));
        // Additions through the facade stay private to it.
        let private = key();
        set_of(&facade, |ws| ws.add(&private));
        assert!(set_has(&facade, &private));
        assert!(!set_has(&orig, &private));
    }

    #[test]
    fn test_facade_delete_shadows_without_touching_source() {
        let orig = weak_set();
        let k = key();
        set_of(&orig, |ws| ws.add(&k));
        let facade = facade_of(&orig);
        let mut deleted = false;
        set_of(&facade, |ws| deleted = ws.delete(&k));
        assert!(deleted);
        assert!(!set_has(&facade, &k));
        assert!(set_has(&orig, &k));
    }

    #[test]
    fn test_source_delete_promotes_into_facade() {
        let orig = weak_set();
        let k = key();
        set_of(&orig, |ws| ws.add(&k));
        let facade = facade_of(&orig);
        set_of(&orig, |ws| {
            ws.delete(&k);
        });
        // The facade keeps the membership it observed before the deletion.
        assert!(!set_has(&orig, &k));
        assert!(set_has(&facade, &k));
    }

    #[test]
    fn test_weak_map_get_and_overwrite() {
        let map = weak_map();
        let k = key();
        map_of(&map, |wm| wm.insert(&k, Value::Num(1.0)));
        map_of(&map, |wm| wm.insert(&k, Value::Num(2.0)));
        assert!(map_get(&map, &k).unwrap().same(&Value::Num(2.0)));
    }

    #[test]
    fn test_weak_map_facade_overwrite_shadows_source() {
        let orig = weak_map();
        let k = key();
        map_of(&orig, |wm| wm.insert(&k, Value::str("original")));
        let facade = facade_of(&orig);
        map_of(&facade, |wm| wm.insert(&k, Value::str("shadow")));
        assert!(map_get(&facade, &k).unwrap().same(&Value::str("shadow")));
        assert!(map_get(&orig, &k).unwrap().same(&Value::str("original")));
    }

    #[test]
    fn test_weak_map_source_overwrite_promotes_old_value() {
        let orig = weak_map();
        let k = key();
        map_of(&orig, |wm| wm.insert(&k, Value::str("before")));
        let facade = facade_of(&orig);
        map_of(&orig, |wm| wm.insert(&k, Value::str("after")));
        // The facade still answers with the value it was cloned over.
        assert!(map_get(&facade, &k).unwrap().same(&Value::str("before")));
        assert!(map_get(&orig, &k).unwrap().same(&Value::str("after")));
    }

    #[test]
    fn test_weak_map_source_delete_promotes() {
        let orig = weak_map();
        let k = key();
        map_of(&orig, |wm| wm.insert(&k, Value::Num(7.0)));
        let facade = facade_of(&orig);
        map_of(&orig, |wm| {
            wm.delete(&k);
        });
        assert!(map_get(&orig, &k).is_none());
        assert!(map_get(&facade, &k).unwrap().same(&Value::Num(7.0)));
    }
}
