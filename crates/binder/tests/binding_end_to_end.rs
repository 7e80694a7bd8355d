//! End-to-end binding scenarios against a recording store.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use state_binder::{
    bind, bind_with_defaults, from_json, to_json, Ack, BindError, BindingOptions, ChangePolicy,
    ClonePolicy, Value,
};

/// A store that renders each delivered snapshot to JSON at commit time and
/// acknowledges immediately.
fn json_store() -> (
    Rc<RefCell<Vec<serde_json::Value>>>,
    impl FnMut(Value, Ack) + 'static,
) {
    let log: Rc<RefCell<Vec<serde_json::Value>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let commit = move |next: Value, ack: Ack| {
        sink.borrow_mut().push(to_json(&next).unwrap());
        ack.apply();
    };
    (log, commit)
}

fn put(target: &Value, key: &str, value: Value) {
    let composite = target.as_composite().unwrap();
    composite
        .borrow_mut()
        .as_obj_mut()
        .unwrap()
        .insert(key.to_string(), value);
}

#[test]
fn two_level_write_scenario() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(
        from_json(&json!({"level1": "x", "level2": {"level2_1": "y"}})),
        commit,
    );

    binder.set_key("level1", "z").unwrap();
    assert_eq!(
        *log.borrow(),
        vec![json!({"level1": "z", "level2": {"level2_1": "y"}})]
    );

    let level2 = binder.get("level2").unwrap().as_node().unwrap().clone();
    level2.set_key("level2_1", "w").unwrap();
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(
        log.borrow()[1],
        json!({"level1": "z", "level2": {"level2_1": "w"}})
    );
}

#[test]
fn only_on_changes_suppresses_no_op_writes() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"level1": "x"})), commit);

    binder.set_key("level1", "x").unwrap();
    assert_eq!(log.borrow().len(), 0);

    binder.set_key("level1", "z").unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn always_policy_commits_no_op_writes() {
    let (log, commit) = json_store();
    let binder = bind(
        from_json(&json!({"level1": "x"})),
        commit,
        BindingOptions {
            change_policy: ChangePolicy::Always,
            ..BindingOptions::default()
        },
    );

    binder.set_key("level1", "x").unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn update_fires_exactly_one_commit_regardless_of_edit_count() {
    for edits in [0usize, 1, 5] {
        let (log, commit) = json_store();
        let binder = bind_with_defaults(from_json(&json!({"base": 0})), commit);
        binder
            .update(|working| {
                for i in 0..edits {
                    put(&working, &format!("f{i}"), Value::Num(i as f64));
                }
                Ok::<(), BindError>(())
            })
            .unwrap();
        assert_eq!(log.borrow().len(), 1, "edits = {edits}");
    }
}

#[test]
fn update_error_propagates_without_committing() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"a": 1})), commit);
    let result = binder.update(|working| {
        put(&working, "a", Value::Num(99.0));
        Err(BindError::NotAnObject)
    });
    assert_eq!(result, Err(BindError::NotAnObject));
    assert_eq!(log.borrow().len(), 0);
    assert_eq!(binder.to_string(), r#"{"a":1}"#);
}

#[test]
fn set_merges_only_the_listed_top_level_keys() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"a": 0, "b": 0, "c": 3})), commit);
    binder.set(from_json(&json!({"a": 1, "b": 2}))).unwrap();
    assert_eq!(*log.borrow(), vec![json!({"a": 1, "b": 2, "c": 3})]);
}

#[test]
fn retained_working_copy_cannot_leak_into_committed_state() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"a": 1})), commit);
    let retained: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let keeper = Rc::clone(&retained);
    binder
        .update(move |working| {
            put(&working, "a", Value::Num(2.0));
            *keeper.borrow_mut() = Some(working);
            Ok::<(), BindError>(())
        })
        .unwrap();
    assert_eq!(log.borrow().len(), 1);

    // Mutations through the retained handle are invisible to the binder.
    let held = retained.borrow().clone().unwrap();
    put(&held, "rogue", Value::Bool(true));
    assert_eq!(binder.to_string(), r#"{"a":2}"#);
}

#[test]
fn deep_clone_policy_severs_nested_aliasing_in_commits() {
    let (log, commit) = json_store();
    let binder = bind(
        from_json(&json!({"nested": {"x": 1}})),
        commit,
        BindingOptions {
            clone_policy: ClonePolicy::Deep,
            ..BindingOptions::default()
        },
    );
    let nested = binder.get("nested").unwrap().as_node().unwrap().clone();
    nested.set_key("x", Value::Num(2.0)).unwrap();
    nested.set_key("x", Value::Num(3.0)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            json!({"nested": {"x": 2}}),
            json!({"nested": {"x": 3}}),
        ]
    );
}

#[test]
fn navigation_after_a_snapshot_swap_never_reuses_nodes_for_dead_composites() {
    // A deep-policy update replaces every composite; freed addresses may be
    // handed to the new allocations, so a cached node must only be reused
    // while the composite it was created for is still alive.
    for _ in 0..32 {
        let (_log, commit) = json_store();
        let binder = bind(
            from_json(&json!({"a": {"x": 1}, "b": {"y": 2}})),
            commit,
            BindingOptions {
                clone_policy: ClonePolicy::Deep,
                ..BindingOptions::default()
            },
        );
        let a = binder.get("a").unwrap().as_node().unwrap().clone();
        binder.update(|_working| Ok::<(), BindError>(())).unwrap();
        let b = binder.get("b").unwrap().as_node().unwrap().clone();
        assert_eq!(to_json(&b.read().unwrap()).unwrap(), json!({"y": 2}));
        assert_ne!(a, b);
        assert_eq!(to_json(&a.read().unwrap()).unwrap(), json!({"x": 1}));
    }
}

#[test]
fn writes_through_one_node_are_visible_through_all_nodes() {
    let (_log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"shared": {"x": 1}})), commit);
    let a = binder.get("shared").unwrap().as_node().unwrap().clone();
    a.set_key("x", Value::Num(7.0)).unwrap();
    let through_root = binder
        .get("shared")
        .unwrap()
        .as_node()
        .unwrap()
        .get("x")
        .unwrap();
    assert!(through_root.as_scalar().unwrap().same(&Value::Num(7.0)));
}

#[test]
fn store_writing_through_the_binder_during_commit_is_delivered_next() {
    let log: Rc<RefCell<Vec<serde_json::Value>>> = Rc::new(RefCell::new(Vec::new()));
    let slot: Rc<RefCell<Option<state_binder::BoundNode>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&log);
    let writer = Rc::clone(&slot);
    let commit = move |next: Value, ack: Ack| {
        sink.borrow_mut().push(to_json(&next).unwrap());
        if sink.borrow().len() == 1 {
            let binder = writer.borrow().clone();
            if let Some(binder) = binder {
                binder.set_key("committed", true).unwrap();
            }
        }
        ack.apply();
    };
    let binder = bind_with_defaults(from_json(&json!({"a": 0})), commit);
    *slot.borrow_mut() = Some(binder.clone());

    binder.set_key("a", Value::Num(1.0)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![json!({"a": 1}), json!({"a": 1, "committed": true})]
    );
    assert_eq!(binder.to_string(), r#"{"a":1,"committed":true}"#);
}

#[test]
fn array_element_writes() {
    let (log, commit) = json_store();
    let binder = bind_with_defaults(from_json(&json!({"items": [1, 2, 3]})), commit);
    let items = binder.get("items").unwrap().as_node().unwrap().clone();
    items.set_index(1, Value::Num(20.0)).unwrap();
    assert_eq!(*log.borrow(), vec![json!({"items": [1, 20, 3]})]);
    assert_eq!(items.set_index(9, Value::Num(0.0)), Err(BindError::PathNotFound));
    // Same-value element writes are suppressed like field writes.
    items.set_index(0, Value::Num(1.0)).unwrap();
    assert_eq!(log.borrow().len(), 1);
}
