//! Integration Tests for Reactive Proxies
//!
//! These tests verify that proxies, the dependency runtime and effects work
//! together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::{
    reactive, record, shallow_reactive, to_raw, untracked, DictProxy, Effect, HookEvent,
    ListProxy, RawDict, RawList, TargetKey, TriggerOpTypes, Value,
};
use serde_json::json;

fn dict(json: serde_json::Value) -> DictProxy {
    reactive(json).unwrap().as_dict().unwrap().clone()
}

fn list(json: serde_json::Value) -> ListProxy {
    reactive(json).unwrap().as_list().unwrap().clone()
}

/// Counts runs of an effect body.
fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
    let count = Arc::new(AtomicI32::new(0));
    (count.clone(), count)
}

/// Test that an effect re-runs when a key it read is written.
#[test]
fn effect_reruns_on_dict_set() {
    let state = dict(json!({"count": 0}));
    let observed = Arc::new(AtomicI32::new(-1));

    let reader = state.clone();
    let observed_clone = observed.clone();
    let effect = Effect::new(move || {
        let count = reader.get("count").unwrap().as_int().unwrap();
        observed_clone.store(count as i32, Ordering::SeqCst);
    });
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    state.set("count", 42).unwrap();
    assert_eq!(observed.load(Ordering::SeqCst), 42);
    assert_eq!(effect.run_count(), 2);

    // Same value, no re-run.
    state.set("count", 42).unwrap();
    assert_eq!(effect.run_count(), 2);
}

/// Test that a keyed read is not disturbed by writes to other keys.
#[test]
fn unrelated_key_does_not_rerun() {
    let state = dict(json!({"a": 1, "b": 2}));
    let (runs, runs_clone) = counter();

    let reader = state.clone();
    let _effect = Effect::new(move || {
        reader.get("a").unwrap();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    state.set("b", 3).unwrap();
    state.set("c", 4).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("a", 5).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that an effect over the list length re-runs on append.
#[test]
fn effect_reruns_on_list_append() {
    let items = list(json!([1, 2, 3]));
    let observed = Arc::new(AtomicI32::new(0));

    let reader = items.clone();
    let observed_clone = observed.clone();
    let _effect = Effect::new(move || {
        observed_clone.store(reader.len() as i32, Ordering::SeqCst);
    });
    assert_eq!(observed.load(Ordering::SeqCst), 3);

    items.append(4);
    assert_eq!(observed.load(Ordering::SeqCst), 4);
}

/// Test that effects observe the state after the write, not before.
#[test]
fn effects_see_post_mutation_state() {
    let items = list(json!(["a", "b"]));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let reader = items.clone();
    let seen_clone = seen.clone();
    let _effect = Effect::new(move || {
        let snapshot: Vec<Value> = reader.iter().collect();
        seen_clone.lock().push(snapshot.len());
    });

    items.pop().unwrap();
    items.clear();

    assert_eq!(*seen.lock(), vec![2, 1, 0]);
}

/// Test that reactivity reaches nested containers read through a proxy.
#[test]
fn nested_reads_are_transitive() {
    let state = dict(json!({"a": {"b": 1}}));
    let (deep_runs, deep_clone) = counter();
    let (outer_runs, outer_clone) = counter();

    let reader = state.clone();
    let _deep = Effect::new(move || {
        let inner = reader.get("a").unwrap();
        inner.as_dict_proxy().unwrap().get("b").unwrap();
        deep_clone.fetch_add(1, Ordering::SeqCst);
    });

    let reader = state.clone();
    let _outer = Effect::new(move || {
        reader.get("a").unwrap();
        outer_clone.fetch_add(1, Ordering::SeqCst);
    });

    let inner = state.get("a").unwrap();
    let inner = inner.as_dict_proxy().unwrap();

    let (result, events) = record(|| inner.set("b", 2));
    result.unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        HookEvent::Trigger { target, op: TriggerOpTypes::Set, .. } if *target == inner.target_id()
    )));

    assert_eq!(deep_runs.load(Ordering::SeqCst), 2);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
}

/// Test that wrapping is idempotent and unwrapping returns the original.
#[test]
fn wrap_identity_round_trips() {
    let raw = RawDict::new();

    let first = reactive(raw.clone()).unwrap();
    let second = reactive(raw.clone()).unwrap();
    assert!(first.ptr_eq(&second));

    let back = to_raw(Value::from(first));
    assert!(back.as_raw_dict().unwrap().ptr_eq(&raw));
}

/// Test that reads inside `untracked` record nothing.
#[test]
fn untracked_reads_do_not_subscribe() {
    let state = dict(json!({"x": 1, "y": 1}));
    let (runs, runs_clone) = counter();

    let reader = state.clone();
    let _effect = Effect::new(move || {
        reader.get("x").unwrap();
        untracked(|| reader.get("y").unwrap());
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    state.set("y", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("x", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that enumerating a dictionary subscribes to every structural change.
#[test]
fn iteration_reruns_on_add_and_clear() {
    let state = dict(json!({"a": 1, "b": 2}));
    let (runs, runs_clone) = counter();

    let reader = state.clone();
    let _effect = Effect::new(move || {
        reader.keys().count();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    state.set("c", 3).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // One clear event per removed key, each re-running the effect.
    state.clear();
    assert_eq!(runs.load(Ordering::SeqCst), 5);
}

/// Test that inserting before a read index invalidates it.
#[test]
fn insert_shifts_later_indices() {
    let items = list(json!([10, 20, 30]));
    let (tail_runs, tail_clone) = counter();
    let (head_runs, head_clone) = counter();

    let reader = items.clone();
    let _tail = Effect::new(move || {
        reader.get(2).unwrap();
        tail_clone.fetch_add(1, Ordering::SeqCst);
    });

    let reader = items.clone();
    let _head = Effect::new(move || {
        reader.get(0).unwrap();
        head_clone.fetch_add(1, Ordering::SeqCst);
    });

    items.insert(1, 15);
    assert_eq!(tail_runs.load(Ordering::SeqCst), 2);
    assert_eq!(head_runs.load(Ordering::SeqCst), 1);
}

/// Test that an effect reading the last item follows the end of the list.
#[test]
fn last_item_read_reruns_on_append() {
    let items = list(json!([1, 2, 3]));
    let last = Arc::new(Mutex::new(Value::Null));

    let reader = items.clone();
    let last_clone = last.clone();
    let _effect = Effect::new(move || {
        *last_clone.lock() = reader.get(-1).unwrap();
    });

    items.append(4);
    assert_eq!(*last.lock(), Value::Int(4));

    items.insert(10, 5);
    assert_eq!(*last.lock(), Value::Int(5));
}

/// Test that reading one past the end re-runs once that index is filled.
#[test]
fn read_past_the_end_reruns_on_append() {
    let items = list(json!(["a", "b"]));
    let seen = Arc::new(Mutex::new(None));

    let reader = items.clone();
    let seen_clone = seen.clone();
    let _effect = Effect::new(move || {
        *seen_clone.lock() = reader.get(2).ok();
    });
    assert_eq!(*seen.lock(), None);

    items.append("c");
    assert_eq!(*seen.lock(), Some(Value::from("c")));
}

/// Test `set_default` and `update` as seen by an effect.
#[test]
fn set_default_and_update_trigger_once_per_change() {
    let state = dict(json!({"a": 1}));
    let (runs, runs_clone) = counter();

    let reader = state.clone();
    let _effect = Effect::new(move || {
        reader.len();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    state.set_default("a", 9).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(state.get("a").unwrap(), Value::Int(1));

    state.set_default("b", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    state.update([("a", 1), ("c", 3)]).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Test that a shallow proxy does not wrap nested containers.
#[test]
fn shallow_proxy_is_not_transitive() {
    let inner = RawList::new();
    let outer = RawDict::new();
    outer.insert("items", inner.clone());

    let shallow = shallow_reactive(outer).unwrap();
    let shallow = shallow.as_dict().unwrap();

    let read = shallow.get("items").unwrap();
    assert!(read.as_raw_list().unwrap().ptr_eq(&inner));
}

/// Test that a disposed effect stops reacting.
#[test]
fn disposed_effect_stops_reacting() {
    let items = list(json!([]));
    let (runs, runs_clone) = counter();

    let reader = items.clone();
    let effect = Effect::new(move || {
        reader.is_empty();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    items.append(1);
    effect.dispose();
    items.append(2);

    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that keys can be integers as well as strings.
#[test]
fn integer_keys_track_independently() {
    let state = dict(json!({}));
    let (result, events) = record(|| state.set(1, "one"));
    result.unwrap();

    assert_eq!(
        events,
        vec![HookEvent::Trigger {
            target: state.target_id(),
            op: TriggerOpTypes::Add,
            key: Some(TargetKey::Key(1.into())),
            new_value: Some(Value::from("one")),
            old_value: None,
        }]
    );
    assert_eq!(state.get("1").ok(), None);
}
