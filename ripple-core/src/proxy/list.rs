//! List Proxy
//!
//! Indexed reads track the resolved index. Whole-list reads (iteration,
//! containment, length, counting, searching, copying, rendering) track the
//! list with no key. Writes update the list first, then trigger:
//!
//! - `Add` at the index the new element landed on,
//! - `Set` at an index whose element changed (including after a sort or
//!   reverse, once per moved element),
//! - `Delete` at the index removed,
//! - a single keyless `Clear` on `clear`.
//!
//! Negative indices count from the end, as do the bounds of `insert`, which
//! clamps instead of failing. A read through a negative index also depends
//! on the length, and a read past the end is tracked at that index so it
//! re-runs once the index exists.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::registry::{is_shallow, to_raw, to_reactive};
use super::ProxyState;
use crate::error::{ReactivityError, Result};
use crate::reactive::{track, trigger, TargetKey, TrackOpTypes, TriggerOpTypes};
use crate::value::{has_changed, RawList, TargetId, Value};

/// Resolve a possibly negative index against `len`.
fn resolve(index: isize, len: usize) -> Result<usize> {
    let resolved = if index < 0 {
        len as isize + index
    } else {
        index
    };
    if (0..len as isize).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(ReactivityError::IndexOutOfRange { index, len })
    }
}

/// Clamp an insertion point into `0..=len`.
fn clamp_insert(index: isize, len: usize) -> usize {
    if index < 0 {
        (len as isize + index).max(0) as usize
    } else {
        (index as usize).min(len)
    }
}

/// Element equality as seen through proxies.
fn raw_eq(stored: &Value, needle: &Value) -> bool {
    match stored {
        Value::Proxy(proxy) => proxy.to_raw() == *needle,
        other => other == needle,
    }
}

/// Reactive view of a `RawList`.
#[derive(Clone)]
pub struct ListProxy {
    state: Arc<ProxyState<RawList>>,
}

impl ListProxy {
    pub(crate) fn from_state(state: Arc<ProxyState<RawList>>) -> Self {
        Self { state }
    }

    pub(crate) fn raw(&self) -> &RawList {
        &self.state.target
    }

    /// Identity of the wrapped list.
    pub fn target_id(&self) -> TargetId {
        self.state.target.id()
    }

    pub fn is_shallow(&self) -> bool {
        self.state.shallow
    }

    /// Whether both are the same proxy instance.
    pub fn ptr_eq(&self, other: &ListProxy) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn track_whole(&self, op: TrackOpTypes) {
        track(self.target_id(), op, None);
    }

    fn trigger_at(&self, op: TriggerOpTypes, index: usize, new: Option<Value>, old: Option<Value>) {
        trigger(self.target_id(), op, Some(TargetKey::Index(index)), new, old);
    }

    fn input(&self, value: Value) -> Value {
        if !self.is_shallow() && !is_shallow(&value) {
            to_raw(value)
        } else {
            value
        }
    }

    fn output(&self, value: Value) -> Value {
        if self.is_shallow() {
            value
        } else {
            to_reactive(value)
        }
    }

    /// Read the item at `index`.
    ///
    /// The read is tracked even when it fails, so a computation that looked
    /// past the end re-runs once the index exists. A negative index also
    /// depends on the length, since the element it names moves as the list
    /// grows or shrinks.
    pub fn get(&self, index: isize) -> Result<Value> {
        let len = self.raw().len();
        let resolved = resolve(index, len);

        if index < 0 {
            self.track_whole(TrackOpTypes::Iter);
        }
        if let Some(position) = resolved.as_ref().ok().copied().or(usize::try_from(index).ok()) {
            track(self.target_id(), TrackOpTypes::Get, Some(TargetKey::Index(position)));
        }

        let resolved = resolved?;
        let value = self
            .raw()
            .get(resolved)
            .ok_or(ReactivityError::IndexOutOfRange { index, len })?;
        Ok(self.output(value))
    }

    pub fn set(&self, index: isize, value: impl Into<Value>) -> Result<()> {
        let value = self.input(value.into());

        let (resolved, old) = {
            let mut items = self.raw().write();
            let resolved = resolve(index, items.len())?;
            let old = std::mem::replace(&mut items[resolved], value.clone());
            (resolved, old)
        };

        if has_changed(&value, &old) {
            self.trigger_at(TriggerOpTypes::Set, resolved, Some(value), Some(old));
        }
        Ok(())
    }

    pub fn delete(&self, index: isize) -> Result<()> {
        let (resolved, old) = {
            let mut items = self.raw().write();
            let resolved = resolve(index, items.len())?;
            (resolved, items.remove(resolved))
        };

        self.trigger_at(TriggerOpTypes::Delete, resolved, None, Some(old));
        Ok(())
    }

    /// Items in order, snapshotted when called; nested containers are
    /// wrapped as yielded.
    pub fn iter(&self) -> impl Iterator<Item = Value> {
        self.track_whole(TrackOpTypes::Iter);
        let shallow = self.is_shallow();
        let items: Vec<Value> = self.raw().read().clone();
        items.into_iter().map(move |value| {
            if shallow {
                value
            } else {
                to_reactive(value)
            }
        })
    }

    pub fn contains(&self, item: &Value) -> bool {
        self.track_whole(TrackOpTypes::Has);
        let needle = to_raw(item.clone());
        self.raw().read().iter().any(|stored| raw_eq(stored, &needle))
    }

    pub fn len(&self) -> usize {
        self.track_whole(TrackOpTypes::Iter);
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, item: impl Into<Value>) {
        let value = self.input(item.into());

        let index = {
            let mut items = self.raw().write();
            items.push(value.clone());
            items.len() - 1
        };

        self.trigger_at(TriggerOpTypes::Add, index, Some(value), None);
    }

    /// Insert before `index`; out-of-range indices clamp to either end.
    pub fn insert(&self, index: isize, item: impl Into<Value>) {
        let value = self.input(item.into());

        let resolved = {
            let mut items = self.raw().write();
            let resolved = clamp_insert(index, items.len());
            items.insert(resolved, value.clone());
            resolved
        };

        self.trigger_at(TriggerOpTypes::Add, resolved, Some(value), None);
    }

    /// `append` each item in turn.
    pub fn extend<I, V>(&self, items: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for item in items {
            self.append(item);
        }
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Result<Value> {
        self.pop_at(-1)
    }

    /// Remove and return the item at `index`.
    pub fn pop_at(&self, index: isize) -> Result<Value> {
        let (resolved, old) = {
            let mut items = self.raw().write();
            if items.is_empty() {
                return Err(ReactivityError::Empty("list"));
            }
            let resolved = resolve(index, items.len())?;
            (resolved, items.remove(resolved))
        };

        self.trigger_at(TriggerOpTypes::Delete, resolved, None, Some(old.clone()));
        Ok(self.output(old))
    }

    /// Remove the first item equal to `item`.
    pub fn remove(&self, item: &Value) -> Result<()> {
        let needle = to_raw(item.clone());
        let position = self
            .raw()
            .read()
            .iter()
            .position(|stored| raw_eq(stored, &needle));

        match position {
            Some(index) => self.delete(index as isize),
            None => Err(ReactivityError::ValueNotFound(item.clone())),
        }
    }

    /// Remove every item with a single keyless `Clear`.
    pub fn clear(&self) {
        self.raw().write().clear();
        trigger(self.target_id(), TriggerOpTypes::Clear, None, None, None);
    }

    /// A fresh list with the same items.
    pub fn copy(&self) -> RawList {
        self.track_whole(TrackOpTypes::Iter);
        self.raw().copy()
    }

    pub fn count(&self, item: &Value) -> usize {
        self.track_whole(TrackOpTypes::Iter);
        let needle = to_raw(item.clone());
        self.raw()
            .read()
            .iter()
            .filter(|stored| raw_eq(stored, &needle))
            .count()
    }

    /// Position of the first item equal to `item`.
    pub fn index(&self, item: &Value) -> Result<usize> {
        self.index_within(item, 0, None)
    }

    /// Position of the first item equal to `item` within `start..end`.
    pub fn index_within(&self, item: &Value, start: usize, end: Option<usize>) -> Result<usize> {
        self.track_whole(TrackOpTypes::Iter);
        let needle = to_raw(item.clone());
        let items = self.raw().read();
        let end = end.unwrap_or(items.len()).min(items.len());
        let start = start.min(end);

        items[start..end]
            .iter()
            .position(|stored| raw_eq(stored, &needle))
            .map(|offset| start + offset)
            .ok_or_else(|| ReactivityError::ValueNotFound(item.clone()))
    }

    /// Sort in natural order (numbers, strings or bools, not mixed).
    pub fn sort(&self, reverse: bool) -> Result<()> {
        let mut items = self.snapshot();
        if let Some(pair) = items.windows(2).find(|pair| pair[0].natural_cmp(&pair[1]).is_none()) {
            return Err(ReactivityError::NotOrderable(pair[0].kind(), pair[1].kind()));
        }

        items.sort_by(|a, b| {
            let ordering = a.natural_cmp(b).unwrap_or(Ordering::Equal);
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
        self.write_back(items);
        Ok(())
    }

    /// Stable sort with a caller-supplied comparison over stored values.
    ///
    /// The comparison runs on a copy with no lock held, so it may read this
    /// list; the sorted copy then replaces the contents.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut items = self.snapshot();
        items.sort_by(compare);
        self.write_back(items);
    }

    pub fn reverse(&self) {
        let mut items = self.snapshot();
        items.reverse();
        self.write_back(items);
    }

    fn snapshot(&self) -> Vec<Value> {
        self.raw().read().clone()
    }

    /// Replace the contents with a reordering, then `Set` every index that
    /// changed.
    fn write_back(&self, items: Vec<Value>) {
        let before = std::mem::replace(&mut *self.raw().write(), items.clone());

        let changed: Vec<(usize, (Value, Value))> = before
            .into_iter()
            .zip(items)
            .enumerate()
            .filter(|(_, (old, new))| has_changed(new, old))
            .collect();

        for (index, (old, new)) in changed {
            self.trigger_at(TriggerOpTypes::Set, index, Some(new), Some(old));
        }
    }
}

impl fmt::Display for ListProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.track_whole(TrackOpTypes::Iter);
        let rendered = serde_json::to_string(self.raw()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl fmt::Debug for ListProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListProxy")
            .field("target", &self.target_id())
            .field("shallow", &self.is_shallow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{reactive_dict, reactive_list, shallow_list};
    use crate::reactive::{record, Effect, HookEvent};
    use crate::value::RawDict;
    use parking_lot::Mutex;
    use serde_json::json;

    fn list(json: serde_json::Value) -> (RawList, ListProxy) {
        let raw = Value::from(json).as_raw_list().cloned().unwrap();
        let proxy = reactive_list(&raw);
        (raw, proxy)
    }

    fn triggered(
        proxy: &ListProxy,
        op: TriggerOpTypes,
        index: usize,
        new_value: Option<Value>,
        old_value: Option<Value>,
    ) -> HookEvent {
        HookEvent::Trigger {
            target: proxy.target_id(),
            op,
            key: Some(TargetKey::Index(index)),
            new_value,
            old_value,
        }
    }

    fn tracked(proxy: &ListProxy, op: TrackOpTypes, key: Option<TargetKey>) -> HookEvent {
        HookEvent::Track {
            target: proxy.target_id(),
            op,
            key,
        }
    }

    #[test]
    fn append_adds_at_old_length() {
        let (raw, proxy) = list(json!([1, 2, 3]));

        let ((), events) = record(|| proxy.append(4));
        assert_eq!(
            events,
            vec![triggered(&proxy, TriggerOpTypes::Add, 3, Some(Value::Int(4)), None)]
        );
        assert_eq!(Value::from(raw), Value::from(json!([1, 2, 3, 4])));
    }

    #[test]
    fn pop_deletes_last_index_with_old_value() {
        let (raw, proxy) = list(json!([1, 2, 3]));

        let (popped, events) = record(|| proxy.pop());
        assert_eq!(popped, Ok(Value::Int(3)));
        assert_eq!(
            events,
            vec![triggered(&proxy, TriggerOpTypes::Delete, 2, None, Some(Value::Int(3)))]
        );
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn pop_on_empty_and_out_of_range() {
        let (_, proxy) = list(json!([]));
        assert_eq!(proxy.pop(), Err(ReactivityError::Empty("list")));

        proxy.append(1);
        let (result, events) = record(|| proxy.pop_at(5));
        assert_eq!(
            result,
            Err(ReactivityError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert!(events.is_empty());
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let (_, proxy) = list(json!([10, 20, 30]));

        let (value, events) = record(|| proxy.get(-1));
        assert_eq!(value, Ok(Value::Int(30)));
        assert_eq!(
            events,
            vec![
                tracked(&proxy, TrackOpTypes::Iter, None),
                tracked(&proxy, TrackOpTypes::Get, Some(TargetKey::Index(2))),
            ]
        );

        let (result, events) = record(|| proxy.set(-3, 11));
        result.unwrap();
        assert_eq!(
            events,
            vec![triggered(
                &proxy,
                TriggerOpTypes::Set,
                0,
                Some(Value::Int(11)),
                Some(Value::Int(10))
            )]
        );

        assert_eq!(
            proxy.get(-4),
            Err(ReactivityError::IndexOutOfRange { index: -4, len: 3 })
        );
    }

    #[test]
    fn failed_reads_are_still_tracked() {
        let (_, proxy) = list(json!([1, 2, 3]));

        let (value, events) = record(|| proxy.get(3));
        assert_eq!(value, Err(ReactivityError::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(
            events,
            vec![tracked(&proxy, TrackOpTypes::Get, Some(TargetKey::Index(3)))]
        );

        let (value, events) = record(|| proxy.get(-4));
        assert!(value.is_err());
        assert_eq!(events, vec![tracked(&proxy, TrackOpTypes::Iter, None)]);
    }

    #[test]
    fn effect_on_last_item_follows_appends() {
        let (_, proxy) = list(json!([1, 2, 3]));
        let last = Arc::new(Mutex::new(Value::Null));

        let reader = proxy.clone();
        let last_clone = last.clone();
        let _effect = Effect::new(move || {
            *last_clone.lock() = reader.get(-1).unwrap_or_default();
        });
        assert_eq!(*last.lock(), Value::Int(3));

        proxy.append(4);
        assert_eq!(*last.lock(), Value::Int(4));

        proxy.pop().unwrap();
        assert_eq!(*last.lock(), Value::Int(3));
    }

    #[test]
    fn effect_past_the_end_runs_once_index_exists() {
        let (_, proxy) = list(json!([1, 2, 3]));
        let seen = Arc::new(Mutex::new(None));

        let reader = proxy.clone();
        let seen_clone = seen.clone();
        let effect = Effect::new(move || {
            *seen_clone.lock() = reader.get(3).ok();
        });
        assert_eq!(*seen.lock(), None);

        proxy.append(4);
        assert_eq!(*seen.lock(), Some(Value::Int(4)));
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn sort_by_comparator_may_read_the_list() {
        let (raw, proxy) = list(json!([3, 1, 2]));

        let reader = proxy.clone();
        proxy.sort_by(|a, b| {
            assert_eq!(reader.len(), 3);
            a.natural_cmp(b).unwrap_or(Ordering::Equal)
        });
        assert_eq!(Value::from(raw), Value::from(json!([1, 2, 3])));
    }

    #[test]
    fn unchanged_set_does_not_trigger() {
        let (_, proxy) = list(json!([1.0]));

        let (result, events) = record(|| proxy.set(0, 1));
        result.unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn insert_clamps_to_either_end() {
        let (raw, proxy) = list(json!([1, 2]));

        let ((), events) = record(|| proxy.insert(10, 3));
        assert_eq!(
            events,
            vec![triggered(&proxy, TriggerOpTypes::Add, 2, Some(Value::Int(3)), None)]
        );

        let ((), events) = record(|| proxy.insert(-10, 0));
        assert_eq!(
            events,
            vec![triggered(&proxy, TriggerOpTypes::Add, 0, Some(Value::Int(0)), None)]
        );

        proxy.insert(-1, 9);
        assert_eq!(Value::from(raw), Value::from(json!([0, 1, 2, 9, 3])));
    }

    #[test]
    fn extend_adds_each_item() {
        let (_, proxy) = list(json!(["a"]));

        let ((), events) = record(|| proxy.extend(["b", "c"]));
        assert_eq!(
            events,
            vec![
                triggered(&proxy, TriggerOpTypes::Add, 1, Some(Value::from("b")), None),
                triggered(&proxy, TriggerOpTypes::Add, 2, Some(Value::from("c")), None),
            ]
        );
    }

    #[test]
    fn remove_deletes_first_match() {
        let (raw, proxy) = list(json!([1, 2, 1]));

        let (result, events) = record(|| proxy.remove(&Value::Int(1)));
        result.unwrap();
        assert_eq!(
            events,
            vec![triggered(&proxy, TriggerOpTypes::Delete, 0, None, Some(Value::Int(1)))]
        );
        assert_eq!(Value::from(raw), Value::from(json!([2, 1])));

        assert_eq!(
            proxy.remove(&Value::Int(7)),
            Err(ReactivityError::ValueNotFound(Value::Int(7)))
        );
    }

    #[test]
    fn clear_emits_one_keyless_event() {
        let (raw, proxy) = list(json!([1, 2, 3]));

        let ((), events) = record(|| proxy.clear());
        assert_eq!(
            events,
            vec![HookEvent::Trigger {
                target: proxy.target_id(),
                op: TriggerOpTypes::Clear,
                key: None,
                new_value: None,
                old_value: None,
            }]
        );
        assert!(raw.is_empty());
    }

    #[test]
    fn whole_list_reads_track_without_key() {
        let (_, proxy) = list(json!([1, 2, 2]));

        let (_, events) = record(|| {
            proxy.len();
            proxy.count(&Value::Int(2));
            proxy.index(&Value::Int(2)).unwrap();
            proxy.copy();
            proxy.iter().count();
        });
        assert_eq!(events.len(), 5);
        assert!(events
            .iter()
            .all(|event| *event == tracked(&proxy, TrackOpTypes::Iter, None)));

        let (found, events) = record(|| proxy.contains(&Value::Int(1)));
        assert!(found);
        assert_eq!(events, vec![tracked(&proxy, TrackOpTypes::Has, None)]);
    }

    #[test]
    fn index_within_respects_bounds() {
        let (_, proxy) = list(json!(["a", "b", "a", "c"]));
        let a = Value::from("a");

        assert_eq!(proxy.index(&a), Ok(0));
        assert_eq!(proxy.index_within(&a, 1, None), Ok(2));
        assert_eq!(
            proxy.index_within(&a, 1, Some(2)),
            Err(ReactivityError::ValueNotFound(a.clone()))
        );
        assert_eq!(proxy.count(&a), 2);
    }

    #[test]
    fn sort_sets_each_moved_index() {
        let (raw, proxy) = list(json!([3, 1, 2]));

        let (result, events) = record(|| proxy.sort(false));
        result.unwrap();
        assert_eq!(Value::from(raw), Value::from(json!([1, 2, 3])));
        assert_eq!(
            events,
            vec![
                triggered(&proxy, TriggerOpTypes::Set, 0, Some(Value::Int(1)), Some(Value::Int(3))),
                triggered(&proxy, TriggerOpTypes::Set, 1, Some(Value::Int(2)), Some(Value::Int(1))),
                triggered(&proxy, TriggerOpTypes::Set, 2, Some(Value::Int(3)), Some(Value::Int(2))),
            ]
        );

        let (result, events) = record(|| proxy.sort(false));
        result.unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn sort_rejects_mixed_kinds_untouched() {
        let (raw, proxy) = list(json!([2, "a", 1]));

        let (result, events) = record(|| proxy.sort(true));
        assert_eq!(result, Err(ReactivityError::NotOrderable("int", "str")));
        assert!(events.is_empty());
        assert_eq!(Value::from(raw), Value::from(json!([2, "a", 1])));
    }

    #[test]
    fn reverse_skips_the_middle_element() {
        let (_, proxy) = list(json!(["x", "y", "z"]));

        let ((), events) = record(|| proxy.reverse());
        let indices: Vec<_> = events
            .iter()
            .map(|event| match event {
                HookEvent::Trigger { key: Some(TargetKey::Index(i)), .. } => *i,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn sort_by_uses_the_given_order() {
        let (raw, proxy) = list(json!(["bb", "a", "ccc"]));

        proxy.sort_by(|a, b| {
            let len = |v: &Value| v.as_str().map(str::len).unwrap_or(0);
            len(b).cmp(&len(a))
        });
        assert_eq!(Value::from(raw), Value::from(json!(["ccc", "bb", "a"])));
    }

    #[test]
    fn reads_wrap_nested_containers() {
        let (_, proxy) = list(json!([{"n": 1}, [2]]));

        let first = proxy.get(0).unwrap();
        let inner = first.as_dict_proxy().unwrap();
        assert!(inner.ptr_eq(&reactive_dict(inner.raw())));

        let items: Vec<Value> = proxy.iter().collect();
        assert!(items[1].as_list_proxy().is_some());
    }

    #[test]
    fn writes_store_raw_containers() {
        let (raw, proxy) = list(json!([]));
        let child = reactive_dict(&RawDict::new());

        proxy.append(child.clone());
        assert!(raw.get(0).unwrap().as_raw_dict().unwrap().ptr_eq(child.raw()));
        assert!(proxy.contains(&Value::from(child.clone())));
        assert_eq!(proxy.index(&Value::from(child)), Ok(0));
    }

    #[test]
    fn shallow_list_returns_values_as_stored() {
        let raw = RawList::new();
        raw.push(RawDict::new());
        let proxy = shallow_list(&raw);

        assert!(proxy.get(0).unwrap().as_raw_dict().is_some());
        assert!(proxy.pop().unwrap().as_raw_dict().is_some());
    }

    #[test]
    fn display_renders_json_and_tracks() {
        let (_, proxy) = list(json!([1, "two", null]));

        let (text, events) = record(|| proxy.to_string());
        assert_eq!(text, r#"[1,"two",null]"#);
        assert_eq!(events, vec![tracked(&proxy, TrackOpTypes::Iter, None)]);
    }
}
