//! Dictionary Proxy
//!
//! Reads track the key they touch (or the whole dictionary, for length,
//! enumeration, rendering and copies). Writes update the dictionary first,
//! then trigger:
//!
//! - `Add` when the key is new,
//! - `Set` when an existing key now holds a different value,
//! - `Delete` when a key is removed (`delete`, `pop`, `pop_item`),
//! - `Clear` once per removed key on `clear`.
//!
//! Writing an equal value triggers nothing.

use std::fmt;
use std::sync::Arc;

use super::registry::{is_shallow, to_raw, to_reactive};
use super::ProxyState;
use crate::error::{ReactivityError, Result};
use crate::reactive::{track, trigger, IterateKey, TargetKey, TrackOpTypes, TriggerOpTypes};
use crate::value::{has_changed, Key, RawDict, TargetId, Value};

/// Names a caller may never write through a proxy.
const RESERVED_FIELDS: [&str; 2] = ["__raw__", "__shallow__"];

fn check_writable(key: &Key) -> Result<()> {
    match key {
        Key::Str(name) if RESERVED_FIELDS.contains(&name.as_str()) => {
            Err(ReactivityError::ReadOnlyField(name.clone()))
        }
        _ => Ok(()),
    }
}

/// Reactive view of a `RawDict`.
#[derive(Clone)]
pub struct DictProxy {
    state: Arc<ProxyState<RawDict>>,
}

impl DictProxy {
    pub(crate) fn from_state(state: Arc<ProxyState<RawDict>>) -> Self {
        Self { state }
    }

    pub(crate) fn raw(&self) -> &RawDict {
        &self.state.target
    }

    /// Identity of the wrapped dictionary.
    pub fn target_id(&self) -> TargetId {
        self.state.target.id()
    }

    pub fn is_shallow(&self) -> bool {
        self.state.shallow
    }

    /// Whether both are the same proxy instance.
    pub fn ptr_eq(&self, other: &DictProxy) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn track_key(&self, op: TrackOpTypes, key: &Key) {
        track(self.target_id(), op, Some(TargetKey::Key(key.clone())));
    }

    fn track_iter(&self) {
        track(
            self.target_id(),
            TrackOpTypes::Iter,
            Some(TargetKey::Iterate(IterateKey::Dict)),
        );
    }

    fn trigger(&self, op: TriggerOpTypes, key: Key, new: Option<Value>, old: Option<Value>) {
        trigger(self.target_id(), op, Some(TargetKey::Key(key)), new, old);
    }

    fn output(&self, value: Value) -> Value {
        convert(value, self.is_shallow())
    }

    /// Strict read: fails with `KeyNotFound` when the key is absent.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        if !self.raw().read().contains_key(&key) {
            return Err(ReactivityError::KeyNotFound(key));
        }

        self.track_key(TrackOpTypes::Get, &key);
        let value = self
            .raw()
            .get(&key)
            .ok_or_else(|| ReactivityError::KeyNotFound(key))?;
        Ok(self.output(value))
    }

    /// Lenient read. `default` is returned as given, never wrapped.
    pub fn get_or(&self, key: impl Into<Key>, default: impl Into<Value>) -> Value {
        let key = key.into();
        self.track_key(TrackOpTypes::Get, &key);
        match self.raw().get(&key) {
            Some(value) => self.output(value),
            None => default.into(),
        }
    }

    /// Write `value` under `key`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        check_writable(&key)?;

        let mut value = value.into();
        let normalize = !self.is_shallow() && !is_shallow(&value);
        if normalize {
            value = to_raw(value);
        }

        let old = self.raw().write().insert(key.clone(), value.clone());

        match old {
            None => self.trigger(TriggerOpTypes::Add, key, Some(value), None),
            Some(old) => {
                let old = if normalize { to_raw(old) } else { old };
                if has_changed(&value, &old) {
                    self.trigger(TriggerOpTypes::Set, key, Some(value), Some(old));
                }
            }
        }
        Ok(())
    }

    /// Remove `key`. Absent keys are a silent no-op.
    pub fn delete(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        check_writable(&key)?;

        let old = self.raw().write().shift_remove(&key);
        if let Some(old) = old {
            self.trigger(TriggerOpTypes::Delete, key, None, Some(old));
        }
        Ok(())
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.track_key(TrackOpTypes::Has, &key);
        self.raw().read().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.track_iter();
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order, snapshotted when called.
    pub fn keys(&self) -> impl Iterator<Item = Key> {
        self.track_iter();
        let keys: Vec<Key> = self.raw().read().keys().cloned().collect();
        keys.into_iter()
    }

    /// Same as `keys`.
    pub fn iter(&self) -> impl Iterator<Item = Key> {
        self.keys()
    }

    /// Values in insertion order; nested containers are wrapped as yielded.
    pub fn values(&self) -> impl Iterator<Item = Value> {
        self.track_iter();
        let shallow = self.is_shallow();
        let values: Vec<Value> = self.raw().read().values().cloned().collect();
        values.into_iter().map(move |value| convert(value, shallow))
    }

    /// Entries in insertion order; nested containers are wrapped as yielded.
    pub fn items(&self) -> impl Iterator<Item = (Key, Value)> {
        self.track_iter();
        let shallow = self.is_shallow();
        let entries: Vec<(Key, Value)> = self
            .raw()
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries
            .into_iter()
            .map(move |(key, value)| (key, convert(value, shallow)))
    }

    /// A fresh dictionary with the same entries.
    pub fn copy(&self) -> RawDict {
        self.track_iter();
        self.raw().copy()
    }

    /// Remove and return the value under `key`; `KeyNotFound` when absent.
    pub fn pop(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        let removed = self.raw().write().shift_remove(&key);
        match removed {
            Some(old) => {
                self.trigger(TriggerOpTypes::Delete, key, None, Some(old.clone()));
                Ok(self.output(old))
            }
            None => Err(ReactivityError::KeyNotFound(key)),
        }
    }

    /// Remove and return the value under `key`, or `default` when absent.
    pub fn pop_or(&self, key: impl Into<Key>, default: impl Into<Value>) -> Value {
        self.pop(key).unwrap_or_else(|_| default.into())
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_item(&self) -> Result<(Key, Value)> {
        let removed = self.raw().write().pop();
        let (key, old) = removed.ok_or(ReactivityError::Empty("dict"))?;
        self.trigger(TriggerOpTypes::Delete, key.clone(), None, Some(old.clone()));
        Ok((key, self.output(old)))
    }

    /// Write `default` under `key` unless the key is already present.
    pub fn set_default(&self, key: impl Into<Key>, default: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.raw().read().contains_key(&key) {
            return Ok(());
        }
        self.set(key, default)
    }

    /// `set` each entry in turn. Every key is checked before anything is
    /// written.
    pub fn update<K, V, I>(&self, other: I) -> Result<()>
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(Key, Value)> = other
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for (key, _) in &entries {
            check_writable(key)?;
        }
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove every entry, triggering `Clear` once per removed key.
    pub fn clear(&self) {
        let removed: Vec<(Key, Value)> = self.raw().write().drain(..).collect();
        for (key, old) in removed {
            self.trigger(TriggerOpTypes::Clear, key, None, Some(old));
        }
    }
}

fn convert(value: Value, shallow: bool) -> Value {
    if shallow {
        value
    } else {
        to_reactive(value)
    }
}

impl fmt::Display for DictProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.track_iter();
        let rendered = serde_json::to_string(self.raw()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl fmt::Debug for DictProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictProxy")
            .field("target", &self.target_id())
            .field("shallow", &self.is_shallow())
            .finish()
    }
}
