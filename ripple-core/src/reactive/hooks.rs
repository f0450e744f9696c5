//! Dependency Hooks
//!
//! The two entry points proxies call into: `track` before a read and
//! `trigger` after a write. Both are plain synchronous calls.
//!
//! # Dispatch
//!
//! Each call is
//!
//! 1. logged at `trace` level,
//! 2. appended to the innermost event recorder on the current thread, if
//!    one is active (see `record`),
//! 3. forwarded to the `Runtime`, which owns the dependency table and
//!    re-runs affected effects.
//!
//! Neither entry point fails. A `track` with no running computation and a
//! `trigger` with no dependents are both no-ops as far as the runtime is
//! concerned.

use std::cell::RefCell;

use super::runtime::Runtime;
use crate::value::{Key, TargetId, Value};

/// Kinds of read a computation can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOpTypes {
    /// Read of one key or index.
    Get,
    /// Containment check.
    Has,
    /// Enumeration of the whole container (length, iteration, rendering, copy).
    Iter,
}

/// Kinds of write a container can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOpTypes {
    /// A new key or index was introduced.
    Add,
    /// An existing key or index now holds a different value.
    Set,
    /// A key or index was removed.
    Delete,
    /// Entries were removed by a bulk clear.
    Clear,
}

/// Marker key for whole-container enumeration.
///
/// Only dictionaries use a marker; lists track their coarse reads with no
/// key at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterateKey {
    Dict,
}

/// The key half of a `(target, key)` dependency.
///
/// `None` in the hook signatures means "no particular key": a dependency on
/// the container as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Key(Key),
    Index(usize),
    Iterate(IterateKey),
}

impl From<Key> for TargetKey {
    fn from(key: Key) -> Self {
        TargetKey::Key(key)
    }
}

impl From<usize> for TargetKey {
    fn from(index: usize) -> Self {
        TargetKey::Index(index)
    }
}

/// A single `track` or `trigger` call, as seen by a recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Track {
        target: TargetId,
        op: TrackOpTypes,
        key: Option<TargetKey>,
    },
    Trigger {
        target: TargetId,
        op: TriggerOpTypes,
        key: Option<TargetKey>,
        new_value: Option<Value>,
        old_value: Option<Value>,
    },
}

impl HookEvent {
    pub fn target(&self) -> TargetId {
        match self {
            HookEvent::Track { target, .. } | HookEvent::Trigger { target, .. } => *target,
        }
    }

    pub fn is_track(&self) -> bool {
        matches!(self, HookEvent::Track { .. })
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, HookEvent::Trigger { .. })
    }
}

thread_local! {
    static RECORDERS: RefCell<Vec<Vec<HookEvent>>> = RefCell::new(Vec::new());
}

fn is_recording() -> bool {
    RECORDERS.with(|recorders| !recorders.borrow().is_empty())
}

fn emit(event: HookEvent) {
    RECORDERS.with(|recorders| {
        if let Some(events) = recorders.borrow_mut().last_mut() {
            events.push(event);
        }
    });
}

/// Pops the recorder even if the recorded closure panics.
struct RecorderGuard {
    armed: bool,
}

impl RecorderGuard {
    fn finish(mut self) -> Vec<HookEvent> {
        self.armed = false;
        RECORDERS.with(|recorders| recorders.borrow_mut().pop().unwrap_or_default())
    }
}

impl Drop for RecorderGuard {
    fn drop(&mut self) {
        if self.armed {
            RECORDERS.with(|recorders| {
                recorders.borrow_mut().pop();
            });
        }
    }
}

/// Run `f` and collect every hook call it makes on this thread.
///
/// Recorders nest; events go to the innermost one only. Calls are still
/// forwarded to the runtime as usual.
pub fn record<R>(f: impl FnOnce() -> R) -> (R, Vec<HookEvent>) {
    RECORDERS.with(|recorders| recorders.borrow_mut().push(Vec::new()));
    let guard = RecorderGuard { armed: true };
    let result = f();
    (result, guard.finish())
}

/// Record that the running computation read `(target, key)`.
pub fn track(target: TargetId, op: TrackOpTypes, key: Option<TargetKey>) {
    tracing::trace!(%target, ?op, ?key, "track");

    if is_recording() {
        emit(HookEvent::Track {
            target,
            op,
            key: key.clone(),
        });
    }

    Runtime::track(target, key);
}

/// Announce that `(target, key)` changed.
///
/// `None` for either value means "absent": no new value for deletes, no
/// old value for additions.
pub fn trigger(
    target: TargetId,
    op: TriggerOpTypes,
    key: Option<TargetKey>,
    new_value: Option<Value>,
    old_value: Option<Value>,
) {
    tracing::trace!(%target, ?op, ?key, "trigger");

    if is_recording() {
        emit(HookEvent::Trigger {
            target,
            op,
            key: key.clone(),
            new_value,
            old_value,
        });
    }

    Runtime::trigger(target, op, key.as_ref());
}
