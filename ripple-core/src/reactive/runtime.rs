//! Reactive Runtime
//!
//! The runtime is the effect-scheduling side of the hooks. It owns the
//! dependency table and re-runs dependents when a container changes.
//!
//! # How It Works
//!
//! 1. When a running computation reads a proxy, `track` records
//!    `(target, key) -> subscriber` in the table.
//!
//! 2. When a proxy writes, `trigger` looks up every subscriber whose
//!    recorded key is affected by the change:
//!    a. the exact key that changed
//!    b. whole-container dependencies (`None` and `Iterate` keys)
//!    c. for an insertion or removal at list index `i`, every index `>= i`,
//!       since those elements shifted
//!    d. everything, when the trigger itself names no key
//!
//! 3. Affected subscribers are deduplicated (first-seen order) and scheduled
//!    after every lock has been released, so a re-running effect can read
//!    and write proxies freely.
//!
//! # Thread Safety
//!
//! The running-computation stack is thread-local (see `ReactiveContext`);
//! the subscriber registry and the dependency table are global.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::context::{Dependency, ReactiveContext};
use super::hooks::{TargetKey, TriggerOpTypes};
use super::subscriber::SubscriberId;
use crate::value::TargetId;

/// A computation the runtime can re-run.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run in response to a triggered dependency.
    fn schedule(&self);
}

/// Handle to a registered computation.
///
/// Dropping this handle unregisters the computation and forgets all of its
/// dependencies.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

type Subscribers = SmallVec<[SubscriberId; 4]>;

/// Dependents of one container, by key, in first-tracked order.
type TargetDependents = IndexMap<Option<TargetKey>, Subscribers>;

// Maps subscriber IDs to weak references to avoid preventing cleanup.
static REGISTRY: OnceLock<RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>>> = OnceLock::new();
static DEPENDENTS: OnceLock<DashMap<TargetId, TargetDependents>> = OnceLock::new();

fn get_registry() -> &'static RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn get_dependents() -> &'static DashMap<TargetId, TargetDependents> {
    DEPENDENTS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// Returns a handle that unregisters it when dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();

        get_registry().write().insert(id, Arc::downgrade(&reactive));

        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        get_registry().write().remove(&id);

        let dependents = get_dependents();
        for mut table in dependents.iter_mut() {
            for subscribers in table.values_mut() {
                subscribers.retain(|s| *s != id);
            }
            table.retain(|_, subscribers| !subscribers.is_empty());
        }
        dependents.retain(|_, table| !table.is_empty());
    }

    /// Attribute a read of `(target, key)` to the running computation.
    ///
    /// No-op when nothing is running.
    pub fn track(target: TargetId, key: Option<TargetKey>) {
        let Some(subscriber_id) = ReactiveContext::current_subscriber() else {
            return;
        };

        let dependency = Dependency { target, key };
        if ReactiveContext::track_dependency(dependency.clone()) {
            Self::add_dependency(&dependency, subscriber_id);
        }
    }

    /// Record that a subscriber depends on `(target, key)`.
    pub fn add_dependency(dependency: &Dependency, subscriber_id: SubscriberId) {
        let mut table = get_dependents().entry(dependency.target).or_default();
        let subscribers = table.entry(dependency.key.clone()).or_default();
        if !subscribers.contains(&subscriber_id) {
            subscribers.push(subscriber_id);
        }
    }

    /// Forget the given dependencies of a subscriber.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn remove_dependencies(subscriber_id: SubscriberId, dependencies: &[Dependency]) {
        let dependents = get_dependents();

        for dependency in dependencies {
            let now_empty = match dependents.get_mut(&dependency.target) {
                Some(mut table) => {
                    if let Some(subscribers) = table.get_mut(&dependency.key) {
                        subscribers.retain(|s| *s != subscriber_id);
                        if subscribers.is_empty() {
                            table.shift_remove(&dependency.key);
                        }
                    }
                    table.is_empty()
                }
                None => false,
            };

            if now_empty {
                dependents.remove_if(&dependency.target, |_, table| table.is_empty());
            }
        }
    }

    /// Notify every subscriber affected by a change to `(target, key)`.
    ///
    /// Never fails; a change nobody depends on is simply dropped.
    pub fn trigger(target: TargetId, op: TriggerOpTypes, key: Option<&TargetKey>) {
        let subscriber_ids = Self::collect_dependents(target, op, key);
        if subscriber_ids.is_empty() {
            return;
        }

        let scheduled: Vec<Arc<dyn Reactive>> = {
            let registry = get_registry().read();
            subscriber_ids
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        tracing::debug!(%target, ?op, count = scheduled.len(), "scheduling dependents");

        for reactive in scheduled {
            reactive.schedule();
        }
    }

    fn collect_dependents(
        target: TargetId,
        op: TriggerOpTypes,
        key: Option<&TargetKey>,
    ) -> IndexSet<SubscriberId> {
        let mut ids = IndexSet::new();

        if let Some(table) = get_dependents().get(&target) {
            for (read, subscribers) in table.iter() {
                if is_affected(op, key, read.as_ref()) {
                    ids.extend(subscribers.iter().copied());
                }
            }
        }

        ids
    }

    /// Number of distinct subscribers depending on any key of `target`.
    pub fn dependent_count(target: TargetId) -> usize {
        get_dependents()
            .get(&target)
            .map(|table| {
                table
                    .values()
                    .flat_map(|subscribers| subscribers.iter())
                    .collect::<IndexSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracked computation.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Whether a write to `changed` invalidates a read of `read`.
fn is_affected(op: TriggerOpTypes, changed: Option<&TargetKey>, read: Option<&TargetKey>) -> bool {
    match (changed, read) {
        (None, _) | (_, None) | (_, Some(TargetKey::Iterate(_))) => true,
        (Some(TargetKey::Index(changed)), Some(TargetKey::Index(read))) => {
            let shifts = matches!(op, TriggerOpTypes::Add | TriggerOpTypes::Delete);
            read == changed || (shifts && read > changed)
        }
        (Some(changed), Some(read)) => changed == read,
    }
}
