//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This is the "active computation" that `track` attributes reads to.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes its subscriber
//! onto the stack; the guard pops it on drop. An untracked region pushes an
//! entry with no subscriber, which hides any outer computation until the
//! region ends.
//!
//! Nested contexts (an effect created inside another effect) each collect
//! their own dependencies.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::hooks::TargetKey;
use super::SubscriberId;
use crate::value::TargetId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// A `(target, key)` pair a computation read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub target: TargetId,
    pub key: Option<TargetKey>,
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct ContextEntry {
    /// `None` marks an untracked region.
    subscriber_id: Option<SubscriberId>,
    /// Dependencies collected during this computation, in first-read order.
    dependencies: IndexSet<Dependency>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is exited when the returned guard is dropped.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a region where reads create no dependency edges.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: IndexSet::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if a tracked computation is currently running.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a dependency of the current computation.
    ///
    /// Returns `false` when the dependency was already recorded.
    pub fn track_dependency(dependency: Dependency) -> bool {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().last_mut() {
            Some(entry) if entry.subscriber_id.is_some() => entry.dependencies.insert(dependency),
            _ => false,
        })
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Vec<Dependency> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.iter().cloned().collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without attributing its reads to the running computation.
///
/// Proxies still emit their track events; they just create no edges.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
