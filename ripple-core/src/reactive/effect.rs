//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever a proxy
//! entry it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When a trigger hits one of those dependencies, the runtime schedules
//!    the effect, which re-runs synchronously inside the trigger call.
//!
//! 3. Before re-running, the effect forgets its old dependencies and tracks
//!    new ones during execution.
//!
//! An effect that writes to something it also reads does not re-schedule
//! itself while it is running. A change made on another thread while the
//! effect is running is not lost: the running thread runs it again.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{Dependency, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique effect ID.
fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// State shared by all clones of an effect; this is what the runtime holds.
struct EffectInner {
    id: u64,
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    dependencies: Mutex<Vec<Dependency>>,
    disposed: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
}

thread_local! {
    /// Effects currently running on this thread, innermost last.
    static RUNNING_HERE: RefCell<Vec<SubscriberId>> = RefCell::new(Vec::new());
}

fn is_running_here(id: SubscriberId) -> bool {
    RUNNING_HERE.with(|running| running.borrow().contains(&id))
}

/// Marks an effect as running on this thread, and on the effect itself.
///
/// Both marks are cleared on drop, even if the effect function panics.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool, id: SubscriberId) -> Self {
        RUNNING_HERE.with(|running| running.borrow_mut().push(id));
        Self { flag }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        RUNNING_HERE.with(|running| {
            running.borrow_mut().pop();
        });
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    /// Run now, or hand the run to the thread already running this effect.
    ///
    /// A run requested from inside the effect's own run, on the same thread,
    /// is dropped. A run requested from another thread while the effect is
    /// running marks it pending; the running thread repeats the run before
    /// letting go.
    fn execute(&self) {
        if is_running_here(self.subscriber_id) {
            tracing::trace!(effect = self.id, "skipping recursive run");
            return;
        }

        self.pending.store(true, Ordering::SeqCst);
        loop {
            if self.running.swap(true, Ordering::SeqCst) {
                tracing::trace!(effect = self.id, "deferring run to the running thread");
                return;
            }

            {
                let _running = RunningGuard::enter(&self.running, self.subscriber_id);
                while self.pending.swap(false, Ordering::SeqCst) {
                    if self.disposed.load(Ordering::SeqCst) {
                        return;
                    }
                    self.run_once();
                }
            }

            if !self.pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn run_once(&self) {
        let stale = std::mem::take(&mut *self.dependencies.lock());
        Runtime::remove_dependencies(self.subscriber_id, &stale);

        let dependencies = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.run)();
            ReactiveContext::get_dependencies()
        };

        tracing::debug!(
            effect = self.id,
            dependencies = dependencies.len(),
            "effect ran"
        );

        *self.dependencies.lock() = dependencies;
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let dependencies = std::mem::take(&mut *self.dependencies.lock());
            Runtime::remove_dependencies(self.subscriber_id, &dependencies);
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn schedule(&self) {
        self.execute();
    }
}

/// A side-effecting computation that re-runs when what it read changes.
///
/// Clones share state. The effect stays registered until it is disposed or
/// its last clone is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(json!({"count": 0}))?;
/// let dict = state.as_dict().unwrap().clone();
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", dict.get("count").unwrap());
/// });
///
/// state.as_dict().unwrap().set("count", 5)?;  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);

        // Run immediately to establish dependencies
        effect.execute();

        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies, and so never re-runs, until executed once.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: next_effect_id(),
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            dependencies: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect function now, re-collecting its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Re-run in response to a change. Same as `execute`.
    pub fn schedule(&self) {
        self.inner.schedule();
    }

    /// Stop the effect. It will not run again and its dependencies are
    /// dropped from the runtime.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies recorded by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
