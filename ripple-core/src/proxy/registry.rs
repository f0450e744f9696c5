//! Raw/Reactive Registry
//!
//! Maps each raw container to its proxy so that wrapping is idempotent.
//! The reverse direction needs no table: a proxy carries its own target.
//!
//! # Lifetime
//!
//! The table starts empty and is never torn down. It holds weak references,
//! so an entry lives exactly as long as someone holds its proxy; wrapping a
//! container whose proxy has been dropped builds a fresh one. Dead entries
//! are swept whenever the table doubles in size.
//!
//! # Thread Safety
//!
//! One mutex guards both tables, so two threads wrapping the same container
//! at the same time always get the same proxy.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::{DictProxy, ListProxy, Proxy, ProxyState};
use crate::error::{ReactivityError, Result};
use crate::value::{RawDict, RawList, TargetId, Value};

/// Table size below which dead entries are never swept.
const MIN_PRUNE_THRESHOLD: usize = 64;

/// Proxies by `(container, shallow)`.
type Table<T> = HashMap<(TargetId, bool), Weak<ProxyState<T>>>;

struct Registry {
    dicts: Table<RawDict>,
    lists: Table<RawList>,
    prune_at: usize,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn get_registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

impl Registry {
    fn new() -> Self {
        Self {
            dicts: HashMap::new(),
            lists: HashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    fn len(&self) -> usize {
        self.dicts.len() + self.lists.len()
    }

    fn dict(&mut self, raw: &RawDict, shallow: bool) -> Arc<ProxyState<RawDict>> {
        let state = canonical(&mut self.dicts, raw.id(), raw, shallow);
        self.maybe_prune();
        state
    }

    fn list(&mut self, raw: &RawList, shallow: bool) -> Arc<ProxyState<RawList>> {
        let state = canonical(&mut self.lists, raw.id(), raw, shallow);
        self.maybe_prune();
        state
    }

    fn maybe_prune(&mut self) {
        let before = self.len();
        if before < self.prune_at {
            return;
        }

        self.dicts.retain(|_, state| state.strong_count() > 0);
        self.lists.retain(|_, state| state.strong_count() > 0);

        let live = self.len();
        self.prune_at = (live * 2).max(MIN_PRUNE_THRESHOLD);
        tracing::debug!(before, live, next = self.prune_at, "pruned proxy registry");
    }
}

/// Look up the live proxy state for `raw`, or create and register one.
fn canonical<T: Clone>(
    table: &mut Table<T>,
    id: TargetId,
    raw: &T,
    shallow: bool,
) -> Arc<ProxyState<T>> {
    if let Some(state) = table.get(&(id, shallow)).and_then(Weak::upgrade) {
        return state;
    }

    tracing::debug!(target = %id, shallow, "creating proxy");
    let state = Arc::new(ProxyState {
        target: raw.clone(),
        shallow,
    });
    table.insert((id, shallow), Arc::downgrade(&state));
    state
}

/// The deep proxy for a dictionary.
pub fn reactive_dict(raw: &RawDict) -> DictProxy {
    DictProxy::from_state(get_registry().lock().dict(raw, false))
}

/// The shallow proxy for a dictionary.
pub fn shallow_dict(raw: &RawDict) -> DictProxy {
    DictProxy::from_state(get_registry().lock().dict(raw, true))
}

/// The deep proxy for a list.
pub fn reactive_list(raw: &RawList) -> ListProxy {
    ListProxy::from_state(get_registry().lock().list(raw, false))
}

/// The shallow proxy for a list.
pub fn shallow_list(raw: &RawList) -> ListProxy {
    ListProxy::from_state(get_registry().lock().list(raw, true))
}

/// Wrap a container in its canonical proxy.
///
/// A value that already is a proxy comes back unchanged, whatever its
/// mode. Scalars fail with `NotReactiveEligible`.
pub fn wrap(value: &Value, shallow: bool) -> Result<Proxy> {
    match (value, shallow) {
        (Value::Proxy(proxy), _) => Ok(proxy.clone()),
        (Value::Dict(raw), false) => Ok(Proxy::Dict(reactive_dict(raw))),
        (Value::Dict(raw), true) => Ok(Proxy::Dict(shallow_dict(raw))),
        (Value::List(raw), false) => Ok(Proxy::List(reactive_list(raw))),
        (Value::List(raw), true) => Ok(Proxy::List(shallow_list(raw))),
        (other, _) => Err(ReactivityError::NotReactiveEligible(other.kind())),
    }
}

/// Deep-wrap a container.
pub fn reactive(value: impl Into<Value>) -> Result<Proxy> {
    wrap(&value.into(), false)
}

/// Shallow-wrap a container.
pub fn shallow_reactive(value: impl Into<Value>) -> Result<Proxy> {
    wrap(&value.into(), true)
}

/// The container behind a proxy; anything else comes back unchanged.
pub fn to_raw(value: Value) -> Value {
    match value {
        Value::Proxy(proxy) => proxy.to_raw(),
        other => other,
    }
}

/// Deep-wrap containers; anything else comes back unchanged.
///
/// Applied to values on their way out of a deep proxy, which is what makes
/// reactivity transitive.
pub fn to_reactive(value: Value) -> Value {
    match value {
        Value::Dict(raw) => Value::from(reactive_dict(&raw)),
        Value::List(raw) => Value::from(reactive_list(&raw)),
        other => other,
    }
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

pub fn is_shallow(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_shallow())
}
