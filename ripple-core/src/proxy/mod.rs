//! Reactive Proxies
//!
//! A proxy wraps one caller-owned container and routes every access through
//! the dependency hooks: reads call `track` first, writes call `trigger`
//! after the container has been updated.
//!
//! # Identity
//!
//! The registry guarantees at most one live deep proxy and one live shallow
//! proxy per raw container, so reading the same nested dictionary twice
//! hands back the same proxy both times.
//!
//! # Deep and Shallow
//!
//! A deep proxy converts nested containers into proxies as they are read
//! (lazily, not at wrap time) and stores raw containers when handed proxies.
//! A shallow proxy stores and returns values exactly as given.

mod dict;
mod list;
mod registry;

use std::fmt;

pub use dict::DictProxy;
pub use list::ListProxy;
pub use registry::{
    is_reactive, is_shallow, reactive, reactive_dict, reactive_list, shallow_dict, shallow_list,
    shallow_reactive, to_raw, to_reactive, wrap,
};

use crate::value::{TargetId, Value};

/// State behind a proxy handle: the wrapped container and the mode.
pub(crate) struct ProxyState<T> {
    target: T,
    shallow: bool,
}

/// Either kind of proxy.
#[derive(Clone, Debug)]
pub enum Proxy {
    Dict(DictProxy),
    List(ListProxy),
}

impl Proxy {
    /// Identity of the wrapped container.
    pub fn target_id(&self) -> TargetId {
        match self {
            Proxy::Dict(p) => p.target_id(),
            Proxy::List(p) => p.target_id(),
        }
    }

    pub fn is_shallow(&self) -> bool {
        match self {
            Proxy::Dict(p) => p.is_shallow(),
            Proxy::List(p) => p.is_shallow(),
        }
    }

    /// Whether both are the same proxy instance.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        match (self, other) {
            (Proxy::Dict(a), Proxy::Dict(b)) => a.ptr_eq(b),
            (Proxy::List(a), Proxy::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn as_dict(&self) -> Option<&DictProxy> {
        match self {
            Proxy::Dict(p) => Some(p),
            Proxy::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListProxy> {
        match self {
            Proxy::List(p) => Some(p),
            Proxy::Dict(_) => None,
        }
    }

    /// The wrapped container, as a value.
    pub fn to_raw(&self) -> Value {
        match self {
            Proxy::Dict(p) => Value::Dict(p.raw().clone()),
            Proxy::List(p) => Value::List(p.raw().clone()),
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Dict(p) => fmt::Display::fmt(p, f),
            Proxy::List(p) => fmt::Display::fmt(p, f),
        }
    }
}
