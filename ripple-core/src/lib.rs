//! Ripple Core
//!
//! Fine-grained dependency tracking for plain data. Dictionaries and lists
//! are wrapped in proxies that report every read and write to a tracking
//! runtime, so computations that read a piece of state re-run when exactly
//! that piece changes.
//!
//! # Architecture
//!
//! - `value`: the dynamically typed data model and its raw containers
//! - `proxy`: the raw/reactive registry and the dictionary and list proxies
//! - `reactive`: the track/trigger hooks, the dependency runtime and effects
//! - `error`: the error type shared by all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{reactive, Effect};
//! use serde_json::json;
//!
//! let state = reactive(json!({"user": {"name": "Ada"}}))?;
//! let dict = state.as_dict().unwrap().clone();
//!
//! Effect::new(move || {
//!     let user = dict.get("user").unwrap();
//!     println!("Hello, {}", user.as_dict_proxy().unwrap().get("name").unwrap());
//! });
//!
//! // Nested containers come back wrapped, so this write re-runs the effect.
//! let user = state.as_dict().unwrap().get("user")?;
//! user.as_dict_proxy().unwrap().set("name", "Grace")?;
//! ```

pub mod error;
pub mod proxy;
pub mod reactive;
pub mod value;

pub use error::{ReactivityError, Result};
pub use proxy::{
    is_reactive, is_shallow, reactive, reactive_dict, reactive_list, shallow_dict, shallow_list,
    shallow_reactive, to_raw, to_reactive, wrap, DictProxy, ListProxy, Proxy,
};
pub use reactive::{
    record, track, trigger, untracked, Effect, HookEvent, IterateKey, TargetKey, TrackOpTypes,
    TriggerOpTypes,
};
pub use value::{has_changed, Key, RawDict, RawList, TargetId, Value};
