//! Dependency Tracking
//!
//! This module is the collaborator the proxies talk to. Proxies only ever
//! call `track` and `trigger`; everything else here exists to turn those
//! calls into re-run computations.
//!
//! # Concepts
//!
//! ## Track
//!
//! A read of `(target, key)` by the running computation. The key can be a
//! dictionary key, a list index, an `IterateKey` marker for whole-container
//! enumeration, or `None` for "the container as a whole".
//!
//! ## Trigger
//!
//! A write to `(target, key)`, classified as add, set, delete or clear. The
//! runtime works out which recorded reads the write invalidates.
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever a triggered write
//! invalidates one of its reads.
//!
//! # Implementation Notes
//!
//! The running computation is kept on a thread-local stack, so a read knows
//! who to attribute itself to without being told. The dependency table
//! itself is process-wide.

mod context;
mod effect;
pub mod hooks;
mod runtime;
mod subscriber;

pub use context::{untracked, Dependency, ReactiveContext};
pub use effect::Effect;
pub use hooks::{
    record, track, trigger, HookEvent, IterateKey, TargetKey, TrackOpTypes, TriggerOpTypes,
};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use subscriber::SubscriberId;
