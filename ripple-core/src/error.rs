//! Error types for reactive proxies.
//!
//! Every failure surfaces synchronously to the caller of the proxy
//! operation. Nothing is retried and no operation mutates its container
//! before failing.

use thiserror::Error;

use crate::value::{Key, Value};

/// Errors raised by the registry and the proxies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactivityError {
    /// Strict read of a key that is not present in a dictionary.
    #[error("key not found: {0}")]
    KeyNotFound(Key),

    /// `remove`/`index` called with an item that is not in the list.
    #[error("value not found in list: {0}")]
    ValueNotFound(Value),

    /// Attempt to write or delete one of the proxy's own bookkeeping fields.
    #[error("field `{0}` is read-only")]
    ReadOnlyField(String),

    /// Attempt to wrap a value that cannot carry reactivity.
    #[error("value of kind `{0}` cannot be made reactive")]
    NotReactiveEligible(&'static str),

    /// Index outside the bounds of a list.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    /// Pop from an empty container.
    #[error("cannot pop from an empty {0}")]
    Empty(&'static str),

    /// Sort over values that have no natural ordering between them.
    #[error("values of kind `{0}` and `{1}` cannot be ordered")]
    NotOrderable(&'static str, &'static str),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactivityError> = std::result::Result<T, E>;
