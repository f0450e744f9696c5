//! Value Model
//!
//! Proxies wrap caller-owned containers of dynamically typed values. This
//! module defines those values and the two raw container kinds.
//!
//! # Raw Containers
//!
//! A `RawDict` or `RawList` is a shared handle: cloning it clones the handle,
//! not the contents. Each container gets a unique `TargetId` when it is
//! created, and that id (not the contents) is what the registry and the
//! dependency table key on.
//!
//! # Equality
//!
//! `PartialEq` on `Value` is structural for scalars and raw containers,
//! treats `Int(1)` and `Float(1.0)` as equal, and considers two NaNs equal
//! so that writing NaN over NaN is not reported as a change. Proxies compare
//! by identity.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::proxy::{DictProxy, ListProxy, Proxy};

/// Counter for generating unique container IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of a raw container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dictionary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

/// Storage behind a `RawDict`.
pub type DictEntries = IndexMap<Key, Value>;

/// A caller-owned, insertion-ordered dictionary.
#[derive(Clone)]
pub struct RawDict {
    id: TargetId,
    entries: Arc<RwLock<DictEntries>>,
}

impl RawDict {
    /// Create an empty dictionary with a fresh identity.
    pub fn new() -> Self {
        Self::from_entries(DictEntries::new())
    }

    fn from_entries(entries: DictEntries) -> Self {
        Self {
            id: TargetId::next(),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Get the container's identity.
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Lock the entries for reading. Bypasses reactivity.
    pub fn read(&self) -> RwLockReadGuard<'_, DictEntries> {
        self.entries.read()
    }

    /// Lock the entries for writing. Bypasses reactivity.
    pub fn write(&self) -> RwLockWriteGuard<'_, DictEntries> {
        self.entries.write()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clone the value stored under `key`.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Insert without notifying anyone.
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.entries.write().insert(key.into(), value.into())
    }

    /// A new dictionary holding the same entries under a fresh identity.
    pub fn copy(&self) -> RawDict {
        Self::from_entries(self.entries.read().clone())
    }
}

impl Default for RawDict {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for RawDict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl PartialEq for RawDict {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.entries.read_recursive() == *other.entries.read_recursive()
    }
}

impl fmt::Debug for RawDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.read_recursive().iter())
            .finish()
    }
}

impl Serialize for RawDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries.read_recursive();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A caller-owned list.
#[derive(Clone)]
pub struct RawList {
    id: TargetId,
    items: Arc<RwLock<Vec<Value>>>,
}

impl RawList {
    /// Create an empty list with a fresh identity.
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    fn from_items(items: Vec<Value>) -> Self {
        Self {
            id: TargetId::next(),
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Get the container's identity.
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    /// Lock the items for reading. Bypasses reactivity.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.items.read()
    }

    /// Lock the items for writing. Bypasses reactivity.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.items.write()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clone the item at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Append without notifying anyone.
    pub fn push(&self, value: impl Into<Value>) {
        self.items.write().push(value.into());
    }

    /// A new list holding the same items under a fresh identity.
    pub fn copy(&self) -> RawList {
        Self::from_items(self.items.read().clone())
    }
}

impl Default for RawList {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for RawList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().map(Into::into).collect())
    }
}

impl PartialEq for RawList {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.items.read_recursive() == *other.items.read_recursive()
    }
}

impl fmt::Debug for RawList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.read_recursive().iter())
            .finish()
    }
}

impl Serialize for RawList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items = self.items.read_recursive();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

/// A dynamically typed value stored in, or read out of, a container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Dict(RawDict),
    List(RawList),
    Proxy(Proxy),
}

impl Value {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Dict(_) => "dict",
            Value::List(_) => "list",
            Value::Proxy(Proxy::Dict(_)) => "dict proxy",
            Value::Proxy(Proxy::List(_)) => "list proxy",
        }
    }

    /// Whether this is a raw container that a proxy can wrap.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Dict(_) | Value::List(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_raw_dict(&self) -> Option<&RawDict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_raw_list(&self) -> Option<&RawList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict_proxy(&self) -> Option<&DictProxy> {
        match self {
            Value::Proxy(Proxy::Dict(p)) => Some(p),
            _ => None,
        }
    }

    pub fn as_list_proxy(&self) -> Option<&ListProxy> {
        match self {
            Value::Proxy(Proxy::List(p)) => Some(p),
            _ => None,
        }
    }

    /// Ordering used by `ListProxy::sort`.
    ///
    /// Numbers order among themselves, strings among themselves, bools among
    /// themselves. Any other pairing has no order.
    pub(crate) fn natural_cmp(&self, other: &Value) -> Option<CmpOrdering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (self.as_float()?, other.as_float()?);
                Some(a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal))
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Exact comparison: the float must be integral and inside the `i64` range.
fn int_float_eq(i: i64, f: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 && f as i64 == i
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                int_float_eq(*a, *b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Whether writing `new` over `old` counts as a change.
///
/// Two NaNs are unchanged; everything else follows `Value` equality.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    new != old
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Dict(d) => d.serialize(serializer),
            Value::List(l) => l.serialize(serializer),
            Value::Proxy(p) => p.to_raw().serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<RawDict> for Value {
    fn from(d: RawDict) -> Self {
        Value::Dict(d)
    }
}

impl From<RawList> for Value {
    fn from(l: RawList) -> Self {
        Value::List(l)
    }
}

impl From<Proxy> for Value {
    fn from(p: Proxy) -> Self {
        Value::Proxy(p)
    }
}

impl From<DictProxy> for Value {
    fn from(p: DictProxy) -> Self {
        Value::Proxy(Proxy::Dict(p))
    }
}

impl From<ListProxy> for Value {
    fn from(p: ListProxy) -> Self {
        Value::Proxy(Proxy::List(p))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(i) => Value::Int(i),
            Key::Str(s) => Value::Str(s),
        }
    }
}
