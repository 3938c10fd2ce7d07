//! Reactive Wrapper
//!
//! A [`ReactiveObject`] is the interception layer over an [`Object`]. Instead
//! of transparent property access, callers go through explicit accessors:
//!
//! - `get` reads the slot, records a dependency, and wraps nested objects.
//! - `set` writes the slot and triggers dependents.
//! - `delete` removes the slot and triggers dependents.
//!
//! Wrapping is not memoized. Every `get` of a nested object returns a new
//! wrapper, which is fine because the dependency store keys on the object's
//! [`ObjectId`], not on the wrapper.

use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::value::{Object, ObjectId, Value};

use super::runtime::Runtime;

/// Wrap a value: objects become [`ReactiveObject`]s, primitives pass through.
pub(crate) fn wrap(runtime: &Runtime, value: Value) -> Wrapped {
    match value {
        Value::Object(target) => Wrapped::Object(ReactiveObject::new(runtime.clone(), target)),
        plain => Wrapped::Plain(plain),
    }
}

/// Result of wrapping a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Wrapped {
    /// A primitive, returned unchanged.
    Plain(Value),
    /// A tracked object.
    Object(ReactiveObject),
}

impl Wrapped {
    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Wrapped::Object(obj) => Some(obj),
            Wrapped::Plain(_) => None,
        }
    }

    pub fn into_object(self) -> Option<ReactiveObject> {
        match self {
            Wrapped::Object(obj) => Some(obj),
            Wrapped::Plain(_) => None,
        }
    }

    /// The primitive value, if this is not an object.
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Wrapped::Plain(value) => Some(value),
            Wrapped::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_plain().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_plain().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_plain().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_plain().and_then(Value::as_bool)
    }

    /// Unwrap back to a plain value. Objects yield their underlying object.
    pub fn into_value(self) -> Value {
        match self {
            Wrapped::Plain(value) => value,
            Wrapped::Object(obj) => Value::Object(obj.target),
        }
    }
}

impl From<Wrapped> for Value {
    fn from(wrapped: Wrapped) -> Self {
        wrapped.into_value()
    }
}

/// Tracked view of an [`Object`].
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let state = rt.reactive(json!({ "count": 0 })).into_object().unwrap();
///
/// let view = state.clone();
/// let _e = rt.effect(move || {
///     println!("count = {:?}", view.get("count"));
/// });
///
/// state.set("count", 1)?; // prints "count = Some(Plain(Int(1)))"
/// ```
#[derive(Clone)]
pub struct ReactiveObject {
    runtime: Runtime,
    target: Object,
}

impl ReactiveObject {
    pub(crate) fn new(runtime: Runtime, target: Object) -> Self {
        Self { runtime, target }
    }

    /// Identity of the underlying object.
    pub fn id(&self) -> ObjectId {
        self.target.id()
    }

    /// The underlying object. Access through it is untracked.
    pub fn raw(&self) -> &Object {
        &self.target
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Read `key`, recording a dependency for the active computation.
    ///
    /// The dependency is recorded even when the key is absent, so a later
    /// `set` of that key re-runs the reader.
    pub fn get(&self, key: &str) -> Option<Wrapped> {
        trace!(op = "get", object = %self.target.id(), key);
        let result = self.target.get(key);
        self.runtime.track(&self.target, key);
        result.map(|value| wrap(&self.runtime, value))
    }

    /// Write `key` and re-run its dependents.
    ///
    /// Dependents run even if the new value equals the old one. Returns
    /// `Ok(true)` once the write is done; the error case is a dependent
    /// hitting the re-entry limit.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        trace!(op = "set", object = %self.target.id(), key = %key);
        self.target.insert(key.clone(), value);
        self.runtime.trigger(&self.target, &key)?;
        Ok(true)
    }

    /// Remove `key` and re-run its dependents.
    ///
    /// Returns whether the key was present. Dependents run either way.
    pub fn delete(&self, key: &str) -> Result<bool> {
        trace!(op = "delete", object = %self.target.id(), key);
        let existed = self.target.remove(key).is_some();
        self.runtime.trigger(&self.target, key)?;
        Ok(existed)
    }

    /// Read `key` without recording a dependency.
    pub fn get_untracked(&self, key: &str) -> Option<Wrapped> {
        self.target.get(key).map(|value| wrap(&self.runtime, value))
    }

    pub fn contains_key_untracked(&self, key: &str) -> bool {
        self.target.contains_key(key)
    }

    pub fn keys_untracked(&self) -> Vec<String> {
        self.target.keys()
    }

    /// Untracked JSON snapshot of the underlying object.
    pub fn to_json(&self) -> serde_json::Value {
        self.target.to_json()
    }
}

impl PartialEq for ReactiveObject {
    fn eq(&self, other: &Self) -> bool {
        self.target.ptr_eq(&other.target)
    }
}

impl From<ReactiveObject> for Value {
    fn from(obj: ReactiveObject) -> Self {
        Value::Object(obj.target)
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("target", &self.target)
            .finish()
    }
}
