//! Reflex Core
//!
//! This crate provides fine-grained reactive dependency tracking over
//! structured values. It implements:
//!
//! - A dynamic value model with shared, identity-carrying objects
//! - Reactive wrappers that record reads and notify on writes
//! - Computations (effects) that re-run when what they read changes
//! - A runtime owning the dependency store and execution stack
//!
//! # Architecture
//!
//! - `value`: primitives, [`Object`], JSON interop
//! - `reactive`: wrappers, computations, dependency store, runtime
//! - `config`: runtime tunables
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use reflex_core::{effect, reactive};
//! use serde_json::json;
//!
//! let obj = reactive(json!({ "foo": "foo", "a": { "b": 1 } }))
//!     .into_object()
//!     .unwrap();
//!
//! let view = obj.clone();
//! let _e = effect(move || {
//!     let a = view.get("a").and_then(|a| a.into_object()).unwrap();
//!     println!("{:?} {:?}", view.get("foo"), a.get("b"));
//! });
//!
//! // Re-runs the effect, which prints the new value
//! obj.set("foo", "fooooooo")?;
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{effect, reactive, Computation, ReactiveObject, Runtime, Wrapped};
pub use value::{Object, ObjectId, Value};
