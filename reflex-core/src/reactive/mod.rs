//! Reactive Tracking
//!
//! This module implements the dependency-tracking engine: wrapped objects,
//! computations, and the runtime that connects them.
//!
//! # Concepts
//!
//! ## Reactive objects
//!
//! A [`ReactiveObject`] wraps a plain [`Object`](crate::Object). Reading a
//! property through it while a computation is running subscribes that
//! computation to the property. Writing or deleting a property re-runs the
//! subscribers.
//!
//! ## Computations
//!
//! A [`Computation`] is a side-effecting function registered with
//! [`Runtime::effect`]. It runs once immediately to collect its
//! dependencies, then again every time one of them changes.
//!
//! ## Runtime
//!
//! The [`Runtime`] owns the dependency store and the execution stack. It is
//! an explicit context object; the crate-level [`reactive`] and [`effect`]
//! functions use a per-thread default instance.
//!
//! # Implementation Notes
//!
//! Re-runs are synchronous and unbatched: a write returns only after every
//! dependent has run. Dependency sets only grow. A computation that stops
//! reading a property stays subscribed to it.

mod computation;
mod context;
mod global;
mod runtime;
mod store;
mod wrapper;

pub use computation::{Computation, ComputationId, ComputationState};
pub use context::{ExecutionStack, Frame, StackGuard};
pub use global::{
    default_runtime, effect, reactive, reset_default_runtime, reset_default_runtime_with,
};
pub use runtime::Runtime;
pub use store::DependencyStore;
pub use wrapper::{ReactiveObject, Wrapped};
