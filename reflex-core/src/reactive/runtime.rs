//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects tracked objects and
//! computations. It owns the dependency store and the execution stack.
//!
//! # How It Works
//!
//! 1. Running a computation pushes it onto the execution stack.
//!
//! 2. A read through a [`ReactiveObject`] calls [`Runtime::track`], which
//!    subscribes the computation on top of the stack to the (object, key)
//!    pair that was read.
//!
//! 3. A write or delete calls [`Runtime::trigger`], which re-runs every
//!    computation subscribed to that pair, synchronously, before the write
//!    returns.
//!
//! # Recursion
//!
//! A computation that writes a key it also reads triggers itself, which
//! triggers itself again, and so on. With `max_reentry` set, a trigger
//! skips any dependent that already has that many runs in progress, and the
//! outermost write returns [`ReactiveError::ReentryLimitExceeded`]. Other
//! dependents of the same write still run. A chain of distinct computations
//! never re-enters one of them, so it propagates at any length. With no
//! limit a cycle recurses until the stack is exhausted.
//!
//! # Threading
//!
//! Handles are `Send + Sync` and no lock is held while user code runs, but
//! attribution assumes one logical thread: the execution stack is per
//! runtime, not per thread. Drive a runtime from one thread at a time.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::value::{Object, Value};

use super::computation::Computation;
use super::context::{ExecutionStack, StackGuard};
use super::store::DependencyStore;
use super::wrapper::{wrap, ReactiveObject, Wrapped};

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    store: Mutex<DependencyStore>,
    stack: Mutex<ExecutionStack>,

    /// Nesting of in-flight triggers.
    trigger_depth: AtomicUsize,

    /// Set when a trigger refused to re-enter a computation; reported by the
    /// outermost trigger.
    overflow: Mutex<Option<ReactiveError>>,
}

/// A reactive runtime.
///
/// Cloning a `Runtime` clones the handle. A fresh runtime has an empty
/// dependency store and an empty execution stack; nothing is torn down
/// implicitly.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                store: Mutex::new(DependencyStore::new()),
                stack: Mutex::new(ExecutionStack::new()),
                trigger_depth: AtomicUsize::new(0),
                overflow: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Wrap a value for tracking.
    ///
    /// Primitives come back unchanged as [`Wrapped::Plain`]; objects come
    /// back as [`Wrapped::Object`].
    pub fn reactive(&self, value: impl Into<Value>) -> Wrapped {
        wrap(self, value.into())
    }

    /// Wrap an object for tracking.
    pub fn reactive_object(&self, target: Object) -> ReactiveObject {
        ReactiveObject::new(self.clone(), target)
    }

    /// Register `f` for automatic re-execution.
    ///
    /// `f` runs once immediately to collect its first dependencies. The
    /// returned handle can also be re-run by hand.
    pub fn effect<F>(&self, f: F) -> Computation
    where
        F: Fn() + Send + Sync + 'static,
    {
        let computation = self.computation(f);
        computation.run();
        computation
    }

    /// Create a computation without running it.
    ///
    /// It has no dependencies until its first [`Computation::run`].
    pub fn computation<F>(&self, f: F) -> Computation
    where
        F: Fn() + Send + Sync + 'static,
    {
        Computation::new(self.downgrade(), f)
    }

    /// Run `f` with `computation` as the active computation and return its
    /// result. The stack is popped on every exit path.
    pub fn with_active<R>(&self, computation: &Computation, f: impl FnOnce() -> R) -> R {
        let _guard = StackGuard::enter(&self.inner.stack, computation.clone());
        f()
    }

    /// Run `f` with no active computation; its reads subscribe nothing.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = StackGuard::enter_untracked(&self.inner.stack);
        f()
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Check if a computation is currently receiving dependency credit.
    pub fn is_tracking(&self) -> bool {
        self.inner.stack.lock().current().is_some()
    }

    pub fn active_computation(&self) -> Option<Computation> {
        self.inner.stack.lock().current().cloned()
    }

    /// Record that the active computation depends on `target.key`.
    ///
    /// No-op outside of any computation.
    pub fn track(&self, target: &Object, key: &str) {
        let Some(computation) = self.active_computation() else {
            return;
        };

        let id = computation.id();
        if self.inner.store.lock().record(target, key, computation) {
            trace!(object = %target.id(), key, computation = %id, "dependency recorded");
        }
    }

    /// Re-run every computation that depends on `target.key`.
    ///
    /// All dependents run exactly once, synchronously, in the order they
    /// first subscribed. A dependent already at the `max_reentry` limit is
    /// skipped and reported as an error by the outermost trigger. Panics
    /// from a dependent propagate to the caller; with `isolate_panics` the
    /// remaining siblings run first.
    pub fn trigger(&self, target: &Object, key: &str) -> Result<()> {
        let dependents = self.inner.store.lock().dependents(target.id(), key);
        if dependents.is_empty() {
            return Ok(());
        }

        let depth = self.inner.trigger_depth.load(Ordering::SeqCst);
        if depth == 0 {
            // A previous outermost trigger may have unwound before reporting.
            self.inner.overflow.lock().take();
        }

        let runnable = match self.inner.config.max_reentry {
            Some(limit) => self.admit(dependents, limit, target, key),
            None => dependents,
        };
        if runnable.is_empty() {
            return self.take_overflow_if_outermost();
        }

        debug!(
            object = %target.id(),
            key,
            dependents = runnable.len(),
            depth,
            "triggering dependents"
        );

        {
            let _depth = DepthGuard::enter(&self.inner.trigger_depth);
            self.run_dependents(&runnable);
        }

        self.take_overflow_if_outermost()
    }

    /// Drop the dependents that already have `limit` runs in progress,
    /// recording the first refusal for the outermost trigger.
    fn admit(
        &self,
        dependents: Vec<Computation>,
        limit: usize,
        target: &Object,
        key: &str,
    ) -> Vec<Computation> {
        let mut runnable = Vec::with_capacity(dependents.len());
        for computation in dependents {
            if computation.active_runs() < limit {
                runnable.push(computation);
                continue;
            }

            error!(
                object = %target.id(),
                key,
                computation = %computation.id(),
                limit,
                "re-entry limit exceeded"
            );
            self.inner
                .overflow
                .lock()
                .get_or_insert_with(|| ReactiveError::ReentryLimitExceeded {
                    limit,
                    computation: computation.id(),
                    target: target.id(),
                    key: key.to_string(),
                });
        }
        runnable
    }

    fn run_dependents(&self, dependents: &[Computation]) {
        if !self.inner.config.isolate_panics {
            for computation in dependents {
                computation.run();
            }
            return;
        }

        let mut first_panic = None;
        for computation in dependents {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| computation.run())) {
                warn!(
                    computation = %computation.id(),
                    "computation panicked, running remaining dependents"
                );
                first_panic.get_or_insert(payload);
            }
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    fn take_overflow_if_outermost(&self) -> Result<()> {
        if self.inner.trigger_depth.load(Ordering::SeqCst) > 0 {
            return Ok(());
        }
        match self.inner.overflow.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Store maintenance and introspection
    // ------------------------------------------------------------------

    /// Number of computations subscribed to `target.key`.
    pub fn dependent_count(&self, target: &Object, key: &str) -> usize {
        self.inner.store.lock().dependent_count(target.id(), key)
    }

    /// Number of objects with at least one recorded dependency.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.store.lock().target_count()
    }

    /// Forget the dependencies of objects that have been dropped.
    ///
    /// Entries for live objects are never removed. Returns the number of
    /// objects forgotten.
    pub fn prune(&self) -> usize {
        let removed = self.inner.store.lock().prune();
        if removed > 0 {
            debug!(removed, "pruned dependencies of dropped objects");
        }
        removed
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("tracked_targets", &self.tracked_target_count())
            .field("stack_depth", &self.inner.stack.lock().depth())
            .finish()
    }
}

/// Increments the trigger depth until dropped.
struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counter_effect(
        rt: &Runtime,
        target: &Object,
        key: &'static str,
    ) -> (Computation, Arc<AtomicI32>) {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let rt_clone = rt.clone();
        let target = target.clone();

        let computation = rt.effect(move || {
            rt_clone.track(&target, key);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        (computation, runs)
    }

    #[test]
    fn track_outside_computation_is_noop() {
        let rt = Runtime::new();
        let obj = Object::new();

        rt.track(&obj, "foo");

        assert_eq!(rt.tracked_target_count(), 0);
        assert!(!rt.is_tracking());
    }

    #[test]
    fn trigger_without_dependents_is_noop() {
        let rt = Runtime::new();
        let obj = Object::new();

        assert!(rt.trigger(&obj, "foo").is_ok());
    }

    #[test]
    fn trigger_reruns_subscribers() {
        let rt = Runtime::new();
        let obj = Object::new();
        let (_c, runs) = counter_effect(&rt, &obj, "foo");

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(rt.dependent_count(&obj, "foo"), 1);

        rt.trigger(&obj, "foo").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        rt.trigger(&obj, "bar").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn active_computation_during_effect() {
        let rt = Runtime::new();
        let seen = Arc::new(Mutex::new(None));

        let computation = {
            let rt_inner = rt.clone();
            let seen = seen.clone();
            rt.effect(move || {
                *seen.lock() = rt_inner.active_computation().map(|c| c.id());
            })
        };

        assert_eq!(*seen.lock(), Some(computation.id()));
        assert!(rt.active_computation().is_none());
    }

    #[test]
    fn untracked_reads_subscribe_nothing() {
        let rt = Runtime::new();
        let obj = Object::new();

        let _c = {
            let rt_inner = rt.clone();
            let obj = obj.clone();
            rt.effect(move || {
                rt_inner.untracked(|| rt_inner.track(&obj, "hidden"));
                rt_inner.track(&obj, "seen");
            })
        };

        assert_eq!(rt.dependent_count(&obj, "hidden"), 0);
        assert_eq!(rt.dependent_count(&obj, "seen"), 1);
    }

    #[test]
    fn with_active_returns_result() {
        let rt = Runtime::new();
        let computation = rt.computation(|| {});

        let value = rt.with_active(&computation, || {
            assert_eq!(rt.active_computation(), Some(computation.clone()));
            42
        });

        assert_eq!(value, 42);
        assert!(!rt.is_tracking());
    }

    #[test]
    fn reentry_limit_reports_to_outermost_trigger() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_reentry(Some(3)));
        let obj = Object::new();
        let runs = Arc::new(AtomicI32::new(0));

        let looping = {
            let rt_inner = rt.clone();
            let obj = obj.clone();
            let runs = runs.clone();
            rt.computation(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                rt_inner.track(&obj, "n");
                // Nested results are reported by the outermost trigger.
                let _ = rt_inner.trigger(&obj, "n");
            })
        };
        rt.with_active(&looping, || rt.track(&obj, "n"));

        let err = rt.trigger(&obj, "n").unwrap_err();
        assert!(matches!(
            err,
            ReactiveError::ReentryLimitExceeded { limit: 3, computation, .. }
                if computation == looping.id()
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        // The error is consumed; the next trigger starts clean.
        assert!(rt.inner.overflow.lock().is_none());
        assert_eq!(rt.inner.trigger_depth.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn refused_reentry_still_runs_siblings() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_reentry(Some(1)));
        let obj = Object::new();

        let looping = {
            let rt_inner = rt.clone();
            let obj = obj.clone();
            rt.computation(move || {
                rt_inner.track(&obj, "n");
                let _ = rt_inner.trigger(&obj, "n");
            })
        };
        rt.with_active(&looping, || rt.track(&obj, "n"));
        let (_sibling, runs) = counter_effect(&rt, &obj, "n");

        let err = rt.trigger(&obj, "n").unwrap_err();
        assert!(err.is_reentry_limit());

        // Once from the nested trigger, once from the outer one.
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(looping.run_count(), 1);
        assert_eq!(looping.active_runs(), 0);
    }

    #[test]
    fn sibling_panic_does_not_skip_others() {
        let rt = Runtime::new();
        let obj = Object::new();
        let armed = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let _bad = {
            let rt_inner = rt.clone();
            let obj = obj.clone();
            let armed = armed.clone();
            rt.effect(move || {
                rt_inner.track(&obj, "k");
                if armed.load(Ordering::SeqCst) {
                    panic!("dependent failed");
                }
            })
        };
        let (_good, runs) = counter_effect(&rt, &obj, "k");

        armed.store(true, Ordering::SeqCst);
        let result = panic::catch_unwind(AssertUnwindSafe(|| rt.trigger(&obj, "k")));

        assert!(result.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!rt.is_tracking());
        assert_eq!(rt.inner.trigger_depth.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn without_isolation_panic_skips_remaining() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_isolate_panics(false));
        let obj = Object::new();
        let armed = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let _bad = {
            let rt_inner = rt.clone();
            let obj = obj.clone();
            let armed = armed.clone();
            rt.effect(move || {
                rt_inner.track(&obj, "k");
                if armed.load(Ordering::SeqCst) {
                    panic!("dependent failed");
                }
            })
        };
        let (_good, runs) = counter_effect(&rt, &obj, "k");

        armed.store(true, Ordering::SeqCst);
        let result = panic::catch_unwind(AssertUnwindSafe(|| rt.trigger(&obj, "k")));

        assert!(result.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!rt.is_tracking());
    }

    #[test]
    fn dropped_runtime_leaves_computation_runnable() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let computation = rt.effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        drop(rt);
        computation.run();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
