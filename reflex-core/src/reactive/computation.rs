//! Computations
//!
//! A Computation is a re-runnable unit of side-effecting logic. Running it
//! makes it the active computation of its runtime, so every tracked read it
//! performs subscribes it to the (object, key) pair that was read.
//!
//! # Lifecycle
//!
//! A computation is either `Idle` or `Running`. There is no disposed state:
//! a computation lives for as long as something holds it, and the dependency
//! store holds every computation that ever subscribed to a live object.
//! The back-reference to the runtime is weak, but a closure that captures a
//! wrapped object holds the runtime strongly, so such a computation and its
//! runtime keep each other alive while it stays subscribed.
//!
//! Dependencies are collected again on every run. Pairs that a previous run
//! read and the current run skipped are kept, so the subscription set only
//! grows.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use super::runtime::{Runtime, RuntimeInner};

/// Unique identifier for a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ComputationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Execution state of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationState {
    Idle,
    Running,
}

struct ComputationInner {
    id: ComputationId,

    /// The user function.
    run: Box<dyn Fn() + Send + Sync>,

    /// Owning runtime. Weak so the computation itself does not pin the
    /// runtime; a closure capturing a `ReactiveObject` still does.
    runtime: Weak<RuntimeInner>,

    /// Number of invocations currently on the call stack. Greater than one
    /// when the computation re-triggers itself.
    active: AtomicUsize,

    /// Number of completed runs.
    run_count: AtomicUsize,
}

/// Handle to a computation.
///
/// Clones share identity and state. Equality and hashing use the
/// [`ComputationId`], which is what gives the dependency store its set
/// semantics.
#[derive(Clone)]
pub struct Computation {
    inner: Arc<ComputationInner>,
}

impl Computation {
    pub(crate) fn new<F>(runtime: Weak<RuntimeInner>, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ComputationInner {
                id: ComputationId::next(),
                run: Box::new(run),
                runtime,
                active: AtomicUsize::new(0),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Run the computation with dependency tracking.
    ///
    /// The computation is the active one for the duration of the call, and
    /// is popped off the execution stack even if the function panics. If the
    /// owning runtime has been dropped the function still runs, untracked.
    pub fn run(&self) {
        let _running = RunningGuard::enter(&self.inner.active);

        debug!(computation = %self.inner.id, "running computation");

        match self.inner.runtime.upgrade() {
            Some(inner) => Runtime::from_inner(inner).with_active(self, || (self.inner.run)()),
            None => (self.inner.run)(),
        }

        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn state(&self) -> ComputationState {
        if self.inner.active.load(Ordering::SeqCst) > 0 {
            ComputationState::Running
        } else {
            ComputationState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ComputationState::Running
    }

    /// Number of invocations of this computation currently in progress.
    ///
    /// One while it runs normally; more when it has re-triggered itself,
    /// directly or through other computations.
    pub fn active_runs(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of runs that completed without panicking.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Computation {}

impl Hash for Computation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .finish()
    }
}

/// Holds a computation in the `Running` state until dropped.
struct RunningGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> RunningGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::panic::{self, AssertUnwindSafe};

    use parking_lot::Mutex;

    #[test]
    fn computation_ids_are_unique() {
        let id1 = ComputationId::next();
        let id2 = ComputationId::next();
        let id3 = ComputationId::next();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn run_counts_completed_runs() {
        let rt = Runtime::new();
        let computation = rt.computation(|| {});

        assert_eq!(computation.run_count(), 0);
        computation.run();
        computation.run();
        assert_eq!(computation.run_count(), 2);
    }

    #[test]
    fn state_is_running_only_during_run() {
        let rt = Runtime::new();
        let slot: Arc<Mutex<Option<Computation>>> = Arc::new(Mutex::new(None));
        let observed = Arc::new(Mutex::new(Vec::new()));

        let computation = {
            let slot = slot.clone();
            let observed = observed.clone();
            rt.computation(move || {
                if let Some(me) = slot.lock().as_ref() {
                    observed.lock().push(me.state());
                }
            })
        };
        *slot.lock() = Some(computation.clone());

        assert_eq!(computation.state(), ComputationState::Idle);
        computation.run();
        assert_eq!(computation.state(), ComputationState::Idle);
        assert_eq!(*observed.lock(), vec![ComputationState::Running]);

        // Break the slot -> computation -> slot cycle.
        slot.lock().take();
    }

    #[test]
    fn panicking_run_returns_to_idle() {
        let rt = Runtime::new();
        let computation = rt.computation(|| panic!("boom"));

        let result = panic::catch_unwind(AssertUnwindSafe(|| computation.run()));

        assert!(result.is_err());
        assert_eq!(computation.state(), ComputationState::Idle);
        assert_eq!(computation.run_count(), 0);
        assert!(!rt.is_tracking());
    }

    #[test]
    fn detached_computation_runs_untracked() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let computation = Computation::new(Weak::new(), move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        computation.run();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn clones_share_identity() {
        let rt = Runtime::new();
        let a = rt.computation(|| {});
        let b = a.clone();

        assert_eq!(a, b);
        let set: HashSet<Computation> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);

        a.run();
        assert_eq!(set.iter().next().unwrap().run_count(), 1);
    }
}
