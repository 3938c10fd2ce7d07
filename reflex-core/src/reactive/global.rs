//! Default Runtime
//!
//! A per-thread default [`Runtime`] behind the crate-level [`reactive`] and
//! [`effect`] functions. It is created lazily on first use and replaced only
//! by an explicit reset.
//!
//! Resetting does not touch objects or computations created earlier: wrappers
//! keep the runtime they were created with, and computations keep a weak link
//! to theirs.

use std::cell::RefCell;

use crate::config::RuntimeConfig;
use crate::value::Value;

use super::computation::Computation;
use super::runtime::Runtime;
use super::wrapper::Wrapped;

thread_local! {
    static DEFAULT_RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Handle to this thread's default runtime.
pub fn default_runtime() -> Runtime {
    DEFAULT_RUNTIME.with(|rt| rt.borrow().clone())
}

/// Replace this thread's default runtime with a fresh one.
pub fn reset_default_runtime() {
    reset_default_runtime_with(RuntimeConfig::default());
}

/// Replace this thread's default runtime with a fresh one using `config`.
pub fn reset_default_runtime_with(config: RuntimeConfig) {
    DEFAULT_RUNTIME.with(|rt| *rt.borrow_mut() = Runtime::with_config(config));
}

/// Wrap a value for tracking in the default runtime.
///
/// See [`Runtime::reactive`].
pub fn reactive(value: impl Into<Value>) -> Wrapped {
    default_runtime().reactive(value)
}

/// Register an effect in the default runtime.
///
/// See [`Runtime::effect`].
pub fn effect<F>(f: F) -> Computation
where
    F: Fn() + Send + Sync + 'static,
{
    default_runtime().effect(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_runtime_is_shared_until_reset() {
        reset_default_runtime();
        let a = default_runtime();
        let b = default_runtime();
        assert!(a.ptr_eq(&b));

        reset_default_runtime();
        assert!(!a.ptr_eq(&default_runtime()));
    }

    #[test]
    fn reset_applies_config() {
        reset_default_runtime_with(RuntimeConfig::default().with_max_reentry(Some(2)));
        assert_eq!(default_runtime().config().max_reentry, Some(2));
        reset_default_runtime();
    }

    #[test]
    fn free_functions_use_default_runtime() {
        reset_default_runtime();
        let obj = reactive(serde_json::json!({ "n": 1 })).into_object().unwrap();
        let runs = Arc::new(AtomicI32::new(0));

        let _e = {
            let obj = obj.clone();
            let runs = runs.clone();
            effect(move || {
                let _ = obj.get("n");
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        obj.set("n", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(obj.runtime().ptr_eq(&default_runtime()));
    }
}
