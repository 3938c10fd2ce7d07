//! Execution Context
//!
//! The execution context tracks which computation is currently running.
//! When a tracked read happens, the runtime credits the dependency to the
//! computation at the top of this stack.
//!
//! # Implementation
//!
//! Each runtime owns one stack. Running a computation pushes it; the
//! returned [`StackGuard`] pops it when dropped, which also happens while
//! unwinding from a panic. Nesting (a computation that synchronously causes
//! another to run) simply stacks.
//!
//! A frame may also be empty. [`Runtime::untracked`](super::Runtime::untracked)
//! pushes one so that reads inside it are credited to nobody.

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::computation::{Computation, ComputationId};

/// One entry on the stack. `None` masks the computations below it.
pub type Frame = Option<Computation>;

/// LIFO stack of executing computations.
#[derive(Debug, Default)]
pub struct ExecutionStack {
    frames: SmallVec<[Frame; 4]>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, computation: Computation) {
        self.frames.push(Some(computation));
    }

    pub(crate) fn push_untracked(&mut self) {
        self.frames.push(None);
    }

    /// Remove the top frame. `Some(None)` is an untracked frame; `None`
    /// means the stack was already empty.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The computation that receives dependency credit right now, if any.
    pub fn current(&self) -> Option<&Computation> {
        self.frames.last().and_then(Option::as_ref)
    }

    /// Number of frames, untracked ones included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Guard that pops the stack when dropped.
///
/// This ensures the stack is properly maintained even if the computation
/// panics.
pub struct StackGuard<'a> {
    stack: &'a Mutex<ExecutionStack>,
    expected: Option<ComputationId>,
}

impl<'a> StackGuard<'a> {
    /// Push `computation` and return the guard that will pop it.
    pub fn enter(stack: &'a Mutex<ExecutionStack>, computation: Computation) -> Self {
        let expected = Some(computation.id());
        stack.lock().push(computation);
        Self { stack, expected }
    }

    /// Push an untracked frame.
    pub fn enter_untracked(stack: &'a Mutex<ExecutionStack>) -> Self {
        stack.lock().push_untracked();
        Self {
            stack,
            expected: None,
        }
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.lock().pop();

        // Verify we're popping the frame we pushed.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.as_ref().map(Computation::id),
                self.expected,
                "execution stack mismatch"
            );
        }
    }
}
