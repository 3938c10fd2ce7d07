//! Error types for the reactive engine.
//!
//! Most reactive operations cannot fail: reading outside a computation or
//! writing to an object nobody observes are both silent no-ops. The only
//! runtime failure is the re-entry limit firing, which turns a computation
//! that keeps re-triggering itself into an error returned to the outermost
//! writer.

use thiserror::Error;

use crate::reactive::ComputationId;
use crate::value::ObjectId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A computation was triggered while already running `limit` times.
    ///
    /// `target` and `key` identify the write whose re-run was refused.
    #[error("{computation} re-entered {limit} times while notifying {target}.{key}")]
    ReentryLimitExceeded {
        limit: usize,
        computation: ComputationId,
        target: ObjectId,
        key: String,
    },

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Whether this error came from the cycle-breaking re-entry limit.
    #[must_use]
    pub fn is_reentry_limit(&self) -> bool {
        matches!(self, Self::ReentryLimitExceeded { .. })
    }
}
