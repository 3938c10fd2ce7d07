//! Runtime Configuration
//!
//! Tunables for a [`Runtime`](crate::reactive::Runtime). Defaults are chosen
//! so that a misbehaving computation produces an error instead of exhausting
//! the call stack.
//!
//! Configuration can be built in code or parsed from JSON:
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{ "max_reentry": 16 }"#)?;
//! let rt = Runtime::with_config(config);
//! ```

use serde::Deserialize;

use crate::error::Result;

/// Default limit on nested runs of a single computation.
pub const DEFAULT_MAX_REENTRY: usize = 100;

/// Configuration for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many runs of one computation may be in progress at once before
    /// a trigger refuses to start another.
    ///
    /// A computation that writes a key it also reads re-triggers itself
    /// forever. With a limit set, the re-run past the limit is skipped and
    /// the outermost write returns
    /// [`ReactiveError::ReentryLimitExceeded`](crate::ReactiveError::ReentryLimitExceeded).
    /// Chains of distinct computations never re-enter, so they propagate
    /// at any length. `None` disables the guard, leaving cycles to overflow
    /// the stack.
    pub max_reentry: Option<usize>,

    /// Keep running sibling computations when one of them panics.
    ///
    /// The first panic is resumed once every sibling has run, so it still
    /// reaches the writer.
    pub isolate_panics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reentry: Some(DEFAULT_MAX_REENTRY),
            isolate_panics: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_max_reentry(mut self, limit: Option<usize>) -> Self {
        self.max_reentry = limit;
        self
    }

    #[must_use]
    pub fn with_isolate_panics(mut self, isolate: bool) -> Self {
        self.isolate_panics = isolate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_guard_recursion() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_reentry, Some(DEFAULT_MAX_REENTRY));
        assert!(config.isolate_panics);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "max_reentry": 8 }"#).unwrap();
        assert_eq!(config.max_reentry, Some(8));
        assert!(config.isolate_panics);

        let config = RuntimeConfig::from_json(r#"{ "max_reentry": null }"#).unwrap();
        assert_eq!(config.max_reentry, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "batch": true }"#).unwrap_err();
        assert!(!err.is_reentry_limit());
    }

    #[test]
    fn builders_override_fields() {
        let config = RuntimeConfig::default()
            .with_max_reentry(None)
            .with_isolate_panics(false);

        assert_eq!(config.max_reentry, None);
        assert!(!config.isolate_panics);
    }
}
