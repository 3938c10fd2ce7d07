//! Dependency Store
//!
//! Maps (object identity, property key) to the set of computations that read
//! that pair while they were active.
//!
//! # Layout
//!
//! ```text
//! ObjectId ─▶ TargetDeps { target: Weak, keys: key ─▶ IndexSet<Computation> }
//! ```
//!
//! Sets keep insertion order, so computations are re-run in the order they
//! first subscribed. Entries are never removed when a computation stops
//! reading a key. The only removal is [`DependencyStore::prune`], which drops
//! targets whose object no longer exists.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::value::{Object, ObjectId, WeakObject};

use super::computation::Computation;

#[derive(Debug)]
struct TargetDeps {
    target: WeakObject,
    keys: HashMap<String, IndexSet<Computation>>,
}

/// Registry of which computations depend on which (object, key) pairs.
#[derive(Debug, Default)]
pub struct DependencyStore {
    targets: HashMap<ObjectId, TargetDeps>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `computation` to `target.key`.
    ///
    /// Returns `true` if the subscription is new. Inner maps and sets are
    /// created on first use.
    pub fn record(&mut self, target: &Object, key: &str, computation: Computation) -> bool {
        let deps = self
            .targets
            .entry(target.id())
            .or_insert_with(|| TargetDeps {
                target: target.downgrade(),
                keys: HashMap::new(),
            });

        match deps.keys.get_mut(key) {
            Some(set) => set.insert(computation),
            None => {
                deps.keys
                    .insert(key.to_string(), IndexSet::from([computation]));
                true
            }
        }
    }

    /// Snapshot of the computations subscribed to `target.key`.
    ///
    /// Empty when nothing ever read the object or the key.
    pub fn dependents(&self, target: ObjectId, key: &str) -> Vec<Computation> {
        self.targets
            .get(&target)
            .and_then(|deps| deps.keys.get(key))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dependent_count(&self, target: ObjectId, key: &str) -> usize {
        self.targets
            .get(&target)
            .and_then(|deps| deps.keys.get(key))
            .map_or(0, IndexSet::len)
    }

    /// Number of objects with at least one recorded dependency.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Drop every target whose object has been destroyed.
    ///
    /// Returns the number of targets removed.
    pub fn prune(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, deps| deps.target.is_alive());
        before - self.targets.len()
    }
}
