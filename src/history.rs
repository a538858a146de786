//! Snapshot-based undo/redo.
//!
//! A `Snapshot` captures the complete element set before a mutation. The
//! `History` keeps bounded undo and redo stacks of them.
//!
//! ## Policy
//!
//! - Every registry-mutating action pushes the pre-mutation snapshot with
//!   [`History::push_undo`], which clears the redo stack.
//! - Undo restores the newest undo entry and moves the current state to redo;
//!   redo is the mirror operation.
//! - When the undo stack is full the oldest entry is evicted silently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

use crate::registry::Registry;

/// Default number of undo steps retained.
pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// Immutable capture of the element set at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// xxh64 of the canonical JSON of the element set.
    fingerprint: String,
    /// When the capture was taken.
    captured_at: DateTime<Utc>,
    /// The captured elements.
    elements: Registry,
}

impl Snapshot {
    /// Capture the given element set.
    pub fn capture(elements: &Registry) -> Self {
        Self {
            fingerprint: fingerprint(elements),
            captured_at: Utc::now(),
            elements: elements.clone(),
        }
    }

    /// Content fingerprint. Equal element sets have equal fingerprints.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Capture time.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// The captured element set.
    pub fn elements(&self) -> &Registry {
        &self.elements
    }
}

/// Equality is structural over the element set; capture time is ignored.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.elements == other.elements
    }
}

/// Compute the fingerprint of an element set.
pub fn fingerprint(elements: &Registry) -> String {
    // Registry serialization only fails on non-string map keys, which it has none of.
    let bytes = serde_json::to_vec(elements).unwrap_or_default();
    format!("{:016x}", xxh64(&bytes, 0))
}

/// Result of an undo step.
#[derive(Debug, Clone)]
pub struct UndoOutcome {
    /// The snapshot now in effect.
    pub restored: Arc<Snapshot>,
    /// The pre-undo state, now on top of the redo stack.
    pub pushed_to_redo: Arc<Snapshot>,
}

/// Result of a redo step.
#[derive(Debug, Clone)]
pub struct RedoOutcome {
    /// The snapshot now in effect.
    pub restored: Arc<Snapshot>,
    /// The pre-redo state, now on top of the undo stack.
    pub pushed_to_undo: Arc<Snapshot>,
}

/// Bounded undo/redo stacks.
///
/// Snapshots are shared (`Arc`) so cloning the history is cheap.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Arc<Snapshot>>,
    redo: Vec<Arc<Snapshot>>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl History {
    /// Create an empty history. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Capture a snapshot of the element set.
    pub fn capture(elements: &Registry) -> Snapshot {
        Snapshot::capture(elements)
    }

    /// Push a pre-mutation snapshot and clear the redo stack.
    pub fn push_undo(&mut self, snapshot: Snapshot) {
        self.push_bounded(Arc::new(snapshot));
        self.redo.clear();
    }

    /// Capture `elements` and push it; shorthand for mutating actions.
    pub fn record(&mut self, elements: &Registry) {
        self.push_undo(Snapshot::capture(elements));
    }

    fn push_bounded(&mut self, snapshot: Arc<Snapshot>) {
        self.undo.push_back(snapshot);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    /// Step back. `current` is the element set in effect before the undo.
    pub fn undo(&mut self, current: &Registry) -> Option<UndoOutcome> {
        let restored = self.undo.pop_back()?;
        let pushed_to_redo = Arc::new(Snapshot::capture(current));
        self.redo.push(Arc::clone(&pushed_to_redo));
        Some(UndoOutcome { restored, pushed_to_redo })
    }

    /// Step forward. `current` is the element set in effect before the redo.
    pub fn redo(&mut self, current: &Registry) -> Option<RedoOutcome> {
        let restored = self.redo.pop()?;
        let pushed_to_undo = Arc::new(Snapshot::capture(current));
        self.push_bounded(Arc::clone(&pushed_to_undo));
        Some(RedoOutcome { restored, pushed_to_undo })
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo entries.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo entries.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Newest undo entry.
    pub fn peek_undo(&self) -> Option<&Snapshot> {
        self.undo.back().map(Arc::as_ref)
    }

    /// Newest redo entry.
    pub fn peek_redo(&self) -> Option<&Snapshot> {
        self.redo.last().map(Arc::as_ref)
    }

    /// Maximum undo depth.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, EntityType};
    use proptest::prelude::*;

    fn registry_with(ids: &[&str]) -> Registry {
        let mut registry = Registry::new();
        registry.upsert_entities(ids.iter().map(|id| Entity::new(*id, *id, EntityType::Person)));
        registry
    }

    #[test]
    fn test_fingerprint_determinism() {
        let a = registry_with(&["a", "b"]);
        let b = registry_with(&["b", "a"]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&registry_with(&["a"])));
    }

    #[test]
    fn test_capture_mutate_undo() {
        let mut history = History::default();
        let mut registry = registry_with(&["a"]);
        let before = registry.clone();

        history.record(&registry);
        registry.set_hidden(&"a".into(), true);
        let mutated = registry.clone();

        let outcome = history.undo(&registry).unwrap();
        registry = outcome.restored.elements().clone();

        assert_eq!(registry, before);
        assert_eq!(history.peek_redo().unwrap().elements(), &mutated);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::default();
        let registry = registry_with(&["a"]);
        history.record(&registry);
        history.undo(&registry).unwrap();
        assert!(history.can_redo());

        history.record(&registry);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_empty() {
        let mut history = History::default();
        let registry = Registry::new();
        assert!(history.undo(&registry).is_none());
        assert!(history.redo(&registry).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(&registry_with(&[format!("e{i}").as_str()]));
        }
        assert_eq!(history.undo_depth(), 3);

        let current = Registry::new();
        let oldest_kept = {
            let mut h = history.clone();
            h.undo(&current);
            h.undo(&current);
            h.undo(&current).unwrap().restored
        };
        assert!(oldest_kept.elements().contains_entity(&"e2".into()));
    }

    proptest! {
        #[test]
        fn prop_undo_then_redo_round_trips(steps in proptest::collection::vec(0u8..8, 1..20)) {
            let mut history = History::default();
            let mut registry = Registry::new();
            for (i, step) in steps.iter().enumerate() {
                history.record(&registry);
                registry.upsert_entity(Entity::new(format!("e{step}"), format!("{i}"), EntityType::Domain));
            }

            let before_undo = registry.clone();
            let undone = history.undo(&registry).unwrap();
            registry = undone.restored.elements().clone();
            let redone = history.redo(&registry).unwrap();
            registry = redone.restored.elements().clone();

            prop_assert_eq!(registry, before_undo);
        }

        #[test]
        fn prop_undo_stack_bounded(pushes in 0usize..200, capacity in 1usize..60) {
            let mut history = History::new(capacity);
            let registry = Registry::new();
            for _ in 0..pushes {
                history.record(&registry);
                prop_assert!(history.undo_depth() <= capacity);
            }
            prop_assert_eq!(history.undo_depth(), pushes.min(capacity));
        }
    }
}
