//! Ingestion of fetched payloads into the engine state.
//!
//! Every ingest records the pre-ingest element set on the undo stack and
//! requests a re-layout. The registry's key set doubles as the renderer's
//! live set: the engine is the renderer's only writer and keeps the two
//! equal after every update.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::engine::EngineState;
use crate::error::IntegrityViolation;
use crate::types::GraphPayload;

/// How a payload is combined with the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Add elements whose id is not live yet; leave live ones untouched.
    Merge,
    /// Drop everything and install the payload.
    Replace,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Outcome of one ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Mode used.
    pub mode: IngestMode,
    /// Entities admitted.
    pub added_entities: usize,
    /// Relationships admitted.
    pub added_relationships: usize,
    /// Elements skipped because they were already live (merge only).
    pub skipped: usize,
    /// Relationships refused for a missing endpoint.
    pub violations: Vec<IntegrityViolation>,
}

impl IngestReport {
    fn new(mode: IngestMode) -> Self {
        Self {
            mode,
            added_entities: 0,
            added_relationships: 0,
            skipped: 0,
            violations: Vec::new(),
        }
    }

    /// Number of refused relationships.
    pub fn rejected(&self) -> usize {
        self.violations.len()
    }

    /// Whether the ingest changed nothing.
    pub fn is_noop(&self) -> bool {
        self.added_entities == 0 && self.added_relationships == 0
    }
}

/// Apply a payload to the state.
pub fn ingest(state: &mut EngineState, payload: GraphPayload, mode: IngestMode) -> IngestReport {
    state.history.record(&state.registry);

    let mut report = IngestReport::new(mode);
    let GraphPayload { nodes, edges } = payload;

    if mode == IngestMode::Replace {
        state.registry.clear();
        state.reset_view();
    }

    for entity in nodes {
        if mode == IngestMode::Merge && state.registry.contains_entity(&entity.id) {
            debug!(entity = %entity.id, "Skipping live entity");
            report.skipped += 1;
            continue;
        }
        let fresh = !state.registry.contains_entity(&entity.id);
        state.registry.upsert_entity(entity);
        if fresh {
            report.added_entities += 1;
        }
    }

    let mut admitted = Vec::with_capacity(edges.len());
    for relationship in edges {
        if mode == IngestMode::Merge && state.registry.contains_relationship(&relationship.id) {
            report.skipped += 1;
            continue;
        }
        admitted.push(relationship);
    }
    let before = state.registry.num_relationships();
    report.violations = state.registry.upsert_relationships(admitted);
    report.added_relationships = state.registry.num_relationships() - before;

    state.request_layout();

    info!(
        mode = %mode,
        added_entities = report.added_entities,
        added_relationships = report.added_relationships,
        skipped = report.skipped,
        rejected = report.rejected(),
        "Ingested payload"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, EntityType, Relationship, RelationshipType};

    fn payload(nodes: Vec<Entity>, edges: Vec<Relationship>) -> GraphPayload {
        GraphPayload::new(nodes, edges)
    }

    #[test]
    fn test_replace_on_empty_registry() {
        let mut state = EngineState::default();
        let report = ingest(
            &mut state,
            payload(vec![Entity::new("A", "Alice", EntityType::Person)], vec![]),
            IngestMode::Replace,
        );

        assert_eq!(report.added_entities, 1);
        assert_eq!(state.registry.num_entities(), 1);
        assert!(state.registry.contains_entity(&"A".into()));
        assert_eq!(state.history.undo_depth(), 1);
        assert!(state.history.peek_undo().unwrap().elements().is_empty());
        assert_eq!(state.history.redo_depth(), 0);
        assert_eq!(state.reset_epoch(), 1);
        assert_eq!(state.layout_epoch(), 1);
    }

    #[test]
    fn test_merge_keeps_live_copy() {
        let mut state = EngineState::default();
        state
            .registry
            .upsert_entity(Entity::new("A", "Alice", EntityType::Person).with_risk_score(10));

        let report = ingest(
            &mut state,
            payload(
                vec![
                    Entity::new("A", "Alice v2", EntityType::Person).with_risk_score(90),
                    Entity::new("B", "bob@example.com", EntityType::Email),
                ],
                vec![],
            ),
            IngestMode::Merge,
        );

        let live = state.registry.get_entity(&"A".into()).unwrap();
        assert_eq!(live.label, "Alice");
        assert_eq!(live.risk_score(), 10);
        assert_eq!(report.added_entities, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(state.reset_epoch(), 0);
    }

    #[test]
    fn test_dangling_edges_rejected_rest_admitted() {
        let mut state = EngineState::default();
        let report = ingest(
            &mut state,
            payload(
                vec![
                    Entity::new("a", "a", EntityType::Person),
                    Entity::new("b", "b", EntityType::Email),
                ],
                vec![
                    Relationship::new("ab", "a", "b", RelationshipType::Uses),
                    Relationship::new("ax", "a", "x", RelationshipType::Uses),
                ],
            ),
            IngestMode::Replace,
        );

        assert_eq!(report.added_relationships, 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.violations[0].missing, "x".into());
        assert!(state.registry.is_consistent());
    }

    #[test]
    fn test_edges_may_reference_payload_entities() {
        let mut state = EngineState::default();
        state.registry.upsert_entity(Entity::new("a", "a", EntityType::Person));
        let report = ingest(
            &mut state,
            payload(
                vec![Entity::new("b", "b", EntityType::Domain)],
                vec![Relationship::new("ab", "a", "b", RelationshipType::Owns)],
            ),
            IngestMode::Merge,
        );
        assert_eq!(report.added_relationships, 1);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_every_ingest_is_undoable() {
        let mut state = EngineState::default();
        ingest(&mut state, payload(vec![], vec![]), IngestMode::Merge);
        assert_eq!(state.history.undo_depth(), 1);
        assert_eq!(state.layout_epoch(), 1);
    }
}
