//! Entity/relationship registry: the ground truth of the graph.
//!
//! Uses BTreeMap/BTreeSet for deterministic iteration order, so snapshots
//! and classifications of equal registries are byte-identical.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::error::IntegrityViolation;
use crate::types::{
    Entity, EntityId, GraphPayload, Properties, Relationship, RelationshipId,
};

/// Property key whose integer value updates the risk score on enrichment.
pub const RISK_SCORE_PROPERTY: &str = "risk_score";

/// Keyed storage for all known entities and relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Registry {
    /// Entities by ID.
    entities: BTreeMap<EntityId, Entity>,
    /// Relationships by ID.
    relationships: BTreeMap<RelationshipId, Relationship>,
    /// Entity -> incident relationships.
    #[serde(skip)]
    incident: BTreeMap<EntityId, BTreeSet<RelationshipId>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace an entity.
    pub fn upsert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Insert or fully replace a batch of entities. Later duplicates win.
    pub fn upsert_entities(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.upsert_entity(entity);
        }
    }

    /// Insert or fully replace a relationship.
    ///
    /// Refuses the relationship if either endpoint is absent.
    pub fn upsert_relationship(&mut self, relationship: Relationship) -> Result<(), IntegrityViolation> {
        for endpoint in [&relationship.source, &relationship.target] {
            if !self.entities.contains_key(endpoint) {
                return Err(IntegrityViolation {
                    relationship: relationship.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }

        let relationship = relationship.normalized();
        if let Some(previous) = self.relationships.remove(&relationship.id) {
            self.unindex(&previous);
        }
        self.incident
            .entry(relationship.source.clone())
            .or_default()
            .insert(relationship.id.clone());
        self.incident
            .entry(relationship.target.clone())
            .or_default()
            .insert(relationship.id.clone());
        self.relationships.insert(relationship.id.clone(), relationship);
        Ok(())
    }

    /// Insert or replace a batch of relationships.
    ///
    /// Dangling relationships are refused individually; the rest are admitted.
    pub fn upsert_relationships(
        &mut self,
        relationships: impl IntoIterator<Item = Relationship>,
    ) -> Vec<IntegrityViolation> {
        let mut rejected = Vec::new();
        for relationship in relationships {
            if let Err(violation) = self.upsert_relationship(relationship) {
                warn!(
                    relationship = %violation.relationship,
                    missing = %violation.missing,
                    "refusing dangling relationship"
                );
                rejected.push(violation);
            }
        }
        rejected
    }

    fn unindex(&mut self, relationship: &Relationship) {
        for endpoint in [&relationship.source, &relationship.target] {
            if let Some(set) = self.incident.get_mut(endpoint) {
                set.remove(&relationship.id);
                if set.is_empty() {
                    self.incident.remove(endpoint);
                }
            }
        }
    }

    /// Get an entity by ID.
    pub fn get_entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Get a relationship by ID.
    pub fn get_relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    /// Whether an entity is registered.
    pub fn contains_entity(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Whether a relationship is registered.
    pub fn contains_relationship(&self, id: &RelationshipId) -> bool {
        self.relationships.contains_key(id)
    }

    /// All entities, ordered by ID.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All relationships, ordered by ID.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Copy of the complete element set as a payload.
    pub fn all(&self) -> GraphPayload {
        GraphPayload::new(
            self.entities.values().cloned().collect(),
            self.relationships.values().cloned().collect(),
        )
    }

    /// Get number of entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Get number of relationships.
    pub fn num_relationships(&self) -> usize {
        self.relationships.len()
    }

    /// Whether the registry holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.relationships.clear();
        self.incident.clear();
    }

    /// Relationships incident to an entity, ordered by ID.
    pub fn relationships_of(&self, id: &EntityId) -> impl Iterator<Item = &Relationship> {
        self.incident
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|rid| self.relationships.get(rid))
    }

    /// Distinct entities connected to `id` by any relationship.
    pub fn neighbors(&self, id: &EntityId) -> BTreeSet<&EntityId> {
        self.relationships_of(id)
            .filter_map(|r| r.other_end(id))
            .filter(|other| *other != id)
            .collect()
    }

    /// Number of distinct non-hidden neighbors of an entity.
    pub fn neighbor_count(&self, id: &EntityId) -> usize {
        self.neighbors(id)
            .into_iter()
            .filter(|n| self.entities.get(*n).map_or(false, |e| !e.hidden))
            .count()
    }

    /// Set the pinned flag. Returns true if the flag changed.
    pub fn set_pinned(&mut self, id: &EntityId, pinned: bool) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) if entity.pinned != pinned => {
                entity.pinned = pinned;
                true
            }
            _ => false,
        }
    }

    /// Set the hidden flag. Returns true if the flag changed.
    pub fn set_hidden(&mut self, id: &EntityId, hidden: bool) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) if entity.hidden != hidden => {
                entity.hidden = hidden;
                true
            }
            _ => false,
        }
    }

    /// Clear every hidden flag. Returns how many entities were restored.
    pub fn unhide_all(&mut self) -> usize {
        let mut restored = 0;
        for entity in self.entities.values_mut().filter(|e| e.hidden) {
            entity.hidden = false;
            restored += 1;
        }
        restored
    }

    /// Update an entity's risk score. Returns false if the entity is unknown.
    pub fn set_risk_score(&mut self, id: &EntityId, score: i64) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.set_risk_score(score);
                true
            }
            None => false,
        }
    }

    /// Merge properties into an existing entity (enrichment).
    ///
    /// Only the `properties` mapping changes, except that an integer
    /// `risk_score` property also updates the score and its level.
    /// Returns false if the entity is unknown.
    pub fn merge_properties(&mut self, id: &EntityId, properties: Properties) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if let Some(score) = properties.get(RISK_SCORE_PROPERTY).and_then(|v| v.as_integer()) {
            entity.set_risk_score(score);
        }
        entity.properties.extend(properties);
        true
    }

    /// Whether every relationship's endpoints resolve.
    pub fn is_consistent(&self) -> bool {
        self.relationships
            .values()
            .all(|r| self.entities.contains_key(&r.source) && self.entities.contains_key(&r.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityType, PropertyValue, RelationshipType, RiskLevel};
    use proptest::prelude::*;

    fn person(id: &str) -> Entity {
        Entity::new(id, id.to_uppercase(), EntityType::Person)
    }

    fn link(id: &str, a: &str, b: &str) -> Relationship {
        Relationship::new(id, a, b, RelationshipType::LinkedTo)
    }

    #[test]
    fn test_upsert_replaces_fully() {
        let mut registry = Registry::new();
        registry.upsert_entity(person("a").with_property("k", "v").with_risk_score(90));
        registry.upsert_entity(person("a"));

        let a = registry.get_entity(&"a".into()).unwrap();
        assert!(a.properties.is_empty());
        assert_eq!(a.risk_score(), 0);
        assert_eq!(registry.num_entities(), 1);
    }

    #[test]
    fn test_dangling_relationship_rejected() {
        let mut registry = Registry::new();
        registry.upsert_entities([person("a"), person("b")]);

        let rejected = registry.upsert_relationships([link("r1", "a", "b"), link("r2", "a", "ghost")]);

        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].relationship, RelationshipId::from("r2"));
        assert_eq!(rejected[0].missing, EntityId::from("ghost"));
        assert!(registry.contains_relationship(&"r1".into()));
        assert!(!registry.contains_relationship(&"r2".into()));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_relationship_rewire_updates_index() {
        let mut registry = Registry::new();
        registry.upsert_entities([person("a"), person("b"), person("c")]);
        registry.upsert_relationship(link("r1", "a", "b")).unwrap();
        registry.upsert_relationship(link("r1", "a", "c")).unwrap();

        assert_eq!(registry.neighbor_count(&"b".into()), 0);
        assert_eq!(registry.neighbor_count(&"c".into()), 1);
        assert_eq!(registry.num_relationships(), 1);
    }

    #[test]
    fn test_neighbor_count_skips_hidden() {
        let mut registry = Registry::new();
        registry.upsert_entities([person("a"), person("b"), person("c")]);
        registry.upsert_relationships([link("r1", "a", "b"), link("r2", "a", "c"), link("r3", "b", "a")]);

        assert_eq!(registry.neighbor_count(&"a".into()), 2);
        registry.set_hidden(&"b".into(), true);
        assert_eq!(registry.neighbor_count(&"a".into()), 1);
    }

    #[test]
    fn test_merge_properties_only_touches_properties() {
        let mut registry = Registry::new();
        registry.upsert_entity(person("a").with_property("old", "x"));

        let mut props = Properties::new();
        props.insert("breaches".into(), PropertyValue::Integer(3));
        props.insert(RISK_SCORE_PROPERTY.into(), PropertyValue::Integer(72));
        assert!(registry.merge_properties(&"a".into(), props));

        let a = registry.get_entity(&"a".into()).unwrap();
        assert_eq!(a.label, "A");
        assert_eq!(a.properties["old"], PropertyValue::Text("x".into()));
        assert_eq!(a.properties["breaches"], PropertyValue::Integer(3));
        assert_eq!(a.risk_level(), RiskLevel::High);

        assert!(!registry.merge_properties(&"missing".into(), Properties::new()));
    }

    #[test]
    fn test_unhide_all() {
        let mut registry = Registry::new();
        registry.upsert_entities([person("a"), person("b")]);
        registry.set_hidden(&"a".into(), true);
        registry.set_hidden(&"b".into(), true);
        assert_eq!(registry.unhide_all(), 2);
        assert!(registry.entities().all(|e| !e.hidden));
    }

    proptest! {
        #[test]
        fn prop_upsert_last_writer_wins(ops in proptest::collection::vec((0u8..6, 0i64..=100), 1..40)) {
            let mut registry = Registry::new();
            let mut expected: BTreeMap<EntityId, i64> = BTreeMap::new();

            for (id, score) in &ops {
                let id = format!("e{id}");
                registry.upsert_entities([person(&id).with_risk_score(*score)]);
                expected.insert(EntityId::from(id), *score);
            }

            prop_assert_eq!(registry.num_entities(), expected.len());
            for (id, score) in expected {
                let entity = registry.get_entity(&id).unwrap();
                prop_assert_eq!(i64::from(entity.risk_score()), score);
            }
        }

        #[test]
        fn prop_risk_level_tracks_score(scores in proptest::collection::vec(-50i64..200, 1..30)) {
            let mut registry = Registry::new();
            registry.upsert_entity(person("a"));
            for score in scores {
                registry.set_risk_score(&"a".into(), score);
                let a = registry.get_entity(&"a".into()).unwrap();
                prop_assert_eq!(a.risk_level(), RiskLevel::from_score(a.risk_score()));
            }
        }
    }
}
