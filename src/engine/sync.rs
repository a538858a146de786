//! Translate state transitions into renderer calls.

use std::collections::BTreeSet;

use tracing::debug;

use super::state::EngineState;
use crate::config::EngineConfig;
use crate::filter::{Classification, ClassificationMap};
use crate::renderer::Renderer;
use crate::types::{ElementId, EntityId};

/// Bring the renderer from `prev` to `next`.
///
/// Removals go edges first, additions nodes first, so the renderer never
/// holds an edge whose endpoint is missing.
pub fn sync(renderer: &mut dyn Renderer, prev: &EngineState, next: &EngineState, config: &EngineConfig) {
    if next.reset_epoch() != prev.reset_epoch() {
        full_sync(renderer, next, config);
        return;
    }

    let (before, after) = (&prev.registry, &next.registry);

    for relationship in before.relationships() {
        if !after.contains_relationship(&relationship.id) {
            renderer.remove_element(&ElementId::Relationship(relationship.id.clone()));
        }
    }
    for entity in before.entities() {
        if !after.contains_entity(&entity.id) {
            renderer.remove_element(&ElementId::Entity(entity.id.clone()));
        }
    }

    for entity in after.entities() {
        match before.get_entity(&entity.id) {
            None => {
                renderer.add_entity(entity);
                if entity.pinned {
                    renderer.set_locked(&entity.id, true);
                }
            }
            Some(old) if old != entity => {
                renderer.update_entity(entity);
                if old.pinned != entity.pinned {
                    renderer.set_locked(&entity.id, entity.pinned);
                }
            }
            Some(_) => {}
        }
    }
    for relationship in after.relationships() {
        match before.get_relationship(&relationship.id) {
            None => renderer.add_relationship(relationship),
            Some(old) if old != relationship => renderer.update_relationship(relationship),
            Some(_) => {}
        }
    }

    apply_classes(renderer, Some(prev.classification()), next.classification());

    if next.layout_epoch() != prev.layout_epoch() {
        run_layout(renderer, next, config);
    }
}

/// Rebuild the renderer from scratch.
pub fn full_sync(renderer: &mut dyn Renderer, state: &EngineState, config: &EngineConfig) {
    renderer.clear();
    for entity in state.registry.entities() {
        renderer.add_entity(entity);
        if entity.pinned {
            renderer.set_locked(&entity.id, true);
        }
    }
    for relationship in state.registry.relationships() {
        renderer.add_relationship(relationship);
    }
    apply_classes(renderer, None, state.classification());
    run_layout(renderer, state, config);
}

fn apply_classes(renderer: &mut dyn Renderer, prev: Option<&ClassificationMap>, next: &ClassificationMap) {
    let entities = next
        .entities
        .iter()
        .map(|(id, c)| (ElementId::Entity(id.clone()), *c));
    let relationships = next
        .relationships
        .iter()
        .map(|(id, c)| (ElementId::Relationship(id.clone()), *c));

    for (id, classification) in entities.chain(relationships) {
        let old = prev.and_then(|p| p.get(&id)).copied();
        if needs_update(old, classification) {
            renderer.set_classes(&id, &classification.classes());
        }
    }
}

fn needs_update(old: Option<Classification>, new: Classification) -> bool {
    match old {
        Some(old) => old != new,
        None => new != Classification::VISIBLE,
    }
}

fn run_layout(renderer: &mut dyn Renderer, state: &EngineState, config: &EngineConfig) {
    let nodes: Vec<EntityId> = state
        .registry
        .entities()
        .filter(|e| !e.hidden)
        .map(|e| e.id.clone())
        .collect();
    debug!(layout = %state.layout, nodes = nodes.len(), "Running layout");
    renderer.run_layout(state.layout, &config.layout_options(state.layout), &nodes);
}

/// Elements the renderer holds that the registry does not, and vice versa.
///
/// Both sets are empty whenever the renderer is in sync.
pub fn drift(renderer: &dyn Renderer, state: &EngineState) -> (BTreeSet<ElementId>, BTreeSet<ElementId>) {
    let live = renderer.live_elements();
    let expected: BTreeSet<ElementId> = state
        .registry
        .entities()
        .map(|e| ElementId::Entity(e.id.clone()))
        .chain(
            state
                .registry
                .relationships()
                .map(|r| ElementId::Relationship(r.id.clone())),
        )
        .collect();
    let extra = live.difference(&expected).cloned().collect();
    let missing = expected.difference(&live).cloned().collect();
    (extra, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterPatch, VisualClass};
    use crate::engine::store::StoreState;
    use crate::renderer::{RecordingRenderer, RenderCall};
    use crate::types::{Entity, EntityType, Relationship, RelationshipType};

    fn state_with(entities: &[&str], edges: &[(&str, &str, &str)]) -> EngineState {
        let mut state = EngineState::default();
        for id in entities {
            state.registry.upsert_entity(Entity::new(*id, *id, EntityType::Person));
        }
        for (id, s, t) in edges {
            state
                .registry
                .upsert_relationship(Relationship::new(*id, *s, *t, RelationshipType::LinkedTo))
                .unwrap();
        }
        state.derive();
        state
    }

    #[test]
    fn test_removals_edges_first() {
        let config = EngineConfig::default();
        let prev = state_with(&["a", "b"], &[("ab", "a", "b")]);
        let next = state_with(&[], &[]);
        let mut renderer = RecordingRenderer::new();
        full_sync(&mut renderer, &prev, &config);
        renderer.clear_calls();

        sync(&mut renderer, &prev, &next, &config);

        let calls = renderer.calls();
        assert_eq!(calls[0], RenderCall::Remove(ElementId::Relationship("ab".into())));
        assert!(drift(&renderer, &next).0.is_empty());
    }

    #[test]
    fn test_additions_nodes_first() {
        let config = EngineConfig::default();
        let prev = state_with(&[], &[]);
        let next = state_with(&["a", "b"], &[("ab", "a", "b")]);
        let mut renderer = RecordingRenderer::new();

        sync(&mut renderer, &prev, &next, &config);

        let calls = renderer.calls();
        assert_eq!(calls.last(), Some(&RenderCall::AddRelationship("ab".into())));
        assert_eq!(drift(&renderer, &next), (BTreeSet::new(), BTreeSet::new()));
    }

    #[test]
    fn test_class_changes_only() {
        let config = EngineConfig::default();
        let prev = state_with(&["a"], &[]);
        let mut next = prev.clone();
        next.filter.apply(FilterPatch::entity_type(EntityType::Person, false));
        next.derive();
        let mut renderer = RecordingRenderer::new();
        full_sync(&mut renderer, &prev, &config);
        renderer.clear_calls();

        sync(&mut renderer, &prev, &next, &config);

        assert_eq!(
            renderer.calls(),
            vec![RenderCall::SetClasses(ElementId::Entity("a".into()), vec![VisualClass::Faded])]
        );
    }

    #[test]
    fn test_pin_locks() {
        let config = EngineConfig::default();
        let prev = state_with(&["a"], &[]);
        let mut next = prev.clone();
        next.registry.set_pinned(&"a".into(), true);
        next.derive();
        let mut renderer = RecordingRenderer::new();
        full_sync(&mut renderer, &prev, &config);

        sync(&mut renderer, &prev, &next, &config);

        assert!(renderer.is_locked(&"a".into()));
        assert_eq!(renderer.classes_of(&ElementId::Entity("a".into())), vec![VisualClass::Pinned]);
    }

    #[test]
    fn test_layout_epoch_triggers_layout() {
        let config = EngineConfig::default();
        let prev = state_with(&["a"], &[]);
        let mut next = prev.clone();
        next.request_layout();
        let mut renderer = RecordingRenderer::new();

        sync(&mut renderer, &prev, &next, &config);
        assert_eq!(renderer.layout_runs(), 1);
    }
}
