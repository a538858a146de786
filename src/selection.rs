//! Selection state machine.
//!
//! The primary slot holds at most one node or one edge; node and edge
//! selection are mutually exclusive by construction. The multi-selection set
//! is an orthogonal track fed by modifier-clicks and box-select.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::registry::Registry;
use crate::types::{ElementId, EntityId, RelationshipId};

/// Primary single-selection slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum PrimarySelection {
    /// Nothing selected.
    #[default]
    Idle,
    /// A node is selected.
    Node(EntityId),
    /// An edge is selected.
    Edge(RelationshipId),
}

/// Selection input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SelectionEvent {
    /// Plain click on a node.
    NodeClick {
        /// Clicked node.
        id: EntityId,
    },
    /// Click on a node with the multi-select modifier held.
    ModifierNodeClick {
        /// Clicked node.
        id: EntityId,
    },
    /// Click on an edge.
    EdgeClick {
        /// Clicked edge.
        id: RelationshipId,
    },
    /// Click on empty canvas.
    BackgroundClick,
    /// Escape key.
    Escape,
    /// Rubber-band selection of nodes.
    BoxSelect {
        /// Nodes inside the box.
        ids: Vec<EntityId>,
    },
}

/// Current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    primary: PrimarySelection,
    multi: BTreeSet<EntityId>,
}

impl Selection {
    /// Create an idle selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event. Returns true if anything changed.
    pub fn apply(&mut self, event: SelectionEvent) -> bool {
        let before = self.clone();
        match event {
            SelectionEvent::NodeClick { id } => self.primary = PrimarySelection::Node(id),
            SelectionEvent::EdgeClick { id } => self.primary = PrimarySelection::Edge(id),
            SelectionEvent::ModifierNodeClick { id } => {
                if !self.multi.remove(&id) {
                    self.multi.insert(id);
                }
            }
            SelectionEvent::BoxSelect { ids } => self.multi.extend(ids),
            SelectionEvent::BackgroundClick | SelectionEvent::Escape => {
                self.primary = PrimarySelection::Idle;
                self.multi.clear();
            }
        }
        *self != before
    }

    /// Primary slot.
    pub fn primary(&self) -> &PrimarySelection {
        &self.primary
    }

    /// Selected node, if any.
    pub fn selected_node(&self) -> Option<&EntityId> {
        match &self.primary {
            PrimarySelection::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Selected edge, if any.
    pub fn selected_edge(&self) -> Option<&RelationshipId> {
        match &self.primary {
            PrimarySelection::Edge(id) => Some(id),
            _ => None,
        }
    }

    /// Multi-selected nodes.
    pub fn multi_selected(&self) -> &BTreeSet<EntityId> {
        &self.multi
    }

    /// Whether nothing at all is selected.
    pub fn is_empty(&self) -> bool {
        self.primary == PrimarySelection::Idle && self.multi.is_empty()
    }

    /// Element in the primary slot.
    pub fn target(&self) -> Option<ElementId> {
        match &self.primary {
            PrimarySelection::Idle => None,
            PrimarySelection::Node(id) => Some(ElementId::Entity(id.clone())),
            PrimarySelection::Edge(id) => Some(ElementId::Relationship(id.clone())),
        }
    }
}

/// Derived detail-panel target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspection {
    /// The inspected element.
    pub target: ElementId,
    /// Distinct visible neighbors (nodes) or distinct endpoints (edges).
    pub neighbor_count: usize,
}

/// Derive the inspection target for the current selection.
///
/// Returns `None` when nothing is selected or the selected element no
/// longer exists in the registry.
pub fn inspect(selection: &Selection, registry: &Registry) -> Option<Inspection> {
    match selection.primary() {
        PrimarySelection::Idle => None,
        PrimarySelection::Node(id) => registry.contains_entity(id).then(|| Inspection {
            target: ElementId::Entity(id.clone()),
            neighbor_count: registry.neighbor_count(id),
        }),
        PrimarySelection::Edge(id) => registry.get_relationship(id).map(|r| Inspection {
            target: ElementId::Relationship(id.clone()),
            neighbor_count: if r.source == r.target { 1 } else { 2 },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, EntityType, Relationship, RelationshipType};
    use proptest::prelude::*;

    fn node(id: &str) -> SelectionEvent {
        SelectionEvent::NodeClick { id: id.into() }
    }

    fn edge(id: &str) -> SelectionEvent {
        SelectionEvent::EdgeClick { id: id.into() }
    }

    #[test]
    fn test_node_clears_edge() {
        let mut s = Selection::new();
        s.apply(edge("r1"));
        assert_eq!(s.selected_edge(), Some(&RelationshipId::from("r1")));
        s.apply(node("a"));
        assert_eq!(s.selected_node(), Some(&EntityId::from("a")));
        assert!(s.selected_edge().is_none());
    }

    #[test]
    fn test_modifier_click_toggles_multi_only() {
        let mut s = Selection::new();
        s.apply(node("a"));
        s.apply(SelectionEvent::ModifierNodeClick { id: "b".into() });
        s.apply(SelectionEvent::ModifierNodeClick { id: "c".into() });
        assert_eq!(s.selected_node(), Some(&EntityId::from("a")));
        assert_eq!(s.multi_selected().len(), 2);

        s.apply(SelectionEvent::ModifierNodeClick { id: "b".into() });
        assert_eq!(s.multi_selected().len(), 1);
        assert_eq!(s.selected_node(), Some(&EntityId::from("a")));
    }

    #[test]
    fn test_background_and_escape_reset() {
        for reset in [SelectionEvent::BackgroundClick, SelectionEvent::Escape] {
            let mut s = Selection::new();
            s.apply(node("a"));
            s.apply(SelectionEvent::BoxSelect { ids: vec!["b".into(), "c".into()] });
            assert!(s.apply(reset));
            assert!(s.is_empty());
        }
    }

    #[test]
    fn test_apply_reports_change() {
        let mut s = Selection::new();
        assert!(!s.apply(SelectionEvent::Escape));
        assert!(s.apply(node("a")));
        assert!(!s.apply(node("a")));
    }

    #[test]
    fn test_inspect_counts_neighbors() {
        let mut registry = Registry::new();
        registry.upsert_entities([
            Entity::new("a", "A", EntityType::Person),
            Entity::new("b", "B", EntityType::Email),
            Entity::new("c", "C", EntityType::Phone),
        ]);
        registry.upsert_relationships([
            Relationship::new("r1", "a", "b", RelationshipType::Uses),
            Relationship::new("r2", "a", "c", RelationshipType::Uses),
        ]);

        let mut s = Selection::new();
        s.apply(node("a"));
        assert_eq!(inspect(&s, &registry).unwrap().neighbor_count, 2);

        s.apply(edge("r1"));
        assert_eq!(inspect(&s, &registry).unwrap().neighbor_count, 2);

        s.apply(node("ghost"));
        assert!(inspect(&s, &registry).is_none());
    }

    fn arb_event() -> impl Strategy<Value = SelectionEvent> {
        let id = "[a-d]";
        prop_oneof![
            id.prop_map(|i| SelectionEvent::NodeClick { id: i.into() }),
            id.prop_map(|i| SelectionEvent::ModifierNodeClick { id: i.into() }),
            id.prop_map(|i| SelectionEvent::EdgeClick { id: i.into() }),
            Just(SelectionEvent::BackgroundClick),
            Just(SelectionEvent::Escape),
            proptest::collection::vec(id, 0..3)
                .prop_map(|ids| SelectionEvent::BoxSelect { ids: ids.into_iter().map(EntityId::from).collect() }),
        ]
    }

    proptest! {
        #[test]
        fn prop_node_and_edge_exclusive(events in proptest::collection::vec(arb_event(), 0..40)) {
            let mut s = Selection::new();
            for event in events {
                let expect_node = matches!(&event, SelectionEvent::NodeClick { .. });
                let expect_edge = matches!(&event, SelectionEvent::EdgeClick { .. });
                s.apply(event);
                prop_assert!(!(s.selected_node().is_some() && s.selected_edge().is_some()));
                if expect_node {
                    prop_assert!(s.selected_edge().is_none());
                }
                if expect_edge {
                    prop_assert!(s.selected_node().is_none());
                }
            }
        }
    }
}
