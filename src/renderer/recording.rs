//! Recording renderer: a test double that keeps a live element set and logs
//! every call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ExportFormat, LayoutAlgorithm, LayoutOptions, Renderer, RendererError};
use crate::filter::VisualClass;
use crate::types::{Entity, ElementId, EntityId, GraphPayload, Relationship, RelationshipId};

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    /// `add_entity`
    AddEntity(EntityId),
    /// `add_relationship`
    AddRelationship(RelationshipId),
    /// `remove_element`
    Remove(ElementId),
    /// `update_entity`
    UpdateEntity(EntityId),
    /// `update_relationship`
    UpdateRelationship(RelationshipId),
    /// `set_classes`
    SetClasses(ElementId, Vec<VisualClass>),
    /// `set_locked`
    SetLocked(EntityId, bool),
    /// `clear`
    Clear,
    /// `run_layout`
    RunLayout {
        /// Algorithm requested.
        algorithm: LayoutAlgorithm,
        /// Options passed.
        options: LayoutOptions,
        /// Number of nodes arranged.
        nodes: usize,
    },
}

#[derive(Debug, Default)]
struct Canvas {
    entities: BTreeMap<EntityId, Entity>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    classes: BTreeMap<ElementId, Vec<VisualClass>>,
    locked: BTreeSet<EntityId>,
    calls: Vec<RenderCall>,
}

/// Renderer double. Clones share the same canvas, so a test can keep one
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    canvas: Arc<Mutex<Canvas>>,
}

impl RecordingRenderer {
    /// Create an empty canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.canvas.lock().calls.clone()
    }

    /// Forget recorded calls (the canvas is kept).
    pub fn clear_calls(&self) {
        self.canvas.lock().calls.clear();
    }

    /// The live copy of a node.
    pub fn live_entity(&self, id: &EntityId) -> Option<Entity> {
        self.canvas.lock().entities.get(id).cloned()
    }

    /// The live copy of an edge.
    pub fn live_relationship(&self, id: &RelationshipId) -> Option<Relationship> {
        self.canvas.lock().relationships.get(id).cloned()
    }

    /// Number of live nodes.
    pub fn num_entities(&self) -> usize {
        self.canvas.lock().entities.len()
    }

    /// Number of live edges.
    pub fn num_relationships(&self) -> usize {
        self.canvas.lock().relationships.len()
    }

    /// Classes currently applied to an element.
    pub fn classes_of(&self, id: &ElementId) -> Vec<VisualClass> {
        self.canvas.lock().classes.get(id).cloned().unwrap_or_default()
    }

    /// Whether a node's position is locked.
    pub fn is_locked(&self, id: &EntityId) -> bool {
        self.canvas.lock().locked.contains(id)
    }

    /// Number of layout runs recorded.
    pub fn layout_runs(&self) -> usize {
        self.canvas
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RenderCall::RunLayout { .. }))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn add_entity(&mut self, entity: &Entity) {
        let mut canvas = self.canvas.lock();
        canvas.entities.insert(entity.id.clone(), entity.clone());
        canvas.calls.push(RenderCall::AddEntity(entity.id.clone()));
    }

    fn add_relationship(&mut self, relationship: &Relationship) {
        let mut canvas = self.canvas.lock();
        canvas.relationships.insert(relationship.id.clone(), relationship.clone());
        canvas.calls.push(RenderCall::AddRelationship(relationship.id.clone()));
    }

    fn remove_element(&mut self, id: &ElementId) {
        let mut canvas = self.canvas.lock();
        match id {
            ElementId::Entity(eid) => {
                canvas.entities.remove(eid);
                canvas.locked.remove(eid);
            }
            ElementId::Relationship(rid) => {
                canvas.relationships.remove(rid);
            }
        }
        canvas.classes.remove(id);
        canvas.calls.push(RenderCall::Remove(id.clone()));
    }

    fn update_entity(&mut self, entity: &Entity) {
        let mut canvas = self.canvas.lock();
        canvas.entities.insert(entity.id.clone(), entity.clone());
        canvas.calls.push(RenderCall::UpdateEntity(entity.id.clone()));
    }

    fn update_relationship(&mut self, relationship: &Relationship) {
        let mut canvas = self.canvas.lock();
        canvas.relationships.insert(relationship.id.clone(), relationship.clone());
        canvas.calls.push(RenderCall::UpdateRelationship(relationship.id.clone()));
    }

    fn set_classes(&mut self, id: &ElementId, classes: &[VisualClass]) {
        let mut canvas = self.canvas.lock();
        if classes.is_empty() {
            canvas.classes.remove(id);
        } else {
            canvas.classes.insert(id.clone(), classes.to_vec());
        }
        canvas.calls.push(RenderCall::SetClasses(id.clone(), classes.to_vec()));
    }

    fn set_locked(&mut self, id: &EntityId, locked: bool) {
        let mut canvas = self.canvas.lock();
        if locked {
            canvas.locked.insert(id.clone());
        } else {
            canvas.locked.remove(id);
        }
        canvas.calls.push(RenderCall::SetLocked(id.clone(), locked));
    }

    fn clear(&mut self) {
        let mut canvas = self.canvas.lock();
        canvas.entities.clear();
        canvas.relationships.clear();
        canvas.classes.clear();
        canvas.locked.clear();
        canvas.calls.push(RenderCall::Clear);
    }

    fn run_layout(&mut self, algorithm: LayoutAlgorithm, options: &LayoutOptions, nodes: &[EntityId]) {
        self.canvas.lock().calls.push(RenderCall::RunLayout {
            algorithm,
            options: options.clone(),
            nodes: nodes.len(),
        });
    }

    fn live_elements(&self) -> BTreeSet<ElementId> {
        let canvas = self.canvas.lock();
        canvas
            .entities
            .keys()
            .cloned()
            .map(ElementId::Entity)
            .chain(canvas.relationships.keys().cloned().map(ElementId::Relationship))
            .collect()
    }

    fn neighborhood(&self, id: &EntityId) -> BTreeSet<ElementId> {
        let canvas = self.canvas.lock();
        let mut out = BTreeSet::new();
        for relationship in canvas.relationships.values().filter(|r| r.touches(id)) {
            out.insert(ElementId::Relationship(relationship.id.clone()));
            if let Some(other) = relationship.other_end(id) {
                if other != id {
                    out.insert(ElementId::Entity(other.clone()));
                }
            }
        }
        out
    }

    fn export(&self, format: ExportFormat) -> Result<Vec<u8>, RendererError> {
        let canvas = self.canvas.lock();
        match format {
            ExportFormat::Json => {
                let payload = GraphPayload::new(
                    canvas.entities.values().cloned().collect(),
                    canvas.relationships.values().cloned().collect(),
                );
                serde_json::to_vec_pretty(&payload).map_err(|e| RendererError::ExportFailed(e.to_string()))
            }
            ExportFormat::Svg => Ok(format!(
                "<svg xmlns=\"http://www.w3.org/2000/svg\" data-nodes=\"{}\" data-edges=\"{}\"/>",
                canvas.entities.len(),
                canvas.relationships.len()
            )
            .into_bytes()),
            ExportFormat::Png => Err(RendererError::UnsupportedFormat(format)),
        }
    }
}
