//! Graph payloads exchanged with the data source.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{Entity, EntityId};
use super::relationship::{Relationship, RelationshipId};

/// A batch of nodes and edges returned by the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    /// Entities.
    #[serde(default)]
    pub nodes: Vec<Entity>,
    /// Relationships.
    #[serde(default)]
    pub edges: Vec<Relationship>,
}

impl GraphPayload {
    /// Create a payload.
    pub fn new(nodes: Vec<Entity>, edges: Vec<Relationship>) -> Self {
        Self { nodes, edges }
    }

    /// Whether the payload carries nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Identifier of any element the renderer draws.
///
/// Entity and relationship ids live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementId {
    /// A node.
    Entity(EntityId),
    /// An edge.
    Relationship(RelationshipId),
}

impl ElementId {
    /// The entity id, if this is a node.
    pub fn as_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            Self::Relationship(_) => None,
        }
    }

    /// The relationship id, if this is an edge.
    pub fn as_relationship(&self) -> Option<&RelationshipId> {
        match self {
            Self::Relationship(id) => Some(id),
            Self::Entity(_) => None,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "node:{id}"),
            Self::Relationship(id) => write!(f, "edge:{id}"),
        }
    }
}

impl From<EntityId> for ElementId {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<RelationshipId> for ElementId {
    fn from(id: RelationshipId) -> Self {
        Self::Relationship(id)
    }
}
