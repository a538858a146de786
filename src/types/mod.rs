//! Core types for the graph engine.

pub mod entity;
pub mod relationship;
pub mod payload;

pub use entity::{Entity, EntityId, EntityType, Properties, PropertyValue, RiskLevel};
pub use relationship::{Relationship, RelationshipId, RelationshipType};
pub use payload::{ElementId, GraphPayload};
