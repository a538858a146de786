//! Error types surfaced by the engine.

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, RelationshipId};

/// A relationship refused because an endpoint is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Relationship {relationship} references unknown entity {missing}")]
pub struct IntegrityViolation {
    /// The refused relationship.
    pub relationship: RelationshipId,
    /// The endpoint that could not be resolved.
    pub missing: EntityId,
}

/// Error type for engine operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The data source rejected the request or timed out.
    #[error("Fetch failed: {0}")]
    FetchFailure(String),
    /// A relationship references an unknown entity.
    #[error("Data integrity violation: {0}")]
    DataIntegrityViolation(#[from] IntegrityViolation),
    /// The requested operation does not apply to its target.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// The renderer has not attached yet.
    #[error("Renderer unavailable")]
    RendererUnavailable,
}

impl EngineError {
    /// Create a fetch failure from any data source error.
    pub fn from_source<E: std::error::Error>(e: E) -> Self {
        Self::FetchFailure(e.to_string())
    }

    /// Create an invalid-operation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Whether this error is surfaced as a soft notice instead of the banner.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::InvalidOperation(_) | Self::DataIntegrityViolation(_))
    }
}
