//! Data source collaborator.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{EntityId, EntityType, GraphPayload, Properties, RelationshipType};

/// Parameters of a neighborhood expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRequest {
    /// Node to expand around.
    pub node_id: EntityId,
    /// Case the expansion is scoped to.
    pub case_id: String,
    /// Hop limit. Data source default when unset.
    pub depth: Option<u32>,
    /// Restrict traversal to these relationship types.
    pub relationship_types: Option<Vec<RelationshipType>>,
    /// Maximum number of nodes returned.
    pub limit: Option<usize>,
}

impl ExpandRequest {
    /// Expansion with data source defaults.
    pub fn new(node_id: EntityId, case_id: impl Into<String>) -> Self {
        Self {
            node_id,
            case_id: case_id.into(),
            depth: None,
            relationship_types: None,
            limit: None,
        }
    }
}

/// Whether `address` is acceptable as a wallet trace target: 20 to 200
/// ASCII alphanumerics.
pub fn is_valid_wallet_address(address: &str) -> bool {
    match regex_lite::Regex::new(r"^[A-Za-z0-9]{20,200}$") {
        Ok(pattern) => pattern.is_match(address),
        Err(_) => false,
    }
}

/// Trait for the external data source.
///
/// Any error is surfaced by the engine as a fetch failure; the engine never
/// mutates state on an `Err`.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Error type for data source operations.
    type Error: std::error::Error + Send + Sync;

    /// Fetch the full graph of a case (initial load).
    async fn fetch_graph(&self, case_id: &str) -> Result<GraphPayload, Self::Error>;

    /// Fetch the neighborhood of a node.
    async fn expand_node(&self, request: &ExpandRequest) -> Result<GraphPayload, Self::Error>;

    /// Run enrichment for an entity and return properties to merge.
    async fn run_enrichment(&self, entity_id: &EntityId, entity_type: EntityType) -> Result<Properties, Self::Error>;

    /// Trace the transaction graph of a wallet address.
    async fn trace_wallet(&self, address: &str, depth: Option<u32>) -> Result<GraphPayload, Self::Error>;

    /// Add entities to a case.
    async fn add_to_case(&self, entity_ids: &[EntityId], case_id: &str, notes: Option<&str>) -> Result<(), Self::Error>;
}

pub use memory::{InMemoryDataSource, InMemorySourceError, SourceOp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_validation() {
        assert!(is_valid_wallet_address("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh"));
        assert!(is_valid_wallet_address(&"a".repeat(200)));
        assert!(!is_valid_wallet_address(&"a".repeat(19)));
        assert!(!is_valid_wallet_address(&"a".repeat(201)));
        assert!(!is_valid_wallet_address("0x12-34567890abcdef12345"));
        assert!(!is_valid_wallet_address(""));
    }
}
