//! In-memory data source for testing and offline replay.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{DataSource, ExpandRequest};
use crate::registry::Registry;
use crate::types::{
    Entity, EntityId, EntityType, GraphPayload, Properties, Relationship, RelationshipType,
};

/// Default expansion depth when the request leaves it unset.
pub const DEFAULT_EXPAND_DEPTH: u32 = 1;
/// Default expansion node limit.
pub const DEFAULT_EXPAND_LIMIT: usize = 50;
/// Default wallet trace depth.
pub const DEFAULT_TRACE_DEPTH: u32 = 3;

/// Data source operation, used for failure and latency injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceOp {
    /// `fetch_graph`
    FetchGraph,
    /// `expand_node`
    ExpandNode,
    /// `run_enrichment`
    RunEnrichment,
    /// `trace_wallet`
    TraceWallet,
    /// `add_to_case`
    AddToCase,
}

impl SourceOp {
    /// Every operation.
    pub const ALL: [SourceOp; 5] = [
        Self::FetchGraph,
        Self::ExpandNode,
        Self::RunEnrichment,
        Self::TraceWallet,
        Self::AddToCase,
    ];
}

impl fmt::Display for SourceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FetchGraph => "fetch_graph",
            Self::ExpandNode => "expand_node",
            Self::RunEnrichment => "run_enrichment",
            Self::TraceWallet => "trace_wallet",
            Self::AddToCase => "add_to_case",
        };
        f.write_str(s)
    }
}

/// Error type for the in-memory data source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemorySourceError {
    /// Case not found.
    #[error("Case not found: {0}")]
    CaseNotFound(String),
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),
    /// No wallet with this address.
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    /// Injected failure.
    #[error("Upstream unavailable during {0}")]
    Unavailable(SourceOp),
}

/// A recorded `add_to_case` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseAddition {
    /// Added entities.
    pub entity_ids: Vec<EntityId>,
    /// Target case.
    pub case_id: String,
    /// Analyst notes.
    pub notes: Option<String>,
}

/// In-memory data source.
///
/// Holds a full graph plus case membership; payloads are cut from it.
/// Failures and latency can be injected per operation.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    /// The complete upstream graph.
    graph: Registry,
    /// Case -> member entities.
    cases: Mutex<BTreeMap<String, BTreeSet<EntityId>>>,
    /// Entity -> enrichment result.
    enrichments: BTreeMap<EntityId, Properties>,
    /// Operations that currently fail.
    failing: Mutex<BTreeSet<SourceOp>>,
    /// Artificial latency per operation.
    latency: Mutex<BTreeMap<SourceOp, VecDeque<Duration>>>,
    /// Recorded `add_to_case` calls.
    additions: Mutex<Vec<CaseAddition>>,
    /// Edges with an endpoint missing from `graph`, served as-is so the
    /// consumer sees them.
    loose_edges: Vec<Relationship>,
}

impl InMemoryDataSource {
    /// Create a new empty data source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the upstream graph.
    pub fn add_entity(&mut self, entity: Entity) {
        self.graph.upsert_entity(entity);
    }

    /// Build a source holding one case made of every node in `payload`.
    pub fn from_payload(case_id: &str, payload: GraphPayload) -> Self {
        let mut source = Self::new();
        for entity in payload.nodes {
            source.add_case_member(case_id, entity.id.clone());
            source.add_entity(entity);
        }
        for relationship in payload.edges {
            source.add_relationship(relationship);
        }
        source
    }

    /// Add a relationship to the upstream graph.
    ///
    /// An edge whose endpoints are not (yet) in the graph is kept aside and
    /// still returned by `fetch_graph` for the case of its known endpoint.
    pub fn add_relationship(&mut self, relationship: Relationship) {
        if let Err(violation) = self.graph.upsert_relationship(relationship.clone()) {
            debug!(relationship = %relationship.id, %violation, "Keeping dangling relationship");
            self.loose_edges.push(relationship);
        }
    }

    /// Make an entity a member of a case.
    pub fn add_case_member(&mut self, case_id: &str, entity_id: impl Into<EntityId>) {
        self.cases
            .get_mut()
            .entry(case_id.to_string())
            .or_default()
            .insert(entity_id.into());
    }

    /// Set the enrichment result for an entity.
    pub fn set_enrichment(&mut self, entity_id: impl Into<EntityId>, properties: Properties) {
        self.enrichments.insert(entity_id.into(), properties);
    }

    /// Make an operation fail until [`recover`](Self::recover) is called.
    pub fn fail(&self, op: SourceOp) {
        self.failing.lock().insert(op);
    }

    /// Stop failing an operation.
    pub fn recover(&self, op: SourceOp) {
        self.failing.lock().remove(&op);
    }

    /// Fail (or stop failing) every operation.
    pub fn set_offline(&self, offline: bool) {
        let mut failing = self.failing.lock();
        if offline {
            failing.extend(SourceOp::ALL);
        } else {
            failing.clear();
        }
    }

    /// Delay the next call of `op` by `delay`. Queued delays apply in order.
    pub fn delay_next(&self, op: SourceOp, delay: Duration) {
        self.latency.lock().entry(op).or_default().push_back(delay);
    }

    /// Recorded `add_to_case` calls.
    pub fn additions(&self) -> Vec<CaseAddition> {
        self.additions.lock().clone()
    }

    /// Members of a case.
    pub fn case_members(&self, case_id: &str) -> BTreeSet<EntityId> {
        self.cases.lock().get(case_id).cloned().unwrap_or_default()
    }

    async fn enter(&self, op: SourceOp) -> Result<(), InMemorySourceError> {
        let delay = self.latency.lock().get_mut(&op).and_then(|q| q.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&op) {
            return Err(InMemorySourceError::Unavailable(op));
        }
        Ok(())
    }

    /// Bounded breadth-first traversal from `start`.
    ///
    /// Returns the start node, up to `limit` reached nodes, and the
    /// relationships traversed between included nodes, all in id order.
    fn traverse(
        &self,
        start: &EntityId,
        depth: u32,
        allowed: Option<&[RelationshipType]>,
        limit: usize,
    ) -> GraphPayload {
        let mut included: BTreeSet<EntityId> = BTreeSet::from([start.clone()]);
        let mut frontier: VecDeque<(EntityId, u32)> = VecDeque::from([(start.clone(), 0)]);

        'walk: while let Some((id, distance)) = frontier.pop_front() {
            if distance >= depth {
                continue;
            }
            for relationship in self.graph.relationships_of(&id) {
                if allowed.map_or(false, |types| !types.contains(&relationship.relationship_type)) {
                    continue;
                }
                let Some(other) = relationship.other_end(&id) else {
                    continue;
                };
                if included.contains(other) {
                    continue;
                }
                if included.len() > limit {
                    break 'walk;
                }
                included.insert(other.clone());
                frontier.push_back((other.clone(), distance + 1));
            }
        }

        self.payload_for(&included, allowed)
    }

    fn payload_for(&self, ids: &BTreeSet<EntityId>, allowed: Option<&[RelationshipType]>) -> GraphPayload {
        let nodes = ids
            .iter()
            .filter_map(|id| self.graph.get_entity(id).cloned())
            .collect();
        let edges = self
            .graph
            .relationships()
            .filter(|r| ids.contains(&r.source) && ids.contains(&r.target))
            .filter(|r| allowed.map_or(true, |types| types.contains(&r.relationship_type)))
            .cloned()
            .collect();
        GraphPayload::new(nodes, edges)
    }

    fn find_wallet(&self, address: &str) -> Option<&Entity> {
        self.graph.entities().find(|e| {
            e.entity_type == EntityType::CryptoWallet
                && (e.label == address
                    || e.properties.get("address").and_then(|v| v.as_text()) == Some(address))
        })
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    type Error = InMemorySourceError;

    async fn fetch_graph(&self, case_id: &str) -> Result<GraphPayload, Self::Error> {
        self.enter(SourceOp::FetchGraph).await?;
        let members = self
            .cases
            .lock()
            .get(case_id)
            .cloned()
            .ok_or_else(|| InMemorySourceError::CaseNotFound(case_id.to_string()))?;
        let mut payload = self.payload_for(&members, None);
        payload.edges.extend(
            self.loose_edges
                .iter()
                .filter(|r| members.contains(&r.source) || members.contains(&r.target))
                .cloned(),
        );
        Ok(payload)
    }

    async fn expand_node(&self, request: &ExpandRequest) -> Result<GraphPayload, Self::Error> {
        self.enter(SourceOp::ExpandNode).await?;
        if !self.graph.contains_entity(&request.node_id) {
            return Err(InMemorySourceError::EntityNotFound(request.node_id.clone()));
        }
        Ok(self.traverse(
            &request.node_id,
            request.depth.unwrap_or(DEFAULT_EXPAND_DEPTH),
            request.relationship_types.as_deref(),
            request.limit.unwrap_or(DEFAULT_EXPAND_LIMIT),
        ))
    }

    async fn run_enrichment(&self, entity_id: &EntityId, _entity_type: EntityType) -> Result<Properties, Self::Error> {
        self.enter(SourceOp::RunEnrichment).await?;
        if !self.graph.contains_entity(entity_id) {
            return Err(InMemorySourceError::EntityNotFound(entity_id.clone()));
        }
        Ok(self.enrichments.get(entity_id).cloned().unwrap_or_default())
    }

    async fn trace_wallet(&self, address: &str, depth: Option<u32>) -> Result<GraphPayload, Self::Error> {
        self.enter(SourceOp::TraceWallet).await?;
        let wallet = self
            .find_wallet(address)
            .ok_or_else(|| InMemorySourceError::WalletNotFound(address.to_string()))?;
        Ok(self.traverse(
            &wallet.id,
            depth.unwrap_or(DEFAULT_TRACE_DEPTH),
            Some(&[RelationshipType::TransactedWith][..]),
            usize::MAX,
        ))
    }

    async fn add_to_case(&self, entity_ids: &[EntityId], case_id: &str, notes: Option<&str>) -> Result<(), Self::Error> {
        self.enter(SourceOp::AddToCase).await?;
        self.cases
            .lock()
            .entry(case_id.to_string())
            .or_default()
            .extend(entity_ids.iter().cloned());
        self.additions.lock().push(CaseAddition {
            entity_ids: entity_ids.to_vec(),
            case_id: case_id.to_string(),
            notes: notes.map(str::to_string),
        });
        Ok(())
    }
}
