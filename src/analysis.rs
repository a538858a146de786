//! Read-only queries over the registry: statistics, paths, search, degree
//! centrality, clusters, and the timeline extent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::registry::Registry;
use crate::types::{Entity, EntityId, EntityType, RelationshipType, RiskLevel};

/// Default hop bound for [`shortest_path`].
pub const DEFAULT_PATH_DEPTH: u32 = 5;

/// Default result limit for [`search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Default result limit for [`degree_centrality`].
pub const DEFAULT_CENTRALITY_LIMIT: usize = 50;

/// Aggregate counts over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of entities.
    pub total_entities: usize,
    /// Number of relationships.
    pub total_relationships: usize,
    /// Entities per type.
    pub entity_types: BTreeMap<EntityType, usize>,
    /// Relationships per type.
    pub relationship_types: BTreeMap<RelationshipType, usize>,
    /// Entities per risk band.
    pub risk_levels: BTreeMap<RiskLevel, usize>,
    /// Hidden entities.
    pub hidden: usize,
    /// Pinned entities.
    pub pinned: usize,
}

/// Compute [`GraphStats`].
pub fn stats(registry: &Registry) -> GraphStats {
    let mut stats = GraphStats {
        total_entities: registry.num_entities(),
        total_relationships: registry.num_relationships(),
        ..Default::default()
    };
    for entity in registry.entities() {
        *stats.entity_types.entry(entity.entity_type).or_default() += 1;
        *stats.risk_levels.entry(entity.risk_level()).or_default() += 1;
        stats.hidden += usize::from(entity.hidden);
        stats.pinned += usize::from(entity.pinned);
    }
    for relationship in registry.relationships() {
        *stats.relationship_types.entry(relationship.relationship_type).or_default() += 1;
    }
    stats
}

/// Shortest undirected path from `from` to `to`, at most `max_depth` hops.
///
/// Hidden entities are not traversed. Returns the entity ids along the
/// path, both ends included.
pub fn shortest_path(registry: &Registry, from: &EntityId, to: &EntityId, max_depth: u32) -> Option<Vec<EntityId>> {
    let usable = |id: &EntityId| registry.get_entity(id).is_some_and(|e| !e.hidden);
    if !usable(from) || !usable(to) {
        return None;
    }
    if from == to {
        return Some(vec![from.clone()]);
    }

    let mut parent: BTreeMap<EntityId, EntityId> = BTreeMap::new();
    let mut frontier: VecDeque<(EntityId, u32)> = VecDeque::from([(from.clone(), 0)]);

    while let Some((id, depth)) = frontier.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for relationship in registry.relationships_of(&id) {
            let Some(next) = relationship.other_end(&id) else {
                continue;
            };
            if next == from || parent.contains_key(next) || !usable(next) {
                continue;
            }
            parent.insert(next.clone(), id.clone());
            if next == to {
                return Some(unwind(&parent, from, to));
            }
            frontier.push_back((next.clone(), depth + 1));
        }
    }
    None
}

fn unwind(parent: &BTreeMap<EntityId, EntityId>, from: &EntityId, to: &EntityId) -> Vec<EntityId> {
    let mut path = vec![to.clone()];
    let mut cursor = to;
    while cursor != from {
        match parent.get(cursor) {
            Some(prev) => {
                path.push(prev.clone());
                cursor = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive text matched against labels and property values.
    pub text: String,
    /// Restrict to these types.
    #[serde(default)]
    pub entity_types: Option<BTreeSet<EntityType>>,
    /// Maximum results.
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl SearchQuery {
    /// Text query with the default limit and no type restriction.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity_types: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Entities matching `query`, highest risk first, ties by id.
pub fn search<'a>(registry: &'a Registry, query: &SearchQuery) -> Vec<&'a Entity> {
    let needle = query.text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<&Entity> = registry
        .entities()
        .filter(|e| query.entity_types.as_ref().map_or(true, |types| types.contains(&e.entity_type)))
        .filter(|e| {
            e.label.to_lowercase().contains(&needle)
                || e.properties
                    .values()
                    .any(|v| v.to_string().to_lowercase().contains(&needle))
        })
        .collect();
    hits.sort_by(|a, b| b.risk_score().cmp(&a.risk_score()).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(query.limit);
    hits
}

/// One entity's degree centrality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityScore {
    /// Entity ID.
    pub id: EntityId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Display label.
    pub label: String,
    /// Risk score at ranking time.
    pub risk_score: i64,
    /// Distinct visible neighbors.
    pub degree: usize,
    /// `degree` normalized by the number of other visible entities.
    pub score: f64,
}

/// Visible entities ranked by degree, most connected first, ties by id.
///
/// Hidden entities are neither ranked nor counted as neighbors.
pub fn degree_centrality(registry: &Registry, limit: usize) -> Vec<CentralityScore> {
    let visible: Vec<&Entity> = registry.entities().filter(|e| !e.hidden).collect();
    let others = visible.len().saturating_sub(1);

    let mut ranked: Vec<CentralityScore> = visible
        .into_iter()
        .map(|e| {
            let degree = registry.neighbor_count(&e.id);
            CentralityScore {
                id: e.id.clone(),
                entity_type: e.entity_type,
                label: e.label.clone(),
                risk_score: i64::from(e.risk_score()),
                degree,
                score: if others == 0 { 0.0 } else { degree as f64 / others as f64 },
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.id.cmp(&b.id)));
    ranked.truncate(limit);
    ranked
}

/// A connected cluster of visible entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Position in the size ordering, largest first.
    pub id: usize,
    /// Members in id order.
    pub members: Vec<EntityId>,
    /// Number of members.
    pub size: usize,
}

/// Connected components over visible entities, largest first.
///
/// Hidden entities break paths. Ties order by smallest member id; an
/// isolated entity forms its own cluster.
pub fn communities(registry: &Registry) -> Vec<Community> {
    let usable = |id: &EntityId| registry.get_entity(id).is_some_and(|e| !e.hidden);
    let mut seen: BTreeSet<&EntityId> = BTreeSet::new();
    let mut clusters: Vec<Vec<EntityId>> = Vec::new();

    for entity in registry.entities().filter(|e| !e.hidden) {
        if !seen.insert(&entity.id) {
            continue;
        }
        let mut members = BTreeSet::from([entity.id.clone()]);
        let mut frontier = VecDeque::from([&entity.id]);
        while let Some(id) = frontier.pop_front() {
            for next in registry.neighbors(id) {
                if usable(next) && seen.insert(next) {
                    members.insert(next.clone());
                    frontier.push_back(next);
                }
            }
        }
        clusters.push(members.into_iter().collect());
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
    clusters
        .into_iter()
        .enumerate()
        .map(|(id, members)| Community {
            id,
            size: members.len(),
            members,
        })
        .collect()
}

/// Earliest and latest observation times in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineBounds {
    /// Earliest `first_seen`.
    pub start: DateTime<Utc>,
    /// Latest of any `first_seen` or `last_seen`.
    pub end: DateTime<Utc>,
}

/// Timeline extent, or `None` when no entity carries timestamps.
pub fn timeline_bounds(registry: &Registry) -> Option<TimelineBounds> {
    let start = registry.entities().filter_map(|e| e.first_seen).min()?;
    let end = registry
        .entities()
        .flat_map(|e| [e.first_seen, e.last_seen])
        .flatten()
        .max()
        .unwrap_or(start);
    Some(TimelineBounds { start, end })
}
