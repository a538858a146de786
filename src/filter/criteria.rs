//! Filter criteria and partial updates to them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{EntityType, RelationshipType};

/// Time window applied against an entity's `first_seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end. Entities first seen after this instant are faded.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window. Reversed bounds are swapped.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Whether `ts` falls after the window's end.
    pub fn is_after_end(&self, ts: DateTime<Utc>) -> bool {
        ts > self.end
    }

    /// Move the end forward by `step` for playback, never past `limit`.
    ///
    /// Returns false once the end has reached `limit`, or when `step` is not
    /// positive. A step past the representable range lands on `limit`.
    pub fn advance(&mut self, step: Duration, limit: DateTime<Utc>) -> bool {
        if step <= Duration::zero() || self.end >= limit {
            return false;
        }
        self.end = self
            .end
            .checked_add_signed(step)
            .map_or(limit, |end| end.min(limit));
        true
    }
}

/// Composable filter criteria.
///
/// Types absent from the maps are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Per-entity-type visibility.
    pub entity_types: BTreeMap<EntityType, bool>,
    /// Per-relationship-type visibility.
    pub relationship_types: BTreeMap<RelationshipType, bool>,
    /// Case-insensitive label search. Empty means no search.
    pub search: String,
    /// Optional temporal window.
    pub time_window: Option<TimeWindow>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            entity_types: EntityType::ALL.iter().map(|t| (*t, true)).collect(),
            relationship_types: RelationshipType::ALL.iter().map(|t| (*t, true)).collect(),
            search: String::new(),
            time_window: None,
        }
    }
}

impl FilterCriteria {
    /// Whether entities of this type pass the type filter.
    pub fn entity_type_visible(&self, entity_type: EntityType) -> bool {
        self.entity_types.get(&entity_type).copied().unwrap_or(true)
    }

    /// Whether relationships of this type pass the type filter.
    pub fn relationship_type_visible(&self, relationship_type: RelationshipType) -> bool {
        self.relationship_types.get(&relationship_type).copied().unwrap_or(true)
    }

    /// Lowercased search needle, if any. Whitespace is part of the needle;
    /// only the empty string means no search.
    pub fn search_needle(&self) -> Option<String> {
        (!self.search.is_empty()).then(|| self.search.to_lowercase())
    }

    /// Shallow-merge a partial update.
    pub fn apply(&mut self, patch: FilterPatch) {
        self.entity_types.extend(patch.entity_types);
        self.relationship_types.extend(patch.relationship_types);
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(window) = patch.time_window {
            self.time_window = window;
        }
    }
}

/// Partial filter update. Unset fields leave the criteria untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPatch {
    /// Per-type overrides merged into the entity map.
    #[serde(default)]
    pub entity_types: BTreeMap<EntityType, bool>,
    /// Per-type overrides merged into the relationship map.
    #[serde(default)]
    pub relationship_types: BTreeMap<RelationshipType, bool>,
    /// Replacement search string.
    #[serde(default)]
    pub search: Option<String>,
    /// Replacement window; `Some(None)` clears it.
    #[serde(default)]
    pub time_window: Option<Option<TimeWindow>>,
}

impl FilterPatch {
    /// Patch a single entity type.
    pub fn entity_type(entity_type: EntityType, visible: bool) -> Self {
        let mut patch = Self::default();
        patch.entity_types.insert(entity_type, visible);
        patch
    }

    /// Patch a single relationship type.
    pub fn relationship_type(relationship_type: RelationshipType, visible: bool) -> Self {
        let mut patch = Self::default();
        patch.relationship_types.insert(relationship_type, visible);
        patch
    }

    /// Replace the search string.
    pub fn search(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }

    /// Replace (or clear) the time window.
    pub fn time_window(window: Option<TimeWindow>) -> Self {
        Self {
            time_window: Some(window),
            ..Self::default()
        }
    }
}
