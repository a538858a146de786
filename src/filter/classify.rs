//! Pure visibility classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::criteria::FilterCriteria;
use crate::registry::Registry;
use crate::types::{ElementId, Entity, EntityId, Relationship, RelationshipId};

/// Visibility verdict for one element.
///
/// Ordered by severity: `Visible < Faded < Hidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Shown normally.
    Visible,
    /// Shown de-emphasized (filtered by type or time).
    Faded,
    /// Not shown (user hide action).
    Hidden,
}

/// Visual class the renderer applies for a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualClass {
    /// De-emphasized.
    Faded,
    /// Not displayed.
    Hidden,
    /// Search match.
    Highlighted,
    /// Position locked.
    Pinned,
}

impl VisualClass {
    /// Class name as used by the renderer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faded => "faded",
            Self::Hidden => "hidden",
            Self::Highlighted => "highlighted",
            Self::Pinned => "pinned",
        }
    }
}

impl fmt::Display for VisualClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// Visibility axis.
    pub visibility: Visibility,
    /// Search highlight. Never set on faded or hidden elements.
    pub highlighted: bool,
    /// Position locked (entities only).
    pub pinned: bool,
}

impl Classification {
    /// A plain visible element.
    pub const VISIBLE: Classification = Classification {
        visibility: Visibility::Visible,
        highlighted: false,
        pinned: false,
    };

    /// Renderer classes for this classification, in stable order.
    pub fn classes(&self) -> Vec<VisualClass> {
        let mut classes = Vec::with_capacity(2);
        match self.visibility {
            Visibility::Visible => {}
            Visibility::Faded => classes.push(VisualClass::Faded),
            Visibility::Hidden => classes.push(VisualClass::Hidden),
        }
        if self.highlighted {
            classes.push(VisualClass::Highlighted);
        }
        if self.pinned {
            classes.push(VisualClass::Pinned);
        }
        classes
    }
}

/// Classification of every element in a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationMap {
    /// Per-entity verdicts.
    pub entities: BTreeMap<EntityId, Classification>,
    /// Per-relationship verdicts.
    pub relationships: BTreeMap<RelationshipId, Classification>,
}

impl ClassificationMap {
    /// Verdict for any element.
    pub fn get(&self, id: &ElementId) -> Option<&Classification> {
        match id {
            ElementId::Entity(id) => self.entities.get(id),
            ElementId::Relationship(id) => self.relationships.get(id),
        }
    }

    /// Verdict for an entity.
    pub fn entity(&self, id: &EntityId) -> Option<Visibility> {
        self.entities.get(id).map(|c| c.visibility)
    }

    /// Verdict for a relationship.
    pub fn relationship(&self, id: &RelationshipId) -> Option<Visibility> {
        self.relationships.get(id).map(|c| c.visibility)
    }

    /// Number of elements (of both kinds) with the given visibility.
    pub fn count(&self, visibility: Visibility) -> usize {
        self.entities
            .values()
            .chain(self.relationships.values())
            .filter(|c| c.visibility == visibility)
            .count()
    }

    /// Number of highlighted entities.
    pub fn highlighted_count(&self) -> usize {
        self.entities.values().filter(|c| c.highlighted).count()
    }
}

/// Classify one entity.
///
/// Precedence: hidden flag, then type filter, then time window, then search
/// highlight on whatever is still visible.
pub fn classify_entity(entity: &Entity, criteria: &FilterCriteria, needle: Option<&str>) -> Classification {
    let visibility = if entity.hidden {
        Visibility::Hidden
    } else if !criteria.entity_type_visible(entity.entity_type) {
        Visibility::Faded
    } else if matches!(
        (criteria.time_window, entity.first_seen),
        (Some(window), Some(first_seen)) if window.is_after_end(first_seen)
    ) {
        Visibility::Faded
    } else {
        Visibility::Visible
    };

    let highlighted = visibility == Visibility::Visible
        && needle.map_or(false, |n| entity.label.to_lowercase().contains(n));

    Classification {
        visibility,
        highlighted,
        pinned: entity.pinned,
    }
}

fn classify_relationship(
    relationship: &Relationship,
    criteria: &FilterCriteria,
    entities: &BTreeMap<EntityId, Classification>,
) -> Classification {
    let endpoint = |id: &EntityId| entities.get(id).map_or(Visibility::Hidden, |c| c.visibility);
    let ends = endpoint(&relationship.source).max(endpoint(&relationship.target));

    let visibility = if ends == Visibility::Hidden {
        Visibility::Hidden
    } else if ends == Visibility::Faded || !criteria.relationship_type_visible(relationship.relationship_type) {
        Visibility::Faded
    } else {
        Visibility::Visible
    };

    Classification {
        visibility,
        highlighted: false,
        pinned: false,
    }
}

/// Classify every element of the registry against the criteria.
///
/// Pure and deterministic: equal inputs give equal maps.
pub fn classify(registry: &Registry, criteria: &FilterCriteria) -> ClassificationMap {
    let needle = criteria.search_needle();

    let entities: BTreeMap<EntityId, Classification> = registry
        .entities()
        .map(|e| (e.id.clone(), classify_entity(e, criteria, needle.as_deref())))
        .collect();

    let relationships = registry
        .relationships()
        .map(|r| (r.id.clone(), classify_relationship(r, criteria, &entities)))
        .collect();

    ClassificationMap { entities, relationships }
}
