//! Relationship types for the investigation graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{EntityId, Properties};

/// Unique identifier of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(String);

impl RelationshipId {
    /// Create a new RelationshipId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationshipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RelationshipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Type of a directed relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Ownership (person owns wallet, domain, account).
    Owns,
    /// Usage (person uses email, phone, username).
    Uses,
    /// Direct communication between parties.
    CommunicatesWith,
    /// On-chain transfer between wallets.
    TransactedWith,
    /// Hosting (content hosted on domain or IP).
    HostedOn,
    /// DNS resolution.
    ResolvesTo,
    /// Membership in an organization.
    MemberOf,
    /// Generic correlation.
    LinkedTo,
}

impl RelationshipType {
    /// Every variant, in declaration order.
    pub const ALL: [RelationshipType; 8] = [
        Self::Owns,
        Self::Uses,
        Self::CommunicatesWith,
        Self::TransactedWith,
        Self::HostedOn,
        Self::ResolvesTo,
        Self::MemberOf,
        Self::LinkedTo,
    ];

    /// Parse relationship type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OWNS" | "OWNS_WALLET" => Some(Self::Owns),
            "USES" | "USES_EMAIL" | "HAS_PHONE" | "KNOWN_AS" => Some(Self::Uses),
            "COMMUNICATES_WITH" | "SENT_TO" | "RECEIVED_FROM" => Some(Self::CommunicatesWith),
            "TRANSACTED_WITH" => Some(Self::TransactedWith),
            "HOSTED_ON" | "POSTED_ON" => Some(Self::HostedOn),
            "RESOLVES_TO" => Some(Self::ResolvesTo),
            "MEMBER_OF" => Some(Self::MemberOf),
            "LINKED_TO" | "CONNECTED_TO" => Some(Self::LinkedTo),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owns => "OWNS",
            Self::Uses => "USES",
            Self::CommunicatesWith => "COMMUNICATES_WITH",
            Self::TransactedWith => "TRANSACTED_WITH",
            Self::HostedOn => "HOSTED_ON",
            Self::ResolvesTo => "RESOLVES_TO",
            Self::MemberOf => "MEMBER_OF",
            Self::LinkedTo => "LINKED_TO",
        };
        f.write_str(s)
    }
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique relationship identifier.
    pub id: RelationshipId,
    /// Source entity.
    pub source: EntityId,
    /// Target entity.
    pub target: EntityId,
    /// Relationship kind.
    pub relationship_type: RelationshipType,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Non-negative edge weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Arbitrary scalar properties.
    #[serde(default)]
    pub properties: Properties,
    /// First observation time.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    /// Last observation time.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Confidence [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_confidence() -> f64 {
    1.0
}

impl Relationship {
    /// Create a relationship with weight 1 and full confidence.
    pub fn new(
        id: impl Into<RelationshipId>,
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relationship_type,
            label: String::new(),
            weight: default_weight(),
            properties: Properties::new(),
            first_seen: None,
            last_seen: None,
            confidence: default_confidence(),
        }
    }

    /// Set the weight (negative values clamp to 0).
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    /// Set the confidence (clamped to [0, 1]).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Clamp weight and confidence into their valid ranges.
    ///
    /// Payloads from the data source are normalized through this on ingest.
    pub fn normalized(mut self) -> Self {
        if !self.weight.is_finite() || self.weight < 0.0 {
            self.weight = 0.0;
        }
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Whether `id` is one of the endpoints.
    pub fn touches(&self, id: &EntityId) -> bool {
        &self.source == id || &self.target == id
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint.
    pub fn other_end(&self, id: &EntityId) -> Option<&EntityId> {
        if &self.source == id {
            Some(&self.target)
        } else if &self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps() {
        let mut r = Relationship::new("r1", "a", "b", RelationshipType::Owns);
        r.weight = -3.0;
        r.confidence = 1.7;
        let r = r.normalized();
        assert_eq!(r.weight, 0.0);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_other_end() {
        let r = Relationship::new("r1", "a", "b", RelationshipType::Uses);
        assert_eq!(r.other_end(&"a".into()), Some(&EntityId::from("b")));
        assert_eq!(r.other_end(&"b".into()), Some(&EntityId::from("a")));
        assert_eq!(r.other_end(&"c".into()), None);
    }

    #[test]
    fn test_relationship_type_parsing() {
        assert_eq!(RelationshipType::from_str("owns_wallet"), Some(RelationshipType::Owns));
        assert_eq!(RelationshipType::from_str("TRANSACTED_WITH"), Some(RelationshipType::TransactedWith));
        assert_eq!(RelationshipType::from_str("nope"), None);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"id":"r1","source":"a","target":"b","relationship_type":"LINKED_TO"}"#;
        let r: Relationship = serde_json::from_str(json).unwrap();
        assert_eq!(r.weight, 1.0);
        assert_eq!(r.confidence, 1.0);
        assert!(r.properties.is_empty());
    }
}
