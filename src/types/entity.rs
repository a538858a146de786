//! Entity types for the investigation graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable, globally unique identifier of an entity.
///
/// Implements `Ord` so registry iteration is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of artifact an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A natural person.
    Person,
    /// An email address.
    Email,
    /// A phone number.
    Phone,
    /// A platform username or handle.
    Username,
    /// An IPv4/IPv6 address.
    IpAddress,
    /// A DNS domain.
    Domain,
    /// A cryptocurrency wallet.
    CryptoWallet,
    /// A social media profile.
    SocialProfile,
    /// A company, group or forum.
    Organization,
    /// A piece of content (post, message, media hash).
    Content,
}

impl EntityType {
    /// Every variant, in declaration order.
    pub const ALL: [EntityType; 10] = [
        Self::Person,
        Self::Email,
        Self::Phone,
        Self::Username,
        Self::IpAddress,
        Self::Domain,
        Self::CryptoWallet,
        Self::SocialProfile,
        Self::Organization,
        Self::Content,
    ];

    /// Parse entity type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "username" => Some(Self::Username),
            "ip_address" | "ipaddress" | "ip" => Some(Self::IpAddress),
            "domain" => Some(Self::Domain),
            "crypto_wallet" | "cryptowallet" | "wallet" => Some(Self::CryptoWallet),
            "social_profile" | "socialmediaprofile" => Some(Self::SocialProfile),
            "organization" => Some(Self::Organization),
            "content" | "content_hash" | "forum_post" => Some(Self::Content),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Person => "person",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Username => "username",
            Self::IpAddress => "ip_address",
            Self::Domain => "domain",
            Self::CryptoWallet => "crypto_wallet",
            Self::SocialProfile => "social_profile",
            Self::Organization => "organization",
            Self::Content => "content",
        };
        f.write_str(s)
    }
}

/// Risk band derived from a risk score.
///
/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score below 20.
    Unknown,
    /// Score 20-39.
    Low,
    /// Score 40-59.
    Medium,
    /// Score 60-79.
    High,
    /// Score 80 and above.
    Critical,
}

impl RiskLevel {
    /// Band a risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Critical,
            60..=79 => Self::High,
            40..=59 => Self::Medium,
            20..=39 => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Free text.
    Text(String),
}

impl PropertyValue {
    /// Text view of the value, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of the value. Floats are rounded.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.round() as i64),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Open-ended property mapping. BTreeMap keeps serialization stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node of the investigation graph.
///
/// `risk_level` is always derived from `risk_score`; the only way to change
/// either is [`Entity::set_risk_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntityRecord", into = "EntityRecord")]
pub struct Entity {
    /// Unique entity identifier.
    pub id: EntityId,
    /// Display label.
    pub label: String,
    /// Entity kind.
    pub entity_type: EntityType,
    /// Arbitrary scalar properties.
    pub properties: Properties,
    risk_score: u8,
    risk_level: RiskLevel,
    /// First observation time.
    pub first_seen: Option<DateTime<Utc>>,
    /// Last observation time.
    pub last_seen: Option<DateTime<Utc>>,
    /// Provenance tag (collector or service name).
    pub source: String,
    /// Free-text labels.
    pub tags: BTreeSet<String>,
    /// Position is locked in the renderer.
    pub pinned: bool,
    /// Excluded from the active view but retained.
    pub hidden: bool,
}

impl Entity {
    /// Create an entity with default risk, no timestamps and no properties.
    pub fn new(id: impl Into<EntityId>, label: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            entity_type,
            properties: Properties::new(),
            risk_score: 0,
            risk_level: RiskLevel::Unknown,
            first_seen: None,
            last_seen: None,
            source: String::new(),
            tags: BTreeSet::new(),
            pinned: false,
            hidden: false,
        }
    }

    /// Set the risk score (clamped to 0-100).
    pub fn with_risk_score(mut self, score: i64) -> Self {
        self.set_risk_score(score);
        self
    }

    /// Set the observation window.
    pub fn with_seen(mut self, first_seen: DateTime<Utc>, last_seen: DateTime<Utc>) -> Self {
        self.first_seen = Some(first_seen);
        self.last_seen = Some(last_seen);
        self
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Current risk score [0, 100].
    pub fn risk_score(&self) -> u8 {
        self.risk_score
    }

    /// Risk band of the current score.
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Update the risk score and its derived level together.
    pub fn set_risk_score(&mut self, score: i64) {
        self.risk_score = score.clamp(0, 100) as u8;
        self.risk_level = RiskLevel::from_score(self.risk_score);
    }
}

/// Wire form of [`Entity`]. `risk_level` is accepted but ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntityRecord {
    id: EntityId,
    #[serde(default)]
    label: String,
    entity_type: EntityType,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    risk_score: f64,
    #[serde(default, skip_deserializing)]
    risk_level: Option<RiskLevel>,
    #[serde(default)]
    first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    hidden: bool,
}

impl From<EntityRecord> for Entity {
    fn from(r: EntityRecord) -> Self {
        let score = if r.risk_score.is_finite() { r.risk_score.round() as i64 } else { 0 };
        let mut entity = Entity {
            id: r.id,
            label: r.label,
            entity_type: r.entity_type,
            properties: r.properties,
            risk_score: 0,
            risk_level: RiskLevel::Unknown,
            first_seen: r.first_seen,
            last_seen: r.last_seen,
            source: r.source,
            tags: r.tags,
            pinned: r.pinned,
            hidden: r.hidden,
        };
        entity.set_risk_score(score);
        entity
    }
}

impl From<Entity> for EntityRecord {
    fn from(e: Entity) -> Self {
        EntityRecord {
            id: e.id,
            label: e.label,
            entity_type: e.entity_type,
            properties: e.properties,
            risk_score: f64::from(e.risk_score),
            risk_level: Some(e.risk_level),
            first_seen: e.first_seen,
            last_seen: e.last_seen,
            source: e.source,
            tags: e.tags,
            pinned: e.pinned,
            hidden: e.hidden,
        }
    }
}
