//! Golden tests for the graph state engine.
//!
//! These tests verify determinism of classification, snapshot fingerprints,
//! and renderer call sequences, plus the wire format of payloads.

use case_graph_engine::history::fingerprint;
use case_graph_engine::{
    classify, Engine, EngineConfig, Entity, EntityType, FilterCriteria, FilterPatch, GraphPayload,
    InMemoryDataSource, RecordingRenderer, Registry, Relationship, RelationshipType, RiskLevel, Snapshot,
    TimeWindow, GRAPH_ENGINE_SCHEMA_VERSION,
};
use chrono::{TimeZone, Utc};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn star_entities() -> Vec<Entity> {
    //        d1
    //        |
    //  e1 - p1 - w1
    //        |
    //        u1
    vec![
        Entity::new("p1", "Viktor Lang", EntityType::Person).with_risk_score(70),
        Entity::new("e1", "v.lang@mail.example", EntityType::Email),
        Entity::new("w1", "bc1qlangwalletaddress000000", EntityType::CryptoWallet).with_risk_score(88),
        Entity::new("u1", "vlang", EntityType::Username)
            .with_seen(
                Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0).unwrap(),
            ),
        Entity::new("d1", "lang-holdings.example", EntityType::Domain).with_tag("shell-company"),
    ]
}

fn star_relationships() -> Vec<Relationship> {
    vec![
        Relationship::new("r1", "p1", "e1", RelationshipType::Uses),
        Relationship::new("r2", "p1", "w1", RelationshipType::Owns).with_confidence(0.7),
        Relationship::new("r3", "p1", "u1", RelationshipType::Owns),
        Relationship::new("r4", "p1", "d1", RelationshipType::MemberOf).with_weight(2.5),
    ]
}

fn build_registry(reverse: bool) -> Registry {
    let mut entities = star_entities();
    let mut relationships = star_relationships();
    if reverse {
        entities.reverse();
        relationships.reverse();
    }
    let mut registry = Registry::new();
    registry.upsert_entities(entities);
    assert!(registry.upsert_relationships(relationships).is_empty());
    registry
}

fn star_source() -> InMemoryDataSource {
    let mut source = InMemoryDataSource::new();
    for entity in star_entities() {
        source.add_case_member("golden", entity.id.clone());
        source.add_entity(entity);
    }
    for relationship in star_relationships() {
        source.add_relationship(relationship);
    }
    source
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_classify_determinism() {
    let registry = build_registry(false);
    let mut criteria = FilterCriteria::default();
    criteria.apply(FilterPatch::entity_type(EntityType::Email, false));
    criteria.apply(FilterPatch::search("lang"));

    let first = classify(&registry, &criteria);
    let second = classify(&registry, &criteria);
    assert_eq!(first, second);

    let reordered = classify(&build_registry(true), &criteria);
    assert_eq!(first, reordered);
}

#[test]
fn test_classify_golden_counts() {
    let registry = build_registry(false);
    let mut criteria = FilterCriteria::default();
    criteria.apply(FilterPatch::search("lang"));
    criteria.apply(FilterPatch::time_window(Some(TimeWindow::new(
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap(),
    ))));

    let map = classify(&registry, &criteria);

    // u1 first seen after the window: faded, and so is its edge.
    assert_eq!(map.count(case_graph_engine::Visibility::Faded), 2);
    // Every visible label contains "lang"; faded u1 is never highlighted.
    assert_eq!(map.highlighted_count(), 4);
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fingerprint_insertion_order_independent() {
    let a = build_registry(false);
    let b = build_registry(true);
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_eq!(Snapshot::capture(&a), Snapshot::capture(&b));
}

#[test]
fn test_fingerprint_changes_on_mutation() {
    let registry = build_registry(false);
    let before = fingerprint(&registry);

    let mut pinned = registry.clone();
    pinned.set_pinned(&"p1".into(), true);
    assert_ne!(fingerprint(&pinned), before);

    let mut rescored = registry.clone();
    rescored.set_risk_score(&"e1".into(), 1);
    assert_ne!(fingerprint(&rescored), before);
}

#[test]
fn test_fingerprint_format() {
    let fp = fingerprint(&build_registry(false));
    assert_eq!(fp.len(), 16);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Replay
// ─────────────────────────────────────────────────────────────────────────────

async fn replay() -> (Registry, Vec<case_graph_engine::RenderCall>) {
    let engine = Engine::new(EngineConfig::default(), star_source());
    let renderer = RecordingRenderer::new();
    engine.attach_renderer(renderer.clone());

    engine.load_case("golden").await.unwrap();
    engine.toggle_pin(&"p1".into()).unwrap();
    engine.hide_node(&"u1".into()).unwrap();
    engine.set_filter(FilterPatch::search("viktor"));
    engine.set_risk_score(&"e1".into(), 55).unwrap();
    engine.undo().unwrap();

    (engine.get_state().registry.clone(), renderer.calls())
}

#[tokio::test]
async fn test_engine_replay_determinism() {
    let (registry_a, calls_a) = replay().await;
    let (registry_b, calls_b) = replay().await;

    assert_eq!(registry_a, registry_b);
    assert_eq!(fingerprint(&registry_a), fingerprint(&registry_b));
    assert_eq!(calls_a, calls_b);

    assert!(registry_a.get_entity(&"p1".into()).unwrap().pinned);
    assert!(registry_a.get_entity(&"u1".into()).unwrap().hidden);
    assert_eq!(registry_a.get_entity(&"e1".into()).unwrap().risk_score(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Format
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_payload_wire_format() {
    let payload = GraphPayload::new(
        vec![Entity::new("p1", "Viktor Lang", EntityType::Person).with_risk_score(85)],
        vec![],
    );
    let json = serde_json::to_value(&payload).unwrap();

    assert!(json.get("nodes").is_some());
    assert!(json.get("edges").is_some());
    let node = &json["nodes"][0];
    assert_eq!(node["entity_type"], "person");
    assert_eq!(node["risk_level"], "critical");
}

#[test]
fn test_payload_from_upstream_json() {
    let raw = r#"{
        "nodes": [
            {"id": "w9", "label": "bc1qupstream", "entity_type": "crypto_wallet",
             "risk_score": 61.6, "risk_level": "low", "properties": {"chain": "btc", "tx_count": 14}},
            {"id": "ip9", "label": "198.51.100.4", "entity_type": "ip_address"}
        ],
        "edges": [
            {"id": "x9", "source": "w9", "target": "ip9", "relationship_type": "LINKED_TO",
             "confidence": 1.7, "weight": -3}
        ]
    }"#;
    let payload: GraphPayload = serde_json::from_str(raw).unwrap();

    let wallet = &payload.nodes[0];
    assert_eq!(wallet.risk_score(), 62);
    assert_eq!(wallet.risk_level(), RiskLevel::High);
    assert_eq!(wallet.properties["tx_count"].as_integer(), Some(14));

    let mut registry = Registry::new();
    registry.upsert_entities(payload.nodes);
    assert!(registry.upsert_relationships(payload.edges).is_empty());
    let edge = registry.get_relationship(&"x9".into()).unwrap();
    assert_eq!(edge.confidence, 1.0);
    assert_eq!(edge.weight, 0.0);
}

#[test]
fn test_schema_version() {
    assert_eq!(GRAPH_ENGINE_SCHEMA_VERSION, "1.0.0");
}
