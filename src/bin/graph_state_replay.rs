//! Graph State Replay
//!
//! Loads a graph payload from disk into a fresh engine backed by the
//! in-memory data source and a recording renderer, optionally applies a
//! search, and prints graph statistics and classification counts as JSON.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `GRAPH_ENGINE_*`: engine tunables (see `EngineConfig::from_env`)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin graph_state_replay --features cli -- payload.json [search]
//! ```

use std::time::Instant;

use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use case_graph_engine::analysis::{
    communities, degree_centrality, search, stats, SearchQuery, DEFAULT_CENTRALITY_LIMIT,
};
use case_graph_engine::{
    Engine, EngineConfig, FilterPatch, GraphPayload, InMemoryDataSource, RecordingRenderer, Visibility,
};

const REPLAY_CASE: &str = "replay";

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "graph_state_replay=info,case_graph_engine=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        error!("Usage: graph_state_replay <payload.json> [search]");
        return Err("missing payload path".into());
    };
    let needle = args.next();

    info!(version = env!("CARGO_PKG_VERSION"), path = %path, "Starting graph state replay");

    let raw = std::fs::read_to_string(&path)?;
    let payload: GraphPayload = serde_json::from_str(&raw)?;
    info!(nodes = payload.nodes.len(), edges = payload.edges.len(), "Payload parsed");

    let source = InMemoryDataSource::from_payload(REPLAY_CASE, payload);

    let engine = Engine::new(EngineConfig::from_env(), source);
    let renderer = RecordingRenderer::new();
    engine.attach_renderer(renderer.clone());

    let started = Instant::now();
    let report = engine
        .load_case(REPLAY_CASE)
        .await?
        .into_report()
        .ok_or("case load was queued behind a state listener")?;
    info!(
        latency_ms = started.elapsed().as_millis() as u64,
        rejected = report.rejected(),
        "Case loaded"
    );

    let mut matches = Vec::new();
    if let Some(needle) = needle {
        engine.set_filter(FilterPatch::search(needle.clone()));
        let state = engine.get_state();
        matches = search(&state.registry, &SearchQuery::new(needle))
            .into_iter()
            .map(|e| e.id.clone())
            .collect();
    }

    let state = engine.get_state();
    let classification = state.classification();
    let summary = json!({
        "stats": stats(&state.registry),
        "ingest": report,
        "classification": {
            "visible": classification.count(Visibility::Visible),
            "faded": classification.count(Visibility::Faded),
            "hidden": classification.count(Visibility::Hidden),
            "highlighted": classification.highlighted_count(),
        },
        "search_results": matches,
        "centrality": degree_centrality(&state.registry, DEFAULT_CENTRALITY_LIMIT),
        "communities": communities(&state.registry),
        "renderer": {
            "nodes": renderer.num_entities(),
            "edges": renderer.num_relationships(),
            "layout_runs": renderer.layout_runs(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
