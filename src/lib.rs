//! # case-graph-engine
//!
//! Working state of an interactive investigation graph.
//!
//! The engine is the single source of truth for the entities and
//! relationships an analyst is exploring. It owns:
//!
//! 1. A normalized registry of entities and relationships
//! 2. A composable filter model that classifies every element as visible,
//!    faded, or hidden
//! 3. Snapshot-based undo/redo over the element set
//! 4. The selection state machine and its derived inspection target
//!
//! ## Architecture
//!
//! ```text
//! DataSource → ingest → Registry → StateStore notifies → classify
//!                                        ↓
//!                              Renderer (sync listener)
//! ```
//!
//! Rendering and fetching are collaborators behind the [`Renderer`] and
//! [`DataSource`] traits. [`RecordingRenderer`] and [`InMemoryDataSource`]
//! stand in for them in tests and replays.
//!
//! ## Determinism Guarantees
//!
//! - Registry iteration is in id order
//! - `classify` is pure: same registry + same criteria → same map
//! - Snapshot fingerprints depend only on the element set

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod registry;
pub mod filter;
pub mod history;
pub mod selection;
pub mod source;
pub mod renderer;
pub mod ingest;
pub mod engine;
pub mod config;
pub mod analysis;

// Re-exports
pub use types::{
    ElementId, Entity, EntityId, EntityType, GraphPayload, Properties, PropertyValue, Relationship,
    RelationshipId, RelationshipType, RiskLevel,
};
pub use error::{EngineError, IntegrityViolation};
pub use registry::Registry;
pub use filter::{
    classify, Classification, ClassificationMap, FilterCriteria, FilterPatch, TimeWindow, Visibility,
    VisualClass,
};
pub use history::{History, Snapshot, DEFAULT_UNDO_CAPACITY};
pub use selection::{Inspection, PrimarySelection, Selection, SelectionEvent};
pub use source::{DataSource, ExpandRequest, InMemoryDataSource, InMemorySourceError, SourceOp};
pub use renderer::{
    ExportFormat, LayoutAlgorithm, LayoutOptions, PointerEvent, PointerKind, RecordingRenderer, RenderCall,
    Renderer, RendererError,
};
pub use ingest::{ingest, IngestMode, IngestReport};
pub use engine::{
    DeferredIntent, Engine, EngineState, EngineStatePatch, IngestOutcome, IntentOutcome, Notice, NoticeKind, StatePatch,
    StateStore, StoreState, Subscription,
};
pub use config::EngineConfig;
pub use analysis::{CentralityScore, Community, GraphStats, SearchQuery, TimelineBounds};

/// Schema version of serialized engine types (payloads, snapshots, config).
/// Increment on breaking changes.
pub const GRAPH_ENGINE_SCHEMA_VERSION: &str = "1.0.0";
