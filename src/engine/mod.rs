//! Engine facade: one state store plus the intents UI collaborators call.
//!
//! Every transition is a single [`StateStore::set_state`] update. Async
//! intents fetch first and apply one update on completion; a failed fetch
//! only clears its request and surfaces the error. Completions apply in
//! completion order, last writer wins per element, and there is no
//! cancellation.
//!
//! The renderer is kept in step by a store listener. Renderer-touching
//! synchronous intents issued before a renderer attaches are queued and
//! replayed in order on attach; async intents wait for the attach.

pub mod notice;
pub mod state;
pub mod store;
pub mod sync;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::analysis::timeline_bounds;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::filter::{FilterPatch, TimeWindow};
use crate::ingest::{ingest, IngestMode, IngestReport};
use crate::renderer::{ExportFormat, LayoutAlgorithm, PointerEvent, PointerKind, Renderer};
use crate::selection::SelectionEvent;
use crate::source::{is_valid_wallet_address, DataSource, ExpandRequest};
use crate::types::{ElementId, EntityId, EntityType, GraphPayload};

pub use notice::{Notice, NoticeKind};
pub use state::{EngineState, EngineStatePatch};
pub use store::{StatePatch, StateStore, StoreState, Subscription};

type RendererSlot = Arc<Mutex<Option<Box<dyn Renderer>>>>;

/// Property holding a wallet's on-chain address.
pub const WALLET_ADDRESS_PROPERTY: &str = "address";

/// Renderer-touching intent held until a renderer attaches.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredIntent {
    /// Flip an entity's pin.
    TogglePin(EntityId),
    /// Hide an entity.
    HideNode(EntityId),
    /// Unhide every entity.
    UnhideAll,
    /// Set an entity's risk score.
    SetRiskScore(EntityId, i64),
    /// Step back.
    Undo,
    /// Step forward.
    Redo,
    /// Switch and run a layout.
    SetLayout(LayoutAlgorithm),
}

impl fmt::Display for DeferredIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TogglePin(id) => write!(f, "toggle_pin({id})"),
            Self::HideNode(id) => write!(f, "hide_node({id})"),
            Self::UnhideAll => write!(f, "unhide_all"),
            Self::SetRiskScore(id, score) => write!(f, "set_risk_score({id}, {score})"),
            Self::Undo => write!(f, "undo"),
            Self::Redo => write!(f, "redo"),
            Self::SetLayout(layout) => write!(f, "set_layout({layout})"),
        }
    }
}

/// What a synchronous intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// State changed.
    Applied,
    /// Nothing to do.
    Unchanged,
    /// No renderer attached; replayed on attach.
    Deferred,
    /// Issued from inside a state listener; applied after the current cycle.
    Queued,
}

/// What an async graph fetch did once it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The payload was ingested.
    Applied(IngestReport),
    /// Completed inside a state listener; ingested after the current cycle.
    Queued,
}

impl IngestOutcome {
    /// The ingest report, unless the update was queued.
    pub fn report(&self) -> Option<&IngestReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Queued => None,
        }
    }

    /// Take the ingest report, unless the update was queued.
    pub fn into_report(self) -> Option<IngestReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Queued => None,
        }
    }

    /// Whether the update was queued behind a notification cycle.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// The graph state engine.
pub struct Engine<D: DataSource> {
    config: Arc<EngineConfig>,
    source: D,
    store: StateStore<EngineState>,
    renderer: RendererSlot,
    deferred: Mutex<VecDeque<DeferredIntent>>,
    attached: watch::Sender<bool>,
    _renderer_sync: Subscription<EngineState>,
}

impl<D: DataSource> Engine<D> {
    /// Create an engine with its own isolated state.
    pub fn new(config: EngineConfig, source: D) -> Self {
        let config = Arc::new(config);
        let store = StateStore::new(EngineState::new(&config));
        let renderer: RendererSlot = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&renderer);
        let sync_config = Arc::clone(&config);
        let renderer_sync = store.subscribe(move |next: &EngineState, prev: &EngineState| {
            if let Some(renderer) = slot.lock().as_mut() {
                sync::sync(renderer.as_mut(), prev, next, &sync_config);
            }
        });
        let (attached, _) = watch::channel(false);

        Self {
            config,
            source,
            store,
            renderer,
            deferred: Mutex::new(VecDeque::new()),
            attached,
            _renderer_sync: renderer_sync,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The data source.
    pub fn data_source(&self) -> &D {
        &self.source
    }

    /// The underlying store.
    pub fn store(&self) -> &StateStore<EngineState> {
        &self.store
    }

    /// Current state.
    pub fn get_state(&self) -> Arc<EngineState> {
        self.store.get_state()
    }

    /// Apply an arbitrary update.
    pub fn set_state(&self, updater: impl FnOnce(&mut EngineState) + Send + 'static) -> bool {
        self.store.set_state(updater)
    }

    /// Register a listener called with `(next, prev)`.
    pub fn subscribe(
        &self,
        listener: impl Fn(&EngineState, &EngineState) + Send + Sync + 'static,
    ) -> Subscription<EngineState> {
        self.store.subscribe(listener)
    }

    // ─── Renderer ──────────────────────────────────────────────────────

    /// Attach a renderer, rebuild it from the current state, and replay
    /// deferred intents in order.
    pub fn attach_renderer(&self, renderer: impl Renderer + 'static) {
        {
            let mut slot = self.renderer.lock();
            let mut boxed: Box<dyn Renderer> = Box::new(renderer);
            sync::full_sync(boxed.as_mut(), &self.store.get_state(), &self.config);
            *slot = Some(boxed);
        }
        self.attached.send_replace(true);

        let replay: Vec<DeferredIntent> = self.deferred.lock().drain(..).collect();
        info!(deferred = replay.len(), "Renderer attached");
        for intent in replay {
            if let Err(e) = self.apply_intent(intent.clone()) {
                debug!(intent = %intent, error = %e, "Deferred intent rejected on replay");
            }
        }
    }

    /// Detach the renderer. Later renderer-touching intents are deferred.
    pub fn detach_renderer(&self) -> Option<Box<dyn Renderer>> {
        let renderer = self.renderer.lock().take();
        self.attached.send_replace(false);
        if renderer.is_some() {
            info!("Renderer detached");
        }
        renderer
    }

    /// Whether a renderer is attached.
    pub fn is_attached(&self) -> bool {
        self.renderer.lock().is_some()
    }

    /// Number of intents waiting for a renderer.
    pub fn deferred_len(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Export the current view.
    pub fn export_view(&self, format: ExportFormat) -> Result<Vec<u8>, EngineError> {
        let slot = self.renderer.lock();
        let renderer = slot.as_ref().ok_or(EngineError::RendererUnavailable)?;
        renderer
            .export(format)
            .map_err(|e| EngineError::invalid(e.to_string()))
    }

    async fn wait_for_renderer(&self) -> Result<(), EngineError> {
        let mut attached = self.attached.subscribe();
        if !*attached.borrow() {
            debug!("Waiting for renderer to attach");
        }
        attached
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| EngineError::RendererUnavailable)
    }

    // ─── Synchronous intents ───────────────────────────────────────────

    /// Pin or unpin an entity.
    pub fn toggle_pin(&self, id: &EntityId) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::TogglePin(id.clone()))
    }

    /// Hide an entity. It stays in the registry.
    pub fn hide_node(&self, id: &EntityId) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::HideNode(id.clone()))
    }

    /// Unhide every hidden entity.
    pub fn unhide_all(&self) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::UnhideAll)
    }

    /// Set an entity's risk score (clamped to 0..=100).
    pub fn set_risk_score(&self, id: &EntityId, score: i64) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::SetRiskScore(id.clone(), score))
    }

    /// Restore the most recent snapshot.
    pub fn undo(&self) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::Undo)
    }

    /// Re-apply the most recently undone snapshot.
    pub fn redo(&self) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::Redo)
    }

    /// Switch the layout algorithm and re-run it.
    pub fn set_layout(&self, layout: LayoutAlgorithm) -> Result<IntentOutcome, EngineError> {
        self.dispatch(DeferredIntent::SetLayout(layout))
    }

    /// Merge a partial filter update.
    pub fn set_filter(&self, patch: FilterPatch) -> IntentOutcome {
        if self.store.merge(patch) {
            IntentOutcome::Applied
        } else {
            IntentOutcome::Queued
        }
    }

    /// Feed a selection event.
    pub fn select(&self, event: SelectionEvent) -> IntentOutcome {
        let changed = self.transact(move |state| state.selection.apply(event));
        match changed {
            Some(true) => IntentOutcome::Applied,
            Some(false) => IntentOutcome::Unchanged,
            None => IntentOutcome::Queued,
        }
    }

    /// Clear the error banner.
    pub fn dismiss_error(&self) {
        self.store.set_state(|state| state.error = None);
    }

    /// Clear the current notice.
    pub fn dismiss_notice(&self) {
        self.store.set_state(|state| state.notice = None);
    }

    /// Drop the notice if it has expired at `now`.
    pub fn expire_notices(&self, now: DateTime<Utc>) -> bool {
        let expired = self
            .store
            .get_state()
            .notice
            .as_ref()
            .is_some_and(|n| n.is_expired(now));
        if expired {
            self.store.set_state(move |state| {
                state.expire_notice(now);
            });
        }
        expired
    }

    /// Start time-travel playback: the window opens at the earliest
    /// observation and covers nothing after it.
    pub fn start_playback(&self) -> Result<IntentOutcome, EngineError> {
        let Some(bounds) = timeline_bounds(&self.store.get_state().registry) else {
            return self.reject(EngineError::invalid("No timestamps to play back"));
        };
        Ok(self.set_filter(FilterPatch::time_window(Some(TimeWindow::new(
            bounds.start,
            bounds.start,
        )))))
    }

    /// Move the playback window's end forward by `step`.
    ///
    /// Returns false once the window covers the whole timeline or when no
    /// playback is active.
    pub fn advance_playback(&self, step: Duration) -> bool {
        let state = self.store.get_state();
        let (Some(mut window), Some(bounds)) = (state.filter.time_window, timeline_bounds(&state.registry)) else {
            return false;
        };
        if !window.advance(step, bounds.end) {
            return false;
        }
        self.set_filter(FilterPatch::time_window(Some(window)));
        true
    }

    /// Route a renderer pointer event.
    pub async fn handle_pointer(&self, event: PointerEvent) -> Result<IntentOutcome, EngineError> {
        debug!(kind = ?event.kind, target = ?event.target, modifier = event.modifier, "Pointer event");
        match (event.kind, event.target) {
            (PointerKind::Tap, Some(ElementId::Entity(id))) if event.modifier => {
                Ok(self.select(SelectionEvent::ModifierNodeClick { id }))
            }
            (PointerKind::Tap, Some(ElementId::Entity(id))) => Ok(self.select(SelectionEvent::NodeClick { id })),
            (PointerKind::Tap, Some(ElementId::Relationship(id))) => {
                Ok(self.select(SelectionEvent::EdgeClick { id }))
            }
            (PointerKind::Tap, None) => {
                self.store.set_state(|state| state.context_target = None);
                Ok(self.select(SelectionEvent::BackgroundClick))
            }
            (PointerKind::DoubleTap, Some(ElementId::Entity(id))) => {
                Ok(match self.expand_node(&id).await? {
                    IngestOutcome::Applied(_) => IntentOutcome::Applied,
                    IngestOutcome::Queued => IntentOutcome::Queued,
                })
            }
            (PointerKind::DoubleTap, _) => Ok(IntentOutcome::Unchanged),
            (PointerKind::RightTap, target) => {
                self.store.set_state(move |state| state.context_target = target);
                Ok(IntentOutcome::Applied)
            }
            (PointerKind::DragSelect, _) => Ok(self.select(SelectionEvent::BoxSelect { ids: event.selected })),
            (PointerKind::Hover, target) => {
                self.store.set_state(move |state| state.hovered = target);
                Ok(IntentOutcome::Applied)
            }
        }
    }

    fn dispatch(&self, intent: DeferredIntent) -> Result<IntentOutcome, EngineError> {
        if !self.is_attached() {
            debug!(intent = %intent, "Renderer unavailable, deferring intent");
            self.deferred.lock().push_back(intent);
            return Ok(IntentOutcome::Deferred);
        }
        self.apply_intent(intent)
    }

    fn apply_intent(&self, intent: DeferredIntent) -> Result<IntentOutcome, EngineError> {
        let config = Arc::clone(&self.config);
        let label = intent.to_string();
        let outcome = self.transact(move |state| {
            let result = apply_to_state(state, intent);
            if let Err(e) = &result {
                state.raise_notice(NoticeKind::Warning, e.to_string(), &config);
            }
            result
        });
        match outcome {
            Some(Ok(outcome)) => {
                debug!(intent = %label, outcome = ?outcome, "Intent applied");
                Ok(outcome)
            }
            Some(Err(e)) => {
                info!(intent = %label, error = %e, "Intent rejected");
                Err(e)
            }
            None => Ok(IntentOutcome::Queued),
        }
    }

    // ─── Async intents ─────────────────────────────────────────────────

    /// Load a case, replacing the current graph.
    pub async fn load_case(&self, case_id: &str) -> Result<IngestOutcome, EngineError> {
        self.wait_for_renderer().await?;
        info!(case_id, "Loading case");
        self.begin_request();
        let fetched = self.source.fetch_graph(case_id).await;
        let case_id = case_id.to_string();
        self.complete_ingest("fetch_graph", fetched, IngestMode::Replace, move |state| {
            state.case_id = Some(case_id);
        })
    }

    /// Expand the neighborhood of an entity with the configured defaults.
    pub async fn expand_node(&self, id: &EntityId) -> Result<IngestOutcome, EngineError> {
        let Some(case_id) = self.store.get_state().case_id.clone() else {
            return self.reject(EngineError::invalid("No case loaded"));
        };
        let mut request = ExpandRequest::new(id.clone(), case_id);
        request.depth = Some(self.config.expand_depth);
        request.limit = Some(self.config.expand_limit);
        self.expand_node_with(request).await
    }

    /// Expand with explicit options, merging the result.
    pub async fn expand_node_with(&self, request: ExpandRequest) -> Result<IngestOutcome, EngineError> {
        self.require_entity(&request.node_id)?;
        self.wait_for_renderer().await?;
        info!(node = %request.node_id, depth = ?request.depth, limit = ?request.limit, "Expanding node");
        self.begin_request();
        let fetched = self.source.expand_node(&request).await;
        self.complete_ingest("expand_node", fetched, IngestMode::Merge, |_| {})
    }

    /// Trace the transaction graph of a wallet entity.
    pub async fn trace_wallet(&self, id: &EntityId) -> Result<IngestOutcome, EngineError> {
        let entity_type = self.require_entity(id)?;
        if entity_type != EntityType::CryptoWallet {
            return self.reject(EngineError::invalid(format!(
                "Wallet trace requires a {} entity, {id} is {entity_type}",
                EntityType::CryptoWallet
            )));
        }
        let address = {
            let state = self.store.get_state();
            state
                .registry
                .get_entity(id)
                .map(|e| {
                    e.properties
                        .get(WALLET_ADDRESS_PROPERTY)
                        .and_then(|v| v.as_text())
                        .unwrap_or(&e.label)
                        .trim()
                        .to_string()
                })
                .unwrap_or_default()
        };
        if !is_valid_wallet_address(&address) {
            return self.reject(EngineError::invalid(format!("Malformed wallet address: {address:?}")));
        }

        self.wait_for_renderer().await?;
        info!(wallet = %id, depth = self.config.trace_depth, "Tracing wallet");
        self.begin_request();
        let fetched = self.source.trace_wallet(&address, Some(self.config.trace_depth)).await;
        self.complete_ingest("trace_wallet", fetched, IngestMode::Merge, |_| {})
    }

    /// Run enrichment for an entity and merge the returned properties.
    pub async fn run_enrichment(&self, id: &EntityId) -> Result<IntentOutcome, EngineError> {
        let entity_type = self.require_entity(id)?;
        self.wait_for_renderer().await?;
        info!(entity = %id, entity_type = %entity_type, "Running enrichment");
        self.begin_request();

        let properties = match self.source.run_enrichment(id, entity_type).await {
            Ok(properties) => properties,
            Err(e) => return self.fail("run_enrichment", e),
        };

        let target = id.clone();
        let merged = self.transact(move |state| {
            state.finish_request();
            if properties.is_empty() || !state.registry.contains_entity(&target) {
                return false;
            }
            state.history.record(&state.registry);
            state.registry.merge_properties(&target, properties)
        });
        Ok(match merged {
            Some(true) => IntentOutcome::Applied,
            Some(false) => IntentOutcome::Unchanged,
            None => IntentOutcome::Queued,
        })
    }

    /// Add an entity to the loaded case.
    pub async fn add_to_case(&self, id: &EntityId, notes: Option<&str>) -> Result<(), EngineError> {
        self.require_entity(id)?;
        self.add_entities_to_case(vec![id.clone()], notes).await
    }

    /// Add every selected entity (primary node and multi-selection).
    pub async fn add_selection_to_case(&self, notes: Option<&str>) -> Result<(), EngineError> {
        let ids: Vec<EntityId> = {
            let state = self.store.get_state();
            let mut ids = state.selection.multi_selected().clone();
            ids.extend(state.selection.selected_node().cloned());
            ids.into_iter().filter(|id| state.registry.contains_entity(id)).collect()
        };
        if ids.is_empty() {
            return self.reject(EngineError::invalid("Nothing selected"));
        }
        self.add_entities_to_case(ids, notes).await
    }

    async fn add_entities_to_case(&self, ids: Vec<EntityId>, notes: Option<&str>) -> Result<(), EngineError> {
        let Some(case_id) = self.store.get_state().case_id.clone() else {
            return self.reject(EngineError::invalid("No case loaded"));
        };
        info!(case_id = %case_id, count = ids.len(), "Adding entities to case");
        self.begin_request();
        if let Err(e) = self.source.add_to_case(&ids, &case_id, notes).await {
            return self.fail("add_to_case", e);
        }
        let config = Arc::clone(&self.config);
        let message = format!("Added {} entit{} to case {case_id}", ids.len(), if ids.len() == 1 { "y" } else { "ies" });
        self.store.set_state(move |state| {
            state.finish_request();
            state.raise_notice(NoticeKind::Info, message, &config);
        });
        Ok(())
    }

    // ─── Helpers ───────────────────────────────────────────────────────

    /// Run `f` as one update and hand back its result, or `None` when the
    /// update was queued behind the current notification cycle.
    fn transact<R>(&self, f: impl FnOnce(&mut EngineState) -> R + Send + 'static) -> Option<R>
    where
        R: Send + 'static,
    {
        let out = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&out);
        self.store.set_state(move |state| *slot.lock() = Some(f(state)));
        let result = out.lock().take();
        result
    }

    fn begin_request(&self) {
        self.store.set_state(|state| state.begin_request());
    }

    fn require_entity(&self, id: &EntityId) -> Result<EntityType, EngineError> {
        let entity_type = self.store.get_state().registry.get_entity(id).map(|e| e.entity_type);
        match entity_type {
            Some(entity_type) => Ok(entity_type),
            None => self.reject(EngineError::invalid(format!("Unknown entity {id}"))),
        }
    }

    /// Surface a soft notice and return the error.
    fn reject<T>(&self, error: EngineError) -> Result<T, EngineError> {
        info!(error = %error, "Intent rejected");
        let config = Arc::clone(&self.config);
        let message = error.to_string();
        self.store
            .set_state(move |state| state.raise_notice(NoticeKind::Warning, message, &config));
        Err(error)
    }

    /// Surface a fetch failure: the request ends, nothing else changes.
    fn fail<T>(&self, op: &'static str, source_error: D::Error) -> Result<T, EngineError> {
        let error = EngineError::from_source(source_error);
        warn!(op, error = %error, "Data source request failed");
        let message = error.to_string();
        self.store.set_state(move |state| {
            state.finish_request();
            state.error = Some(message);
        });
        Err(error)
    }

    fn complete_ingest(
        &self,
        op: &'static str,
        fetched: Result<GraphPayload, D::Error>,
        mode: IngestMode,
        prepare: impl FnOnce(&mut EngineState) + Send + 'static,
    ) -> Result<IngestOutcome, EngineError> {
        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => return self.fail(op, e),
        };
        let config = Arc::clone(&self.config);
        let report = self.transact(move |state| {
            state.finish_request();
            prepare(state);
            let report = ingest(state, payload, mode);
            if !report.violations.is_empty() {
                state.raise_notice(
                    NoticeKind::Warning,
                    format!("{} relationship(s) refused: unknown endpoint", report.rejected()),
                    &config,
                );
            }
            report
        });
        Ok(match report {
            Some(report) => IngestOutcome::Applied(report),
            None => {
                debug!(op, "Ingest queued behind the current notification cycle");
                IngestOutcome::Queued
            }
        })
    }
}

fn apply_to_state(state: &mut EngineState, intent: DeferredIntent) -> Result<IntentOutcome, EngineError> {
    let unknown = |id: &EntityId| EngineError::invalid(format!("Unknown entity {id}"));
    match intent {
        DeferredIntent::TogglePin(id) => {
            let pinned = state.registry.get_entity(&id).ok_or_else(|| unknown(&id))?.pinned;
            state.history.record(&state.registry);
            state.registry.set_pinned(&id, !pinned);
            Ok(IntentOutcome::Applied)
        }
        DeferredIntent::HideNode(id) => {
            if state.registry.get_entity(&id).ok_or_else(|| unknown(&id))?.hidden {
                return Ok(IntentOutcome::Unchanged);
            }
            state.history.record(&state.registry);
            state.registry.set_hidden(&id, true);
            Ok(IntentOutcome::Applied)
        }
        DeferredIntent::UnhideAll => {
            if !state.registry.entities().any(|e| e.hidden) {
                return Ok(IntentOutcome::Unchanged);
            }
            state.history.record(&state.registry);
            state.registry.unhide_all();
            Ok(IntentOutcome::Applied)
        }
        DeferredIntent::SetRiskScore(id, score) => {
            let current = state.registry.get_entity(&id).ok_or_else(|| unknown(&id))?.risk_score();
            if i64::from(current) == score.clamp(0, 100) {
                return Ok(IntentOutcome::Unchanged);
            }
            state.history.record(&state.registry);
            state.registry.set_risk_score(&id, score);
            Ok(IntentOutcome::Applied)
        }
        DeferredIntent::Undo => match state.history.undo(&state.registry) {
            Some(outcome) => {
                state.registry = outcome.restored.elements().clone();
                Ok(IntentOutcome::Applied)
            }
            None => Ok(IntentOutcome::Unchanged),
        },
        DeferredIntent::Redo => match state.history.redo(&state.registry) {
            Some(outcome) => {
                state.registry = outcome.restored.elements().clone();
                Ok(IntentOutcome::Applied)
            }
            None => Ok(IntentOutcome::Unchanged),
        },
        DeferredIntent::SetLayout(layout) => {
            state.layout = layout;
            state.request_layout();
            Ok(IntentOutcome::Applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{RecordingRenderer, RenderCall};
    use crate::source::{InMemoryDataSource, SourceOp};
    use crate::types::{Entity, Relationship, RelationshipType};

    fn source() -> InMemoryDataSource {
        let mut source = InMemoryDataSource::new();
        source.add_entity(Entity::new("a", "Alice", EntityType::Person));
        source.add_entity(Entity::new("b", "alice@example.com", EntityType::Email));
        source.add_relationship(Relationship::new("ab", "a", "b", RelationshipType::Uses));
        source.add_case_member("case-1", "a");
        source.add_case_member("case-1", "b");
        source
    }

    fn engine() -> (Engine<InMemoryDataSource>, RecordingRenderer) {
        let engine = Engine::new(EngineConfig::default(), source());
        let renderer = RecordingRenderer::new();
        engine.attach_renderer(renderer.clone());
        (engine, renderer)
    }

    #[tokio::test]
    async fn test_load_case_installs_payload() {
        let (engine, renderer) = engine();
        let report = engine.load_case("case-1").await.unwrap().into_report().unwrap();

        assert_eq!(report.added_entities, 2);
        assert_eq!(report.added_relationships, 1);
        let state = engine.get_state();
        assert_eq!(state.case_id.as_deref(), Some("case-1"));
        assert!(!state.loading());
        assert_eq!(renderer.num_entities(), 2);
        assert_eq!(renderer.num_relationships(), 1);
        assert!(renderer.calls().contains(&RenderCall::Clear));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state() {
        let (engine, _renderer) = engine();
        engine.load_case("case-1").await.unwrap();
        let before = engine.get_state();

        engine.data_source().fail(SourceOp::FetchGraph);
        let err = engine.load_case("case-1").await.unwrap_err();

        assert!(matches!(err, EngineError::FetchFailure(_)));
        let after = engine.get_state();
        assert_eq!(after.registry, before.registry);
        assert_eq!(after.history.undo_depth(), before.history.undo_depth());
        assert!(after.error.is_some());
        assert!(!after.loading());
    }

    #[test]
    fn test_intents_deferred_until_attach() {
        let engine = Engine::new(EngineConfig::default(), source());
        engine.set_state(|s| s.registry.upsert_entity(Entity::new("a", "Alice", EntityType::Person)));

        assert_eq!(engine.toggle_pin(&"a".into()), Ok(IntentOutcome::Deferred));
        assert_eq!(engine.set_layout(LayoutAlgorithm::Grid), Ok(IntentOutcome::Deferred));
        assert!(!engine.get_state().registry.get_entity(&"a".into()).unwrap().pinned);
        assert_eq!(engine.deferred_len(), 2);

        let renderer = RecordingRenderer::new();
        engine.attach_renderer(renderer.clone());

        assert_eq!(engine.deferred_len(), 0);
        assert!(engine.get_state().registry.get_entity(&"a".into()).unwrap().pinned);
        assert!(renderer.is_locked(&"a".into()));
        assert_eq!(engine.get_state().layout, LayoutAlgorithm::Grid);
    }

    #[test]
    fn test_unknown_entity_raises_notice() {
        let (engine, _renderer) = engine();
        let err = engine.hide_node(&"ghost".into()).unwrap_err();
        assert!(err.is_soft());
        let notice = engine.get_state().notice.clone().unwrap();
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert_eq!(engine.get_state().history.undo_depth(), 0);
    }

    #[test]
    fn test_export_requires_renderer() {
        let engine = Engine::new(EngineConfig::default(), source());
        assert_eq!(engine.export_view(ExportFormat::Json), Err(EngineError::RendererUnavailable));
        engine.attach_renderer(RecordingRenderer::new());
        assert!(engine.export_view(ExportFormat::Json).is_ok());
    }

    #[test]
    fn test_intent_from_listener_is_queued() {
        let (engine, _renderer) = engine();
        engine.set_state(|s| s.registry.upsert_entity(Entity::new("a", "Alice", EntityType::Person)));
        let engine = Arc::new(engine);

        let inner = Arc::clone(&engine);
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&outcomes);
        let _sub = engine.subscribe(move |next: &EngineState, _: &EngineState| {
            if next.layout == LayoutAlgorithm::Grid && next.history.undo_depth() == 0 {
                seen.lock().push(inner.toggle_pin(&"a".into()));
            }
        });

        engine.set_layout(LayoutAlgorithm::Grid).unwrap();

        assert_eq!(*outcomes.lock(), vec![Ok(IntentOutcome::Queued)]);
        assert!(engine.get_state().registry.get_entity(&"a".into()).unwrap().pinned);
    }

    #[test]
    fn test_expand_from_listener_is_queued() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let mut source = source();
        source.add_entity(Entity::new("c", "Carol", EntityType::Person));
        source.add_relationship(Relationship::new("bc", "b", "c", RelationshipType::LinkedTo));
        let engine = Engine::new(EngineConfig::default(), source);
        engine.attach_renderer(RecordingRenderer::new());

        let runtime = Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap(),
        );
        runtime.block_on(engine.load_case("case-1")).unwrap();
        let engine = Arc::new(engine);

        let inner = Arc::clone(&engine);
        let rt = Arc::clone(&runtime);
        let fired = Arc::new(AtomicBool::new(false));
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&outcomes);
        let _sub = engine.subscribe(move |next: &EngineState, _: &EngineState| {
            if next.layout == LayoutAlgorithm::Grid && !fired.swap(true, Ordering::SeqCst) {
                seen.lock().push(rt.block_on(inner.expand_node(&"b".into())));
            }
        });

        engine.set_layout(LayoutAlgorithm::Grid).unwrap();

        assert_eq!(*outcomes.lock(), vec![Ok(IngestOutcome::Queued)]);
        let state = engine.get_state();
        assert!(state.registry.contains_entity(&"c".into()));
        assert!(!state.loading());
        assert_eq!(state.error, None);
    }
}
