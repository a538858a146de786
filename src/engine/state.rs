//! The engine's shared state.

use chrono::{DateTime, Utc};

use super::notice::{Notice, NoticeKind};
use super::store::{StatePatch, StoreState};
use crate::config::EngineConfig;
use crate::filter::{classify, ClassificationMap, FilterCriteria, FilterPatch};
use crate::history::History;
use crate::registry::Registry;
use crate::renderer::LayoutAlgorithm;
use crate::selection::{inspect, Inspection, Selection};
use crate::types::ElementId;

/// Everything the engine knows about the working graph.
///
/// Public fields can be written through [`StateStore::set_state`]; derived
/// fields are recomputed after every update and only readable.
///
/// [`StateStore::set_state`]: super::store::StateStore::set_state
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Ground-truth elements.
    pub registry: Registry,
    /// Undo/redo stacks.
    pub history: History,
    /// Primary and multi selection.
    pub selection: Selection,
    /// Active filter criteria.
    pub filter: FilterCriteria,
    /// Current layout algorithm.
    pub layout: LayoutAlgorithm,
    /// Case the graph was loaded from.
    pub case_id: Option<String>,
    /// Element under the pointer.
    pub hovered: Option<ElementId>,
    /// Element the context menu was opened on.
    pub context_target: Option<ElementId>,
    /// Surfaced hard error. A new error replaces the previous one.
    pub error: Option<String>,
    /// Current soft notice.
    pub notice: Option<Notice>,
    pending_requests: usize,
    layout_epoch: u64,
    reset_epoch: u64,
    classification: ClassificationMap,
    inspection: Option<Inspection>,
}

impl EngineState {
    /// Empty state configured from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registry: Registry::new(),
            history: History::new(config.undo_capacity),
            selection: Selection::new(),
            filter: FilterCriteria::default(),
            layout: config.default_layout,
            case_id: None,
            hovered: None,
            context_target: None,
            error: None,
            notice: None,
            pending_requests: 0,
            layout_epoch: 0,
            reset_epoch: 0,
            classification: ClassificationMap::default(),
            inspection: None,
        }
    }

    /// Whether any data source request is outstanding.
    pub fn loading(&self) -> bool {
        self.pending_requests > 0
    }

    /// Number of outstanding data source requests.
    pub fn pending_requests(&self) -> usize {
        self.pending_requests
    }

    /// Per-element classification of the current registry.
    pub fn classification(&self) -> &ClassificationMap {
        &self.classification
    }

    /// Detail-panel target for the current selection.
    pub fn inspection(&self) -> Option<&Inspection> {
        self.inspection.as_ref()
    }

    /// Bumped whenever a re-layout is requested.
    pub fn layout_epoch(&self) -> u64 {
        self.layout_epoch
    }

    /// Bumped whenever the view is rebuilt from scratch.
    pub fn reset_epoch(&self) -> u64 {
        self.reset_epoch
    }

    /// Request a re-layout of the current node set.
    pub fn request_layout(&mut self) {
        self.layout_epoch += 1;
    }

    /// Drop the live element set so the next sync rebuilds it.
    pub fn reset_view(&mut self) {
        self.reset_epoch += 1;
    }

    pub(crate) fn begin_request(&mut self) {
        self.pending_requests += 1;
    }

    pub(crate) fn finish_request(&mut self) {
        self.pending_requests = self.pending_requests.saturating_sub(1);
    }

    /// Raise a soft notice, replacing the current one.
    pub fn raise_notice(&mut self, kind: NoticeKind, message: impl Into<String>, config: &EngineConfig) {
        self.notice = Some(Notice::new(kind, message, Utc::now(), config.notice_duration()));
    }

    /// Clear the notice if it has expired at `now`.
    pub fn expire_notice(&mut self, now: DateTime<Utc>) -> bool {
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
            return true;
        }
        false
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl StoreState for EngineState {
    fn derive(&mut self) {
        self.classification = classify(&self.registry, &self.filter);
        self.inspection = inspect(&self.selection, &self.registry);
    }
}

impl StatePatch<EngineState> for FilterPatch {
    fn apply_to(self, state: &mut EngineState) {
        state.filter.apply(self);
    }
}

/// Shallow partial update of the engine's plain fields.
#[derive(Debug, Clone, Default)]
pub struct EngineStatePatch {
    /// Replace the filter criteria.
    pub filter: Option<FilterCriteria>,
    /// Replace the selection.
    pub selection: Option<Selection>,
    /// Replace the layout algorithm (without re-running it).
    pub layout: Option<LayoutAlgorithm>,
    /// Replace the hovered element.
    pub hovered: Option<Option<ElementId>>,
    /// Replace the context menu target.
    pub context_target: Option<Option<ElementId>>,
    /// Replace the surfaced error.
    pub error: Option<Option<String>>,
    /// Replace the notice.
    pub notice: Option<Option<Notice>>,
}

impl StatePatch<EngineState> for EngineStatePatch {
    fn apply_to(self, state: &mut EngineState) {
        if let Some(filter) = self.filter {
            state.filter = filter;
        }
        if let Some(selection) = self.selection {
            state.selection = selection;
        }
        if let Some(layout) = self.layout {
            state.layout = layout;
        }
        if let Some(hovered) = self.hovered {
            state.hovered = hovered;
        }
        if let Some(target) = self.context_target {
            state.context_target = target;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
        if let Some(notice) = self.notice {
            state.notice = notice;
        }
    }
}
