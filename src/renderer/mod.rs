//! Renderer collaborator.
//!
//! The engine never assumes renderer internals: everything it needs goes
//! through the [`Renderer`] trait.

pub mod layout;
pub mod recording;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::filter::VisualClass;
use crate::types::{ElementId, Entity, EntityId, Relationship};

pub use layout::{LayoutAlgorithm, LayoutOptions};
pub use recording::{RecordingRenderer, RenderCall};

/// Error type for renderer queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RendererError {
    /// Export format not supported by this renderer.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(ExportFormat),
    /// Export failed.
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

/// Export format for the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raster image.
    Png,
    /// Vector image.
    Svg,
    /// Element data as JSON.
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Svg => write!(f, "svg"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Narrow capability interface of the graph canvas.
pub trait Renderer: Send {
    /// Add a node.
    fn add_entity(&mut self, entity: &Entity);

    /// Add an edge. Both endpoints have been added before.
    fn add_relationship(&mut self, relationship: &Relationship);

    /// Remove an element.
    fn remove_element(&mut self, id: &ElementId);

    /// Replace a node's data fields.
    fn update_entity(&mut self, entity: &Entity);

    /// Replace an edge's data fields.
    fn update_relationship(&mut self, relationship: &Relationship);

    /// Replace the visual classes of an element.
    fn set_classes(&mut self, id: &ElementId, classes: &[VisualClass]);

    /// Lock or unlock a node's position.
    fn set_locked(&mut self, id: &EntityId, locked: bool);

    /// Remove every element.
    fn clear(&mut self);

    /// Arrange the given nodes.
    fn run_layout(&mut self, algorithm: LayoutAlgorithm, options: &LayoutOptions, nodes: &[EntityId]);

    /// Elements currently drawn.
    fn live_elements(&self) -> BTreeSet<ElementId>;

    /// Elements connected to a node (its edges and their other endpoints).
    fn neighborhood(&self, id: &EntityId) -> BTreeSet<ElementId>;

    /// Export the current view.
    fn export(&self, format: ExportFormat) -> Result<Vec<u8>, RendererError>;
}

/// Kind of pointer interaction reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    /// Single click/tap.
    Tap,
    /// Double click/tap.
    DoubleTap,
    /// Context click.
    RightTap,
    /// Rubber-band selection finished.
    DragSelect,
    /// Pointer entered an element (or left all, with no target).
    Hover,
}

/// Pointer event with its targets and modifier state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Interaction kind.
    pub kind: PointerKind,
    /// Target element; `None` is the background.
    pub target: Option<ElementId>,
    /// Nodes inside the box for `DragSelect`.
    #[serde(default)]
    pub selected: Vec<EntityId>,
    /// Multi-select modifier (shift/ctrl/cmd) held.
    #[serde(default)]
    pub modifier: bool,
}

impl PointerEvent {
    /// Event on a target without modifier.
    pub fn new(kind: PointerKind, target: Option<ElementId>) -> Self {
        Self {
            kind,
            target,
            selected: Vec::new(),
            modifier: false,
        }
    }

    /// Mark the modifier key as held.
    pub fn with_modifier(mut self) -> Self {
        self.modifier = true;
        self
    }

    /// Box-select result.
    pub fn drag_select(selected: Vec<EntityId>) -> Self {
        Self {
            kind: PointerKind::DragSelect,
            target: None,
            selected,
            modifier: false,
        }
    }
}
