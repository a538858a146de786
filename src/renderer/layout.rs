//! Named layout algorithms and their configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Layout algorithm offered by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAlgorithm {
    /// Spring-electrical simulation.
    ForceDirected,
    /// Layered top-down arrangement.
    Hierarchical,
    /// Rings by degree.
    Concentric,
    /// Regular grid.
    Grid,
    /// Compound spring embedder.
    Cose,
}

impl LayoutAlgorithm {
    /// Parse a layout name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "force-directed" | "force_directed" | "force" => Some(Self::ForceDirected),
            "hierarchical" | "dagre" | "breadthfirst" => Some(Self::Hierarchical),
            "concentric" => Some(Self::Concentric),
            "grid" => Some(Self::Grid),
            "cose" => Some(Self::Cose),
            _ => None,
        }
    }

    /// Algorithm-specific tuning defaults.
    pub fn default_tuning(&self) -> BTreeMap<String, f64> {
        let pairs: &[(&str, f64)] = match self {
            Self::ForceDirected => &[("spring_length", 120.0), ("spring_coeff", 0.0008), ("gravity", 1.0)],
            Self::Hierarchical => &[("rank_sep", 80.0), ("node_sep", 40.0)],
            Self::Concentric => &[("min_node_spacing", 40.0)],
            Self::Grid => &[("avoid_overlap_padding", 10.0)],
            Self::Cose => &[("node_repulsion", 400_000.0), ("ideal_edge_length", 100.0), ("gravity", 80.0)],
        };
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }
}

impl Default for LayoutAlgorithm {
    fn default() -> Self {
        Self::Cose
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForceDirected => write!(f, "force-directed"),
            Self::Hierarchical => write!(f, "hierarchical"),
            Self::Concentric => write!(f, "concentric"),
            Self::Grid => write!(f, "grid"),
            Self::Cose => write!(f, "cose"),
        }
    }
}

/// Configuration passed with a layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Animate node movement.
    pub animate: bool,
    /// Viewport padding in pixels.
    pub padding: u32,
    /// Algorithm-specific parameters.
    pub tuning: BTreeMap<String, f64>,
}

impl LayoutOptions {
    /// Options for an algorithm with its default tuning.
    pub fn for_algorithm(algorithm: LayoutAlgorithm, animate: bool, padding: u32) -> Self {
        Self {
            animate,
            padding,
            tuning: algorithm.default_tuning(),
        }
    }
}
