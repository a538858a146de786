//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::history::DEFAULT_UNDO_CAPACITY;
use crate::renderer::{LayoutAlgorithm, LayoutOptions};
use crate::source::memory::{DEFAULT_EXPAND_DEPTH, DEFAULT_EXPAND_LIMIT, DEFAULT_TRACE_DEPTH};

/// Default time a soft notice stays visible.
pub const DEFAULT_NOTICE_DURATION_MS: u64 = 4_000;

/// Default viewport padding for layout runs.
pub const DEFAULT_LAYOUT_PADDING: u32 = 30;

/// Tunables for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum undo depth.
    pub undo_capacity: usize,
    /// Display duration of soft notices, in milliseconds.
    pub notice_duration_ms: u64,
    /// Layout used until the user picks another.
    pub default_layout: LayoutAlgorithm,
    /// Hop limit for node expansion.
    pub expand_depth: u32,
    /// Node limit for node expansion.
    pub expand_limit: usize,
    /// Hop limit for wallet tracing.
    pub trace_depth: u32,
    /// Viewport padding for layout runs.
    pub layout_padding: u32,
    /// Animate layout runs.
    pub layout_animate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            notice_duration_ms: DEFAULT_NOTICE_DURATION_MS,
            default_layout: LayoutAlgorithm::default(),
            expand_depth: DEFAULT_EXPAND_DEPTH,
            expand_limit: DEFAULT_EXPAND_LIMIT,
            trace_depth: DEFAULT_TRACE_DEPTH,
            layout_padding: DEFAULT_LAYOUT_PADDING,
            layout_animate: true,
        }
    }
}

impl EngineConfig {
    /// Build a config from `GRAPH_ENGINE_*` environment variables.
    ///
    /// Unset variables keep their default; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        read_var(&lookup, "GRAPH_ENGINE_UNDO_CAPACITY", &mut config.undo_capacity, |s| {
            s.parse().ok().filter(|n: &usize| *n > 0)
        });
        read_var(&lookup, "GRAPH_ENGINE_NOTICE_MS", &mut config.notice_duration_ms, |s| s.parse().ok());
        read_var(&lookup, "GRAPH_ENGINE_LAYOUT", &mut config.default_layout, LayoutAlgorithm::from_str);
        read_var(&lookup, "GRAPH_ENGINE_EXPAND_DEPTH", &mut config.expand_depth, |s| {
            s.parse().ok().filter(|n: &u32| *n > 0)
        });
        read_var(&lookup, "GRAPH_ENGINE_EXPAND_LIMIT", &mut config.expand_limit, |s| {
            s.parse().ok().filter(|n: &usize| *n > 0)
        });
        read_var(&lookup, "GRAPH_ENGINE_TRACE_DEPTH", &mut config.trace_depth, |s| {
            s.parse().ok().filter(|n: &u32| (1..=10).contains(n))
        });
        read_var(&lookup, "GRAPH_ENGINE_LAYOUT_PADDING", &mut config.layout_padding, |s| s.parse().ok());
        read_var(&lookup, "GRAPH_ENGINE_LAYOUT_ANIMATE", &mut config.layout_animate, |s| {
            match s.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        });

        config
    }

    /// Display duration of soft notices.
    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    /// Layout options for a run of `algorithm`.
    pub fn layout_options(&self, algorithm: LayoutAlgorithm) -> LayoutOptions {
        LayoutOptions::for_algorithm(algorithm, self.layout_animate, self.layout_padding)
    }
}

fn read_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
    parse: impl Fn(&str) -> Option<T>,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match parse(raw.trim()) {
        Some(value) => *slot = value,
        None => tracing::warn!(key, value = %raw, "Ignoring invalid configuration value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.undo_capacity, 50);
        assert_eq!(config.notice_duration(), Duration::from_secs(4));
        assert_eq!(config.default_layout, LayoutAlgorithm::Cose);
        assert_eq!(config.expand_depth, 1);
        assert_eq!(config.expand_limit, 50);
        assert_eq!(config.trace_depth, 3);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("GRAPH_ENGINE_UNDO_CAPACITY", "10"),
            ("GRAPH_ENGINE_LAYOUT", "grid"),
            ("GRAPH_ENGINE_LAYOUT_ANIMATE", "off"),
        ]));
        assert_eq!(config.undo_capacity, 10);
        assert_eq!(config.default_layout, LayoutAlgorithm::Grid);
        assert!(!config.layout_animate);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("GRAPH_ENGINE_UNDO_CAPACITY", "0"),
            ("GRAPH_ENGINE_TRACE_DEPTH", "11"),
            ("GRAPH_ENGINE_LAYOUT", "spiral"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"undo_capacity": 5}"#).unwrap();
        assert_eq!(config.undo_capacity, 5);
        assert_eq!(config.layout_padding, DEFAULT_LAYOUT_PADDING);
    }
}
