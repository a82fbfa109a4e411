//! Tracker configuration types
//!
//! A tracker is configured with the marker(s) it applies and whether it
//! matches states inclusively or exactly. The marker can be given either as
//! a single marker shared by every nested link, or as an explicit table of
//! state name → marker.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a tracker obtains its targets' markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerConfig {
    /// One marker applied to every target registered by nested links
    Single(String),
    /// Explicit states, each with its own marker; shadows nested links.
    /// Declaration order is the order the states are tracked in.
    PerState(IndexMap<String, String>),
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig::Single(String::new())
    }
}

impl MarkerConfig {
    /// Marker a nested link for `state_name` would be registered with
    ///
    /// Empty markers count as no marker.
    pub fn marker_for(&self, state_name: &str) -> Option<&str> {
        let marker = match self {
            MarkerConfig::Single(marker) => Some(marker.as_str()),
            MarkerConfig::PerState(states) => states.get(state_name).map(String::as_str),
        };
        marker.filter(|marker| !marker.is_empty())
    }

    /// True when the explicit-states table names at least one state
    pub fn has_states(&self) -> bool {
        match self {
            MarkerConfig::Single(_) => false,
            MarkerConfig::PerState(states) => states.keys().any(|state| !state.is_empty()),
        }
    }

    /// True for the explicit-states form
    pub fn is_per_state(&self) -> bool {
        matches!(self, MarkerConfig::PerState(_))
    }
}

/// Configuration for one active-state tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Marker(s) to apply
    #[serde(default, alias = "class")]
    pub marker: MarkerConfig,

    /// Match only the exact state and params (default: inclusive)
    #[serde(default)]
    pub exact: bool,
}

impl TrackerConfig {
    /// Create a new tracker configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: use a single marker for nested links
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = MarkerConfig::Single(marker.into());
        self
    }

    /// Builder method: track explicit states, each with its own marker
    pub fn with_state_markers<I, S, M>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = (S, M)>,
        S: Into<String>,
        M: Into<String>,
    {
        self.marker = MarkerConfig::PerState(
            states
                .into_iter()
                .map(|(state, marker)| (state.into(), marker.into()))
                .collect(),
        );
        self
    }

    /// Builder method: enable or disable exact matching
    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Matching mode selected by this configuration
    pub fn match_mode(&self) -> crate::matching::MatchMode {
        if self.exact {
            crate::matching::MatchMode::Exact
        } else {
            crate::matching::MatchMode::Inclusive
        }
    }
}
