//! Scenario loading and validation

use active_state::{MarkerConfig, TrackerConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A scenario file (scenario.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    /// Display name; defaults to the file name
    pub name: Option<String>,
    /// State catalog, parents before children
    pub states: Vec<String>,
    #[serde(default)]
    pub trackers: Vec<TrackerEntry>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerEntry {
    pub id: String,
    /// Single marker, or a table of state → marker
    pub marker: MarkerConfig,
    #[serde(default)]
    pub exact: bool,
    /// Ancestor context for relative state names
    pub context: Option<String>,
    /// Class already present on the wrapped element
    pub child_class: Option<String>,
    /// Nested links registering through the tracker
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    /// Targets added directly with their own marker
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl TrackerEntry {
    /// Library configuration for this tracker
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            marker: self.marker.clone(),
            exact: self.exact,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    pub state: String,
    #[serde(default)]
    pub params: Value,
    /// Link text; defaults to the state name
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    pub state: String,
    #[serde(default)]
    pub params: Value,
    pub marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepConfig {
    /// State to navigate to (relative names resolve against the current state)
    pub go: String,
    #[serde(default)]
    pub params: Value,
}

/// Problems a scenario can have beyond TOML syntax
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario declares no states")]
    NoStates,

    #[error("tracker id must not be empty")]
    EmptyTrackerId,

    #[error("duplicate tracker id: {0}")]
    DuplicateTracker(String),

    #[error("tracker {tracker}: link with empty state name")]
    EmptyLinkState { tracker: String },

    #[error("step {index}: empty state name")]
    EmptyStep { index: usize },
}

impl ScenarioConfig {
    /// Check structural rules that TOML cannot express
    pub fn validate(&self) -> std::result::Result<(), ScenarioError> {
        if self.states.is_empty() {
            return Err(ScenarioError::NoStates);
        }

        let mut seen = HashSet::new();
        for tracker in &self.trackers {
            if tracker.id.is_empty() {
                return Err(ScenarioError::EmptyTrackerId);
            }
            if !seen.insert(tracker.id.as_str()) {
                return Err(ScenarioError::DuplicateTracker(tracker.id.clone()));
            }
            if tracker.links.iter().any(|link| link.state.is_empty()) {
                return Err(ScenarioError::EmptyLinkState {
                    tracker: tracker.id.clone(),
                });
            }
        }

        if let Some(index) = self.steps.iter().position(|step| step.go.is_empty()) {
            return Err(ScenarioError::EmptyStep { index });
        }
        Ok(())
    }
}

/// Load and validate a scenario from a TOML file
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {:?}", path))?;

    let mut scenario: ScenarioConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;

    scenario
        .validate()
        .with_context(|| format!("Invalid scenario file: {:?}", path))?;

    if scenario.name.is_none() {
        scenario.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NAV_BAR: &str = r#"
        name = "nav bar"
        states = ["home", "home.settings", "about"]

        [[trackers]]
        id = "home-item"
        marker = "active"
        child_class = "nav-item"

        [[trackers.links]]
        state = "home"
        params = { tab = "general" }

        [[trackers]]
        id = "sections"
        marker = { home = "in-home", about = "in-about" }
        exact = true

        [[steps]]
        go = "home.settings"
        params = { tab = "general" }

        [[steps]]
        go = "about"
    "#;

    #[test]
    fn test_scenario_deserialization() {
        let scenario: ScenarioConfig = toml::from_str(NAV_BAR).unwrap();
        assert_eq!(scenario.states.len(), 3);
        assert_eq!(scenario.trackers.len(), 2);

        let home = &scenario.trackers[0];
        assert_eq!(home.marker, MarkerConfig::Single("active".into()));
        assert_eq!(home.links[0].params["tab"], "general");

        let sections = scenario.trackers[1].tracker_config();
        assert!(sections.marker.is_per_state());
        assert!(sections.exact);

        assert!(scenario.steps[1].params.is_null());
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_duplicate_tracker_ids() {
        let scenario: ScenarioConfig = toml::from_str(
            r#"
            states = ["a"]
            [[trackers]]
            id = "x"
            marker = "m"
            [[trackers]]
            id = "x"
            marker = "n"
            "#,
        )
        .unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::DuplicateTracker(id)) if id == "x"
        ));
    }

    #[test]
    fn test_empty_catalog_is_invalid() {
        let scenario: ScenarioConfig = toml::from_str("states = []").unwrap();
        assert!(matches!(scenario.validate(), Err(ScenarioError::NoStates)));
    }

    #[test]
    fn test_load_scenario_names_from_file() {
        let mut file = tempfile::Builder::new()
            .prefix("sidebar")
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(file, "states = [\"home\"]").unwrap();

        let scenario = load_scenario(file.path()).unwrap();
        let name = scenario.name.unwrap();
        assert!(name.starts_with("sidebar"));
    }

    #[test]
    fn test_load_scenario_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "states = [").unwrap();

        let err = load_scenario(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse scenario file"));
    }
}
