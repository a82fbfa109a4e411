//! Core types for the active-state library
//!
//! This module defines the values that flow through the tracker: state
//! parameters, resolved states, tracked targets and their identity keys,
//! and the error type shared by every operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// State parameters, a JSON object keyed by parameter name
pub type Params = serde_json::Map<String, Value>;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur while tracking active states
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid target: state name must be a non-empty string")]
    InvalidTarget,

    #[error("Expected exactly one child element, got {0}")]
    InvalidChild(usize),

    #[error("Target {0} is not registered")]
    StaleTarget(TargetId),

    #[error("Tracker has been unmounted")]
    Unmounted,

    #[error("Lifecycle violation: {0}")]
    Lifecycle(String),

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("Invalid state name: {0:?}")]
    InvalidStateName(String),

    #[error("Parent state not registered for: {0}")]
    UnknownParent(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

/// Stable identifier of one registry entry
///
/// Ids are handed out monotonically by a registry and never reused, so an id
/// that has been removed stays invalid forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A state found in the state catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedState {
    /// Fully qualified dotted name (e.g. "home.settings")
    pub name: String,
    /// Fully qualified name of the parent state, `None` for top-level states
    pub parent: Option<String>,
}

impl ResolvedState {
    /// Build a resolved state, deriving the parent from the dotted name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let parent = name.rsplit_once('.').map(|(parent, _)| parent.to_string());
        Self { name, parent }
    }
}

/// What a target's state name resolved to at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// The resolution service knew the state
    Resolved(ResolvedState),
    /// Resolution missed; matching falls back to the raw name
    NameOnly(String),
}

impl ResolvedTarget {
    /// Name used when querying the current state
    pub fn name(&self) -> &str {
        match self {
            ResolvedTarget::Resolved(state) => &state.name,
            ResolvedTarget::NameOnly(name) => name,
        }
    }

    /// True if the resolution service knew the state
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolvedTarget::Resolved(_))
    }
}

/// A (state, params, marker) tuple under consideration by a tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    /// State name as declared by the caller
    pub state_name: String,
    /// Declared parameters (may be empty)
    pub params: Params,
    /// Marker applied while the target is active
    pub marker: String,
    /// Deduplication key derived from name and params
    pub identity_key: String,
    /// Resolution outcome
    pub resolved: ResolvedTarget,
}

/// Compute the identity key of a target
///
/// The key is the state name followed by a canonical JSON rendering of the
/// params, with object keys sorted at every depth.
pub fn identity_key(state_name: &str, params: &Params) -> String {
    let mut key = String::with_capacity(state_name.len() + 2);
    key.push_str(state_name);
    write_canonical_object(params, &mut key);
    key
}

fn write_canonical_object(map: &Params, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, k) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Value's Display never fails and escapes like serde_json does
        out.push_str(&Value::String(k.clone()).to_string());
        out.push(':');
        write_canonical(&map[k], out);
    }
    out.push('}');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Convert an arbitrary JSON value into params
///
/// `null` is accepted as "no params"; anything other than an object is rejected.
pub fn params_from_value(value: Value) -> Result<Params> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(TrackerError::InvalidParams(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        params_from_value(value).unwrap()
    }

    #[test]
    fn test_identity_key_ignores_insertion_order() {
        let mut a = Params::new();
        a.insert("id".into(), json!(5));
        a.insert("tab".into(), json!("general"));

        let mut b = Params::new();
        b.insert("tab".into(), json!("general"));
        b.insert("id".into(), json!(5));

        assert_eq!(identity_key("user", &a), identity_key("user", &b));
        assert_eq!(identity_key("user", &a), r#"user{"id":5,"tab":"general"}"#);
    }

    #[test]
    fn test_identity_key_sorts_nested_objects() {
        let a = params(json!({ "filter": { "z": 1, "a": [ { "y": 2, "b": 3 } ] } }));
        let b = params(json!({ "filter": { "a": [ { "b": 3, "y": 2 } ], "z": 1 } }));
        assert_eq!(identity_key("list", &a), identity_key("list", &b));
    }

    #[test]
    fn test_identity_key_distinguishes_values() {
        let a = params(json!({ "id": 5 }));
        let b = params(json!({ "id": "5" }));
        assert_ne!(identity_key("user", &a), identity_key("user", &b));
        assert_eq!(identity_key("home", &Params::new()), "home{}");
    }

    #[test]
    fn test_params_from_value() {
        assert!(params_from_value(Value::Null).unwrap().is_empty());
        assert!(matches!(
            params_from_value(json!([1, 2])),
            Err(TrackerError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_resolved_state_parent() {
        assert_eq!(ResolvedState::new("home.settings").parent.as_deref(), Some("home"));
        assert_eq!(ResolvedState::new("home").parent, None);
    }

    #[test]
    fn test_resolved_target_name() {
        let resolved = ResolvedTarget::Resolved(ResolvedState::new("a.b"));
        assert_eq!(resolved.name(), "a.b");
        assert!(resolved.is_resolved());

        let fallback = ResolvedTarget::NameOnly("missing".into());
        assert_eq!(fallback.name(), "missing");
        assert!(!fallback.is_resolved());
    }
}
