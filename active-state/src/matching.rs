//! Active-marker computation
//!
//! Walks the registry in order and asks the state query service whether each
//! target is active. Pure: nothing here mutates the registry.

use crate::registry::TargetRegistry;
use crate::state::StateQuery;
use crate::types::TrackedTarget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a target is compared to the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Target state or any descendant, with the target's params agreeing
    #[default]
    Inclusive,
    /// Exactly the target state with exactly the target's params
    Exact,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Inclusive => write!(f, "inclusive"),
            MatchMode::Exact => write!(f, "exact"),
        }
    }
}

/// Decide whether a single target is active
pub fn is_active(target: &TrackedTarget, query: &dyn StateQuery, mode: MatchMode) -> bool {
    let name = target.resolved.name();
    match mode {
        MatchMode::Inclusive => query.includes(name, &target.params),
        MatchMode::Exact => query.is_exactly(name, &target.params),
    }
}

/// Markers of every active target, in registration order
///
/// Markers come from the registry's key index, so duplicate keys report the
/// most recently registered marker. Duplicates are kept.
pub fn active_markers(
    registry: &TargetRegistry,
    query: &dyn StateQuery,
    mode: MatchMode,
) -> Vec<String> {
    registry
        .iter()
        .filter(|(_, target)| {
            let active = is_active(target, query, mode);
            log::trace!("{} {} active={}", mode, target.identity_key, active);
            active
        })
        .filter_map(|(_, target)| registry.marker_for_key(&target.identity_key))
        .map(str::to_string)
        .collect()
}
