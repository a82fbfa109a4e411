//! Active State Library
//!
//! Tracks a set of target navigational states and reports which of them are
//! active, so that the element wrapping them can be marked (typically with a
//! CSS class).
//!
//! # Architecture
//!
//! - [`ActiveStateTracker`] holds an ordered registry of (state, params,
//!   marker) targets, fed by its own configuration and by nested
//!   [`StateLink`]s through an explicit [`Registration`] capability
//! - While mounted it subscribes to the transition feed and requests a
//!   recomputation after every successful transition
//! - Matching is inclusive (state or descendant) or exact
//! - Rendering merges active markers into a single child element
//!
//! The library does NOT:
//! - Decide where to navigate
//! - Render DOM or UI primitives
//!
//! Navigation services are consumed through the traits in [`state`];
//! [`StateRouter`] is an in-memory implementation of all of them.
//!
//! # Example Usage
//!
//! ```
//! use active_state::{
//!     ActiveStateTracker, Collaborators, Element, Params, StateLink, StateRouter, TrackerConfig,
//! };
//! use std::rc::Rc;
//!
//! let router = Rc::new(StateRouter::with_states(["home", "home.settings"]).unwrap());
//! let tracker = ActiveStateTracker::new(
//!     TrackerConfig::new().with_marker("active"),
//!     Collaborators::from_router(router.clone()),
//! );
//! tracker.mount().unwrap();
//!
//! let mut link = StateLink::new("home", Params::new()).within(tracker.registration());
//! link.mount().unwrap();
//!
//! router.go("home.settings", Params::new()).unwrap();
//! let rendered = tracker.render(&[link.element("Home")]).unwrap();
//! assert_eq!(rendered.class_name.as_deref(), Some("active"));
//!
//! link.unmount();
//! tracker.unmount();
//! ```

// Public modules
pub mod config;
pub mod link;
pub mod matching;
pub mod registry;
pub mod render;
pub mod router;
pub mod state;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use config::{MarkerConfig, TrackerConfig};
pub use link::StateLink;
pub use matching::MatchMode;
pub use registry::TargetRegistry;
pub use render::{class_names, Element};
pub use router::{StateCatalog, StateRouter, TransitionHub};
pub use state::{
    Collaborators, StateContext, StateQuery, StateResolver, SubscriptionHandle, TransitionFeed,
    TransitionFilter,
};
pub use tracker::{ActiveStateTracker, Lifecycle, Registration, RemovalHandle};
pub use types::{
    identity_key, params_from_value, Params, ResolvedState, ResolvedTarget, Result, TargetId,
    TrackedTarget, TrackerError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh tracker tracks nothing
        let router = Rc::new(StateRouter::default());
        let tracker = ActiveStateTracker::new(
            TrackerConfig::new(),
            Collaborators::from_router(router),
        );
        assert_eq!(tracker.target_count(), 0);
        assert!(tracker.active_markers().is_empty());
    }
}
