//! The active-state tracker
//!
//! [`ActiveStateTracker`] owns a [`TargetRegistry`], subscribes to the
//! transition feed while mounted, and renders its single child with the
//! markers of whichever targets are currently active.
//!
//! # Lifecycle
//!
//! ```text
//! Fresh ──mount()──▶ Mounted ──unmount()──▶ TornDown
//! ```
//!
//! `Fresh` and `TornDown` are both unmounted; only the first can be mounted.
//! Targets may be registered while `Fresh` or `Mounted`.
//!
//! # Recomputation requests
//!
//! Every registry mutation and every transition notification counts as a
//! recomputation request and invokes the host's render hook, if one is set.
//! Markers themselves are computed lazily by [`ActiveStateTracker::active_markers`]
//! and [`ActiveStateTracker::render`].

use crate::config::{MarkerConfig, TrackerConfig};
use crate::matching;
use crate::registry::TargetRegistry;
use crate::render::{self, Element};
use crate::state::{Collaborators, StateContext, SubscriptionHandle, TransitionFilter};
use crate::types::{
    identity_key, Params, ResolvedTarget, Result, TargetId, TrackedTarget, TrackerError,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Where a tracker is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built but not yet mounted
    Fresh,
    /// Mounted and subscribed to transitions
    Mounted,
    /// Unmounted; terminal
    TornDown,
}

struct TrackerState {
    config: TrackerConfig,
    context: Option<StateContext>,
    registry: TargetRegistry,
    /// Targets seeded from explicit per-state configuration
    configured: Vec<TargetId>,
    subscription: Option<SubscriptionHandle>,
    lifecycle: Lifecycle,
}

struct Shared {
    state: RefCell<TrackerState>,
    services: Collaborators,
    render_hook: RefCell<Option<Rc<dyn Fn()>>>,
    render_requests: Cell<u64>,
}

impl Shared {
    /// Record a recomputation request and notify the host
    ///
    /// Must not be called while `state` is borrowed: the hook may render.
    fn request_render(&self) {
        self.render_requests.set(self.render_requests.get() + 1);
        log::trace!("Render requested ({})", self.render_requests.get());
        let hook = self.render_hook.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn on_transition(&self) {
        if self.state.borrow().lifecycle != Lifecycle::Mounted {
            return;
        }
        self.request_render();
    }

    /// Resolve and append a target without requesting a render
    fn insert_target(&self, state_name: &str, params: Params, marker: &str) -> Result<TargetId> {
        if state_name.is_empty() {
            return Err(TrackerError::InvalidTarget);
        }

        let mut state = self.state.borrow_mut();
        if state.lifecycle == Lifecycle::TornDown {
            log::warn!("Ignoring registration of {:?} after unmount", state_name);
            return Err(TrackerError::Unmounted);
        }

        let resolver = &self.services.resolver;
        let context = state
            .context
            .clone()
            .unwrap_or_else(|| resolver.root_context());
        let resolved = match resolver.resolve(state_name, &context) {
            Some(found) => ResolvedTarget::Resolved(found),
            None => {
                log::debug!(
                    "State {:?} not found from {:?}, matching by name",
                    state_name,
                    context.base()
                );
                ResolvedTarget::NameOnly(state_name.to_string())
            }
        };

        let target = TrackedTarget {
            state_name: state_name.to_string(),
            identity_key: identity_key(state_name, &params),
            params,
            marker: marker.to_string(),
            resolved,
        };
        log::debug!("Tracking {} with marker {:?}", target.identity_key, marker);
        Ok(state.registry.insert(target))
    }

    fn add_target(&self, state_name: &str, params: Params, marker: &str) -> Result<TargetId> {
        let id = self.insert_target(state_name, params, marker)?;
        self.request_render();
        Ok(id)
    }

    fn remove_target(&self, id: TargetId) -> Result<()> {
        let torn_down = {
            let mut state = self.state.borrow_mut();
            state.registry.remove(id)?;
            state.configured.retain(|configured| *configured != id);
            state.lifecycle == Lifecycle::TornDown
        };
        if !torn_down {
            self.request_render();
        }
        Ok(())
    }

    /// Registration coming from a nested link
    ///
    /// Returns `None` when the registration is shadowed by explicit
    /// configuration or the configuration has no marker for the state.
    fn register_nested(&self, state_name: &str, params: Params) -> Result<Option<TargetId>> {
        if state_name.is_empty() {
            return Err(TrackerError::InvalidTarget);
        }

        let marker = {
            let state = self.state.borrow();
            // Before mount the configured states are not seeded yet but still win
            let awaiting_seed =
                state.lifecycle == Lifecycle::Fresh && state.config.marker.has_states();
            let shadowed = awaiting_seed
                || (state.config.marker.is_per_state()
                    && state
                        .configured
                        .iter()
                        .any(|id| state.registry.contains(*id)));
            if shadowed {
                log::debug!("Nested target {:?} shadowed by configured states", state_name);
                return Ok(None);
            }
            match state.config.marker.marker_for(state_name) {
                Some(marker) => marker.to_string(),
                None => {
                    log::debug!("No marker configured for nested target {:?}", state_name);
                    return Ok(None);
                }
            }
        };

        self.add_target(state_name, params, &marker).map(Some)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().subscription.take() {
            self.services.transitions.release(handle);
        }
    }
}

/// Capability that removes exactly one tracked target
///
/// Invoking it a second time fails with [`TrackerError::StaleTarget`].
#[derive(Clone)]
pub struct RemovalHandle {
    id: TargetId,
    owner: Weak<Shared>,
}

impl RemovalHandle {
    /// Id of the target this handle removes
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Remove the target from its tracker
    pub fn remove(&self) -> Result<()> {
        match self.owner.upgrade() {
            Some(shared) => shared.remove_target(self.id),
            None => Err(TrackerError::StaleTarget(self.id)),
        }
    }
}

impl fmt::Debug for RemovalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalHandle")
            .field("id", &self.id)
            .field("live", &(self.owner.strong_count() > 0))
            .finish()
    }
}

/// Channel through which nested elements declare targets to their tracker
///
/// Handed down explicitly by whoever builds the tracker's subtree. Holds a
/// weak reference, so it never keeps a dropped tracker alive.
#[derive(Clone)]
pub struct Registration {
    owner: Weak<Shared>,
}

impl Registration {
    /// Declare a target on the enclosing tracker
    ///
    /// `Ok(None)` means the tracker chose to ignore it (shadowed).
    pub fn register(&self, state_name: &str, params: Params) -> Result<Option<RemovalHandle>> {
        let shared = self.owner.upgrade().ok_or(TrackerError::Unmounted)?;
        let id = shared.register_nested(state_name, params)?;
        Ok(id.map(|id| RemovalHandle {
            id,
            owner: self.owner.clone(),
        }))
    }

    /// True while the tracker still exists
    pub fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Tracks target states and applies markers to its child while they are active
pub struct ActiveStateTracker {
    shared: Rc<Shared>,
}

impl ActiveStateTracker {
    /// Create an unmounted tracker
    pub fn new(config: TrackerConfig, services: Collaborators) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(TrackerState {
                    config,
                    context: None,
                    registry: TargetRegistry::new(),
                    configured: Vec::new(),
                    subscription: None,
                    lifecycle: Lifecycle::Fresh,
                }),
                services,
                render_hook: RefCell::new(None),
                render_requests: Cell::new(0),
            }),
        }
    }

    /// Builder method: resolve relative names against an ancestor context
    pub fn with_context(self, context: StateContext) -> Self {
        self.shared.state.borrow_mut().context = Some(context);
        self
    }

    /// Install the host callback run on every recomputation request
    pub fn on_render_request(&self, hook: impl Fn() + 'static) {
        *self.shared.render_hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Seed configured targets and subscribe to transitions
    pub fn mount(&self) -> Result<()> {
        let (config, lifecycle) = {
            let state = self.shared.state.borrow();
            (state.config.clone(), state.lifecycle)
        };
        match lifecycle {
            Lifecycle::Fresh => {}
            Lifecycle::Mounted => {
                return Err(TrackerError::Lifecycle("tracker is already mounted".into()))
            }
            Lifecycle::TornDown => {
                return Err(TrackerError::Lifecycle(
                    "an unmounted tracker cannot be mounted again".into(),
                ))
            }
        }

        if let MarkerConfig::PerState(states) = &config.marker {
            for (state_name, marker) in states {
                if state_name.is_empty() {
                    continue;
                }
                let id = self
                    .shared
                    .insert_target(state_name, Params::new(), marker)?;
                self.shared.state.borrow_mut().configured.push(id);
            }
        }

        let weak = Rc::downgrade(&self.shared);
        let handle = self.shared.services.transitions.subscribe(
            TransitionFilter::any(),
            Rc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_transition();
                }
            }),
        );

        {
            let mut state = self.shared.state.borrow_mut();
            state.subscription = Some(handle);
            state.lifecycle = Lifecycle::Mounted;
            log::debug!(
                "Tracker mounted ({} mode, {} targets, {})",
                state.config.match_mode(),
                state.registry.len(),
                handle
            );
        }
        Ok(())
    }

    /// Release the transition subscription; safe to call repeatedly
    pub fn unmount(&self) {
        let handle = {
            let mut state = self.shared.state.borrow_mut();
            if state.lifecycle == Lifecycle::TornDown {
                return;
            }
            state.lifecycle = Lifecycle::TornDown;
            state.subscription.take()
        };
        if let Some(handle) = handle {
            self.shared.services.transitions.release(handle);
        }
        log::debug!("Tracker unmounted");
    }

    /// Current lifecycle stage
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.borrow().lifecycle
    }

    /// True between `mount` and `unmount`
    pub fn is_mounted(&self) -> bool {
        self.lifecycle() == Lifecycle::Mounted
    }

    /// Track `state_name` with `params`, applying `marker` while active
    pub fn add_target(
        &self,
        state_name: &str,
        params: Params,
        marker: &str,
    ) -> Result<RemovalHandle> {
        let id = self.shared.add_target(state_name, params, marker)?;
        Ok(RemovalHandle {
            id,
            owner: Rc::downgrade(&self.shared),
        })
    }

    /// Remove a target by id
    pub fn remove_target(&self, id: TargetId) -> Result<()> {
        self.shared.remove_target(id)
    }

    /// Capability to hand to nested elements
    pub fn registration(&self) -> Registration {
        Registration {
            owner: Rc::downgrade(&self.shared),
        }
    }

    /// Markers of the currently active targets, in registration order
    pub fn active_markers(&self) -> Vec<String> {
        let state = self.shared.state.borrow();
        matching::active_markers(
            &state.registry,
            self.shared.services.query.as_ref(),
            state.config.match_mode(),
        )
    }

    /// Render `children` (exactly one element) with the active markers
    pub fn render(&self, children: &[Rc<Element>]) -> Result<Rc<Element>> {
        let markers = self.active_markers();
        render::merge_markers(children, &markers)
    }

    /// Tracked targets in registration order
    pub fn targets(&self) -> Vec<TrackedTarget> {
        self.shared.state.borrow().registry.targets()
    }

    /// Snapshot of the identity key → marker index
    pub fn markers_by_key(&self) -> HashMap<String, String> {
        self.shared.state.borrow().registry.markers_by_key().clone()
    }

    /// Number of tracked targets
    pub fn target_count(&self) -> usize {
        self.shared.state.borrow().registry.len()
    }

    /// Recomputation requests issued so far
    pub fn render_requests(&self) -> u64 {
        self.shared.render_requests.get()
    }

    /// The tracker's configuration
    pub fn config(&self) -> TrackerConfig {
        self.shared.state.borrow().config.clone()
    }
}

impl fmt::Debug for ActiveStateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("ActiveStateTracker")
            .field("lifecycle", &state.lifecycle)
            .field("targets", &state.registry.len())
            .field("mode", &state.config.match_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::StateRouter;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Params {
        crate::types::params_from_value(value).unwrap()
    }

    fn setup(config: TrackerConfig) -> (Rc<StateRouter>, ActiveStateTracker) {
        let router = Rc::new(
            StateRouter::with_states([
                "a",
                "b",
                "home",
                "home.settings",
                "home.settings.profile",
                "settings",
                "about",
            ])
            .unwrap(),
        );
        let tracker = ActiveStateTracker::new(config, Collaborators::from_router(router.clone()));
        (router, tracker)
    }

    #[test]
    fn test_empty_state_name_is_rejected() {
        let (_router, tracker) = setup(TrackerConfig::new().with_marker("active"));
        assert_eq!(
            tracker.add_target("", Params::new(), "active").unwrap_err(),
            TrackerError::InvalidTarget
        );
        assert_eq!(tracker.target_count(), 0);
        assert_eq!(tracker.render_requests(), 0);
    }

    #[test]
    fn test_add_then_remove_round_trips() {
        let (_router, tracker) = setup(TrackerConfig::new().with_marker("active"));
        tracker.add_target("a", Params::new(), "m1").unwrap();
        let targets = tracker.targets();
        let markers = tracker.markers_by_key();

        let handle = tracker
            .add_target("b", params(json!({ "x": 1 })), "m2")
            .unwrap();
        handle.remove().unwrap();

        assert_eq!(tracker.targets(), targets);
        assert_eq!(tracker.markers_by_key(), markers);
        assert_eq!(handle.remove(), Err(TrackerError::StaleTarget(handle.id())));
    }

    #[test]
    fn test_unknown_state_degrades_to_name_only() {
        let (_router, tracker) = setup(TrackerConfig::new());
        tracker.add_target("not.yet", Params::new(), "m").unwrap();
        let targets = tracker.targets();
        assert_eq!(targets[0].resolved, ResolvedTarget::NameOnly("not.yet".into()));
    }

    #[test]
    fn test_relative_names_use_context() {
        let (router, tracker) = setup(TrackerConfig::new());
        let tracker = tracker.with_context(StateContext::at("home"));
        tracker.add_target(".settings", Params::new(), "on").unwrap();
        assert_eq!(tracker.targets()[0].resolved.name(), "home.settings");

        router.go("home.settings", Params::new()).unwrap();
        assert_eq!(tracker.active_markers(), vec!["on"]);
    }

    #[test]
    fn test_mutations_request_render() {
        let (_router, tracker) = setup(TrackerConfig::new());
        let hook_calls = Rc::new(Cell::new(0));
        {
            let hook_calls = hook_calls.clone();
            tracker.on_render_request(move || hook_calls.set(hook_calls.get() + 1));
        }

        let handle = tracker.add_target("a", Params::new(), "m").unwrap();
        handle.remove().unwrap();
        assert_eq!(tracker.render_requests(), 2);
        assert_eq!(hook_calls.get(), 2);
    }

    #[test]
    fn test_hook_may_render_reentrantly() {
        let (router, tracker) = setup(TrackerConfig::new());
        let tracker = Rc::new(tracker);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let weak = Rc::downgrade(&tracker);
            let seen = seen.clone();
            tracker.on_render_request(move || {
                if let Some(tracker) = weak.upgrade() {
                    seen.borrow_mut().push(tracker.active_markers());
                }
            });
        }
        tracker.mount().unwrap();
        tracker.add_target("a", Params::new(), "m").unwrap();
        router.go("a", Params::new()).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![Vec::<String>::new(), vec!["m".to_string()]]
        );
    }

    #[test]
    fn test_mount_lifecycle() {
        let (router, tracker) = setup(TrackerConfig::new());
        assert_eq!(tracker.lifecycle(), Lifecycle::Fresh);

        tracker.mount().unwrap();
        assert!(tracker.is_mounted());
        assert_eq!(router.hub().subscriber_count(), 1);
        assert!(matches!(tracker.mount(), Err(TrackerError::Lifecycle(_))));

        tracker.unmount();
        tracker.unmount();
        assert_eq!(tracker.lifecycle(), Lifecycle::TornDown);
        assert_eq!(router.hub().subscriber_count(), 0);
        assert!(matches!(tracker.mount(), Err(TrackerError::Lifecycle(_))));
    }

    #[test]
    fn test_registration_after_unmount_is_rejected() {
        let (_router, tracker) = setup(TrackerConfig::new().with_marker("active"));
        tracker.mount().unwrap();
        let registration = tracker.registration();
        tracker.unmount();

        assert_eq!(
            tracker.add_target("a", Params::new(), "m").unwrap_err(),
            TrackerError::Unmounted
        );
        assert_eq!(
            registration.register("a", Params::new()).unwrap_err(),
            TrackerError::Unmounted
        );
    }

    #[test]
    fn test_transitions_request_render_only_while_mounted() {
        let (router, tracker) = setup(TrackerConfig::new());
        router.go("a", Params::new()).unwrap();
        assert_eq!(tracker.render_requests(), 0);

        tracker.mount().unwrap();
        router.go("b", Params::new()).unwrap();
        router.go("a", Params::new()).unwrap();
        assert_eq!(tracker.render_requests(), 2);

        tracker.unmount();
        router.go("b", Params::new()).unwrap();
        assert_eq!(tracker.render_requests(), 2);
    }

    #[test]
    fn test_configured_states_shadow_nested_links() {
        let (router, tracker) = setup(
            TrackerConfig::new()
                .with_state_markers([("home", "active-home"), ("settings", "active-settings")]),
        );
        tracker.mount().unwrap();
        router.go("settings", Params::new()).unwrap();

        let before = tracker.active_markers();
        let registration = tracker.registration();
        assert!(registration.register("settings", Params::new()).unwrap().is_none());

        assert_eq!(tracker.active_markers(), before);
        assert_eq!(before, vec!["active-settings"]);
        assert_eq!(tracker.target_count(), 2);
    }

    #[test]
    fn test_registration_before_mount_is_shadowed() {
        let (router, tracker) = setup(
            TrackerConfig::new()
                .with_state_markers([("home", "active-home"), ("about", "active-about")]),
        );
        let early = tracker.registration().register("about", Params::new()).unwrap();
        assert!(early.is_none());
        assert_eq!(tracker.target_count(), 0);

        tracker.mount().unwrap();
        router.go("about", Params::new()).unwrap();
        assert_eq!(tracker.target_count(), 2);
        assert_eq!(tracker.active_markers(), vec!["active-about"]);
    }

    #[test]
    fn test_configured_states_seed_in_declaration_order() {
        let (router, tracker) =
            setup(TrackerConfig::new().with_state_markers([("^", "up"), (".profile", "down")]));
        let tracker = tracker.with_context(StateContext::at("home.settings"));
        tracker.mount().unwrap();

        router.go("home.settings.profile", Params::new()).unwrap();
        assert_eq!(tracker.active_markers(), vec!["up", "down"]);
        let targets = tracker.targets();
        let names: Vec<&str> = targets.iter().map(|t| t.resolved.name()).collect();
        assert_eq!(names, vec!["home", "home.settings.profile"]);
    }

    #[test]
    fn test_default_config_registers_no_nested_links() {
        let (router, tracker) = setup(TrackerConfig::new());
        tracker.mount().unwrap();
        assert!(tracker.registration().register("home", Params::new()).unwrap().is_none());

        router.go("home", Params::new()).unwrap();
        let child = Rc::new(Element::new("a").with_class("nav"));
        let rendered = tracker.render(&[child.clone()]).unwrap();
        assert!(Rc::ptr_eq(&child, &rendered));
    }

    #[test]
    fn test_nested_links_use_single_marker() {
        let (router, tracker) = setup(TrackerConfig::new().with_marker("active"));
        tracker.mount().unwrap();

        let handle = tracker
            .registration()
            .register("home", Params::new())
            .unwrap()
            .unwrap();
        router.go("home.settings", Params::new()).unwrap();
        assert_eq!(tracker.active_markers(), vec!["active"]);

        handle.remove().unwrap();
        assert!(tracker.active_markers().is_empty());
    }

    #[test]
    fn test_exact_mode() {
        let (router, tracker) = setup(TrackerConfig::new().with_marker("active").with_exact(true));
        tracker.mount().unwrap();
        tracker.add_target("home", Params::new(), "active").unwrap();

        router.go("home", Params::new()).unwrap();
        assert_eq!(tracker.active_markers(), vec!["active"]);

        router.go("home.settings", Params::new()).unwrap();
        assert!(tracker.active_markers().is_empty());
    }

    #[test]
    fn test_render_merges_markers() {
        let (router, tracker) = setup(TrackerConfig::new());
        tracker.mount().unwrap();
        tracker.add_target("a", Params::new(), "m1").unwrap();
        tracker.add_target("b", Params::new(), "m2").unwrap();

        let child = Rc::new(Element::new("a").with_class("link"));
        let idle = tracker.render(&[child.clone()]).unwrap();
        assert!(Rc::ptr_eq(&idle, &child));

        router.go("a", Params::new()).unwrap();
        let rendered = tracker.render(&[child.clone()]).unwrap();
        assert_eq!(rendered.class_name.as_deref(), Some("link m1"));

        assert_eq!(
            tracker.render(&[]).unwrap_err(),
            TrackerError::InvalidChild(0)
        );
    }

    #[test]
    fn test_drop_releases_subscription() {
        let (router, tracker) = setup(TrackerConfig::new());
        tracker.mount().unwrap();
        assert_eq!(router.hub().subscriber_count(), 1);

        drop(tracker);
        assert_eq!(router.hub().subscriber_count(), 0);
    }
}
