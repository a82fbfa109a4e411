//! Navigational-state service contracts
//!
//! The tracker does not own navigation. It consumes three services through
//! the traits below: resolving state names, querying the current state, and
//! subscribing to successful transitions. [`crate::router::StateRouter`] is
//! an in-memory implementation of all three.

use crate::types::{Params, ResolvedState};
use std::fmt;
use std::rc::Rc;

/// Base against which relative state names are resolved
///
/// An empty base is the root of the state tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateContext {
    base: String,
}

impl StateContext {
    /// The root context
    pub fn root() -> Self {
        Self::default()
    }

    /// A context rooted at the given fully qualified state
    pub fn at(state_name: impl Into<String>) -> Self {
        Self {
            base: state_name.into(),
        }
    }

    /// Fully qualified name of the base state ("" for the root)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// True for the root context
    pub fn is_root(&self) -> bool {
        self.base.is_empty()
    }
}

/// Turns a state name (absolute or relative) into a catalog state
pub trait StateResolver {
    /// Resolve `name` against `context`; unknown names yield `None`
    fn resolve(&self, name: &str, context: &StateContext) -> Option<ResolvedState>;

    /// Context used when the caller has no ancestor context
    fn root_context(&self) -> StateContext {
        StateContext::root()
    }
}

/// Answers questions about the current navigational state
pub trait StateQuery {
    /// Current state is `state_name` or a descendant, and every param in
    /// `params` equals the current value
    fn includes(&self, state_name: &str, params: &Params) -> bool;

    /// Current state is exactly `state_name` with exactly `params`
    fn is_exactly(&self, state_name: &str, params: &Params) -> bool;
}

/// Opaque token identifying one transition subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub(crate) u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Criteria restricting which transitions reach a subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionFilter {
    /// Only transitions entering this state
    pub to: Option<String>,
    /// Only transitions leaving this state
    pub from: Option<String>,
}

impl TransitionFilter {
    /// Filter matching every transition
    pub fn any() -> Self {
        Self::default()
    }

    /// Builder method: restrict to transitions entering `state_name`
    pub fn to(mut self, state_name: impl Into<String>) -> Self {
        self.to = Some(state_name.into());
        self
    }

    /// Builder method: restrict to transitions leaving `state_name`
    pub fn from(mut self, state_name: impl Into<String>) -> Self {
        self.from = Some(state_name.into());
        self
    }

    /// Check a transition against this filter
    pub fn matches(&self, from: &str, to: &str) -> bool {
        self.to.as_deref().map_or(true, |want| want == to)
            && self.from.as_deref().map_or(true, |want| want == from)
    }
}

/// Source of successful-transition notifications
pub trait TransitionFeed {
    /// Register `callback`; it runs with no payload after every matching
    /// successful transition until released
    fn subscribe(&self, filter: TransitionFilter, callback: Rc<dyn Fn()>) -> SubscriptionHandle;

    /// Stop delivering to `handle`; releasing twice is a no-op
    fn release(&self, handle: SubscriptionHandle);
}

/// The services a tracker depends on
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Rc<dyn StateResolver>,
    pub query: Rc<dyn StateQuery>,
    pub transitions: Rc<dyn TransitionFeed>,
}

impl Collaborators {
    /// Bundle separately implemented services
    pub fn new(
        resolver: Rc<dyn StateResolver>,
        query: Rc<dyn StateQuery>,
        transitions: Rc<dyn TransitionFeed>,
    ) -> Self {
        Self {
            resolver,
            query,
            transitions,
        }
    }

    /// Use one object implementing every service
    pub fn from_router<R>(router: Rc<R>) -> Self
    where
        R: StateResolver + StateQuery + TransitionFeed + 'static,
    {
        Self {
            resolver: router.clone(),
            query: router.clone(),
            transitions: router,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
