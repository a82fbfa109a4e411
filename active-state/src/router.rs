//! In-memory navigational-state services
//!
//! [`StateCatalog`] holds a dotted-name state tree, [`TransitionHub`] fans
//! out success notifications, and [`StateRouter`] ties them together with
//! the current state. Together they implement every service contract in
//! [`crate::state`], which makes the tracker usable without a host framework.

use crate::state::{
    StateContext, StateQuery, StateResolver, SubscriptionHandle, TransitionFeed, TransitionFilter,
};
use crate::types::{Params, ResolvedState, Result, TrackerError};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Registry of known states, keyed by fully qualified dotted name
#[derive(Debug, Clone, Default)]
pub struct StateCatalog {
    states: BTreeMap<String, ResolvedState>,
}

impl StateCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state; its parent (if any) must already be registered
    ///
    /// Registering the same name twice is a no-op.
    pub fn register(&mut self, name: &str) -> Result<()> {
        if name.is_empty() || name.split('.').any(str::is_empty) {
            return Err(TrackerError::InvalidStateName(name.to_string()));
        }

        let state = ResolvedState::new(name);
        if let Some(parent) = &state.parent {
            if !self.states.contains_key(parent) {
                return Err(TrackerError::UnknownParent(name.to_string()));
            }
        }

        log::trace!("Catalog register: {}", name);
        self.states.entry(name.to_string()).or_insert(state);
        Ok(())
    }

    /// Look up a fully qualified name
    pub fn get(&self, name: &str) -> Option<&ResolvedState> {
        self.states.get(name)
    }

    /// Number of registered states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no state is registered
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Resolve an absolute or relative name against `context`
    pub fn resolve(&self, name: &str, context: &StateContext) -> Option<ResolvedState> {
        let qualified = qualify(name, context)?;
        self.states.get(&qualified).cloned()
    }
}

/// Turn a possibly relative state name into a fully qualified one
///
/// `.child` descends from the context, `^` climbs to its parent and the two
/// chain (`^.^.sibling`). Climbing above the root yields `None`.
pub fn qualify(name: &str, context: &StateContext) -> Option<String> {
    if !name.starts_with('.') && !name.starts_with('^') {
        return Some(name.to_string());
    }

    let mut path: Vec<&str> = if context.is_root() {
        Vec::new()
    } else {
        context.base().split('.').collect()
    };

    let mut rest = name;
    if let Some(stripped) = rest.strip_prefix('.') {
        rest = stripped;
    } else {
        while let Some(stripped) = rest.strip_prefix('^') {
            path.pop()?;
            rest = stripped;
            match rest.strip_prefix('.') {
                Some(after_dot) if after_dot.starts_with('^') => rest = after_dot,
                Some(after_dot) => {
                    rest = after_dot;
                    break;
                }
                None => break,
            }
        }
    }

    if !rest.is_empty() {
        path.extend(rest.split('.'));
    }
    if path.is_empty() || path.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(path.join("."))
}

struct Subscriber {
    handle: SubscriptionHandle,
    filter: TransitionFilter,
    callback: Rc<dyn Fn()>,
}

/// Process-wide fan-out of successful-transition notifications
///
/// Callbacks are delivered in subscription order, one at a time. The
/// subscriber list is not borrowed while a callback runs, so callbacks may
/// subscribe, release or publish.
#[derive(Default)]
pub struct TransitionHub {
    subscribers: RefCell<Vec<Subscriber>>,
    next_handle: Cell<u64>,
}

impl TransitionHub {
    /// Create a hub with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// True while `handle` has not been released
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|subscriber| subscriber.handle == handle)
    }

    /// Notify every matching subscriber of a transition; returns how many ran
    pub fn publish(&self, from: &str, to: &str) -> usize {
        let pending: Vec<(SubscriptionHandle, Rc<dyn Fn()>)> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|subscriber| subscriber.filter.matches(from, to))
            .map(|subscriber| (subscriber.handle, subscriber.callback.clone()))
            .collect();

        let mut delivered = 0;
        for (handle, callback) in pending {
            // Released by an earlier callback in this round
            if !self.is_subscribed(handle) {
                continue;
            }
            callback();
            delivered += 1;
        }
        log::trace!("Transition {:?} -> {:?} delivered to {}", from, to, delivered);
        delivered
    }
}

impl TransitionFeed for TransitionHub {
    fn subscribe(&self, filter: TransitionFilter, callback: Rc<dyn Fn()>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            handle,
            filter,
            callback,
        });
        log::debug!("Subscribed {}", handle);
        handle
    }

    fn release(&self, handle: SubscriptionHandle) {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.handle != handle);
        if subscribers.len() < before {
            log::debug!("Released {}", handle);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CurrentState {
    name: String,
    params: Params,
}

/// Catalog + current state + transition hub
///
/// The router starts at the root (empty name). [`StateRouter::go`] is the
/// only way the current state changes.
#[derive(Default)]
pub struct StateRouter {
    catalog: RefCell<StateCatalog>,
    current: RefCell<CurrentState>,
    hub: TransitionHub,
}

impl StateRouter {
    /// Create a router over an existing catalog
    pub fn new(catalog: StateCatalog) -> Self {
        Self {
            catalog: RefCell::new(catalog),
            current: RefCell::default(),
            hub: TransitionHub::new(),
        }
    }

    /// Build a router from a list of state names, parents first
    pub fn with_states<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = StateCatalog::new();
        for name in names {
            catalog.register(name.as_ref())?;
        }
        Ok(Self::new(catalog))
    }

    /// Register another state
    pub fn register_state(&self, name: &str) -> Result<()> {
        self.catalog.borrow_mut().register(name)
    }

    /// Navigate to `name` (relative names resolve against the current state)
    ///
    /// On success the current state is updated before subscribers are told.
    pub fn go(&self, name: &str, params: Params) -> Result<()> {
        let context = StateContext::at(self.current_name());
        let target = self
            .catalog
            .borrow()
            .resolve(name, &context)
            .ok_or_else(|| TrackerError::UnknownState(name.to_string()))?;

        let from = {
            let mut current = self.current.borrow_mut();
            let from = std::mem::replace(&mut current.name, target.name.clone());
            current.params = params;
            from
        };

        log::debug!("Transition {:?} -> {:?}", from, target.name);
        self.hub.publish(&from, &target.name);
        Ok(())
    }

    /// Fully qualified name of the current state ("" at the root)
    pub fn current_name(&self) -> String {
        self.current.borrow().name.clone()
    }

    /// Params of the current state
    pub fn current_params(&self) -> Params {
        self.current.borrow().params.clone()
    }

    /// The transition hub
    pub fn hub(&self) -> &TransitionHub {
        &self.hub
    }
}

impl StateResolver for StateRouter {
    fn resolve(&self, name: &str, context: &StateContext) -> Option<ResolvedState> {
        self.catalog.borrow().resolve(name, context)
    }
}

impl StateQuery for StateRouter {
    fn includes(&self, state_name: &str, params: &Params) -> bool {
        let current = self.current.borrow();
        let in_branch = current.name == state_name
            || current
                .name
                .strip_prefix(state_name)
                .map_or(false, |rest| rest.starts_with('.'));

        in_branch
            && params
                .iter()
                .all(|(key, value)| current.params.get(key) == Some(value))
    }

    fn is_exactly(&self, state_name: &str, params: &Params) -> bool {
        let current = self.current.borrow();
        current.name == state_name && current.params == *params
    }
}

impl TransitionFeed for StateRouter {
    fn subscribe(&self, filter: TransitionFilter, callback: Rc<dyn Fn()>) -> SubscriptionHandle {
        self.hub.subscribe(filter, callback)
    }

    fn release(&self, handle: SubscriptionHandle) {
        self.hub.release(handle)
    }
}
