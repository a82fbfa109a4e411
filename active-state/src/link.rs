//! Nested state links
//!
//! A [`StateLink`] is an element pointing at a state. When it is built
//! inside a tracker's subtree it receives that tracker's [`Registration`]
//! and declares its target on mount, withdrawing it again on unmount.

use crate::render::Element;
use crate::tracker::{Registration, RemovalHandle};
use crate::types::{Params, Result, TrackerError};
use serde_json::Value;
use std::rc::Rc;

/// A link to a navigational state
#[derive(Debug)]
pub struct StateLink {
    state_name: String,
    params: Params,
    registration: Option<Registration>,
    handle: Option<RemovalHandle>,
}

impl StateLink {
    /// Create a link to `state_name` with `params`
    pub fn new(state_name: impl Into<String>, params: Params) -> Self {
        Self {
            state_name: state_name.into(),
            params,
            registration: None,
            handle: None,
        }
    }

    /// Builder method: place the link inside a tracker's subtree
    pub fn within(mut self, registration: Registration) -> Self {
        self.registration = Some(registration);
        self
    }

    /// Target state name
    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    /// Target params
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// True while the enclosing tracker holds this link's target
    pub fn is_registered(&self) -> bool {
        self.handle.is_some()
    }

    /// Declare the target on the enclosing tracker, if any
    ///
    /// A link without an enclosing tracker, or whose tracker shadows it,
    /// mounts without registering anything.
    pub fn mount(&mut self) -> Result<()> {
        if self.state_name.is_empty() {
            return Err(TrackerError::InvalidTarget);
        }
        if self.handle.is_some() {
            return Err(TrackerError::Lifecycle("link is already mounted".into()));
        }
        if let Some(registration) = &self.registration {
            self.handle = registration.register(&self.state_name, self.params.clone())?;
        }
        Ok(())
    }

    /// Withdraw the target; safe to call repeatedly
    pub fn unmount(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.remove() {
                // The tracker may already be gone
                log::debug!("Link to {:?} already withdrawn: {}", self.state_name, e);
            }
        }
    }

    /// The anchor element this link renders
    pub fn element(&self, label: &str) -> Rc<Element> {
        let mut anchor = Element::new("a")
            .with_attribute("data-state", self.state_name.as_str())
            .with_text(label);
        if !self.params.is_empty() {
            anchor = anchor.with_attribute("data-params", Value::Object(self.params.clone()).to_string());
        }
        Rc::new(anchor)
    }
}

impl Drop for StateLink {
    fn drop(&mut self) {
        self.unmount();
    }
}
