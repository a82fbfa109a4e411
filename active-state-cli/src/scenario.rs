//! Scenario execution
//!
//! Builds a router and the configured trackers, replays the navigation
//! steps and records what each tracker renders after every step.

use crate::config::{ScenarioConfig, TrackerEntry};
use active_state::{
    params_from_value, ActiveStateTracker, Collaborators, Element, Params, StateContext,
    StateLink, StateRouter,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Outcome of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub source: PathBuf,
    pub steps: Vec<StepReport>,
}

/// Tracker output after one navigation step
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Current state after the step ("" before any navigation)
    pub state: String,
    /// Current params, as JSON
    pub params: String,
    pub trackers: Vec<TrackerSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub id: String,
    pub markers: Vec<String>,
    pub class_name: Option<String>,
    pub render_requests: u64,
}

/// A mounted tracker together with the element it wraps and its links
struct MountedTracker {
    id: String,
    tracker: ActiveStateTracker,
    child: Rc<Element>,
    links: Vec<StateLink>,
}

impl MountedTracker {
    fn build(entry: &TrackerEntry, router: &Rc<StateRouter>) -> Result<Self> {
        let mut tracker = ActiveStateTracker::new(
            entry.tracker_config(),
            Collaborators::from_router(router.clone()),
        );
        if let Some(context) = &entry.context {
            tracker = tracker.with_context(StateContext::at(context.as_str()));
        }
        tracker
            .mount()
            .with_context(|| format!("Failed to mount tracker {:?}", entry.id))?;

        for target in &entry.targets {
            let params = params_from_value(target.params.clone())
                .with_context(|| format!("Tracker {:?}: bad params for {:?}", entry.id, target.state))?;
            tracker
                .add_target(&target.state, params, &target.marker)
                .with_context(|| format!("Tracker {:?}: cannot track {:?}", entry.id, target.state))?;
        }

        let mut child = Element::new("li");
        if let Some(class) = &entry.child_class {
            child = child.with_class(class.as_str());
        }

        let mut links = Vec::with_capacity(entry.links.len());
        for link_config in &entry.links {
            let params = params_from_value(link_config.params.clone())
                .with_context(|| format!("Tracker {:?}: bad params for {:?}", entry.id, link_config.state))?;
            let mut link = StateLink::new(link_config.state.as_str(), params)
                .within(tracker.registration());
            link.mount()
                .with_context(|| format!("Tracker {:?}: cannot mount link {:?}", entry.id, link_config.state))?;
            if !link.is_registered() {
                log::info!(
                    "Tracker {:?}: link to {:?} ignored by configured states",
                    entry.id,
                    link_config.state
                );
            }

            let label = link_config.label.as_deref().unwrap_or(&link_config.state);
            child = child.with_child(link.element(label));
            links.push(link);
        }

        log::debug!("Tracker {:?} tracks {} targets", entry.id, tracker.target_count());
        Ok(Self {
            id: entry.id.clone(),
            tracker,
            child: Rc::new(child),
            links,
        })
    }

    fn snapshot(&self) -> Result<TrackerSnapshot> {
        let rendered = self
            .tracker
            .render(&[self.child.clone()])
            .with_context(|| format!("Failed to render tracker {:?}", self.id))?;
        Ok(TrackerSnapshot {
            id: self.id.clone(),
            markers: self.tracker.active_markers(),
            class_name: rendered.class_name.clone(),
            render_requests: self.tracker.render_requests(),
        })
    }

    fn teardown(mut self) {
        for link in &mut self.links {
            link.unmount();
        }
        self.tracker.unmount();
    }
}

fn step_report(router: &StateRouter, trackers: &[MountedTracker]) -> Result<StepReport> {
    Ok(StepReport {
        state: router.current_name(),
        params: serde_json::Value::Object(router.current_params()).to_string(),
        trackers: trackers
            .iter()
            .map(MountedTracker::snapshot)
            .collect::<Result<Vec<_>>>()?,
    })
}

/// Run a scenario end to end
pub fn run_scenario(scenario: &ScenarioConfig, source: &Path) -> Result<ScenarioReport> {
    let name = scenario
        .name
        .clone()
        .unwrap_or_else(|| source.display().to_string());
    log::info!("Running scenario {:?}", name);

    let router = Rc::new(
        StateRouter::with_states(&scenario.states)
            .with_context(|| format!("Scenario {:?}: invalid state catalog", name))?,
    );

    let trackers = scenario
        .trackers
        .iter()
        .map(|entry| MountedTracker::build(entry, &router))
        .collect::<Result<Vec<_>>>()?;

    let mut steps = vec![step_report(&router, &trackers)?];
    for (index, step) in scenario.steps.iter().enumerate() {
        let params: Params = params_from_value(step.params.clone())
            .with_context(|| format!("Step {}: bad params", index + 1))?;
        router
            .go(&step.go, params)
            .with_context(|| format!("Step {}: cannot navigate to {:?}", index + 1, step.go))?;
        steps.push(step_report(&router, &trackers)?);
    }

    for tracker in trackers {
        tracker.teardown();
    }
    log::debug!("Scenario {:?} finished, {} subscribers left", name, router.hub().subscriber_count());

    Ok(ScenarioReport {
        name,
        source: source.to_path_buf(),
        steps,
    })
}
