//! Scenario state machine.
//!
//! Each scenario holds exactly one current state. A scenario starts unset, which
//! is treated as the implicit `"Started"` state, and only moves when a matched
//! mapping declares a next state. The table lives inside the server's locked
//! state, so a transition is visible to every request accepted after it.

use serde::Serialize;
use std::collections::BTreeMap;

/// Implicit state of a scenario that has never transitioned.
pub const STARTED: &str = "Started";

/// Snapshot of one scenario, as served by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub name: String,
    /// Current state; `None` until the first transition
    pub state: Option<String>,
    /// True once the scenario has transitioned at least once
    pub started: bool,
    pub transitions: u64,
}

impl ScenarioState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: None,
            started: false,
            transitions: 0,
        }
    }

    pub fn current(&self) -> &str {
        self.state.as_deref().unwrap_or(STARTED)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScenarioTable {
    scenarios: BTreeMap<String, ScenarioState>,
}

impl ScenarioTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a scenario known without changing its state.
    pub fn ensure(&mut self, name: &str) {
        if !self.scenarios.contains_key(name) {
            self.scenarios
                .insert(name.to_string(), ScenarioState::new(name));
        }
    }

    /// Current state of `name`, `"Started"` when unknown or unset.
    pub fn current(&self, name: &str) -> &str {
        self.scenarios
            .get(name)
            .map(ScenarioState::current)
            .unwrap_or(STARTED)
    }

    /// Whether a mapping bound to `scenario` and requiring `required` may match now.
    pub fn is_eligible(&self, scenario: Option<&str>, required: Option<&str>) -> bool {
        match (scenario, required) {
            (Some(name), Some(required)) => self.current(name) == required,
            _ => true,
        }
    }

    /// Move `name` to `next`.
    pub fn transition(&mut self, name: &str, next: &str) {
        self.ensure(name);
        if let Some(scenario) = self.scenarios.get_mut(name) {
            scenario.state = Some(next.to_string());
            scenario.started = true;
            scenario.transitions += 1;
        }
    }

    /// Return every scenario to its initial state, keeping the names.
    pub fn reset(&mut self) {
        for scenario in self.scenarios.values_mut() {
            *scenario = ScenarioState::new(&scenario.name);
        }
    }

    /// Reset a single scenario. Returns false when it is unknown.
    pub fn reset_one(&mut self, name: &str) -> bool {
        match self.scenarios.get_mut(name) {
            Some(scenario) => {
                *scenario = ScenarioState::new(name);
                true
            }
            None => false,
        }
    }

    /// Forget every scenario.
    pub fn clear(&mut self) {
        self.scenarios.clear();
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioState> {
        self.scenarios.get(name)
    }

    pub fn list(&self) -> Vec<ScenarioState> {
        self.scenarios.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_scenario_is_started() {
        let table = ScenarioTable::new();
        assert_eq!(table.current("login"), STARTED);
        assert!(table.is_eligible(Some("login"), Some("Started")));
        assert!(!table.is_eligible(Some("login"), Some("LoggedIn")));
    }

    #[test]
    fn test_no_required_state_is_always_eligible() {
        let mut table = ScenarioTable::new();
        assert!(table.is_eligible(Some("s"), None));
        table.transition("s", "S1");
        assert!(table.is_eligible(Some("s"), None));
        assert!(table.is_eligible(None, None));
    }

    #[test]
    fn test_transition_and_reset() {
        let mut table = ScenarioTable::new();
        table.ensure("flow");
        table.transition("flow", "S1");
        table.transition("flow", "S2");

        let state = table.get("flow").unwrap();
        assert_eq!(state.current(), "S2");
        assert!(state.started);
        assert_eq!(state.transitions, 2);

        table.reset();
        assert_eq!(table.current("flow"), STARTED);
        assert_eq!(table.list().len(), 1);
        assert!(!table.get("flow").unwrap().started);

        table.clear();
        assert!(table.list().is_empty());
    }

    #[test]
    fn test_state_comparison_is_case_sensitive() {
        let mut table = ScenarioTable::new();
        table.transition("s", "Done");
        assert!(!table.is_eligible(Some("s"), Some("done")));
    }

    #[test]
    fn test_reset_one() {
        let mut table = ScenarioTable::new();
        table.transition("a", "X");
        table.transition("b", "Y");
        assert!(table.reset_one("a"));
        assert!(!table.reset_one("missing"));
        assert_eq!(table.current("a"), STARTED);
        assert_eq!(table.current("b"), "Y");
    }
}
