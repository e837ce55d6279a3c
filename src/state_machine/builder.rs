//! Agent definition
//!
//! The builder records the first definition error it meets and reports it
//! from [`StateMachineBuilder::build`], so state definitions can be chained.
//! Nothing built here changes once `build` returns, apart from the global
//! fallback body.

use super::machine::StateMachine;
use super::state::{Body, State, Transition};
use crate::config::EngineConfig;
use crate::error::{BodyError, ConstructionError, ConstructionResult};
use crate::events::{
    file_received, image_object_detected, params, Auto, EventParams, IntentMatched, Predicate,
    VariableMatches,
};
use crate::perception::ImageEntity;
use crate::scenario::Scenario;
use crate::session::{Session, FALLBACK_INTENT};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for a [`StateMachine`]
pub struct StateMachineBuilder {
    name: String,
    states: Vec<State>,
    index: HashMap<String, usize>,
    intents: Vec<String>,
    global_fallback: Option<Arc<dyn Body>>,
    max_auto_transitions: usize,
    error: Option<ConstructionError>,
}

impl StateMachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            index: HashMap::new(),
            intents: Vec::new(),
            global_fallback: None,
            max_auto_transitions: EngineConfig::default().max_auto_transitions,
            error: None,
        }
    }

    /// Declare an intent transitions may match on
    pub fn intent(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.intents.contains(&name) {
            self.intents.push(name);
        }
        self
    }

    /// Declare a new state. Declaring the same name twice is an error.
    pub fn new_state(&mut self, name: impl Into<String>) -> StateBuilder<'_> {
        let name = name.into();
        let idx = match self.index.get(&name).copied() {
            Some(idx) => {
                self.record(ConstructionError::DuplicateState(name));
                idx
            }
            None => self.insert_state(name),
        };
        StateBuilder { machine: self, idx }
    }

    /// Reopen a declared state to add transitions or bodies
    pub fn state(&mut self, name: &str) -> StateBuilder<'_> {
        let idx = if let Some(idx) = self.index.get(name).copied() {
            idx
        } else {
            self.record(ConstructionError::StateNotFound(name.to_string()));
            self.insert_state(name.to_string())
        };
        StateBuilder { machine: self, idx }
    }

    /// Fallback body for states that do not define their own
    pub fn global_fallback_body<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&mut Session) -> Result<(), BodyError> + Send + Sync + 'static,
    {
        self.global_fallback = Some(Arc::new(body));
        self
    }

    /// Upper bound on auto transitions followed in one step
    pub fn max_auto_transitions(&mut self, max: usize) -> &mut Self {
        self.max_auto_transitions = max;
        self
    }

    pub fn with_config(&mut self, config: &EngineConfig) -> &mut Self {
        self.max_auto_transitions(config.max_auto_transitions)
    }

    /// Validate the graph and freeze it
    pub fn build(self) -> ConstructionResult<StateMachine> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut initial: Option<usize> = None;
        for (idx, state) in self.states.iter().enumerate() {
            if state.initial {
                if let Some(first) = initial {
                    return Err(ConstructionError::MultipleInitialStates {
                        first: self.states[first].name.clone(),
                        second: state.name.clone(),
                    });
                }
                initial = Some(idx);
            }

            if state.transitions.len() > 1 && state.transitions.iter().any(Transition::is_auto) {
                return Err(ConstructionError::ConflictingAutoTransition(state.name.clone()));
            }

            for transition in &state.transitions {
                if !self.index.contains_key(&transition.dest) {
                    return Err(ConstructionError::StateNotFound(transition.dest.clone()));
                }
            }

            for intent in &state.intents {
                if intent != FALLBACK_INTENT && !self.intents.contains(intent) {
                    return Err(ConstructionError::IntentNotFound(intent.clone()));
                }
            }
        }
        let initial = initial.ok_or(ConstructionError::NoInitialState)?;

        tracing::debug!(
            agent = %self.name,
            states = self.states.len(),
            initial = %self.states[initial].name,
            "State machine built"
        );

        Ok(StateMachine::new(
            self.name,
            self.states,
            self.index,
            initial,
            self.intents,
            self.global_fallback,
            self.max_auto_transitions,
        ))
    }

    fn insert_state(&mut self, name: String) -> usize {
        let idx = self.states.len();
        self.index.insert(name.clone(), idx);
        self.states.push(State::new(name));
        idx
    }

    fn record(&mut self, error: ConstructionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Chained definition of one state
pub struct StateBuilder<'a> {
    machine: &'a mut StateMachineBuilder,
    idx: usize,
}

impl StateBuilder<'_> {
    fn state(&mut self) -> &mut State {
        &mut self.machine.states[self.idx]
    }

    pub fn initial(mut self) -> Self {
        self.state().initial = true;
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), BodyError> + Send + Sync + 'static,
    {
        self.state().body = Some(Arc::new(body));
        self
    }

    pub fn fallback_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), BodyError> + Send + Sync + 'static,
    {
        self.state().fallback_body = Some(Arc::new(body));
        self
    }

    /// Transition guarded by any predicate
    pub fn when_event_go_to<P>(self, event: P, dest: &str, params: EventParams) -> Self
    where
        P: Predicate + 'static,
    {
        self.push_transition(Arc::new(event), dest, params)
    }

    /// Unconditional transition, followed as soon as this state's body has run.
    /// It must be the state's only transition.
    pub fn go_to(self, dest: &str) -> Self {
        self.push_transition(Arc::new(Auto), dest, EventParams::new())
    }

    pub fn when_intent_matched_go_to(mut self, intent: &str, dest: &str) -> Self {
        if self.state().intents.iter().any(|i| i == intent) {
            let state = self.state().name.clone();
            self.machine.record(ConstructionError::DuplicatedIntentTransition {
                state,
                intent: intent.to_string(),
            });
            return self;
        }
        self.state().intents.push(intent.to_string());
        self.push_transition(
            Arc::new(IntentMatched),
            dest,
            params(json!({ "intent": intent })),
        )
    }

    /// Transition taken when the classifier predicted the fallback intent
    pub fn when_no_intent_matched_go_to(self, dest: &str) -> Self {
        self.push_transition(
            Arc::new(IntentMatched),
            dest,
            params(json!({ "intent": FALLBACK_INTENT })),
        )
    }

    pub fn when_variable_matches_operation_go_to(
        self,
        var_name: &str,
        operation: VariableMatches,
        target: impl Into<Value>,
        dest: &str,
    ) -> Self {
        let target: Value = target.into();
        self.push_transition(
            Arc::new(operation),
            dest,
            params(json!({ "var_name": var_name, "target": target })),
        )
    }

    /// Transition on a received file, optionally restricted to some MIME types
    pub fn when_file_received_go_to(self, dest: &str, allowed_types: Option<&[&str]>) -> Self {
        let params = match allowed_types {
            Some(types) => params(json!({ "allowed_types": types })),
            None => EventParams::new(),
        };
        self.push_transition(Arc::new(file_received), dest, params)
    }

    pub fn when_image_object_detected_go_to(self, entity: &ImageEntity, score: f64, dest: &str) -> Self {
        self.push_transition(
            Arc::new(image_object_detected),
            dest,
            params(json!({ "entity": entity.name(), "score": score })),
        )
    }

    pub fn when_scenario_matched_go_to(self, scenario: Arc<Scenario>, dest: &str) -> Self {
        self.push_transition(scenario, dest, EventParams::new())
    }

    fn push_transition(mut self, event: Arc<dyn Predicate>, dest: &str, params: EventParams) -> Self {
        let state = self.state();
        let transition = Transition {
            name: state.next_transition_name(),
            source: state.name.clone(),
            dest: dest.to_string(),
            event,
            params,
        };
        state.transitions.push(transition);
        self
    }
}
