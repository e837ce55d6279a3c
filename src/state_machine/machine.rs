//! The built dialogue machine
//!
//! A [`StateMachine`] is immutable once built and shared by every session of
//! an agent. The global fallback body is the one exception: it sits behind a
//! lock so it can be swapped while sessions are running, and each step works
//! from a snapshot of it.

use super::state::{Body, State};
use crate::error::BodyError;
use crate::session::Session;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

pub struct StateMachine {
    name: String,
    states: Vec<State>,
    index: HashMap<String, usize>,
    initial: usize,
    intents: Vec<String>,
    global_fallback: RwLock<Option<Arc<dyn Body>>>,
    max_auto_transitions: usize,
}

impl StateMachine {
    pub(crate) fn new(
        name: String,
        states: Vec<State>,
        index: HashMap<String, usize>,
        initial: usize,
        intents: Vec<String>,
        global_fallback: Option<Arc<dyn Body>>,
        max_auto_transitions: usize,
    ) -> Self {
        Self {
            name,
            states,
            index,
            initial,
            intents,
            global_fallback: RwLock::new(global_fallback),
            max_auto_transitions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &State {
        &self.states[self.initial]
    }

    pub fn get_state(&self, name: &str) -> Option<&State> {
        self.index.get(name).map(|idx| &self.states[*idx])
    }

    /// States in declaration order
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    pub fn intents(&self) -> &[String] {
        &self.intents
    }

    pub fn max_auto_transitions(&self) -> usize {
        self.max_auto_transitions
    }

    /// A fresh session positioned at the initial state. Its body has not run
    /// yet; see [`StateMachine::start`].
    pub fn new_session(&self, id: impl Into<String>) -> Session {
        Session::new(id, self.initial_state().name())
    }

    /// Replace the global fallback body. Steps already running keep the body
    /// they started with.
    pub fn set_global_fallback_body<F>(&self, body: F)
    where
        F: Fn(&mut Session) -> Result<(), BodyError> + Send + Sync + 'static,
    {
        *self.global_fallback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(body));
    }

    pub fn clear_global_fallback_body(&self) {
        *self.global_fallback.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_global_fallback_body(&self) -> bool {
        self.global_fallback_snapshot().is_some()
    }

    pub(crate) fn global_fallback_snapshot(&self) -> Option<Arc<dyn Body>> {
        self.global_fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn state_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn state_at(&self, idx: usize) -> &State {
        &self.states[idx]
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("initial", &self.initial_state().name())
            .field("states", &self.states)
            .field("intents", &self.intents)
            .field("max_auto_transitions", &self.max_auto_transitions)
            .finish_non_exhaustive()
    }
}
