//! States, transitions and bodies

use crate::error::BodyError;
use crate::events::{EventParams, Predicate};
use crate::session::Session;
use std::fmt;
use std::sync::Arc;

/// Action run when a state is entered (body) or when nothing fires (fallback body)
pub trait Body: Send + Sync {
    fn run(&self, session: &mut Session) -> Result<(), BodyError>;
}

impl<F> Body for F
where
    F: Fn(&mut Session) -> Result<(), BodyError> + Send + Sync,
{
    fn run(&self, session: &mut Session) -> Result<(), BodyError> {
        self(session)
    }
}

/// Guarded edge between two states
#[derive(Clone)]
pub struct Transition {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) dest: String,
    pub(crate) event: Arc<dyn Predicate>,
    pub(crate) params: EventParams,
}

impl Transition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn params(&self) -> &EventParams {
        &self.params
    }

    pub fn event_name(&self) -> &str {
        self.event.name()
    }

    pub fn is_auto(&self) -> bool {
        self.event.is_auto()
    }

    pub fn awaits_message(&self) -> bool {
        self.event.awaits_message()
    }

    pub fn is_event_true(&self, session: &Session) -> bool {
        self.event.check(session, &self.params)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("dest", &self.dest)
            .field("event", &self.event.name())
            .field("params", &self.params)
            .finish()
    }
}

/// A node of the dialogue machine
#[derive(Clone)]
pub struct State {
    pub(crate) name: String,
    pub(crate) initial: bool,
    pub(crate) body: Option<Arc<dyn Body>>,
    pub(crate) fallback_body: Option<Arc<dyn Body>>,
    pub(crate) transitions: Vec<Transition>,
    /// Intents this state already has an intent-matching transition for
    pub(crate) intents: Vec<String>,
}

impl State {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: false,
            body: None,
            fallback_body: None,
            transitions: Vec::new(),
            intents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn has_fallback_body(&self) -> bool {
        self.fallback_body.is_some()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The state's auto transition, if its only transition is one
    pub fn auto_transition(&self) -> Option<&Transition> {
        self.transitions.first().filter(|t| t.is_auto())
    }

    pub(crate) fn next_transition_name(&self) -> String {
        format!("t_{}", self.transitions.len() + 1)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("has_body", &self.body.is_some())
            .field("has_fallback_body", &self.fallback_body.is_some())
            .field("transitions", &self.transitions)
            .finish()
    }
}
