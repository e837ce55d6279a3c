//! Step engine
//!
//! A step is run after a stimulus has been applied to the session. The
//! current state's transitions are tried in declaration order and the first
//! one whose predicate holds fires; later transitions are not evaluated.
//! When none fires the state's fallback body runs, else the global fallback,
//! else nothing. A fallback never changes the current state.
//!
//! Entering a state runs its body and then checks its transitions once more:
//! an auto transition is followed, otherwise the first true guard fires,
//! unless an intent transition comes first, in which case the session waits
//! for the next message. Moves made this way share one hop limit.

use super::machine::StateMachine;
use super::state::{Body, State, Transition};
use crate::session::Session;
use serde::Serialize;
use std::sync::Arc;

/// Which fallback body handled a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackScope {
    State,
    Global,
}

/// What a step did to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutcome {
    /// A transition fired. `path` lists every state entered, starting with
    /// the transition's destination and followed by auto transitions.
    Moved {
        from: String,
        transition: String,
        path: Vec<String>,
    },
    Fallback {
        state: String,
        scope: FallbackScope,
    },
    /// Nothing fired and no fallback body exists
    NoOp { state: String },
}

impl StepOutcome {
    /// The session's state after the step
    pub fn state(&self) -> &str {
        match self {
            StepOutcome::Moved { from, path, .. } => path.last().unwrap_or(from),
            StepOutcome::Fallback { state, .. } | StepOutcome::NoOp { state } => state,
        }
    }

    pub fn moved(&self) -> bool {
        matches!(self, StepOutcome::Moved { .. })
    }
}

impl StateMachine {
    /// Run the initial body for a new session and follow auto transitions.
    /// Returns the states entered.
    pub fn start(&self, session: &mut Session) -> Vec<String> {
        let initial = self.initial_state().name().to_string();
        session.move_to(&initial);
        tracing::info!(
            agent = %self.name(),
            session_id = %session.id(),
            state = %initial,
            "Session started"
        );
        self.enter(session, initial)
    }

    /// Advance a session by one stimulus
    pub fn step(&self, session: &mut Session) -> StepOutcome {
        let current = session.current_state().to_string();
        let Some(idx) = self.state_index(&current) else {
            tracing::warn!(
                agent = %self.name(),
                session_id = %session.id(),
                state = %current,
                "Session is in a state this agent does not define"
            );
            return StepOutcome::NoOp { state: current };
        };
        let state = self.state_at(idx);

        let fired = state.transitions().iter().find(|t| t.is_event_true(session));
        if let Some(transition) = fired {
            tracing::debug!(
                session_id = %session.id(),
                transition = %transition.name(),
                event = %transition.event_name(),
                from = %current,
                to = %transition.dest(),
                "Transition fired"
            );
            let dest = transition.dest().to_string();
            let name = transition.name().to_string();
            session.move_to(&dest);
            let path = self.enter(session, dest);
            return StepOutcome::Moved {
                from: current,
                transition: name,
                path,
            };
        }

        let (body, scope) = match (&state.fallback_body, self.global_fallback_snapshot()) {
            (Some(body), _) => (Arc::clone(body), FallbackScope::State),
            (None, Some(body)) => (body, FallbackScope::Global),
            (None, None) => {
                tracing::debug!(session_id = %session.id(), state = %current, "No transition fired");
                return StepOutcome::NoOp { state: current };
            }
        };
        tracing::info!(
            session_id = %session.id(),
            state = %current,
            scope = ?scope,
            "Running fallback body"
        );
        run_body(body.as_ref(), session, &current);
        StepOutcome::Fallback {
            state: current,
            scope,
        }
    }

    /// Run the body of `state` (where the session already is) and follow
    /// the transitions that fire after it, at most `max_auto_transitions`.
    fn enter(&self, session: &mut Session, state: String) -> Vec<String> {
        let mut path = vec![state];
        let mut followed = 0;
        loop {
            let Some(current) = path.last().and_then(|name| self.get_state(name)) else {
                break;
            };
            if let Some(body) = &current.body {
                run_body(body.as_ref(), session, current.name());
            }
            let Some(next) = next_after_body(current, session) else {
                break;
            };
            if followed >= self.max_auto_transitions() {
                tracing::warn!(
                    session_id = %session.id(),
                    state = %current.name(),
                    limit = self.max_auto_transitions(),
                    "Auto transition chain cut"
                );
                break;
            }
            followed += 1;
            tracing::debug!(
                session_id = %session.id(),
                from = %current.name(),
                to = %next.dest(),
                event = %next.event_name(),
                "Transition after body"
            );
            let dest = next.dest().to_string();
            session.move_to(&dest);
            path.push(dest);
        }
        path
    }
}

/// Transition to take right after `state`'s body ran
fn next_after_body<'a>(state: &'a State, session: &Session) -> Option<&'a Transition> {
    if let Some(auto) = state.auto_transition() {
        return Some(auto);
    }
    for transition in state.transitions() {
        if transition.awaits_message() {
            return None;
        }
        if transition.is_event_true(session) {
            return Some(transition);
        }
    }
    None
}

fn run_body(body: &dyn Body, session: &mut Session, state: &str) {
    if let Err(error) = body.run(session) {
        tracing::error!(
            session_id = %session.id(),
            state = %state,
            error = %error,
            "Body failed"
        );
    }
}
