//! Error types
//!
//! Construction errors are fatal to agent setup and surface before any session
//! exists. Evaluation never errors: missing session data reads as `false`.

use crate::perception::attribute::{AttributeKind, OwnerKind};
use crate::scenario::BooleanOperator;
use thiserror::Error;

/// Errors raised while defining the agent (vocabulary, scenarios, state graph)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("'{name}' is not a valid {owner} attribute. Allowed attributes are: {allowed}")]
    UnknownAttribute {
        owner: OwnerKind,
        name: String,
        allowed: String,
    },

    #[error("'{name}' {owner} attribute must be of type '{expected}', not '{found}'")]
    AttributeType {
        owner: OwnerKind,
        name: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    #[error("Operator {operator} requires {expected} expression(s), got {found}")]
    Arity {
        operator: BooleanOperator,
        expected: &'static str,
        found: usize,
    },

    #[error("Please, provide the 'score' attribute for '{0}'")]
    MissingScore(String),

    #[error("Error creating {name}: {reason}")]
    InvalidRange { name: String, reason: &'static str },

    #[error("State '{0}' is defined more than once")]
    DuplicateState(String),

    #[error("State '{0}' not found")]
    StateNotFound(String),

    #[error("Intent '{0}' not found")]
    IntentNotFound(String),

    #[error("State '{state}' already has a transition on intent '{intent}'")]
    DuplicatedIntentTransition { state: String, intent: String },

    #[error("State '{0}' mixes an auto transition with other transitions")]
    ConflictingAutoTransition(String),

    #[error("No initial state defined")]
    NoInitialState,

    #[error("More than one initial state: '{first}' and '{second}'")]
    MultipleInitialStates { first: String, second: String },
}

/// Error returned by a state body. Logged by the engine; the step still completes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BodyError(pub String);

impl BodyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for BodyError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BodyError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Errors from the session runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session {0} is closed")]
    SessionClosed(String),
}

pub type ConstructionResult<T> = Result<T, ConstructionError>;
