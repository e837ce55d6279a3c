//! Transition guards
//!
//! A [`Predicate`] looks at a session and the static parameters of the
//! transition it guards and answers whether the transition fires. Predicates
//! never mutate the session, and a predicate that depends on a flag that is
//! not set returns `false`.

use crate::scenario::Scenario;
use crate::session::{flag, Session};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Static parameters attached to a transition
pub type EventParams = Map<String, Value>;

/// Build [`EventParams`] from a JSON object. Anything else yields no parameters.
pub fn params(value: Value) -> EventParams {
    match value {
        Value::Object(map) => map,
        _ => EventParams::new(),
    }
}

/// Capability used to guard a transition
pub trait Predicate: Send + Sync {
    fn check(&self, session: &Session, params: &EventParams) -> bool;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this is the unconditional predicate. Auto transitions are
    /// followed right after a body runs.
    fn is_auto(&self) -> bool {
        false
    }

    /// Whether this predicate waits for the user's next message. The check
    /// that runs after a body stops at the first such transition.
    fn awaits_message(&self) -> bool {
        false
    }
}

impl<F> Predicate for F
where
    F: Fn(&Session, &EventParams) -> bool + Send + Sync,
{
    fn check(&self, session: &Session, params: &EventParams) -> bool {
        self(session, params)
    }
}

/// Scenarios guard transitions directly; parameters are ignored
impl Predicate for Scenario {
    fn check(&self, session: &Session, _params: &EventParams) -> bool {
        self.evaluate(session)
    }

    fn name(&self) -> &str {
        Scenario::name(self)
    }
}

// ============================================================================
// Library
// ============================================================================

/// Always true
#[derive(Debug, Clone, Copy, Default)]
pub struct Auto;

impl Predicate for Auto {
    fn check(&self, _session: &Session, _params: &EventParams) -> bool {
        true
    }

    fn name(&self) -> &str {
        "auto"
    }

    fn is_auto(&self) -> bool {
        true
    }
}

/// Free-function form of [`Auto`]
pub fn auto(_session: &Session, _params: &EventParams) -> bool {
    true
}

/// [`intent_matched`] as a transition event. The session waits for a new
/// message before it is evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentMatched;

impl Predicate for IntentMatched {
    fn check(&self, session: &Session, params: &EventParams) -> bool {
        intent_matched(session, params)
    }

    fn name(&self) -> &str {
        "intent_matched"
    }

    fn awaits_message(&self) -> bool {
        true
    }
}

/// `params.intent` equals the session's predicted intent.
/// Only meaningful while the `predicted_intent` flag is set.
pub fn intent_matched(session: &Session, params: &EventParams) -> bool {
    if !session.flags().get(flag::PREDICTED_INTENT) {
        return false;
    }
    let Some(target) = params.get("intent").and_then(Value::as_str) else {
        return false;
    };
    session
        .predicted_intent()
        .is_some_and(|prediction| prediction.intent == target)
}

/// A file was just received. If `params.allowed_types` is given (a MIME type
/// or a list of them) the file's type must be one of them.
pub fn file_received(session: &Session, params: &EventParams) -> bool {
    if !session.flags().get(flag::FILE) {
        return false;
    }
    let Some(file) = session.file() else {
        return false;
    };
    match params.get("allowed_types") {
        None | Some(Value::Null) => true,
        Some(Value::String(allowed)) => *allowed == file.mime_type,
        Some(Value::Array(allowed)) => allowed
            .iter()
            .any(|t| t.as_str() == Some(file.mime_type.as_str())),
        Some(_) => false,
    }
}

/// An object prediction for `params.entity` (entity name) scored at least `params.score`
pub fn image_object_detected(session: &Session, params: &EventParams) -> bool {
    if !session.flags().get(flag::IMAGE_PREDICTION) {
        return false;
    }
    let (Some(entity), Some(score)) = (
        params.get("entity").and_then(Value::as_str),
        params.get("score").and_then(Value::as_f64),
    ) else {
        return false;
    };
    session.image_prediction().is_some_and(|prediction| {
        prediction
            .objects
            .iter()
            .any(|p| p.entity.name() == entity && p.score >= score)
    })
}

/// An external event named `params.event` was just raised
pub fn event_matched(session: &Session, params: &EventParams) -> bool {
    if !session.flags().get(flag::EVENT) {
        return false;
    }
    let Some(target) = params.get("event").and_then(Value::as_str) else {
        return false;
    };
    session.event().is_some_and(|event| event.name == target)
}

// ============================================================================
// Variable comparison
// ============================================================================

type Operation = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Applies a binary relation to session variable `params.var_name` and
/// `params.target`. An unset variable never matches.
#[derive(Clone)]
pub struct VariableMatches {
    operation: Arc<Operation>,
}

impl VariableMatches {
    pub fn new<F>(operation: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            operation: Arc::new(operation),
        }
    }

    pub fn comparison(comparison: Comparison) -> Self {
        Self::new(move |current, target| comparison.apply(current, target))
    }
}

impl std::fmt::Debug for VariableMatches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableMatches").finish_non_exhaustive()
    }
}

impl Predicate for VariableMatches {
    fn check(&self, session: &Session, params: &EventParams) -> bool {
        let Some(var_name) = params.get("var_name").and_then(Value::as_str) else {
            return false;
        };
        let Some(current) = session.get(var_name) else {
            return false;
        };
        let target = params.get("target").unwrap_or(&Value::Null);
        (self.operation)(current, target)
    }

    fn name(&self) -> &str {
        "variable_matches_operation"
    }
}

/// Common relations for [`VariableMatches`]. Ordering relations compare
/// numbers numerically and strings lexicographically; other pairs never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn apply(self, current: &Value, target: &Value) -> bool {
        use std::cmp::Ordering;

        let ordering = match (current, target) {
            (Value::Number(a), Value::Number(b)) => a
                .as_f64()
                .zip(b.as_f64())
                .and_then(|(a, b)| a.partial_cmp(&b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match self {
            Comparison::Eq => ordering.map_or(current == target, |o| o == Ordering::Equal),
            Comparison::Ne => ordering.map_or(current != target, |o| o != Ordering::Equal),
            Comparison::Lt => ordering == Some(Ordering::Less),
            Comparison::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Comparison::Gt => ordering == Some(Ordering::Greater),
            Comparison::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}
