//! Scenarios: named boolean conditions over perception thresholds
//!
//! A [`Scenario`] owns one [`Expression`] tree. Inner nodes are AND/OR/NOT
//! [`BooleanExpression`]s, leaves are [`ScenarioRequirement`]s that count or
//! detect predictions in the session's latest perception snapshot.
//! Trees are immutable once built and evaluation only reads the session, so a
//! scenario can be shared by every session of an agent.
//!
//! The snapshot is kept until the next image arrives, so a scenario still
//! matches on steps driven by messages, files or events. Guards that should
//! only react to a new photo check [`flag::IMAGE_PREDICTION`] as well.
//!
//! [`flag::IMAGE_PREDICTION`]: crate::session::flag::IMAGE_PREDICTION

mod expression;
mod requirement;

#[cfg(test)]
mod proptests;

pub use expression::{BooleanExpression, BooleanOperator, Expression};
pub use requirement::{
    count_satisfies, EntityThreshold, ScenarioImageEntity, ScenarioImageProperty,
    ScenarioRequirement,
};

use crate::session::Session;
use std::fmt;

/// A named, reusable condition usable as a transition guard
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    expression: Expression,
}

impl Scenario {
    pub fn new(name: impl Into<String>, expression: impl Into<Expression>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn evaluate(&self, session: &Session) -> bool {
        let matched = self.expression.evaluate(session);
        tracing::trace!(scenario = %self.name, session_id = %session.id(), matched, "Scenario evaluated");
        matched
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}
