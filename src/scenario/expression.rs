//! Boolean expression tree

use super::requirement::{ScenarioImageEntity, ScenarioImageProperty, ScenarioRequirement};
use crate::error::{ConstructionError, ConstructionResult};
use crate::session::Session;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
    Not,
}

impl fmt::Display for BooleanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanOperator::And => f.write_str("AND"),
            BooleanOperator::Or => f.write_str("OR"),
            BooleanOperator::Not => f.write_str("NOT"),
        }
    }
}

/// Anything that evaluates against a session to a boolean
#[derive(Debug, Clone)]
pub enum Expression {
    Boolean(BooleanExpression),
    Requirement(ScenarioRequirement),
}

impl Expression {
    pub fn evaluate(&self, session: &Session) -> bool {
        match self {
            Expression::Boolean(expression) => expression.evaluate(session),
            Expression::Requirement(requirement) => requirement.evaluate(session),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Boolean(expression) => write!(f, "{expression}"),
            Expression::Requirement(requirement) => write!(f, "{requirement}"),
        }
    }
}

impl From<BooleanExpression> for Expression {
    fn from(expression: BooleanExpression) -> Self {
        Expression::Boolean(expression)
    }
}

impl From<ScenarioRequirement> for Expression {
    fn from(requirement: ScenarioRequirement) -> Self {
        Expression::Requirement(requirement)
    }
}

impl From<ScenarioImageEntity> for Expression {
    fn from(requirement: ScenarioImageEntity) -> Self {
        Expression::Requirement(requirement.into())
    }
}

impl From<ScenarioImageProperty> for Expression {
    fn from(requirement: ScenarioImageProperty) -> Self {
        Expression::Requirement(requirement.into())
    }
}

/// AND/OR/NOT node. Arity is checked at construction and there is no way to
/// change the children afterwards.
#[derive(Debug, Clone)]
pub struct BooleanExpression {
    operator: BooleanOperator,
    expressions: Vec<Expression>,
}

impl BooleanExpression {
    /// AND and OR need at least two children, NOT exactly one
    pub fn new(operator: BooleanOperator, expressions: Vec<Expression>) -> ConstructionResult<Self> {
        match operator {
            BooleanOperator::And | BooleanOperator::Or if expressions.len() < 2 => {
                return Err(ConstructionError::Arity {
                    operator,
                    expected: "at least 2",
                    found: expressions.len(),
                });
            }
            BooleanOperator::Not if expressions.len() != 1 => {
                return Err(ConstructionError::Arity {
                    operator,
                    expected: "exactly 1",
                    found: expressions.len(),
                });
            }
            _ => {}
        }
        Ok(Self {
            operator,
            expressions,
        })
    }

    pub fn and(expressions: Vec<Expression>) -> ConstructionResult<Self> {
        Self::new(BooleanOperator::And, expressions)
    }

    pub fn or(expressions: Vec<Expression>) -> ConstructionResult<Self> {
        Self::new(BooleanOperator::Or, expressions)
    }

    pub fn not(expression: impl Into<Expression>) -> Self {
        Self {
            operator: BooleanOperator::Not,
            expressions: vec![expression.into()],
        }
    }

    pub fn operator(&self) -> BooleanOperator {
        self.operator
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Left to right, short-circuiting
    pub fn evaluate(&self, session: &Session) -> bool {
        match self.operator {
            BooleanOperator::And => self.expressions.iter().all(|e| e.evaluate(session)),
            BooleanOperator::Or => self.expressions.iter().any(|e| e.evaluate(session)),
            BooleanOperator::Not => !self.expressions[0].evaluate(session),
        }
    }
}

impl fmt::Display for BooleanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.operator)?;
        for (i, expression) in self.expressions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{expression}")?;
        }
        f.write_str("]")
    }
}
