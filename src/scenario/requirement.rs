//! Threshold leaves of a scenario expression
//!
//! Missing perception data is never an error here: a session without a
//! snapshot simply does not satisfy any requirement.

use crate::error::{ConstructionError, ConstructionResult};
use crate::perception::attribute::{parse_attributes, Attribute, AttributeValue, OwnerKind};
use crate::perception::{ImageEntity, ImageProperty};
use crate::session::Session;
use std::fmt;

/// Leaf predicate of a scenario expression
#[derive(Debug, Clone)]
pub enum ScenarioRequirement {
    ImageEntity(ScenarioImageEntity),
    ImageProperty(ScenarioImageProperty),
}

impl ScenarioRequirement {
    pub fn name(&self) -> &str {
        match self {
            ScenarioRequirement::ImageEntity(r) => &r.name,
            ScenarioRequirement::ImageProperty(r) => &r.name,
        }
    }

    pub fn evaluate(&self, session: &Session) -> bool {
        match self {
            ScenarioRequirement::ImageEntity(r) => r.evaluate(session),
            ScenarioRequirement::ImageProperty(r) => r.evaluate(session),
        }
    }
}

impl fmt::Display for ScenarioRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ScenarioImageEntity> for ScenarioRequirement {
    fn from(requirement: ScenarioImageEntity) -> Self {
        ScenarioRequirement::ImageEntity(requirement)
    }
}

impl From<ScenarioImageProperty> for ScenarioRequirement {
    fn from(requirement: ScenarioImageProperty) -> Self {
        ScenarioRequirement::ImageProperty(requirement)
    }
}

/// Count bounds for an entity requirement. `max == 0` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityThreshold {
    pub score: f64,
    pub min: u32,
    pub max: u32,
}

impl EntityThreshold {
    pub const DEFAULT_MIN: u32 = 1;
    pub const DEFAULT_MAX: u32 = 0;

    /// At least one detection, no upper bound
    pub fn at_least_one(score: f64) -> Self {
        Self {
            score,
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }

    fn validate(self, name: &str) -> ConstructionResult<Self> {
        if self.min < 1 {
            return Err(ConstructionError::InvalidRange {
                name: name.to_string(),
                reason: "min must be > 0",
            });
        }
        if self.min > self.max && self.max != 0 {
            return Err(ConstructionError::InvalidRange {
                name: name.to_string(),
                reason: "min must be <= max (unless max = 0)",
            });
        }
        Ok(self)
    }
}

/// Decide whether `count` qualifying detections satisfy `min`/`max`.
///
/// `0` is overloaded: `min == 0` disables the lower bound and `max == 0` the
/// upper one. The branch order below is part of the contract.
pub fn count_satisfies(min: u32, max: u32, count: usize) -> bool {
    if count == 0 {
        return false;
    }
    let count = u64::try_from(count).unwrap_or(u64::MAX);
    let (min, max) = (u64::from(min), u64::from(max));
    if min == 0 && max == 0 {
        return true;
    }
    if min == 0 && count <= max {
        return true;
    }
    if max == 0 && count >= min {
        return true;
    }
    min <= count && count <= max
}

/// "Between `min` and `max` instances of `entity` detected with score >= `score`"
#[derive(Debug, Clone)]
pub struct ScenarioImageEntity {
    name: String,
    entity: ImageEntity,
    threshold: EntityThreshold,
}

impl ScenarioImageEntity {
    /// Requirement with the default bounds (at least one, unbounded)
    pub fn new(name: impl Into<String>, entity: ImageEntity, score: f64) -> Self {
        Self {
            name: name.into(),
            entity,
            threshold: EntityThreshold::at_least_one(score),
        }
    }

    pub fn with_threshold(
        name: impl Into<String>,
        entity: ImageEntity,
        threshold: EntityThreshold,
    ) -> ConstructionResult<Self> {
        let name = name.into();
        let threshold = threshold.validate(&name)?;
        Ok(Self {
            name,
            entity,
            threshold,
        })
    }

    /// Build from a `score`/`min`/`max` attribute list. `score` is mandatory,
    /// `min` defaults to 1 and `max` to 0.
    pub fn from_attributes<I, K, V>(
        name: impl Into<String>,
        entity: ImageEntity,
        attributes: I,
    ) -> ConstructionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let name = name.into();
        let attributes = parse_attributes(OwnerKind::ScenarioImageEntity, attributes)?;
        let score = float_attribute(&attributes, "score")
            .ok_or_else(|| ConstructionError::MissingScore(name.clone()))?;
        let min = count_attribute(&attributes, "min", &name, "min must be > 0")?
            .unwrap_or(EntityThreshold::DEFAULT_MIN);
        let max = count_attribute(&attributes, "max", &name, "max must be >= 0")?
            .unwrap_or(EntityThreshold::DEFAULT_MAX);
        Self::with_threshold(name, entity, EntityThreshold { score, min, max })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &ImageEntity {
        &self.entity
    }

    pub fn threshold(&self) -> EntityThreshold {
        self.threshold
    }

    pub fn evaluate(&self, session: &Session) -> bool {
        let Some(prediction) = session.image_prediction() else {
            return false;
        };
        let count = prediction
            .objects_matching(&self.entity, self.threshold.score)
            .count();
        count_satisfies(self.threshold.min, self.threshold.max, count)
    }
}

/// "`property` detected with score >= `score`"
#[derive(Debug, Clone)]
pub struct ScenarioImageProperty {
    name: String,
    property: ImageProperty,
    score: f64,
}

impl ScenarioImageProperty {
    pub fn new(name: impl Into<String>, property: ImageProperty, score: f64) -> Self {
        Self {
            name: name.into(),
            property,
            score,
        }
    }

    /// Build from an attribute list; only `score` is allowed and it is mandatory
    pub fn from_attributes<I, K, V>(
        name: impl Into<String>,
        property: ImageProperty,
        attributes: I,
    ) -> ConstructionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let name = name.into();
        let attributes = parse_attributes(OwnerKind::ScenarioImageProperty, attributes)?;
        let score = float_attribute(&attributes, "score")
            .ok_or_else(|| ConstructionError::MissingScore(name.clone()))?;
        Ok(Self::new(name, property, score))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self) -> &ImageProperty {
        &self.property
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn evaluate(&self, session: &Session) -> bool {
        session
            .image_prediction()
            .is_some_and(|prediction| prediction.has_property(&self.property, self.score))
    }
}

fn float_attribute(attributes: &[Attribute], name: &str) -> Option<f64> {
    attributes
        .iter()
        .find(|a| a.name() == name)
        .and_then(|a| a.value().as_float())
}

fn count_attribute(
    attributes: &[Attribute],
    name: &str,
    owner_name: &str,
    reason: &'static str,
) -> ConstructionResult<Option<u32>> {
    let Some(value) = attributes
        .iter()
        .find(|a| a.name() == name)
        .and_then(|a| a.value().as_int())
    else {
        return Ok(None);
    };
    u32::try_from(value)
        .map(Some)
        .map_err(|_| ConstructionError::InvalidRange {
            name: owner_name.to_string(),
            reason,
        })
}
