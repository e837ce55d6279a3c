//! Type-checked attributes
//!
//! Every owner kind has a closed dictionary of attribute names and their
//! expected value types. An [`Attribute`] can only be built if its name is in
//! the owner's dictionary and its value has the declared type.

use crate::error::{ConstructionError, ConstructionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of component that carry attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    ImageEntity,
    ImageProperty,
    ScenarioImageEntity,
    ScenarioImageProperty,
}

impl OwnerKind {
    /// Allowed attribute names and their value types
    pub fn dictionary(self) -> &'static [(&'static str, AttributeKind)] {
        match self {
            OwnerKind::ImageEntity | OwnerKind::ImageProperty => {
                &[("description", AttributeKind::Str)]
            }
            OwnerKind::ScenarioImageEntity => &[
                ("score", AttributeKind::Float),
                ("min", AttributeKind::Int),
                ("max", AttributeKind::Int),
            ],
            OwnerKind::ScenarioImageProperty => &[("score", AttributeKind::Float)],
        }
    }

    fn expected_kind(self, name: &str) -> Option<AttributeKind> {
        self.dictionary()
            .iter()
            .find(|(allowed, _)| *allowed == name)
            .map(|(_, kind)| *kind)
    }

    fn describe_dictionary(self) -> String {
        self.dictionary()
            .iter()
            .map(|(name, kind)| format!("{name}: {kind}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnerKind::ImageEntity => "ImageEntity",
            OwnerKind::ImageProperty => "ImageProperty",
            OwnerKind::ScenarioImageEntity => "ScenarioImageEntity",
            OwnerKind::ScenarioImageProperty => "ScenarioImageProperty",
        };
        f.write_str(name)
    }
}

/// Runtime type of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Str,
    Int,
    Float,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Str => f.write_str("str"),
            AttributeKind::Int => f.write_str("int"),
            AttributeKind::Float => f.write_str("float"),
        }
    }
}

/// An attribute value. Integers and floats are distinct types: `1` is not a valid `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Str(_) => AttributeKind::Str,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Float(_) => AttributeKind::Float,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// A validated name/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    value: AttributeValue,
}

impl Attribute {
    /// Build an attribute for `owner`, checking the name and value type against its dictionary
    pub fn new(
        owner: OwnerKind,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ConstructionResult<Self> {
        let name = name.into();
        let value = value.into();
        let Some(expected) = owner.expected_kind(&name) else {
            return Err(ConstructionError::UnknownAttribute {
                owner,
                name,
                allowed: owner.describe_dictionary(),
            });
        };
        if value.kind() != expected {
            return Err(ConstructionError::AttributeType {
                owner,
                name,
                expected,
                found: value.kind(),
            });
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

/// Validate a whole attribute list for one owner, failing on the first bad entry
pub fn parse_attributes<I, K, V>(owner: OwnerKind, attributes: I) -> ConstructionResult<Vec<Attribute>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttributeValue>,
{
    attributes
        .into_iter()
        .map(|(name, value)| Attribute::new(owner, name, value))
        .collect()
}

/// Look up an attribute value by name
pub fn find_value<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .find(|attribute| attribute.name == name)
        .map(Attribute::value)
}
