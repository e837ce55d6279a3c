//! Recognizable image entities and properties
//!
//! Identity is the name alone: two entities with the same name are the same
//! entity no matter what attributes they carry. `Hash`, `Eq` and `Borrow<str>`
//! all follow the name, so either can key a map looked up by `&str`.

use super::attribute::{find_value, parse_attributes, Attribute, AttributeValue, OwnerKind};
use crate::error::ConstructionResult;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An object class the agent can detect in an image (e.g. "dog")
#[derive(Debug, Clone)]
pub struct ImageEntity {
    name: String,
    attributes: Vec<Attribute>,
}

impl ImageEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Create an entity with attributes validated against the `ImageEntity` dictionary
    pub fn with_attributes<I, K, V>(name: impl Into<String>, attributes: I) -> ConstructionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        Ok(Self {
            name: name.into(),
            attributes: parse_attributes(OwnerKind::ImageEntity, attributes)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_value(&self, name: &str) -> Option<&AttributeValue> {
        find_value(&self.attributes, name)
    }

    pub fn description(&self) -> Option<&str> {
        self.attribute_value("description").and_then(AttributeValue::as_str)
    }
}

impl PartialEq for ImageEntity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ImageEntity {}

impl Hash for ImageEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Borrow<str> for ImageEntity {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ImageEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A whole-image property the agent can detect (e.g. "sunny", "crowded")
#[derive(Debug, Clone)]
pub struct ImageProperty {
    name: String,
    attributes: Vec<Attribute>,
}

impl ImageProperty {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Create a property with attributes validated against the `ImageProperty` dictionary
    pub fn with_attributes<I, K, V>(name: impl Into<String>, attributes: I) -> ConstructionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        Ok(Self {
            name: name.into(),
            attributes: parse_attributes(OwnerKind::ImageProperty, attributes)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_value(name).is_some()
    }

    pub fn attribute_value(&self, name: &str) -> Option<&AttributeValue> {
        find_value(&self.attributes, name)
    }

    pub fn description(&self) -> Option<&str> {
        self.attribute_value("description").and_then(AttributeValue::as_str)
    }
}

impl PartialEq for ImageProperty {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ImageProperty {}

impl Hash for ImageProperty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Borrow<str> for ImageProperty {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ImageProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
