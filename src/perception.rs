//! Perception vocabulary and prediction snapshots
//!
//! Entities and properties are declared once per agent. Recognition
//! collaborators attach an [`ImagePrediction`] to a session; scenario leaves
//! and the `image_object_detected` event read it.

pub mod attribute;
mod entity;
mod prediction;

pub use attribute::{Attribute, AttributeKind, AttributeValue, OwnerKind};
pub use entity::{ImageEntity, ImageProperty};
pub use prediction::{ImageObjectPrediction, ImagePrediction, ImagePropertyPrediction};
