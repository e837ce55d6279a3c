//! Perception snapshots produced by recognition collaborators

use super::{ImageEntity, ImageProperty};

/// One detected object with its confidence
#[derive(Debug, Clone)]
pub struct ImageObjectPrediction {
    pub entity: ImageEntity,
    pub score: f64,
}

/// One detected whole-image property with its confidence
#[derive(Debug, Clone)]
pub struct ImagePropertyPrediction {
    pub property: ImageProperty,
    pub score: f64,
}

/// Result of one recognition pass over an image
#[derive(Debug, Clone, Default)]
pub struct ImagePrediction {
    pub objects: Vec<ImageObjectPrediction>,
    pub properties: Vec<ImagePropertyPrediction>,
}

impl ImagePrediction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, entity: ImageEntity, score: f64) -> Self {
        self.objects.push(ImageObjectPrediction { entity, score });
        self
    }

    pub fn with_property(mut self, property: ImageProperty, score: f64) -> Self {
        self.properties.push(ImagePropertyPrediction { property, score });
        self
    }

    /// Object predictions for `entity` with a score of at least `min_score`
    pub fn objects_matching<'a>(
        &'a self,
        entity: &'a ImageEntity,
        min_score: f64,
    ) -> impl Iterator<Item = &'a ImageObjectPrediction> + 'a {
        self.objects
            .iter()
            .filter(move |prediction| prediction.entity == *entity && prediction.score >= min_score)
    }

    /// Whether `property` was detected with a score of at least `min_score`
    pub fn has_property(&self, property: &ImageProperty, min_score: f64) -> bool {
        self.properties
            .iter()
            .any(|prediction| prediction.property == *property && prediction.score >= min_score)
    }
}
