use crate::model::{AnomalyModel, ModelError, Prediction, Scaler};

use super::features::FeatureVector;

/// Boundary to the pre-trained model: applies the fitted normalization and
/// submits the result. Both artifacts are loaded once at startup; the
/// adapter never retrains and never substitutes a default score on failure.
pub struct ScoringAdapter {
    scaler: Scaler,
    model: Box<dyn AnomalyModel>,
}

impl ScoringAdapter {
    pub fn new(scaler: Scaler, model: Box<dyn AnomalyModel>) -> Self {
        Self { scaler, model }
    }

    pub fn score(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        let normalized = self.scaler.transform(&features.to_array());
        self.model.score(&normalized)
    }
}
