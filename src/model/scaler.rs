use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::Deserialize;

use super::ModelError;
use crate::detector::features::FEATURE_COUNT;

/// Fitted standardization parameters exported from training. Applies the
/// same `(x - mean) / scale` transform the model saw at fit time; loaded
/// once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Artifact {
            path: path.display().to_string(),
            source,
        })?;
        let scaler: Scaler = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "scaler has {} mean / {} scale entries, schema has {}",
                self.mean.len(),
                self.scale.len(),
                FEATURE_COUNT
            )));
        }
        if self.scale.iter().any(|s| *s == 0.0) {
            return Err(ModelError::Invalid(
                "scaler contains a zero scale entry".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, features: &[f64; FEATURE_COUNT]) -> Array1<f64> {
        Array1::from_iter(
            features
                .iter()
                .zip(&self.mean)
                .zip(&self.scale)
                .map(|((x, mean), scale)| (x - mean) / scale),
        )
    }
}
