pub mod iforest;
pub mod scaler;

use std::fmt;
use std::path::Path;

use ndarray::Array1;
use serde::Serialize;
use thiserror::Error;

pub use iforest::IsolationForest;
pub use scaler::Scaler;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model artifact: {0}")]
    Invalid(String),
    #[error("feature vector has {got} entries, model expects {expected}")]
    Shape { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Normal,
    Anomaly,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => write!(f, "normal"),
            Label::Anomaly => write!(f, "anomaly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Continuous anomaly score; more negative means more anomalous.
    pub score: f64,
    pub label: Label,
}

/// Boundary to the pre-trained anomaly classifier. The engine never looks
/// inside an implementation; it submits a normalized feature vector and
/// takes the label and score back.
pub trait AnomalyModel: Send {
    fn score(&self, features: &Array1<f64>) -> Result<Prediction, ModelError>;
}

/// Loads the fitted classifier artifact. Missing or corrupt artifacts are
/// startup errors; the capture loop never runs without a usable model.
pub fn load_model(path: &Path) -> Result<Box<dyn AnomalyModel>, ModelError> {
    Ok(Box::new(IsolationForest::from_file(path)?))
}
