use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::Deserialize;
use statrs::statistics::Statistics;

use super::{AnomalyModel, Label, ModelError, Prediction};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Inference-only isolation forest, loaded from a JSON export of the fitted
/// ensemble. Scoring follows the usual convention: the anomaly score is
/// `-2^(-E[h(x)] / c(max_samples))`, so more negative means more isolated,
/// and anything below the fitted offset is labeled anomalous.
#[derive(Debug, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    max_samples: u64,
    offset: f64,
    trees: Vec<Tree>,
}

#[derive(Debug, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: u64,
    },
}

impl IsolationForest {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Artifact {
            path: path.display().to_string(),
            source,
        })?;
        let forest: IsolationForest =
            serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        forest.validate()?;
        Ok(forest)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.n_features == 0 {
            return Err(ModelError::Invalid("n_features is zero".to_string()));
        }
        if self.max_samples < 2 {
            return Err(ModelError::Invalid(
                "max_samples must be at least 2".to_string(),
            ));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_string()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                {
                    if *feature >= self.n_features {
                        return Err(ModelError::Invalid(format!(
                            "tree {t} node {i} splits on feature {feature}, model has {}",
                            self.n_features
                        )));
                    }
                    // Children must point forward in the node array so
                    // traversal always terminates.
                    let forward = *left > i && *right > i;
                    if !forward || *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                        return Err(ModelError::Invalid(format!(
                            "tree {t} node {i} has out-of-range children"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn path_length(tree: &Tree, features: &Array1<f64>) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &tree.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    depth += 1.0;
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

impl AnomalyModel for IsolationForest {
    fn score(&self, features: &Array1<f64>) -> Result<Prediction, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::Shape {
                expected: self.n_features,
                got: features.len(),
            });
        }
        let depths: Vec<f64> = self
            .trees
            .iter()
            .map(|tree| Self::path_length(tree, features))
            .collect();
        let mean_depth = depths.iter().mean();
        let score = -(2.0_f64.powf(-mean_depth / average_path_length(self.max_samples)));
        let label = if score < self.offset {
            Label::Anomaly
        } else {
            Label::Normal
        };
        Ok(Prediction { score, label })
    }
}

/// c(n): expected path length of an unsuccessful search in a binary tree of
/// n samples, the isolation forest normalization term.
fn average_path_length(n: u64) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // One stump per forest: feature 0 <= 0.0 goes to a singleton leaf
    // (isolated fast), anything else to a deep leaf.
    fn forest(offset: f64) -> IsolationForest {
        IsolationForest {
            n_features: 2,
            max_samples: 256,
            offset,
            trees: vec![Tree {
                nodes: vec![
                    Node::Split {
                        feature: 0,
                        threshold: 0.0,
                        left: 1,
                        right: 2,
                    },
                    Node::Leaf { size: 1 },
                    Node::Leaf { size: 200 },
                ],
            }],
        }
    }

    #[test]
    fn test_isolated_point_scores_more_negative() {
        let forest = forest(-0.5);
        let isolated = forest.score(&array![-1.0, 0.0]).unwrap();
        let typical = forest.score(&array![1.0, 0.0]).unwrap();
        assert!(isolated.score < typical.score);
        assert!(isolated.score < 0.0 && typical.score < 0.0);
    }

    #[test]
    fn test_label_follows_offset() {
        // Offset above both scores: everything anomalous.
        let strict = forest(0.0);
        assert_eq!(
            strict.score(&array![1.0, 0.0]).unwrap().label,
            Label::Anomaly
        );
        // Offset below both scores: everything normal.
        let lax = forest(-1.0);
        assert_eq!(lax.score(&array![-1.0, 0.0]).unwrap().label, Label::Normal);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let forest = forest(-0.5);
        let result = forest.score(&array![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(ModelError::Shape { expected: 2, got: 3 })));
    }

    #[test]
    fn test_artifact_parses_from_json() {
        let json = r#"{
            "n_features": 2,
            "max_samples": 64,
            "offset": -0.5,
            "trees": [
                {"nodes": [
                    {"feature": 1, "threshold": 2.5, "left": 1, "right": 2},
                    {"size": 1},
                    {"size": 30}
                ]}
            ]
        }"#;
        let forest: IsolationForest = serde_json::from_str(json).unwrap();
        forest.validate().unwrap();
        assert!(forest.score(&array![0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_bad_feature_index_rejected() {
        let forest = IsolationForest {
            n_features: 1,
            max_samples: 64,
            offset: -0.5,
            trees: vec![Tree {
                nodes: vec![
                    Node::Split {
                        feature: 5,
                        threshold: 0.0,
                        left: 1,
                        right: 2,
                    },
                    Node::Leaf { size: 1 },
                    Node::Leaf { size: 1 },
                ],
            }],
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_average_path_length_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(n) grows with n and stays below log2-ish bounds.
        assert!(average_path_length(256) > average_path_length(64));
    }
}
