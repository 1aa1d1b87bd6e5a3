//! Isolation forest inference
//!
//! Evaluates a pre-trained isolation forest exported in tree-array form
//! (parallel `children_left` / `children_right` / `feature` / `threshold` /
//! `n_node_samples` arrays per tree). Scores follow the trained convention:
//! values lie in [-1, 0) and lower means more anomalous.

use crate::error::{DetectorError, DetectorResult};
use crate::models::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Child index marking a leaf node
pub const LEAF: i64 = -1;

/// A single isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<u64>,
    /// Input columns seen by this tree when trained on a feature subset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<usize>>,
}

impl IsolationTree {
    fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self, index: usize, n_features: usize) -> DetectorResult<()> {
        let n = self.node_count();
        let incompatible =
            |msg: String| Err(DetectorError::IncompatibleArtifacts(format!("tree {}: {}", index, msg)));

        if n == 0 {
            return incompatible("has no nodes".to_string());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.n_node_samples.len() != n
        {
            return incompatible("node arrays differ in length".to_string());
        }

        let visible = match &self.features {
            Some(cols) => {
                if let Some(bad) = cols.iter().find(|&&c| c >= n_features) {
                    return incompatible(format!("feature subset references column {}", bad));
                }
                cols.len()
            }
            None => n_features,
        };

        for node in 0..n {
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == LEAF {
                continue;
            }
            // children always follow their parent, which rules out cycles
            let in_range = |c: i64| c > node as i64 && (c as usize) < n;
            if !in_range(left) || !in_range(right) {
                return incompatible(format!("node {} has invalid children", node));
            }
            let f = self.feature[node];
            if f < 0 || f as usize >= visible {
                return incompatible(format!("node {} splits on feature {}", node, f));
            }
            if !self.threshold[node].is_finite() {
                return incompatible(format!("node {} has non-finite threshold", node));
            }
        }
        Ok(())
    }

    /// Depth of the leaf reached by `x`, plus the expected remaining depth
    /// of the unbuilt subtree below it
    pub fn path_length(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = 0usize;
        let mut depth = 0u32;
        while self.children_left[node] != LEAF {
            let f = self.feature[node] as usize;
            let column = match &self.features {
                Some(cols) => cols[f],
                None => f,
            };
            // splits were learned on f32 inputs
            let value = x[column] as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
            depth += 1;
        }
        depth as f64 + average_path_length(self.n_node_samples[node])
    }
}

/// Fitted isolation forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub n_features: usize,
    /// Subsample size each tree was grown on
    pub max_samples: u64,
    pub trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn validate(&self) -> DetectorResult<()> {
        if self.n_features != FEATURE_COUNT {
            return Err(DetectorError::IncompatibleArtifacts(format!(
                "model expects {} features, detector provides {}",
                self.n_features, FEATURE_COUNT
            )));
        }
        if self.trees.is_empty() {
            return Err(DetectorError::IncompatibleArtifacts(
                "model has no trees".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features)?;
        }
        Ok(())
    }

    /// Anomaly score of a standardized vector
    pub fn score_samples(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let depth_sum: f64 = self.trees.iter().map(|t| t.path_length(x)).sum();
        let denominator = self.trees.len() as f64 * average_path_length(self.max_samples);
        let exponent = if denominator == 0.0 {
            1.0
        } else {
            depth_sum / denominator
        };
        -(2f64.powf(-exponent))
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// built from `n` points
pub fn average_path_length(n: u64) -> f64 {
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
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244770920116851).abs() < 1e-9, "c(256) = {}", c256);
    }

    #[test]
    fn test_isolated_point_scores_lower() {
        let forest = forest();
        forest.validate().unwrap();

        let normal = forest.score_samples(&[0.0, 0.0, 0.0, 0.0]);
        let outlier = forest.score_samples(&[5.0, 5.0, 0.0, 0.0]);
        assert!(outlier < normal, "outlier {} vs normal {}", outlier, normal);
        assert!((-1.0..0.0).contains(&normal));
        assert!((-1.0..0.0).contains(&outlier));
    }

    #[test]
    fn test_score_matches_closed_form() {
        let forest = forest();
        // right leaf in both trees: depth 1, c(1) = 0
        let score = forest.score_samples(&[9.0, 9.0, 0.0, 0.0]);
        let expected = -(2f64.powf(-(2.0 / (2.0 * average_path_length(64)))));
        assert_eq!(score, expected);
    }

    #[test]
    fn test_split_goes_left_on_equality() {
        let tree = stump(0, 2.0, 63);
        let on_split = tree.path_length(&[2.0, 0.0, 0.0, 0.0]);
        assert_eq!(on_split, 1.0 + average_path_length(63));
    }

    #[test]
    fn test_split_compares_at_single_precision() {
        let tree = stump(0, 0.1, 63);
        // 0.1 rounds up to 0.10000000149 as f32, past the split
        assert_eq!(tree.path_length(&[0.1, 0.0, 0.0, 0.0]), 1.0);
        assert_eq!(
            tree.path_length(&[0.099_999_99, 0.0, 0.0, 0.0]),
            1.0 + average_path_length(63)
        );
    }

    #[test]
    fn test_feature_subset_mapping() {
        let mut tree = stump(0, 2.0, 63);
        tree.features = Some(vec![3]);
        // split column 0 of the subset maps to battery
        assert_eq!(tree.path_length(&[9.0, 0.0, 0.0, 0.0]), 1.0 + average_path_length(63));
        assert_eq!(tree.path_length(&[0.0, 0.0, 0.0, 9.0]), 1.0);
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let mut forest = forest();
        forest.n_features = 5;
        assert!(matches!(
            forest.validate(),
            Err(DetectorError::IncompatibleArtifacts(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_tree() {
        let mut forest = forest();
        forest.trees[0].children_left[0] = 0;
        assert!(forest.validate().is_err());

        let mut forest = super::fixtures::forest();
        forest.trees[1].feature[0] = 7;
        assert!(forest.validate().is_err());

        let mut forest = super::fixtures::forest();
        forest.trees[0].threshold.pop();
        assert!(forest.validate().is_err());

        let mut forest = super::fixtures::forest();
        forest.trees.clear();
        assert!(forest.validate().is_err());
    }
}
