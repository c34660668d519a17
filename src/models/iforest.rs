// src/models/iforest.rs

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;

use crate::models::base_model::OutlierModel;
use crate::utils::stats;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// Isolation tree node. Leaves keep the number of training rows that reached them.
struct Node {
    split_feature: Option<usize>,
    split_value: f64,
    size: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(size: usize) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            size,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Batch isolation forest.
///
/// Each call to [`OutlierModel::fit`] rebuilds every tree from scratch using
/// the configured seed, so fitting the same matrix twice gives the same
/// scores. The decision boundary is placed at the `contamination` quantile
/// of the training scores.
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,

    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, contamination: f64) -> Self {
        IsolationForest {
            n_estimators,
            max_samples: 256,
            contamination,
            seed: 42,
            trees: Vec::new(),
            sample_size: 0,
            offset: 0.0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(1);
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn build_tree(
        data: &Array2<f64>,
        rows: &[usize],
        height: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        let size = rows.len();

        // Stop criteria
        if size <= 1 || height >= height_limit {
            return Node::leaf(size);
        }

        // Only features that still vary inside this node can split it
        let mut candidates = Vec::with_capacity(data.ncols());
        for feature in 0..data.ncols() {
            let mut min_val = data[[rows[0], feature]];
            let mut max_val = min_val;
            for &r in rows {
                let val = data[[r, feature]];
                min_val = min_val.min(val);
                max_val = max_val.max(val);
            }
            if max_val > min_val {
                candidates.push((feature, min_val, max_val));
            }
        }

        let Some(&(split_feature, min_val, max_val)) = candidates.choose(rng) else {
            return Node::leaf(size);
        };
        // Interpolate rather than sample from the range: `max - min` can
        // overflow for finite extremes
        let u: f64 = rng.gen();
        let width = max_val - min_val;
        let split_value = if width.is_finite() {
            min_val + u * width
        } else {
            min_val * (1.0 - u) + max_val * u
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| data[[r, split_feature]] < split_value);

        if left_rows.is_empty() || right_rows.is_empty() {
            return Node::leaf(size);
        }

        Node {
            split_feature: Some(split_feature),
            split_value,
            size,
            left: Some(Box::new(Self::build_tree(data, &left_rows, height + 1, height_limit, rng))),
            right: Some(Box::new(Self::build_tree(data, &right_rows, height + 1, height_limit, rng))),
        }
    }

    fn path_length(node: &Node, x: &[f64], current_height: usize) -> f64 {
        if node.is_leaf() {
            return current_height as f64 + Self::average_path_length(node.size);
        }

        if let Some(split_feature) = node.split_feature {
            if x[split_feature] < node.split_value {
                if let Some(ref left) = node.left {
                    return Self::path_length(left, x, current_height + 1);
                }
            } else if let Some(ref right) = node.right {
                return Self::path_length(right, x, current_height + 1);
            }
        }

        current_height as f64
    }

    /// Average path length of an unsuccessful search in a binary search tree of `n` nodes.
    pub(crate) fn average_path_length(n: usize) -> f64 {
        match n {
            0 | 1 => 0.0,
            2 => 1.0,
            _ => {
                let n = n as f64;
                2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
            }
        }
    }

    /// Opposite of the anomaly score: values near -1 are outliers, values
    /// around -0.5 or above are inliers.
    pub fn score_samples(&self, matrix: &Array2<f64>) -> Array1<f64> {
        if self.trees.is_empty() {
            return Array1::zeros(matrix.nrows());
        }

        let normaliser = Self::average_path_length(self.sample_size);
        let scores: Vec<f64> = (0..matrix.nrows())
            .into_par_iter()
            .map(|i| {
                let row = matrix.row(i).to_vec();
                let total: f64 = self
                    .trees
                    .iter()
                    .map(|tree| Self::path_length(tree, &row, 0))
                    .sum();
                let mean_path = total / self.trees.len() as f64;
                if normaliser > 0.0 {
                    -(2.0f64.powf(-mean_path / normaliser))
                } else {
                    -0.5
                }
            })
            .collect();

        Array1::from_vec(scores)
    }
}

impl OutlierModel for IsolationForest {
    fn fit(&mut self, matrix: &Array2<f64>) {
        let n_rows = matrix.nrows();
        self.trees.clear();
        self.offset = 0.0;
        if n_rows == 0 || self.n_estimators == 0 {
            self.sample_size = 0;
            return;
        }

        self.sample_size = self.max_samples.min(n_rows);
        let height_limit = (self.sample_size as f64).log2().ceil() as usize;

        // Seeds are drawn up front so the parallel build stays reproducible
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let sample_size = self.sample_size;
        self.trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut tree_rng = StdRng::seed_from_u64(tree_seed);
                let rows = index::sample(&mut tree_rng, n_rows, sample_size).into_vec();
                Self::build_tree(matrix, &rows, 0, height_limit, &mut tree_rng)
            })
            .collect();

        let train_scores = self.score_samples(matrix);
        self.offset = stats::percentile(train_scores.as_slice().unwrap_or(&[]), 100.0 * self.contamination);
    }

    fn decision_function(&self, matrix: &Array2<f64>) -> Array1<f64> {
        if self.trees.is_empty() {
            return Array1::zeros(matrix.nrows());
        }
        self.score_samples(matrix) - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::base_model::AnomalyLabel;
    use approx::assert_relative_eq;

    fn clustered_with_outlier() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Array2::zeros((60, 2));
        for i in 0..59 {
            data[[i, 0]] = rng.gen_range(-1.0..1.0);
            data[[i, 1]] = rng.gen_range(-1.0..1.0);
        }
        data[[59, 0]] = 25.0;
        data[[59, 1]] = -25.0;
        data
    }

    #[test]
    fn average_path_length_known_values() {
        assert_eq!(IsolationForest::average_path_length(1), 0.0);
        assert_eq!(IsolationForest::average_path_length(2), 1.0);
        assert_relative_eq!(
            IsolationForest::average_path_length(256),
            2.0 * (255f64.ln() + EULER_GAMMA) - 2.0 * 255.0 / 256.0,
            epsilon = 1e-12
        );
        assert!(IsolationForest::average_path_length(100) > IsolationForest::average_path_length(10));
    }

    #[test]
    fn outlier_gets_lowest_decision_score() {
        let data = clustered_with_outlier();
        let mut forest = IsolationForest::new(100, 0.02);
        let labels = forest.fit_predict(&data);
        let scores = forest.decision_function(&data);

        let min_idx = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(min_idx, Some(59));
        assert_eq!(labels[59], AnomalyLabel::Anomalous);
    }

    #[test]
    fn refit_is_reproducible() {
        let data = clustered_with_outlier();
        let mut a = IsolationForest::new(50, 0.05).with_seed(11);
        let mut b = IsolationForest::new(50, 0.05).with_seed(11);
        a.fit(&data);
        b.fit(&data);
        assert_eq!(a.decision_function(&data), b.decision_function(&data));
    }

    #[test]
    fn score_samples_are_in_unit_range() {
        let data = clustered_with_outlier();
        let mut forest = IsolationForest::new(30, 0.05);
        forest.fit(&data);
        for s in forest.score_samples(&data).iter() {
            assert!(*s < 0.0 && *s >= -1.0);
        }
    }

    #[test]
    fn constant_matrix_is_all_normal() {
        let data = Array2::from_elem((15, 2), 3.0);
        let mut forest = IsolationForest::new(20, 0.1);
        let labels = forest.fit_predict(&data);
        assert!(labels.iter().all(|l| *l == AnomalyLabel::Normal));
    }

    #[test]
    fn unfitted_model_scores_zero() {
        let data = Array2::from_elem((3, 2), 1.0);
        let forest = IsolationForest::new(10, 0.1);
        assert!(!forest.is_fitted());
        assert_eq!(forest.decision_function(&data), Array1::<f64>::zeros(3));
    }
}
