//! K-Nearest Neighbors classifier

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_n_features, class_labels, majority_vote, Model};
use crate::error::{NetsecError, Result};
use crate::imputation::KnnWeights;

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Weighting scheme
    pub weights: KnnWeights,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
        }
    }
}

/// K-Nearest Neighbors classifier over euclidean distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    /// Class index of each training row
    y_train: Vec<usize>,
    classes: Vec<f64>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_neighbors == 0 || self.config.n_neighbors > x.nrows() {
            return Err(NetsecError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: self.config.n_neighbors.to_string(),
                reason: format!("must be in [1, {}]", x.nrows()),
            });
        }

        self.classes = class_labels(y);
        self.y_train = y
            .iter()
            .map(|v| self.classes.iter().position(|c| c == v).unwrap_or_default())
            .collect();
        self.x_train = Some(x.clone());
        Ok(())
    }

    /// Predict class labels (parallelized over test samples)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(NetsecError::ModelNotFitted)?;
        check_n_features(x_train.ncols(), x)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, self.config.n_neighbors);
                self.vote(&neighbors)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn vote(&self, neighbors: &[(usize, f64)]) -> f64 {
        let mut votes = vec![0.0; self.classes.len()];
        match self.config.weights {
            KnnWeights::Uniform => {
                for &(idx, _) in neighbors {
                    votes[self.y_train[idx]] += 1.0;
                }
            }
            KnnWeights::Distance => {
                // Exact matches take all the weight
                let exact: Vec<usize> = neighbors
                    .iter()
                    .filter(|(_, d)| *d == 0.0)
                    .map(|(idx, _)| *idx)
                    .collect();
                if exact.is_empty() {
                    for &(idx, d) in neighbors {
                        votes[self.y_train[idx]] += 1.0 / d;
                    }
                } else {
                    for idx in exact {
                        votes[self.y_train[idx]] += 1.0;
                    }
                }
            }
        }
        majority_vote(&self.classes, &votes)
    }
}

impl Model for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KNNClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict(self, x)
    }
}

/// Indices and distances of the `k` closest training rows, nearest first.
/// Equal distances keep training order.
fn find_k_nearest(sample: ArrayView1<f64>, x_train: &Array2<f64>, k: usize) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = x_train
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let sq: f64 = row
                .iter()
                .zip(sample.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (i, sq.sqrt())
        })
        .collect();

    if k < distances.len() {
        distances.select_nth_unstable_by(k - 1, |a, b| cmp_neighbor(a, b));
        distances.truncate(k);
    }
    distances.sort_by(cmp_neighbor);
    distances
}

fn cmp_neighbor(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then(a.0.cmp(&b.0))
}
