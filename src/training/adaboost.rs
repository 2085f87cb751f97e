//! AdaBoost (Adaptive Boosting) implementation
//!
//! SAMME boosting over depth-1 decision trees, weighting misclassified
//! samples more heavily in subsequent rounds.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_n_features, class_labels, majority_vote, Model};
use crate::error::{NetsecError, Result};

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    /// Number of stumps kept after early stopping
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(NetsecError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.classes = class_labels(y);
        self.n_features = x.ncols();
        self.stumps.clear();
        self.alphas.clear();

        let n_classes = self.classes.len() as f64;
        let mut weights = vec![1.0 / n_samples as f64; n_samples];

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::new_classifier().with_max_depth(1);
            stump.fit_weighted(x, y, Some(&weights))?;
            let predictions = stump.predict(x)?;

            let missed: Vec<bool> = predictions.iter().zip(y.iter()).map(|(p, t)| p != t).collect();
            let w_sum: f64 = weights.iter().sum();
            let error = weights
                .iter()
                .zip(&missed)
                .filter(|(_, &m)| m)
                .map(|(w, _)| w)
                .sum::<f64>()
                / w_sum;

            // Perfect fit: keep this stump and stop
            if error <= 0.0 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance
            if error >= 1.0 - 1.0 / n_classes {
                if round == 0 {
                    return Err(NetsecError::TrainingError(
                        "AdaBoost base estimator is no better than random guessing".to_string(),
                    ));
                }
                break;
            }

            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());

            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            for w in weights.iter_mut() {
                *w /= total;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(self)
    }

    /// Weighted vote of the stumps
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(NetsecError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let n_classes = self.classes.len();
        let mut scores = vec![vec![0.0; n_classes]; x.nrows()];
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            let preds = stump.predict(x)?;
            for (row_scores, p) in scores.iter_mut().zip(preds.iter()) {
                if let Some(k) = self.classes.iter().position(|c| c == p) {
                    row_scores[k] += alpha;
                }
            }
        }

        Ok(scores
            .iter()
            .map(|s| majority_vote(&self.classes, s))
            .collect())
    }
}

impl Model for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostClassifier::predict(self, x)
    }
}
