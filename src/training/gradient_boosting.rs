//! Gradient boosting classifier
//!
//! Binary log-loss boosting on shallow regression trees. Each round fits a
//! tree to the negative gradient on a row subsample, replaces its leaf values
//! with a one-step Newton estimate, and adds the shrunk tree to the ensemble.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_n_features, class_labels, Model};
use crate::error::{NetsecError, Result};

const PROBA_EPS: f64 = 1e-15;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) per round
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: crate::constants::DEFAULT_RANDOM_SEED,
        }
    }
}

/// Binary gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    /// Log-odds prior
    initial_prediction: f64,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(NetsecError::InvalidParameter {
                name: "subsample".to_string(),
                value: c.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if c.learning_rate <= 0.0 {
            return Err(NetsecError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: c.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate_config()?;

        self.classes = class_labels(y);
        if self.classes.len() > 2 {
            return Err(NetsecError::TrainingError(format!(
                "Gradient boosting supports binary targets, got {} classes",
                self.classes.len()
            )));
        }
        self.n_features = x.ncols();
        self.trees.clear();

        let n_samples = x.nrows();
        let positive = self.classes.get(1).copied();
        let target: Array1<f64> = y
            .iter()
            .map(|&v| if Some(v) == positive { 1.0 } else { 0.0 })
            .collect();

        let prior = target.mean().unwrap_or(0.5).clamp(PROBA_EPS, 1.0 - PROBA_EPS);
        self.initial_prediction = (prior / (1.0 - prior)).ln();

        let mut raw = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let n_sub = ((self.config.subsample * n_samples as f64) as usize).clamp(1, n_samples);

        for _ in 0..self.config.n_estimators {
            let proba: Array1<f64> = raw.mapv(sigmoid);
            let residuals: Array1<f64> = &target - &proba;

            let mut sample_indices: Vec<usize> = if n_sub < n_samples {
                rand::seq::index::sample(&mut rng, n_samples, n_sub).into_vec()
            } else {
                (0..n_samples).collect()
            };
            sample_indices.sort_unstable();

            let x_sub = x.select(Axis(0), &sample_indices);
            let r_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            // Newton step per leaf over the in-bag rows
            let leaves = tree.apply(&x_sub)?;
            let mut numerator = vec![0.0; tree.get_n_leaves()];
            let mut denominator = vec![0.0; tree.get_n_leaves()];
            for (pos, &leaf) in leaves.iter().enumerate() {
                let i = sample_indices[pos];
                numerator[leaf] += residuals[i];
                denominator[leaf] += proba[i] * (1.0 - proba[i]);
            }
            let values: Vec<f64> = numerator
                .iter()
                .zip(&denominator)
                .map(|(&n, &d)| if d.abs() < 1e-150 { 0.0 } else { n / d })
                .collect();
            tree.set_leaf_values(&values)?;

            let update = tree.predict(x)?;
            raw.scaled_add(self.config.learning_rate, &update);
            self.trees.push(tree);
        }

        Ok(())
    }

    /// Raw log-odds of the positive class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(NetsecError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut raw = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(raw)
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let raw = self.decision_function(x)?;
        let negative = self.classes[0];
        let positive = self.classes.get(1).copied().unwrap_or(negative);
        Ok(raw.mapv(|r| if r > 0.0 { positive } else { negative }))
    }
}

impl Model for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
