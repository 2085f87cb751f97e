//! Classifier roster, hyperparameter grids and dispatch

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::{Criterion, DecisionTree};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::knn::{KNNClassifier, KNNConfig};
use super::logistic::LogisticRegression;
use super::models::Model;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{NetsecError, Result};
use crate::imputation::KnnWeights;

/// One hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// Candidate values per parameter name
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// One concrete parameter assignment
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Cartesian product of a grid; the last key (in name order) varies fastest.
/// An empty grid yields one empty assignment.
pub fn expand_grid(grid: &ParamGrid) -> Vec<ParamSet> {
    let mut sets = vec![ParamSet::new()];
    for (name, values) in grid {
        let mut next = Vec::with_capacity(sets.len() * values.len());
        for set in &sets {
            for value in values {
                let mut extended = set.clone();
                extended.insert(name.clone(), value.clone());
                next.push(extended);
            }
        }
        sets = next;
    }
    sets
}

/// Render a parameter set as `k=v, k=v`
pub fn describe_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn invalid(family: ModelFamily, name: &str, value: &ParamValue, reason: &str) -> NetsecError {
    NetsecError::InvalidParameter {
        name: format!("{}.{}", family.key(), name),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn as_usize(family: ModelFamily, name: &str, value: &ParamValue) -> Result<usize> {
    match value {
        ParamValue::Int(v) if *v > 0 => Ok(*v as usize),
        _ => Err(invalid(family, name, value, "expected a positive integer")),
    }
}

fn as_f64(family: ModelFamily, name: &str, value: &ParamValue) -> Result<f64> {
    match value {
        ParamValue::Int(v) => Ok(*v as f64),
        ParamValue::Float(v) => Ok(*v),
        ParamValue::Str(_) => Err(invalid(family, name, value, "expected a number")),
    }
}

fn as_str<'a>(family: ModelFamily, name: &str, value: &'a ParamValue) -> Result<&'a str> {
    match value {
        ParamValue::Str(s) => Ok(s.as_str()),
        _ => Err(invalid(family, name, value, "expected a string")),
    }
}

/// The fixed roster of classifier families, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    KNearestNeighbors,
    DecisionTree,
    AdaBoost,
    GradientBoosting,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::LogisticRegression,
        ModelFamily::KNearestNeighbors,
        ModelFamily::DecisionTree,
        ModelFamily::AdaBoost,
        ModelFamily::GradientBoosting,
        ModelFamily::RandomForest,
    ];

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::KNearestNeighbors => "K-Nearest Neighbors",
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::AdaBoost => "AdaBoost",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::RandomForest => "Random Forest",
        }
    }

    /// Settings-file key
    pub fn key(self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::KNearestNeighbors => "k_nearest_neighbors",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::AdaBoost => "ada_boost",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::RandomForest => "random_forest",
        }
    }

    /// Built-in search grid
    pub fn default_grid(self) -> ParamGrid {
        fn ints(values: &[i64]) -> Vec<ParamValue> {
            values.iter().map(|&v| ParamValue::Int(v)).collect()
        }
        fn floats(values: &[f64]) -> Vec<ParamValue> {
            values.iter().map(|&v| ParamValue::Float(v)).collect()
        }
        fn strs(values: &[&str]) -> Vec<ParamValue> {
            values.iter().map(|&v| ParamValue::from(v)).collect()
        }

        let mut grid = ParamGrid::new();
        match self {
            ModelFamily::LogisticRegression => {}
            ModelFamily::KNearestNeighbors => {
                grid.insert("n_neighbors".into(), ints(&[3, 5, 7, 9, 11, 13, 15, 17, 19, 21]));
                grid.insert("weights".into(), strs(&["uniform", "distance"]));
            }
            ModelFamily::DecisionTree => {
                grid.insert("criterion".into(), strs(&["gini", "entropy", "log_loss"]));
            }
            ModelFamily::AdaBoost => {
                grid.insert("learning_rate".into(), floats(&[0.1, 0.01, 0.001]));
                grid.insert("n_estimators".into(), ints(&[8, 16, 32, 64, 128, 256]));
            }
            ModelFamily::GradientBoosting => {
                grid.insert("learning_rate".into(), floats(&[0.1, 0.01, 0.05, 0.001]));
                grid.insert("subsample".into(), floats(&[0.6, 0.7, 0.75, 0.85, 0.9]));
                grid.insert("n_estimators".into(), ints(&[8, 16, 32, 64, 128, 256]));
            }
            ModelFamily::RandomForest => {
                grid.insert("n_estimators".into(), ints(&[8, 16, 32, 128, 256]));
            }
        }
        grid
    }

    /// Construct an unfitted classifier from one parameter set.
    ///
    /// Unknown names or ill-typed values are rejected with `InvalidParameter`.
    pub fn build(self, params: &ParamSet, random_state: u64) -> Result<Classifier> {
        match self {
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new();
                for (name, value) in params {
                    match name.as_str() {
                        "alpha" => model.alpha = as_f64(self, name, value)?,
                        "max_iter" => model.max_iter = as_usize(self, name, value)?,
                        "learning_rate" => model.learning_rate = as_f64(self, name, value)?,
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::LogisticRegression(model))
            }
            ModelFamily::KNearestNeighbors => {
                let mut config = KNNConfig::default();
                for (name, value) in params {
                    match name.as_str() {
                        "n_neighbors" => config.n_neighbors = as_usize(self, name, value)?,
                        "weights" => {
                            config.weights = match as_str(self, name, value)? {
                                "uniform" => KnnWeights::Uniform,
                                "distance" => KnnWeights::Distance,
                                _ => return Err(invalid(self, name, value, "expected uniform or distance")),
                            }
                        }
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::KNearestNeighbors(KNNClassifier::new(config)))
            }
            ModelFamily::DecisionTree => {
                let mut tree = DecisionTree::new_classifier().with_random_state(random_state);
                for (name, value) in params {
                    match name.as_str() {
                        "criterion" => tree.criterion = parse_class_criterion(self, name, value)?,
                        "max_depth" => tree.max_depth = Some(as_usize(self, name, value)?),
                        "min_samples_split" => {
                            tree.min_samples_split = as_usize(self, name, value)?.max(2)
                        }
                        "min_samples_leaf" => tree.min_samples_leaf = as_usize(self, name, value)?,
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::DecisionTree(tree))
            }
            ModelFamily::AdaBoost => {
                let mut model = AdaBoostClassifier::default();
                for (name, value) in params {
                    match name.as_str() {
                        "n_estimators" => model.n_estimators = as_usize(self, name, value)?,
                        "learning_rate" => model.learning_rate = as_f64(self, name, value)?,
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::AdaBoost(model))
            }
            ModelFamily::GradientBoosting => {
                let mut config = GradientBoostingConfig {
                    random_state,
                    ..Default::default()
                };
                for (name, value) in params {
                    match name.as_str() {
                        "n_estimators" => config.n_estimators = as_usize(self, name, value)?,
                        "learning_rate" => config.learning_rate = as_f64(self, name, value)?,
                        "subsample" => config.subsample = as_f64(self, name, value)?,
                        "max_depth" => config.max_depth = as_usize(self, name, value)?,
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::GradientBoosting(GradientBoostingClassifier::new(config)))
            }
            ModelFamily::RandomForest => {
                let mut forest = RandomForest::new(100).with_random_state(random_state);
                for (name, value) in params {
                    match name.as_str() {
                        "n_estimators" => forest.n_estimators = as_usize(self, name, value)?,
                        "criterion" => forest.criterion = parse_class_criterion(self, name, value)?,
                        "max_depth" => forest.max_depth = Some(as_usize(self, name, value)?),
                        "max_features" => {
                            forest.max_features = match value {
                                ParamValue::Str(s) if s == "sqrt" => MaxFeatures::Sqrt,
                                ParamValue::Str(s) if s == "log2" => MaxFeatures::Log2,
                                ParamValue::Str(s) if s == "all" => MaxFeatures::All,
                                ParamValue::Int(_) => MaxFeatures::Fixed(as_usize(self, name, value)?),
                                _ => return Err(invalid(self, name, value, "expected sqrt, log2, all or a count")),
                            }
                        }
                        _ => return Err(invalid(self, name, value, "unknown parameter")),
                    }
                }
                Ok(Classifier::RandomForest(forest))
            }
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_class_criterion(family: ModelFamily, name: &str, value: &ParamValue) -> Result<Criterion> {
    match Criterion::parse(as_str(family, name, value)?) {
        Some(c) if c != Criterion::MSE => Ok(c),
        _ => Err(invalid(family, name, value, "expected gini, entropy or log_loss")),
    }
}

/// A classifier of any roster family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    LogisticRegression(LogisticRegression),
    KNearestNeighbors(KNNClassifier),
    DecisionTree(DecisionTree),
    AdaBoost(AdaBoostClassifier),
    GradientBoosting(GradientBoostingClassifier),
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn family(&self) -> ModelFamily {
        match self {
            Classifier::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Classifier::KNearestNeighbors(_) => ModelFamily::KNearestNeighbors,
            Classifier::DecisionTree(_) => ModelFamily::DecisionTree,
            Classifier::AdaBoost(_) => ModelFamily::AdaBoost,
            Classifier::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Classifier::RandomForest(_) => ModelFamily::RandomForest,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            Classifier::LogisticRegression(m) => m,
            Classifier::KNearestNeighbors(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::AdaBoost(m) => m,
            Classifier::GradientBoosting(m) => m,
            Classifier::RandomForest(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            Classifier::LogisticRegression(m) => m,
            Classifier::KNearestNeighbors(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::AdaBoost(m) => m,
            Classifier::GradientBoosting(m) => m,
            Classifier::RandomForest(m) => m,
        }
    }
}

impl Model for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }
}
