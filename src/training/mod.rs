//! Model training module
//!
//! Provides the classifier roster used by the model trainer:
//! - Logistic regression
//! - K-Nearest Neighbors
//! - Decision trees and Random Forests
//! - AdaBoost and gradient boosting
//!
//! plus grid search, cross-validation, metrics and the wrapped predictor.

mod models;
pub mod adaboost;
pub mod classifier;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod grid_search;
pub mod knn;
pub mod logistic;
pub mod metrics;
pub mod random_forest;

pub use models::Model;
pub use adaboost::AdaBoostClassifier;
pub use classifier::{describe_params, expand_grid, Classifier, ModelFamily, ParamGrid, ParamSet, ParamValue};
pub use cross_validation::{CVSplit, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use estimator::{NetworkModel, Preprocessor};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{CandidateScore, GridSearch, GridSearchResult};
pub use knn::{KNNClassifier, KNNConfig};
pub use logistic::LogisticRegression;
pub use metrics::{
    accuracy_score, f1_score, get_classification_score, precision_score, r2_score, recall_score,
    SelectionMetric,
};
pub use random_forest::{MaxFeatures, RandomForest};
