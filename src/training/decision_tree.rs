//! Decision tree implementation

use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NetsecError, Result};
use crate::training::models::{check_fit_input, class_labels, Model};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        id: usize,
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Shannon entropy (classification)
    Entropy,
    /// Cross-entropy; yields the same splits as `Entropy` (classification)
    LogLoss,
    /// Mean squared error (regression)
    #[serde(rename = "squared_error")]
    MSE,
}

impl Criterion {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "gini" => Some(Criterion::Gini),
            "entropy" => Some(Criterion::Entropy),
            "log_loss" => Some(Criterion::LogLoss),
            "squared_error" | "mse" => Some(Criterion::MSE),
            _ => None,
        }
    }

    fn is_classification(self) -> bool {
        !matches!(self, Criterion::MSE)
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per node; `None` tries all
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: u64,
    n_features: usize,
    n_leaves: usize,
    /// Sorted class labels (classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            n_leaves: 0,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_classifier(&self) -> bool {
        self.criterion.is_classification()
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_weighted(x, y, None)
    }

    /// Fit with per-sample weights (uniform when `None`)
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&[f64]>,
    ) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();

        let weights = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(NetsecError::ShapeError {
                    expected: format!("{} sample weights", n_samples),
                    actual: format!("{} sample weights", w.len()),
                });
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; n_samples],
        };

        let targets = if self.is_classifier() {
            self.classes = class_labels(y);
            let labels = y
                .iter()
                .map(|v| {
                    self.classes
                        .iter()
                        .position(|c| c == v)
                        .unwrap_or_default()
                })
                .collect();
            Targets::Classes {
                labels,
                n_classes: self.classes.len(),
            }
        } else {
            self.classes.clear();
            Targets::Values(y.to_vec())
        };

        self.n_features = x.ncols();
        let bins = BinnedFeatures::new(x);
        let mut builder = TreeBuilder {
            tree: self,
            bins: &bins,
            targets: &targets,
            weights: &weights,
            rng: ChaCha8Rng::seed_from_u64(self.random_state),
            next_leaf: 0,
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = builder.build(indices, 0);
        let n_leaves = builder.next_leaf;

        self.root = Some(root);
        self.n_leaves = n_leaves;
        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.fitted_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| Self::leaf_for(root, row).1)
            .collect())
    }

    /// Leaf id reached by each row
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.fitted_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| Self::leaf_for(root, row).0)
            .collect())
    }

    /// Overwrite leaf values, indexed by leaf id
    pub fn set_leaf_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.n_leaves {
            return Err(NetsecError::ShapeError {
                expected: format!("{} leaf values", self.n_leaves),
                actual: format!("{} leaf values", values.len()),
            });
        }
        if let Some(root) = self.root.as_mut() {
            Self::overwrite_leaves(root, values);
        }
        Ok(())
    }

    fn overwrite_leaves(node: &mut TreeNode, values: &[f64]) {
        match node {
            TreeNode::Leaf { id, value, .. } => *value = values[*id],
            TreeNode::Split { left, right, .. } => {
                Self::overwrite_leaves(left, values);
                Self::overwrite_leaves(right, values);
            }
        }
    }

    fn fitted_root(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(NetsecError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(NetsecError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    fn leaf_for(root: &TreeNode, sample: ArrayView1<f64>) -> (usize, f64) {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { id, value, .. } => return (*id, *value),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Sorted class labels seen during fit
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.n_leaves
    }
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }
}

enum Targets {
    Classes { labels: Vec<usize>, n_classes: usize },
    Values(Vec<f64>),
}

/// Per-feature sorted distinct values and the bin code of every sample.
/// Missing values sort last and always fall right of a split.
struct BinnedFeatures {
    values: Vec<Vec<f64>>,
    codes: Vec<Vec<u32>>,
}

impl BinnedFeatures {
    fn new(x: &Array2<f64>) -> Self {
        let (values, codes) = x
            .columns()
            .into_iter()
            .map(|col| {
                let keyed: Vec<f64> = col
                    .iter()
                    .map(|&v| if v.is_nan() { f64::INFINITY } else { v })
                    .collect();
                let mut distinct = keyed.clone();
                distinct.sort_by(f64::total_cmp);
                distinct.dedup();
                let codes = keyed
                    .iter()
                    .map(|v| {
                        distinct
                            .binary_search_by(|b| b.total_cmp(v))
                            .unwrap_or_default() as u32
                    })
                    .collect();
                (distinct, codes)
            })
            .unzip();
        Self { values, codes }
    }
}

/// Weighted sufficient statistics of a node
#[derive(Clone)]
struct NodeStats {
    n: usize,
    weight: f64,
    class_weight: Vec<f64>,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn new(n_classes: usize) -> Self {
        Self {
            n: 0,
            weight: 0.0,
            class_weight: vec![0.0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add_sample(&mut self, targets: &Targets, idx: usize, w: f64) {
        self.n += 1;
        self.weight += w;
        match targets {
            Targets::Classes { labels, .. } => self.class_weight[labels[idx]] += w,
            Targets::Values(values) => {
                self.sum += w * values[idx];
                self.sq_sum += w * values[idx] * values[idx];
            }
        }
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            n: self.n - other.n,
            weight: self.weight - other.weight,
            class_weight: self
                .class_weight
                .iter()
                .zip(&other.class_weight)
                .map(|(a, b)| a - b)
                .collect(),
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_weight
                    .iter()
                    .map(|&c| (c / self.weight).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy | Criterion::LogLoss => -self
                .class_weight
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / self.weight;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => {
                let mean = self.sum / self.weight;
                (self.sq_sum / self.weight - mean * mean).max(0.0)
            }
        }
    }

    /// Majority class index (lowest on ties) or weighted mean
    fn leaf_value(&self, classes: &[f64]) -> f64 {
        if classes.is_empty() {
            return if self.weight > 0.0 { self.sum / self.weight } else { 0.0 };
        }
        let mut best = 0;
        for (i, &w) in self.class_weight.iter().enumerate() {
            if w > self.class_weight[best] {
                best = i;
            }
        }
        classes[best]
    }
}

struct SplitCandidate {
    feature_idx: usize,
    bin: u32,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    tree: &'a DecisionTree,
    bins: &'a BinnedFeatures,
    targets: &'a Targets,
    weights: &'a [f64],
    rng: ChaCha8Rng,
    next_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    fn n_classes(&self) -> usize {
        match self.targets {
            Targets::Classes { n_classes, .. } => *n_classes,
            Targets::Values(_) => 0,
        }
    }

    fn node_stats(&self, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::new(self.n_classes());
        for &i in indices {
            stats.add_sample(self.targets, i, self.weights[i]);
        }
        stats
    }

    fn leaf(&mut self, stats: &NodeStats) -> TreeNode {
        let id = self.next_leaf;
        self.next_leaf += 1;
        TreeNode::Leaf {
            id,
            value: stats.leaf_value(&self.tree.classes),
            n_samples: stats.n,
        }
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let tree = self.tree;
        let stats = self.node_stats(&indices);
        let impurity = stats.impurity(tree.criterion);

        let should_stop = indices.len() < tree.min_samples_split
            || indices.len() < 2 * tree.min_samples_leaf
            || tree.max_depth.is_some_and(|d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats);
        }

        let Some(split) = self.find_best_split(&indices, &stats, impurity) else {
            return self.leaf(&stats);
        };

        let codes = &self.bins.codes[split.feature_idx];
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| codes[i] <= split.bin);

        let left = Box::new(self.build(left_indices, depth + 1));
        let right = Box::new(self.build(right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples: indices.len(),
            gain: split.gain,
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.tree.n_features;
        match self.tree.max_features {
            Some(m) if m < n_features => {
                rand::seq::index::sample(&mut self.rng, n_features, m.max(1)).into_vec()
            }
            _ => (0..n_features).collect(),
        }
    }

    fn find_best_split(
        &mut self,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let features = self.candidate_features();
        let this = &*self;

        // Each feature independently finds its best split
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&f| this.best_split_for_feature(f, indices, parent, parent_impurity))
            .collect();

        // First feature wins ties
        let mut best: Option<SplitCandidate> = None;
        for candidate in per_feature.into_iter().flatten() {
            if best.as_ref().map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best.filter(|b| b.gain > 1e-12)
    }

    fn best_split_for_feature(
        &self,
        feature_idx: usize,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let values = &self.bins.values[feature_idx];
        let codes = &self.bins.codes[feature_idx];
        let criterion = self.tree.criterion;
        let min_leaf = self.tree.min_samples_leaf;

        // Walk the node's samples in bin order; cost follows node size, not bin count
        let mut order = indices.to_vec();
        order.sort_unstable_by_key(|&i| codes[i]);
        match (order.first(), order.last()) {
            (Some(&lo), Some(&hi)) if codes[lo] != codes[hi] => {}
            _ => return None,
        }

        let mut left = NodeStats::new(self.n_classes());
        let mut best: Option<SplitCandidate> = None;

        for (pos, &i) in order.iter().enumerate() {
            left.add_sample(self.targets, i, self.weights[i]);
            let Some(&j) = order.get(pos + 1) else {
                break;
            };
            let (b, next) = (codes[i] as usize, codes[j] as usize);
            if b == next {
                continue;
            }
            let right = parent.minus(&left);

            if left.n < min_leaf || right.n < min_leaf {
                continue;
            }
            if parent.weight <= 0.0 {
                continue;
            }

            let weighted = (left.weight * left.impurity(criterion)
                + right.weight * right.impurity(criterion))
                / parent.weight;
            let gain = parent_impurity - weighted;

            if best.as_ref().map_or(true, |s| gain > s.gain) {
                let threshold = if values[next].is_finite() {
                    (values[b] + values[next]) / 2.0
                } else {
                    values[b]
                };
                best = Some(SplitCandidate {
                    feature_idx,
                    bin: b as u32,
                    threshold,
                    gain,
                });
            }
        }

        best.filter(|s| s.gain > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_xor_needs_depth_two() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        for criterion in [Criterion::Gini, Criterion::Entropy, Criterion::LogLoss] {
            let mut tree = DecisionTree::new_classifier().with_criterion(criterion);
            tree.fit(&x, &y).unwrap();
            // XOR has no first split with positive gain
            assert_eq!(tree.get_n_leaves(), 1, "{:?}", criterion);
        }
    }

    #[test]
    fn test_regressor_fits_steps() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&array![[2.5], [5.5]]).unwrap();
        assert!((pred[0] - 1.0).abs() < 1e-12);
        assert!((pred[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_continuous_feature_splits_between_neighbors() {
        // 300 distinct values, labels switch between x = 0.370 and x = 0.371
        let xs: Vec<f64> = (0..300).map(|i| i as f64 / 1000.0 + 0.2).collect();
        let x = ndarray::Array2::from_shape_vec((300, 1), xs.clone()).unwrap();
        let y: ndarray::Array1<f64> = xs.iter().map(|&v| if v > 0.3705 { 1.0 } else { 0.0 }).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 2);
        assert_eq!(tree.predict(&x).unwrap(), y);
        let edges = tree.predict(&array![[0.3704], [0.3706]]).unwrap();
        assert_eq!(edges, array![0.0, 1.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_sample_weights_shift_majority() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![0.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_weighted(&x, &y, Some(&[1.0, 1.0, 5.0])).unwrap();
        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_leaf_values_can_be_replaced() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        let leaves = tree.apply(&x).unwrap();
        assert_eq!(leaves[0], leaves[1]);
        assert_ne!(leaves[1], leaves[2]);

        let values: Vec<f64> = (0..tree.get_n_leaves()).map(|i| 10.0 + i as f64).collect();
        tree.set_leaf_values(&values).unwrap();
        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred[0], 10.0 + leaves[0] as f64);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(NetsecError::ModelNotFitted)
        ));
    }
}
