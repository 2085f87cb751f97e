//! Stratified k-fold splitter

use std::collections::BTreeMap;

use ndarray::Array1;

use crate::error::{NetsecError, Result};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter without shuffling
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(crate::constants::MODEL_TRAINER_CV_FOLDS)
    }
}

impl CrossValidator {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Round-robin each class over the folds, classes in ascending order
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(NetsecError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if y.len() < n_splits {
            return Err(NetsecError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                y.len(),
                n_splits
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[(offset + i) % n_splits].push(idx);
            }
            // Continue where the previous class stopped so fold sizes stay balanced
            offset += indices.len();
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let train_indices = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_folds_cover_every_sample_once() {
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let splits = CrossValidator::new(3).split(&y).unwrap();

        assert_eq!(splits.len(), 3);
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 10);
        }
    }

    #[test]
    fn test_stratified_keeps_class_balance() {
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let splits = CrossValidator::new(3).split(&y).unwrap();

        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
            assert_eq!(split.test_indices.len(), 3);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let y = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let a = CrossValidator::new(2).split(&y).unwrap();
        let b = CrossValidator::new(2).split(&y).unwrap();
        for (x, z) in a.iter().zip(&b) {
            assert_eq!(x.test_indices, z.test_indices);
        }
    }

    #[test]
    fn test_rejects_too_few_samples() {
        let y = array![0.0, 1.0];
        assert!(CrossValidator::default().split(&y).is_err());
        assert!(CrossValidator::new(1).split(&array![0.0, 1.0, 1.0]).is_err());
    }
}
