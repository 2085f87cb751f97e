//! Exhaustive hyperparameter search with stratified cross-validation

use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::{describe_params, expand_grid, Classifier, ModelFamily, ParamGrid, ParamSet};
use super::cross_validation::{CVSplit, CrossValidator};
use super::metrics::accuracy_score;
use super::models::Model;
use crate::error::{NetsecError, Result};

/// Score of one grid candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    /// Mean fold accuracy; `None` if any fold failed to fit
    pub mean_score: Option<f64>,
}

/// Outcome of a search for one family
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub family: ModelFamily,
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Best candidate refit on the whole training set
    pub best_model: Classifier,
    pub candidates: Vec<CandidateScore>,
}

/// Grid search over one model family
#[derive(Debug, Clone)]
pub struct GridSearch {
    family: ModelFamily,
    grid: ParamGrid,
    cv_folds: usize,
    random_state: u64,
}

impl GridSearch {
    pub fn new(family: ModelFamily, grid: ParamGrid) -> Self {
        Self {
            family,
            grid,
            cv_folds: crate::constants::MODEL_TRAINER_CV_FOLDS,
            random_state: crate::constants::DEFAULT_RANDOM_SEED,
        }
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Score every candidate, then refit the best one on all of `x`.
    ///
    /// Candidates are evaluated in parallel; the earliest candidate in grid
    /// order wins ties.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        let start = Instant::now();
        let candidates = expand_grid(&self.grid);
        // Fail fast on a malformed grid before any fitting
        for params in &candidates {
            self.family.build(params, self.random_state)?;
        }

        let splits = CrossValidator::new(self.cv_folds).split(y)?;

        info!(
            model = self.family.name(),
            candidates = candidates.len(),
            folds = splits.len(),
            "Starting grid search"
        );

        let scored: Vec<CandidateScore> = candidates
            .into_par_iter()
            .map(|params| {
                let mean_score = match self.cross_validate(&params, x, y, &splits) {
                    Ok(score) => Some(score),
                    Err(e) => {
                        warn!(
                            model = self.family.name(),
                            params = %describe_params(&params),
                            error = %e,
                            "Candidate failed to fit"
                        );
                        None
                    }
                };
                CandidateScore { params, mean_score }
            })
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in scored.iter().enumerate() {
            if let Some(score) = candidate.mean_score {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
        }
        let (best_idx, best_score) = best.ok_or_else(|| {
            NetsecError::TrainingError(format!("No {} candidate could be fitted", self.family.name()))
        })?;

        let best_params = scored[best_idx].params.clone();
        let mut best_model = self.family.build(&best_params, self.random_state)?;
        best_model.fit(x, y)?;

        info!(
            model = self.family.name(),
            params = %describe_params(&best_params),
            cv_score = best_score,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Grid search finished"
        );

        Ok(GridSearchResult {
            family: self.family,
            best_params,
            best_score,
            best_model,
            candidates: scored,
        })
    }

    fn cross_validate(
        &self,
        params: &ParamSet,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<f64> {
        let mut total = 0.0;
        for split in splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = self.family.build(params, self.random_state)?;
            model.fit(&x_train, &y_train)?;
            let score = accuracy_score(&y_test, &model.predict(&x_test)?)?;
            debug!(fold = split.fold_idx, score, "Fold scored");
            total += score;
        }
        Ok(total / splits.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let base = if i % 2 == 0 { 0.0 } else { 5.0 };
            base + ((i * 7 + j * 3) % 10) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_grid_search_picks_a_candidate_and_refits() {
        let (x, y) = separable(30);
        let mut grid = ParamGrid::new();
        grid.insert("n_neighbors".into(), vec![ParamValue::Int(1), ParamValue::Int(3)]);

        let result = GridSearch::new(ModelFamily::KNearestNeighbors, grid)
            .with_cv_folds(3)
            .fit(&x, &y)
            .unwrap();

        assert_eq!(result.candidates.len(), 2);
        assert!((result.best_score - 1.0).abs() < 1e-12);
        // Both score perfectly; the first wins
        assert_eq!(result.best_params["n_neighbors"], ParamValue::Int(1));
        let pred = result.best_model.predict(&x).unwrap();
        assert_eq!(pred, y);
    }

    #[test]
    fn test_empty_grid_fits_defaults() {
        let (x, y) = separable(24);
        let result = GridSearch::new(ModelFamily::LogisticRegression, ParamGrid::new())
            .fit(&x, &y)
            .unwrap();
        assert!(result.best_params.is_empty());
        assert_eq!(result.best_model.family(), ModelFamily::LogisticRegression);
    }

    #[test]
    fn test_malformed_grid_is_rejected() {
        let (x, y) = separable(12);
        let mut grid = ParamGrid::new();
        grid.insert("depth".into(), vec![ParamValue::Int(2)]);
        let err = GridSearch::new(ModelFamily::DecisionTree, grid).fit(&x, &y).unwrap_err();
        assert!(matches!(err, NetsecError::InvalidParameter { .. }));
    }
}
