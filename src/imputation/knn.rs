//! KNN-based imputation

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{NetsecError, Result};
use crate::imputation::{is_missing, Imputer};

/// How donor values are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnnWeights {
    #[default]
    Uniform,
    Distance,
}

/// KNN imputer over a NaN-aware euclidean distance.
///
/// For each missing entry `(i, j)` the donors are the `n_neighbors` closest
/// fitted rows that have feature `j` present. Distances use only the
/// coordinates present in both rows, scaled up by
/// `n_features / n_present`. When no donor exists the fitted column mean is
/// used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    /// Number of neighbors
    n_neighbors: usize,
    weights: KnnWeights,
    /// Training rows, missing entries included
    fit_data: Option<Array2<f64>>,
    /// Column means over present values; 0 for all-missing columns
    feature_means: Option<Array1<f64>>,
}

impl KNNImputer {
    /// Create new KNN imputer
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights: KnnWeights::Uniform,
            fit_data: None,
            feature_means: None,
        }
    }

    /// Set weighting scheme
    pub fn with_weights(mut self, weights: KnnWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.fit_data.is_some()
    }

    /// Euclidean distance over coordinates present in both rows.
    /// `None` when the rows share no present coordinate.
    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
        let mut present = 0usize;
        let mut accum = 0.0f64;

        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            present += 1;
            let d = ai - bi;
            accum += d * d;
        }

        if present == 0 {
            return None;
        }
        let scale = a.len() as f64 / present as f64;
        Some((accum * scale).sqrt())
    }

    /// Impute one missing feature from the donor distances
    fn impute_value(&self, data: &Array2<f64>, donors: &[(usize, f64)], feature_idx: usize) -> f64 {
        let mean = self
            .feature_means
            .as_ref()
            .map(|m| m[feature_idx])
            .unwrap_or(0.0);

        if donors.is_empty() {
            return mean;
        }

        match self.weights {
            KnnWeights::Distance => {
                // An exact match dominates
                if let Some(&(idx, _)) = donors.iter().find(|&&(_, d)| d == 0.0) {
                    return data[[idx, feature_idx]];
                }
                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                for &(idx, dist) in donors {
                    let weight = 1.0 / dist;
                    weighted_sum += data[[idx, feature_idx]] * weight;
                    weight_sum += weight;
                }
                if weight_sum > 0.0 {
                    weighted_sum / weight_sum
                } else {
                    mean
                }
            }
            KnnWeights::Uniform => {
                let sum: f64 = donors.iter().map(|&(idx, _)| data[[idx, feature_idx]]).sum();
                sum / donors.len() as f64
            }
        }
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::new(crate::constants::IMPUTER_N_NEIGHBORS)
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(NetsecError::PreprocessingError(
                "Cannot fit KNN imputer on an empty matrix".to_string(),
            ));
        }

        let feature_means: Array1<f64> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let (sum, count) = col
                    .iter()
                    .filter(|v| !is_missing(**v))
                    .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();

        self.fit_data = Some(x.clone());
        self.feature_means = Some(feature_means);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let data = self.fit_data.as_ref().ok_or(NetsecError::ModelNotFitted)?;

        if x.ncols() != data.ncols() {
            return Err(NetsecError::ShapeError {
                expected: format!("{} features", data.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut result = x.clone();

        for (row_idx, row) in x.rows().into_iter().enumerate() {
            if !row.iter().any(|&v| is_missing(v)) {
                continue;
            }

            // Distances to every fitted row, computed once per incomplete row
            let distances: Vec<Option<f64>> = data
                .rows()
                .into_iter()
                .map(|fit_row| Self::distance(row, fit_row))
                .collect();

            for j in 0..x.ncols() {
                if !is_missing(row[j]) {
                    continue;
                }

                let mut donors: Vec<(usize, f64)> = distances
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| match d {
                        Some(d) if !is_missing(data[[i, j]]) => Some((i, *d)),
                        _ => None,
                    })
                    .collect();

                // Stable: equal distances keep fitted-row order
                donors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
                donors.truncate(self.n_neighbors);

                result[[row_idx, j]] = self.impute_value(data, &donors, j);
            }
        }

        Ok(result)
    }
}
