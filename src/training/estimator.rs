//! Fitted preprocessor and the final wrapped predictor

use std::path::Path;

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::classifier::Classifier;
use super::models::Model;
use crate::error::{NetsecError, Result};
use crate::imputation::{Imputer, KNNImputer, KnnWeights};
use crate::utils::{columns_to_array2, has_column, load_object, save_object};

/// Feature preprocessing fitted on the training partition.
///
/// Holds the feature column order so raw frames can be transformed without
/// the caller knowing the layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    feature_names: Vec<String>,
    imputer: KNNImputer,
}

impl Preprocessor {
    pub fn new(feature_names: Vec<String>, n_neighbors: usize) -> Self {
        Self {
            feature_names,
            imputer: KNNImputer::new(n_neighbors).with_weights(KnnWeights::Uniform),
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_fitted(&self) -> bool {
        self.imputer.is_fitted()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.feature_names.len() {
            return Err(NetsecError::ShapeError {
                expected: format!("{} features", self.feature_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.imputer.fit(x)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.imputer.transform(x)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Select the fitted feature columns from `df` and impute them
    pub fn transform_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if let Some(missing) = self.feature_names.iter().find(|c| !has_column(df, c)) {
            return Err(NetsecError::SchemaError(format!(
                "input is missing feature column '{}'",
                missing
            )));
        }
        let x = columns_to_array2(df, &self.feature_names)?;
        self.transform(&x)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(self, path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }
}

/// Preprocessor and classifier bundled into one predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    preprocessor: Preprocessor,
    model: Classifier,
}

impl NetworkModel {
    pub fn new(preprocessor: Preprocessor, model: Classifier) -> Result<Self> {
        if !preprocessor.is_fitted() {
            return Err(NetsecError::ModelNotFitted);
        }
        Ok(Self { preprocessor, model })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &Classifier {
        &self.model
    }

    /// Impute `x`, then classify it
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_transformed = self.preprocessor.transform(x)?;
        self.model.predict(&x_transformed)
    }

    pub fn predict_frame(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x_transformed = self.preprocessor.transform_frame(df)?;
        self.model.predict(&x_transformed)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        save_object(self, path)?;
        info!(path = %path.display(), model = self.model.family().name(), "Saved network model");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelFamily, ParamSet};
    use ndarray::array;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn training_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 1.0],
            [0.1, 0.9],
            [0.2, 1.1],
            [1.0, 0.0],
            [0.9, 0.1],
            [1.1, 0.2]
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_preprocessor_round_trip_is_identical() {
        let (x, _) = training_data();
        let mut pre = Preprocessor::new(names(2), 3);
        pre.fit(&x).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocessing.bin");
        pre.save(&path).unwrap();
        let loaded = Preprocessor::load(&path).unwrap();

        let queries = array![[f64::NAN, 0.95], [0.05, f64::NAN]];
        assert_eq!(pre.transform(&queries).unwrap(), loaded.transform(&queries).unwrap());
        assert_eq!(loaded.feature_names(), pre.feature_names());
    }

    #[test]
    fn test_preprocessor_rejects_width_mismatch() {
        let (x, _) = training_data();
        let mut pre = Preprocessor::new(names(3), 3);
        assert!(matches!(pre.fit(&x), Err(NetsecError::ShapeError { .. })));
    }

    #[test]
    fn test_network_model_imputes_before_predicting() {
        let (x, y) = training_data();
        let mut pre = Preprocessor::new(names(2), 3);
        pre.fit(&x).unwrap();
        let mut model = ModelFamily::DecisionTree.build(&ParamSet::new(), 0).unwrap();
        model.fit(&x, &y).unwrap();

        let network = NetworkModel::new(pre, model).unwrap();
        let queries = array![[f64::NAN, 1.0], [1.0, f64::NAN]];
        let first = network.predict(&queries).unwrap();
        assert_eq!(first, array![0.0, 1.0]);
        assert_eq!(network.predict(&queries).unwrap(), first);
    }

    #[test]
    fn test_unfitted_preprocessor_is_rejected() {
        let pre = Preprocessor::new(names(2), 3);
        let model = ModelFamily::DecisionTree.build(&ParamSet::new(), 0).unwrap();
        assert!(matches!(NetworkModel::new(pre, model), Err(NetsecError::ModelNotFitted)));
    }

    #[test]
    fn test_transform_frame_selects_columns_by_name() {
        let (x, _) = training_data();
        let mut pre = Preprocessor::new(names(2), 3);
        pre.fit(&x).unwrap();

        let df = polars::df!("f1" => &[1.0], "extra" => &[9.0], "f0" => &[0.0]).unwrap();
        let out = pre.transform_frame(&df).unwrap();
        assert_eq!(out, array![[0.0, 1.0]]);

        let missing = polars::df!("f0" => &[0.0]).unwrap();
        assert!(pre.transform_frame(&missing).is_err());
    }
}
