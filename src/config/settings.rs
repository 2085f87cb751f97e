//! Tunable pipeline settings, optionally loaded from a YAML file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::*;
use crate::error::{NetsecError, Result};
use crate::training::{ModelFamily, ParamGrid, SelectionMetric};

/// Overridable knobs for a pipeline run.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes:
///
/// ```yaml
/// train_test_split_ratio: 0.25
/// param_grids:
///   random_forest:
///     n_estimators: [16, 64]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Label column name
    pub target_column: String,
    /// Fraction of rows held out for the test partition
    pub train_test_split_ratio: f64,
    /// Seed for the split shuffle, CV folds and tree ensembles
    pub random_seed: u64,
    /// Expected-columns schema for validation
    pub schema_file_path: PathBuf,
    /// KS p-value below which a column is flagged as drifted
    pub drift_threshold: f64,
    /// Neighbors used by the KNN imputer
    pub imputer_n_neighbors: usize,
    /// Folds for grid-search cross-validation
    pub cv_folds: usize,
    /// Test-set statistic used to pick the best model
    pub selection_metric: SelectionMetric,
    /// Per-family grid overrides; families not listed keep their defaults
    pub param_grids: BTreeMap<ModelFamily, ParamGrid>,
    /// Where the final predictor and preprocessor are copied
    pub final_model_dir: PathBuf,
    /// Experiment tracking directory
    pub tracking_dir: PathBuf,
    /// Log runs to the tracking directory
    pub tracking_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_column: TARGET_COLUMN.to_string(),
            train_test_split_ratio: DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO,
            random_seed: DEFAULT_RANDOM_SEED,
            schema_file_path: PathBuf::from(SCHEMA_FILE_PATH),
            drift_threshold: DATA_VALIDATION_DRIFT_THRESHOLD,
            imputer_n_neighbors: IMPUTER_N_NEIGHBORS,
            cv_folds: MODEL_TRAINER_CV_FOLDS,
            selection_metric: SelectionMetric::default(),
            param_grids: BTreeMap::new(),
            final_model_dir: PathBuf::from(FINAL_MODEL_DIR),
            tracking_dir: PathBuf::from(TRACKING_DIR_NAME),
            tracking_enabled: true,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NetsecError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Self = serde_yaml::from_str(&content)?;
        settings.validate()?;
        info!(path = %path.display(), "Loaded pipeline settings");
        Ok(settings)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.train_test_split_ratio > 0.0 && self.train_test_split_ratio < 1.0) {
            return Err(invalid("train_test_split_ratio", self.train_test_split_ratio, "must be in (0, 1)"));
        }
        if !(self.drift_threshold > 0.0 && self.drift_threshold < 1.0) {
            return Err(invalid("drift_threshold", self.drift_threshold, "must be in (0, 1)"));
        }
        if self.imputer_n_neighbors == 0 {
            return Err(invalid("imputer_n_neighbors", 0, "must be at least 1"));
        }
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", self.cv_folds, "must be at least 2"));
        }
        if self.target_column.is_empty() {
            return Err(invalid("target_column", "\"\"", "must not be empty"));
        }
        Ok(())
    }

    /// Grid for `family`: the override if present, the built-in default otherwise
    pub fn param_grid(&self, family: ModelFamily) -> ParamGrid {
        self.param_grids
            .get(&family)
            .cloned()
            .unwrap_or_else(|| family.default_grid())
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> NetsecError {
    NetsecError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.target_column, "Result");
        assert_eq!(settings.imputer_n_neighbors, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "train_test_split_ratio: 0.3\nparam_grids:\n  random_forest:\n    n_estimators: [4, 8]\n";
        let settings: PipelineSettings = serde_yaml::from_str(yaml).unwrap();

        assert!((settings.train_test_split_ratio - 0.3).abs() < 1e-12);
        assert_eq!(settings.cv_folds, 3);

        let grid = settings.param_grid(ModelFamily::RandomForest);
        assert_eq!(grid["n_estimators"], vec![ParamValue::Int(4), ParamValue::Int(8)]);

        // Untouched family falls back to its built-in grid
        let dt = settings.param_grid(ModelFamily::DecisionTree);
        assert_eq!(dt["criterion"].len(), 3);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let settings = PipelineSettings {
            train_test_split_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(NetsecError::InvalidParameter { .. })
        ));
    }
}
