//! Run-scoped stage configuration
//!
//! A [`TrainingPipelineConfig`] fixes one timestamped run directory; each
//! stage config derives its paths from it. All of them are plain values,
//! built once per invocation and never mutated afterwards.

mod settings;

pub use settings::PipelineSettings;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::constants::*;
use crate::training::{ModelFamily, ParamGrid, SelectionMetric};

/// Shared configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct TrainingPipelineConfig {
    pub pipeline_name: String,
    /// Root holding all runs (`Artifacts` by default)
    pub artifact_name: PathBuf,
    /// `<artifact_name>/<timestamp>`
    pub artifact_dir: PathBuf,
    /// Destination for the final predictor, outside the run directory
    pub model_dir: PathBuf,
    pub timestamp: String,
    pub settings: PipelineSettings,
}

impl TrainingPipelineConfig {
    /// Config rooted at `artifact_root`, stamped with the current local time
    pub fn new(artifact_root: impl AsRef<Path>, settings: PipelineSettings) -> Self {
        Self::at(artifact_root, Local::now().naive_local(), settings)
    }

    /// Config rooted at `artifact_root` for an explicit timestamp
    pub fn at(artifact_root: impl AsRef<Path>, timestamp: NaiveDateTime, settings: PipelineSettings) -> Self {
        let timestamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let artifact_name = artifact_root.as_ref().to_path_buf();
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_dir: artifact_name.join(&timestamp),
            artifact_name,
            model_dir: settings.final_model_dir.clone(),
            timestamp,
            settings,
        }
    }
}

impl Default for TrainingPipelineConfig {
    fn default() -> Self {
        Self::new(ARTIFACT_DIR, PipelineSettings::default())
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub data_ingestion_dir: PathBuf,
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub train_test_split_ratio: f64,
    pub random_seed: u64,
}

impl DataIngestionConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let data_ingestion_dir = pipeline.artifact_dir.join(DATA_INGESTION_DIR_NAME);
        let ingested = data_ingestion_dir.join(DATA_INGESTION_INGESTED_DIR);
        Self {
            feature_store_file_path: data_ingestion_dir
                .join(DATA_INGESTION_FEATURE_STORE_DIR)
                .join(FILE_NAME),
            training_file_path: ingested.join(TRAIN_FILE_NAME),
            testing_file_path: ingested.join(TEST_FILE_NAME),
            train_test_split_ratio: pipeline.settings.train_test_split_ratio,
            random_seed: pipeline.settings.random_seed,
            data_ingestion_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub data_validation_dir: PathBuf,
    pub valid_data_dir: PathBuf,
    pub invalid_data_dir: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub drift_threshold: f64,
    pub schema_file_path: PathBuf,
}

impl DataValidationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let data_validation_dir = pipeline.artifact_dir.join(DATA_VALIDATION_DIR_NAME);
        let valid_data_dir = data_validation_dir.join(DATA_VALIDATION_VALID_DIR);
        let invalid_data_dir = data_validation_dir.join(DATA_VALIDATION_INVALID_DIR);
        Self {
            valid_train_file_path: valid_data_dir.join(TRAIN_FILE_NAME),
            valid_test_file_path: valid_data_dir.join(TEST_FILE_NAME),
            invalid_train_file_path: invalid_data_dir.join(TRAIN_FILE_NAME),
            invalid_test_file_path: invalid_data_dir.join(TEST_FILE_NAME),
            drift_report_file_path: data_validation_dir
                .join(DATA_VALIDATION_DRIFT_REPORT_DIR)
                .join(DATA_VALIDATION_DRIFT_REPORT_FILE_NAME),
            drift_threshold: pipeline.settings.drift_threshold,
            schema_file_path: pipeline.settings.schema_file_path.clone(),
            valid_data_dir,
            invalid_data_dir,
            data_validation_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub data_transformation_dir: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    pub final_preprocessor_file_path: PathBuf,
    pub target_column: String,
    pub imputer_n_neighbors: usize,
}

impl DataTransformationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let data_transformation_dir = pipeline.artifact_dir.join(DATA_TRANSFORMATION_DIR_NAME);
        let transformed = data_transformation_dir.join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR);
        Self {
            transformed_train_file_path: transformed.join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: transformed.join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: data_transformation_dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            final_preprocessor_file_path: pipeline.model_dir.join(FINAL_PREPROCESSOR_FILE_NAME),
            target_column: pipeline.settings.target_column.clone(),
            imputer_n_neighbors: pipeline.settings.imputer_n_neighbors,
            data_transformation_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub model_trainer_dir: PathBuf,
    pub trained_model_file_path: PathBuf,
    pub final_model_file_path: PathBuf,
    pub expected_accuracy: f64,
    pub overfitting_underfitting_threshold: f64,
    pub cv_folds: usize,
    pub selection_metric: SelectionMetric,
    pub param_grids: BTreeMap<ModelFamily, ParamGrid>,
    pub random_seed: u64,
    /// `None` disables experiment tracking
    pub tracking_dir: Option<PathBuf>,
}

impl ModelTrainerConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let settings = &pipeline.settings;
        let model_trainer_dir = pipeline.artifact_dir.join(MODEL_TRAINER_DIR_NAME);
        let param_grids = ModelFamily::ALL
            .iter()
            .map(|&family| (family, settings.param_grid(family)))
            .collect();
        Self {
            trained_model_file_path: model_trainer_dir
                .join(MODEL_TRAINER_TRAINED_MODEL_DIR)
                .join(MODEL_TRAINER_TRAINED_MODEL_NAME),
            final_model_file_path: pipeline.model_dir.join(MODEL_FILE_NAME),
            expected_accuracy: MODEL_TRAINER_EXPECTED_SCORE,
            overfitting_underfitting_threshold: MODEL_TRAINER_OVERFITTING_UNDERFITTING_THRESHOLD,
            cv_folds: settings.cv_folds,
            selection_metric: settings.selection_metric,
            param_grids,
            random_seed: settings.random_seed,
            tracking_dir: settings.tracking_enabled.then(|| settings.tracking_dir.clone()),
            model_trainer_dir,
        }
    }
}
