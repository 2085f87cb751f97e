//! Data validation stage: schema column count and train/test drift

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::{DataFrame, DataType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{DataIngestionArtifact, DataValidationArtifact};
use crate::config::DataValidationConfig;
use crate::drift::{DriftReport, KolmogorovSmirnovTest};
use crate::error::{NetsecError, PipelineError, Result, Stage, StageResultExt};
use crate::utils::{column_names, column_values, copy_file, has_column, read_yaml, write_yaml, DataLoader};

/// Expected layout of the raw data.
///
/// ```yaml
/// columns:
///   - having_IP_Address: int64
///   - Result: int64
/// numerical_columns:
///   - having_IP_Address
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSchema {
    #[serde(default)]
    pub columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
}

impl DataSchema {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_yaml(path)
    }

    /// Schema listing every column of `df` by name
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| {
                let mut entry = BTreeMap::new();
                entry.insert(c.name().to_string(), c.dtype().to_string());
                entry
            })
            .collect();
        Self {
            columns,
            numerical_columns: Vec::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

const STAGE: Stage = Stage::Validation;

/// Checks ingested partitions and reports drift
pub struct DataValidation {
    ingestion_artifact: DataIngestionArtifact,
    config: DataValidationConfig,
}

impl DataValidation {
    pub fn new(ingestion_artifact: DataIngestionArtifact, config: DataValidationConfig) -> Self {
        Self {
            ingestion_artifact,
            config,
        }
    }

    pub fn initiate_data_validation(&self) -> std::result::Result<DataValidationArtifact, PipelineError> {
        let loader = DataLoader::new();
        let train_df = loader
            .load_csv(&self.ingestion_artifact.trained_file_path)
            .in_stage(STAGE)?;
        let test_df = loader
            .load_csv(&self.ingestion_artifact.test_file_path)
            .in_stage(STAGE)?;

        let schema = self.load_schema(&train_df).in_stage(STAGE)?;
        self.validate_number_of_columns(&schema, &train_df, "train")
            .in_stage(STAGE)?;
        self.validate_number_of_columns(&schema, &test_df, "test")
            .in_stage(STAGE)?;
        self.warn_missing_numerical_columns(&schema, &train_df);

        let report = self.detect_dataset_drift(&train_df, &test_df).in_stage(STAGE)?;
        write_yaml(&report, &self.config.drift_report_file_path).in_stage(STAGE)?;

        copy_file(
            &self.ingestion_artifact.trained_file_path,
            &self.config.valid_train_file_path,
        )
        .in_stage(STAGE)?;
        copy_file(
            &self.ingestion_artifact.test_file_path,
            &self.config.valid_test_file_path,
        )
        .in_stage(STAGE)?;

        let validation_status = !report.has_drift();
        if !validation_status {
            warn!(columns = ?report.drifted_columns(), "Drift detected between train and test");
        }

        let artifact = DataValidationArtifact {
            validation_status,
            valid_train_file_path: self.config.valid_train_file_path.clone(),
            valid_test_file_path: self.config.valid_test_file_path.clone(),
            invalid_train_file_path: None,
            invalid_test_file_path: None,
            drift_report_file_path: self.config.drift_report_file_path.clone(),
        };
        info!(?artifact, "Data validation completed");
        Ok(artifact)
    }

    fn load_schema(&self, train_df: &DataFrame) -> Result<DataSchema> {
        let path = &self.config.schema_file_path;
        if path.exists() {
            return DataSchema::load(path);
        }
        warn!(
            path = %path.display(),
            "Schema file not found, expecting the train partition's columns"
        );
        Ok(DataSchema::from_frame(train_df))
    }

    fn validate_number_of_columns(&self, schema: &DataSchema, df: &DataFrame, partition: &str) -> Result<()> {
        let expected = schema.column_count();
        info!(partition, expected, actual = df.width(), "Checking number of columns");
        if df.width() != expected {
            return Err(NetsecError::SchemaError(format!(
                "{} partition has {} columns, schema requires {}",
                partition,
                df.width(),
                expected
            )));
        }
        Ok(())
    }

    fn warn_missing_numerical_columns(&self, schema: &DataSchema, df: &DataFrame) {
        let missing: Vec<&str> = schema
            .numerical_columns
            .iter()
            .filter(|c| !has_column(df, c))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            warn!(columns = ?missing, "Numerical columns missing from the data");
        }
    }

    /// KS test per numeric column shared by both partitions, in train order
    pub fn detect_dataset_drift(&self, base_df: &DataFrame, current_df: &DataFrame) -> Result<DriftReport> {
        let ks = KolmogorovSmirnovTest::new(self.config.drift_threshold);
        let mut report = DriftReport::new();

        for column in column_names(base_df) {
            if !has_column(current_df, &column) || !is_numeric(base_df, &column)? {
                continue;
            }
            let base = column_values(base_df, &column)?;
            let current = column_values(current_df, &column)?;
            report.insert(column, ks.detect(&base, &current));
        }
        Ok(report)
    }
}

fn is_numeric(df: &DataFrame, name: &str) -> Result<bool> {
    let dtype = df.column(name)?.dtype().clone();
    Ok(matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineSettings, TrainingPipelineConfig};
    use crate::drift::ColumnDrift;
    use crate::utils::DataSaver;
    use polars::df;

    fn setup(
        dir: &Path,
        mut train: DataFrame,
        mut test: DataFrame,
        schema: Option<&str>,
    ) -> (DataIngestionArtifact, DataValidationConfig) {
        let train_path = dir.join("ingested/train.csv");
        let test_path = dir.join("ingested/test.csv");
        DataSaver::save_csv(&mut train, &train_path).unwrap();
        DataSaver::save_csv(&mut test, &test_path).unwrap();

        let schema_path = dir.join("schema.yaml");
        if let Some(content) = schema {
            std::fs::write(&schema_path, content).unwrap();
        }
        let settings = PipelineSettings {
            schema_file_path: schema_path,
            ..Default::default()
        };
        let pipeline = TrainingPipelineConfig::new(dir.join("Artifacts"), settings);
        let artifact = DataIngestionArtifact {
            feature_store_file_path: dir.join("unused.csv"),
            trained_file_path: train_path,
            test_file_path: test_path,
        };
        (artifact, DataValidationConfig::new(&pipeline))
    }

    fn values(n: usize, offset: f64) -> Vec<f64> {
        (0..n).map(|i| (i % 10) as f64 + offset).collect()
    }

    #[test]
    fn test_no_drift_on_same_distribution() {
        let dir = tempfile::tempdir().unwrap();
        let train = df!("a" => values(200, 0.0), "Result" => values(200, 0.0)).unwrap();
        let test = df!("a" => values(50, 0.0), "Result" => values(50, 0.0)).unwrap();
        let (ingestion, config) = setup(dir.path(), train, test, None);

        let artifact = DataValidation::new(ingestion, config).initiate_data_validation().unwrap();
        assert!(artifact.validation_status);
        assert!(artifact.valid_train_file_path.exists());
        assert!(artifact.valid_test_file_path.exists());
        assert!(artifact.invalid_train_file_path.is_none());

        let report = std::fs::read_to_string(&artifact.drift_report_file_path).unwrap();
        let parsed: BTreeMap<String, ColumnDrift> = serde_yaml::from_str(&report).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(!parsed["a"].drift_status);
    }

    #[test]
    fn test_shifted_column_is_flagged_but_stage_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let train = df!("a" => values(200, 0.0), "b" => values(200, 0.0)).unwrap();
        let test = df!("a" => values(100, 50.0), "b" => values(100, 0.0)).unwrap();
        let (ingestion, config) = setup(dir.path(), train, test, None);

        let artifact = DataValidation::new(ingestion, config).initiate_data_validation().unwrap();
        assert!(!artifact.validation_status);

        let report = std::fs::read_to_string(&artifact.drift_report_file_path).unwrap();
        let parsed: BTreeMap<String, ColumnDrift> = serde_yaml::from_str(&report).unwrap();
        assert!(parsed["a"].drift_status);
        assert!(parsed["a"].p_value < 0.05);
        assert!(!parsed["b"].drift_status);
    }

    #[test]
    fn test_column_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let train = df!("a" => values(20, 0.0), "b" => values(20, 0.0)).unwrap();
        let test = df!("a" => values(5, 0.0), "b" => values(5, 0.0)).unwrap();
        let schema = "columns:\n  - a: int64\n  - b: int64\n  - c: int64\nnumerical_columns: [a, b, c]\n";
        let (ingestion, config) = setup(dir.path(), train, test, Some(schema));

        let err = DataValidation::new(ingestion, config).initiate_data_validation().unwrap_err();
        assert_eq!(err.stage(), Stage::Validation);
        assert!(matches!(err.cause(), NetsecError::SchemaError(msg) if msg.contains("3")));
    }

    #[test]
    fn test_error_location_names_the_failing_step() {
        let dir = tempfile::tempdir().unwrap();
        let train = df!("a" => values(20, 0.0), "b" => values(20, 0.0)).unwrap();
        let test = df!("a" => values(5, 0.0), "b" => values(5, 0.0)).unwrap();
        let schema = "columns:\n  - a: int64\nnumerical_columns: [a]\n";
        let (ingestion, config) = setup(dir.path(), train, test, Some(schema));

        let mut missing = ingestion.clone();
        missing.trained_file_path = dir.path().join("absent.csv");
        let read_err = DataValidation::new(missing, config.clone())
            .initiate_data_validation()
            .unwrap_err();
        let schema_err = DataValidation::new(ingestion, config)
            .initiate_data_validation()
            .unwrap_err();

        assert!(read_err.file().ends_with("validation.rs"));
        assert!(schema_err.file().ends_with("validation.rs"));
        assert!(matches!(schema_err.cause(), NetsecError::SchemaError(_)));
        // Each step reports its own line, not the entry point's
        assert!(schema_err.line() > read_err.line());
    }

    #[test]
    fn test_all_null_column_reports_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        let train = df!("a" => values(20, 0.0), "n" => vec![None::<f64>; 20]).unwrap();
        let test = df!("a" => values(5, 0.0), "n" => vec![None::<f64>; 5]).unwrap();
        let (ingestion, config) = setup(dir.path(), train.clone(), test.clone(), None);

        let validation = DataValidation::new(ingestion, config);
        let report = validation.detect_dataset_drift(&train, &test).unwrap();
        let n = report.get("n").unwrap();
        assert_eq!(n.p_value, 1.0);
        assert!(!n.drift_status);
    }
}
