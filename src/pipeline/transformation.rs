//! Data transformation stage: impute features and persist numeric arrays

use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::DataFrame;
use tracing::info;

use crate::artifacts::{DataTransformationArtifact, DataValidationArtifact};
use crate::config::DataTransformationConfig;
use crate::error::{NetsecError, PipelineError, Result, Stage, StageResultExt};
use crate::training::Preprocessor;
use crate::utils::{column_names, column_to_vec, columns_to_array2, has_column, save_object, DataLoader};

const STAGE: Stage = Stage::Transformation;

/// Fits the preprocessor on train and applies it to both partitions
pub struct DataTransformation {
    validation_artifact: DataValidationArtifact,
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(validation_artifact: DataValidationArtifact, config: DataTransformationConfig) -> Self {
        Self {
            validation_artifact,
            config,
        }
    }

    pub fn initiate_data_transformation(
        &self,
    ) -> std::result::Result<DataTransformationArtifact, PipelineError> {
        let loader = DataLoader::new();
        let train_df = loader
            .load_csv(&self.validation_artifact.valid_train_file_path)
            .in_stage(STAGE)?;
        let test_df = loader
            .load_csv(&self.validation_artifact.valid_test_file_path)
            .in_stage(STAGE)?;

        let feature_names: Vec<String> = column_names(&train_df)
            .into_iter()
            .filter(|c| c != &self.config.target_column)
            .collect();

        let (x_train, y_train) = self
            .split_features_target(&train_df, &feature_names)
            .in_stage(STAGE)?;
        let (x_test, y_test) = self
            .split_features_target(&test_df, &feature_names)
            .in_stage(STAGE)?;

        let mut preprocessor = Preprocessor::new(feature_names, self.config.imputer_n_neighbors);
        let x_train = preprocessor.fit_transform(&x_train).in_stage(STAGE)?;
        let x_test = preprocessor.transform(&x_test).in_stage(STAGE)?;
        info!(
            n_neighbors = self.config.imputer_n_neighbors,
            features = x_train.ncols(),
            "Fitted KNN imputer on train features"
        );

        let train_arr = with_target(x_train, y_train).in_stage(STAGE)?;
        let test_arr = with_target(x_test, y_test).in_stage(STAGE)?;

        save_object(&train_arr, &self.config.transformed_train_file_path).in_stage(STAGE)?;
        save_object(&test_arr, &self.config.transformed_test_file_path).in_stage(STAGE)?;
        preprocessor
            .save(&self.config.transformed_object_file_path)
            .in_stage(STAGE)?;
        preprocessor
            .save(&self.config.final_preprocessor_file_path)
            .in_stage(STAGE)?;

        let artifact = DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        };
        info!(?artifact, "Data transformation completed");
        Ok(artifact)
    }

    /// Feature matrix and target with `-1` mapped to `0`
    fn split_features_target(
        &self,
        df: &DataFrame,
        feature_names: &[String],
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let target = &self.config.target_column;
        if !has_column(df, target) {
            return Err(NetsecError::SchemaError(format!(
                "target column '{}' not found",
                target
            )));
        }
        let y: Array1<f64> = column_to_vec(df, target)?
            .into_iter()
            .map(|v| if v == -1.0 { 0.0 } else { v })
            .collect();
        if y.iter().any(|v| v.is_nan()) {
            return Err(NetsecError::PreprocessingError(format!(
                "target column '{}' has missing values",
                target
            )));
        }
        let x = columns_to_array2(df, feature_names)?;
        Ok((x, y))
    }
}

/// `[features | target]`, target as the last column
fn with_target(x: Array2<f64>, y: Array1<f64>) -> Result<Array2<f64>> {
    let y = y.insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[x.view(), y.view()])?)
}
