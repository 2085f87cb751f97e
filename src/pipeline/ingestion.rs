//! Data ingestion stage

use polars::prelude::DataFrame;
use tracing::info;

use crate::artifacts::DataIngestionArtifact;
use crate::config::DataIngestionConfig;
use crate::constants::ID_COLUMN;
use crate::error::{NetsecError, PipelineError, Result, Stage, StageResultExt};
use crate::extract::DataSource;
use crate::utils::{drop_column_if_present, train_test_split, DataSaver};

const STAGE: Stage = Stage::Ingestion;

/// Pulls raw records into the run directory and splits them
pub struct DataIngestion {
    config: DataIngestionConfig,
    source: DataSource,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, source: DataSource) -> Self {
        Self { config, source }
    }

    /// Load the source, write the feature store, then write train/test partitions
    pub fn initiate_data_ingestion(&self) -> std::result::Result<DataIngestionArtifact, PipelineError> {
        let df = self.export_collection_as_dataframe().in_stage(STAGE)?;
        let mut df = self.export_data_into_feature_store(df).in_stage(STAGE)?;
        self.split_data_as_train_test(&mut df).in_stage(STAGE)?;

        let artifact = DataIngestionArtifact {
            feature_store_file_path: self.config.feature_store_file_path.clone(),
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        };
        info!(?artifact, "Data ingestion completed");
        Ok(artifact)
    }

    fn export_collection_as_dataframe(&self) -> Result<DataFrame> {
        let df = self.source.load()?;
        let df = drop_column_if_present(df, ID_COLUMN)?;
        if df.height() == 0 || df.width() == 0 {
            return Err(NetsecError::DataError(format!(
                "no records found in {}",
                self.source.describe()
            )));
        }
        Ok(df)
    }

    fn export_data_into_feature_store(&self, mut df: DataFrame) -> Result<DataFrame> {
        DataSaver::save_csv(&mut df, &self.config.feature_store_file_path)?;
        info!(
            path = %self.config.feature_store_file_path.display(),
            rows = df.height(),
            "Wrote feature store"
        );
        Ok(df)
    }

    fn split_data_as_train_test(&self, df: &mut DataFrame) -> Result<()> {
        let (mut train, mut test) = train_test_split(
            df,
            self.config.train_test_split_ratio,
            self.config.random_seed,
        )?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            ratio = self.config.train_test_split_ratio,
            "Performed train test split"
        );

        DataSaver::save_csv(&mut train, &self.config.training_file_path)?;
        DataSaver::save_csv(&mut test, &self.config.testing_file_path)?;
        Ok(())
    }
}
