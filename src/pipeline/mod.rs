//! The four training stages and the driver that chains them

pub mod ingestion;
pub mod model_trainer;
pub mod transformation;
pub mod validation;

pub use ingestion::DataIngestion;
pub use model_trainer::{ModelReport, ModelTrainer};
pub use transformation::DataTransformation;
pub use validation::{DataSchema, DataValidation};

use tracing::info;

use crate::artifacts::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
use crate::config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelTrainerConfig,
    TrainingPipelineConfig,
};
use crate::error::PipelineError;
use crate::extract::DataSource;

/// Artifacts of one complete run
#[derive(Debug, Clone)]
pub struct PipelineArtifacts {
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub model_trainer: ModelTrainerArtifact,
}

/// Runs ingestion, validation, transformation and training in order
pub struct TrainingPipeline {
    config: TrainingPipelineConfig,
    source: DataSource,
}

impl TrainingPipeline {
    pub fn new(config: TrainingPipelineConfig, source: DataSource) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &TrainingPipelineConfig {
        &self.config
    }

    pub fn start_data_ingestion(&self) -> Result<DataIngestionArtifact, PipelineError> {
        info!("Initiating data ingestion");
        DataIngestion::new(DataIngestionConfig::new(&self.config), self.source.clone())
            .initiate_data_ingestion()
    }

    pub fn start_data_validation(
        &self,
        ingestion: DataIngestionArtifact,
    ) -> Result<DataValidationArtifact, PipelineError> {
        info!("Initiating data validation");
        DataValidation::new(ingestion, DataValidationConfig::new(&self.config)).initiate_data_validation()
    }

    pub fn start_data_transformation(
        &self,
        validation: DataValidationArtifact,
    ) -> Result<DataTransformationArtifact, PipelineError> {
        info!("Initiating data transformation");
        DataTransformation::new(validation, DataTransformationConfig::new(&self.config))
            .initiate_data_transformation()
    }

    pub fn start_model_trainer(
        &self,
        transformation: DataTransformationArtifact,
    ) -> Result<ModelTrainerArtifact, PipelineError> {
        info!("Initiating model training");
        ModelTrainer::new(ModelTrainerConfig::new(&self.config), transformation).initiate_model_trainer()
    }

    /// Run every stage; the first failure stops the run
    pub fn run_pipeline(&self) -> Result<PipelineArtifacts, PipelineError> {
        info!(
            pipeline = %self.config.pipeline_name,
            artifact_dir = %self.config.artifact_dir.display(),
            source = %self.source.describe(),
            "Starting training pipeline"
        );
        let ingestion = self.start_data_ingestion()?;
        let validation = self.start_data_validation(ingestion.clone())?;
        let transformation = self.start_data_transformation(validation.clone())?;
        let model_trainer = self.start_model_trainer(transformation.clone())?;

        info!(
            model = %model_trainer.best_model_name,
            score = model_trainer.best_model_score,
            "Training pipeline finished"
        );
        Ok(PipelineArtifacts {
            ingestion,
            validation,
            transformation,
            model_trainer,
        })
    }
}
