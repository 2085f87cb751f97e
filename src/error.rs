//! Error types for the network security pipeline

use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// Result type alias for pipeline internals
pub type Result<T> = std::result::Result<T, NetsecError>;

/// Cause of a failure inside a stage
#[derive(Error, Debug)]
pub enum NetsecError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Document store server selection timed out: {0}")]
    DocumentStoreTimeout(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<polars::error::PolarsError> for NetsecError {
    fn from(err: polars::error::PolarsError) -> Self {
        NetsecError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for NetsecError {
    fn from(err: serde_json::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for NetsecError {
    fn from(err: serde_yaml::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for NetsecError {
    fn from(err: bincode::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for NetsecError {
    fn from(err: ndarray::ShapeError) -> Self {
        NetsecError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<mongodb::error::Error> for NetsecError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            mongodb::error::ErrorKind::ServerSelection { .. } => {
                NetsecError::DocumentStoreTimeout(err.to_string())
            }
            _ => NetsecError::DocumentStore(err.to_string()),
        }
    }
}

/// Pipeline stage that raised a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Ingestion,
    Validation,
    Transformation,
    ModelTrainer,
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Ingestion => "data ingestion",
            Stage::Validation => "data validation",
            Stage::Transformation => "data transformation",
            Stage::ModelTrainer => "model trainer",
            Stage::Prediction => "prediction",
        };
        f.write_str(name)
    }
}

/// Unified error raised by every public stage entry point.
///
/// Records where the failure crossed the stage boundary and keeps the
/// underlying [`NetsecError`] as its source.
#[derive(Debug)]
pub struct PipelineError {
    stage: Stage,
    file: &'static str,
    line: u32,
    source: NetsecError,
}

impl PipelineError {
    /// Wrap `source`, recording the caller's file and line
    #[track_caller]
    pub fn new(stage: Stage, source: NetsecError) -> Self {
        let location = Location::caller();
        Self {
            stage,
            file: location.file(),
            line: location.line(),
            source,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// The wrapped cause
    pub fn cause(&self) -> &NetsecError {
        &self.source
    }

    /// Whether the failure was a document-store connectivity timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, NetsecError::DocumentStoreTimeout(_))
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error in {} stage at {}:{}: {}",
            self.stage, self.file, self.line, self.source
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Lift an internal [`Result`] across a stage boundary
pub trait StageResultExt<T> {
    fn in_stage(self, stage: Stage) -> std::result::Result<T, PipelineError>;
}

impl<T> StageResultExt<T> for Result<T> {
    #[track_caller]
    fn in_stage(self, stage: Stage) -> std::result::Result<T, PipelineError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::new(stage, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = NetsecError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NetsecError = io_err.into();
        assert!(matches!(err, NetsecError::IoError(_)));
    }

    #[test]
    fn test_pipeline_error_records_call_site() {
        let result: Result<()> = Err(NetsecError::SchemaError("31 != 30".to_string()));
        let line = line!() + 1;
        let err = result.in_stage(Stage::Validation).unwrap_err();

        assert_eq!(err.stage(), Stage::Validation);
        assert_eq!(err.line(), line);
        assert!(err.file().ends_with("error.rs"));
        assert!(err.to_string().contains("data validation"));
        assert!(err.to_string().contains("31 != 30"));
    }

    #[test]
    fn test_pipeline_error_keeps_source() {
        let err = PipelineError::new(Stage::Ingestion, NetsecError::ModelNotFitted);
        let source = err.source().expect("source should be chained");
        assert_eq!(source.to_string(), "Model not fitted");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_is_recognized() {
        let err = PipelineError::new(
            Stage::Extraction,
            NetsecError::DocumentStoreTimeout("no servers".to_string()),
        );
        assert!(err.is_timeout());
    }
}
