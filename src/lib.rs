//! netsec-pipeline - batch training pipeline for a phishing website classifier
//!
//! This crate provides the whole path from raw records to a saved predictor:
//! - Extraction from CSV files or a MongoDB collection
//! - Ingestion with a seeded train/test split
//! - Schema and distribution-drift validation
//! - KNN imputation of missing features
//! - Grid-searched training over a fixed classifier roster
//!
//! # Modules
//!
//! ## Pipeline
//! - [`extract`] - Data sources and document-store upload
//! - [`pipeline`] - The four stages and their driver
//! - [`artifacts`] - Records handed between stages
//! - [`config`] - Run-scoped stage configuration and settings
//!
//! ## ML
//! - [`training`] - Classifiers, grid search, metrics, final predictor
//! - [`imputation`] - Missing value imputation
//! - [`drift`] - Two-sample drift tests
//! - [`tracking`] - Experiment tracking
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod constants;
pub mod config;
pub mod artifacts;

// Pipeline
pub mod extract;
pub mod pipeline;

// ML
pub mod training;
pub mod imputation;
pub mod drift;
pub mod tracking;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{NetsecError, PipelineError, Result, Stage};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{NetsecError, PipelineError, Result, Stage, StageResultExt};

    // Configuration
    pub use crate::config::{PipelineSettings, TrainingPipelineConfig};

    // Pipeline
    pub use crate::extract::DataSource;
    pub use crate::pipeline::{PipelineArtifacts, TrainingPipeline};

    // Training
    pub use crate::training::{Classifier, Model, ModelFamily, NetworkModel, ParamGrid, ParamValue, Preprocessor};

    // Tracking
    pub use crate::tracking::{ExperimentTracker, LocalTracker, RunRecord};
}
