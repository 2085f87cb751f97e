//! Run records and the tracker trait

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::ClassificationMetricArtifact;
use crate::error::Result;

/// One logged run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    /// RFC 3339 start time
    pub started_at: String,
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
}

impl RunRecord {
    /// New run with a fresh id, stamped now
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_name: run_name.into(),
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            metrics: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Log the three classification metrics under their tracked names
    pub fn with_classification_metrics(self, metrics: &ClassificationMetricArtifact) -> Self {
        self.with_metric("f1_score", metrics.f1_score)
            .with_metric("precision_score", metrics.precision_score)
            .with_metric("recall_score", metrics.recall_score)
    }
}

/// Sink for run records and model blobs
pub trait ExperimentTracker: Send + Sync {
    fn log_run(&self, run: &RunRecord, model: &[u8]) -> Result<()>;
}

/// Tracker that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_run(&self, _run: &RunRecord, _model: &[u8]) -> Result<()> {
        Ok(())
    }
}
