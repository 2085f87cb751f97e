//! Model trainer stage: search, select, score, track, persist

use std::time::Instant;

use ndarray::{s, Array1, Array2};
use tracing::{info, warn};

use crate::artifacts::{ClassificationMetricArtifact, DataTransformationArtifact, ModelTrainerArtifact};
use crate::config::ModelTrainerConfig;
use crate::error::{NetsecError, PipelineError, Result, Stage, StageResultExt};
use crate::tracking::{tracker_for, ExperimentTracker, RunRecord};
use crate::training::{
    describe_params, get_classification_score, Classifier, GridSearch, Model, ModelFamily,
    NetworkModel, ParamSet, Preprocessor,
};
use crate::utils::load_object;

/// Test-set score of one tuned family
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub family: ModelFamily,
    pub best_params: ParamSet,
    pub cv_score: f64,
    pub test_score: f64,
}

const STAGE: Stage = Stage::ModelTrainer;

/// Trains the roster and keeps the best classifier
pub struct ModelTrainer {
    config: ModelTrainerConfig,
    transformation_artifact: DataTransformationArtifact,
    tracker: Box<dyn ExperimentTracker>,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig, transformation_artifact: DataTransformationArtifact) -> Self {
        let tracker = tracker_for(config.tracking_dir.as_deref());
        Self {
            config,
            transformation_artifact,
            tracker,
        }
    }

    /// Replace the tracker derived from the config
    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn initiate_model_trainer(&self) -> std::result::Result<ModelTrainerArtifact, PipelineError> {
        let train_arr: Array2<f64> =
            load_object(&self.transformation_artifact.transformed_train_file_path).in_stage(STAGE)?;
        let test_arr: Array2<f64> =
            load_object(&self.transformation_artifact.transformed_test_file_path).in_stage(STAGE)?;
        let (x_train, y_train) = split_label(&train_arr).in_stage(STAGE)?;
        let (x_test, y_test) = split_label(&test_arr).in_stage(STAGE)?;

        self.train_model(&x_train, &y_train, &x_test, &y_test)
    }

    /// Tune every family, then pick the one with the best test score.
    ///
    /// Returns the reports in roster order together with the index of the
    /// winner; ties keep the earlier family.
    pub fn evaluate_models(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(Vec<ModelReport>, usize, Classifier)> {
        let mut reports: Vec<ModelReport> = Vec::with_capacity(ModelFamily::ALL.len());
        let mut best: Option<(usize, Classifier)> = None;

        for family in ModelFamily::ALL {
            let grid = self
                .config
                .param_grids
                .get(&family)
                .cloned()
                .unwrap_or_else(|| family.default_grid());

            let search = GridSearch::new(family, grid)
                .with_cv_folds(self.config.cv_folds)
                .with_random_state(self.config.random_seed)
                .fit(x_train, y_train)?;

            let y_pred = search.best_model.predict(x_test)?;
            let test_score = self.config.selection_metric.score(y_test, &y_pred)?;
            info!(
                model = family.name(),
                metric = %self.config.selection_metric,
                test_score,
                "Scored tuned model on test partition"
            );

            let is_better = match &best {
                Some((idx, _)) => test_score > reports[*idx].test_score,
                None => true,
            };
            reports.push(ModelReport {
                family,
                best_params: search.best_params,
                cv_score: search.best_score,
                test_score,
            });
            if is_better {
                best = Some((reports.len() - 1, search.best_model));
            }
        }

        let (best_idx, best_model) =
            best.ok_or_else(|| NetsecError::TrainingError("empty model roster".to_string()))?;
        Ok((reports, best_idx, best_model))
    }

    fn train_model(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> std::result::Result<ModelTrainerArtifact, PipelineError> {
        let start = Instant::now();
        let (reports, best_idx, best_model) = self
            .evaluate_models(x_train, y_train, x_test, y_test)
            .in_stage(STAGE)?;
        let best_report = &reports[best_idx];
        info!(
            model = best_report.family.name(),
            params = %describe_params(&best_report.best_params),
            score = best_report.test_score,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Selected best model"
        );

        let train_pred = best_model.predict(x_train).in_stage(STAGE)?;
        let test_pred = best_model.predict(x_test).in_stage(STAGE)?;
        let train_metric = get_classification_score(y_train, &train_pred).in_stage(STAGE)?;
        let test_metric = get_classification_score(y_test, &test_pred).in_stage(STAGE)?;
        self.check_fit_quality(&train_metric, &test_metric);

        self.track_model(best_report, &best_model, "train", &train_metric);
        self.track_model(best_report, &best_model, "test", &test_metric);

        let preprocessor =
            Preprocessor::load(&self.transformation_artifact.transformed_object_file_path).in_stage(STAGE)?;
        let network_model = NetworkModel::new(preprocessor, best_model).in_stage(STAGE)?;
        network_model
            .save(&self.config.trained_model_file_path)
            .in_stage(STAGE)?;
        network_model
            .save(&self.config.final_model_file_path)
            .in_stage(STAGE)?;

        let artifact = ModelTrainerArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            train_metric_artifact: train_metric,
            test_metric_artifact: test_metric,
            best_model_name: best_report.family.name().to_string(),
            best_model_score: best_report.test_score,
        };
        info!(?artifact, "Model trainer completed");
        Ok(artifact)
    }

    fn check_fit_quality(&self, train: &ClassificationMetricArtifact, test: &ClassificationMetricArtifact) {
        if test.f1_score < self.config.expected_accuracy {
            warn!(
                f1_score = test.f1_score,
                expected = self.config.expected_accuracy,
                "Test F1 below expected score"
            );
        }
        let gap = (train.f1_score - test.f1_score).abs();
        if gap > self.config.overfitting_underfitting_threshold {
            warn!(
                gap,
                threshold = self.config.overfitting_underfitting_threshold,
                "Train/test F1 gap exceeds threshold"
            );
        }
    }

    /// Best-effort: tracking failures never fail the stage
    fn track_model(
        &self,
        report: &ModelReport,
        model: &Classifier,
        partition: &str,
        metrics: &ClassificationMetricArtifact,
    ) {
        let blob = match bincode::serialize(model) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Could not serialize model for tracking");
                return;
            }
        };
        let mut run = RunRecord::new(format!("{} ({})", report.family.name(), partition))
            .with_classification_metrics(metrics)
            .with_param("model", report.family.name())
            .with_param("partition", partition);
        for (name, value) in &report.best_params {
            run = run.with_param(name.clone(), value);
        }

        if let Err(e) = self.tracker.log_run(&run, &blob) {
            warn!(error = %e, run = %run.run_name, "Experiment tracking failed");
        }
    }
}

/// Features and label, label being the last column
fn split_label(arr: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    if arr.ncols() < 2 {
        return Err(NetsecError::ShapeError {
            expected: "at least one feature column and a label column".to_string(),
            actual: format!("{} columns", arr.ncols()),
        });
    }
    let last = arr.ncols() - 1;
    Ok((arr.slice(s![.., ..last]).to_owned(), arr.column(last).to_owned()))
}
