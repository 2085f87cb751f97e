//! End-to-end tests: synthetic phishing-style data through every stage

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use netsec_pipeline::cli::cmd_predict;
use netsec_pipeline::config::{PipelineSettings, TrainingPipelineConfig};
use netsec_pipeline::extract::DataSource;
use netsec_pipeline::pipeline::TrainingPipeline;
use netsec_pipeline::tracking::{LocalTracker, RunRecord};
use netsec_pipeline::training::{ModelFamily, NetworkModel, ParamGrid, ParamValue, SelectionMetric};
use netsec_pipeline::utils::{train_test_split, DataLoader, DataSaver};
use netsec_pipeline::Stage;

const FEATURES: [&str; 6] = [
    "having_IP_Address",
    "URL_Length",
    "SSLfinal_State",
    "URL_of_Anchor",
    "web_traffic",
    "Page_Rank",
];

// ============================================================================
// Fixtures
// ============================================================================

/// Ternary features, label driven by the first three, ~4% "na" cells
fn write_dataset(path: &Path, rows: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut file = fs::File::create(path).unwrap();
    writeln!(file, "{},Result", FEATURES.join(",")).unwrap();

    for _ in 0..rows {
        let values: Vec<i64> = (0..FEATURES.len()).map(|_| rng.gen_range(-1..=1)).collect();
        let signal = values[0] + 2 * values[1] + values[2];
        let noisy = rng.gen_bool(0.05);
        let label = if (signal > 0) ^ noisy { 1 } else { -1 };

        let cells: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(j, v)| {
                // Keep the label-driving columns complete enough to learn from
                if j >= 3 && rng.gen_bool(0.04) {
                    "na".to_string()
                } else {
                    v.to_string()
                }
            })
            .collect();
        writeln!(file, "{},{}", cells.join(","), label).unwrap();
    }
}

fn write_schema(path: &Path) {
    let mut content = String::from("columns:\n");
    for name in FEATURES.iter().chain(["Result"].iter()) {
        content.push_str(&format!("  - {}: int64\n", name));
    }
    content.push_str("numerical_columns:\n");
    for name in FEATURES.iter() {
        content.push_str(&format!("  - {}\n", name));
    }
    fs::write(path, content).unwrap();
}

fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn small_settings(root: &Path) -> PipelineSettings {
    let mut param_grids = BTreeMap::new();
    param_grids.insert(
        ModelFamily::KNearestNeighbors,
        grid(&[
            ("n_neighbors", vec![ParamValue::Int(3), ParamValue::Int(5)]),
            ("weights", vec!["uniform".into(), "distance".into()]),
        ]),
    );
    param_grids.insert(
        ModelFamily::AdaBoost,
        grid(&[("n_estimators", vec![ParamValue::Int(8)]), ("learning_rate", vec![ParamValue::Float(0.1)])]),
    );
    param_grids.insert(
        ModelFamily::GradientBoosting,
        grid(&[
            ("n_estimators", vec![ParamValue::Int(8)]),
            ("subsample", vec![ParamValue::Float(0.75)]),
        ]),
    );
    param_grids.insert(ModelFamily::RandomForest, grid(&[("n_estimators", vec![ParamValue::Int(8)])]));

    PipelineSettings {
        schema_file_path: root.join("schema.yaml"),
        final_model_dir: root.join("final_model"),
        tracking_dir: root.join("mlruns"),
        selection_metric: SelectionMetric::Accuracy,
        param_grids,
        ..Default::default()
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    source: PathBuf,
}

fn fixture(rows: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let source = root.join("phisingData.csv");
    write_dataset(&source, rows, 7);
    write_schema(&root.join("schema.yaml"));
    Fixture {
        _dir: dir,
        root,
        source,
    }
}

// ============================================================================
// Full pipeline
// ============================================================================

#[test]
fn test_full_pipeline_produces_final_model() {
    let fx = fixture(240);
    let settings = small_settings(&fx.root);
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), settings);
    let artifact_dir = config.artifact_dir.clone();

    let artifacts = TrainingPipeline::new(config, DataSource::Csv(fx.source.clone()))
        .run_pipeline()
        .unwrap();

    // Ingestion
    let loader = DataLoader::new();
    let train = loader.load_csv(&artifacts.ingestion.trained_file_path).unwrap();
    let test = loader.load_csv(&artifacts.ingestion.test_file_path).unwrap();
    assert_eq!(test.height(), 48);
    assert_eq!(train.height() + test.height(), 240);
    assert!(artifacts.ingestion.trained_file_path.starts_with(&artifact_dir));

    // Validation
    assert!(artifacts.validation.drift_report_file_path.exists());
    assert!(artifacts.validation.valid_train_file_path.exists());

    // Transformation
    assert!(artifacts.transformation.transformed_object_file_path.exists());
    assert!(fx.root.join("final_model/preprocessor.bin").exists());

    // Training
    let trained = &artifacts.model_trainer;
    for metric in [&trained.train_metric_artifact, &trained.test_metric_artifact] {
        for value in [metric.f1_score, metric.precision_score, metric.recall_score] {
            assert!((0.0..=1.0).contains(&value), "metric out of range: {}", value);
        }
    }
    let roster: Vec<&str> = ModelFamily::ALL.iter().map(|f| f.name()).collect();
    assert!(roster.contains(&trained.best_model_name.as_str()));
    assert!(trained.best_model_score > 0.6);
    assert!(trained.trained_model_file_path.exists());

    let final_model_path = fx.root.join("final_model/model.bin");
    let model = NetworkModel::load(&final_model_path).unwrap();
    assert_eq!(model.model().family().name(), trained.best_model_name);

    // One tracked run per metric set
    let runs: Vec<RunRecord> = LocalTracker::new(fx.root.join("mlruns")).load_runs().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.metrics.contains_key("f1_score")
        && r.metrics.contains_key("precision_score")
        && r.metrics.contains_key("recall_score")));
}

#[test]
fn test_predict_command_writes_predicted_column() {
    let fx = fixture(160);
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), small_settings(&fx.root));
    TrainingPipeline::new(config, DataSource::Csv(fx.source.clone()))
        .run_pipeline()
        .unwrap();

    let input = fx.root.join("incoming.csv");
    write_dataset(&input, 25, 99);
    let output = fx.root.join("prediction_output/output.csv");
    cmd_predict(&fx.root.join("final_model/model.bin"), &input, &output).unwrap();

    let predicted = DataLoader::new().load_csv(&output).unwrap();
    assert_eq!(predicted.height(), 25);
    assert!(predicted.column("Result").is_err());
    let labels: Vec<Option<i64>> = predicted
        .column("predicted_column")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert!(labels.iter().all(|v| matches!(v, Some(0) | Some(1))));
}

#[test]
fn test_predict_drops_non_feature_columns() {
    let fx = fixture(160);
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), small_settings(&fx.root));
    TrainingPipeline::new(config, DataSource::Csv(fx.source.clone()))
        .run_pipeline()
        .unwrap();

    let input = fx.root.join("incoming.csv");
    write_dataset(&input, 10, 7);
    let mut df = DataLoader::new().load_csv(&input).unwrap();
    df.rename("Result", "label".into()).unwrap();
    df.with_column(Column::new("row_id".into(), (0..10i64).collect::<Vec<_>>()))
        .unwrap();
    DataSaver::save_csv(&mut df, &input).unwrap();

    let output = fx.root.join("prediction_output/output.csv");
    cmd_predict(&fx.root.join("final_model/model.bin"), &input, &output).unwrap();

    let predicted = DataLoader::new().load_csv(&output).unwrap();
    assert!(predicted.column("label").is_err());
    assert!(predicted.column("row_id").is_err());
    let model = NetworkModel::load(fx.root.join("final_model/model.bin")).unwrap();
    assert_eq!(predicted.width(), model.preprocessor().feature_names().len() + 1);
}

#[test]
fn test_predictions_are_deterministic() {
    let fx = fixture(160);
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), small_settings(&fx.root));
    TrainingPipeline::new(config, DataSource::Csv(fx.source.clone()))
        .run_pipeline()
        .unwrap();

    let model = NetworkModel::load(fx.root.join("final_model/model.bin")).unwrap();
    let df = DataLoader::new().load_csv(&fx.source).unwrap();
    let first = model.predict_frame(&df).unwrap();
    let reloaded = NetworkModel::load(fx.root.join("final_model/model.bin")).unwrap();
    assert_eq!(reloaded.predict_frame(&df).unwrap(), first);
}

// ============================================================================
// Failure wrapping
// ============================================================================

#[test]
fn test_schema_mismatch_stops_at_validation() {
    let fx = fixture(60);
    fs::write(fx.root.join("schema.yaml"), "columns:\n  - only_one: int64\n").unwrap();
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), small_settings(&fx.root));

    let err = TrainingPipeline::new(config, DataSource::Csv(fx.source.clone()))
        .run_pipeline()
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Validation);
    assert!(err.to_string().starts_with("error in data validation stage at "));
    assert!(!fx.root.join("final_model/model.bin").exists());
}

#[test]
fn test_missing_source_fails_in_ingestion() {
    let fx = fixture(10);
    let config = TrainingPipelineConfig::new(fx.root.join("Artifacts"), small_settings(&fx.root));
    let err = TrainingPipeline::new(config, DataSource::Csv(fx.root.join("absent.csv")))
        .run_pipeline()
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Ingestion);
    assert!(std::error::Error::source(&err).is_some());
}

// ============================================================================
// Split properties
// ============================================================================

#[test]
fn test_split_counts_for_various_sizes() {
    for (n, ratio) in [(1usize, 0.2), (9, 0.2), (10, 0.2), (101, 0.3), (500, 0.25)] {
        let df = df!("x" => (0..n as i64).collect::<Vec<_>>()).unwrap();
        let (train, test) = train_test_split(&df, ratio, 42).unwrap();
        assert_eq!(test.height(), (n as f64 * ratio).floor() as usize);
        assert_eq!(train.height() + test.height(), n);
    }
}
