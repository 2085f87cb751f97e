//! Network security pipeline CLI
//!
//! Command-line interface for pushing raw records, running the training
//! pipeline, and predicting with the final model.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{PipelineSettings, TrainingPipelineConfig};
use crate::constants::{
    ARTIFACT_DIR, DATA_INGESTION_COLLECTION_NAME, DATA_INGESTION_DATABASE_NAME, MONGO_URL_ENV,
};
use crate::extract::{DataSource, NetworkDataExtract};
use crate::pipeline::TrainingPipeline;
use crate::training::NetworkModel;
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "netsec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Phishing website classifier training pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert CSV rows into the document store
    Push {
        /// CSV file to upload
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, default_value = DATA_INGESTION_DATABASE_NAME)]
        database: String,

        #[arg(long, default_value = DATA_INGESTION_COLLECTION_NAME)]
        collection: String,

        /// Connection string
        #[arg(long, env = MONGO_URL_ENV, hide_env_values = true)]
        mongo_url: String,
    },

    /// Run ingestion, validation, transformation and training
    Run {
        /// Read records from this CSV instead of the document store
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[arg(long, default_value = DATA_INGESTION_DATABASE_NAME)]
        database: String,

        #[arg(long, default_value = DATA_INGESTION_COLLECTION_NAME)]
        collection: String,

        /// Connection string, required without --source
        #[arg(long, env = MONGO_URL_ENV, hide_env_values = true)]
        mongo_url: Option<String>,

        /// Directory holding the timestamped run directories
        #[arg(long, default_value = ARTIFACT_DIR)]
        artifact_root: PathBuf,

        /// YAML settings overrides
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Predict with a saved network model
    Predict {
        /// Saved model file
        #[arg(short, long, default_value = "final_model/model.bin")]
        model: PathBuf,

        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV with a `predicted_column`
        #[arg(short, long, default_value = "prediction_output/output.csv")]
        output: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_push(file: &Path, database: &str, collection: &str, mongo_url: &str) -> anyhow::Result<()> {
    section("Push");

    step_run(&format!("Reading {}", file.display()));
    let records = NetworkDataExtract::csv_to_records(file)?;
    step_done(&format!("{} records", records.len()));

    step_run(&format!("Inserting into {}.{}", database, collection));
    let start = Instant::now();
    let extract = NetworkDataExtract::connect(mongo_url)?;
    let inserted = extract.insert_records(&records, database, collection)?;
    step_done(&format!("{} inserted in {:?}", inserted, start.elapsed()));

    println!();
    Ok(())
}

pub fn cmd_run(
    source: Option<&Path>,
    database: &str,
    collection: &str,
    mongo_url: Option<&str>,
    artifact_root: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    section("Training pipeline");

    let settings = PipelineSettings::load_or_default(config)?;
    let source = match (source, mongo_url) {
        (Some(path), _) => DataSource::Csv(path.to_path_buf()),
        (None, Some(url)) => DataSource::DocumentStore {
            url: url.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        },
        (None, None) => anyhow::bail!("Pass --source or set {} to read from the document store", MONGO_URL_ENV),
    };

    let pipeline = TrainingPipeline::new(TrainingPipelineConfig::new(artifact_root, settings), source);
    kv("Run directory", &pipeline.config().artifact_dir.display().to_string());
    println!();

    let start = Instant::now();

    step_run("Data ingestion");
    let ingestion = pipeline.start_data_ingestion()?;
    step_done(&ingestion.trained_file_path.display().to_string());

    step_run("Data validation");
    let validation = pipeline.start_data_validation(ingestion)?;
    let drift = if validation.validation_status { "no drift" } else { "drift detected" };
    step_done(drift);

    step_run("Data transformation");
    let transformation = pipeline.start_data_transformation(validation)?;
    step_done(&transformation.transformed_object_file_path.display().to_string());

    step_run("Model training");
    let trained = pipeline.start_model_trainer(transformation)?;
    step_done(&format!("{:?}", start.elapsed()));

    section("Best model");
    kv("Model", &trained.best_model_name);
    kv("Selection score", &format!("{:.4}", trained.best_model_score));
    kv("Train F1", &format!("{:.4}", trained.train_metric_artifact.f1_score));
    kv("Test F1", &format!("{:.4}", trained.test_metric_artifact.f1_score));
    kv("Test precision", &format!("{:.4}", trained.test_metric_artifact.precision_score));
    kv("Test recall", &format!("{:.4}", trained.test_metric_artifact.recall_score));
    kv("Saved to", &trained.trained_model_file_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let model = NetworkModel::load(model_path)?;
    step_done(model.model().family().name());

    step_run("Loading data");
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict_frame(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    // Keep only the columns the model was trained on; labels go whatever their name
    let mut df = df.select(model.preprocessor().feature_names().iter().map(|c| c.as_str()))?;

    let labels: Vec<i64> = predictions.iter().map(|&v| v as i64).collect();
    df.with_column(Column::new("predicted_column".into(), labels))?;

    step_run(&format!("Saving → {}", output.display()));
    DataSaver::save_csv(&mut df, output)?;
    step_done(&format!("{} rows", df.height()));

    println!();
    Ok(())
}
