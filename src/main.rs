//! netsec - phishing classifier training pipeline entry point

use std::fs;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use netsec_pipeline::cli::{cmd_predict, cmd_push, cmd_run, Cli, Commands};
use netsec_pipeline::constants::{LOGS_DIR, TIMESTAMP_FORMAT};

fn init_logging() -> anyhow::Result<()> {
    fs::create_dir_all(LOGS_DIR)?;
    let log_path = format!("{}/{}.log", LOGS_DIR, Local::now().format(TIMESTAMP_FORMAT));
    let log_file = Arc::new(fs::File::create(log_path)?);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netsec_pipeline=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(log_file))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Commands::Push { file, database, collection, mongo_url } => {
            cmd_push(&file, &database, &collection, &mongo_url)?;
        }
        Commands::Run { source, database, collection, mongo_url, artifact_root, config } => {
            cmd_run(
                source.as_deref(),
                &database,
                &collection,
                mongo_url.as_deref(),
                &artifact_root,
                config.as_deref(),
            )?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&model, &data, &output)?;
        }
    }

    Ok(())
}
