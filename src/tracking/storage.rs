//! Local file system tracking backend

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::tracker::{ExperimentTracker, RunRecord};
use crate::error::Result;

const RUN_FILE: &str = "run.json";
const MODEL_FILE: &str = "model.bin";
const INDEX_FILE: &str = "runs.json";

/// Writes each run to `<base_dir>/<run_id>/` and keeps a `runs.json` index
#[derive(Debug, Clone)]
pub struct LocalTracker {
    base_dir: PathBuf,
}

impl LocalTracker {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn index_file(&self) -> PathBuf {
        self.base_dir.join(INDEX_FILE)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id)
    }

    /// All indexed runs, oldest first
    pub fn load_runs(&self) -> Result<Vec<RunRecord>> {
        let path = self.index_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Read one run back by id
    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let contents = fs::read_to_string(self.run_dir(run_id).join(RUN_FILE))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl ExperimentTracker for LocalTracker {
    fn log_run(&self, run: &RunRecord, model: &[u8]) -> Result<()> {
        let run_dir = self.run_dir(&run.run_id);
        fs::create_dir_all(&run_dir)?;

        fs::write(run_dir.join(RUN_FILE), serde_json::to_string_pretty(run)?)?;
        fs::write(run_dir.join(MODEL_FILE), model)?;

        let mut runs = self.load_runs()?;
        runs.push(run.clone());
        fs::write(self.index_file(), serde_json::to_string_pretty(&runs)?)?;

        debug!(run_id = %run.run_id, run_name = %run.run_name, "Logged run");
        Ok(())
    }
}
