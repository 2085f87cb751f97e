//! Experiment tracking
//!
//! Runs are recorded as JSON plus the serialized model, one directory per
//! run. Tracking is best-effort from the trainer's point of view.

mod storage;
mod tracker;

pub use storage::LocalTracker;
pub use tracker::{ExperimentTracker, NoopTracker, RunRecord};

use std::path::Path;

/// Tracker for an optional directory; `None` disables tracking
pub fn tracker_for(dir: Option<&Path>) -> Box<dyn ExperimentTracker> {
    match dir {
        Some(dir) => Box::new(LocalTracker::new(dir)),
        None => Box::new(NoopTracker),
    }
}
