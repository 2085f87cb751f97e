//! Distribution drift detection between two samples

mod data_drift;

pub use data_drift::{ColumnDrift, DriftReport, KolmogorovSmirnovTest};
