//! CSV loading and saving, and frame <-> array conversion

use std::fs::File;
use std::path::Path;

use ndarray::Array2;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::constants::MISSING_TOKEN;
use crate::error::{NetsecError, Result};

use super::io::ensure_parent_dir;

/// CSV reader with the pipeline's null handling
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for schema inference; `None` scans everything
    infer_schema_length: Option<usize>,
    /// Literal token read as null
    null_token: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            null_token: MISSING_TOKEN.to_string(),
        }
    }

    /// Load a headered CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| NetsecError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_null_values(Some(
            NullValues::AllColumnsSingle(self.null_token.as_str().into()),
        ));

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;
        Ok(df)
    }
}

/// CSV writer
pub struct DataSaver;

impl DataSaver {
    /// Write `df` with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

/// Drop `name` if the frame has it
pub fn drop_column_if_present(df: DataFrame, name: &str) -> Result<DataFrame> {
    if has_column(&df, name) {
        Ok(df.drop(name)?)
    } else {
        Ok(df)
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

/// Values of one column as `f64`, nulls as NaN
pub fn column_to_vec(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| NetsecError::SchemaError(format!("column '{}' not found", name)))?;
    let values: Vec<f64> = column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(values)
}

/// Non-null values of one column
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(column_to_vec(df, name)?
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect())
}

/// Named columns into a row-major matrix, nulls as NaN
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data = col_names
        .iter()
        .map(|name| column_to_vec(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| {
        col_data[c][r]
    }))
}

/// Shuffle rows with a seeded RNG and split off `floor(n * test_ratio)` test rows.
///
/// Returns `(train, test)`; `train.height() + test.height() == df.height()`.
pub fn train_test_split(
    df: &DataFrame,
    test_ratio: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    if !(0.0..1.0).contains(&test_ratio) {
        return Err(NetsecError::InvalidParameter {
            name: "test_ratio".to_string(),
            value: test_ratio.to_string(),
            reason: "must be in [0, 1)".to_string(),
        });
    }

    let n = df.height();
    let n_test = (n as f64 * test_ratio).floor() as usize;

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    let test = df.take(&IdxCa::from_vec("idx".into(), test_idx.to_vec()))?;
    Ok((train, test))
}
