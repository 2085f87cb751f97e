//! Binary and YAML persistence helpers

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{NetsecError, Result};

/// Create the parent directory of `path` if it has one
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Serialize `value` with bincode and write it to `path`
pub fn save_object<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = bincode::serialize(value).map_err(|e| {
        NetsecError::SerializationError(format!("Failed to serialize {}: {}", path.display(), e))
    })?;
    ensure_parent_dir(path)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read and deserialize a bincode file
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(NetsecError::DataError(format!(
            "The file: {} does not exist",
            path.display()
        )));
    }
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(|e| {
        NetsecError::SerializationError(format!("Failed to deserialize {}: {}", path.display(), e))
    })
}

pub fn write_yaml<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

pub fn read_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Copy `from` to `to`, creating the destination directory
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    ensure_parent_dir(to)?;
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;

    #[test]
    fn test_object_roundtrip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("arr.bin");
        let arr = array![[1.0, 2.0], [3.0, f64::NAN]];

        save_object(&arr, &path).unwrap();
        let loaded: ndarray::Array2<f64> = load_object(&path).unwrap();

        assert_eq!(loaded[[0, 1]], 2.0);
        assert!(loaded[[1, 1]].is_nan());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Vec<f64>> = load_object(dir.path().join("missing.bin"));
        assert!(matches!(result, Err(NetsecError::DataError(_))));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.yaml");
        let mut report = BTreeMap::new();
        report.insert("URL_Length".to_string(), 0.5_f64);

        write_yaml(&report, &path).unwrap();
        let loaded: BTreeMap<String, f64> = read_yaml(&path).unwrap();
        assert_eq!(loaded, report);
    }
}
