//! Scoring functions for binary classifiers

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::artifacts::ClassificationMetricArtifact;
use crate::error::{NetsecError, Result};

/// Label treated as the positive class
pub const POSITIVE_LABEL: f64 = 1.0;

/// Test-set statistic used to rank fitted families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    /// Coefficient of determination of the hard predictions
    #[default]
    R2,
    Accuracy,
    F1,
}

impl SelectionMetric {
    pub fn score(self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        match self {
            SelectionMetric::R2 => r2_score(y_true, y_pred),
            SelectionMetric::Accuracy => accuracy_score(y_true, y_pred),
            SelectionMetric::F1 => f1_score(y_true, y_pred),
        }
    }
}

impl std::fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SelectionMetric::R2 => "r2",
            SelectionMetric::Accuracy => "accuracy",
            SelectionMetric::F1 => "f1",
        })
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(NetsecError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(NetsecError::ValidationError(
            "Cannot score an empty prediction set".to_string(),
        ));
    }
    Ok(())
}

/// `(tp, fp, fn)` for the positive class
fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t == POSITIVE_LABEL, p == POSITIVE_LABEL) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    (tp, fp, fn_)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

pub fn precision_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, fp, _) = confusion_counts(y_true, y_pred);
    Ok(ratio(tp, tp + fp))
}

pub fn recall_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, _, fn_) = confusion_counts(y_true, y_pred);
    Ok(ratio(tp, tp + fn_))
}

pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, fp, fn_) = confusion_counts(y_true, y_pred);
    Ok(ratio(2 * tp, 2 * tp + fp + fn_))
}

/// R² of `y_pred` against `y_true`.
///
/// A constant `y_true` scores 1.0 on a perfect prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Precision, recall and F1 of one prediction set
pub fn get_classification_score(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
) -> Result<ClassificationMetricArtifact> {
    Ok(ClassificationMetricArtifact {
        f1_score: f1_score(y_true, y_pred)?,
        precision_score: precision_score(y_true, y_pred)?,
        recall_score: recall_score(y_true, y_pred)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_scores() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let m = get_classification_score(&y_true, &y_pred).unwrap();
        assert!((m.precision_score - 0.75).abs() < 1e-12);
        assert!((m.recall_score - 0.75).abs() < 1e-12);
        assert!((m.f1_score - 0.75).abs() < 1e-12);
        assert!((accuracy_score(&y_true, &y_pred).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let y_true = array![0.0, 0.0, 0.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let m = get_classification_score(&y_true, &y_pred).unwrap();
        assert_eq!(m.precision_score, 0.0);
        assert_eq!(m.recall_score, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_r2() {
        let y_true = array![0.0, 1.0, 1.0, 0.0];
        assert_eq!(r2_score(&y_true, &y_true).unwrap(), 1.0);
        // One miss out of four: ss_res = 1, ss_tot = 1
        let y_pred = array![0.0, 1.0, 0.0, 0.0];
        assert!((r2_score(&y_true, &y_pred).unwrap() - 0.0).abs() < 1e-12);

        let constant = array![1.0, 1.0];
        assert_eq!(r2_score(&constant, &constant).unwrap(), 1.0);
        assert_eq!(r2_score(&constant, &array![1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(accuracy_score(&array![1.0], &array![1.0, 0.0]).is_err());
    }

    #[test]
    fn test_selection_metric_names() {
        let m: SelectionMetric = serde_yaml::from_str("f1").unwrap();
        assert_eq!(m, SelectionMetric::F1);
        assert_eq!(SelectionMetric::default().to_string(), "r2");
    }
}
