//! Two-sample Kolmogorov-Smirnov drift test and per-column reports

use std::cmp::Ordering;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Kolmogorov-Smirnov test for distribution comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KolmogorovSmirnovTest {
    /// Significance level (alpha)
    alpha: f64,
}

impl KolmogorovSmirnovTest {
    /// Create new KS test
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(1e-6, 0.5),
        }
    }

    /// Two-sample statistic `D = sup |F1(x) - F2(x)|`.
    /// Inputs must be sorted ascending.
    pub fn statistic(sorted_a: &[f64], sorted_b: &[f64]) -> f64 {
        let (n1, n2) = (sorted_a.len() as f64, sorted_b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d = 0.0f64;

        // Merge walk; ties advance both sides before comparing
        while i < sorted_a.len() && j < sorted_b.len() {
            let x = sorted_a[i].min(sorted_b[j]);
            while i < sorted_a.len() && sorted_a[i] <= x {
                i += 1;
            }
            while j < sorted_b.len() && sorted_b[j] <= x {
                j += 1;
            }
            d = d.max((i as f64 / n1 - j as f64 / n2).abs());
        }
        d
    }

    /// Asymptotic p-value of `d` for sample sizes `n1`, `n2`
    pub fn p_value(d: f64, n1: usize, n2: usize) -> f64 {
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        let lambda = (en + 0.12 + 0.11 / en) * d;
        kolmogorov_q(lambda)
    }
}

impl Default for KolmogorovSmirnovTest {
    fn default() -> Self {
        Self::new(crate::constants::DATA_VALIDATION_DRIFT_THRESHOLD)
    }
}

impl KolmogorovSmirnovTest {
    /// Compare `reference` with `test`; drift when `p_value < alpha`.
    ///
    /// Empty samples carry no evidence and report `p_value = 1.0`.
    pub fn detect(&self, reference: &[f64], test: &[f64]) -> ColumnDrift {
        if reference.is_empty() || test.is_empty() {
            return ColumnDrift { p_value: 1.0, drift_status: false };
        }

        let mut ref_sorted = reference.to_vec();
        let mut test_sorted = test.to_vec();
        ref_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        test_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let d = Self::statistic(&ref_sorted, &test_sorted);
        let p_value = Self::p_value(d, reference.len(), test.len());
        ColumnDrift {
            p_value,
            drift_status: p_value < self.alpha,
        }
    }
}

/// Kolmogorov distribution survival function
/// `Q(l) = 2 * sum_{j>=1} (-1)^(j-1) exp(-2 j^2 l^2)`
fn kolmogorov_q(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-6;
    const EPS2: f64 = 1e-16;

    if lambda < 1e-3 {
        return 1.0;
    }

    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut prev_term = 0.0f64;

    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS1 * prev_term || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }
    // Did not converge: the samples are indistinguishable
    1.0
}

/// Per-column drift entry of the validation report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Drift outcome per column, in column order.
///
/// Serializes as a mapping `{column: {p_value, drift_status}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    columns: Vec<(String, ColumnDrift)>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, drift: ColumnDrift) {
        self.columns.push((column.into(), drift));
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDrift)> {
        self.columns.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Names of drifted columns
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, d)| d.drift_status)
            .map(|(n, _)| n)
            .collect()
    }

    pub fn has_drift(&self) -> bool {
        self.columns.iter().any(|(_, d)| d.drift_status)
    }
}

impl Serialize for DriftReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, drift) in &self.columns {
            map.serialize_entry(name, drift)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ramp(n: usize, offset: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 / n as f64 + offset).collect()
    }

    #[test]
    fn test_statistic_identical_samples() {
        let a = ramp(50, 0.0);
        assert_eq!(KolmogorovSmirnovTest::statistic(&a, &a), 0.0);
    }

    #[test]
    fn test_statistic_disjoint_samples() {
        let a = ramp(20, 0.0);
        let b = ramp(30, 10.0);
        assert!((KolmogorovSmirnovTest::statistic(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_statistic_with_ties() {
        // F1 jumps to 1.0 at 1; F2 is 0.5 there
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 2.0];
        assert!((KolmogorovSmirnovTest::statistic(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_p_value_bounds() {
        assert_eq!(KolmogorovSmirnovTest::p_value(0.0, 100, 100), 1.0);
        let p = KolmogorovSmirnovTest::p_value(1.0, 100, 100);
        assert!(p >= 0.0 && p < 1e-10);
    }

    #[test]
    fn test_detects_shifted_column() {
        let ks = KolmogorovSmirnovTest::default();
        let reference = ramp(200, 0.0);

        let same = ks.detect(&reference, &reference);
        assert!(!same.drift_status);
        assert!(same.p_value > 0.99);

        let shifted = ks.detect(&reference, &ramp(200, 0.5));
        assert!(shifted.drift_status);
        assert!(shifted.p_value < 0.05);
    }

    #[test]
    fn test_empty_sample_reports_no_drift() {
        let ks = KolmogorovSmirnovTest::default();
        let result = ks.detect(&[], &[1.0, 2.0]);
        assert!(!result.drift_status);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_report_serializes_as_mapping() {
        let mut report = DriftReport::new();
        report.insert("URL_Length", ColumnDrift { p_value: 0.9, drift_status: false });
        report.insert("SFH", ColumnDrift { p_value: 0.01, drift_status: true });

        let yaml = serde_yaml::to_string(&report).unwrap();
        let parsed: BTreeMap<String, ColumnDrift> = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.len(), 2);
        assert!(parsed["SFH"].drift_status);
        assert_eq!(report.drifted_columns(), vec!["SFH"]);
        // Column order is kept
        assert!(yaml.find("URL_Length").unwrap() < yaml.find("SFH").unwrap());
    }
}
