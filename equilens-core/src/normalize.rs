//! Merit normalization.
//!
//! Turns each merit column into one numeric dimension. A column is numeric when
//! every analyzed cell parses as a number; it is then z-scored with the
//! population standard deviation. Any other column is categorical and its
//! values get integer codes in first-seen order. Codes carry identity only:
//! the distance calculator compares them for equality, never by magnitude.
//!
//! Only merit columns are read here. Sensitive and outcome values never reach
//! the merit vectors, so grouping cannot leak outcome information.

use crate::data::{Dataset, cell_as_number, cell_label};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a merit column was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeritKind {
    Numeric,
    Categorical,
}

/// How a merit column's values were mapped onto its dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// `(x - mean) / stddev`, or 0 everywhere when `stddev` is 0.
    ZScore,
    /// Exact-match category codes.
    Exact,
}

/// Normalization record for one merit column, kept for audit output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub column: String,
    pub kind: MeritKind,
    pub method: NormalizationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    /// Number of distinct values seen in a categorical column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<usize>,
}

/// Normalized merit vectors, one row per analyzed record, one column per merit
/// dimension, plus the parameters that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMerits {
    pub vectors: Vec<Vec<f64>>,
    pub params: Vec<NormalizationParams>,
}

impl NormalizedMerits {
    pub fn dimensions(&self) -> usize {
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Normalize the given merit columns over the given rows.
///
/// `rows` are indices into `dataset.rows`; the output keeps their order.
pub fn normalize_merits(dataset: &Dataset, merit_columns: &[usize], rows: &[usize]) -> NormalizedMerits {
    let mut vectors = vec![Vec::with_capacity(merit_columns.len()); rows.len()];
    let mut params = Vec::with_capacity(merit_columns.len());

    for &col in merit_columns {
        let column = dataset.headers[col].clone();
        let cells: Vec<_> = rows.iter().map(|&r| &dataset.rows[r][col]).collect();
        let numbers: Option<Vec<f64>> = cells.iter().map(|c| cell_as_number(c)).collect();

        match numbers {
            Some(values) => {
                let (mean, stddev) = mean_and_stddev(&values);
                if stddev == 0.0 {
                    tracing::warn!(column = %column, "Merit column has zero variance; normalized to 0");
                }
                for (vector, x) in vectors.iter_mut().zip(&values) {
                    vector.push(z_score(*x, mean, stddev));
                }
                tracing::debug!(column = %column, mean, stddev, "Normalized numeric merit column");
                params.push(NormalizationParams {
                    column,
                    kind: MeritKind::Numeric,
                    method: NormalizationMethod::ZScore,
                    mean: Some(mean),
                    stddev: Some(stddev),
                    categories: None,
                });
            }
            None => {
                let mut codes: IndexMap<String, usize> = IndexMap::new();
                for (vector, cell) in vectors.iter_mut().zip(&cells) {
                    let next = codes.len();
                    let code = *codes.entry(cell_label(cell)).or_insert(next);
                    vector.push(code as f64);
                }
                tracing::debug!(column = %column, categories = codes.len(), "Encoded categorical merit column");
                params.push(NormalizationParams {
                    column,
                    kind: MeritKind::Categorical,
                    method: NormalizationMethod::Exact,
                    mean: None,
                    stddev: None,
                    categories: Some(codes.len()),
                });
            }
        }
    }

    NormalizedMerits { vectors, params }
}

/// Mean and population standard deviation; `(0, 0)` for no values.
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn z_score(x: f64, mean: f64, stddev: f64) -> f64 {
    if stddev > 0.0 { (x - mean) / stddev } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::new(
            vec!["score".into(), "degree".into(), "flat".into()],
            vec![
                vec![json!(2), json!("BSc"), json!(5)],
                vec![json!("4"), json!("MSc"), json!(5)],
                vec![json!(6), json!("BSc"), json!(5)],
                vec![json!(8), json!("PhD"), json!(5)],
            ],
        )
    }

    #[test]
    fn test_numeric_column_z_scored() {
        let ds = dataset();
        let norm = normalize_merits(&ds, &[0], &[0, 1, 2, 3]);
        let p = &norm.params[0];
        assert_eq!(p.kind, MeritKind::Numeric);
        assert_eq!(p.method, NormalizationMethod::ZScore);
        assert_eq!(p.mean, Some(5.0));
        let sd = 5.0f64.sqrt();
        assert!((p.stddev.unwrap() - sd).abs() < 1e-12);
        assert!((norm.vectors[0][0] - (-3.0 / sd)).abs() < 1e-12);
        assert!((norm.vectors[3][0] - (3.0 / sd)).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_codes_first_seen() {
        let ds = dataset();
        let norm = normalize_merits(&ds, &[1], &[0, 1, 2, 3]);
        let codes: Vec<f64> = norm.vectors.iter().map(|v| v[0]).collect();
        assert_eq!(codes, vec![0.0, 1.0, 0.0, 2.0]);
        assert_eq!(norm.params[0].kind, MeritKind::Categorical);
        assert_eq!(norm.params[0].categories, Some(3));
    }

    #[test]
    fn test_zero_variance_is_neutral() {
        let ds = dataset();
        let norm = normalize_merits(&ds, &[2], &[0, 1, 2, 3]);
        assert!(norm.vectors.iter().all(|v| v[0] == 0.0));
        assert_eq!(norm.params[0].stddev, Some(0.0));
    }

    #[test]
    fn test_row_subset_drives_statistics() {
        let ds = dataset();
        let norm = normalize_merits(&ds, &[0, 1], &[1, 3]);
        assert_eq!(norm.len(), 2);
        assert_eq!(norm.dimensions(), 2);
        assert_eq!(norm.params[0].mean, Some(6.0));
        assert_eq!(norm.vectors[0][1], 0.0);
        assert_eq!(norm.vectors[1][1], 1.0);
    }

    #[test]
    fn test_mixed_column_is_categorical() {
        let ds = Dataset::new(
            vec!["grade".into()],
            vec![vec![json!(1)], vec![json!("A")], vec![json!(1)]],
        );
        let norm = normalize_merits(&ds, &[0], &[0, 1, 2]);
        assert_eq!(norm.params[0].kind, MeritKind::Categorical);
        assert_eq!(norm.vectors[0][0], norm.vectors[2][0]);
    }
}
