//! Dataset-level reduction of per-group disparity reports.

use crate::disparity::DisparityReport;
use crate::grouping::GroupingMetadata;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Aggregate bias statistics over all comparable groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasMetrics {
    pub total_groups: usize,
    pub biased_groups: usize,
    /// `biased_groups / total_groups`, 0 when there are no groups.
    pub bias_ratio: f64,
    /// Mean magnitude over every evidence record.
    pub average_magnitude: f64,
    /// Sensitive attribute -> number of biased groups implicating it.
    pub frequency_by_sensitive_attribute: IndexMap<String, usize>,
    /// `clamp(1 - CV, 0, 1)` of the frequencies; high when the same
    /// attributes keep being implicated.
    pub consistency_score: f64,
    pub grouping_metadata: GroupingMetadata,
}

/// Reduce per-group reports into [`BiasMetrics`].
pub fn aggregate(reports: &[DisparityReport], grouping_metadata: &GroupingMetadata) -> BiasMetrics {
    let total_groups = reports.len();
    let biased_groups = reports.iter().filter(|r| r.has_bias).count();
    let bias_ratio = if total_groups == 0 {
        0.0
    } else {
        biased_groups as f64 / total_groups as f64
    };

    let magnitudes: Vec<f64> = reports
        .iter()
        .flat_map(|r| r.evidence.iter().map(|e| e.magnitude))
        .collect();
    let average_magnitude = mean(&magnitudes);

    let mut frequency_by_sensitive_attribute: IndexMap<String, usize> = IndexMap::new();
    for report in reports.iter().filter(|r| r.has_bias) {
        for attribute in &report.affected_sensitive_attributes {
            *frequency_by_sensitive_attribute
                .entry(attribute.clone())
                .or_insert(0) += 1;
        }
    }
    let frequencies: Vec<f64> = frequency_by_sensitive_attribute
        .values()
        .map(|&f| f as f64)
        .collect();
    let consistency_score = consistency(&frequencies);

    BiasMetrics {
        total_groups,
        biased_groups,
        bias_ratio,
        average_magnitude,
        frequency_by_sensitive_attribute,
        consistency_score,
        grouping_metadata: grouping_metadata.clone(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// One minus the coefficient of variation, clamped to `[0, 1]`.
/// No frequencies, or a zero mean, scores 0.
fn consistency(frequencies: &[f64]) -> f64 {
    let m = mean(frequencies);
    if m <= 0.0 {
        return 0.0;
    }
    let variance = frequencies.iter().map(|f| (f - m).powi(2)).sum::<f64>() / frequencies.len() as f64;
    let cv = variance.sqrt() / m;
    (1.0 - cv).clamp(0.0, 1.0)
}
