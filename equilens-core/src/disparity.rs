//! Within-group outcome disparity detection.
//!
//! Inside each comparable group, every pair of values of every sensitive
//! attribute is compared on its positive-outcome rate. A rate gap of at least
//! the configured magnitude is a meaningful disparity and is recorded as
//! evidence for both values.
//!
//! Outcome labels are compared after trimming and lowercasing, so `"Yes"` and
//! `" yes"` count as the same outcome.

use crate::config::DisparityConfig;
use crate::data::{Cell, cell_label};
use crate::grouping::{ComparableGroup, GroupRecord};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Tolerance for the meaningful-magnitude comparison; `0.6 - 0.5` must count
/// as a ten-point gap.
const MAGNITUDE_TOLERANCE: f64 = 1e-9;

/// One side of a meaningful pairwise disparity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisparityEvidence {
    pub sensitive_attribute: String,
    pub value: String,
    pub outcome_rate: f64,
    pub comparison_value: String,
    pub comparison_outcome_rate: f64,
    /// `|outcome_rate - comparison_outcome_rate|`, in `[0, 1]`.
    pub magnitude: f64,
    /// Records in the group holding `value`.
    pub sample_size: usize,
    /// The outcome label counted as positive for this comparison.
    pub positive_outcome: String,
}

/// Disparity findings for one comparable group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisparityReport {
    pub group_key: String,
    pub has_bias: bool,
    pub affected_sensitive_attributes: IndexSet<String>,
    pub evidence: Vec<DisparityEvidence>,
}

/// Chooses which outcome label counts as positive.
#[derive(Debug, Clone)]
pub struct PositiveOutcomeResolver {
    keywords: HashSet<String>,
}

impl PositiveOutcomeResolver {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
        }
    }

    /// Boolean `true`, numeric 1, or a configured keyword.
    pub fn is_positive(&self, cell: &Cell) -> bool {
        match cell {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() == Some(1.0),
            Value::String(s) => self.keywords.contains(&normalize_label(s)),
            _ => false,
        }
    }

    /// Label of the first positive-looking outcome in iteration order, or of the
    /// first outcome when none looks positive. `None` for no outcomes.
    pub fn resolve<'c>(&self, outcomes: impl IntoIterator<Item = &'c Cell>) -> Option<String> {
        let mut first = None;
        for cell in outcomes {
            if self.is_positive(cell) {
                return Some(cell_label(cell));
            }
            if first.is_none() {
                first = Some(cell_label(cell));
            }
        }
        first
    }
}

/// Pairwise outcome-rate comparison across sensitive values.
#[derive(Debug, Clone)]
pub struct DisparityDetector {
    config: DisparityConfig,
    resolver: PositiveOutcomeResolver,
}

impl DisparityDetector {
    pub fn new(config: DisparityConfig) -> Self {
        let resolver = PositiveOutcomeResolver::new(&config.positive_outcomes);
        Self { config, resolver }
    }

    pub fn resolver(&self) -> &PositiveOutcomeResolver {
        &self.resolver
    }

    pub fn detect_all(&self, groups: &[ComparableGroup]) -> Vec<DisparityReport> {
        groups.iter().map(|g| self.detect(g)).collect()
    }

    /// Compare every pair of values of every sensitive attribute in the group.
    pub fn detect(&self, group: &ComparableGroup) -> DisparityReport {
        let mut evidence = Vec::new();
        let mut affected = IndexSet::new();

        for attribute in group.outcome_distribution.keys() {
            let partitions = partition_by(&group.records, attribute);
            if partitions.len() < 2 {
                continue;
            }
            let values: Vec<&String> = partitions.keys().collect();
            for (i, value_a) in values.iter().enumerate() {
                for value_b in &values[i + 1..] {
                    let subset_a = &partitions[*value_a];
                    let subset_b = &partitions[*value_b];
                    if subset_a.len() < self.config.min_subset_size
                        || subset_b.len() < self.config.min_subset_size
                    {
                        continue;
                    }
                    if let Some(found) = self.compare(
                        group,
                        attribute,
                        (value_a.as_str(), subset_a.as_slice()),
                        (value_b.as_str(), subset_b.as_slice()),
                    ) {
                        affected.insert(attribute.clone());
                        evidence.extend(found);
                    }
                }
            }
        }

        if !evidence.is_empty() {
            tracing::debug!(
                group = %group.group_key,
                attributes = affected.len(),
                evidence = evidence.len(),
                "Disparity detected"
            );
        }
        DisparityReport {
            group_key: group.group_key.clone(),
            has_bias: !evidence.is_empty(),
            affected_sensitive_attributes: affected,
            evidence,
        }
    }

    /// Evidence for both sides when the pair's rate gap is meaningful.
    fn compare(
        &self,
        group: &ComparableGroup,
        attribute: &str,
        (value_a, subset_a): (&str, &[&GroupRecord]),
        (value_b, subset_b): (&str, &[&GroupRecord]),
    ) -> Option<[DisparityEvidence; 2]> {
        // Union of both subsets in group order keeps the label choice
        // independent of which value happens to be listed first.
        let union = group.records.iter().filter(|r| {
            r.sensitive_attributes
                .get(attribute)
                .map(cell_label)
                .is_some_and(|v| v == value_a || v == value_b)
        });
        let positive = self.resolver.resolve(union.map(|r| &r.outcome))?;

        let rate_a = outcome_rate(subset_a, &positive);
        let rate_b = outcome_rate(subset_b, &positive);
        let magnitude = (rate_a - rate_b).abs();
        if magnitude + MAGNITUDE_TOLERANCE < self.config.meaningful_magnitude {
            return None;
        }

        let side = |value: &str, rate: f64, other: &str, other_rate: f64, size: usize| DisparityEvidence {
            sensitive_attribute: attribute.to_string(),
            value: value.to_string(),
            outcome_rate: rate,
            comparison_value: other.to_string(),
            comparison_outcome_rate: other_rate,
            magnitude,
            sample_size: size,
            positive_outcome: positive.clone(),
        };
        Some([
            side(value_a, rate_a, value_b, rate_b, subset_a.len()),
            side(value_b, rate_b, value_a, rate_a, subset_b.len()),
        ])
    }
}

/// Records grouped by their label for `attribute`, in first-seen order.
fn partition_by<'g>(records: &'g [GroupRecord], attribute: &str) -> IndexMap<String, Vec<&'g GroupRecord>> {
    let mut partitions: IndexMap<String, Vec<&GroupRecord>> = IndexMap::new();
    for record in records {
        if let Some(value) = record.sensitive_attributes.get(attribute) {
            partitions.entry(cell_label(value)).or_default().push(record);
        }
    }
    partitions
}

/// Trimmed, lowercased form used to compare outcome labels.
pub(crate) fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Whether `cell` carries the outcome `positive`, compared as normalized labels.
pub(crate) fn matches_outcome(cell: &Cell, positive: &str) -> bool {
    normalize_label(&cell_label(cell)) == positive
}

/// Share of records whose outcome matches `positive`.
pub(crate) fn outcome_rate(records: &[&GroupRecord], positive: &str) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let positive = normalize_label(positive);
    let hits = records
        .iter()
        .filter(|r| matches_outcome(&r.outcome, &positive))
        .count();
    hits as f64 / records.len() as f64
}
