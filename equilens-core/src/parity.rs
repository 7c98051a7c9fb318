//! Dataset-wide selection rates per sensitive attribute.
//!
//! Unlike the grouped analysis this ignores merit entirely: it compares raw
//! positive-outcome rates across the values of each sensitive attribute over
//! all analyzed rows. It is reported as context next to the verdict and never
//! feeds severity or confidence.

use crate::data::{AnalysisFrame, cell_label};
use crate::disparity::{PositiveOutcomeResolver, matches_outcome, normalize_label};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Selection-rate summary for one sensitive attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParitySummary {
    pub sensitive_attribute: String,
    pub positive_outcome: String,
    /// Attribute value -> share of its rows with the positive outcome.
    pub selection_rates: IndexMap<String, f64>,
    /// Attribute value -> number of rows.
    pub counts: IndexMap<String, usize>,
    /// Highest minus lowest selection rate.
    pub demographic_parity_difference: f64,
    /// Lowest over highest selection rate; 1.0 when every rate is 0.
    pub disparate_impact_ratio: f64,
}

/// One summary per sensitive attribute, in header order.
///
/// Empty when the frame has no single outcome column.
pub fn summarize(frame: &AnalysisFrame<'_>, resolver: &PositiveOutcomeResolver) -> Vec<ParitySummary> {
    let Some(outcome_col) = frame.roles.outcome_column() else {
        return Vec::new();
    };
    let rows = &frame.dataset.rows;
    let Some(positive) = resolver.resolve(frame.rows.iter().map(|&r| &rows[r][outcome_col])) else {
        return Vec::new();
    };

    let positive_key = normalize_label(&positive);

    frame
        .roles
        .sensitive
        .iter()
        .map(|&col| {
            let mut counts: IndexMap<String, usize> = IndexMap::new();
            let mut hits: IndexMap<String, usize> = IndexMap::new();
            for &r in &frame.rows {
                let value = cell_label(&rows[r][col]);
                *counts.entry(value.clone()).or_insert(0) += 1;
                let hit = hits.entry(value).or_insert(0);
                if matches_outcome(&rows[r][outcome_col], &positive_key) {
                    *hit += 1;
                }
            }
            let selection_rates: IndexMap<String, f64> = counts
                .iter()
                .map(|(value, &n)| (value.clone(), hits[value] as f64 / n as f64))
                .collect();

            let max = selection_rates.values().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = selection_rates.values().copied().fold(f64::INFINITY, f64::min);
            let (demographic_parity_difference, disparate_impact_ratio) =
                if selection_rates.is_empty() || max <= 0.0 {
                    (0.0, 1.0)
                } else {
                    (max - min, min / max)
                };

            ParitySummary {
                sensitive_attribute: frame.header(col).to_string(),
                positive_outcome: positive.clone(),
                selection_rates,
                counts,
                demographic_parity_difference,
                disparate_impact_ratio,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisparityConfig;
    use crate::data::{ColumnRole, Dataset, Role, RoleAssignment};
    use serde_json::json;

    fn resolver() -> PositiveOutcomeResolver {
        PositiveOutcomeResolver::new(&DisparityConfig::default().positive_outcomes)
    }

    #[test]
    fn test_selection_rates_and_ratio() {
        let ds = Dataset::new(
            vec!["score".into(), "caste".into(), "approved".into()],
            vec![
                vec![json!(1), json!("A"), json!("No")],
                vec![json!(2), json!("A"), json!("Yes")],
                vec![json!(3), json!("B"), json!("No")],
                vec![json!(4), json!("B"), json!("No")],
                vec![json!(5), json!("A"), json!("Yes")],
                vec![json!(6), json!("B"), json!("Yes")],
            ],
        );
        let roles = RoleAssignment::resolve(
            &ds,
            &[
                ColumnRole::new("score", Role::Merit),
                ColumnRole::new("caste", Role::Sensitive),
                ColumnRole::new("approved", Role::Outcome),
            ],
        )
        .unwrap();
        let frame = AnalysisFrame::new(&ds, &roles, true);
        let summaries = summarize(&frame, &resolver());
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.positive_outcome, "Yes");
        assert!((s.selection_rates["A"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.selection_rates["B"] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.counts["A"], 3);
        assert!((s.demographic_parity_difference - 1.0 / 3.0).abs() < 1e-12);
        assert!((s.disparate_impact_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_first_seen_label_without_keyword() {
        let ds = Dataset::new(
            vec!["score".into(), "g".into(), "out".into()],
            vec![
                vec![json!(1), json!("x"), json!("gold")],
                vec![json!(1), json!("y"), json!("silver")],
            ],
        );
        let roles = RoleAssignment::resolve(
            &ds,
            &[
                ColumnRole::new("score", Role::Merit),
                ColumnRole::new("g", Role::Sensitive),
                ColumnRole::new("out", Role::Outcome),
            ],
        )
        .unwrap();
        let frame = AnalysisFrame::new(&ds, &roles, true);
        let s = &summarize(&frame, &resolver())[0];
        // No keyword match: the first-seen label "gold" is positive.
        assert_eq!(s.positive_outcome, "gold");
        assert_eq!(s.selection_rates["x"], 1.0);
        assert_eq!(s.disparate_impact_ratio, 0.0);
    }

    #[test]
    fn test_outcome_labels_compared_case_insensitively() {
        let ds = Dataset::new(
            vec!["score".into(), "g".into(), "out".into()],
            vec![
                vec![json!(1), json!("x"), json!("Yes")],
                vec![json!(1), json!("y"), json!("yes")],
                vec![json!(1), json!("y"), json!("no")],
            ],
        );
        let roles = RoleAssignment::resolve(
            &ds,
            &[
                ColumnRole::new("score", Role::Merit),
                ColumnRole::new("g", Role::Sensitive),
                ColumnRole::new("out", Role::Outcome),
            ],
        )
        .unwrap();
        let frame = AnalysisFrame::new(&ds, &roles, true);
        let s = &summarize(&frame, &resolver())[0];
        assert_eq!(s.positive_outcome, "Yes");
        assert_eq!(s.selection_rates["x"], 1.0);
        assert_eq!(s.selection_rates["y"], 0.5);
    }

    #[test]
    fn test_no_outcome_column() {
        let ds = Dataset::new(vec!["score".into()], vec![vec![json!(1)]]);
        let roles = RoleAssignment::resolve(&ds, &[ColumnRole::new("score", Role::Merit)]).unwrap();
        let frame = AnalysisFrame::new(&ds, &roles, true);
        assert!(summarize(&frame, &resolver()).is_empty());
    }
}
