//! Property-based tests for the analysis pipeline using proptest.

use proptest::prelude::*;

use equilens_core::config::SeverityConfig;
use equilens_core::data::{ColumnRole, Dataset, Role};
use equilens_core::distance::DistanceMatrix;
use equilens_core::grouping::{GroupingMetadata, components_at};
use equilens_core::metrics::BiasMetrics;
use equilens_core::normalize::normalize_merits;
use equilens_core::pipeline::analyze;
use equilens_core::severity::{SeverityClassifier, SeverityLevel};
use serde_json::json;

fn dataset(rows: &[(i64, bool, bool)]) -> Dataset {
    Dataset::new(
        vec!["score".into(), "gender".into(), "hired".into()],
        rows.iter()
            .map(|&(score, male, hired)| {
                vec![
                    json!(score),
                    json!(if male { "M" } else { "F" }),
                    json!(if hired { "yes" } else { "no" }),
                ]
            })
            .collect(),
    )
}

fn roles() -> Vec<ColumnRole> {
    vec![
        ColumnRole::new("score", Role::Merit),
        ColumnRole::new("gender", Role::Sensitive),
        ColumnRole::new("hired", Role::Outcome),
    ]
}

fn distances(scores: &[i64]) -> DistanceMatrix {
    let rows: Vec<_> = scores.iter().map(|&s| (s, true, true)).collect();
    let ds = dataset(&rows);
    let all: Vec<usize> = (0..ds.row_count()).collect();
    DistanceMatrix::compute(&normalize_merits(&ds, &[0], &all))
}

fn metrics(total: usize, biased: usize, magnitude: f64, consistency: f64) -> BiasMetrics {
    BiasMetrics {
        total_groups: total,
        biased_groups: biased,
        bias_ratio: if total == 0 { 0.0 } else { biased as f64 / total as f64 },
        average_magnitude: magnitude,
        consistency_score: consistency,
        grouping_metadata: GroupingMetadata {
            epsilon_used: 0.1,
            ..GroupingMetadata::default()
        },
        ..BiasMetrics::default()
    }
}

// --- Distance matrix properties ---

proptest! {
    #[test]
    fn distance_matrix_symmetric_with_zero_diagonal(
        scores in prop::collection::vec(-1000i64..1000, 0..40),
    ) {
        let matrix = distances(&scores);
        prop_assert_eq!(matrix.len(), scores.len());
        for i in 0..matrix.len() {
            prop_assert_eq!(matrix.get(i, i), 0.0);
            for j in 0..matrix.len() {
                prop_assert_eq!(matrix.get(i, j), matrix.get(j, i));
                prop_assert!(matrix.get(i, j) >= 0.0);
            }
        }
    }
}

// --- Grouping monotonicity ---

proptest! {
    #[test]
    fn wider_epsilon_refines_into_coarser_groups(
        scores in prop::collection::vec(0i64..50, 0..40),
        small in 1u32..10,
        extra in 0u32..10,
    ) {
        let matrix = distances(&scores);
        let eps_small = small as f64 * 0.1;
        let eps_large = eps_small + extra as f64 * 0.1;
        let fine = components_at(&matrix, eps_small);
        let coarse = components_at(&matrix, eps_large);

        let covered = |groups: &[Vec<usize>]| groups.iter().map(Vec::len).sum::<usize>();
        prop_assert!(covered(&coarse) >= covered(&fine));

        for group in &fine {
            prop_assert!(coarse.iter().any(|c| group.iter().all(|m| c.contains(m))));
        }
    }
}

// --- Severity properties ---

proptest! {
    #[test]
    fn below_sample_size_is_inconclusive(
        min_sample in 1usize..20,
        total_frac in 0.0f64..1.0,
        magnitude in 0.0f64..1.0,
        consistency in 0.0f64..1.0,
    ) {
        let total = ((min_sample as f64) * total_frac) as usize;
        prop_assume!(total < min_sample);
        let classifier = SeverityClassifier::new(SeverityConfig {
            min_sample_size: min_sample,
            ..SeverityConfig::default()
        }).unwrap();
        let result = classifier.classify(&metrics(total, total, magnitude, consistency));
        prop_assert_eq!(result.level, SeverityLevel::Inconclusive);
        prop_assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn no_biased_groups_is_low(total in 3usize..200, consistency in 0.0f64..1.0) {
        let classifier = SeverityClassifier::new(SeverityConfig::default()).unwrap();
        let result = classifier.classify(&metrics(total, 0, 0.0, consistency));
        prop_assert_eq!(result.level, SeverityLevel::Low);
        prop_assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn confidence_stays_in_unit_interval(
        total in 3usize..200,
        biased_frac in 0.0f64..=1.0,
        magnitude in 0.0f64..=1.0,
        consistency in 0.0f64..=1.0,
    ) {
        let biased = ((total as f64) * biased_frac) as usize;
        let classifier = SeverityClassifier::new(SeverityConfig::default()).unwrap();
        let result = classifier.classify(&metrics(total, biased, magnitude, consistency));
        prop_assert!((0.0..=1.0).contains(&result.confidence));
    }
}

// --- Whole-pipeline properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn bias_ratio_matches_group_counts(
        rows in prop::collection::vec((0i64..8, any::<bool>(), any::<bool>()), 0..60),
    ) {
        let report = analyze(&dataset(&rows), &roles()).unwrap();
        let m = &report.metrics;
        let expected = if m.total_groups == 0 {
            0.0
        } else {
            m.biased_groups as f64 / m.total_groups as f64
        };
        prop_assert_eq!(m.bias_ratio, expected);
        prop_assert_eq!(m.total_groups, report.groups.len());
        prop_assert_eq!(m.grouping_metadata.group_count, m.total_groups);
        prop_assert!(report.groups.iter().all(|g| g.size >= 2));
        prop_assert!((0.0..=1.0).contains(&report.confidence));
    }

    #[test]
    fn pipeline_verdict_follows_counts(
        rows in prop::collection::vec((0i64..8, any::<bool>(), any::<bool>()), 0..60),
    ) {
        let report = analyze(&dataset(&rows), &roles()).unwrap();
        if report.metrics.total_groups < 3 {
            prop_assert_eq!(report.severity, SeverityLevel::Inconclusive);
            prop_assert_eq!(report.confidence, 0.0);
        } else if report.metrics.biased_groups == 0 {
            prop_assert_eq!(report.severity, SeverityLevel::Low);
            prop_assert_eq!(report.confidence, 1.0);
        }
    }
}
