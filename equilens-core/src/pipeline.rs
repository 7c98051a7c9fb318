//! The end-to-end analysis: dataset + confirmed roles in, [`AnalysisReport`] out.
//!
//! ```text
//! validate -> select rows -> normalize merits -> distances -> groups
//!          -> disparities -> metrics -> severity
//! ```
//!
//! Caller errors (malformed table, unknown role column, too many rows) are
//! returned as [`AnalysisError`]. Everything else, including a dataset that
//! cannot be grouped at all, produces a report.

use crate::config::AnalysisConfig;
use crate::data::{AnalysisFrame, Cell, ColumnRole, Dataset, RoleAssignment};
use crate::disparity::{DisparityDetector, DisparityEvidence, DisparityReport};
use crate::distance::DistanceMatrix;
use crate::error::{AnalysisError, Result};
use crate::grouping::{ComparableGroup, GroupFormer, Grouping, OutcomeDistribution};
use crate::metrics::{self, BiasMetrics};
use crate::normalize::{NormalizationParams, normalize_merits};
use crate::parity::{self, ParitySummary};
use crate::severity::{SeverityClassifier, SeverityLevel};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

/// A dataset together with its confirmed column roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub dataset: Dataset,
    #[serde(default)]
    pub roles: Vec<ColumnRole>,
}

impl AnalysisRequest {
    /// Parse a request from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(AnalysisError::invalid_input("request body is empty"));
        }
        Ok(serde_json::from_str(raw)?)
    }
}

/// Top-level verdict flag: `true`, `false`, or `"inconclusive"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasDetected {
    Yes,
    No,
    Inconclusive,
}

impl BiasDetected {
    fn from_outcome(level: SeverityLevel, biased_groups: usize) -> Self {
        match level {
            SeverityLevel::Inconclusive => BiasDetected::Inconclusive,
            _ if biased_groups > 0 => BiasDetected::Yes,
            _ => BiasDetected::No,
        }
    }
}

impl Serialize for BiasDetected {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            BiasDetected::Yes => serializer.serialize_bool(true),
            BiasDetected::No => serializer.serialize_bool(false),
            BiasDetected::Inconclusive => serializer.serialize_str("inconclusive"),
        }
    }
}

impl<'de> Deserialize<'de> for BiasDetected {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(BiasDetected::Yes),
            Repr::Flag(false) => Ok(BiasDetected::No),
            Repr::Text(s) if s.eq_ignore_ascii_case("inconclusive") => Ok(BiasDetected::Inconclusive),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "expected true, false or \"inconclusive\", got \"{s}\""
            ))),
        }
    }
}

/// One comparable group and what the detector found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_key: String,
    pub size: usize,
    /// Original row indices of the members.
    pub row_indices: Vec<usize>,
    pub merit_attributes: IndexMap<String, Cell>,
    pub outcome_distribution: OutcomeDistribution,
    pub has_bias: bool,
    pub affected_sensitive_attributes: IndexSet<String>,
    pub evidence: Vec<DisparityEvidence>,
}

impl GroupSummary {
    fn new(group: &ComparableGroup, report: DisparityReport) -> Self {
        Self {
            group_key: group.group_key.clone(),
            size: group.len(),
            row_indices: group.records.iter().map(|r| r.row_index).collect(),
            merit_attributes: group.merit_attributes.clone(),
            outcome_distribution: group.outcome_distribution.clone(),
            has_bias: report.has_bias,
            affected_sensitive_attributes: report.affected_sensitive_attributes,
            evidence: report.evidence,
        }
    }
}

/// Which input rows took part in the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub rows_total: usize,
    pub rows_analyzed: usize,
    /// Original indices of rows left out for missing role values.
    pub rows_excluded: Vec<usize>,
}

/// The analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub bias_detected: BiasDetected,
    pub severity: SeverityLevel,
    pub metrics: BiasMetrics,
    pub affected_sensitive_attributes: Vec<String>,
    pub reasoning: Vec<String>,
    pub confidence: f64,
    pub groups: Vec<GroupSummary>,
    pub normalization: Vec<NormalizationParams>,
    pub dataset_parity: Vec<ParitySummary>,
    pub data_quality: DataQuality,
}

/// Runs the pipeline with one validated configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    former: GroupFormer,
    detector: DisparityDetector,
    classifier: SeverityClassifier,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            former: GroupFormer::new(config.grouping.clone()),
            detector: DisparityDetector::new(config.disparity.clone()),
            classifier: SeverityClassifier::new(config.severity.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze_request(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        self.analyze(&request.dataset, &request.roles)
    }

    pub fn analyze(&self, dataset: &Dataset, roles: &[ColumnRole]) -> Result<AnalysisReport> {
        dataset.validate()?;
        let max_rows = self.config.limits.max_rows;
        if dataset.row_count() > max_rows {
            return Err(AnalysisError::resource_limit(format!(
                "dataset has {} rows; the limit is {max_rows}",
                dataset.row_count()
            )));
        }

        let assignment = RoleAssignment::resolve(dataset, roles)?;
        let mut reasoning = precondition_notes(&assignment);

        let frame = AnalysisFrame::new(dataset, &assignment, self.config.limits.drop_incomplete_rows);
        if !frame.excluded.is_empty() {
            reasoning.push(format!(
                "{} of {} rows were excluded for missing merit, sensitive or outcome values.",
                frame.excluded.len(),
                dataset.row_count()
            ));
        }

        let (normalization, grouping) = if assignment.is_analyzable() {
            let merits = normalize_merits(dataset, &assignment.merit, &frame.rows);
            let distances = DistanceMatrix::compute(&merits);
            (merits.params, self.former.form(&frame, &distances))
        } else {
            (Vec::new(), Grouping::default())
        };

        let reports = self.detector.detect_all(&grouping.groups);
        let metrics = metrics::aggregate(&reports, &grouping.metadata);
        debug!(
            groups = metrics.total_groups,
            biased = metrics.biased_groups,
            consistency = metrics.consistency_score,
            "Aggregated disparity reports"
        );

        let severity = self.classifier.classify(&metrics);
        reasoning.extend(severity.reasoning);

        let groups = grouping
            .groups
            .iter()
            .zip(reports)
            .map(|(group, report)| GroupSummary::new(group, report))
            .collect();
        let dataset_parity = parity::summarize(&frame, self.detector.resolver());

        let report = AnalysisReport {
            bias_detected: BiasDetected::from_outcome(severity.level, metrics.biased_groups),
            severity: severity.level,
            affected_sensitive_attributes: metrics.frequency_by_sensitive_attribute.keys().cloned().collect(),
            reasoning,
            confidence: severity.confidence,
            groups,
            normalization,
            dataset_parity,
            data_quality: DataQuality {
                rows_total: dataset.row_count(),
                rows_analyzed: frame.rows.len(),
                rows_excluded: frame.excluded.clone(),
            },
            metrics,
        };

        info!(
            severity = %report.severity,
            confidence = report.confidence,
            groups = report.metrics.total_groups,
            biased = report.metrics.biased_groups,
            "Analysis complete"
        );
        Ok(report)
    }
}

/// Analyze with the default configuration.
pub fn analyze(dataset: &Dataset, roles: &[ColumnRole]) -> Result<AnalysisReport> {
    Analyzer::new(AnalysisConfig::default())?.analyze(dataset, roles)
}

/// Reasoning lines for roles that make grouping impossible.
fn precondition_notes(assignment: &RoleAssignment) -> Vec<String> {
    let mut notes = Vec::new();
    if assignment.merit.is_empty() {
        warn!("No merit columns labeled; skipping grouping");
        notes.push("No merit column is labeled, so no comparable groups can be formed.".to_string());
    }
    match assignment.outcomes.len() {
        0 => {
            warn!("No outcome column labeled; skipping grouping");
            notes.push("No outcome column is labeled, so outcomes cannot be compared.".to_string());
        }
        1 => {}
        n => {
            warn!(outcome_columns = n, "Multiple outcome columns labeled; skipping grouping");
            notes.push(format!("{n} columns are labeled as outcome; exactly one is required."));
        }
    }
    notes
}
