//! Severity classification.
//!
//! A fixed sequence of rules turns [`BiasMetrics`] into a verdict:
//!
//! 1. fewer groups than `min_sample_size` -> INCONCLUSIVE, confidence 0
//! 2. no biased group -> LOW, confidence 1
//! 3. base level from the bias ratio
//! 4. escalate one level for a large average magnitude
//! 5. escalate one level for a high consistency score
//! 6. confidence from coverage, consistency and magnitude, discounted by the
//!    grouping epsilon
//!
//! Every rule that fires appends a line to `reasoning`.

use crate::config::SeverityConfig;
use crate::error::Result;
use crate::metrics::BiasMetrics;
use serde::{Deserialize, Serialize};

/// Upper bound on the confidence discount applied for wide grouping.
const MAX_EPSILON_PENALTY: f64 = 0.3;

/// Verdict level, ordered from least to most severe; INCONCLUSIVE sits apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Inconclusive,
}

impl SeverityLevel {
    /// One step up. HIGH and INCONCLUSIVE are unchanged.
    pub fn escalate(self) -> Self {
        match self {
            SeverityLevel::Low => SeverityLevel::Medium,
            SeverityLevel::Medium => SeverityLevel::High,
            other => other,
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "LOW"),
            SeverityLevel::Medium => write!(f, "MEDIUM"),
            SeverityLevel::High => write!(f, "HIGH"),
            SeverityLevel::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

/// The verdict with its reasoning trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityResult {
    pub level: SeverityLevel,
    pub bias_ratio: f64,
    pub reasoning: Vec<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
}

/// Rule-based classifier over validated thresholds.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    config: SeverityConfig,
}

impl SeverityClassifier {
    /// Validate the thresholds once; `low_threshold < medium_threshold` is required.
    pub fn new(config: SeverityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SeverityConfig {
        &self.config
    }

    pub fn classify(&self, metrics: &BiasMetrics) -> SeverityResult {
        let cfg = &self.config;
        let mut reasoning = Vec::new();

        if metrics.total_groups < cfg.min_sample_size {
            reasoning.push(format!(
                "Only {} comparable group(s) could be formed; at least {} are needed for a verdict.",
                metrics.total_groups, cfg.min_sample_size
            ));
            return SeverityResult {
                level: SeverityLevel::Inconclusive,
                bias_ratio: metrics.bias_ratio,
                reasoning,
                confidence: 0.0,
            };
        }

        if metrics.biased_groups == 0 {
            reasoning.push(format!(
                "None of the {} comparable groups shows a meaningful outcome disparity.",
                metrics.total_groups
            ));
            return SeverityResult {
                level: SeverityLevel::Low,
                bias_ratio: metrics.bias_ratio,
                reasoning,
                confidence: 1.0,
            };
        }

        let mut level = if metrics.bias_ratio < cfg.low_threshold {
            reasoning.push(format!(
                "{} of {} comparable groups show a disparity; bias ratio {:.2} is below {:.2}.",
                metrics.biased_groups, metrics.total_groups, metrics.bias_ratio, cfg.low_threshold
            ));
            SeverityLevel::Low
        } else if metrics.bias_ratio <= cfg.medium_threshold {
            reasoning.push(format!(
                "{} of {} comparable groups show a disparity; bias ratio {:.2} is between {:.2} and {:.2}.",
                metrics.biased_groups,
                metrics.total_groups,
                metrics.bias_ratio,
                cfg.low_threshold,
                cfg.medium_threshold
            ));
            SeverityLevel::Medium
        } else {
            reasoning.push(format!(
                "{} of {} comparable groups show a disparity; bias ratio {:.2} is above {:.2}.",
                metrics.biased_groups, metrics.total_groups, metrics.bias_ratio, cfg.medium_threshold
            ));
            SeverityLevel::High
        };

        if metrics.average_magnitude >= cfg.magnitude_escalation {
            level = level.escalate();
            reasoning.push(format!(
                "Average disparity magnitude {:.2} reaches {:.2}; severity raised to {level}.",
                metrics.average_magnitude, cfg.magnitude_escalation
            ));
        }

        if metrics.consistency_score >= cfg.consistency_escalation {
            level = level.escalate();
            reasoning.push(format!(
                "Consistency score {:.2} reaches {:.2}: the same attributes recur across groups; severity raised to {level}.",
                metrics.consistency_score, cfg.consistency_escalation
            ));
        }

        let confidence = self.confidence(metrics);
        reasoning.push(format!(
            "Confidence {:.2} after grouping at epsilon {:.2}.",
            confidence, metrics.grouping_metadata.epsilon_used
        ));

        SeverityResult {
            level,
            bias_ratio: metrics.bias_ratio,
            reasoning,
            confidence,
        }
    }

    /// `0.4·coverage + 0.3·consistency + 0.3·magnitude`, scaled down by up to
    /// 30% as the grouping epsilon widens.
    fn confidence(&self, metrics: &BiasMetrics) -> f64 {
        let full_coverage = (self.config.min_sample_size * 5) as f64;
        let coverage = (metrics.total_groups as f64 / full_coverage).min(1.0);
        let magnitude = (metrics.average_magnitude * 2.0).min(1.0);
        let raw = 0.4 * coverage + 0.3 * metrics.consistency_score + 0.3 * magnitude;
        let penalty = (metrics.grouping_metadata.epsilon_used * 0.3).min(MAX_EPSILON_PENALTY);
        (raw * (1.0 - penalty)).clamp(0.0, 1.0)
    }
}
