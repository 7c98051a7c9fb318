//! Configuration for the analysis pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> explicit config file -> environment. Configuration is loaded from
//! `~/.config/equilens/config.toml` and/or `.equilens/config.toml` in the
//! workspace directory.
//!
//! A loaded [`AnalysisConfig`] is plain data. It is checked once by
//! [`AnalysisConfig::validate`], which every consumer that depends on its
//! invariants (the [`Analyzer`](crate::pipeline::Analyzer) and the
//! [`SeverityClassifier`](crate::severity::SeverityClassifier)) calls at
//! construction.

use crate::error::{AnalysisError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Most epsilon attempts a grouping configuration may require.
pub const MAX_EPSILON_ATTEMPTS: usize = 1_000;

/// Smallest accepted epsilon step; epsilon values are snapped to this grid.
pub const MIN_EPSILON_STEP: f64 = 1e-9;

/// Top-level analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Adaptive epsilon search used by the group former.
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// Within-group disparity detection.
    #[serde(default)]
    pub disparity: DisparityConfig,
    /// Severity thresholds and escalation rules.
    #[serde(default)]
    pub severity: SeverityConfig,
    /// Input size ceiling and missing-data policy.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl AnalysisConfig {
    /// Check every cross-field invariant. Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.grouping.validate()?;
        self.disparity.validate()?;
        self.severity.validate()?;
        self.limits.validate()
    }
}

/// Adaptive epsilon search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// First distance threshold tried.
    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,
    /// Increment between attempts.
    #[serde(default = "default_epsilon_step")]
    pub epsilon_step: f64,
    /// Largest threshold tried before giving up.
    #[serde(default = "default_epsilon_max")]
    pub epsilon_max: f64,
    /// The search stops as soon as this many groups exist.
    #[serde(default = "default_target_group_count")]
    pub target_group_count: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            epsilon_start: default_epsilon_start(),
            epsilon_step: default_epsilon_step(),
            epsilon_max: default_epsilon_max(),
            target_group_count: default_target_group_count(),
        }
    }
}

impl GroupingConfig {
    fn validate(&self) -> Result<()> {
        if !(self.epsilon_start.is_finite() && self.epsilon_start > 0.0) {
            return Err(AnalysisError::config(format!(
                "grouping.epsilon_start must be a positive number, got {}",
                self.epsilon_start
            )));
        }
        if !(self.epsilon_step.is_finite() && self.epsilon_step >= MIN_EPSILON_STEP) {
            return Err(AnalysisError::config(format!(
                "grouping.epsilon_step must be at least {MIN_EPSILON_STEP}, got {}",
                self.epsilon_step
            )));
        }
        if !self.epsilon_max.is_finite() || self.epsilon_start > self.epsilon_max {
            return Err(AnalysisError::config(format!(
                "grouping.epsilon_start ({}) must not exceed grouping.epsilon_max ({})",
                self.epsilon_start, self.epsilon_max
            )));
        }
        let attempts = self.max_attempts();
        if attempts > MAX_EPSILON_ATTEMPTS as f64 {
            return Err(AnalysisError::config(format!(
                "grouping would try {attempts} epsilon values between {} and {} in steps of {}; at most {MAX_EPSILON_ATTEMPTS} are allowed",
                self.epsilon_start, self.epsilon_max, self.epsilon_step
            )));
        }
        if self.target_group_count == 0 {
            return Err(AnalysisError::config(
                "grouping.target_group_count must be at least 1",
            ));
        }
        Ok(())
    }

    /// Number of epsilon values from `epsilon_start` to `epsilon_max`.
    pub fn max_attempts(&self) -> f64 {
        ((self.epsilon_max - self.epsilon_start) / self.epsilon_step + 1e-9).floor() + 1.0
    }
}

fn default_epsilon_start() -> f64 {
    0.1
}

fn default_epsilon_step() -> f64 {
    0.1
}

fn default_epsilon_max() -> f64 {
    1.0
}

fn default_target_group_count() -> usize {
    3
}

/// Outcome disparity detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisparityConfig {
    /// Minimum records per compared subset. Kept at 1 by default so small
    /// datasets still surface disparities; raise it to trade recall for
    /// robustness.
    #[serde(default = "default_min_subset_size")]
    pub min_subset_size: usize,
    /// Rate difference at or above which a disparity counts as meaningful.
    #[serde(default = "default_meaningful_magnitude")]
    pub meaningful_magnitude: f64,
    /// Outcome labels treated as the favorable outcome (case-insensitive).
    #[serde(default = "default_positive_outcomes")]
    pub positive_outcomes: Vec<String>,
}

impl Default for DisparityConfig {
    fn default() -> Self {
        Self {
            min_subset_size: default_min_subset_size(),
            meaningful_magnitude: default_meaningful_magnitude(),
            positive_outcomes: default_positive_outcomes(),
        }
    }
}

impl DisparityConfig {
    fn validate(&self) -> Result<()> {
        if self.min_subset_size == 0 {
            return Err(AnalysisError::config(
                "disparity.min_subset_size must be at least 1",
            ));
        }
        if !(self.meaningful_magnitude > 0.0 && self.meaningful_magnitude <= 1.0) {
            return Err(AnalysisError::config(format!(
                "disparity.meaningful_magnitude must be in (0, 1], got {}",
                self.meaningful_magnitude
            )));
        }
        Ok(())
    }
}

fn default_min_subset_size() -> usize {
    1
}

fn default_meaningful_magnitude() -> f64 {
    0.10
}

fn default_positive_outcomes() -> Vec<String> {
    [
        "1", "true", "yes", "y", "selected", "hired", "approved", "accepted", "admitted",
        "enrolled", "passed", "success",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Severity classification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityConfig {
    /// Bias ratios below this are LOW.
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    /// Bias ratios up to and including this are MEDIUM; above is HIGH.
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Fewer comparable groups than this yields INCONCLUSIVE.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
    /// Average magnitude at which severity escalates one level.
    #[serde(default = "default_magnitude_escalation")]
    pub magnitude_escalation: f64,
    /// Consistency score at which severity escalates one level.
    #[serde(default = "default_consistency_escalation")]
    pub consistency_escalation: f64,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            medium_threshold: default_medium_threshold(),
            min_sample_size: default_min_sample_size(),
            magnitude_escalation: default_magnitude_escalation(),
            consistency_escalation: default_consistency_escalation(),
        }
    }
}

impl SeverityConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.low_threshold)
            || !(0.0..=1.0).contains(&self.medium_threshold)
        {
            return Err(AnalysisError::config(format!(
                "severity thresholds must lie in [0, 1], got low={} medium={}",
                self.low_threshold, self.medium_threshold
            )));
        }
        if self.low_threshold >= self.medium_threshold {
            return Err(AnalysisError::config(format!(
                "severity.low_threshold ({}) must be below severity.medium_threshold ({})",
                self.low_threshold, self.medium_threshold
            )));
        }
        if self.min_sample_size == 0 {
            return Err(AnalysisError::config(
                "severity.min_sample_size must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_low_threshold() -> f64 {
    0.10
}

fn default_medium_threshold() -> f64 {
    0.30
}

fn default_min_sample_size() -> usize {
    3
}

fn default_magnitude_escalation() -> f64 {
    0.5
}

fn default_consistency_escalation() -> f64 {
    0.7
}

/// Input limits and missing-data handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted dataset, in rows.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Exclude rows with a null or blank merit, sensitive, or outcome cell.
    #[serde(default = "default_true")]
    pub drop_incomplete_rows: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            drop_incomplete_rows: true,
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(AnalysisError::config("limits.max_rows must be at least 1"));
        }
        Ok(())
    }
}

fn default_max_rows() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `EQUILENS_`)
/// 2. Explicit config file (`config_file`)
/// 3. Workspace-local config (`.equilens/config.toml`)
/// 4. User config (`~/.config/equilens/config.toml`)
/// 5. Built-in defaults
///
/// The result is not validated; callers go through [`AnalysisConfig::validate`].
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
) -> std::result::Result<AnalysisConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AnalysisConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "equilens", "equilens") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".equilens").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    // EQUILENS_SEVERITY__LOW_THRESHOLD, EQUILENS_LIMITS__MAX_ROWS, etc.
    figment = figment.merge(Env::prefixed("EQUILENS_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.severity.min_sample_size, 3);
        assert_eq!(config.grouping.target_group_count, 3);
        assert_eq!(config.disparity.min_subset_size, 1);
        assert_eq!(config.limits.max_rows, 10_000);
        assert!(config.limits.drop_incomplete_rows);
    }

    #[test]
    fn test_default_positive_outcomes() {
        let outcomes = default_positive_outcomes();
        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.contains(&"hired".to_string()));
        assert!(outcomes.contains(&"1".to_string()));
    }

    #[test]
    fn test_low_threshold_must_be_below_medium() {
        let mut config = AnalysisConfig::default();
        config.severity.low_threshold = 0.3;
        config.severity.medium_threshold = 0.3;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
        assert!(err.to_string().contains("low_threshold"));
    }

    #[test]
    fn test_zero_min_sample_size_rejected() {
        let mut config = AnalysisConfig::default();
        config.severity.min_sample_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_epsilon_bounds_rejected() {
        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_step = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_start = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_epsilon_step_below_grid_rejected() {
        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_step = 1e-12;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
        assert!(err.to_string().contains("epsilon_step"));
    }

    #[test]
    fn test_epsilon_attempt_budget_enforced() {
        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_max = 1e6;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most 1000"));

        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_step = 1e-5;
        assert!(config.validate().is_err());

        // 0.1 to 100.0 in steps of 0.1 is exactly 1000 attempts.
        let mut config = AnalysisConfig::default();
        config.grouping.epsilon_max = 100.0;
        assert!(config.grouping.max_attempts() <= MAX_EPSILON_ATTEMPTS as f64);
        assert!(config.validate().is_ok());
        assert_eq!(AnalysisConfig::default().grouping.max_attempts(), 10.0);
    }

    #[test]
    fn test_meaningful_magnitude_range() {
        let mut config = AnalysisConfig::default();
        config.disparity.meaningful_magnitude = 1.5;
        assert!(config.validate().is_err());
        config.disparity.meaningful_magnitude = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AnalysisConfig = toml_from_str(
            r#"
            [severity]
            low_threshold = 0.05
            "#,
        );
        assert_eq!(config.severity.low_threshold, 0.05);
        assert_eq!(config.severity.medium_threshold, 0.30);
        assert_eq!(config.grouping, GroupingConfig::default());
    }

    #[test]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.severity.min_sample_size, 3);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".equilens");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[severity]\nmin_sample_size = 5\n\n[disparity]\nmin_subset_size = 2\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.severity.min_sample_size, 5);
        assert_eq!(config.disparity.min_subset_size, 2);
        assert_eq!(config.severity.low_threshold, 0.10);
    }

    #[test]
    fn test_explicit_file_overrides_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".equilens");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[limits]\nmax_rows = 50\n",
        )
        .unwrap();
        let explicit = dir.path().join("strict.toml");
        std::fs::write(&explicit, "[limits]\nmax_rows = 20\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.limits.max_rows, 20);
    }

    fn toml_from_str(input: &str) -> AnalysisConfig {
        Figment::from(Serialized::defaults(AnalysisConfig::default()))
            .merge(Toml::string(input))
            .extract()
            .unwrap()
    }
}
