//! # Equilens Core
//!
//! Merit-conditioned outcome bias analysis for tabular decision data.
//! Records that are similar on merit are grouped together, outcome rates are
//! compared across sensitive attribute values inside each group, and the
//! findings are reduced to a severity verdict with a reasoning trail.
//!
//! The pipeline is pure and synchronous: the same dataset, roles and
//! configuration always produce the same [`AnalysisReport`].

pub mod config;
pub mod data;
pub mod disparity;
pub mod distance;
pub mod error;
pub mod grouping;
pub mod metrics;
pub mod normalize;
pub mod parity;
pub mod pipeline;
pub mod severity;

// Re-export commonly used types at the crate root.
pub use config::{AnalysisConfig, DisparityConfig, GroupingConfig, LimitsConfig, SeverityConfig, load_config};
pub use data::{Cell, ColumnRole, Dataset, Role};
pub use disparity::{DisparityEvidence, DisparityReport};
pub use error::{AnalysisError, Result};
pub use grouping::{ComparableGroup, GroupingMetadata};
pub use metrics::BiasMetrics;
pub use pipeline::{AnalysisReport, AnalysisRequest, Analyzer, BiasDetected, analyze};
pub use severity::{SeverityLevel, SeverityResult};
