//! Error types for the equilens-core crate.
//!
//! Only caller contract violations are errors. "Not enough data" and "no bias"
//! are ordinary analysis results and never surface here.

use thiserror::Error;

/// Top-level error type for analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Role error: {0}")]
    Roles(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn roles(msg: impl Into<String>) -> Self {
        Self::Roles(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;
