//! Column role labels and their resolution against a dataset's headers.

use crate::data::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The part a column plays in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Qualification attribute deciding whether two records are comparable.
    Merit,
    /// Protected attribute across whose values parity is tested.
    Sensitive,
    /// The decision being checked.
    Outcome,
    Ignored,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Merit => write!(f, "merit"),
            Role::Sensitive => write!(f, "sensitive"),
            Role::Outcome => write!(f, "outcome"),
            Role::Ignored => write!(f, "ignored"),
        }
    }
}

/// A human-confirmed role for one column.
///
/// `confidence` and `reason` record where the suggestion came from; the
/// pipeline passes them through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRole {
    #[serde(alias = "columnName")]
    pub column_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ColumnRole {
    pub fn new(column_name: impl Into<String>, role: Role) -> Self {
        Self {
            column_name: column_name.into(),
            role,
            confidence: None,
            reason: None,
        }
    }
}

/// Column positions per role, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleAssignment {
    pub merit: Vec<usize>,
    pub sensitive: Vec<usize>,
    /// Every column labeled outcome. More than one is a tolerated
    /// precondition violation; see [`RoleAssignment::outcome_column`].
    pub outcomes: Vec<usize>,
}

impl RoleAssignment {
    /// Map role labels onto header positions.
    ///
    /// Labels naming a column that does not exist, or a column labeled twice
    /// with different roles, are rejected. Unlabeled columns are ignored.
    pub fn resolve(dataset: &Dataset, roles: &[ColumnRole]) -> Result<Self> {
        let mut by_column: HashMap<&str, Role> = HashMap::new();
        for entry in roles {
            if dataset.column_index(&entry.column_name).is_none() {
                return Err(AnalysisError::roles(format!(
                    "role assigned to unknown column '{}'",
                    entry.column_name
                )));
            }
            if let Some(previous) = by_column.insert(entry.column_name.as_str(), entry.role) {
                if previous != entry.role {
                    return Err(AnalysisError::roles(format!(
                        "column '{}' is labeled both {previous} and {}",
                        entry.column_name, entry.role
                    )));
                }
            }
        }

        let mut assignment = Self::default();
        for (idx, header) in dataset.headers.iter().enumerate() {
            match by_column.get(header.as_str()) {
                Some(Role::Merit) => assignment.merit.push(idx),
                Some(Role::Sensitive) => assignment.sensitive.push(idx),
                Some(Role::Outcome) => assignment.outcomes.push(idx),
                Some(Role::Ignored) | None => {}
            }
        }
        Ok(assignment)
    }

    /// The outcome column, when exactly one is labeled.
    pub fn outcome_column(&self) -> Option<usize> {
        match self.outcomes.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// At least one merit column and exactly one outcome column.
    pub fn is_analyzable(&self) -> bool {
        !self.merit.is_empty() && self.outcome_column().is_some()
    }

    /// Every column that takes part in the analysis.
    pub fn active_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.merit
            .iter()
            .chain(self.sensitive.iter())
            .chain(self.outcomes.iter())
            .copied()
    }
}
