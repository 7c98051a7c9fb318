//! The slice of a dataset that takes part in one analysis.

use crate::data::dataset::{Dataset, is_missing};
use crate::data::roles::RoleAssignment;

/// A dataset, its resolved roles, and the rows selected for analysis.
///
/// `rows` holds indices into the caller's table in their original order.
#[derive(Debug, Clone)]
pub struct AnalysisFrame<'a> {
    pub dataset: &'a Dataset,
    pub roles: &'a RoleAssignment,
    pub rows: Vec<usize>,
    /// Rows left out because a role column was null or blank.
    pub excluded: Vec<usize>,
}

impl<'a> AnalysisFrame<'a> {
    /// Select rows. With `drop_incomplete`, rows missing any merit, sensitive,
    /// or outcome value are excluded; otherwise every row is kept.
    pub fn new(dataset: &'a Dataset, roles: &'a RoleAssignment, drop_incomplete: bool) -> Self {
        let mut rows = Vec::with_capacity(dataset.row_count());
        let mut excluded = Vec::new();
        for (idx, row) in dataset.rows.iter().enumerate() {
            let incomplete = drop_incomplete && roles.active_columns().any(|col| is_missing(&row[col]));
            if incomplete {
                excluded.push(idx);
            } else {
                rows.push(idx);
            }
        }
        if !excluded.is_empty() {
            tracing::debug!(excluded = excluded.len(), "Excluded rows with missing role values");
        }
        Self {
            dataset,
            roles,
            rows,
            excluded,
        }
    }

    pub fn header(&self, column: usize) -> &str {
        &self.dataset.headers[column]
    }
}
