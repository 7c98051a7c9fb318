//! Input data model: the caller's table and the confirmed column roles.

pub mod dataset;
pub mod frame;
pub mod roles;

pub use dataset::{Cell, Dataset, cell_as_number, cell_label, is_missing};
pub use frame::AnalysisFrame;
pub use roles::{ColumnRole, Role, RoleAssignment};
