//! Comparable-group formation.
//!
//! Records are linked when their merit distance is at most epsilon, and every
//! connected component with two or more records becomes a comparable group.
//! Epsilon starts small and widens step by step until enough groups exist or
//! the cap is passed.
//!
//! Because epsilon only grows, edges are only ever added. Components are
//! therefore maintained incrementally with a union-find over the edges sorted
//! by distance, instead of re-running a graph traversal from scratch for each
//! attempt. The components at every attempt are identical to a fresh traversal
//! of the graph at that epsilon. The search never runs more than
//! [`MAX_EPSILON_ATTEMPTS`] attempts, even for an unvalidated configuration.
//!
//! Grouping reads merit distances only. Outcome and sensitive values are
//! attached to records after the partition is fixed.

use crate::config::{GroupingConfig, MAX_EPSILON_ATTEMPTS};
use crate::data::{AnalysisFrame, Cell, cell_label};
use crate::distance::DistanceMatrix;
use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

/// Slack applied to distance and epsilon comparisons so that accumulated
/// floating-point error does not drop an edge sitting exactly on a threshold.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// One record inside a comparable group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Index into the caller's original table.
    pub row_index: usize,
    /// Sensitive attribute name -> raw value.
    pub sensitive_attributes: IndexMap<String, Cell>,
    pub outcome: Cell,
}

/// Per sensitive attribute, record counts by attribute value.
pub type OutcomeDistribution = IndexMap<String, IndexMap<String, usize>>;

/// A set of records similar enough on merit to compare outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableGroup {
    pub group_key: String,
    pub records: Vec<GroupRecord>,
    /// Raw merit values of the group's first record.
    // TODO: consider a centroid or per-column median once consumers of the
    // snapshot are settled; the first record is not representative of wide groups.
    pub merit_attributes: IndexMap<String, Cell>,
    pub outcome_distribution: OutcomeDistribution,
}

impl ComparableGroup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How the final grouping was reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingMetadata {
    pub epsilon_used: f64,
    pub epsilon_attempts: usize,
    pub merit_dimensions_used: usize,
    pub group_count: usize,
    pub max_epsilon_reached: bool,
}

/// Groups plus the metadata describing the search that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    pub groups: Vec<ComparableGroup>,
    pub metadata: GroupingMetadata,
}

/// Adaptive-epsilon group former.
#[derive(Debug, Clone)]
pub struct GroupFormer {
    config: GroupingConfig,
}

impl GroupFormer {
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    /// Partition the frame's records into comparable groups.
    ///
    /// `distances` must be indexed by position in `frame.rows`. Without a merit
    /// column or a single outcome column the result is empty with zeroed
    /// metadata.
    pub fn form(&self, frame: &AnalysisFrame<'_>, distances: &DistanceMatrix) -> Grouping {
        if !frame.roles.is_analyzable() {
            return Grouping::default();
        }

        let cfg = &self.config;
        let n = distances.len();
        let mut components = UnionFind::<usize>::new(n);
        // Sorted edges not yet unioned; edges are loaded in bands of attempts
        // that double in width, so a search that stops early never
        // materializes the edges near `epsilon_max`.
        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        let mut cursor = 0;
        let mut loaded_to = f64::NEG_INFINITY;
        let mut band = 1;
        let mut attempts = 0;
        let mut epsilon = round_epsilon(cfg.epsilon_start);
        let mut max_epsilon_reached = false;
        let mut members;

        loop {
            attempts += 1;
            if epsilon + THRESHOLD_TOLERANCE > loaded_to {
                let last_attempt = attempts - 1 + band - 1;
                let upper = round_epsilon(cfg.epsilon_start + last_attempt as f64 * cfg.epsilon_step)
                    .min(cfg.epsilon_max)
                    .max(epsilon);
                let lower = loaded_to;
                loaded_to = upper + THRESHOLD_TOLERANCE;
                edges.drain(..cursor);
                cursor = 0;
                let start = edges.len();
                edges.extend(distances.pairs_within(loaded_to).filter(|e| e.2 > lower));
                edges[start..].sort_by(|a, b| a.2.total_cmp(&b.2));
                tracing::debug!(up_to = upper, edges = edges.len() - start, "Loaded edge band");
                band *= 2;
            }
            while cursor < edges.len() && edges[cursor].2 <= epsilon + THRESHOLD_TOLERANCE {
                let (a, b, _) = edges[cursor];
                components.union(a, b);
                cursor += 1;
            }
            members = collect_components(&components, n);
            tracing::debug!(epsilon, attempt = attempts, groups = members.len(), "Grouping attempt");

            if members.len() >= cfg.target_group_count {
                break;
            }
            let next = round_epsilon(cfg.epsilon_start + attempts as f64 * cfg.epsilon_step);
            if next > cfg.epsilon_max + THRESHOLD_TOLERANCE || attempts >= MAX_EPSILON_ATTEMPTS {
                max_epsilon_reached = true;
                break;
            }
            epsilon = next;
        }

        let groups: Vec<ComparableGroup> = members
            .iter()
            .enumerate()
            .map(|(idx, positions)| build_group(frame, idx, positions))
            .collect();

        let metadata = GroupingMetadata {
            epsilon_used: epsilon,
            epsilon_attempts: attempts,
            merit_dimensions_used: frame.roles.merit.len(),
            group_count: groups.len(),
            max_epsilon_reached,
        };
        tracing::debug!(
            epsilon = metadata.epsilon_used,
            groups = metadata.group_count,
            max_epsilon_reached,
            "Formed comparable groups"
        );
        Grouping { groups, metadata }
    }
}

/// Connected components with two or more members at a single epsilon,
/// computed from scratch.
///
/// Members are positions into the distance matrix, ascending; components are
/// ordered by their first member.
pub fn components_at(distances: &DistanceMatrix, epsilon: f64) -> Vec<Vec<usize>> {
    let n = distances.len();
    let mut components = UnionFind::<usize>::new(n);
    for (a, b, _) in distances.pairs_within(epsilon + THRESHOLD_TOLERANCE) {
        components.union(a, b);
    }
    collect_components(&components, n)
}

fn collect_components(components: &UnionFind<usize>, n: usize) -> Vec<Vec<usize>> {
    let mut by_root: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for node in 0..n {
        by_root.entry(components.find(node)).or_default().push(node);
    }
    by_root.into_values().filter(|m| m.len() >= 2).collect()
}

/// Snap to a 1e-9 grid so `0.1 + 2 * 0.1` reports as `0.3`.
fn round_epsilon(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}

fn build_group(frame: &AnalysisFrame<'_>, idx: usize, positions: &[usize]) -> ComparableGroup {
    let dataset = frame.dataset;
    let roles = frame.roles;
    let outcome_col = roles.outcome_column();

    let records: Vec<GroupRecord> = positions
        .iter()
        .map(|&pos| {
            let row_index = frame.rows[pos];
            let row = &dataset.rows[row_index];
            let sensitive_attributes = roles
                .sensitive
                .iter()
                .map(|&col| (frame.header(col).to_string(), row[col].clone()))
                .collect();
            let outcome = outcome_col.map(|col| row[col].clone()).unwrap_or_default();
            GroupRecord {
                row_index,
                sensitive_attributes,
                outcome,
            }
        })
        .collect();

    let first_row = &dataset.rows[records[0].row_index];
    let merit_attributes = roles
        .merit
        .iter()
        .map(|&col| (frame.header(col).to_string(), first_row[col].clone()))
        .collect();

    let mut outcome_distribution: OutcomeDistribution = IndexMap::new();
    for &col in &roles.sensitive {
        let counts = outcome_distribution
            .entry(frame.header(col).to_string())
            .or_default();
        for record in &records {
            let value = record
                .sensitive_attributes
                .get(frame.header(col))
                .map(cell_label)
                .unwrap_or_default();
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    ComparableGroup {
        group_key: format!("group_{}", idx + 1),
        records,
        merit_attributes,
        outcome_distribution,
    }
}
