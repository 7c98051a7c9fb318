//! Pairwise merit distance.
//!
//! For each pair of records the per-dimension contributions are averaged:
//! numeric dimensions contribute `|a - b|` on the normalized scale and
//! categorical dimensions contribute 0 when equal, 1 otherwise. The average
//! keeps distances comparable across datasets with different numbers of merit
//! columns, but it has no fixed upper bound, so grouping thresholds are
//! heuristics rather than probabilities.
//!
//! Construction is O(n²·d) and dominates the pipeline's cost. The matrix is
//! built once per analysis and shared by every epsilon attempt. The group
//! former reads edges from it in widening bands rather than all at once.

use crate::normalize::{MeritKind, NormalizedMerits};

/// Symmetric n×n matrix of non-negative distances with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise distances for the normalized merit vectors.
    pub fn compute(merits: &NormalizedMerits) -> Self {
        let size = merits.len();
        let dims = merits.dimensions();
        let mut cells = vec![0.0; size * size];

        if dims > 0 {
            for i in 0..size {
                for j in (i + 1)..size {
                    let d = pair_distance(&merits.vectors[i], &merits.vectors[j], merits) / dims as f64;
                    cells[i * size + j] = d;
                    cells[j * size + i] = d;
                }
            }
        }

        tracing::debug!(records = size, dimensions = dims, "Computed distance matrix");
        Self { size, cells }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance between records `i` and `j`.
    ///
    /// # Panics
    /// If either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.size && j < self.size, "distance index out of bounds");
        self.cells[i * self.size + j]
    }

    /// Unordered pairs `(i, j, distance)` with `i < j` and distance `<= limit`.
    pub fn pairs_within(&self, limit: f64) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.size).flat_map(move |i| {
            ((i + 1)..self.size).filter_map(move |j| {
                let d = self.cells[i * self.size + j];
                (d <= limit).then_some((i, j, d))
            })
        })
    }
}

fn pair_distance(a: &[f64], b: &[f64], merits: &NormalizedMerits) -> f64 {
    merits
        .params
        .iter()
        .zip(a.iter().zip(b))
        .map(|(param, (x, y))| match param.kind {
            MeritKind::Numeric => (x - y).abs(),
            MeritKind::Categorical => {
                if x == y {
                    0.0
                } else {
                    1.0
                }
            }
        })
        .sum()
}
