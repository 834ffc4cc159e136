//! Pairwise distance-matrix construction.
//!
//! Per-tree representations (split sets or path maps) are prepared once so
//! the n² fill is pure set arithmetic. The parallel builder splits the
//! upper-triangle pair list across Rayon workers and mirrors the results;
//! the progress-reporting builder is serial, as the reference contract
//! requires, and yields to the callback every [`PROGRESS_COLUMN_STRIDE`]
//! columns.

use std::collections::{HashMap, HashSet};

use ndarray::Array2;
use rayon::prelude::*;

use super::path::{leaf_path_lengths, path_from_maps};
use super::robinson_foulds::{bipartitions, rf_from_splits, Split};
use super::TreeMetric;
use crate::error::Result;
use crate::progress::{Progress, ProgressFn, Reporter};
use crate::tree::Tree;

/// Columns between progress notifications in the serial builder.
pub const PROGRESS_COLUMN_STRIDE: usize = 10;

enum Prepared {
    Splits(Vec<HashSet<Split>>),
    Paths(Vec<HashMap<String, f64>>),
}

impl Prepared {
    fn from_trees(trees: &[Tree], metric: TreeMetric) -> Self {
        match metric {
            TreeMetric::RobinsonFoulds | TreeMetric::Spr => {
                Self::Splits(trees.iter().map(bipartitions).collect())
            }
            TreeMetric::Path => Self::Paths(trees.iter().map(leaf_path_lengths).collect()),
        }
    }

    fn distance(&self, metric: TreeMetric, i: usize, j: usize) -> f64 {
        match self {
            Self::Splits(splits) => {
                let rf = rf_from_splits(&splits[i], &splits[j]);
                match metric {
                    TreeMetric::Spr => rf.div_ceil(2) as f64,
                    _ => rf as f64,
                }
            }
            Self::Paths(paths) => path_from_maps(&paths[i], &paths[j]),
        }
    }
}

/// Builds the symmetric zero-diagonal distance matrix in parallel.
#[must_use]
pub fn distance_matrix(trees: &[Tree], metric: TreeMetric) -> Array2<f64> {
    let n = trees.len();
    let prepared = Prepared::from_trees(trees, metric);

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let cells: Vec<((usize, usize), f64)> = pairs
        .par_iter()
        .map(|&(i, j)| ((i, j), prepared.distance(metric, i, j)))
        .collect();

    let mut matrix = Array2::<f64>::zeros((n, n));
    for ((i, j), value) in cells {
        matrix[[i, j]] = value;
        matrix[[j, i]] = value;
    }
    matrix
}

/// Serial variant that reports `(row, column, total)` to `progress` every
/// [`PROGRESS_COLUMN_STRIDE`] columns. The numeric result is identical to
/// [`distance_matrix`].
///
/// # Errors
/// Returns [`crate::ArboraError::Cancelled`] when the callback breaks.
pub fn distance_matrix_with_progress(
    trees: &[Tree],
    metric: TreeMetric,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<Array2<f64>> {
    let n = trees.len();
    let prepared = Prepared::from_trees(trees, metric);
    let mut reporter = Reporter::new(progress, "distance matrix");

    let mut matrix = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        for i in 0..j {
            let value = prepared.distance(metric, i, j);
            matrix[[i, j]] = value;
            matrix[[j, i]] = value;
        }
        if (j + 1) % PROGRESS_COLUMN_STRIDE == 0 || j + 1 == n {
            reporter.emit(Progress::DistanceCell {
                row: j.saturating_sub(1),
                column: j,
                total: n,
            })?;
        }
    }
    Ok(matrix)
}
