//! Tree-to-tree distance kernels.
//!
//! Three metrics are exposed: Robinson–Foulds over non-trivial bipartitions,
//! the SPR approximation ⌈RF/2⌉ (a contractual lower bound, never the exact
//! SPR distance), and the mean path difference over shared leaf pairs. The
//! matrix builders compute the upper triangle and mirror it.

mod matrix;
mod path;
mod robinson_foulds;

use std::fmt;

pub use self::matrix::{distance_matrix, distance_matrix_with_progress, PROGRESS_COLUMN_STRIDE};
pub use self::path::path_distance;
pub use self::robinson_foulds::{rf_distance, spr_distance};

use crate::tree::Tree;

/// Selectable pairwise tree metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TreeMetric {
    /// Robinson–Foulds bipartition distance.
    RobinsonFoulds,
    /// Approximate SPR distance, defined as ⌈RF/2⌉.
    Spr,
    /// Mean absolute path-length difference over shared leaf pairs.
    Path,
}

impl fmt::Display for TreeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RobinsonFoulds => "robinson-foulds",
            Self::Spr => "spr",
            Self::Path => "path",
        })
    }
}

/// Computes the distance between two trees under `metric`.
#[must_use]
pub fn tree_distance(metric: TreeMetric, left: &Tree, right: &Tree) -> f64 {
    match metric {
        TreeMetric::RobinsonFoulds => rf_distance(left, right) as f64,
        TreeMetric::Spr => spr_distance(left, right) as f64,
        TreeMetric::Path => path_distance(left, right),
    }
}
