//! Progress reporting and cooperative cancellation.
//!
//! Long-running computations accept an optional callback that is invoked at
//! documented suspension points: every k-th distance-matrix column, between
//! tree ingestions during CCD construction, every 100 clades during entropy
//! and maximum-probability scoring, and every step of incremental dissonance
//! construction. Returning [`ControlFlow::Break`] from the callback cancels
//! the computation, which surfaces as [`ArboraError::Cancelled`].

use std::ops::ControlFlow;

use crate::error::{ArboraError, Result};

/// A progress notification emitted at a suspension point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Progress {
    /// A distance-matrix cell `(row, column)` out of `total` trees was filled.
    DistanceCell {
        /// Row of the most recently completed cell.
        row: usize,
        /// Column of the most recently completed cell.
        column: usize,
        /// Number of trees on each side of the matrix.
        total: usize,
    },
    /// `done` of `total` trees have been ingested into a CCD.
    TreesIngested {
        /// Trees ingested so far.
        done: usize,
        /// Trees that will be ingested in total.
        total: usize,
    },
    /// `done` of `total` clades have been visited by a scoring pass.
    CladesScored {
        /// Clades processed so far.
        done: usize,
        /// Clades the pass will visit in total.
        total: usize,
    },
    /// One incremental dissonance step finished.
    DissonanceStep {
        /// Steps completed so far.
        step: usize,
        /// Total number of steps.
        total: usize,
    },
}

/// Callback invoked at suspension points; `Break` cancels cooperatively.
pub type ProgressFn<'a> = dyn FnMut(Progress) -> ControlFlow<()> + 'a;

/// Threads an optional callback through a computation stage.
///
/// The reporter owns the stage name so cancellation errors name the work
/// that was interrupted.
pub(crate) struct Reporter<'a, 'b> {
    callback: Option<&'a mut ProgressFn<'b>>,
    stage: &'static str,
}

impl<'a, 'b> Reporter<'a, 'b> {
    pub(crate) fn new(callback: Option<&'a mut ProgressFn<'b>>, stage: &'static str) -> Self {
        Self { callback, stage }
    }

    /// Emits `event` and converts a `Break` into [`ArboraError::Cancelled`].
    pub(crate) fn emit(&mut self, event: Progress) -> Result<()> {
        match self.callback.as_mut() {
            Some(callback) => match callback(event) {
                ControlFlow::Continue(()) => Ok(()),
                ControlFlow::Break(()) => Err(ArboraError::Cancelled { stage: self.stage }),
            },
            None => Ok(()),
        }
    }
}

/// Clade interval between [`Progress::CladesScored`] notifications.
pub(crate) const CLADE_PROGRESS_STRIDE: usize = 100;
