//! Builder utilities for configuring the analysis driver.
//!
//! Exposes the tunable surface — metric, burn-in, subsampling bound, split
//! count, seed — and validates it before constructing [`Arbora`] instances.

use std::num::NonZeroUsize;

use crate::distance::TreeMetric;
use crate::engine::Arbora;
use crate::error::{ArboraError, Result};

const DEFAULT_BURNIN_FRACTION: f64 = 0.1;
const DEFAULT_MAX_TREES: usize = 500;
const DEFAULT_SPLITS: usize = 2;

/// Configures and constructs [`Arbora`] instances.
///
/// # Examples
/// ```
/// use arbora_core::{ArboraBuilder, TreeMetric};
///
/// let arbora = ArboraBuilder::new()
///     .with_metric(TreeMetric::Path)
///     .with_burnin_fraction(0.25)
///     .with_seed(7)
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(arbora.metric(), TreeMetric::Path);
/// assert_eq!(arbora.burnin_fraction(), 0.25);
/// ```
#[derive(Debug, Clone)]
pub struct ArboraBuilder {
    metric: TreeMetric,
    burnin_fraction: f64,
    max_trees: usize,
    splits: usize,
    seed: u64,
}

impl Default for ArboraBuilder {
    fn default() -> Self {
        Self {
            metric: TreeMetric::RobinsonFoulds,
            burnin_fraction: DEFAULT_BURNIN_FRACTION,
            max_trees: DEFAULT_MAX_TREES,
            splits: DEFAULT_SPLITS,
            seed: 0,
        }
    }
}

impl ArboraBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the pairwise tree metric for the MDS pipeline.
    #[must_use]
    pub fn with_metric(mut self, metric: TreeMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the fraction of leading trees discarded as burn-in.
    #[must_use]
    pub fn with_burnin_fraction(mut self, fraction: f64) -> Self {
        self.burnin_fraction = fraction;
        self
    }

    /// Bounds how many trees the MDS pipeline embeds; larger inputs are
    /// subsampled with the configured seed.
    #[must_use]
    pub fn with_max_trees(mut self, max_trees: usize) -> Self {
        self.max_trees = max_trees;
        self
    }

    /// Sets the number of chains the dissonance diagnostic splits into.
    #[must_use]
    pub fn with_splits(mut self, splits: usize) -> Self {
        self.splits = splits;
        self
    }

    /// Sets the RNG seed used for every subsampling decision.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validates the configuration and constructs an [`Arbora`] instance.
    ///
    /// # Errors
    /// Returns [`ArboraError::InvalidConfiguration`] when the burn-in
    /// fraction falls outside `[0, 1)`, `max_trees` is zero, or fewer than
    /// two splits are requested.
    pub fn build(self) -> Result<Arbora> {
        if !(0.0..1.0).contains(&self.burnin_fraction) {
            return Err(ArboraError::InvalidConfiguration {
                parameter: "burnin_fraction",
                requirement: "within [0, 1)",
                got: self.burnin_fraction.to_string(),
            });
        }
        let max_trees = NonZeroUsize::new(self.max_trees).ok_or_else(|| {
            ArboraError::InvalidConfiguration {
                parameter: "max_trees",
                requirement: "at least 1",
                got: self.max_trees.to_string(),
            }
        })?;
        if self.splits < 2 {
            return Err(ArboraError::InvalidConfiguration {
                parameter: "splits",
                requirement: "at least 2",
                got: self.splits.to_string(),
            });
        }

        Ok(Arbora::new(
            self.metric,
            self.burnin_fraction,
            max_trees,
            self.splits,
            self.seed,
        ))
    }
}
