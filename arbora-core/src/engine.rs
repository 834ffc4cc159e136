//! The analysis driver.
//!
//! [`Arbora`] orchestrates the three independent pipelines over a tree
//! sample: distances → MDS embedding, trees → CCD → statistics, and trees →
//! split → dissonance. Construction goes through
//! [`crate::ArboraBuilder`], which validates the configuration.

use std::num::NonZeroUsize;

use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::ccd::{burnin_count, Ccd, CladeSummary};
use crate::dissonance::{self, DissonanceResult};
use crate::distance::{distance_matrix, distance_matrix_with_progress, TreeMetric};
use crate::error::{ArboraError, Result};
use crate::mds::classical_mds;
use crate::progress::ProgressFn;
use crate::sampling::sample_indices;
use crate::tree::Tree;

/// How many clades [`Arbora::ccd_statistics`] reports.
const TOP_CLADE_LIMIT: usize = 10;

/// Entry point for running the tree-set analysis pipelines.
///
/// # Examples
/// ```
/// use arbora_core::{ArboraBuilder, TreeBuilder};
///
/// let mut builder = TreeBuilder::new();
/// let a = builder.leaf("A");
/// let b = builder.leaf("B");
/// let ab = builder.join(a, b);
/// let c = builder.leaf("C");
/// let root = builder.join(ab, c);
/// let tree = builder.finish(root);
///
/// let arbora = ArboraBuilder::new()
///     .with_burnin_fraction(0.0)
///     .build()
///     .expect("configuration is valid");
/// let result = arbora
///     .mds_pipeline(&[tree.clone(), tree])
///     .expect("two trees embed");
/// assert_eq!(result.coordinates.nrows(), 2);
/// assert_eq!(result.labels, ["Tree 1", "Tree 2"]);
/// ```
#[derive(Debug, Clone)]
pub struct Arbora {
    metric: TreeMetric,
    burnin_fraction: f64,
    max_trees: NonZeroUsize,
    splits: usize,
    seed: u64,
}

/// Shape metadata accompanying an [`MdsPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdsSummary {
    /// Metric the distance matrix was computed under.
    pub metric: TreeMetric,
    /// Trees supplied to the pipeline.
    pub input_trees: usize,
    /// Trees discarded as burn-in.
    pub discarded_burnin: usize,
    /// Trees that entered the distance matrix after subsampling.
    pub embedded_trees: usize,
}

/// Output of the distance/MDS pipeline.
#[derive(Debug, Clone)]
pub struct MdsPipeline {
    /// Symmetric pairwise distance matrix over the embedded trees.
    pub distances: Array2<f64>,
    /// Two-dimensional embedding, one row per tree.
    pub coordinates: Array2<f64>,
    /// Display label per embedded tree: `Tree {originalIndex + 1}`.
    pub labels: Vec<String>,
    /// Shape metadata.
    pub summary: MdsSummary,
}

/// Headline statistics of a CCD.
#[derive(Debug, Clone)]
pub struct CcdStatistics {
    /// Base trees ingested.
    pub number_of_trees: usize,
    /// Distinct clades in the DAG.
    pub number_of_clades: usize,
    /// Taxa in the frozen index.
    pub number_of_leaves: usize,
    /// Phylogenetic entropy, forward form.
    pub entropy: f64,
    /// Phylogenetic entropy, Lewis recursive form.
    pub entropy_lewis: f64,
    /// Log-probability of the most probable topology.
    pub max_log_tree_probability: f64,
    /// Probability of the most probable topology.
    pub max_tree_probability: f64,
    /// Highest-probability non-leaf, non-root clades, at most ten.
    pub top_clades: Vec<CladeSummary>,
}

impl Arbora {
    pub(crate) fn new(
        metric: TreeMetric,
        burnin_fraction: f64,
        max_trees: NonZeroUsize,
        splits: usize,
        seed: u64,
    ) -> Self {
        Self {
            metric,
            burnin_fraction,
            max_trees,
            splits,
            seed,
        }
    }

    /// Returns the configured pairwise metric.
    #[must_use]
    pub fn metric(&self) -> TreeMetric {
        self.metric
    }

    /// Returns the configured burn-in fraction.
    #[must_use]
    pub fn burnin_fraction(&self) -> f64 {
        self.burnin_fraction
    }

    /// Returns the MDS subsampling bound.
    #[must_use]
    pub fn max_trees(&self) -> NonZeroUsize {
        self.max_trees
    }

    /// Returns the dissonance split count.
    #[must_use]
    pub fn splits(&self) -> usize {
        self.splits
    }

    /// Returns the subsampling seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs the distance → MDS pipeline with a parallel matrix fill.
    ///
    /// # Errors
    /// Returns [`ArboraError::InsufficientTrees`] for fewer than two trees
    /// and [`ArboraError::NumericFailure`] when the embedding fails.
    pub fn mds_pipeline(&self, trees: &[Tree]) -> Result<MdsPipeline> {
        self.run_mds(trees, None)
    }

    /// As [`Arbora::mds_pipeline`], but serial, yielding to `progress`
    /// every few matrix columns. The numeric result is identical.
    ///
    /// # Errors
    /// Additionally returns [`ArboraError::Cancelled`] when the callback
    /// breaks.
    pub fn mds_pipeline_with_progress(
        &self,
        trees: &[Tree],
        progress: &mut ProgressFn<'_>,
    ) -> Result<MdsPipeline> {
        self.run_mds(trees, Some(progress))
    }

    fn run_mds(
        &self,
        trees: &[Tree],
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<MdsPipeline> {
        if trees.len() < 2 {
            return Err(ArboraError::InsufficientTrees {
                operation: "MDS",
                needed: 2,
                got: trees.len(),
            });
        }

        let discarded = burnin_count(trees.len(), self.burnin_fraction);
        let retained = &trees[discarded..];

        let selected_offsets = if retained.len() > self.max_trees.get() {
            let mut rng = SmallRng::seed_from_u64(self.seed);
            let mut offsets = sample_indices(retained.len(), self.max_trees.get(), &mut rng);
            offsets.sort_unstable();
            offsets
        } else {
            (0..retained.len()).collect()
        };

        let selected: Vec<Tree> = selected_offsets
            .iter()
            .map(|&offset| retained[offset].clone())
            .collect();
        let labels: Vec<String> = selected_offsets
            .iter()
            .map(|&offset| format!("Tree {}", discarded + offset + 1))
            .collect();

        let distances = match progress {
            Some(callback) => {
                distance_matrix_with_progress(&selected, self.metric, Some(callback))?
            }
            None => distance_matrix(&selected, self.metric),
        };
        let coordinates = classical_mds(&distances)?;

        Ok(MdsPipeline {
            summary: MdsSummary {
                metric: self.metric,
                input_trees: trees.len(),
                discarded_burnin: discarded,
                embedded_trees: selected.len(),
            },
            distances,
            coordinates,
            labels,
        })
    }

    /// Builds a CCD from `trees` under the configured burn-in.
    ///
    /// # Errors
    /// Returns [`ArboraError::MalformedTree`] for non-binary input.
    pub fn build_ccd(&self, trees: &[Tree]) -> Result<Ccd> {
        Ccd::build(trees, self.burnin_fraction)
    }

    /// As [`Arbora::build_ccd`], yielding to `progress` between tree
    /// ingestions.
    ///
    /// # Errors
    /// Additionally returns [`ArboraError::Cancelled`] when the callback
    /// breaks; a cancelled construction is discarded.
    pub fn build_ccd_with_progress(
        &self,
        trees: &[Tree],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Ccd> {
        Ccd::build_with_progress(trees, self.burnin_fraction, Some(progress))
    }

    /// Collects the headline statistics of `ccd`.
    #[must_use]
    pub fn ccd_statistics(&self, ccd: &mut Ccd) -> CcdStatistics {
        match self.collect_statistics(ccd, None) {
            Ok(statistics) => statistics,
            Err(_) => unreachable!("no callback, no cancellation"),
        }
    }

    /// As [`Arbora::ccd_statistics`], yielding to `progress` every few
    /// scored clades.
    ///
    /// # Errors
    /// Returns [`ArboraError::Cancelled`] when the callback breaks.
    pub fn ccd_statistics_with_progress(
        &self,
        ccd: &mut Ccd,
        progress: &mut ProgressFn<'_>,
    ) -> Result<CcdStatistics> {
        self.collect_statistics(ccd, Some(progress))
    }

    fn collect_statistics(
        &self,
        ccd: &mut Ccd,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<CcdStatistics> {
        let entropy = ccd.entropy_with_progress(progress.as_deref_mut())?;
        let entropy_lewis = ccd.entropy_lewis_with_progress(progress.as_deref_mut())?;
        let max_log_tree_probability =
            ccd.max_log_tree_probability_with_progress(progress.as_deref_mut())?;

        Ok(CcdStatistics {
            number_of_trees: ccd.tree_count(),
            number_of_clades: ccd.clade_count(),
            number_of_leaves: ccd.leaf_count(),
            entropy,
            entropy_lewis,
            max_log_tree_probability,
            max_tree_probability: max_log_tree_probability.exp(),
            top_clades: ccd.top_clades(TOP_CLADE_LIMIT),
        })
    }

    /// Runs the within-chain dissonance diagnostic with the configured
    /// split count and seed.
    ///
    /// # Errors
    /// Returns [`ArboraError::InsufficientTrees`] when fewer than
    /// `2 · splits` trees are supplied.
    pub fn within_chain_dissonance(&self, trees: &[Tree]) -> Result<DissonanceResult> {
        dissonance::within_chain_dissonance(trees, self.splits, self.seed, None)
    }

    /// As [`Arbora::within_chain_dissonance`], yielding to `progress` after
    /// every incremental step.
    ///
    /// # Errors
    /// Additionally returns [`ArboraError::Cancelled`] when the callback
    /// breaks.
    pub fn within_chain_dissonance_with_progress(
        &self,
        trees: &[Tree],
        progress: &mut ProgressFn<'_>,
    ) -> Result<DissonanceResult> {
        dissonance::within_chain_dissonance(trees, self.splits, self.seed, Some(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::builder::ArboraBuilder;
    use crate::tree::TreeBuilder;

    fn cherry(first: &str, second: &str, third: &str) -> Tree {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf(first);
        let b = builder.leaf(second);
        let ab = builder.join(a, b);
        let c = builder.leaf(third);
        let root = builder.join(ab, c);
        builder.finish(root)
    }

    fn arbora() -> Arbora {
        ArboraBuilder::new()
            .with_burnin_fraction(0.0)
            .build()
            .expect("valid configuration")
    }

    #[test]
    fn mds_pipeline_requires_two_trees() {
        let err = arbora()
            .mds_pipeline(&[cherry("A", "B", "C")])
            .expect_err("one tree cannot embed");
        assert_eq!(err.code(), crate::ArboraErrorCode::InsufficientTrees);
    }

    #[test]
    fn mds_pipeline_shapes_match() {
        let trees = vec![
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
            cherry("B", "C", "A"),
        ];
        let result = arbora().mds_pipeline(&trees).expect("three trees embed");
        assert_eq!(result.distances.nrows(), 3);
        assert_eq!(result.coordinates.nrows(), 3);
        assert_eq!(result.coordinates.ncols(), 2);
        assert_eq!(result.labels, ["Tree 1", "Tree 2", "Tree 3"]);
        assert_eq!(result.summary.embedded_trees, 3);
        assert_eq!(result.summary.discarded_burnin, 0);
    }

    #[test]
    fn subsampling_is_deterministic_and_sorted() {
        let trees: Vec<Tree> = (0..20).map(|_| cherry("A", "B", "C")).collect();
        let arbora = ArboraBuilder::new()
            .with_burnin_fraction(0.0)
            .with_max_trees(5)
            .with_seed(17)
            .build()
            .expect("valid configuration");

        let first = arbora.mds_pipeline(&trees).expect("subsample embeds");
        let second = arbora.mds_pipeline(&trees).expect("subsample embeds");
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.labels.len(), 5);

        let indices: Vec<usize> = first
            .labels
            .iter()
            .map(|label| {
                label
                    .strip_prefix("Tree ")
                    .and_then(|raw| raw.parse().ok())
                    .expect("labels carry indices")
            })
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn burnin_offsets_labels() {
        let trees: Vec<Tree> = (0..10).map(|_| cherry("A", "B", "C")).collect();
        let arbora = ArboraBuilder::new()
            .with_burnin_fraction(0.2)
            .build()
            .expect("valid configuration");
        let result = arbora.mds_pipeline(&trees).expect("eight trees embed");
        assert_eq!(result.summary.discarded_burnin, 2);
        assert_eq!(result.labels.first().map(String::as_str), Some("Tree 3"));
    }

    #[test]
    fn ccd_statistics_cover_the_headline_numbers() {
        let trees = vec![
            cherry("A", "B", "C"),
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
        ];
        let arbora = arbora();
        let mut ccd = arbora.build_ccd(&trees).expect("well-formed trees");
        let statistics = arbora.ccd_statistics(&mut ccd);

        assert_eq!(statistics.number_of_trees, 3);
        assert_eq!(statistics.number_of_leaves, 3);
        assert!((statistics.max_tree_probability - 2.0 / 3.0).abs() < 1e-12);
        assert!(statistics.entropy > 0.0);
        assert!(statistics.top_clades.len() <= 10);
        assert_eq!(statistics.top_clades[0].taxa, ["A", "B"]);
    }

    #[test]
    fn dissonance_uses_configured_splits() {
        let trees: Vec<Tree> = (0..12).map(|_| cherry("A", "B", "C")).collect();
        let arbora = ArboraBuilder::new()
            .with_burnin_fraction(0.0)
            .with_splits(3)
            .build()
            .expect("valid configuration");
        let result = arbora
            .within_chain_dissonance(&trees)
            .expect("twelve trees split three ways");
        assert_eq!(result.chain_entropies.len(), 3);
        assert_eq!(result.dissonance.len(), 4);
    }
}
