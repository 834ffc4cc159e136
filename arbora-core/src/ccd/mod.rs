//! Conditional clade distributions.
//!
//! A CCD is a factorised probability model over rooted binary tree
//! topologies: a DAG whose vertices are clades (deduplicated by their taxon
//! bitset) and whose hyperedges are observed splits of a clade into two
//! children. Tree ingestion accumulates occurrence counts; normalising the
//! counts yields conditional clade probabilities (CCPs), from which marginal
//! clade probabilities, entropies, and tree probabilities derive.
//!
//! Construction is incremental. `add_tree` leaves the CCD accumulating;
//! normalisation runs lazily before any query, so every getter reflects the
//! current tree multiset. The taxon index is frozen at construction and a
//! late tree carrying an unindexed label is rejected rather than silently
//! widening the model.

mod clade;
mod scores;

use std::collections::{HashMap, VecDeque};

pub use self::clade::{Clade, CladeId, CladePartition};
pub use self::scores::CladeSummary;

use crate::bitset::TaxonBits;
use crate::error::Result;
use crate::progress::{Progress, ProgressFn, Reporter};
use crate::taxa::TaxonIndex;
use crate::tree::Tree;

/// Marginal probabilities in `(1, 1 + PROBABILITY_SLACK]` clip back to 1.
const PROBABILITY_SLACK: f64 = 1e-5;

/// A conditional clade distribution over a frozen taxon index.
#[derive(Debug, Clone)]
pub struct Ccd {
    taxa: TaxonIndex,
    clades: Vec<Clade>,
    lookup: HashMap<TaxonBits, CladeId>,
    root: CladeId,
    tree_count: usize,
    ccps_stale: bool,
    probabilities_stale: bool,
    entropy_cache: Option<f64>,
    entropy_lewis_cache: Option<f64>,
    max_log_cache: Option<f64>,
    topology_count_cache: Option<f64>,
}

impl Ccd {
    /// Creates an empty CCD over `taxa`, with the root clade (all taxa)
    /// created eagerly.
    #[must_use]
    pub fn new(taxa: TaxonIndex) -> Self {
        let root_bits = TaxonBits::full(taxa.len());
        let root = CladeId(0);
        let mut lookup = HashMap::new();
        lookup.insert(root_bits.clone(), root);
        Self {
            taxa,
            clades: vec![Clade::new(root_bits)],
            lookup,
            root,
            tree_count: 0,
            ccps_stale: false,
            probabilities_stale: false,
            entropy_cache: None,
            entropy_lewis_cache: None,
            max_log_cache: None,
            topology_count_cache: None,
        }
    }

    /// Builds a CCD from `trees`, discarding the first
    /// `⌊trees.len() · burnin_fraction⌋` trees and indexing the taxa of the
    /// remainder.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::MalformedTree`] for non-binary input.
    pub fn build(trees: &[Tree], burnin_fraction: f64) -> Result<Self> {
        Self::build_with_progress(trees, burnin_fraction, None)
    }

    /// As [`Ccd::build`], yielding to `progress` between tree ingestions.
    ///
    /// # Errors
    /// Additionally returns [`crate::ArboraError::Cancelled`] when the
    /// callback breaks; the partially built CCD is discarded.
    pub fn build_with_progress(
        trees: &[Tree],
        burnin_fraction: f64,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<Self> {
        let retained = discard_burnin(trees, burnin_fraction);
        let taxa = TaxonIndex::from_trees(retained.iter().copied());
        let mut ccd = Self::new(taxa);
        let mut reporter = Reporter::new(progress, "ccd construction");

        let total = retained.len();
        for (offset, tree) in retained.into_iter().enumerate() {
            ccd.add_tree(tree, offset)?;
            reporter.emit(Progress::TreesIngested {
                done: offset + 1,
                total,
            })?;
        }
        Ok(ccd)
    }

    /// Returns the frozen taxon index.
    #[must_use]
    pub fn taxa(&self) -> &TaxonIndex {
        &self.taxa
    }

    /// Returns the root clade id.
    #[must_use]
    pub fn root(&self) -> CladeId {
        self.root
    }

    /// Returns the clade behind `id`.
    #[must_use]
    pub fn clade(&self, id: CladeId) -> &Clade {
        &self.clades[id.0]
    }

    /// Looks a clade up by its bitset.
    #[must_use]
    pub fn find_clade(&self, bits: &TaxonBits) -> Option<CladeId> {
        self.lookup.get(bits).copied()
    }

    /// Number of taxa.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.taxa.len()
    }

    /// Number of ingested base trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Number of distinct clades, the eager root included.
    #[must_use]
    pub fn clade_count(&self) -> usize {
        self.clades.len()
    }

    /// Iterates over all clades in creation order.
    pub fn iter_clades(&self) -> impl Iterator<Item = &Clade> {
        self.clades.iter()
    }

    /// Number of distinct partitions across all clades.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.clades
            .iter()
            .map(|clade| clade.partitions().len())
            .sum()
    }

    /// Ingests one tree, incrementing clade and partition counts.
    ///
    /// `tree_index` names the tree in error messages.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::MalformedTree`] for non-binary input
    /// and [`crate::ArboraError::TaxonUnknown`] when a leaf label is missing
    /// from the frozen taxon index.
    pub fn add_tree(&mut self, tree: &Tree, tree_index: usize) -> Result<()> {
        tree.validate_binary(tree_index)?;

        let mut node_bits: Vec<Option<TaxonBits>> = vec![None; tree.len()];
        let mut node_clades: Vec<Option<CladeId>> = vec![None; tree.len()];

        for id in tree.post_order() {
            let node = tree.node(id);
            let bits = if node.is_leaf() {
                let label = match node.label() {
                    Some(label) => label.to_owned(),
                    None => id.index().to_string(),
                };
                self.taxa.leaf_bits(&label, tree_index)?
            } else {
                let children = node.children();
                let mut bits = match &node_bits[children[0].index()] {
                    Some(bits) => bits.clone(),
                    None => unreachable!("post-order visits children first"),
                };
                if let Some(other) = &node_bits[children[1].index()] {
                    bits.or(other);
                }
                bits
            };

            let height = node.height().unwrap_or(0.0);
            let clade_id = self.ensure_clade(bits.clone());
            self.clades[clade_id.0].record_occurrence(height);

            if !node.is_leaf() {
                let children = node.children();
                let (left, right) = match (
                    node_clades[children[0].index()],
                    node_clades[children[1].index()],
                ) {
                    (Some(left), Some(right)) => (left, right),
                    _ => unreachable!("post-order visits children first"),
                };
                let partition = self.clades[clade_id.0].ensure_partition(left, right);
                self.clades[clade_id.0]
                    .partition_mut(partition)
                    .record_occurrence(height);
                self.clades[left.0].record_parent(clade_id);
                self.clades[right.0].record_parent(clade_id);
            }

            node_bits[id.index()] = Some(bits);
            node_clades[id.index()] = Some(clade_id);
        }

        self.tree_count += 1;
        self.mark_stale();
        Ok(())
    }

    /// Normalises partition counts into CCPs.
    ///
    /// Runs automatically before any query; exposed so incremental callers
    /// (the dissonance loop) can re-normalise in lockstep after each
    /// `add_tree`.
    pub fn initialise(&mut self) {
        for clade in &mut self.clades {
            let total: usize = clade
                .partitions()
                .iter()
                .map(CladePartition::occurrences)
                .sum();
            if total == 0 {
                continue;
            }
            if !clade.is_leaf() {
                debug_assert_eq!(
                    total,
                    clade.occurrences(),
                    "partition occurrences must sum to the clade count"
                );
            }
            for index in 0..clade.partitions().len() {
                let occurrences = clade.partitions()[index].occurrences();
                clade
                    .partition_mut(index)
                    .set_ccp(occurrences as f64 / total as f64);
            }
        }
        self.ccps_stale = false;
        self.probabilities_stale = true;
        self.clear_score_caches();
    }

    /// Returns the marginal probability of the clade with `bits`, when
    /// observed.
    #[must_use]
    pub fn clade_probability(&mut self, bits: &TaxonBits) -> Option<f64> {
        self.ensure_probabilities();
        let id = self.find_clade(bits)?;
        self.clades[id.0].probability()
    }

    /// Returns the mean occurred height of the clade with `bits`.
    #[must_use]
    pub fn clade_mean_height(&self, bits: &TaxonBits) -> Option<f64> {
        let id = self.find_clade(bits)?;
        Some(self.clades[id.0].mean_height())
    }

    fn ensure_clade(&mut self, bits: TaxonBits) -> CladeId {
        if let Some(&id) = self.lookup.get(&bits) {
            return id;
        }
        let id = CladeId(self.clades.len());
        self.clades.push(Clade::new(bits.clone()));
        self.lookup.insert(bits, id);
        id
    }

    fn mark_stale(&mut self) {
        self.ccps_stale = true;
        self.probabilities_stale = true;
        self.clear_score_caches();
    }

    fn clear_score_caches(&mut self) {
        self.entropy_cache = None;
        self.entropy_lewis_cache = None;
        self.max_log_cache = None;
        self.topology_count_cache = None;
    }

    pub(crate) fn ensure_ccps(&mut self) {
        if self.ccps_stale {
            self.initialise();
        }
    }

    /// Propagates marginal clade probabilities from the root.
    ///
    /// Breadth-first with parent gating: a clade is expanded only once every
    /// parent has contributed, so each clade's probability is final when its
    /// own partitions distribute it downwards.
    pub(crate) fn ensure_probabilities(&mut self) {
        self.ensure_ccps();
        if !self.probabilities_stale {
            return;
        }

        for clade in &mut self.clades {
            clade.set_probability(None);
        }
        self.clades[self.root.0].set_probability(Some(1.0));

        let mut visits = vec![0_usize; self.clades.len()];
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            let probability = self.clades[id.0].probability().unwrap_or(0.0);
            let contributions: Vec<(CladeId, f64)> = self.clades[id.0]
                .partitions()
                .iter()
                .flat_map(|partition| {
                    let share = probability * partition.ccp();
                    partition.children().map(|child| (child, share))
                })
                .collect();

            for (child, share) in contributions {
                self.clades[child.0].add_probability(share);
                visits[child.0] += 1;
                if visits[child.0] == self.clades[child.0].parents().len() {
                    self.clip_probability(child);
                    queue.push_back(child);
                }
            }
        }
        self.probabilities_stale = false;
    }

    fn clip_probability(&mut self, id: CladeId) {
        if let Some(probability) = self.clades[id.0].probability() {
            if probability > 1.0 && probability <= 1.0 + PROBABILITY_SLACK {
                self.clades[id.0].set_probability(Some(1.0));
            }
        }
    }

    pub(crate) fn entropy_cache(&self) -> Option<f64> {
        self.entropy_cache
    }

    pub(crate) fn set_entropy_cache(&mut self, value: f64) {
        self.entropy_cache = Some(value);
    }

    pub(crate) fn entropy_lewis_cache(&self) -> Option<f64> {
        self.entropy_lewis_cache
    }

    pub(crate) fn set_entropy_lewis_cache(&mut self, value: f64) {
        self.entropy_lewis_cache = Some(value);
    }

    pub(crate) fn max_log_cache(&self) -> Option<f64> {
        self.max_log_cache
    }

    pub(crate) fn set_max_log_cache(&mut self, value: f64) {
        self.max_log_cache = Some(value);
    }

    pub(crate) fn topology_count_cache(&self) -> Option<f64> {
        self.topology_count_cache
    }

    pub(crate) fn set_topology_count_cache(&mut self, value: f64) {
        self.topology_count_cache = Some(value);
    }

    pub(crate) fn clades(&self) -> &[Clade] {
        &self.clades
    }
}

/// Drops the first `⌊n · fraction⌋` trees.
pub(crate) fn discard_burnin(trees: &[Tree], fraction: f64) -> Vec<&Tree> {
    let drop = burnin_count(trees.len(), fraction);
    trees.iter().skip(drop).collect()
}

pub(crate) fn burnin_count(total: usize, fraction: f64) -> usize {
    if fraction <= 0.0 {
        return 0;
    }
    ((total as f64) * fraction).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tree::TreeBuilder;

    pub(crate) fn cherry(first: &str, second: &str, third: &str) -> Tree {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf(first);
        let b = builder.leaf(second);
        let ab = builder.join(a, b);
        let c = builder.leaf(third);
        let root = builder.join(ab, c);
        let mut tree = builder.finish(root);
        tree.assign_heights_from_branch_lengths();
        tree
    }

    fn ccd_over(trees: &[Tree]) -> Ccd {
        Ccd::build(trees, 0.0).expect("test trees are well-formed")
    }

    #[test]
    fn root_clade_exists_eagerly() {
        let taxa = TaxonIndex::from_trees([&cherry("A", "B", "C")]);
        let ccd = Ccd::new(taxa);
        assert_eq!(ccd.clade_count(), 1);
        assert!(ccd.clade(ccd.root()).bits().is_full());
        assert_eq!(ccd.tree_count(), 0);
    }

    #[test]
    fn single_tree_produces_one_partition_per_internal_node() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C")]);
        // Clades: root, {A,B}, {A}, {B}, {C}.
        assert_eq!(ccd.clade_count(), 5);
        assert_eq!(ccd.partition_count(), 2);
        ccd.initialise();
        let root = ccd.clade(ccd.root());
        assert_eq!(root.partitions().len(), 1);
        assert_eq!(root.partitions()[0].ccp(), 1.0);
    }

    #[test]
    fn rival_topologies_split_the_root_partition() {
        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
        ]);
        ccd.initialise();
        let root = ccd.clade(ccd.root());
        assert_eq!(root.partitions().len(), 2);
        let mut ccps: Vec<f64> = root.partitions().iter().map(CladePartition::ccp).collect();
        ccps.sort_by(f64::total_cmp);
        assert!((ccps[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((ccps[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ccp_sums_to_one_per_clade() {
        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
            cherry("B", "C", "A"),
        ]);
        ccd.initialise();
        for clade in ccd.clades() {
            if clade.partitions().is_empty() {
                continue;
            }
            let sum: f64 = clade.partitions().iter().map(CladePartition::ccp).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn leaf_probabilities_reach_one_when_present_in_every_tree() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C"), cherry("A", "C", "B")]);
        let taxa_len = ccd.leaf_count();
        for position in 0..taxa_len {
            let bits = TaxonBits::singleton(taxa_len, position);
            let probability = ccd.clade_probability(&bits).expect("leaf clade exists");
            assert!((probability - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn marginal_probability_of_contested_clade() {
        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
        ]);
        let taxa_len = ccd.leaf_count();
        // {A, B} appears in two of three trees.
        let mut ab = TaxonBits::singleton(taxa_len, 0);
        ab.set(1);
        let probability = ccd.clade_probability(&ab).expect("clade {A,B} observed");
        assert!((probability - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn late_taxon_is_rejected() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C")]);
        let stray = cherry("A", "B", "D");
        let err = ccd.add_tree(&stray, 9).expect_err("D is not indexed");
        assert_eq!(err.code(), crate::ArboraErrorCode::TaxonUnknown);
    }

    #[test]
    fn polytomies_are_rejected() {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf("A");
        let b = builder.leaf("B");
        let c = builder.leaf("C");
        let root = builder.join_children(vec![a, b, c]);
        let tree = builder.finish(root);
        let err = Ccd::build(std::slice::from_ref(&tree), 0.0).expect_err("polytomy");
        assert_eq!(err.code(), crate::ArboraErrorCode::MalformedTree);
    }

    #[test]
    fn burnin_discards_prefix() {
        let trees: Vec<Tree> = (0..10).map(|_| cherry("A", "B", "C")).collect();
        assert_eq!(burnin_count(trees.len(), 0.0), 0);
        assert_eq!(burnin_count(trees.len(), 0.25), 2);
        let ccd = Ccd::build(&trees, 0.25).expect("well-formed");
        assert_eq!(ccd.tree_count(), 8);
    }

    #[test]
    fn build_reports_ingestion_and_honours_cancellation() {
        use std::ops::ControlFlow;

        let trees: Vec<Tree> = (0..4).map(|_| cherry("A", "B", "C")).collect();

        let mut seen = Vec::new();
        let mut callback = |event: Progress| {
            seen.push(event);
            ControlFlow::<()>::Continue(())
        };
        let ccd = Ccd::build_with_progress(&trees, 0.0, Some(&mut callback))
            .expect("continue never cancels");
        assert_eq!(ccd.tree_count(), 4);
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.last(), Some(&Progress::TreesIngested { done: 4, total: 4 }));

        let mut cancel = |_: Progress| ControlFlow::Break(());
        let err = Ccd::build_with_progress(&trees, 0.0, Some(&mut cancel))
            .expect_err("break cancels construction");
        assert_eq!(err.code(), crate::ArboraErrorCode::Cancelled);
    }

    #[test]
    fn mean_heights_average_over_occurrences() {
        let mut tall = cherry("A", "B", "C");
        let mut taller = cherry("A", "B", "C");
        tall.assign_heights_from_branch_lengths();
        taller.assign_heights_from_branch_lengths();
        let ccd = ccd_over(&[tall, taller]);
        let taxa_len = ccd.leaf_count();
        let mut ab = TaxonBits::singleton(taxa_len, 0);
        ab.set(1);
        // Unit branch lengths put the cherry at height 1 in both trees.
        assert_eq!(ccd.clade_mean_height(&ab), Some(1.0));
    }
}
