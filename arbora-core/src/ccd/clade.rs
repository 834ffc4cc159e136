//! Vertices and hyperedges of the conditional clade DAG.
//!
//! A [`Clade`] is a deduplicated subset of the taxa; a [`CladePartition`] is
//! an unordered pair of child clades that reconstitutes its parent. Clades
//! are arena-allocated and refer to each other through [`CladeId`], which
//! keeps the many-to-many parent/child relation free of ownership cycles.

use std::collections::BTreeSet;

use crate::bitset::TaxonBits;

/// Identifier of a clade within its owning [`super::Ccd`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CladeId(pub(crate) usize);

impl CladeId {
    /// Returns the underlying arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// An observed split of a parent clade into two disjoint children.
///
/// The child order is the order of first observation; semantic comparison is
/// unordered. The conditional clade probability (CCP) is populated when the
/// owning CCD normalises its counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CladePartition {
    children: [CladeId; 2],
    occurrences: usize,
    sum_heights: f64,
    ccp: f64,
    log_ccp: f64,
}

impl CladePartition {
    pub(crate) fn new(children: [CladeId; 2]) -> Self {
        Self {
            children,
            occurrences: 0,
            sum_heights: 0.0,
            ccp: 0.0,
            log_ccp: f64::NEG_INFINITY,
        }
    }

    /// Returns the two child clades in observation order.
    #[must_use]
    pub fn children(&self) -> [CladeId; 2] {
        self.children
    }

    /// Returns whether this partition splits into exactly `{a, b}`.
    #[must_use]
    pub fn matches(&self, a: CladeId, b: CladeId) -> bool {
        let [left, right] = self.children;
        (left == a && right == b) || (left == b && right == a)
    }

    /// Number of input trees in which this split was observed.
    #[must_use]
    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    /// Conditional clade probability of this split.
    #[must_use]
    pub fn ccp(&self) -> f64 {
        self.ccp
    }

    /// Natural log of the CCP, or −∞ when the CCP is zero.
    #[must_use]
    pub fn log_ccp(&self) -> f64 {
        self.log_ccp
    }

    /// Mean vertex height over this split's occurrences.
    #[must_use]
    pub fn mean_height(&self) -> f64 {
        if self.occurrences == 0 {
            0.0
        } else {
            self.sum_heights / self.occurrences as f64
        }
    }

    pub(crate) fn record_occurrence(&mut self, height: f64) {
        self.occurrences += 1;
        self.sum_heights += height;
    }

    pub(crate) fn set_ccp(&mut self, ccp: f64) {
        self.ccp = ccp;
        self.log_ccp = if ccp > 0.0 { ccp.ln() } else { f64::NEG_INFINITY };
    }
}

/// A vertex of the conditional clade DAG.
#[derive(Debug, Clone, PartialEq)]
pub struct Clade {
    bits: TaxonBits,
    is_leaf: bool,
    occurrences: usize,
    sum_heights: f64,
    partitions: Vec<CladePartition>,
    parents: BTreeSet<CladeId>,
    probability: Option<f64>,
}

impl Clade {
    pub(crate) fn new(bits: TaxonBits) -> Self {
        let is_leaf = bits.cardinality() == 1;
        Self {
            bits,
            is_leaf,
            occurrences: 0,
            sum_heights: 0.0,
            partitions: Vec::new(),
            parents: BTreeSet::new(),
            probability: None,
        }
    }

    /// Returns the leaf-membership bitset.
    #[must_use]
    pub fn bits(&self) -> &TaxonBits {
        &self.bits
    }

    /// Returns whether this clade is a single taxon.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Number of input trees in which this clade was observed.
    #[must_use]
    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    /// Mean node height over this clade's occurrences.
    #[must_use]
    pub fn mean_height(&self) -> f64 {
        if self.occurrences == 0 {
            0.0
        } else {
            self.sum_heights / self.occurrences as f64
        }
    }

    /// Returns the observed splits of this clade.
    #[must_use]
    pub fn partitions(&self) -> &[CladePartition] {
        &self.partitions
    }

    /// Returns the clades of which this clade is a child.
    #[must_use]
    pub fn parents(&self) -> &BTreeSet<CladeId> {
        &self.parents
    }

    /// Returns the distinct children across all of this clade's partitions.
    #[must_use]
    pub fn child_clades(&self) -> BTreeSet<CladeId> {
        self.partitions
            .iter()
            .flat_map(|partition| partition.children())
            .collect()
    }

    /// Cached marginal probability, when propagation has run.
    #[must_use]
    pub fn probability(&self) -> Option<f64> {
        self.probability
    }

    pub(crate) fn record_occurrence(&mut self, height: f64) {
        self.occurrences += 1;
        self.sum_heights += height;
    }

    pub(crate) fn record_parent(&mut self, parent: CladeId) {
        self.parents.insert(parent);
    }

    pub(crate) fn partition_mut(&mut self, index: usize) -> &mut CladePartition {
        &mut self.partitions[index]
    }

    /// Finds or inserts the partition splitting into `{a, b}`; returns its
    /// index within this clade.
    pub(crate) fn ensure_partition(&mut self, a: CladeId, b: CladeId) -> usize {
        if let Some(index) = self
            .partitions
            .iter()
            .position(|partition| partition.matches(a, b))
        {
            return index;
        }
        self.partitions.push(CladePartition::new([a, b]));
        self.partitions.len() - 1
    }

    pub(crate) fn set_probability(&mut self, probability: Option<f64>) {
        self.probability = probability;
    }

    pub(crate) fn add_probability(&mut self, contribution: f64) {
        self.probability = Some(self.probability.unwrap_or(0.0) + contribution);
    }
}
