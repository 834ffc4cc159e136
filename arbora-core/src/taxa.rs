//! Stable taxon indexing.
//!
//! A [`TaxonIndex`] is the bijection between leaf labels and bit positions.
//! Labels are sorted lexicographically before positions are assigned so the
//! bit position of a taxon is reproducible across runs; the index is frozen
//! for the lifetime of a CCD or dissonance session.

use std::collections::HashMap;

use crate::bitset::TaxonBits;
use crate::error::{ArboraError, Result};
use crate::tree::Tree;

/// Frozen bijection between leaf labels and `[0, len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl TaxonIndex {
    /// Builds an index from the union of tip labels across `trees`.
    #[must_use]
    pub fn from_trees<'a>(trees: impl IntoIterator<Item = &'a Tree>) -> Self {
        let mut labels: Vec<String> = trees
            .into_iter()
            .flat_map(|tree| tree.tip_labels())
            .collect();
        labels.sort_unstable();
        labels.dedup();
        Self::from_sorted_labels(labels)
    }

    fn from_sorted_labels(labels: Vec<String>) -> Self {
        let positions = labels
            .iter()
            .enumerate()
            .map(|(position, label)| (label.clone(), position))
            .collect();
        Self { labels, positions }
    }

    /// Returns the number of taxa.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the index holds no taxa.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the bit position of `label`, if indexed.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    /// Returns the label at `position`.
    ///
    /// # Panics
    /// Panics if `position >= len`.
    #[must_use]
    pub fn label(&self, position: usize) -> &str {
        &self.labels[position]
    }

    /// Returns all labels in bit-position order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the singleton bitset for `label`.
    ///
    /// # Errors
    /// Returns [`ArboraError::TaxonUnknown`] when `label` is not indexed;
    /// `tree_index` names the tree that carried the late label.
    pub fn leaf_bits(&self, label: &str, tree_index: usize) -> Result<TaxonBits> {
        let position = self
            .position(label)
            .ok_or_else(|| ArboraError::TaxonUnknown {
                label: label.to_owned(),
                tree_index,
            })?;
        Ok(TaxonBits::singleton(self.len(), position))
    }

    /// Renders the set bits of `bits` as their labels, ascending.
    #[must_use]
    pub fn describe(&self, bits: &TaxonBits) -> Vec<String> {
        bits.ones().map(|bit| self.labels[bit].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tree::TreeBuilder;

    fn tree(labels: &[&str]) -> Tree {
        let mut builder = TreeBuilder::new();
        let mut acc = builder.leaf(labels[0]);
        for label in &labels[1..] {
            let next = builder.leaf(*label);
            acc = builder.join(acc, next);
        }
        builder.finish(acc)
    }

    #[test]
    fn positions_are_lexicographic() {
        let first = tree(&["whale", "cat"]);
        let second = tree(&["ant", "cat"]);
        let index = TaxonIndex::from_trees([&first, &second]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.position("ant"), Some(0));
        assert_eq!(index.position("cat"), Some(1));
        assert_eq!(index.position("whale"), Some(2));
        assert_eq!(index.label(0), "ant");
    }

    #[test]
    fn unknown_label_is_reported() {
        let index = TaxonIndex::from_trees([&tree(&["A", "B"])]);
        let err = index.leaf_bits("Z", 4).expect_err("Z is not indexed");
        assert_eq!(
            err,
            ArboraError::TaxonUnknown {
                label: "Z".into(),
                tree_index: 4
            }
        );
    }

    #[test]
    fn describe_round_trips_labels() {
        let index = TaxonIndex::from_trees([&tree(&["A", "B", "C"])]);
        let mut bits = TaxonBits::new(index.len());
        bits.set(0);
        bits.set(2);
        assert_eq!(index.describe(&bits), ["A", "C"]);
    }
}
