//! Robinson–Foulds bipartition distance and the SPR approximation.
//!
//! Each internal non-root edge of a rooted tree induces a split of that
//! tree's taxa into the descendant leaves and their complement. Splits
//! compare under unordered-pair equality, so both sides are sorted and the
//! pair is ordered canonically before it enters the set. Trivial splits
//! (either side empty) are discarded. RF is the size of the symmetric
//! difference between the two split sets.

use std::collections::{BTreeSet, HashSet};

use crate::tree::Tree;

/// A canonical split: both sides comma-joined, smaller side first.
pub(crate) type Split = (String, String);

fn canonical_split(side: &BTreeSet<String>, complement: &BTreeSet<String>) -> Split {
    let left = side.iter().cloned().collect::<Vec<_>>().join(",");
    let right = complement.iter().cloned().collect::<Vec<_>>().join(",");
    if left <= right {
        (left, right)
    } else {
        (right, left)
    }
}

/// Collects the non-trivial bipartitions of `tree`.
pub(crate) fn bipartitions(tree: &Tree) -> HashSet<Split> {
    let taxa: BTreeSet<String> = tree.tip_labels().into_iter().collect();
    let mut below: Vec<BTreeSet<String>> = vec![BTreeSet::new(); tree.len()];

    for id in tree.post_order() {
        let node = tree.node(id);
        if node.is_leaf() {
            let label = match node.label() {
                Some(label) => label.to_owned(),
                None => id.index().to_string(),
            };
            below[id.index()].insert(label);
        } else {
            let mut merged = BTreeSet::new();
            for &child in node.children() {
                merged.extend(below[child.index()].iter().cloned());
            }
            below[id.index()] = merged;
        }
    }

    let mut splits = HashSet::new();
    for id in tree.post_order() {
        if id == tree.root() || tree.node(id).is_leaf() {
            continue;
        }
        let side = &below[id.index()];
        let complement: BTreeSet<String> = taxa.difference(side).cloned().collect();
        if side.is_empty() || complement.is_empty() {
            continue;
        }
        splits.insert(canonical_split(side, &complement));
    }
    splits
}

/// Symmetric-difference size between two prepared split sets.
pub(crate) fn rf_from_splits(left: &HashSet<Split>, right: &HashSet<Split>) -> usize {
    let shared = left.intersection(right).count();
    (left.len() - shared) + (right.len() - shared)
}

/// Robinson–Foulds distance between two rooted trees.
#[must_use]
pub fn rf_distance(left: &Tree, right: &Tree) -> usize {
    rf_from_splits(&bipartitions(left), &bipartitions(right))
}

/// Approximate SPR distance, defined as ⌈RF/2⌉.
///
/// This is a known lower bound on the true SPR distance and is the
/// contractual definition; it is never upgraded to an exact computation.
#[must_use]
pub fn spr_distance(left: &Tree, right: &Tree) -> usize {
    rf_distance(left, right).div_ceil(2)
}
