//! Derived quantities of a conditional clade distribution.
//!
//! All scores traverse the clade DAG rather than the input trees. Clades
//! sorted by ascending bitset cardinality form a topological order (children
//! are strictly smaller than parents), which lets the recursive definitions
//! run as single passes with memo vectors. Long passes yield to the progress
//! callback every [`CLADE_PROGRESS_STRIDE`] clades.

use tracing::warn;

use super::clade::CladeId;
use super::Ccd;
use crate::bitset::TaxonBits;
use crate::error::Result;
use crate::progress::{Progress, ProgressFn, Reporter, CLADE_PROGRESS_STRIDE};
use crate::tree::{Tree, TreeBuilder};

/// A high-probability clade reported by [`Ccd::top_clades`].
#[derive(Debug, Clone, PartialEq)]
pub struct CladeSummary {
    /// Member taxa, ascending by label.
    pub taxa: Vec<String>,
    /// Number of member taxa.
    pub size: usize,
    /// Marginal probability of the clade.
    pub probability: f64,
    /// Mean node height over the clade's occurrences.
    pub mean_height: f64,
    /// Number of base trees containing the clade.
    pub occurrences: usize,
}

impl Ccd {
    /// Phylogenetic entropy in its forward form:
    /// `H = −Σ parent.probability · ccp · ln ccp` over all partitions.
    #[must_use]
    pub fn entropy(&mut self) -> f64 {
        match self.entropy_with_progress(None) {
            Ok(value) => value,
            Err(_) => unreachable!("no callback, no cancellation"),
        }
    }

    /// As [`Ccd::entropy`], yielding to `progress` every 100 clades.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::Cancelled`] when the callback breaks.
    pub fn entropy_with_progress(
        &mut self,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<f64> {
        if let Some(value) = self.entropy_cache() {
            return Ok(value);
        }
        self.ensure_probabilities();
        let mut reporter = Reporter::new(progress, "entropy");

        let total = self.clades().len();
        let mut entropy = 0.0;
        for (done, clade) in self.clades().iter().enumerate() {
            let parent_probability = clade.probability().unwrap_or(0.0);
            for partition in clade.partitions() {
                if partition.ccp() > 0.0 {
                    entropy -= parent_probability * partition.ccp() * partition.log_ccp();
                }
            }
            if (done + 1) % CLADE_PROGRESS_STRIDE == 0 {
                reporter.emit(Progress::CladesScored {
                    done: done + 1,
                    total,
                })?;
            }
        }
        self.set_entropy_cache(entropy);
        Ok(entropy)
    }

    /// Phylogenetic entropy in Lewis's recursive form:
    /// `H(leaf) = 0`, `H(C) = Σ ccp · (H(child₁) + H(child₂) − ln ccp)`.
    ///
    /// Equal to the forward form when the DAG is a tree; the two diverge when
    /// clades have multiple parents, so both are exposed.
    #[must_use]
    pub fn entropy_lewis(&mut self) -> f64 {
        match self.entropy_lewis_with_progress(None) {
            Ok(value) => value,
            Err(_) => unreachable!("no callback, no cancellation"),
        }
    }

    /// As [`Ccd::entropy_lewis`], yielding to `progress` every 100 clades.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::Cancelled`] when the callback breaks.
    pub fn entropy_lewis_with_progress(
        &mut self,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<f64> {
        if let Some(value) = self.entropy_lewis_cache() {
            return Ok(value);
        }
        self.ensure_ccps();
        let mut reporter = Reporter::new(progress, "lewis entropy");

        let order = self.clades_by_cardinality();
        let total = order.len();
        let mut memo = vec![0.0_f64; total];
        for (done, id) in order.into_iter().enumerate() {
            let clade = &self.clades()[id.0];
            if !clade.is_leaf() {
                let mut entropy = 0.0;
                for partition in clade.partitions() {
                    if partition.ccp() <= 0.0 {
                        continue;
                    }
                    let [left, right] = partition.children();
                    entropy += partition.ccp()
                        * (memo[left.0] + memo[right.0] - partition.log_ccp());
                }
                memo[id.0] = entropy;
            }
            if (done + 1) % CLADE_PROGRESS_STRIDE == 0 {
                reporter.emit(Progress::CladesScored {
                    done: done + 1,
                    total,
                })?;
            }
        }
        let value = memo[self.root().0];
        self.set_entropy_lewis_cache(value);
        Ok(value)
    }

    /// Log of the probability of the most probable tree topology.
    #[must_use]
    pub fn max_log_tree_probability(&mut self) -> f64 {
        match self.max_log_tree_probability_with_progress(None) {
            Ok(value) => value,
            Err(_) => unreachable!("no callback, no cancellation"),
        }
    }

    /// As [`Ccd::max_log_tree_probability`], yielding every 100 clades.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::Cancelled`] when the callback breaks.
    pub fn max_log_tree_probability_with_progress(
        &mut self,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<f64> {
        if let Some(value) = self.max_log_cache() {
            return Ok(value);
        }
        let (scores, _) = self.max_subtree_scores(progress)?;
        let value = scores[self.root().0];
        self.set_max_log_cache(value);
        Ok(value)
    }

    /// Probability of the most probable tree topology.
    #[must_use]
    pub fn max_tree_probability(&mut self) -> f64 {
        self.max_log_tree_probability().exp()
    }

    /// Reconstructs the most probable tree topology, or `None` when the CCD
    /// holds no trees or the root is unreachable.
    #[must_use]
    pub fn max_probability_tree(&mut self) -> Option<Tree> {
        if self.tree_count() == 0 {
            return None;
        }
        let (scores, best) = match self.max_subtree_scores(None) {
            Ok(result) => result,
            Err(_) => unreachable!("no callback, no cancellation"),
        };
        if !scores[self.root().0].is_finite() {
            return None;
        }

        let mut builder = TreeBuilder::new();
        let root = self.expand_best(self.root(), &best, &mut builder);
        let mut tree = builder.finish(root);
        tree.assign_heights_from_branch_lengths();
        Some(tree)
    }

    fn expand_best(
        &self,
        id: CladeId,
        best: &[Option<usize>],
        builder: &mut TreeBuilder,
    ) -> crate::tree::NodeId {
        let clade = &self.clades()[id.0];
        if clade.is_leaf() {
            let position = clade
                .bits()
                .next_set_bit(0)
                .unwrap_or_default();
            return builder.leaf(self.taxa().label(position));
        }
        let partition_index = best[id.0].unwrap_or_default();
        let [left, right] = clade.partitions()[partition_index].children();
        let left_node = self.expand_best(left, best, builder);
        let right_node = self.expand_best(right, best, builder);
        builder.join(left_node, right_node)
    }

    /// Best achievable subtree log-CCP per clade, plus the argmax partition.
    fn max_subtree_scores(
        &mut self,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<(Vec<f64>, Vec<Option<usize>>)> {
        self.ensure_ccps();
        let mut reporter = Reporter::new(progress, "max tree probability");

        let order = self.clades_by_cardinality();
        let total = order.len();
        let mut scores = vec![f64::NEG_INFINITY; total];
        let mut best: Vec<Option<usize>> = vec![None; total];

        for (done, id) in order.into_iter().enumerate() {
            let clade = &self.clades()[id.0];
            if clade.is_leaf() {
                scores[id.0] = 0.0;
            } else {
                let mut best_score = f64::NEG_INFINITY;
                let mut best_index = None;
                for (index, partition) in clade.partitions().iter().enumerate() {
                    if partition.ccp() <= 0.0 {
                        continue;
                    }
                    let [left, right] = partition.children();
                    let score = partition.log_ccp() + scores[left.0] + scores[right.0];
                    if score > best_score {
                        best_score = score;
                        best_index = Some(index);
                    }
                }
                if best_index.is_none() && clade.occurrences() > 0 {
                    warn!(
                        clade = %clade.bits().key(),
                        "clade has no viable partition; treating as unreachable"
                    );
                }
                scores[id.0] = best_score;
                best[id.0] = best_index;
            }
            if (done + 1) % CLADE_PROGRESS_STRIDE == 0 {
                reporter.emit(Progress::CladesScored {
                    done: done + 1,
                    total,
                })?;
            }
        }
        Ok((scores, best))
    }

    /// Number of distinct rooted binary topologies this CCD can express:
    /// 1 per leaf, and per clade the sum over partitions of the product of
    /// the children's counts. Returned as `f64`, so very large DAGs
    /// saturate to infinity rather than overflow.
    #[must_use]
    pub fn topology_count(&mut self) -> f64 {
        if let Some(value) = self.topology_count_cache() {
            return value;
        }
        let order = self.clades_by_cardinality();
        let mut counts = vec![0.0_f64; order.len()];
        for id in order {
            let clade = &self.clades()[id.0];
            counts[id.0] = if clade.is_leaf() {
                1.0
            } else {
                clade
                    .partitions()
                    .iter()
                    .map(|partition| {
                        let [left, right] = partition.children();
                        counts[left.0] * counts[right.0]
                    })
                    .sum()
            };
        }
        let value = counts[self.root().0];
        self.set_topology_count_cache(value);
        value
    }

    /// Log-probability of `tree` under this CCD; −∞ when the tree contains
    /// a clade or split this CCD never observed.
    ///
    /// # Errors
    /// Returns [`crate::ArboraError::MalformedTree`] for non-binary input.
    pub fn tree_log_probability(&mut self, tree: &Tree) -> Result<f64> {
        tree.validate_binary(0)?;
        self.ensure_ccps();

        let mut node_clades: Vec<Option<CladeId>> = vec![None; tree.len()];
        let mut node_bits: Vec<Option<TaxonBits>> = vec![None; tree.len()];
        let mut log_probability = 0.0;

        for id in tree.post_order() {
            let node = tree.node(id);
            let bits = if node.is_leaf() {
                let label = match node.label() {
                    Some(label) => label.to_owned(),
                    None => id.index().to_string(),
                };
                match self.taxa().position(&label) {
                    Some(position) => TaxonBits::singleton(self.leaf_count(), position),
                    // A foreign taxon means the leaf clade does not exist.
                    None => return Ok(f64::NEG_INFINITY),
                }
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

            let Some(clade_id) = self.find_clade(&bits) else {
                return Ok(f64::NEG_INFINITY);
            };

            if !node.is_leaf() {
                let children = node.children();
                let (left, right) = match (
                    node_clades[children[0].index()],
                    node_clades[children[1].index()],
                ) {
                    (Some(left), Some(right)) => (left, right),
                    _ => unreachable!("post-order visits children first"),
                };
                let clade = &self.clades()[clade_id.0];
                let Some(partition) = clade
                    .partitions()
                    .iter()
                    .find(|partition| partition.matches(left, right))
                else {
                    return Ok(f64::NEG_INFINITY);
                };
                if partition.ccp() <= 0.0 {
                    return Ok(f64::NEG_INFINITY);
                }
                log_probability += partition.log_ccp();
            }

            node_bits[id.index()] = Some(bits);
            node_clades[id.index()] = Some(clade_id);
        }
        Ok(log_probability)
    }

    /// The `limit` highest-probability clades, leaves and root excluded.
    #[must_use]
    pub fn top_clades(&mut self, limit: usize) -> Vec<CladeSummary> {
        self.ensure_probabilities();
        let root = self.root();

        let mut candidates: Vec<(CladeId, f64)> = self
            .clades()
            .iter()
            .enumerate()
            .filter(|(index, clade)| {
                CladeId(*index) != root && !clade.is_leaf() && clade.occurrences() > 0
            })
            .map(|(index, clade)| (CladeId(index), clade.probability().unwrap_or(0.0)))
            .collect();
        candidates.sort_by(|(a_id, a_p), (b_id, b_p)| {
            b_p.total_cmp(a_p)
                .then_with(|| self.clades()[a_id.0].bits().cmp(self.clades()[b_id.0].bits()))
        });

        candidates
            .into_iter()
            .take(limit)
            .map(|(id, probability)| {
                let clade = &self.clades()[id.0];
                CladeSummary {
                    taxa: self.taxa().describe(clade.bits()),
                    size: clade.bits().cardinality(),
                    probability,
                    mean_height: clade.mean_height(),
                    occurrences: clade.occurrences(),
                }
            })
            .collect()
    }

    /// Clade ids ordered by ascending cardinality: a topological order of
    /// the DAG with children before parents.
    fn clades_by_cardinality(&self) -> Vec<CladeId> {
        let mut order: Vec<(usize, CladeId)> = self
            .clades()
            .iter()
            .enumerate()
            .map(|(index, clade)| (clade.bits().cardinality(), CladeId(index)))
            .collect();
        order.sort_unstable_by_key(|&(cardinality, id)| (cardinality, id));
        order.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ccd::tests::cherry;

    fn ccd_over(trees: &[Tree]) -> Ccd {
        let mut ccd = Ccd::build(trees, 0.0).expect("test trees are well-formed");
        ccd.initialise();
        ccd
    }

    #[test]
    fn single_tree_has_zero_entropy_and_certain_max_tree() {
        let tree = cherry("A", "B", "C");
        let mut ccd = ccd_over(std::slice::from_ref(&tree));
        assert!(ccd.entropy().abs() < 1e-12);
        assert!(ccd.entropy_lewis().abs() < 1e-12);
        assert_eq!(ccd.max_log_tree_probability(), 0.0);
        assert_eq!(ccd.max_tree_probability(), 1.0);
        assert_eq!(ccd.tree_log_probability(&tree).expect("binary"), 0.0);
    }

    #[test]
    fn three_rival_topologies_reach_ln_three() {
        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
            cherry("B", "C", "A"),
        ]);
        let expected = 3.0_f64.ln();
        assert!((ccd.entropy() - expected).abs() < 1e-9);
        assert!((ccd.entropy_lewis() - expected).abs() < 1e-9);
    }

    #[test]
    fn majority_topology_dominates() {
        let favourite = cherry("A", "B", "C");
        let rival = cherry("A", "C", "B");
        let mut ccd = ccd_over(&[favourite.clone(), favourite.clone(), rival.clone()]);

        assert!((ccd.max_tree_probability() - 2.0 / 3.0).abs() < 1e-12);
        let log_favourite = ccd.tree_log_probability(&favourite).expect("binary");
        assert!((log_favourite - (2.0_f64 / 3.0).ln()).abs() < 1e-12);
        let log_rival = ccd.tree_log_probability(&rival).expect("binary");
        assert!((log_rival - (1.0_f64 / 3.0).ln()).abs() < 1e-12);

        let best = ccd.max_probability_tree().expect("trees were ingested");
        assert_eq!(
            ccd.tree_log_probability(&best).expect("binary"),
            ccd.max_log_tree_probability()
        );
    }

    #[test]
    fn unseen_topology_has_zero_probability() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C")]);
        let unseen = cherry("A", "C", "B");
        let log = ccd.tree_log_probability(&unseen).expect("binary");
        assert_eq!(log, f64::NEG_INFINITY);

        let foreign = cherry("A", "B", "Z");
        let log = ccd.tree_log_probability(&foreign).expect("binary");
        assert_eq!(log, f64::NEG_INFINITY);
    }

    #[test]
    fn top_clades_exclude_root_and_leaves() {
        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
        ]);
        let top = ccd.top_clades(10);
        // Candidates are the cherries {A,B} and {A,C}.
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].taxa, ["A", "B"]);
        assert!((top[0].probability - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(top[0].occurrences, 2);
        assert_eq!(top[1].taxa, ["A", "C"]);
    }

    #[test]
    fn topology_counts_grow_with_disagreement() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C")]);
        assert_eq!(ccd.topology_count(), 1.0);

        let mut ccd = ccd_over(&[
            cherry("A", "B", "C"),
            cherry("A", "C", "B"),
            cherry("B", "C", "A"),
        ]);
        assert_eq!(ccd.topology_count(), 3.0);
    }

    #[test]
    fn entropy_is_cached_until_mutation() {
        let mut ccd = ccd_over(&[cherry("A", "B", "C"), cherry("A", "C", "B")]);
        let before = ccd.entropy();
        assert_eq!(ccd.entropy(), before);

        ccd.add_tree(&cherry("B", "C", "A"), 2).expect("binary");
        let after = ccd.entropy();
        assert!(after > before);
    }
}
