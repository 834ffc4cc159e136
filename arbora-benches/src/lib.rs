//! Synthetic tree-sample generation for the benchmark suites.

use arbora_core::{NodeId, Tree, TreeBuilder};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Generates `count` random binary trees over `taxa` labelled `t0..tN`,
/// deterministic under `seed`.
#[must_use]
pub fn random_sample(taxa: usize, count: usize, seed: u64) -> Vec<Tree> {
    let labels: Vec<String> = (0..taxa).map(|index| format!("t{index}")).collect();
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| random_tree(&labels, &mut rng))
        .collect()
}

fn random_tree(labels: &[String], rng: &mut SmallRng) -> Tree {
    let mut builder = TreeBuilder::new();
    let mut roots: Vec<NodeId> = labels
        .iter()
        .map(|label| builder.leaf(label.as_str()))
        .collect();
    while roots.len() > 1 {
        let first = roots.swap_remove(rng.gen_range(0..roots.len()));
        let second = roots.swap_remove(rng.gen_range(0..roots.len()));
        let joined = builder.join(first, second);
        let length = rng.gen_range(0.01..1.0);
        builder.set_branch_length(joined, length);
        roots.push(joined);
    }
    let mut tree = builder.finish(roots[0]);
    tree.assign_heights_from_branch_lengths();
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_deterministic() {
        let first = random_sample(8, 4, 3);
        let second = random_sample(8, 4, 3);
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }
}
