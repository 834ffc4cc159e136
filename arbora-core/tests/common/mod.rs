//! Shared tree fixtures for the integration suites.

use arbora_core::{NodeId, Tree, TreeBuilder};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Builds the three-taxon cherry `((first, second), third)` with unit
/// branch lengths and derived heights.
pub fn cherry(first: &str, second: &str, third: &str) -> Tree {
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

/// Builds a uniformly random binary topology over `labels`, with random
/// branch lengths, deterministic under `seed`.
pub fn random_binary_tree(labels: &[&str], seed: u64) -> Tree {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut builder = TreeBuilder::new();
    let mut roots: Vec<NodeId> = labels.iter().map(|label| builder.leaf(*label)).collect();
    for id in &roots {
        let length = rng.gen_range(0.1..2.0);
        builder.set_branch_length(*id, length);
    }
    while roots.len() > 1 {
        let first = roots.swap_remove(rng.gen_range(0..roots.len()));
        let second = roots.swap_remove(rng.gen_range(0..roots.len()));
        let joined = builder.join(first, second);
        let length = rng.gen_range(0.1..2.0);
        builder.set_branch_length(joined, length);
        roots.push(joined);
    }
    let mut tree = builder.finish(roots[0]);
    tree.assign_heights_from_branch_lengths();
    tree
}

/// Default taxon set for randomised suites.
pub const TAXA: [&str; 6] = ["ant", "bee", "cat", "dog", "emu", "fox"];
