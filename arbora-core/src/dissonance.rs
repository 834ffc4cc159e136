//! Within-chain dissonance, a mixing diagnostic.
//!
//! A tree sample that mixes well should look the same in every slice: the
//! entropy of a pooled CCD should match the mean entropy of per-slice CCDs.
//! Dissonance is the gap `H_pool − mean(H_j)`, non-negative by concavity,
//! and near zero for well-mixed chains. The diagnostic is incremental: one
//! tree per chain per step, re-normalising each CCD in lockstep so the whole
//! trajectory of the gap is recorded, not just its endpoint.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::ccd::Ccd;
use crate::error::{ArboraError, Result};
use crate::progress::{Progress, ProgressFn, Reporter};
use crate::sampling::sample_indices;
use crate::taxa::TaxonIndex;
use crate::tree::Tree;

/// Chains with average final entropy above this take the probability
/// comparison detour when exactly two chains are compared.
const COMPARISON_ENTROPY_GATE: f64 = 10.0;

/// Upper bound on trees subsampled per half for the probability comparison.
const COMPARISON_SAMPLE_CAP: usize = 1000;

/// Aggregate statistics over the per-step dissonance trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DissonanceSummary {
    /// Dissonance at the final step.
    pub final_dissonance: f64,
    /// Mean over all steps.
    pub mean: f64,
    /// Minimum over all steps.
    pub min: f64,
    /// Maximum over all steps.
    pub max: f64,
}

/// Head-to-head CCD probability comparison between two halves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityComparison {
    /// Trees sampled from each half.
    pub sampled_per_half: usize,
    /// Sampled trees the first half's CCD scored strictly higher.
    pub first_higher: usize,
    /// Sampled trees the second half's CCD scored strictly higher.
    pub second_higher: usize,
    /// Sampled trees with exactly one side at −∞.
    pub in_one_only: usize,
    /// RMS of `logP₁ − logP₂` where both are finite.
    pub rms_log_difference: f64,
    /// RMS of `|p₁ − p₂| / ((p₁ + p₂)/2)` where both are finite.
    pub rms_relative_difference: f64,
}

/// Output of a dissonance run.
#[derive(Debug, Clone, PartialEq)]
pub struct DissonanceResult {
    /// Per-chain entropy trajectories, indexed `[chain][step]`.
    pub chain_entropies: Vec<Vec<f64>>,
    /// Pooled entropy per step.
    pub pooled_entropies: Vec<f64>,
    /// Dissonance per step.
    pub dissonance: Vec<f64>,
    /// Aggregates over the trajectory.
    pub summary: DissonanceSummary,
    /// Final dissonance over average final chain entropy; 0 when the
    /// denominator is 0.
    pub relative_dissonance: f64,
    /// Human-readable bucket for the relative dissonance.
    pub interpretation: &'static str,
    /// Optional two-chain probability comparison.
    pub probability_comparison: Option<ProbabilityComparison>,
}

/// Buckets a relative dissonance into a mixing verdict.
#[must_use]
pub fn interpret_relative_dissonance(relative: f64) -> &'static str {
    if relative < 0.001 {
        "Exceptional mixing"
    } else if relative < 0.01 {
        "Excellent mixing"
    } else if relative < 0.02 {
        "Very good mixing"
    } else if relative < 0.05 {
        "Good mixing"
    } else if relative < 0.10 {
        "Moderate mixing"
    } else if relative < 0.20 {
        "Poor mixing"
    } else {
        "Very poor mixing"
    }
}

/// Splits one chain into `splits` contiguous blocks and runs the
/// dissonance diagnostic; the last block absorbs the remainder.
///
/// # Errors
/// Returns [`ArboraError::InvalidConfiguration`] when `splits < 2` and
/// [`ArboraError::InsufficientTrees`] when fewer than `2 · splits` trees
/// are supplied; [`ArboraError::Cancelled`] when the callback breaks.
pub fn within_chain_dissonance(
    trees: &[Tree],
    splits: usize,
    seed: u64,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<DissonanceResult> {
    if splits < 2 {
        return Err(ArboraError::InvalidConfiguration {
            parameter: "splits",
            requirement: "at least 2",
            got: splits.to_string(),
        });
    }
    if trees.len() < 2 * splits {
        return Err(ArboraError::InsufficientTrees {
            operation: "within-chain dissonance",
            needed: 2 * splits,
            got: trees.len(),
        });
    }

    let block = trees.len() / splits;
    let mut sets: Vec<&[Tree]> = Vec::with_capacity(splits);
    for chain in 0..splits {
        let start = chain * block;
        let end = if chain + 1 == splits {
            trees.len()
        } else {
            start + block
        };
        sets.push(&trees[start..end]);
    }
    dissonance_over_sets(&sets, seed, progress)
}

/// Runs the dissonance diagnostic over `sets.len()` pre-split tree sets.
///
/// The step count is the shortest set's length; longer sets truncate. All
/// CCDs share one taxon index built from the union of every set's leaves.
///
/// # Errors
/// Returns [`ArboraError::InvalidConfiguration`] when fewer than two sets
/// are supplied, [`ArboraError::MalformedTree`] for non-binary input, and
/// [`ArboraError::Cancelled`] when the callback breaks.
pub fn dissonance_over_sets(
    sets: &[&[Tree]],
    seed: u64,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<DissonanceResult> {
    if sets.len() < 2 {
        return Err(ArboraError::InvalidConfiguration {
            parameter: "tree sets",
            requirement: "at least 2",
            got: sets.len().to_string(),
        });
    }
    let chains = sets.len();
    let steps = sets.iter().map(|set| set.len()).min().unwrap_or(0);

    let taxa = TaxonIndex::from_trees(sets.iter().flat_map(|set| set.iter()));
    let mut chain_ccds: Vec<Ccd> = (0..chains).map(|_| Ccd::new(taxa.clone())).collect();
    let mut pooled = Ccd::new(taxa);
    let mut reporter = Reporter::new(progress, "dissonance");

    let mut chain_entropies = vec![Vec::with_capacity(steps); chains];
    let mut pooled_entropies = Vec::with_capacity(steps);
    let mut dissonance = Vec::with_capacity(steps);

    for step in 0..steps {
        let mut entropy_sum = 0.0;
        for (chain, ccd) in chain_ccds.iter_mut().enumerate() {
            let tree = &sets[chain][step];
            ccd.add_tree(tree, step)?;
            ccd.initialise();
            let entropy = ccd.entropy();
            chain_entropies[chain].push(entropy);
            entropy_sum += entropy;

            pooled.add_tree(tree, step)?;
        }
        pooled.initialise();
        let pooled_entropy = pooled.entropy();
        pooled_entropies.push(pooled_entropy);
        dissonance.push(pooled_entropy - entropy_sum / chains as f64);

        reporter.emit(Progress::DissonanceStep {
            step: step + 1,
            total: steps,
        })?;
    }

    let summary = summarise(&dissonance);
    let final_chain_entropy = chain_entropies
        .iter()
        .filter_map(|trajectory| trajectory.last())
        .sum::<f64>()
        / chains as f64;
    let relative_dissonance = if final_chain_entropy == 0.0 {
        0.0
    } else {
        summary.final_dissonance / final_chain_entropy
    };

    let probability_comparison = if chains == 2 && final_chain_entropy > COMPARISON_ENTROPY_GATE {
        Some(compare_probabilities(
            &mut chain_ccds,
            sets[0],
            sets[1],
            steps,
            seed,
        )?)
    } else {
        None
    };

    Ok(DissonanceResult {
        chain_entropies,
        pooled_entropies,
        dissonance,
        summary,
        relative_dissonance,
        interpretation: interpret_relative_dissonance(relative_dissonance),
        probability_comparison,
    })
}

fn summarise(dissonance: &[f64]) -> DissonanceSummary {
    let final_dissonance = dissonance.last().copied().unwrap_or(0.0);
    if dissonance.is_empty() {
        return DissonanceSummary {
            final_dissonance,
            mean: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }
    let mean = dissonance.iter().sum::<f64>() / dissonance.len() as f64;
    let min = dissonance.iter().copied().fold(f64::INFINITY, f64::min);
    let max = dissonance.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    DissonanceSummary {
        final_dissonance,
        mean,
        min,
        max,
    }
}

fn compare_probabilities(
    chain_ccds: &mut [Ccd],
    first_half: &[Tree],
    second_half: &[Tree],
    steps: usize,
    seed: u64,
) -> Result<ProbabilityComparison> {
    let mut rng = SmallRng::seed_from_u64(seed);
    // Only the stepped prefix of each half entered the CCDs.
    let usable = steps;
    let sampled_per_half = usable.min(COMPARISON_SAMPLE_CAP);

    let mut first_higher = 0_usize;
    let mut second_higher = 0_usize;
    let mut in_one_only = 0_usize;
    let mut log_square_sum = 0.0;
    let mut relative_square_sum = 0.0;
    let mut finite_pairs = 0_usize;

    for half in [first_half, second_half] {
        for index in sample_indices(usable, COMPARISON_SAMPLE_CAP, &mut rng) {
            let tree = &half[index];
            let (left, right) = split_first_two(chain_ccds);
            let log_first = left.tree_log_probability(tree)?;
            let log_second = right.tree_log_probability(tree)?;

            match (log_first.is_finite(), log_second.is_finite()) {
                (true, true) => {
                    if log_first > log_second {
                        first_higher += 1;
                    } else if log_second > log_first {
                        second_higher += 1;
                    }
                    let difference = log_first - log_second;
                    log_square_sum += difference * difference;
                    let p_first = log_first.exp();
                    let p_second = log_second.exp();
                    let scale = (p_first + p_second) / 2.0;
                    if scale > 0.0 {
                        let relative = (p_first - p_second).abs() / scale;
                        relative_square_sum += relative * relative;
                    }
                    finite_pairs += 1;
                }
                (true, false) | (false, true) => in_one_only += 1,
                (false, false) => {}
            }
        }
    }

    let rms = |sum: f64| {
        if finite_pairs == 0 {
            0.0
        } else {
            (sum / finite_pairs as f64).sqrt()
        }
    };
    Ok(ProbabilityComparison {
        sampled_per_half,
        first_higher,
        second_higher,
        in_one_only,
        rms_log_difference: rms(log_square_sum),
        rms_relative_difference: rms(relative_square_sum),
    })
}

fn split_first_two(ccds: &mut [Ccd]) -> (&mut Ccd, &mut Ccd) {
    let (head, tail) = ccds.split_at_mut(1);
    (&mut head[0], &mut tail[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tree::TreeBuilder;
    use rstest::rstest;

    fn cherry(first: &str, second: &str, third: &str) -> Tree {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf(first);
        let b = builder.leaf(second);
        let ab = builder.join(a, b);
        let c = builder.leaf(third);
        let root = builder.join(ab, c);
        builder.finish(root)
    }

    #[rstest]
    #[case(0.0005, "Exceptional mixing")]
    #[case(0.005, "Excellent mixing")]
    #[case(0.015, "Very good mixing")]
    #[case(0.03, "Good mixing")]
    #[case(0.07, "Moderate mixing")]
    #[case(0.15, "Poor mixing")]
    #[case(0.5, "Very poor mixing")]
    fn interpretation_buckets(#[case] relative: f64, #[case] expected: &str) {
        assert_eq!(interpret_relative_dissonance(relative), expected);
    }

    #[test]
    fn identical_trees_have_zero_dissonance() {
        let trees: Vec<Tree> = (0..10).map(|_| cherry("A", "B", "C")).collect();
        let result = within_chain_dissonance(&trees, 2, 7, None).expect("enough trees");
        assert_eq!(result.dissonance.len(), 5);
        for &step in &result.dissonance {
            assert!(step.abs() < 1e-12);
        }
        assert!(result.summary.final_dissonance.abs() < 1e-12);
        assert_eq!(result.interpretation, "Exceptional mixing");
        assert!(result.probability_comparison.is_none());
    }

    #[test]
    fn divergent_halves_have_positive_dissonance() {
        let mut trees: Vec<Tree> = (0..6).map(|_| cherry("A", "B", "C")).collect();
        trees.extend((0..6).map(|_| cherry("A", "C", "B")));
        let result = within_chain_dissonance(&trees, 2, 7, None).expect("enough trees");
        // Each half is internally pure, so chain entropies are zero while
        // the pooled CCD sees both topologies.
        let last = result
            .dissonance
            .last()
            .copied()
            .expect("steps were recorded");
        assert!(last > 0.1);
        // Both chains are pure, so the average final chain entropy is zero
        // and the relative dissonance degrades to its 0 fallback.
        assert_eq!(result.relative_dissonance, 0.0);
    }

    #[test]
    fn dissonance_is_never_negative() {
        let trees: Vec<Tree> = (0..12)
            .map(|index| {
                if index % 3 == 0 {
                    cherry("A", "B", "C")
                } else if index % 3 == 1 {
                    cherry("A", "C", "B")
                } else {
                    cherry("B", "C", "A")
                }
            })
            .collect();
        let result = within_chain_dissonance(&trees, 3, 11, None).expect("enough trees");
        for &step in &result.dissonance {
            assert!(step >= -1e-12);
        }
    }

    #[test]
    fn too_few_trees_are_rejected() {
        let trees: Vec<Tree> = (0..3).map(|_| cherry("A", "B", "C")).collect();
        let err = within_chain_dissonance(&trees, 2, 0, None).expect_err("needs 4 trees");
        assert_eq!(err.code(), crate::ArboraErrorCode::InsufficientTrees);
    }

    #[test]
    fn single_split_is_rejected() {
        let trees: Vec<Tree> = (0..8).map(|_| cherry("A", "B", "C")).collect();
        let err = within_chain_dissonance(&trees, 1, 0, None).expect_err("needs 2 splits");
        assert_eq!(err.code(), crate::ArboraErrorCode::InvalidConfiguration);
    }

    #[test]
    fn last_block_absorbs_remainder() {
        let trees: Vec<Tree> = (0..11).map(|_| cherry("A", "B", "C")).collect();
        let result = within_chain_dissonance(&trees, 2, 0, None).expect("enough trees");
        // Blocks of 5 and 6; the shorter block bounds the step count.
        assert_eq!(result.dissonance.len(), 5);
    }

}
