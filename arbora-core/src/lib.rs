//! Arbora core library.
//!
//! The computational core of a phylogenetic tree-set analysis engine: given
//! a collection of rooted binary trees over a common taxon set (typically a
//! posterior sample), it computes pairwise tree-distance matrices with their
//! classical MDS embeddings, and conditional clade distributions (CCDs) with
//! derived statistics — entropies, maximum-probability trees, per-tree
//! log-probabilities, and the within-chain dissonance mixing diagnostic.
//!
//! Parsing, plotting, and presentation live in collaborator crates; the
//! core consumes [`Tree`] values and returns in-memory artefacts.

mod bitset;
mod builder;
mod ccd;
mod dissonance;
mod distance;
mod engine;
mod error;
mod mds;
mod progress;
mod sampling;
mod taxa;
mod tree;

pub use crate::{
    bitset::TaxonBits,
    builder::ArboraBuilder,
    ccd::{Ccd, Clade, CladeId, CladePartition, CladeSummary},
    dissonance::{
        dissonance_over_sets, interpret_relative_dissonance, within_chain_dissonance,
        DissonanceResult, DissonanceSummary, ProbabilityComparison,
    },
    distance::{
        distance_matrix, distance_matrix_with_progress, path_distance, rf_distance, spr_distance,
        tree_distance, TreeMetric, PROGRESS_COLUMN_STRIDE,
    },
    engine::{Arbora, CcdStatistics, MdsPipeline, MdsSummary},
    error::{ArboraError, ArboraErrorCode, Result},
    mds::classical_mds,
    progress::{Progress, ProgressFn},
    taxa::TaxonIndex,
    tree::{Node, NodeId, Tree, TreeBuilder},
};
