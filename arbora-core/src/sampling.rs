//! Seeded subsampling shared by the MDS pipeline and the dissonance
//! probability comparison.

use rand::rngs::SmallRng;
use rand::Rng;

/// Uniformly samples up to `cap` indices from `[0, len)` without
/// replacement via a partial Fisher–Yates pass. When `len <= cap` every
/// index is returned, in order.
pub(crate) fn sample_indices(len: usize, cap: usize, rng: &mut SmallRng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    if len <= cap {
        return indices;
    }
    for position in 0..cap {
        let pick = rng.gen_range(position..len);
        indices.swap(position, pick);
    }
    indices.truncate(cap);
    indices
}
