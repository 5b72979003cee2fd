//! Post-hoc diversity statistics over growth snapshots.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::snapshot::Snapshot;
use crate::types::MutationId;

/// Cell pairs sampled by [`mean_pairwise_jaccard`]
pub const DEFAULT_SAMPLE_PAIRS: usize = 5_000;

/// Jaccard similarity of two canonically sorted genotypes.
///
/// Both inputs must be ascending; genotypes produced by a run always are.
pub fn jaccard_similarity(a: &[MutationId], b: &[MutationId]) -> f64 {
    let mut i = 0;
    let mut j = 0;
    let mut intersection = 0usize;
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            intersection += 1;
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Mean genotype length across live cells
pub fn average_mutation_count(snapshot: &Snapshot) -> f64 {
    if snapshot.cells.is_empty() {
        return 0.0;
    }
    let total: usize = snapshot.cells.iter().map(|cell| cell.mutation_count).sum();
    total as f64 / snapshot.cells.len() as f64
}

/// Mean Jaccard similarity over randomly sampled pairs of live cells.
///
/// Sampling is with replacement and a pair may repeat a cell, mirroring how
/// the statistic is usually estimated on large populations.
pub fn mean_pairwise_jaccard(snapshot: &Snapshot, pairs: usize, seed: u64) -> f64 {
    if snapshot.cells.is_empty() || pairs == 0 {
        return 0.0;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut total = 0.0;
    for _ in 0..pairs {
        let first = &snapshot.cells[rng.gen_range(0..snapshot.cells.len())];
        let second = &snapshot.cells[rng.gen_range(0..snapshot.cells.len())];
        let genotype_a = &snapshot.species[first.species.0].genotype;
        let genotype_b = &snapshot.species[second.species.0].genotype;
        total += jaccard_similarity(genotype_a, genotype_b);
    }
    total / pairs as f64
}
