//! Deterministic display colors for species, assigned after a run.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::snapshot::SpeciesRecord;

/// Lower bound for base color channels, leaving headroom for drift
pub const RGB_LOWER: f64 = 0.09;
/// Upper bound for base color channels
pub const RGB_UPPER: f64 = 0.91;

/// Per-mutation drift applied to each channel
const CHANNEL_JITTER: f64 = 0.05;

/// Stride mixed into the palette seed to derive one sub-generator per mutation id
const ID_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Assign one RGB color per species, in registry order.
///
/// The founding genotype takes a base color drawn from `seed`; every further
/// mutation id shifts the channels by a drift derived from that id alone, so
/// species sharing a lineage prefix share most of their drift. Channels are
/// clamped to [0, 1] at the end.
pub fn color_scheme(species: &[SpeciesRecord], seed: u64) -> Vec<[f64; 3]> {
    let mut base_rng = ChaCha8Rng::seed_from_u64(seed);
    let base = [
        base_rng.gen_range(RGB_LOWER..RGB_UPPER),
        base_rng.gen_range(RGB_LOWER..RGB_UPPER),
        base_rng.gen_range(RGB_LOWER..RGB_UPPER),
    ];

    species
        .iter()
        .map(|record| {
            let mut color = base;
            for id in &record.genotype {
                // The founding allele keeps the base color
                if id.0 == 0 {
                    continue;
                }
                let sub_seed = seed.wrapping_add(id.0.wrapping_mul(ID_SEED_STRIDE));
                let mut drift_rng = ChaCha8Rng::seed_from_u64(sub_seed);
                for channel in &mut color {
                    *channel += drift_rng.gen_range(-CHANNEL_JITTER..CHANNEL_JITTER);
                }
            }
            [
                color[0].clamp(0.0, 1.0),
                color[1].clamp(0.0, 1.0),
                color[2].clamp(0.0, 1.0),
            ]
        })
        .collect()
}
