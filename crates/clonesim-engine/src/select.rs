//! Rejection-sampling event selection.

use clonesim_core::{Error, Result};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::population::Population;
use crate::registry::SpeciesRegistry;

/// Pick a live cell index with probability proportional to its species'
/// combined rate.
///
/// Draws a uniform candidate, accepts it when a uniform draw below the
/// global bound lands under the candidate's rate. Expected trials stay O(1)
/// while the bound is close to the largest live rate. A rate observed above
/// the bound means upstream bookkeeping is broken and is never corrected
/// here.
pub fn select_index(
    population: &Population,
    registry: &SpeciesRegistry,
    rate_bound: f64,
    rng: &mut ChaCha8Rng,
) -> Result<usize> {
    if population.is_empty() {
        return Err(Error::InvariantViolation(
            "cannot select an event over an empty population".to_string(),
        ));
    }
    if !rate_bound.is_finite() || rate_bound <= 0.0 {
        return Err(Error::InvariantViolation(format!(
            "rate bound {} is not a positive finite number",
            rate_bound
        )));
    }

    loop {
        let trial = rng.gen_range(0..population.len());
        let rate = registry.get(population.cell(trial).species).total_rate();
        if rate > rate_bound {
            return Err(Error::InvariantViolation(format!(
                "live rate {} exceeds the global bound {}",
                rate, rate_bound
            )));
        }
        if rng.gen_range(0.0..rate_bound) < rate {
            return Ok(trial);
        }
    }
}
