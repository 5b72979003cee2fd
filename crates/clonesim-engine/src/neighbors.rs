//! Free-site resolution around a dividing cell.

use clonesim_core::{Direction, Position};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::lattice::Lattice;

/// Pick a direction to a free adjacent site, uniformly among the free ones.
///
/// Returns `None` when all six sites are occupied or out of bounds. Shuffling
/// the full direction array and taking the first free hit is uniform over the
/// free subset whatever its size.
pub fn free_direction(rng: &mut ChaCha8Rng, lattice: &Lattice, pos: Position) -> Option<Direction> {
    let mut directions = Direction::all();
    directions.shuffle(rng);
    directions.into_iter().find(|direction| {
        let target = pos.step(*direction);
        lattice.contains(target) && !lattice.occupied(target)
    })
}
