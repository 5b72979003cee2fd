//! Append-only species registry.

use clonesim_core::{Error, MutationId, Result, SpeciesId};

/// A genotype class: rates, canonical mutation list, live membership count.
///
/// Species are never deleted; an extinct species keeps its row so lineage
/// reconstruction stays possible after the run.
#[derive(Debug, Clone)]
pub struct Species {
    pub id: SpeciesId,
    pub birth_rate: f64,
    pub death_rate: f64,
    pub genotype: Vec<MutationId>,
    pub resistant: bool,
    count: usize,
}

impl Species {
    pub fn count(&self) -> usize {
        self.count
    }

    /// Combined event rate used for selection
    pub fn total_rate(&self) -> f64 {
        self.birth_rate + self.death_rate
    }
}

#[derive(Debug, Default)]
pub struct SpeciesRegistry {
    species: Vec<Species>,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self { species: Vec::new() }
    }

    /// Append a new species with one live member; ids are indices and are
    /// never reused
    pub fn register(
        &mut self,
        birth_rate: f64,
        death_rate: f64,
        genotype: Vec<MutationId>,
        resistant: bool,
    ) -> SpeciesId {
        let id = SpeciesId(self.species.len());
        self.species.push(Species {
            id,
            birth_rate,
            death_rate,
            genotype,
            resistant,
            count: 1,
        });
        id
    }

    pub fn get(&self, id: SpeciesId) -> &Species {
        &self.species[id.0]
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> + '_ {
        self.species.iter()
    }

    pub fn increment(&mut self, id: SpeciesId) {
        self.species[id.0].count += 1;
    }

    pub fn decrement(&mut self, id: SpeciesId) -> Result<()> {
        let species = &mut self.species[id.0];
        if species.count == 0 {
            return Err(Error::InvariantViolation(format!(
                "live count underflow for species {}",
                id
            )));
        }
        species.count -= 1;
        Ok(())
    }

    /// Total live cells across all species
    pub fn total_count(&self) -> usize {
        self.species.iter().map(|species| species.count).sum()
    }

    /// Largest combined rate among species that still have live members
    pub fn max_live_total_rate(&self) -> f64 {
        self.species
            .iter()
            .filter(|species| species.count > 0)
            .map(Species::total_rate)
            .fold(0.0, f64::max)
    }
}
