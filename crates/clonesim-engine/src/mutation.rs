//! Genotype divergence applied on each accepted birth.

use std::collections::HashMap;

use clonesim_core::{
    Error, LineageGranularity, MutationId, MutationModel, Position, Result, SimulationConfig,
    SpeciesId, TransitionGraph,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use tracing::trace;

use crate::phylogeny::PhylogenyLog;
use crate::population::Cell;
use crate::registry::{Species, SpeciesRegistry};

/// Divergence engine for one run.
///
/// Owns the global rate bound: this is the only component allowed to widen
/// it, and it never shrinks.
#[derive(Debug)]
pub struct MutationEngine {
    model: Model,
    rate_bound: f64,
}

#[derive(Debug)]
enum Model {
    IndependentAlteration(IndependentAlteration),
    UserDefinedTransition(UserDefinedTransition),
}

impl MutationEngine {
    /// Build from a validated configuration and the registry holding the
    /// wild type
    pub fn from_config(config: &SimulationConfig, registry: &SpeciesRegistry) -> Result<Self> {
        let rate_bound = config.wild_type_birth_rate + config.wild_type_death_rate;
        let model = match config.mutation_model {
            MutationModel::IndependentAlteration => {
                let poisson = if config.mutation_rate > 0.0 {
                    let distribution = Poisson::new(config.mutation_rate).map_err(|err| {
                        Error::Configuration(format!(
                            "mutation_rate {} is not a usable Poisson mean: {}",
                            config.mutation_rate, err
                        ))
                    })?;
                    Some(distribution)
                } else {
                    None
                };
                Model::IndependentAlteration(IndependentAlteration {
                    poisson,
                    driver_probability: config.driver_probability,
                    driver_multiplier: config.driver_rate_multiplier,
                    minted: 0,
                    drivers: Vec::new(),
                })
            }
            MutationModel::UserDefinedTransition => {
                let graph = config.transition_graph.clone().ok_or_else(|| {
                    Error::Configuration(
                        "the user-defined transition model requires a transition_graph"
                            .to_string(),
                    )
                })?;
                let mut genotype_index = HashMap::new();
                for species in registry.iter() {
                    genotype_index.insert(species.genotype.clone(), species.id);
                }
                Model::UserDefinedTransition(UserDefinedTransition {
                    graph,
                    genotype_index,
                })
            }
        };
        Ok(Self { model, rate_bound })
    }

    /// Current global rate bound; never decreases over a run
    pub fn rate_bound(&self) -> f64 {
        self.rate_bound
    }

    /// What the lineage log's ids refer to under this model
    pub fn granularity(&self) -> LineageGranularity {
        match self.model {
            Model::IndependentAlteration(_) => LineageGranularity::Mutation,
            Model::UserDefinedTransition(_) => LineageGranularity::Species,
        }
    }

    /// Driver mutation ids minted so far, in order
    pub fn drivers(&self) -> &[MutationId] {
        match &self.model {
            Model::IndependentAlteration(model) => &model.drivers,
            Model::UserDefinedTransition(_) => &[],
        }
    }

    /// Resolve divergence for one accepted birth and return the daughter.
    ///
    /// The parent cell is rebound in place when its own lineage diverges;
    /// species counts and the lineage log are updated on every path.
    pub fn apply_birth(
        &mut self,
        parent: &mut Cell,
        daughter_position: Position,
        registry: &mut SpeciesRegistry,
        phylogeny: &mut PhylogenyLog,
        rng: &mut ChaCha8Rng,
    ) -> Result<Cell> {
        let Self { model, rate_bound } = self;
        match model {
            Model::IndependentAlteration(model) => model.apply_birth(
                rate_bound,
                parent,
                daughter_position,
                registry,
                phylogeny,
                rng,
            ),
            Model::UserDefinedTransition(model) => model.apply_birth(
                rate_bound,
                parent,
                daughter_position,
                registry,
                phylogeny,
                rng,
            ),
        }
    }
}

fn widen(rate_bound: &mut f64, rate: f64) {
    if rate > *rate_bound {
        *rate_bound = rate;
    }
}

/// Poisson-count divergence with globally-unique mutation ids.
#[derive(Debug)]
struct IndependentAlteration {
    /// None when the mutation rate is zero
    poisson: Option<Poisson<f64>>,
    driver_probability: f64,
    driver_multiplier: f64,
    minted: u64,
    drivers: Vec<MutationId>,
}

impl IndependentAlteration {
    fn apply_birth(
        &mut self,
        rate_bound: &mut f64,
        parent: &mut Cell,
        daughter_position: Position,
        registry: &mut SpeciesRegistry,
        phylogeny: &mut PhylogenyLog,
        rng: &mut ChaCha8Rng,
    ) -> Result<Cell> {
        // Both lineages diverge off the parent's pre-event species, so the
        // daughter's fresh ids never leak into the parent's genotype.
        let base = registry.get(parent.species).clone();

        let daughter_mutations = self.sample_count(rng);
        let daughter_species = if daughter_mutations > 0 {
            self.diverge(&base, daughter_mutations, rate_bound, registry, phylogeny, rng)?
        } else {
            registry.increment(parent.species);
            parent.species
        };

        let parent_mutations = self.sample_count(rng);
        if parent_mutations > 0 {
            let rebound =
                self.diverge(&base, parent_mutations, rate_bound, registry, phylogeny, rng)?;
            registry.decrement(parent.species)?;
            parent.species = rebound;
        }

        Ok(Cell {
            position: daughter_position,
            species: daughter_species,
        })
    }

    fn sample_count(&self, rng: &mut ChaCha8Rng) -> u64 {
        match &self.poisson {
            Some(distribution) => distribution.sample(rng) as u64,
            None => 0,
        }
    }

    /// Mint fresh mutation ids onto a copy of the base genotype and register
    /// the result as a brand-new species, without any lookup for an existing
    /// identical genotype.
    fn diverge(
        &mut self,
        base: &Species,
        count: u64,
        rate_bound: &mut f64,
        registry: &mut SpeciesRegistry,
        phylogeny: &mut PhylogenyLog,
        rng: &mut ChaCha8Rng,
    ) -> Result<SpeciesId> {
        let lineage_tip = base.genotype.last().copied().ok_or_else(|| {
            Error::InvariantViolation(format!("species {} has an empty genotype", base.id))
        })?;

        let mut genotype = base.genotype.clone();
        let mut birth_rate = base.birth_rate;
        for _ in 0..count {
            self.minted += 1;
            let id = MutationId(self.minted);
            genotype.push(id);
            phylogeny.append(lineage_tip.0, id.0);
            if rng.gen_bool(self.driver_probability) {
                birth_rate *= self.driver_multiplier;
                self.drivers.push(id);
            }
        }

        let id = registry.register(birth_rate, base.death_rate, genotype, base.resistant);
        widen(rate_bound, birth_rate + base.death_rate);
        trace!(species = %id, mutations = count, "registered diverged species");
        Ok(id)
    }
}

/// Divergence restricted to a user-supplied transition graph.
#[derive(Debug)]
struct UserDefinedTransition {
    graph: TransitionGraph,
    /// Canonical sorted genotype -> species id, for reuse instead of
    /// re-registration
    genotype_index: HashMap<Vec<MutationId>, SpeciesId>,
}

impl UserDefinedTransition {
    fn apply_birth(
        &mut self,
        rate_bound: &mut f64,
        parent: &mut Cell,
        daughter_position: Position,
        registry: &mut SpeciesRegistry,
        phylogeny: &mut PhylogenyLog,
        rng: &mut ChaCha8Rng,
    ) -> Result<Cell> {
        let holder = registry.get(parent.species).clone();

        for source in &holder.genotype {
            for edge in self.graph.outgoing(*source) {
                if !rng.gen_bool(edge.probability) {
                    continue;
                }
                let daughter_mutates = rng.gen_bool(0.5);
                // A transition to an id already carried is a no-op, but the
                // scan keeps going
                if holder.genotype.contains(&edge.target) {
                    continue;
                }

                let mut genotype = holder.genotype.clone();
                genotype.push(edge.target);
                genotype.sort_unstable();

                let species_id = match self.genotype_index.get(&genotype) {
                    Some(&existing) => {
                        registry.increment(existing);
                        existing
                    }
                    None => {
                        let birth_rate = holder.birth_rate * edge.multiplier;
                        let id = registry.register(
                            birth_rate,
                            holder.death_rate,
                            genotype.clone(),
                            holder.resistant,
                        );
                        self.genotype_index.insert(genotype, id);
                        widen(rate_bound, birth_rate + holder.death_rate);
                        phylogeny.append(holder.id.0 as u64, id.0 as u64);
                        trace!(species = %id, source = %source, target = %edge.target, "registered transition species");
                        id
                    }
                };

                // Only the first applied transition takes effect per birth
                return Ok(if daughter_mutates {
                    Cell {
                        position: daughter_position,
                        species: species_id,
                    }
                } else {
                    // The parent takes the transition; the daughter keeps the
                    // original species, so its live count carries over
                    let original = parent.species;
                    parent.species = species_id;
                    Cell {
                        position: daughter_position,
                        species: original,
                    }
                });
            }
        }

        registry.increment(parent.species);
        Ok(Cell {
            position: daughter_position,
            species: parent.species,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clonesim_core::MutationModel;
    use rand::SeedableRng;

    fn wild_registry(birth_rate: f64, death_rate: f64) -> SpeciesRegistry {
        let mut registry = SpeciesRegistry::new();
        registry.register(birth_rate, death_rate, vec![MutationId(0)], false);
        registry
    }

    fn ia_config(mutation_rate: f64, driver_probability: f64, multiplier: f64) -> SimulationConfig {
        SimulationConfig {
            mutation_rate,
            driver_probability,
            driver_rate_multiplier: multiplier,
            ..Default::default()
        }
    }

    fn udt_config(graph: TransitionGraph) -> SimulationConfig {
        SimulationConfig {
            mutation_model: MutationModel::UserDefinedTransition,
            transition_graph: Some(graph),
            ..Default::default()
        }
    }

    fn parent_cell(species: usize) -> Cell {
        Cell {
            position: Position::new(5, 5, 5),
            species: SpeciesId(species),
        }
    }

    #[test]
    fn test_ia_zero_rate_keeps_parent_species() {
        let mut registry = wild_registry(1.0, 0.1);
        let config = ia_config(0.0, 0.0, 1.0);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert_eq!(daughter.species, SpeciesId(0));
        assert_eq!(parent.species, SpeciesId(0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(SpeciesId(0)).count(), 2);
        assert!(phylogeny.is_empty());
        assert!(engine.drivers().is_empty());
    }

    #[test]
    fn test_ia_divergence_registers_fresh_species() {
        let mut registry = wild_registry(1.0, 0.1);
        // Mean 20 makes a zero draw unreachable in practice
        let config = ia_config(20.0, 0.0, 1.0);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        // Both lineages diverged into brand-new species
        assert_eq!(registry.len(), 3);
        assert_eq!(daughter.species, SpeciesId(1));
        assert_eq!(parent.species, SpeciesId(2));
        assert_eq!(registry.get(SpeciesId(0)).count(), 0);
        assert_eq!(registry.get(SpeciesId(1)).count(), 1);
        assert_eq!(registry.get(SpeciesId(2)).count(), 1);

        // The parent's divergence extends the pre-event genotype, not the
        // daughter's freshly minted one
        let daughter_genotype = &registry.get(daughter.species).genotype;
        let parent_genotype = &registry.get(parent.species).genotype;
        assert_eq!(daughter_genotype[0], MutationId(0));
        assert_eq!(parent_genotype[0], MutationId(0));
        for id in &parent_genotype[1..] {
            assert!(!daughter_genotype.contains(id));
        }

        // Every edge minted in this event hangs off the pre-event tip
        for edge in phylogeny.edges() {
            assert_eq!(edge.parent, 0);
        }
        assert_eq!(
            phylogeny.len(),
            daughter_genotype.len() + parent_genotype.len() - 2
        );
    }

    #[test]
    fn test_ia_repeat_divergence_never_reuses_species() {
        let mut registry = wild_registry(1.0, 0.1);
        let config = ia_config(20.0, 0.0, 1.0);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut first_parent = parent_cell(0);
        let first = engine
            .apply_birth(&mut first_parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();
        let mut second_parent = parent_cell(0);
        let second = engine
            .apply_birth(&mut second_parent, Position::new(4, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert_ne!(first.species, second.species);

        // No two registered genotypes are equal: ids are never re-minted
        let genotypes: Vec<_> = registry.iter().map(|species| species.genotype.clone()).collect();
        for (i, a) in genotypes.iter().enumerate() {
            for b in genotypes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_ia_drivers_multiply_birth_rate_and_widen_bound() {
        let mut registry = wild_registry(1.0, 0.1);
        let config = ia_config(10.0, 1.0, 2.0);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        assert_eq!(engine.rate_bound(), 1.1);
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(19);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        // Every minted id was a driver, doubling the birth rate each time
        let species = registry.get(daughter.species);
        let minted = species.genotype.len() - 1;
        assert!(minted > 0);
        assert_eq!(species.birth_rate, 2.0_f64.powi(minted as i32));
        for id in &species.genotype[1..] {
            assert!(engine.drivers().contains(id));
        }

        assert!(engine.rate_bound() > 1.1);
        assert!(engine.rate_bound() >= registry.max_live_total_rate());
    }

    #[test]
    fn test_udt_transition_moves_one_lineage() {
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 1.0, 1.5);
        let mut registry = wild_registry(1.0, 0.1);
        let config = udt_config(graph);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(23);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert_eq!(registry.len(), 2);
        let diverged = registry.get(SpeciesId(1));
        assert_eq!(diverged.genotype, vec![MutationId(0), MutationId(1)]);
        assert_eq!(diverged.birth_rate, 1.5);

        // Exactly one of the two lineages took the transition
        let species = [daughter.species, parent.species];
        assert!(species.contains(&SpeciesId(0)));
        assert!(species.contains(&SpeciesId(1)));
        assert_eq!(registry.total_count(), 2);

        assert_eq!(engine.granularity(), LineageGranularity::Species);
        assert_eq!(phylogeny.len(), 1);
        assert_eq!(phylogeny.edges()[0].parent, 0);
        assert_eq!(phylogeny.edges()[0].child, 1);
    }

    #[test]
    fn test_udt_same_id_set_maps_to_same_species() {
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(1), MutationId(2), 1.0, 1.0);
        graph.add_edge(MutationId(2), MutationId(1), 1.0, 1.0);

        let mut registry = wild_registry(1.0, 0.1);
        registry.register(1.0, 0.1, vec![MutationId(0), MutationId(1)], false);
        registry.register(1.0, 0.1, vec![MutationId(0), MutationId(2)], false);

        let config = udt_config(graph);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(31);

        // {0,1} + 2 and {0,2} + 1 both canonicalize to {0,1,2}
        let mut first_parent = parent_cell(1);
        engine
            .apply_birth(&mut first_parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.get(SpeciesId(3)).genotype,
            vec![MutationId(0), MutationId(1), MutationId(2)]
        );

        let mut second_parent = parent_cell(2);
        engine
            .apply_birth(&mut second_parent, Position::new(4, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        // The second path reuses the existing species instead of minting one
        assert_eq!(registry.len(), 4);
        assert_eq!(phylogeny.len(), 1);
    }

    #[test]
    fn test_udt_duplicate_target_does_not_stop_the_scan() {
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 1.0, 5.0);
        graph.add_edge(MutationId(1), MutationId(2), 1.0, 3.0);

        let mut registry = wild_registry(1.0, 0.1);
        registry.register(2.0, 0.1, vec![MutationId(0), MutationId(1)], false);

        let config = udt_config(graph);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(37);

        // The 0 -> 1 edge fires but id 1 is already carried; 1 -> 2 applies
        let mut parent = parent_cell(1);
        engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert_eq!(registry.len(), 3);
        let diverged = registry.get(SpeciesId(2));
        assert_eq!(
            diverged.genotype,
            vec![MutationId(0), MutationId(1), MutationId(2)]
        );
        // Multiplier chains off the holder's rate, not the wild type's
        assert_eq!(diverged.birth_rate, 6.0);
    }

    #[test]
    fn test_udt_first_applied_transition_ends_the_event() {
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 1.0, 1.0);
        graph.add_edge(MutationId(0), MutationId(2), 1.0, 1.0);

        let mut registry = wild_registry(1.0, 0.1);
        let config = udt_config(graph);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(41);

        let mut parent = parent_cell(0);
        engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        // Only the first certain edge applied; the second was never reached
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(SpeciesId(1)).genotype,
            vec![MutationId(0), MutationId(1)]
        );
    }

    #[test]
    fn test_udt_without_firing_edges_keeps_parent_species() {
        let graph = TransitionGraph::new();
        let mut registry = wild_registry(1.0, 0.1);
        let config = udt_config(graph);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(43);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert_eq!(daughter.species, SpeciesId(0));
        assert_eq!(registry.get(SpeciesId(0)).count(), 2);
        assert_eq!(registry.len(), 1);
        assert!(phylogeny.is_empty());
    }

    #[test]
    fn test_udt_requires_graph() {
        let registry = wild_registry(1.0, 0.1);
        let config = SimulationConfig {
            mutation_model: MutationModel::UserDefinedTransition,
            transition_graph: None,
            ..Default::default()
        };
        assert!(MutationEngine::from_config(&config, &registry).is_err());
    }

    #[test]
    fn test_resistance_flag_is_inherited() {
        let mut registry = SpeciesRegistry::new();
        registry.register(1.0, 0.1, vec![MutationId(0)], true);
        let config = ia_config(20.0, 0.0, 1.0);
        let mut engine = MutationEngine::from_config(&config, &registry).unwrap();
        let mut phylogeny = PhylogenyLog::new(engine.granularity());
        let mut rng = ChaCha8Rng::seed_from_u64(47);

        let mut parent = parent_cell(0);
        let daughter = engine
            .apply_birth(&mut parent, Position::new(6, 5, 5), &mut registry, &mut phylogeny, &mut rng)
            .unwrap();

        assert!(registry.get(daughter.species).resistant);
    }
}
