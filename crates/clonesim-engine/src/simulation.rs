//! The continuous-time birth-death-mutation growth loop.

use std::time::Instant;

use clonesim_core::{
    CellRecord, Direction, Error, MutationId, Result, SimulationConfig, Snapshot, SpeciesRecord,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};

use crate::lattice::Lattice;
use crate::mutation::MutationEngine;
use crate::neighbors::free_direction;
use crate::phylogeny::PhylogenyLog;
use crate::population::{Cell, Population};
use crate::registry::SpeciesRegistry;
use crate::select::select_index;

/// Elapsed-time accumulator.
///
/// The increment is exponential with rate `population × rate bound`, which
/// matches the true jump chain only while every live cell carries the bound
/// rate. The approximation is intentional.
#[derive(Debug, Default)]
struct SimulationClock {
    elapsed: f64,
}

impl SimulationClock {
    fn advance(&mut self, population: usize, rate_bound: f64, rng: &mut ChaCha8Rng) -> Result<()> {
        let rate = population as f64 * rate_bound;
        let increment = Exp::new(rate).map_err(|err| {
            Error::InvariantViolation(format!(
                "exponential clock rate {} is unusable: {}",
                rate, err
            ))
        })?;
        self.elapsed += increment.sample(rng);
        Ok(())
    }
}

enum StepOutcome {
    Birth,
    Death,
    NoOp,
}

/// Read-only view handed to progress callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub steps: u64,
    pub accepted_events: u64,
    pub population: usize,
    pub species_total: usize,
    pub elapsed_time: f64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// End-of-run accounting returned by [`Simulation::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub steps: u64,
    pub accepted_events: u64,
    pub elapsed_time: f64,
    pub population: usize,
    pub species_total: usize,
}

/// One growth run: lattice, live cells, species registry, divergence engine,
/// lineage log, and the run RNG, all exclusively owned for the run's
/// duration.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    lattice: Lattice,
    population: Population,
    registry: SpeciesRegistry,
    engine: MutationEngine,
    phylogeny: PhylogenyLog,
    clock: SimulationClock,
    rng: ChaCha8Rng,
    steps: u64,
    accepted_events: u64,
}

impl Simulation {
    /// Validate the configuration and place the founding wild-type cell at
    /// the lattice center.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut lattice = Lattice::for_target(config.target_population)?;
        let mut registry = SpeciesRegistry::new();
        let wild_type = registry.register(
            config.wild_type_birth_rate,
            config.wild_type_death_rate,
            vec![MutationId(0)],
            false,
        );
        let engine = MutationEngine::from_config(&config, &registry)?;
        let phylogeny = PhylogenyLog::new(engine.granularity());

        let center = lattice.center();
        lattice.set_occupied(center, true);
        let mut population = Population::new();
        population.push(Cell {
            position: center,
            species: wild_type,
        });

        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            lattice,
            population,
            registry,
            engine,
            phylogeny,
            clock: SimulationClock::default(),
            rng,
            steps: 0,
            accepted_events: 0,
        })
    }

    /// Run to the target population with no progress consumer and no
    /// cancellation.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_with(|_| {}, || false)
    }

    /// Drive the loop until the population reaches the target.
    ///
    /// `on_progress` fires every `progress_interval` steps; `cancelled` is
    /// checked between steps, and a cancelled run returns at a committed
    /// step boundary.
    #[instrument(skip_all, fields(target = self.config.target_population, seed = self.config.seed))]
    pub fn run_with<P, C>(&mut self, mut on_progress: P, cancelled: C) -> Result<RunSummary>
    where
        P: FnMut(&Progress),
        C: Fn() -> bool,
    {
        info!(
            population = self.population.len(),
            model = ?self.config.mutation_model,
            "starting growth run"
        );
        let started = Instant::now();

        while self.population.len() < self.config.target_population {
            if cancelled() {
                info!(
                    steps = self.steps,
                    population = self.population.len(),
                    "run cancelled"
                );
                return Ok(self.summary(RunStatus::Cancelled));
            }

            self.step()?;

            if self.steps % self.config.progress_interval == 0 {
                let progress = self.progress();
                if self.config.verbose {
                    info!(
                        steps = progress.steps,
                        population = progress.population,
                        species = progress.species_total,
                        simulated_time = progress.elapsed_time,
                        "growth progress"
                    );
                }
                on_progress(&progress);
            }
        }

        info!(
            steps = self.steps,
            accepted_events = self.accepted_events,
            population = self.population.len(),
            species = self.registry.len(),
            drivers = self.engine.drivers().len(),
            simulated_time = self.clock.elapsed,
            wall_seconds = started.elapsed().as_secs_f64(),
            "run complete"
        );
        Ok(self.summary(RunStatus::Completed))
    }

    /// One event attempt: pick a cell by rate, then resolve birth or death.
    fn step(&mut self) -> Result<()> {
        self.steps += 1;

        let index = select_index(
            &self.population,
            &self.registry,
            self.engine.rate_bound(),
            &mut self.rng,
        )?;
        let cell = self.population.cell(index);
        let species = self.registry.get(cell.species);
        // The selector only accepts cells with a positive combined rate
        let birth_probability = species.birth_rate / species.total_rate();

        let outcome = match free_direction(&mut self.rng, &self.lattice, cell.position) {
            Some(direction) => {
                if self.rng.gen_bool(birth_probability) {
                    self.give_birth(index, direction)?;
                    StepOutcome::Birth
                } else {
                    self.try_death(index)?
                }
            }
            None => {
                // A boxed-in cell can only die
                if self.rng.gen_bool(birth_probability) {
                    StepOutcome::NoOp
                } else {
                    self.try_death(index)?
                }
            }
        };

        if !matches!(outcome, StepOutcome::NoOp) {
            self.accepted_events += 1;
            self.clock.advance(
                self.population.len(),
                self.engine.rate_bound(),
                &mut self.rng,
            )?;
        }
        Ok(())
    }

    fn give_birth(&mut self, index: usize, direction: Direction) -> Result<()> {
        let mut parent = self.population.cell(index);
        let daughter_position = parent.position.step(direction);

        let daughter = self.engine.apply_birth(
            &mut parent,
            daughter_position,
            &mut self.registry,
            &mut self.phylogeny,
            &mut self.rng,
        )?;

        // Divergence may have rebound the parent's species
        *self.population.cell_mut(index) = parent;
        self.lattice.set_occupied(daughter_position, true);
        self.population.push(daughter);
        Ok(())
    }

    fn try_death(&mut self, index: usize) -> Result<StepOutcome> {
        // The last cell never dies; extinction is structurally forbidden
        if self.population.len() == 1 {
            trace!("death blocked at the minimum population");
            return Ok(StepOutcome::NoOp);
        }
        let cell = self.population.swap_remove(index);
        self.lattice.set_occupied(cell.position, false);
        self.registry.decrement(cell.species)?;
        Ok(StepOutcome::Death)
    }

    fn progress(&self) -> Progress {
        Progress {
            steps: self.steps,
            accepted_events: self.accepted_events,
            population: self.population.len(),
            species_total: self.registry.len(),
            elapsed_time: self.clock.elapsed,
        }
    }

    fn summary(&self, status: RunStatus) -> RunSummary {
        RunSummary {
            status,
            steps: self.steps,
            accepted_events: self.accepted_events,
            elapsed_time: self.clock.elapsed,
            population: self.population.len(),
            species_total: self.registry.len(),
        }
    }

    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    pub fn elapsed_time(&self) -> f64 {
        self.clock.elapsed
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn phylogeny(&self) -> &PhylogenyLog {
        &self.phylogeny
    }

    pub fn drivers(&self) -> &[MutationId] {
        self.engine.drivers()
    }

    /// Export the current state as plain output records, positions centered
    /// on the founding site.
    pub fn snapshot(&self) -> Snapshot {
        let center = self.lattice.center();

        let cells = self
            .population
            .cells()
            .iter()
            .map(|cell| {
                let species = self.registry.get(cell.species);
                CellRecord {
                    x: cell.position.x - center.x,
                    y: cell.position.y - center.y,
                    z: cell.position.z - center.z,
                    species: cell.species,
                    mutation_count: species.genotype.len(),
                    distance: cell.position.euclidean_distance(&center),
                    resistant: species.resistant,
                }
            })
            .collect();

        let species: Vec<SpeciesRecord> = self
            .registry
            .iter()
            .map(|species| SpeciesRecord {
                id: species.id,
                genotype: species.genotype.clone(),
                count: species.count(),
                resistant: species.resistant,
            })
            .collect();

        let highest_id = self
            .registry
            .iter()
            .flat_map(|species| species.genotype.iter())
            .map(|id| id.0)
            .max()
            .unwrap_or(0);
        let mut carrier_counts = vec![0u64; highest_id as usize + 1];
        for species in self.registry.iter() {
            for id in &species.genotype {
                carrier_counts[id.0 as usize] += species.count() as u64;
            }
        }

        Snapshot {
            cells,
            species,
            carrier_counts,
            phylogeny: self.phylogeny.edges().to_vec(),
            granularity: self.phylogeny.granularity(),
            drivers: self.engine.drivers().to_vec(),
            elapsed_time: self.clock.elapsed,
            species_total: self.registry.len(),
        }
    }

    /// Audit the cross-structure invariants at a step boundary.
    pub fn check_invariants(&self) -> Result<()> {
        let live = self.population.len();
        if live == 0 {
            return Err(Error::InvariantViolation(
                "population fell to zero".to_string(),
            ));
        }
        let counted = self.registry.total_count();
        if live != counted {
            return Err(Error::InvariantViolation(format!(
                "live cells {} disagree with species counts {}",
                live, counted
            )));
        }
        let occupied = self.lattice.occupied_count();
        if live != occupied {
            return Err(Error::InvariantViolation(format!(
                "live cells {} disagree with occupied sites {}",
                live, occupied
            )));
        }
        for cell in self.population.cells() {
            if !self.lattice.occupied(cell.position) {
                return Err(Error::InvariantViolation(format!(
                    "cell at {:?} sits on a vacant site",
                    cell.position
                )));
            }
        }
        let max_rate = self.registry.max_live_total_rate();
        if self.engine.rate_bound() < max_rate {
            return Err(Error::InvariantViolation(format!(
                "rate bound {} fell below the largest live rate {}",
                self.engine.rate_bound(),
                max_rate
            )));
        }
        Ok(())
    }
}
