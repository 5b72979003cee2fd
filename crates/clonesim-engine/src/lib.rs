//! Spatial birth-death-mutation growth engine.
//!
//! A population grows from a single cell on a 3D occupancy lattice. Each step
//! picks one live cell by rejection sampling, resolves a free neighbor site,
//! and commits a birth (with possible genotype divergence) or a death.

pub mod lattice;
pub mod mutation;
pub mod neighbors;
pub mod phylogeny;
pub mod population;
pub mod registry;
pub mod select;
pub mod simulation;

pub use lattice::Lattice;
pub use mutation::MutationEngine;
pub use phylogeny::PhylogenyLog;
pub use population::{Cell, Population};
pub use registry::{Species, SpeciesRegistry};
pub use simulation::{Progress, RunStatus, RunSummary, Simulation};
