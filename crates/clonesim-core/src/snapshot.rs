//! Read-only output records assembled at the end of a growth run.

use serde::{Deserialize, Serialize};

use crate::types::{MutationId, SpeciesId};

/// What the ids in the lineage edge log refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageGranularity {
    /// Edges connect individual mutation ids
    Mutation,
    /// Edges connect species ids
    Species,
}

/// One parent -> child lineage edge; id 0 is the root clone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhylogenyEdge {
    pub parent: u64,
    pub child: u64,
}

/// Per-cell output row, positioned relative to the founding site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Species the cell belonged to when the run ended
    pub species: SpeciesId,
    /// Genotype length of that species
    pub mutation_count: usize,
    /// Radial distance from the founding site
    pub distance: f64,
    pub resistant: bool,
}

/// Per-species output row; extinct species are retained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub id: SpeciesId,
    /// Canonical mutation-id list
    pub genotype: Vec<MutationId>,
    /// Live cells bound to this species at run end
    pub count: usize,
    pub resistant: bool,
}

/// Full end-of-run view of the population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub cells: Vec<CellRecord>,
    pub species: Vec<SpeciesRecord>,
    /// Live carriers per mutation id, indexed by id
    pub carrier_counts: Vec<u64>,
    pub phylogeny: Vec<PhylogenyEdge>,
    pub granularity: LineageGranularity,
    /// Driver mutation ids, in minting order
    pub drivers: Vec<MutationId>,
    /// Simulated time elapsed over the whole run
    pub elapsed_time: f64,
    /// Registry size including extinct species
    pub species_total: usize,
}

impl Snapshot {
    pub fn live_population(&self) -> usize {
        self.cells.len()
    }
}
