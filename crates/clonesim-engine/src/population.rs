//! Live cell storage.

use clonesim_core::{Position, SpeciesId};

/// One live cell: a lattice position bound to a species
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub position: Position,
    pub species: SpeciesId,
}

/// Append-fast cell store.
///
/// Removal swaps the victim with the last cell and pops, so it is O(1) but
/// does NOT preserve cell order; indices handed out earlier are invalidated
/// by every removal.
#[derive(Debug, Default)]
pub struct Population {
    cells: Vec<Cell>,
}

impl Population {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Cell {
        self.cells[index]
    }

    pub fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn swap_remove(&mut self, index: usize) -> Cell {
        self.cells.swap_remove(index)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}
