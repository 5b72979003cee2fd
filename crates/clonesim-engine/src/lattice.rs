//! Dense 3D occupancy lattice backing the spatial growth.

use clonesim_core::{Error, Position, Result};

/// A fixed-size occupancy grid over a flat bit-packed buffer.
///
/// Sites hold at most one cell. Callers only pass in-bounds positions; the
/// neighbor resolver filters candidates before they reach the lattice.
#[derive(Debug, Clone)]
pub struct Lattice {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    words: Vec<u64>,
    occupied: usize,
}

impl Lattice {
    pub fn new(width: i32, height: i32, depth: i32) -> Self {
        let sites = width as usize * height as usize * depth as usize;
        Self {
            width,
            height,
            depth,
            words: vec![0u64; (sites + 63) / 64],
            occupied: 0,
        }
    }

    /// Build a cube sized for the requested final population.
    ///
    /// Edge tiers follow the population magnitude so the grown mass stays far
    /// from the boundary; a target no tier can hold is rejected before any
    /// allocation happens.
    pub fn for_target(target: usize) -> Result<Self> {
        let edge = edge_for_target(target);
        let capacity = edge * edge * edge;
        if capacity < target {
            return Err(Error::ResourceExhausted(format!(
                "lattice with {} sites cannot hold a target population of {}",
                capacity, target
            )));
        }
        Ok(Self::new(edge as i32, edge as i32, edge as i32))
    }

    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Founding site for the initial cell
    pub fn center(&self) -> Position {
        Position::new(self.width / 2, self.height / 2, self.depth / 2)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.x < self.width
            && pos.y >= 0
            && pos.y < self.height
            && pos.z >= 0
            && pos.z < self.depth
    }

    pub fn occupied(&self, pos: Position) -> bool {
        debug_assert!(self.contains(pos));
        let bit = self.offset(pos);
        self.words[bit / 64] >> (bit % 64) & 1 == 1
    }

    /// Mark a site occupied or free, keeping the occupied count exact
    pub fn set_occupied(&mut self, pos: Position, value: bool) {
        debug_assert!(self.contains(pos));
        let bit = self.offset(pos);
        let mask = 1u64 << (bit % 64);
        let word = &mut self.words[bit / 64];
        let was = *word & mask != 0;
        if value && !was {
            *word |= mask;
            self.occupied += 1;
        } else if !value && was {
            *word &= !mask;
            self.occupied -= 1;
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    fn offset(&self, pos: Position) -> usize {
        (pos.x as usize * self.height as usize + pos.y as usize) * self.depth as usize
            + pos.z as usize
    }
}

fn edge_for_target(target: usize) -> usize {
    if target <= 10_000_000 {
        500
    } else if target <= 100_000_000 {
        1_000
    } else {
        2_000
    }
}
