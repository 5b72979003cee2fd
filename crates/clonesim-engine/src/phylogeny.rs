//! Append-only lineage edge log.

use clonesim_core::{LineageGranularity, PhylogenyEdge};

/// Ordered parent -> child edges recorded as divergences happen.
///
/// The ids are mutation ids or species ids depending on the configured
/// mutation model; id 0 is the root clone either way.
#[derive(Debug)]
pub struct PhylogenyLog {
    granularity: LineageGranularity,
    edges: Vec<PhylogenyEdge>,
}

impl PhylogenyLog {
    pub fn new(granularity: LineageGranularity) -> Self {
        Self {
            granularity,
            edges: Vec::new(),
        }
    }

    pub fn append(&mut self, parent: u64, child: u64) {
        self.edges.push(PhylogenyEdge { parent, child });
    }

    pub fn edges(&self) -> &[PhylogenyEdge] {
        &self.edges
    }

    pub fn granularity(&self) -> LineageGranularity {
        self.granularity
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_keep_append_order() {
        let mut log = PhylogenyLog::new(LineageGranularity::Mutation);
        log.append(0, 1);
        log.append(0, 2);
        log.append(2, 3);

        assert_eq!(log.len(), 3);
        assert_eq!(log.edges()[0], PhylogenyEdge { parent: 0, child: 1 });
        assert_eq!(log.edges()[2], PhylogenyEdge { parent: 2, child: 3 });
        assert_eq!(log.granularity(), LineageGranularity::Mutation);
    }
}
