//! High-level runtime engine settings
//!
//! Selects the worker pool size and the neighbor search strategy used when
//! running a `SimulationDriver`

use serde::Deserialize;

/// How contact candidates are found each step. Both produce the same forces,
/// only the cost differs.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeighborSearch {
    #[serde(rename = "grid")] // uniform grid kept current as particles move, O(n)
    #[default]
    Grid,

    #[serde(rename = "direct")] // every other particle is a candidate, O(n^2)
    Direct,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    pub workers: usize, // 0 = available hardware parallelism
    pub neighbor_search: NeighborSearch,
}

impl Engine {
    /// Worker count actually used for the pool
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}
