//! # Uniform grid broad phase
//!
//! The box is cut into cubic cells whose edge is twice the largest bed
//! particle radius. Two bed particles can only touch when their cells are
//! neighbors, so a query scans the cell containing the point and its 26
//! neighbors instead of the whole particle set.
//!
//! - Cells hold slot indices into the caller's particle slice, never the
//!   particles themselves, so the index can be rebuilt over any snapshot.
//! - Positions outside the box are clamped into the border cells. Clamping
//!   is monotone, so two points closer than one cell edge still land in
//!   neighboring cells and no contact is missed.
//! - Particles wider than a cell (the projectile) go into a separate
//!   `oversized` list that every query scans, and their own queries widen
//!   the ring of cells to cover their reach.

use crate::error::{Result, SimError};
use super::states::{Particle, PROJECTILE_ID};
use super::vector::NVec3;

pub struct SpatialIndex {
    cell_size: f64,
    dims: [usize; 3],
    cells: Vec<Vec<usize>>, // flattened [x][y][z] buckets of slot indices
    oversized: Vec<usize>, // slots too large for a single cell
}

impl SpatialIndex {
    /// Empty index over `[0, size.x] x [0, size.y] x [0, size.z]`
    pub fn new(size: &NVec3, cell_size: f64) -> Result<Self> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(SimError::config(format!("grid cell size must be positive, got {cell_size}")));
        }
        if size.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
            return Err(SimError::config(format!("grid extent must be positive, got {:?}", size)));
        }

        let dim = |s: f64| (s / cell_size) as usize + 1;
        let dims = [dim(size.x), dim(size.y), dim(size.z)];
        let total = dims[0] * dims[1] * dims[2];

        Ok(Self {
            cell_size,
            dims,
            cells: vec![Vec::new(); total],
            oversized: Vec::new(),
        })
    }

    /// Index every particle of a snapshot, slot = position in the slice
    pub fn build(particles: &[Particle], size: &NVec3) -> Result<Self> {
        let mut index = Self::new(size, Self::cell_size_for(particles))?;
        for (slot, p) in particles.iter().enumerate() {
            index.insert(slot, p);
        }
        Ok(index)
    }

    /// Cell edge for a particle set: twice the largest bed radius. The
    /// projectile is left out so it does not coarsen the whole grid.
    pub fn cell_size_for(particles: &[Particle]) -> f64 {
        let bed_max = particles
            .iter()
            .filter(|p| p.id != PROJECTILE_ID)
            .map(|p| p.radius)
            .fold(0.0, f64::max);
        let max_r = if bed_max > 0.0 {
            bed_max
        } else {
            particles.iter().map(|p| p.radius).fold(0.0, f64::max)
        };
        2.0 * max_r
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn insert(&mut self, slot: usize, particle: &Particle) {
        if self.is_oversized(particle.radius) {
            self.oversized.push(slot);
        } else {
            let c = self.flat(self.cell_of(&particle.x));
            self.cells[c].push(slot);
        }
    }

    /// Move a slot from the bucket of `old` to the bucket of `new`
    pub fn relocate(&mut self, slot: usize, old: &NVec3, new: &NVec3) {
        if self.oversized.contains(&slot) {
            return;
        }
        let from = self.flat(self.cell_of(old));
        let to = self.flat(self.cell_of(new));
        if from == to {
            return;
        }
        if let Some(pos) = self.cells[from].iter().position(|&s| s == slot) {
            self.cells[from].swap_remove(pos);
        }
        self.cells[to].push(slot);
    }

    /// First indexed particle whose sphere overlaps the trial sphere
    pub fn find_any_overlap<'a>(&self, particles: &'a [Particle], position: &NVec3, radius: f64) -> Option<&'a Particle> {
        let mut found = None;
        self.visit(position, radius, |slot| {
            let p = &particles[slot];
            if p.overlaps_with(position, radius) {
                found = Some(p);
                false
            } else {
                true
            }
        });
        found
    }

    /// Collect every slot that may touch `particles[slot]`, itself excluded
    pub fn candidates(&self, particles: &[Particle], slot: usize, out: &mut Vec<usize>) {
        out.clear();
        let p = &particles[slot];
        self.visit(&p.x, p.radius, |other| {
            if other != slot {
                out.push(other);
            }
            true
        });
    }

    /// Number of indexed slots
    pub fn len(&self) -> usize {
        self.oversized.len() + self.cells.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_oversized(&self, radius: f64) -> bool {
        radius > 0.5 * self.cell_size
    }

    /// Walk candidate slots around a sphere until `f` returns false
    fn visit(&self, position: &NVec3, radius: f64, mut f: impl FnMut(usize) -> bool) {
        for &slot in &self.oversized {
            if !f(slot) {
                return;
            }
        }

        // Cells within reach of a sphere of `radius` touching a bed particle
        let reach = radius + 0.5 * self.cell_size;
        let ring = ((reach / self.cell_size).ceil() as isize).max(1);

        let centre = self.cell_of(position);
        let lo = |c: usize| (c as isize - ring).max(0) as usize;
        let hi = |c: usize, d: usize| ((c as isize + ring) as usize).min(d - 1);

        for ix in lo(centre[0])..=hi(centre[0], self.dims[0]) {
            for iy in lo(centre[1])..=hi(centre[1], self.dims[1]) {
                for iz in lo(centre[2])..=hi(centre[2], self.dims[2]) {
                    for &slot in &self.cells[self.flat([ix, iy, iz])] {
                        if !f(slot) {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn cell_of(&self, position: &NVec3) -> [usize; 3] {
        let axis = |v: f64, d: usize| {
            let c = (v / self.cell_size).floor();
            // NaN and negatives land in cell 0, far points in the last cell
            if c.is_nan() || c < 0.0 {
                0
            } else {
                (c as usize).min(d - 1)
            }
        };
        [
            axis(position.x, self.dims[0]),
            axis(position.y, self.dims[1]),
            axis(position.z, self.dims[2]),
        ]
    }

    fn flat(&self, c: [usize; 3]) -> usize {
        (c[0] * self.dims[1] + c[1]) * self.dims[2] + c[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::ContactParams;

    fn ball(id: u32, x: f64, y: f64, z: f64, r: f64) -> Particle {
        Particle::new(id, NVec3::new(x, y, z), NVec3::zeros(), r, 1.0, ContactParams::new(1.0, 1.0, 0.0, 0.0)).unwrap()
    }

    fn size() -> NVec3 {
        NVec3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn finds_overlap_across_cell_border() {
        let particles = vec![ball(1, 0.099, 0.5, 0.5, 0.01)];
        let mut index = SpatialIndex::new(&size(), 0.02).unwrap();
        index.insert(0, &particles[0]);

        // neighbor cell, 0.015 apart
        let hit = index.find_any_overlap(&particles, &NVec3::new(0.114, 0.5, 0.5), 0.01);
        assert_eq!(hit.map(|p| p.id), Some(1));

        let miss = index.find_any_overlap(&particles, &NVec3::new(0.2, 0.5, 0.5), 0.01);
        assert!(miss.is_none());
    }

    #[test]
    fn touching_spheres_do_not_overlap() {
        let particles = vec![ball(1, 0.5, 0.5, 0.5, 0.01)];
        let mut index = SpatialIndex::new(&size(), 0.02).unwrap();
        index.insert(0, &particles[0]);
        assert!(index.find_any_overlap(&particles, &NVec3::new(0.52, 0.5, 0.5), 0.01).is_none());
    }

    #[test]
    fn relocate_moves_bucket() {
        let mut particles = vec![ball(1, 0.1, 0.1, 0.1, 0.01)];
        let mut index = SpatialIndex::new(&size(), 0.02).unwrap();
        index.insert(0, &particles[0]);

        let old = particles[0].x;
        particles[0].x = NVec3::new(0.8, 0.8, 0.8);
        index.relocate(0, &old, &particles[0].x);

        assert!(index.find_any_overlap(&particles, &NVec3::new(0.1, 0.1, 0.1), 0.01).is_none());
        assert!(index.find_any_overlap(&particles, &NVec3::new(0.805, 0.8, 0.8), 0.01).is_some());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn oversized_particle_is_seen_by_everyone() {
        let particles = vec![
            ball(0, 0.5, 0.5, 0.5, 0.1),
            ball(1, 0.5, 0.5, 0.605, 0.01),
            ball(2, 0.9, 0.9, 0.9, 0.01),
        ];
        let index = SpatialIndex::build(&particles, &size()).unwrap();
        assert_eq!(index.cell_size(), 0.02);

        let mut out = Vec::new();
        index.candidates(&particles, 1, &mut out);
        assert!(out.contains(&0));

        index.candidates(&particles, 0, &mut out);
        assert!(out.contains(&1));
        assert!(!out.contains(&0));
    }

    #[test]
    fn points_outside_box_are_clamped() {
        let particles = vec![ball(1, 0.5, 0.5, 1.5, 0.01)];
        let index = SpatialIndex::build(&particles, &size()).unwrap();
        assert!(index.find_any_overlap(&particles, &NVec3::new(0.5, 0.5, 1.51), 0.01).is_some());
        assert!(index.find_any_overlap(&particles, &NVec3::new(0.5, 0.5, -0.3), 0.01).is_none());
    }

    #[test]
    fn rejects_bad_cell_size() {
        assert!(SpatialIndex::new(&size(), 0.0).is_err());
    }
}
