use std::time::Instant;

use crate::error::Result;
use crate::simulation::forces::ContactForceModel;
use crate::simulation::generator::{BedGenerator, BedSpec};
use crate::simulation::spatial_index::SpatialIndex;
use crate::simulation::states::{box_walls, ContactParams, Particle, Wall};
use crate::simulation::vector::NVec3;

/// Bed recipe shared by every benchmark size
fn make_spec(n: usize) -> BedSpec {
    BedSpec {
        box_size: NVec3::new(0.4, 0.4, 1.0),
        count: n,
        min_diameter: 0.015,
        max_diameter: 0.03,
        low_mass: 0.025,
        contact: ContactParams::new(1e5, 2e5, 10.0, 10.0),
        max_attempts: 0,
    }
}

/// One force sweep over every particle, candidates = all other particles
fn sweep_direct(model: &ContactForceModel, particles: &[Particle], walls: &[Wall]) -> f64 {
    particles
        .iter()
        .map(|p| model.forces(p, particles, walls).force.z)
        .sum()
}

/// One force sweep over every particle, candidates from a freshly built grid
fn sweep_grid(model: &ContactForceModel, particles: &[Particle], walls: &[Wall], size: &NVec3) -> Result<f64> {
    let index = SpatialIndex::build(particles, size)?;
    let mut slots = Vec::new();
    let mut total = 0.0;
    for (slot, p) in particles.iter().enumerate() {
        index.candidates(particles, slot, &mut slots);
        total += model.forces(p, slots.iter().map(|&j| &particles[j]), walls).force.z;
    }
    Ok(total)
}

/// Time direct vs grid contact search on generated beds of growing size.
/// Both sweeps must agree, the returned checksum difference is printed too.
pub fn bench_neighbor_search() -> Result<()> {
    // Different bed sizes to test
    let ns = [250, 500, 1000, 2000, 4000];
    let model = ContactForceModel::new(9.81);

    for n in ns {
        let spec = make_spec(n);
        let size = spec.box_size;
        let walls = box_walls(&size, spec.contact)?;
        let particles = BedGenerator::new(spec, &walls, 42)?.generate()?;

        // Warm up
        sweep_direct(&model, &particles, &walls);
        sweep_grid(&model, &particles, &walls, &size)?;

        // Time direct
        let t0 = Instant::now();
        let direct = sweep_direct(&model, &particles, &walls);
        let dt_direct = t0.elapsed().as_secs_f64();

        // Time grid
        let t1 = Instant::now();
        let grid = sweep_grid(&model, &particles, &walls, &size)?;
        let dt_grid = t1.elapsed().as_secs_f64();

        println!(
            "N = {n:5}, direct = {:8.6} s, grid = {:8.6} s, |diff| = {:.3e}",
            dt_direct,
            dt_grid,
            (direct - grid).abs()
        );
    }
    Ok(())
}
