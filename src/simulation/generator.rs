//! Collision-free random packing of the initial bed
//!
//! Particles are dropped by rejection sampling onto a "current layer" that
//! starts at the floor. After `MAX_CONSECUTIVE_FAILURES` rejected draws in a
//! row the layer rises by one particle radius, so the bed fills bottom-up and
//! the loop always makes progress until the box is full.

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SimError};
use super::spatial_index::SpatialIndex;
use super::states::{ContactParams, Particle, Wall};
use super::vector::NVec3;

/// Rejections in a row before the layer is raised
pub const MAX_CONSECUTIVE_FAILURES: u32 = 100;

/// Linear diameter to mass law anchored at the smallest diameter
#[derive(Debug, Clone, Copy)]
pub struct MassLaw {
    pub low_diameter: f64,
    pub low_mass: f64,
}

impl MassLaw {
    pub fn mass(&self, diameter: f64) -> f64 {
        diameter * self.low_mass / self.low_diameter
    }
}

#[derive(Debug, Clone)]
pub struct BedSpec {
    pub box_size: NVec3, // [width, depth, height]
    pub count: usize, // particles to place
    pub min_diameter: f64,
    pub max_diameter: f64,
    pub low_mass: f64, // mass of a min_diameter particle
    pub contact: ContactParams,
    pub max_attempts: u64, // hard bound on draws, 0 = unlimited
}

impl BedSpec {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(SimError::config("bed must contain at least one particle"));
        }
        if !(self.min_diameter > 0.0) {
            return Err(SimError::config(format!("minimum diameter must be positive, got {}", self.min_diameter)));
        }
        if self.min_diameter > self.max_diameter {
            return Err(SimError::config(format!(
                "diameter range inverted: min {} > max {}",
                self.min_diameter, self.max_diameter
            )));
        }
        if !(self.low_mass > 0.0) {
            return Err(SimError::config(format!("particle mass must be positive, got {}", self.low_mass)));
        }
        if self.box_size.iter().any(|s| !(*s > 0.0)) {
            return Err(SimError::config(format!("box dimensions must be positive, got {:?}", self.box_size)));
        }
        if self.box_size.x < self.max_diameter || self.box_size.y < self.max_diameter || self.box_size.z < self.max_diameter {
            return Err(SimError::config(format!(
                "box {:?} cannot hold a particle of diameter {}",
                self.box_size, self.max_diameter
            )));
        }
        self.contact.validate("bed particles")
    }
}

pub struct BedGenerator<'a> {
    spec: BedSpec,
    walls: &'a [Wall],
    rng: StdRng,
}

impl<'a> BedGenerator<'a> {
    pub fn new(spec: BedSpec, walls: &'a [Wall], seed: u64) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            walls,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Place `count` non-overlapping particles at rest, ids 1..=count
    pub fn generate(&mut self) -> Result<Vec<Particle>> {
        let spec = &self.spec;
        let min_r = spec.min_diameter / 2.0;
        let max_r = spec.max_diameter / 2.0;
        let mass_law = MassLaw {
            low_diameter: spec.min_diameter,
            low_mass: spec.low_mass,
        };

        let mut index = SpatialIndex::new(&spec.box_size, 2.0 * max_r)?;
        let mut particles: Vec<Particle> = Vec::with_capacity(spec.count);

        info!(
            "generating {} particles, diameter [{}, {}], box {:.3} x {:.3} x {:.3}",
            spec.count, spec.min_diameter, spec.max_diameter, spec.box_size.x, spec.box_size.y, spec.box_size.z
        );

        let progress_step = (spec.count / 10).max(1);
        let mut next_id: u32 = 1;
        let mut layer_z = 0.0;
        let mut failures = 0u32;
        let mut attempts = 0u64;

        while particles.len() < spec.count {
            attempts += 1;
            if spec.max_attempts > 0 && attempts > spec.max_attempts {
                return Err(SimError::GenerationStarvation {
                    placed: particles.len(),
                    requested: spec.count,
                    attempts: attempts - 1,
                });
            }

            let radius = self.rng.gen_range(min_r..=max_r);
            let z = layer_z + radius;
            if z + radius > spec.box_size.z {
                return Err(SimError::GenerationStarvation {
                    placed: particles.len(),
                    requested: spec.count,
                    attempts,
                });
            }
            let position = NVec3::new(
                self.rng.gen_range(radius..=spec.box_size.x - radius),
                self.rng.gen_range(radius..=spec.box_size.y - radius),
                z,
            );

            let hit = index.find_any_overlap(&particles, &position, radius).map(|p| p.id);
            let wall = self.walls.iter().find(|w| w.overlaps_with(&position, radius)).map(|w| w.id);

            if hit.is_none() && wall.is_none() {
                let p = Particle::new(
                    next_id,
                    position,
                    NVec3::zeros(),
                    radius,
                    mass_law.mass(2.0 * radius),
                    spec.contact,
                )?;
                index.insert(particles.len(), &p);
                particles.push(p);
                next_id += 1;
                failures = 0;

                if particles.len() % progress_step == 0 {
                    info!("placed {}/{} particles ({:.0}%)", particles.len(), spec.count, 100.0 * particles.len() as f64 / spec.count as f64);
                }
            } else {
                trace!("rejected r = {radius:.5} at {position:?}: particle {hit:?}, wall {wall:?}");
                failures += 1;
                if failures > MAX_CONSECUTIVE_FAILURES {
                    layer_z += radius;
                    failures = 0;
                    debug!("layer raised to z = {layer_z:.5} with {} particles placed", particles.len());
                }
            }
        }

        info!("bed generated: {} particles in {} draws, top layer at z = {:.4}", particles.len(), attempts, layer_z);
        Ok(particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::box_walls;

    #[test]
    fn mass_scales_linearly_with_diameter() {
        let law = MassLaw { low_diameter: 0.015, low_mass: 0.025 };
        assert!((law.mass(0.015) - 0.025).abs() < 1e-15);
        assert!((law.mass(0.03) - 0.05).abs() < 1e-15);
    }

    #[test]
    fn rejects_inverted_diameter_range() {
        let spec = BedSpec {
            box_size: NVec3::new(0.4, 0.4, 1.0),
            count: 10,
            min_diameter: 0.03,
            max_diameter: 0.015,
            low_mass: 0.01,
            contact: ContactParams::new(1e5, 2e5, 10.0, 10.0),
            max_attempts: 0,
        };
        let walls = box_walls(&spec.box_size, spec.contact).unwrap();
        assert!(matches!(BedGenerator::new(spec, &walls, 1), Err(SimError::Configuration(_))));
    }

    #[test]
    fn same_seed_same_bed() {
        let spec = BedSpec {
            box_size: NVec3::new(0.2, 0.2, 0.5),
            count: 50,
            min_diameter: 0.015,
            max_diameter: 0.03,
            low_mass: 0.01,
            contact: ContactParams::new(1e5, 2e5, 10.0, 10.0),
            max_attempts: 0,
        };
        let walls = box_walls(&spec.box_size, spec.contact).unwrap();
        let a = BedGenerator::new(spec.clone(), &walls, 7).unwrap().generate().unwrap();
        let b = BedGenerator::new(spec, &walls, 7).unwrap().generate().unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert_eq!(p.id, q.id);
            assert_eq!(p.x, q.x);
            assert_eq!(p.radius, q.radius);
        }
    }
}
