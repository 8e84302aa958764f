//! Core state types for the granular bed simulation.
//!
//! - `Particle`: a soft sphere with kinematic state and contact coefficients
//! - `Wall`: an immutable half-space boundary of the box
//! - `ContactParams`: spring-dashpot coefficients shared by both
//!
//! Particles are plain value records. The driver never edits a particle that
//! another task can see; each step builds new values and swaps the snapshot.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use super::vector::{NVec3, VectorExt};

/// Id reserved for the projectile
pub const PROJECTILE_ID: u32 = 0;

/// Spring-dashpot coefficients for one body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    pub kn: f64, // normal stiffness
    pub kt: f64, // tangential stiffness
    pub gamma_n: f64, // normal damping
    pub gamma_t: f64, // tangential damping
}

impl ContactParams {
    pub fn new(kn: f64, kt: f64, gamma_n: f64, gamma_t: f64) -> Self {
        Self { kn, kt, gamma_n, gamma_t }
    }

    /// Coefficients for a particle pair. Averaging keeps the pair force
    /// symmetric when the two bodies carry different coefficients.
    pub fn combine(&self, other: &ContactParams) -> ContactParams {
        ContactParams {
            kn: 0.5 * (self.kn + other.kn),
            kt: 0.5 * (self.kt + other.kt),
            gamma_n: 0.5 * (self.gamma_n + other.gamma_n),
            gamma_t: 0.5 * (self.gamma_t + other.gamma_t),
        }
    }

    pub fn validate(&self, what: &str) -> Result<()> {
        if !(self.kn > 0.0 && self.kt >= 0.0) {
            return Err(SimError::config(format!("{what}: stiffness must be positive (kn = {}, kt = {})", self.kn, self.kt)));
        }
        if !(self.gamma_n >= 0.0 && self.gamma_t >= 0.0) {
            return Err(SimError::config(format!("{what}: damping must be non-negative (gamma_n = {}, gamma_t = {})", self.gamma_n, self.gamma_t)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub id: u32, // stable id, 0 = projectile
    pub x: NVec3, // position
    pub v: NVec3, // velocity
    pub radius: f64, // radius
    pub m: f64, // mass
    pub contact: ContactParams, // stiffness and damping
    pub prev_a: Option<NVec3>, // acceleration of the previous step, None until primed
    pub pressure: f64, // diagnostic, sum of |Fn| over contacts / surface
    pub last_wall: Option<WallId>, // diagnostic, last wall touched
}

impl Particle {
    /// Build a particle with no integrator history
    pub fn new(id: u32, x: NVec3, v: NVec3, radius: f64, m: f64, contact: ContactParams) -> Result<Self> {
        let particle = Self {
            id,
            x,
            v,
            radius,
            m,
            contact,
            prev_a: None,
            pressure: 0.0,
            last_wall: None,
        };
        particle.validate()?;
        Ok(particle)
    }

    /// Physical checks shared by construction and checkpoint loading
    pub fn validate(&self) -> Result<()> {
        let id = self.id;
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(SimError::config(format!("particle {id}: radius must be positive, got {}", self.radius)));
        }
        if !(self.m > 0.0) || !self.m.is_finite() {
            return Err(SimError::config(format!("particle {id}: mass must be positive, got {}", self.m)));
        }
        self.contact.validate(&format!("particle {id}"))
    }

    pub fn is_projectile(&self) -> bool {
        self.id == PROJECTILE_ID
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.m * self.v.norm_squared()
    }

    /// Does a sphere at `position` with `radius` interpenetrate this particle
    pub fn overlaps_with(&self, position: &NVec3, radius: f64) -> bool {
        self.x.distance(position) < self.radius + radius
    }

    /// Same particle at a trial kinematic state, used for force evaluation
    pub fn at_state(&self, x: NVec3, v: NVec3) -> Particle {
        Particle { x, v, ..self.clone() }
    }
}

/// Identity is the id alone, kinematic state does not matter
impl PartialEq for Particle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Particle {}

impl Hash for Particle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Total kinetic energy of a particle set
pub fn total_kinetic_energy(particles: &[Particle]) -> f64 {
    particles.iter().map(Particle::kinetic_energy).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WallId {
    Left,
    Right,
    Front,
    Back,
    Bottom,
}

impl fmt::Display for WallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WallId::Left => "LEFT",
            WallId::Right => "RIGHT",
            WallId::Front => "FRONT",
            WallId::Back => "BACK",
            WallId::Bottom => "BOTTOM",
        };
        f.write_str(name)
    }
}

/// Infinite plane bounding the box. The normal points into the box, so a
/// particle is inside when its signed distance is positive.
#[derive(Debug, Clone)]
pub struct Wall {
    pub id: WallId,
    pub point: NVec3, // anchor point on the plane
    pub normal: NVec3, // unit normal
    pub tangent: NVec3, // normal x (0, 0, 1)
    pub contact: ContactParams,
}

impl Wall {
    pub fn new(id: WallId, point: NVec3, normal: NVec3, contact: ContactParams) -> Result<Self> {
        if (normal.norm() - 1.0).abs() > 1e-9 {
            return Err(SimError::config(format!("wall {id}: normal must have unit length, got |n| = {}", normal.norm())));
        }
        Ok(Self {
            id,
            point,
            normal,
            tangent: normal.cross(&NVec3::z()),
            contact,
        })
    }

    /// Signed distance from the plane, positive inside the box
    pub fn distance_to(&self, position: &NVec3) -> f64 {
        (position - self.point).dot(&self.normal)
    }

    /// Penetration depth of a sphere, zero or negative when not touching
    pub fn overlap(&self, position: &NVec3, radius: f64) -> f64 {
        radius - self.distance_to(position)
    }

    pub fn overlaps_with(&self, position: &NVec3, radius: f64) -> bool {
        self.distance_to(position) < radius
    }
}

/// Five walls of an open-topped box spanning `[0, w] x [0, d] x [0, h]`
pub fn box_walls(size: &NVec3, contact: ContactParams) -> Result<Vec<Wall>> {
    Ok(vec![
        Wall::new(WallId::Left, NVec3::zeros(), NVec3::x(), contact)?,
        Wall::new(WallId::Right, NVec3::new(size.x, 0.0, 0.0), -NVec3::x(), contact)?,
        Wall::new(WallId::Front, NVec3::zeros(), NVec3::y(), contact)?,
        Wall::new(WallId::Back, NVec3::new(0.0, size.y, 0.0), -NVec3::y(), contact)?,
        Wall::new(WallId::Bottom, NVec3::zeros(), NVec3::z(), contact)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactParams {
        ContactParams::new(1e5, 2e5, 10.0, 10.0)
    }

    #[test]
    fn equality_is_by_id_only() {
        let a = Particle::new(3, NVec3::zeros(), NVec3::zeros(), 0.01, 0.1, contact()).unwrap();
        let mut b = a.clone();
        b.x = NVec3::new(1.0, 1.0, 1.0);
        b.v = NVec3::new(0.0, 0.0, -2.0);
        assert_eq!(a, b);

        let c = Particle::new(4, a.x, a.v, a.radius, a.m, contact()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_non_positive_mass_and_radius() {
        assert!(Particle::new(1, NVec3::zeros(), NVec3::zeros(), 0.0, 1.0, contact()).is_err());
        assert!(Particle::new(1, NVec3::zeros(), NVec3::zeros(), 0.1, -1.0, contact()).is_err());
    }

    #[test]
    fn validate_catches_edited_fields() {
        let mut p = Particle::new(1, NVec3::zeros(), NVec3::zeros(), 0.01, 0.02, contact()).unwrap();
        p.validate().unwrap();
        p.m = f64::NAN;
        assert!(p.validate().is_err());
        p.m = 0.02;
        p.contact.gamma_t = -1.0;
        assert!(matches!(p.validate(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn wall_tangent_and_distance() {
        let w = Wall::new(WallId::Left, NVec3::zeros(), NVec3::x(), contact()).unwrap();
        assert_eq!(w.tangent, NVec3::new(0.0, -1.0, 0.0));
        assert_eq!(w.distance_to(&NVec3::new(0.25, 3.0, 1.0)), 0.25);
        assert!(w.overlaps_with(&NVec3::new(0.005, 0.0, 0.0), 0.01));
        assert!(!w.overlaps_with(&NVec3::new(0.01, 0.0, 0.0), 0.01));
    }

    #[test]
    fn wall_rejects_non_unit_normal() {
        assert!(Wall::new(WallId::Bottom, NVec3::zeros(), NVec3::new(0.0, 0.0, 2.0), contact()).is_err());
    }

    #[test]
    fn box_walls_point_inward() {
        let size = NVec3::new(0.4, 0.3, 1.0);
        let centre = NVec3::new(0.2, 0.15, 0.5);
        let walls = box_walls(&size, contact()).unwrap();
        assert_eq!(walls.len(), 5);
        for w in &walls {
            assert!(w.distance_to(&centre) > 0.0, "{} faces outward", w.id);
        }
    }

    #[test]
    fn wall_id_display_matches_names() {
        assert_eq!(WallId::Bottom.to_string(), "BOTTOM");
        assert_eq!(WallId::Back.to_string(), "BACK");
    }
}
