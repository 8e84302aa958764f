//! Contact forces for the granular bed
//!
//! Every body is a soft sphere. Touching bodies interpenetrate by `delta` and
//! feel a spring-dashpot force split into a normal part, which pushes them
//! apart, and a tangential part, which opposes sliding:
//!
//! ```text
//! n  = unit vector from the particle toward the other body
//! dv = v_self - v_other,  vn = dv . n,  vt = dv - vn n
//! Fn = kn delta + gamma_n vn
//! Ft = kt delta + gamma_t |vt|
//! F  = -n Fn - unit(vt) Ft
//! ```
//!
//! Walls use the same law with their own coefficients and the inward wall
//! normal. Gravity pulls along -z.
//!
//! The model only reads its inputs. Diagnostics such as the contact pressure
//! are returned with the force and written by the caller onto the new copy of
//! the particle, never onto a neighbor.

use std::f64::consts::PI;

use super::states::{ContactParams, Particle, Wall, WallId};
use super::vector::{NVec3, VectorExt};

/// Net force on one particle plus the diagnostics gathered on the way
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactForce {
    pub force: NVec3,
    pub pressure: f64, // sum of |Fn| over active contacts / (4 pi r^2)
    pub last_wall: Option<WallId>, // last wall found in contact, if any
}

#[derive(Debug, Clone, Copy)]
pub struct ContactForceModel {
    pub gravity: f64,
}

impl ContactForceModel {
    pub fn new(gravity: f64) -> Self {
        Self { gravity }
    }

    /// Net force on `particle` from its neighbors, the walls and gravity.
    /// Neighbors with the particle's own id are skipped.
    pub fn forces<'a, I>(&self, particle: &Particle, neighbors: I, walls: &[Wall]) -> ContactForce
    where
        I: IntoIterator<Item = &'a Particle>,
    {
        let mut force = NVec3::new(0.0, 0.0, -particle.m * self.gravity);
        let mut normal_sum = 0.0;
        let mut last_wall = None;

        for other in neighbors {
            if other.id == particle.id {
                continue;
            }
            let overlap = particle.radius + other.radius - particle.x.distance(&other.x);
            if overlap <= 0.0 {
                continue;
            }
            let n = (other.x - particle.x).normalize_or_zero();
            let dv = particle.v - other.v;
            let params = particle.contact.combine(&other.contact);
            let (f, fn_mag) = spring_dashpot(&params, overlap, &n, &dv);
            force += f;
            normal_sum += fn_mag.abs();
        }

        for wall in walls {
            let overlap = wall.overlap(&particle.x, particle.radius);
            if overlap <= 0.0 {
                continue;
            }
            // toward the wall, i.e. against its inward normal
            let n = -wall.normal;
            let (f, fn_mag) = spring_dashpot(&wall.contact, overlap, &n, &particle.v);
            force += f;
            normal_sum += fn_mag.abs();
            last_wall = Some(wall.id);
        }

        ContactForce {
            force,
            pressure: normal_sum / (4.0 * PI * particle.radius * particle.radius),
            last_wall,
        }
    }
}

/// Force of one contact and its signed normal magnitude
fn spring_dashpot(c: &ContactParams, overlap: f64, n: &NVec3, dv: &NVec3) -> (NVec3, f64) {
    let vn = dv.dot(n);
    let vt = dv.project_onto_plane(n);
    let fn_mag = c.kn * overlap + c.gamma_n * vn;
    let ft_mag = c.kt * overlap + c.gamma_t * vt.norm();
    let f = -n * fn_mag - vt.normalize_or_zero() * ft_mag;
    (f, fn_mag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::{box_walls, WallId};

    fn contact() -> ContactParams {
        ContactParams::new(1e5, 2e5, 10.0, 10.0)
    }

    fn ball(id: u32, x: NVec3, v: NVec3) -> Particle {
        Particle::new(id, x, v, 0.01, 0.02, contact()).unwrap()
    }

    #[test]
    fn free_particle_feels_only_gravity() {
        let model = ContactForceModel::new(9.81);
        let p = ball(1, NVec3::new(0.2, 0.2, 0.5), NVec3::zeros());
        let out = model.forces(&p, std::iter::empty(), &[]);
        assert_eq!(out.force, NVec3::new(0.0, 0.0, -0.02 * 9.81));
        assert_eq!(out.pressure, 0.0);
        assert_eq!(out.last_wall, None);
    }

    #[test]
    fn overlapping_pair_repels_equally() {
        let model = ContactForceModel::new(0.0);
        let a = ball(1, NVec3::new(0.0, 0.0, 0.0), NVec3::zeros());
        let b = ball(2, NVec3::new(0.015, 0.0, 0.0), NVec3::zeros());
        let fa = model.forces(&a, [&b], &[]).force;
        let fb = model.forces(&b, [&a], &[]).force;

        // delta = 0.005, Fn = kn delta = 500 N pointing away from the other body
        assert!((fa.x + 500.0).abs() < 1e-9, "fa = {:?}", fa);
        assert!((fb.x - 500.0).abs() < 1e-9, "fb = {:?}", fb);
        assert!((fa + fb).norm() < 1e-9);
    }

    #[test]
    fn separated_pair_has_no_contact_force() {
        let model = ContactForceModel::new(0.0);
        let a = ball(1, NVec3::new(0.0, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0));
        let b = ball(2, NVec3::new(0.021, 0.0, 0.0), NVec3::zeros());
        let out = model.forces(&a, [&b], &[]);
        assert_eq!(out.force, NVec3::zeros());
        assert_eq!(out.pressure, 0.0);
    }

    #[test]
    fn approaching_pair_gets_extra_damping() {
        let model = ContactForceModel::new(0.0);
        let a = ball(1, NVec3::new(0.0, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0));
        let b = ball(2, NVec3::new(0.015, 0.0, 0.0), NVec3::zeros());
        let out = model.forces(&a, [&b], &[]);
        // Fn = 500 + gamma_n * 1.0
        assert!((out.force.x + 510.0).abs() < 1e-9);
        assert!(out.force.y.abs() < 1e-12 && out.force.z.abs() < 1e-12);
    }

    #[test]
    fn sliding_contact_opposes_slip() {
        let model = ContactForceModel::new(0.0);
        let a = ball(1, NVec3::new(0.0, 0.0, 0.0), NVec3::new(0.0, 2.0, 0.0));
        let b = ball(2, NVec3::new(0.015, 0.0, 0.0), NVec3::zeros());
        let out = model.forces(&a, [&b], &[]);
        // Ft = kt delta + gamma_t |vt| = 1000 + 20
        assert!((out.force.y + 1020.0).abs() < 1e-9, "{:?}", out.force);
    }

    #[test]
    fn self_is_not_a_neighbor() {
        let model = ContactForceModel::new(0.0);
        let a = ball(1, NVec3::new(0.0, 0.0, 0.0), NVec3::zeros());
        let out = model.forces(&a, [&a], &[]);
        assert_eq!(out.force, NVec3::zeros());
    }

    #[test]
    fn floor_pushes_up_and_records_wall() {
        let model = ContactForceModel::new(0.0);
        let walls = box_walls(&NVec3::new(1.0, 1.0, 1.0), contact()).unwrap();
        let p = ball(1, NVec3::new(0.5, 0.5, 0.008), NVec3::zeros());
        let out = model.forces(&p, std::iter::empty(), &walls);
        // delta = 0.002, Fn = 200 N upward
        assert!((out.force.z - 200.0).abs() < 1e-9, "{:?}", out.force);
        assert_eq!(out.last_wall, Some(WallId::Bottom));
        let expected_pressure = 200.0 / (4.0 * PI * 0.01 * 0.01);
        assert!((out.pressure - expected_pressure).abs() < 1e-6);
    }

    #[test]
    fn coincident_centres_do_not_produce_nan() {
        let model = ContactForceModel::new(9.81);
        let a = ball(1, NVec3::new(0.1, 0.1, 0.1), NVec3::zeros());
        let b = ball(2, NVec3::new(0.1, 0.1, 0.1), NVec3::zeros());
        let out = model.forces(&a, [&b], &[]);
        assert!(out.force.all_finite());
    }
}
