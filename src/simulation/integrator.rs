//! Beeman predictor-corrector time integrator
//!
//! Beeman is a multi-step scheme: besides the current acceleration it needs
//! the acceleration of the previous step, kept on each particle as `prev_a`.
//! A particle starts uninitialized (`prev_a = None`) and is primed once
//! before its first step, after which every step writes a new value.
//!
//! One step for a particle with state `(x, v, a_prev)`:
//!
//! ```text
//! a      = F(x, v) / m
//! x'     = x + v dt + 2/3 a dt^2 - 1/6 a_prev dt^2
//! v*     = v + 3/2 a dt - 1/2 a_prev dt          (predicted)
//! a_next = F(x', v*) / m
//! v'     = v + 1/3 a_next dt + 5/6 a dt - 1/6 a_prev dt   (corrected)
//! ```
//!
//! The integrator reads an immutable neighbor snapshot and returns a new
//! particle value. It never touches another particle, which is what lets the
//! driver run every particle of a step in parallel.

use super::forces::ContactForceModel;
use super::states::{Particle, Wall};
use super::vector::NVec3;

#[derive(Debug, Clone, Copy)]
pub struct BeemanIntegrator {
    pub dt: f64,
    pub model: ContactForceModel,
}

impl BeemanIntegrator {
    pub fn new(dt: f64, model: ContactForceModel) -> Self {
        Self { dt, model }
    }

    /// Seed `prev_a` without a real history. A particle at rest starts from
    /// zero. A moving one is stepped back by one explicit Euler step with the
    /// current force and the acceleration there is used instead.
    pub fn prime<'a, I>(&self, particle: &Particle, neighbors: I, walls: &[Wall]) -> Particle
    where
        I: IntoIterator<Item = &'a Particle> + Clone,
    {
        let mut out = particle.clone();
        if particle.prev_a.is_some() {
            return out;
        }
        if particle.v == NVec3::zeros() {
            out.prev_a = Some(NVec3::zeros());
            return out;
        }

        let dt = self.dt;
        let a = self.model.forces(particle, neighbors.clone(), walls).force / particle.m;
        let x_prev = particle.x - particle.v * dt + a * (0.5 * dt * dt);
        let v_prev = particle.v - a * dt;
        let back = particle.at_state(x_prev, v_prev);
        out.prev_a = Some(self.model.forces(&back, neighbors, walls).force / particle.m);
        out
    }

    /// Advance one particle by `dt` against a fixed neighbor snapshot
    pub fn step<'a, I>(&self, particle: &Particle, neighbors: I, walls: &[Wall]) -> Particle
    where
        I: IntoIterator<Item = &'a Particle> + Clone,
    {
        let dt = self.dt;
        let dt2 = dt * dt;
        let m = particle.m;

        let current = self.model.forces(particle, neighbors.clone(), walls);
        let a = current.force / m;
        let a_prev = particle.prev_a.unwrap_or_else(NVec3::zeros);

        let x_new = particle.x + particle.v * dt + a * (2.0 / 3.0 * dt2) - a_prev * (dt2 / 6.0);

        // predict
        let v_pred = particle.v + a * (1.5 * dt) - a_prev * (0.5 * dt);
        let trial = particle.at_state(x_new, v_pred);
        let a_next = self.model.forces(&trial, neighbors, walls).force / m;

        // correct
        let v_new = particle.v + a_next * (dt / 3.0) + a * (5.0 / 6.0 * dt) - a_prev * (dt / 6.0);

        Particle {
            x: x_new,
            v: v_new,
            prev_a: Some(a),
            pressure: current.pressure,
            last_wall: current.last_wall.or(particle.last_wall),
            ..particle.clone()
        }
    }
}
