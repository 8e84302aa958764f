//! Fixed-step simulation loop
//!
//! Each step is bulk-synchronous:
//! 1. emit the snapshot if a save boundary was crossed,
//! 2. compute every particle's next state in parallel against the current
//!    snapshot, which nobody writes to during the fan-out,
//! 3. join, swap the freshly built snapshot in and advance the clock,
//! 4. evaluate the termination policy on the new snapshot.
//!
//! A driver is built idle, runs once, and is consumed when the run ends.

use std::collections::HashSet;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, SimError};
use crate::output::trajectory::FrameSink;
use super::engine::{Engine, NeighborSearch};
use super::forces::ContactForceModel;
use super::integrator::BeemanIntegrator;
use super::params::Parameters;
use super::spatial_index::SpatialIndex;
use super::states::{total_kinetic_energy, Particle, Wall};
use super::termination::{StopReason, TerminationPolicy, Verdict};
use super::vector::{NVec3, VectorExt};

/// Final state of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub particles: Vec<Particle>,
    pub elapsed: f64,
    pub steps: u64,
    pub reason: StopReason,
}

pub struct SimulationDriver {
    integrator: BeemanIntegrator,
    walls: Vec<Wall>,
    box_size: NVec3,
    save_dt: f64,
    neighbor_search: NeighborSearch,
    pool: ThreadPool,
}

impl SimulationDriver {
    pub fn new(params: &Parameters, engine: &Engine, walls: Vec<Wall>, box_size: NVec3) -> Result<Self> {
        params.validate()?;
        let workers = engine.worker_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| SimError::config(format!("cannot start worker pool: {e}")))?;

        Ok(Self {
            integrator: BeemanIntegrator::new(params.dt, ContactForceModel::new(params.gravity)),
            walls,
            box_size,
            save_dt: params.save_dt,
            neighbor_search: engine.neighbor_search,
            pool,
        })
    }

    /// Run until `policy` stops it. Frames go to `sink`, which is closed on
    /// the way out whether the run converged or diverged.
    pub fn run(self, particles: Vec<Particle>, policy: &mut TerminationPolicy, sink: &mut dyn FrameSink) -> Result<RunOutcome> {
        check_unique_ids(&particles)?;
        let dt = self.integrator.dt;
        info!(
            "run started: {} particles, dt = {dt:e} s, {} workers, {:?} neighbor search",
            particles.len(),
            self.pool.current_num_threads(),
            self.neighbor_search
        );

        // Slots are stable for the whole run, so the grid is built once and
        // every bucket is corrected as particles move
        let mut index = match self.neighbor_search {
            NeighborSearch::Grid if !particles.is_empty() => Some(SpatialIndex::build(&particles, &self.box_size)?),
            _ => None,
        };

        // Uninitialized particles get their Beeman history seeded once
        let mut snapshot = self.fan_out(&particles, index.as_ref(), |p, near| {
            self.integrator.prime(p, near.iter().copied(), &self.walls)
        });
        drop(particles);

        let mut steps: u64 = 0;
        let mut elapsed = 0.0;
        let mut frames: u64 = 0;
        let mut last_frame_step = None;

        let reason = loop {
            if elapsed + 0.5 * dt >= frames as f64 * self.save_dt {
                sink.add_frame(&snapshot, elapsed)?;
                debug!("frame {frames} at t = {elapsed:.5}, KE = {:.6e} J", total_kinetic_energy(&snapshot));
                frames += 1;
                last_frame_step = Some(steps);
            }

            let next = self.fan_out(&snapshot, index.as_ref(), |p, near| {
                self.integrator.step(p, near.iter().copied(), &self.walls)
            });
            if let Some(index) = index.as_mut() {
                for (slot, (old, new)) in snapshot.iter().zip(&next).enumerate() {
                    index.relocate(slot, &old.x, &new.x);
                }
            }
            snapshot = next;
            steps += 1;
            elapsed = steps as f64 * dt;

            if let Err(e) = check_finite(&snapshot, steps, elapsed) {
                sink.close()?;
                return Err(e);
            }

            match policy.evaluate(&snapshot, elapsed) {
                Verdict::Continue => {}
                Verdict::Converged(reason) => break reason,
                Verdict::Diverged { particle_id, reason } => {
                    warn!("run aborted at step {steps}: particle {particle_id} {reason}");
                    sink.close()?;
                    return Err(SimError::NumericalDivergence {
                        step: steps,
                        time: elapsed,
                        particle_id,
                        reason,
                    });
                }
            }
        };

        if last_frame_step != Some(steps) {
            sink.add_frame(&snapshot, elapsed)?;
        }
        sink.close()?;

        info!(
            "run finished after {steps} steps at t = {elapsed:.4} s ({reason}), KE = {:.6e} J",
            total_kinetic_energy(&snapshot)
        );

        Ok(RunOutcome {
            particles: snapshot,
            elapsed,
            steps,
            reason,
        })
    }

    /// Apply `f` to every particle of the snapshot on the worker pool and
    /// collect the results into a new snapshot. `f` receives the particle and
    /// its contact candidates, all borrowed read-only from `snapshot`.
    /// Without an index every other particle is a candidate.
    fn fan_out<F>(&self, snapshot: &[Particle], index: Option<&SpatialIndex>, f: F) -> Vec<Particle>
    where
        F: Fn(&Particle, &[&Particle]) -> Particle + Sync + Send,
    {
        if snapshot.is_empty() {
            return Vec::new();
        }

        match index {
            Some(index) => {
                self.pool.install(|| {
                    snapshot
                        .par_iter()
                        .enumerate()
                        .map_init(
                            || (Vec::<usize>::new(), Vec::<&Particle>::new()),
                            |buffers, (slot, p)| {
                                let (slots, near) = buffers;
                                index.candidates(snapshot, slot, slots);
                                near.clear();
                                near.extend(slots.iter().map(|&j| &snapshot[j]));
                                f(p, near.as_slice())
                            },
                        )
                        .collect()
                })
            }
            None => self.pool.install(|| {
                snapshot
                    .par_iter()
                    .map(|p| {
                        let near: Vec<&Particle> = snapshot.iter().filter(|q| q.id != p.id).collect();
                        f(p, near.as_slice())
                    })
                    .collect()
            }),
        }
    }
}

fn check_unique_ids(particles: &[Particle]) -> Result<()> {
    let mut seen = HashSet::with_capacity(particles.len());
    for p in particles {
        if !seen.insert(p.id) {
            return Err(SimError::config(format!("particle id {} appears more than once", p.id)));
        }
    }
    Ok(())
}

fn check_finite(particles: &[Particle], step: u64, time: f64) -> Result<()> {
    match particles.iter().find(|p| !p.x.all_finite() || !p.v.all_finite()) {
        Some(p) => Err(SimError::NumericalDivergence {
            step,
            time,
            particle_id: p.id,
            reason: format!("non-finite state x = {:?}, v = {:?}", p.x, p.v),
        }),
        None => Ok(()),
    }
}
