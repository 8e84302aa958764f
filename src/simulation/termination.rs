//! Stopping rules for a simulation run
//!
//! A policy is evaluated after every completed step against the new snapshot.
//! It either lets the run continue, declares normal convergence, or trips the
//! divergence guard, which the driver turns into a fatal error.

use std::collections::VecDeque;
use std::fmt;

use log::{debug, warn};

use super::states::{total_kinetic_energy, Particle};

/// Why a run stopped normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TimeCut,
    EnergyCut,
    EnergyPlateau,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TimeCut => f.write_str("time cutoff reached"),
            StopReason::EnergyCut => f.write_str("kinetic energy below threshold"),
            StopReason::EnergyPlateau => f.write_str("kinetic energy plateau"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Continue,
    Converged(StopReason),
    Diverged { particle_id: u32, reason: String },
}

/// Rolling window of total kinetic energy samples
#[derive(Debug, Clone)]
pub struct EnergyPlateau {
    pub threshold: f64, // |average - current| below this is flat
    pub window: usize, // samples in the rolling average
    pub minimum_time: f64, // never stop before this time
    samples: VecDeque<f64>,
}

impl EnergyPlateau {
    pub fn new(threshold: f64, window: usize, minimum_time: f64) -> Self {
        Self {
            threshold,
            window: window.max(1),
            minimum_time,
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Average of the current window, None until it is full
    pub fn average(&self) -> Option<f64> {
        if self.samples.len() < self.window {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.window as f64)
        }
    }

    fn evaluate(&mut self, energy: f64, elapsed: f64) -> Verdict {
        let Some(average) = self.average() else {
            self.samples.push_back(energy);
            return Verdict::Continue;
        };

        let flat = (average - energy).abs() < self.threshold;
        self.samples.pop_front();
        self.samples.push_back(energy);

        if flat && elapsed >= self.minimum_time {
            debug!("plateau: average {average:.6e} J, current {energy:.6e} J at t = {elapsed:.4}");
            Verdict::Converged(StopReason::EnergyPlateau)
        } else {
            Verdict::Continue
        }
    }
}

#[derive(Debug, Clone)]
pub enum TerminationPolicy {
    /// Stop once `elapsed >= cutoff`
    TimeCut { cutoff: f64 },
    /// Stop once total kinetic energy is at most `threshold`, after `minimum_time`
    EnergyCut { threshold: f64, minimum_time: f64 },
    /// Stop when the kinetic energy stops changing
    EnergyPlateau(EnergyPlateau),
    /// Fail when a particle leaves `|x|, |y| <= bounds_limit` or stops being finite
    DivergenceGuard { bounds_limit: f64 },
    /// First member that fires wins, a divergence always wins
    AnyOf(Vec<TerminationPolicy>),
}

impl TerminationPolicy {
    pub fn time_cut(cutoff: f64) -> Self {
        TerminationPolicy::TimeCut { cutoff }
    }

    pub fn energy_cut(threshold: f64, minimum_time: f64) -> Self {
        TerminationPolicy::EnergyCut { threshold, minimum_time }
    }

    pub fn energy_plateau(threshold: f64, window: usize, minimum_time: f64) -> Self {
        TerminationPolicy::EnergyPlateau(EnergyPlateau::new(threshold, window, minimum_time))
    }

    pub fn divergence_guard(bounds_limit: f64) -> Self {
        TerminationPolicy::DivergenceGuard { bounds_limit }
    }

    /// Settling pass: hard cutoff, divergence guard, energy plateau
    pub fn stabilization(cutoff: f64, bounds_limit: f64, plateau: EnergyPlateau) -> Self {
        TerminationPolicy::AnyOf(vec![
            Self::time_cut(cutoff),
            Self::divergence_guard(bounds_limit),
            TerminationPolicy::EnergyPlateau(plateau),
        ])
    }

    /// Impact pass: energy is not expected to settle while the projectile moves
    pub fn impact(cutoff: f64, bounds_limit: f64) -> Self {
        TerminationPolicy::AnyOf(vec![
            Self::time_cut(cutoff),
            Self::divergence_guard(bounds_limit),
        ])
    }

    pub fn evaluate(&mut self, particles: &[Particle], elapsed: f64) -> Verdict {
        match self {
            TerminationPolicy::TimeCut { cutoff } => {
                if elapsed >= *cutoff {
                    Verdict::Converged(StopReason::TimeCut)
                } else {
                    Verdict::Continue
                }
            }
            TerminationPolicy::EnergyCut { threshold, minimum_time } => {
                if elapsed >= *minimum_time && total_kinetic_energy(particles) <= *threshold {
                    Verdict::Converged(StopReason::EnergyCut)
                } else {
                    Verdict::Continue
                }
            }
            TerminationPolicy::EnergyPlateau(plateau) => plateau.evaluate(total_kinetic_energy(particles), elapsed),
            TerminationPolicy::DivergenceGuard { bounds_limit } => check_bounds(particles, *bounds_limit),
            TerminationPolicy::AnyOf(members) => {
                // every member sees every step so rolling windows stay current
                let verdicts: Vec<Verdict> = members.iter_mut().map(|m| m.evaluate(particles, elapsed)).collect();
                if let Some(d) = verdicts.iter().find(|v| matches!(v, Verdict::Diverged { .. })) {
                    return d.clone();
                }
                verdicts
                    .into_iter()
                    .find(|v| *v != Verdict::Continue)
                    .unwrap_or(Verdict::Continue)
            }
        }
    }

    /// True when the run should stop, for whatever reason
    pub fn test(&mut self, particles: &[Particle], elapsed: f64) -> bool {
        self.evaluate(particles, elapsed) != Verdict::Continue
    }
}

fn check_bounds(particles: &[Particle], bounds_limit: f64) -> Verdict {
    for p in particles {
        let finite = p.x.iter().all(|c| c.is_finite());
        if !finite || p.x.x.abs() > bounds_limit || p.x.y.abs() > bounds_limit {
            let reason = if finite {
                format!("lateral position ({:.4}, {:.4}) beyond bound {}", p.x.x, p.x.y, bounds_limit)
            } else {
                format!("non-finite position {:?}", p.x)
            };
            warn!("divergence guard tripped by particle {}: {}", p.id, reason);
            return Verdict::Diverged { particle_id: p.id, reason };
        }
    }
    Verdict::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::ContactParams;
    use crate::simulation::vector::NVec3;

    fn moving(id: u32, x: NVec3, speed: f64) -> Particle {
        Particle::new(id, x, NVec3::new(speed, 0.0, 0.0), 0.01, 2.0, ContactParams::new(1.0, 1.0, 0.0, 0.0)).unwrap()
    }

    #[test]
    fn time_cut_boundary() {
        let mut cut = TerminationPolicy::time_cut(1.0);
        assert!(!cut.test(&[], 0.0));
        assert!(!cut.test(&[], 0.999_999));
        assert!(cut.test(&[], 1.0));
        assert!(cut.test(&[], 1.5));
    }

    #[test]
    fn energy_cut_waits_for_minimum_time() {
        let particles = vec![moving(1, NVec3::zeros(), 0.1)]; // KE = 0.01
        let mut cut = TerminationPolicy::energy_cut(0.02, 0.5);
        assert_eq!(cut.evaluate(&particles, 0.1), Verdict::Continue);
        assert_eq!(cut.evaluate(&particles, 0.5), Verdict::Converged(StopReason::EnergyCut));
    }

    #[test]
    fn plateau_needs_full_window() {
        let particles = vec![moving(1, NVec3::zeros(), 0.0)];
        let mut plateau = TerminationPolicy::energy_plateau(1e-3, 3, 0.0);
        assert_eq!(plateau.evaluate(&particles, 0.1), Verdict::Continue);
        assert_eq!(plateau.evaluate(&particles, 0.2), Verdict::Continue);
        assert_eq!(plateau.evaluate(&particles, 0.3), Verdict::Continue);
        assert_eq!(plateau.evaluate(&particles, 0.4), Verdict::Converged(StopReason::EnergyPlateau));
    }

    #[test]
    fn plateau_respects_minimum_time() {
        let particles = vec![moving(1, NVec3::zeros(), 0.0)];
        let mut plateau = TerminationPolicy::energy_plateau(1e-3, 2, 1.0);
        for step in 0..10 {
            assert_eq!(plateau.evaluate(&particles, 0.05 * step as f64), Verdict::Continue);
        }
        assert_eq!(plateau.evaluate(&particles, 1.0), Verdict::Converged(StopReason::EnergyPlateau));
    }

    #[test]
    fn plateau_ignores_changing_energy() {
        let mut plateau = TerminationPolicy::energy_plateau(1e-3, 2, 0.0);
        for (i, speed) in [1.0, 0.8, 0.6, 0.4, 0.2].iter().enumerate() {
            let particles = vec![moving(1, NVec3::zeros(), *speed)];
            assert_eq!(plateau.evaluate(&particles, i as f64), Verdict::Continue);
        }
    }

    #[test]
    fn guard_trips_on_lateral_escape_and_nan() {
        let mut guard = TerminationPolicy::divergence_guard(1.0);
        let ok = vec![moving(1, NVec3::new(0.5, 0.5, 50.0), 0.0)];
        assert_eq!(guard.evaluate(&ok, 0.0), Verdict::Continue);

        let out = vec![moving(7, NVec3::new(0.5, -1.5, 0.1), 0.0)];
        assert!(matches!(guard.evaluate(&out, 0.0), Verdict::Diverged { particle_id: 7, .. }));

        let nan = vec![moving(3, NVec3::new(f64::NAN, 0.0, 0.0), 0.0)];
        assert!(matches!(guard.evaluate(&nan, 0.0), Verdict::Diverged { particle_id: 3, .. }));
    }

    #[test]
    fn composite_prefers_divergence() {
        let mut policy = TerminationPolicy::impact(1.0, 1.0);
        let out = vec![moving(2, NVec3::new(3.0, 0.0, 0.0), 0.0)];
        assert!(matches!(policy.evaluate(&out, 2.0), Verdict::Diverged { .. }));

        let ok = vec![moving(2, NVec3::new(0.3, 0.0, 0.0), 0.0)];
        assert_eq!(policy.evaluate(&ok, 2.0), Verdict::Converged(StopReason::TimeCut));
        assert_eq!(policy.evaluate(&ok, 0.5), Verdict::Continue);
    }
}
