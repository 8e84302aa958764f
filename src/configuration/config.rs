//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! cannonball scenario. A scenario consists of:
//!
//! - [`EngineConfig`]        – worker pool size and neighbor search strategy
//! - [`ParametersConfig`]    – time stepping, gravity and seed
//! - [`BedConfig`]           – box, particle count, size range and contact law
//! - [`WallsConfig`]         – contact law of the box walls
//! - [`ProjectileConfig`]    – cannonball size, mass, launch and contact law
//! - [`StabilizationConfig`] – settling pass stop rule
//! - [`OutputConfig`]        – output directory and checkpoint name
//! - [`ScenarioConfig`]      – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   workers: 0                # 0 -> available hardware parallelism
//!   neighbor_search: "grid"   # or "direct"
//!
//! parameters:
//!   dt: 1.0e-5                # fixed step size
//!   save_dt: 5.0e-3           # time between trajectory frames
//!   cutoff_time: 1.0          # impact pass duration
//!   gravity: 9.81
//!   seed: 42
//!
//! bed:
//!   box_size: [0.4, 0.4, 1.0] # width, depth, height
//!   particles: 500
//!   min_diameter: 0.015
//!   max_diameter: 0.03
//!   low_mass: 0.025           # mass of a min_diameter particle
//!   contact: { kn: 1.0e5, kt: 2.0e5, gamma_n: 10.0, gamma_t: 10.0 }
//!
//! walls:
//!   contact: { kn: 5.0e4, kt: 1.0e5, gamma_n: 1200.0, gamma_t: 1200.0 }
//!
//! projectile:
//!   diameter: 0.175
//!   mass: 17.5
//!   angle_deg: 90.0           # 90 -> straight down
//!   speed: 20.0
//!   height: 0.6
//!   contact: { kn: 1.0e5, kt: 2.0e5, gamma_n: 10.0, gamma_t: 10.0 }
//!
//! stabilization:
//!   energy_threshold: 1.0e-3
//!   window: 100
//!   minimum_time: 0.3
//!   cutoff_time: 3.0
//!   bounds_limit: 10.0
//!
//! output:
//!   directory: "out"
//!   checkpoint: "stabilized_bed"   # optional warm start / save name
//! ```
//!
//! [`ScenarioConfig::validate`] rejects physically invalid input before any
//! simulation work starts, including damping too strong for the time step:
//! `gamma dt / m` of the lightest body must stay below [`MAX_DAMPING_STEP`].

use log::warn;
use serde::Deserialize;

use crate::error::{Result, SimError};
use crate::simulation::engine::{Engine, NeighborSearch};
use crate::simulation::generator::BedSpec;
use crate::simulation::params::Parameters;
use crate::simulation::states::ContactParams;
use crate::simulation::vector::NVec3;

/// Largest `gamma dt / m` accepted. The explicit dashpot overshoots and
/// the run blows up as this approaches 2.
pub const MAX_DAMPING_STEP: f64 = 1.0;

/// `omega dt` above which contacts are poorly resolved
const STIFFNESS_STEP_WARNING: f64 = 0.5;

/// High-level engine configuration
#[derive(Deserialize, Debug, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub workers: usize, // worker threads, 0 = one per hardware thread
    #[serde(default)]
    pub neighbor_search: NeighborSearch, // grid or direct contact candidate search
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub dt: f64,          // time step size
    pub save_dt: f64,     // time between trajectory frames
    pub cutoff_time: f64, // duration of the impact pass
    #[serde(default = "default_gravity")]
    pub gravity: f64,     // gravitational acceleration
    #[serde(default)]
    pub seed: u64,        // deterministic seed to make beds reproducible
}

/// Spring-dashpot coefficients as written in YAML
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ContactConfig {
    pub kn: f64,
    pub kt: f64,
    pub gamma_n: f64,
    pub gamma_t: f64,
}

/// Granular bed to generate
#[derive(Deserialize, Debug, Clone)]
pub struct BedConfig {
    pub box_size: [f64; 3], // width, depth, height
    pub particles: usize,   // number of bed particles
    pub min_diameter: f64,
    pub max_diameter: f64,
    pub low_mass: f64,      // mass of a min_diameter particle, others scale linearly
    pub contact: ContactConfig,
    #[serde(default)]
    pub max_attempts: u64,  // placement draws before giving up, 0 = bounded by box height only
}

#[derive(Deserialize, Debug, Clone)]
pub struct WallsConfig {
    pub contact: ContactConfig,
}

/// Cannonball launch
#[derive(Deserialize, Debug, Clone)]
pub struct ProjectileConfig {
    pub diameter: f64,
    pub mass: f64,
    pub angle_deg: f64, // angle below the horizontal, 90 = straight down
    pub speed: f64,     // launch speed in m/s
    pub height: f64,    // initial height of the centre
    pub contact: ContactConfig,
}

/// Stop rule of the settling pass
#[derive(Deserialize, Debug, Clone)]
pub struct StabilizationConfig {
    pub energy_threshold: f64, // plateau tolerance on |average - current| kinetic energy
    pub window: usize,         // samples in the rolling average
    pub minimum_time: f64,     // never stop settling before this time
    pub cutoff_time: f64,      // hard limit of the settling pass
    pub bounds_limit: f64,     // lateral bound for the divergence guard
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,          // where trajectories and checkpoints go
    #[serde(default)]
    pub checkpoint: Option<String>, // load this bed if present, otherwise save it
    #[serde(default = "default_true")]
    pub save_stabilization: bool,   // also write the settling trajectory
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            checkpoint: None,
            save_stabilization: true,
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub parameters: ParametersConfig,
    pub bed: BedConfig,
    pub walls: WallsConfig,
    pub projectile: ProjectileConfig,
    pub stabilization: StabilizationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_gravity() -> f64 {
    9.81
}

fn default_directory() -> String {
    "out".to_string()
}

fn default_true() -> bool {
    true
}

impl ContactConfig {
    pub fn to_params(&self) -> ContactParams {
        ContactParams::new(self.kn, self.kt, self.gamma_n, self.gamma_t)
    }
}

impl ScenarioConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SimError::config(format!("invalid scenario YAML: {e}")))
    }

    /// Reject physically invalid inputs
    pub fn validate(&self) -> Result<()> {
        self.parameters().validate()?;
        self.bed_spec().validate()?;
        self.walls.contact.to_params().validate("walls")?;

        let p = &self.projectile;
        if !(p.diameter > 0.0) {
            return Err(SimError::config(format!("projectile diameter must be positive, got {}", p.diameter)));
        }
        if !(p.mass > 0.0) {
            return Err(SimError::config(format!("projectile mass must be positive, got {}", p.mass)));
        }
        if !p.speed.is_finite() || p.speed < 0.0 {
            return Err(SimError::config(format!("projectile speed must be finite and non-negative, got {}", p.speed)));
        }
        let [w, d, _] = self.bed.box_size;
        if p.diameter > w || p.diameter > d {
            return Err(SimError::config(format!("projectile diameter {} does not fit in a {w} x {d} box", p.diameter)));
        }
        p.contact.to_params().validate("projectile")?;

        let s = &self.stabilization;
        if s.window == 0 {
            return Err(SimError::config("stabilization window must hold at least one sample"));
        }
        if !(s.energy_threshold > 0.0) {
            return Err(SimError::config(format!("energy threshold must be positive, got {}", s.energy_threshold)));
        }
        if !(s.cutoff_time > 0.0) || s.minimum_time < 0.0 {
            return Err(SimError::config(format!(
                "stabilization times must be positive (minimum {}, cutoff {})",
                s.minimum_time, s.cutoff_time
            )));
        }
        if !(s.bounds_limit > 0.0) {
            return Err(SimError::config(format!("bounds limit must be positive, got {}", s.bounds_limit)));
        }
        self.check_time_step()
    }

    /// Damping and stiffness seen by the lightest body against the step size
    fn check_time_step(&self) -> Result<()> {
        let dt = self.parameters.dt;
        let lightest = self.bed.low_mass.min(self.projectile.mass);
        let (bed, walls, ball) = (&self.bed.contact, &self.walls.contact, &self.projectile.contact);

        let gamma = [
            bed.gamma_n,
            bed.gamma_t,
            walls.gamma_n,
            walls.gamma_t,
            0.5 * (bed.gamma_n + ball.gamma_n),
            0.5 * (bed.gamma_t + ball.gamma_t),
        ]
        .into_iter()
        .fold(0.0, f64::max);
        let damping_step = gamma * dt / lightest;
        if damping_step > MAX_DAMPING_STEP {
            return Err(SimError::config(format!(
                "damping {gamma} on a {lightest} kg body needs dt <= {:e}, got {dt:e} (gamma dt / m = {damping_step:.2})",
                MAX_DAMPING_STEP * lightest / gamma
            )));
        }

        let kn = [bed.kn, walls.kn, 0.5 * (bed.kn + ball.kn)].into_iter().fold(0.0, f64::max);
        let stiffness_step = (kn / lightest).sqrt() * dt;
        if stiffness_step > STIFFNESS_STEP_WARNING {
            warn!("stiffness {kn} on a {lightest} kg body gives omega dt = {stiffness_step:.2}, contacts may be unresolved");
        }
        Ok(())
    }

    pub fn parameters(&self) -> Parameters {
        Parameters {
            dt: self.parameters.dt,
            save_dt: self.parameters.save_dt,
            t_end: self.parameters.cutoff_time,
            gravity: self.parameters.gravity,
            seed: self.parameters.seed,
        }
    }

    pub fn engine(&self) -> Engine {
        Engine {
            workers: self.engine.workers,
            neighbor_search: self.engine.neighbor_search,
        }
    }

    pub fn box_size(&self) -> NVec3 {
        NVec3::from(self.bed.box_size)
    }

    pub fn bed_spec(&self) -> BedSpec {
        BedSpec {
            box_size: self.box_size(),
            count: self.bed.particles,
            min_diameter: self.bed.min_diameter,
            max_diameter: self.bed.max_diameter,
            low_mass: self.bed.low_mass,
            contact: self.bed.contact.to_params(),
            max_attempts: self.bed.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
parameters:
  dt: 1.0e-4
  save_dt: 1.0e-2
  cutoff_time: 1.0
  seed: 3
bed:
  box_size: [0.4, 0.4, 1.0]
  particles: 500
  min_diameter: 0.015
  max_diameter: 0.03
  low_mass: 0.025
  contact: { kn: 1.0e5, kt: 2.0e5, gamma_n: 10.0, gamma_t: 10.0 }
walls:
  contact: { kn: 1.0e5, kt: 2.0e5, gamma_n: 10.0, gamma_t: 10.0 }
projectile:
  diameter: 0.175
  mass: 17.5
  angle_deg: 90.0
  speed: 20.0
  height: 0.6
  contact: { kn: 1.0e5, kt: 2.0e5, gamma_n: 10.0, gamma_t: 10.0 }
stabilization:
  energy_threshold: 1.0e-3
  window: 100
  minimum_time: 0.3
  cutoff_time: 3.0
  bounds_limit: 10.0
"#;

    #[test]
    fn parses_with_defaults() {
        let cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.engine.workers, 0);
        assert_eq!(cfg.engine.neighbor_search, NeighborSearch::Grid);
        assert_eq!(cfg.parameters.gravity, 9.81);
        assert_eq!(cfg.output.directory, "out");
        assert!(cfg.output.checkpoint.is_none());
        assert_eq!(cfg.box_size(), NVec3::new(0.4, 0.4, 1.0));
        assert_eq!(cfg.bed_spec().count, 500);
    }

    #[test]
    fn rejects_inverted_diameters() {
        let mut cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
        cfg.bed.min_diameter = 0.05;
        assert!(matches!(cfg.validate(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn rejects_non_positive_time_step() {
        let mut cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
        cfg.parameters.dt = 0.0;
        assert!(cfg.validate().is_err());
        cfg.parameters.dt = -1e-4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_massless_projectile() {
        let mut cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
        cfg.projectile.mass = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_wall_damping_too_strong_for_time_step() {
        let mut cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
        cfg.walls.contact.gamma_n = 500.0;
        // 500 * 1e-4 / 0.025 = 2
        assert!(matches!(cfg.validate(), Err(SimError::Configuration(_))));

        cfg.parameters.dt = 2e-5;
        cfg.validate().unwrap();
    }

    #[test]
    fn shipped_scenario_is_valid() {
        let text = include_str!("../../scenarios/cannonball.yaml");
        let cfg = ScenarioConfig::from_yaml_str(text).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.bed.particles, 500);
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(matches!(ScenarioConfig::from_yaml_str("parameters: [1, 2"), Err(SimError::Configuration(_))));
    }
}
