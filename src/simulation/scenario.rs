//! Build a fully-initialized cannonball scenario from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces the runtime bundle
//! `Scenario` containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the five box walls
//! - the bed recipe (`BedSpec`), the projectile launch and the settling rule
//!
//! A scenario runs in two phases. `stabilize` lets a generated bed settle
//! under gravity until its kinetic energy plateaus, `impact` injects the
//! projectile (id 0) and runs to the hard cutoff time.

use log::info;

use crate::configuration::config::ScenarioConfig;
use crate::error::{Result, SimError};
use crate::output::trajectory::FrameSink;
use super::driver::{RunOutcome, SimulationDriver};
use super::engine::Engine;
use super::generator::{BedGenerator, BedSpec};
use super::params::Parameters;
use super::states::{box_walls, ContactParams, Particle, Wall, PROJECTILE_ID};
use super::termination::{EnergyPlateau, TerminationPolicy};
use super::vector::NVec3;

/// Cannonball launch in runtime units
#[derive(Debug, Clone)]
pub struct ProjectileLaunch {
    pub radius: f64,
    pub mass: f64,
    pub angle: f64, // radians below the horizontal
    pub speed: f64,
    pub height: f64,
    pub contact: ContactParams,
}

/// Stop rule of the settling pass
#[derive(Debug, Clone)]
pub struct StabilizationRule {
    pub energy_threshold: f64,
    pub window: usize,
    pub minimum_time: f64,
    pub cutoff_time: f64,
    pub bounds_limit: f64,
}

/// Runtime bundle constructed from a [`ScenarioConfig`]
#[derive(Debug, Clone)]
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub box_size: NVec3,
    pub walls: Vec<Wall>,
    pub bed: BedSpec,
    pub projectile: ProjectileLaunch,
    pub stabilization: StabilizationRule,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        cfg.validate()?;

        let box_size = cfg.box_size();
        let walls = box_walls(&box_size, cfg.walls.contact.to_params())?;

        let p_cfg = &cfg.projectile;
        let projectile = ProjectileLaunch {
            radius: p_cfg.diameter / 2.0,
            mass: p_cfg.mass,
            angle: p_cfg.angle_deg.to_radians(),
            speed: p_cfg.speed,
            height: p_cfg.height,
            contact: p_cfg.contact.to_params(),
        };

        let s_cfg = &cfg.stabilization;
        let stabilization = StabilizationRule {
            energy_threshold: s_cfg.energy_threshold,
            window: s_cfg.window,
            minimum_time: s_cfg.minimum_time,
            cutoff_time: s_cfg.cutoff_time,
            bounds_limit: s_cfg.bounds_limit,
        };

        Ok(Self {
            engine: cfg.engine(),
            parameters: cfg.parameters(),
            box_size,
            walls,
            bed: cfg.bed_spec(),
            projectile,
            stabilization,
        })
    }

    /// Fresh bed at rest, ids 1..=count
    pub fn generate_bed(&self) -> Result<Vec<Particle>> {
        let mut generator = BedGenerator::new(self.bed.clone(), &self.walls, self.parameters.seed)?;
        generator.generate()
    }

    /// Cannonball centred over the box at the launch height
    pub fn make_projectile(&self) -> Result<Particle> {
        let launch = &self.projectile;
        let x = NVec3::new(self.box_size.x / 2.0, self.box_size.y / 2.0, launch.height);
        let v = NVec3::new(0.0, -launch.speed * launch.angle.cos(), -launch.speed * launch.angle.sin());
        Particle::new(PROJECTILE_ID, x, v, launch.radius, launch.mass, launch.contact)
    }

    /// Append the projectile to a settled bed
    pub fn inject_projectile(&self, mut bed: Vec<Particle>) -> Result<Vec<Particle>> {
        if bed.iter().any(Particle::is_projectile) {
            return Err(SimError::config(format!(
                "bed already holds a particle with the projectile id {PROJECTILE_ID}"
            )));
        }
        bed.push(self.make_projectile()?);
        Ok(bed)
    }

    pub fn stabilization_policy(&self) -> TerminationPolicy {
        let s = &self.stabilization;
        TerminationPolicy::stabilization(
            s.cutoff_time,
            s.bounds_limit,
            EnergyPlateau::new(s.energy_threshold, s.window, s.minimum_time),
        )
    }

    pub fn impact_policy(&self) -> TerminationPolicy {
        TerminationPolicy::impact(self.parameters.t_end, self.stabilization.bounds_limit)
    }

    fn driver(&self) -> Result<SimulationDriver> {
        SimulationDriver::new(&self.parameters, &self.engine, self.walls.clone(), self.box_size)
    }

    /// Let the bed settle under gravity
    pub fn stabilize(&self, bed: Vec<Particle>, sink: &mut dyn FrameSink) -> Result<RunOutcome> {
        info!("stabilizing {} particles", bed.len());
        let mut policy = self.stabilization_policy();
        self.driver()?.run(bed, &mut policy, sink)
    }

    /// Fire the projectile into a settled bed
    pub fn impact(&self, bed: Vec<Particle>, sink: &mut dyn FrameSink) -> Result<RunOutcome> {
        let particles = self.inject_projectile(bed)?;
        info!(
            "impact: projectile r = {} m, m = {} kg, {} m/s at {:.1} deg",
            self.projectile.radius,
            self.projectile.mass,
            self.projectile.speed,
            self.projectile.angle.to_degrees()
        );
        let mut policy = self.impact_policy();
        self.driver()?.run(particles, &mut policy, sink)
    }
}
