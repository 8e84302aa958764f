pub mod error;
pub mod simulation;
pub mod configuration;
pub mod output;
pub mod benchmark;

pub use error::{Result, SimError};

pub use simulation::vector::{NVec3, VectorExt};
pub use simulation::states::{box_walls, total_kinetic_energy, ContactParams, Particle, Wall, WallId, PROJECTILE_ID};
pub use simulation::params::Parameters;
pub use simulation::engine::{Engine, NeighborSearch};
pub use simulation::spatial_index::SpatialIndex;
pub use simulation::generator::{BedGenerator, BedSpec, MassLaw};
pub use simulation::forces::{ContactForce, ContactForceModel};
pub use simulation::integrator::BeemanIntegrator;
pub use simulation::termination::{EnergyPlateau, StopReason, TerminationPolicy, Verdict};
pub use simulation::driver::{RunOutcome, SimulationDriver};
pub use simulation::scenario::{ProjectileLaunch, Scenario, StabilizationRule};

pub use configuration::config::{
    BedConfig, ContactConfig, EngineConfig, OutputConfig, ParametersConfig, ProjectileConfig, ScenarioConfig,
    StabilizationConfig, WallsConfig,
};

pub use output::checkpoint;
pub use output::trajectory::{FrameSink, NullSink, XyzWriter, FRAME_HEADER};

pub use benchmark::benchmark::bench_neighbor_search;
