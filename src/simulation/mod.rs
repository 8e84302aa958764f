pub mod vector;
pub mod states;
pub mod params;
pub mod engine;
pub mod spatial_index;
pub mod generator;
pub mod forces;
pub mod integrator;
pub mod termination;
pub mod driver;
pub mod scenario;
