//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings shared by every phase:
//! - fixed integration step and trajectory save interval,
//! - hard cutoff time for the impact phase,
//! - gravitational acceleration and random seed

use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub dt: f64, // step size
    pub save_dt: f64, // time between trajectory frames
    pub t_end: f64, // hard cutoff time
    pub gravity: f64, // gravitational acceleration, pulls along -z
    pub seed: u64, // deterministic seed for bed generation
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(SimError::config(format!("time step must be positive, got {}", self.dt)));
        }
        if !(self.save_dt > 0.0) {
            return Err(SimError::config(format!("save interval must be positive, got {}", self.save_dt)));
        }
        if !(self.t_end > 0.0) {
            return Err(SimError::config(format!("cutoff time must be positive, got {}", self.t_end)));
        }
        if !(self.gravity >= 0.0) || !self.gravity.is_finite() {
            return Err(SimError::config(format!("gravity must be finite and non-negative, got {}", self.gravity)));
        }
        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dt: 5e-5,
            save_dt: 5e-3,
            t_end: 1.0,
            gravity: 9.81,
            seed: 42,
        }
    }
}
