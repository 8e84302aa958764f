//! Error taxonomy for the simulation core
//!
//! Every failure is fatal for the run that raised it. The only retry in the
//! crate is the bed generator's bounded layer advancement, which is part of
//! the placement algorithm and never surfaces here unless it runs out of room.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    /// A particle left the finite range or tripped the lateral bound guard
    #[error("numerical divergence at step {step} (t = {time:.6} s), particle {particle_id}: {reason}")]
    NumericalDivergence {
        step: u64,
        time: f64,
        particle_id: u32,
        reason: String,
    },

    /// The bed generator could not place every requested particle
    #[error("generation starvation: placed {placed} of {requested} particles after {attempts} attempts")]
    GenerationStarvation {
        placed: usize,
        requested: usize,
        attempts: u64,
    },

    /// Checkpoint or trajectory I/O failure
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// A checkpoint line that does not decode into a particle
    #[error("checkpoint format error on line {line}: {source}")]
    CheckpointFormat {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Physically invalid inputs, rejected before any work starts
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SimError {
    /// Shorthand for building a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    /// True when the failure comes from the numerical state, not the inputs
    pub fn is_divergence(&self) -> bool {
        matches!(self, SimError::NumericalDivergence { .. })
    }
}
