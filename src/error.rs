//! Error types for bhgalaxy.
//!
//! Configuration problems are reported when a simulation is constructed,
//! never from inside the step loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("particle count must be positive")]
    NoParticles,

    #[error("particle count mismatch: configured {expected}, got {actual}")]
    ParticleCountMismatch { expected: usize, actual: usize },

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("softening length must be positive and finite, got {0}")]
    InvalidSoftening(f64),

    #[error("opening angle must be non-negative and finite, got {0}")]
    InvalidTheta(f64),

    #[error("gravitational constant must be non-negative and finite, got {0}")]
    InvalidGravity(f64),

    #[error("galaxy radius must be positive and finite, got {0}")]
    InvalidRadius(f64),

    #[error("particle {index} has invalid mass {mass}")]
    InvalidMass { index: usize, mass: f64 },

    #[error("particle {0} has a non-finite position or velocity")]
    NonFinite(usize),

    #[error("particle {0} lies outside the octree root cell")]
    OutOfBounds(usize),

    #[error("simulation has no particles yet")]
    Uninitialized,

    #[error("simulation already completed")]
    Completed,

    #[error("simulation stopped after a failed step")]
    Failed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
