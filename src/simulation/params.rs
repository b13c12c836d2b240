//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - integration step size `dt`,
//! - softening length and gravitational constant (`eps`, `g`)

use crate::configuration::config::ParametersConfig;
use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub dt: f64, // step size
    pub eps: f64, // softening length
    pub g: f64, // gravitational constant
}

impl TryFrom<&ParametersConfig> for Parameters {
    type Error = SimError;

    fn try_from(cfg: &ParametersConfig) -> Result<Self> {
        if !cfg.dt.is_finite() || cfg.dt <= 0.0 {
            return Err(SimError::InvalidTimeStep(cfg.dt));
        }
        // eps > 0 keeps the softened distance strictly positive for coincident particles
        if !cfg.eps.is_finite() || cfg.eps <= 0.0 {
            return Err(SimError::InvalidSoftening(cfg.eps));
        }
        if !cfg.g.is_finite() || cfg.g < 0.0 {
            return Err(SimError::InvalidGravity(cfg.g));
        }

        Ok(Self {
            dt: cfg.dt,
            eps: cfg.eps,
            g: cfg.g,
        })
    }
}
