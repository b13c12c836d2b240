//! High-level runtime engine settings
//!
//! Selects force mode, integrator, and Barnes–Hut options
//! used when building and running a `Simulation`

use crate::configuration::config::{EngineConfig, ForceMode, IntegratorKind};
use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct Engine {
    pub mode: ForceMode, // direct or barnes-hut tree
    pub integrator: IntegratorKind, // euler or leapfrog
    pub theta: f64, // parameter to determine if use center of mass
    pub parallel: bool, // parallel tree queries
}

impl TryFrom<&EngineConfig> for Engine {
    type Error = SimError;

    fn try_from(cfg: &EngineConfig) -> Result<Self> {
        if !cfg.theta.is_finite() || cfg.theta < 0.0 {
            return Err(SimError::InvalidTheta(cfg.theta));
        }

        Ok(Self {
            mode: cfg.mode,
            integrator: cfg.integrator,
            theta: cfg.theta,
            parallel: cfg.parallel,
        })
    }
}
