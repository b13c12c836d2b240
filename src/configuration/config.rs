//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – force mode, integrator, Barnes–Hut options
//! - [`ParametersConfig`] – numerical parameters and physical constants
//! - [`GalaxyConfig`]     – size of the generated spiral disk
//! - [`BodyConfig`]       – optional explicit initial state per particle
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! Every field has a default and may be omitted (`{}` is a valid scenario).
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   mode: "tree"            # or "direct"
//!   integrator: "leapfrog"  # or "euler"
//!   theta: 0.5              # opening angle
//!   parallel: true          # parallel tree queries
//!
//! parameters:
//!   dt: 0.01                # fixed step size
//!   eps: 0.05               # softening length
//!   G: 1.0                  # gravitational constant
//!   steps: 100              # iterations for a full run
//!   seed: 42                # deterministic seed, omit for entropy
//!
//! galaxy:
//!   num_particles: 500
//!   radius: 1.0
//! ```
//!
//! When `bodies` is present it replaces the generated galaxy:
//!
//! ```yaml
//! bodies:
//!   - x: [ -0.5, 0.0, 0.0 ]
//!     v: [  0.0, 0.7, 0.0 ]
//!     m: 1.0
//!   - x: [  0.5, 0.0, 0.0 ]
//!     v: [  0.0, -0.7, 0.0 ]
//! ```
//!
//! Validation happens when the runtime [`Engine`](crate::simulation::engine::Engine)
//! and [`Parameters`](crate::simulation::params::Parameters) are built.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SimError};
use crate::simulation::states::{NVec3, Particle};

/// How accelerations are computed
/// `mode: "direct"` or `mode: "tree"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ForceMode {
    #[serde(rename = "direct")] // Exact pairwise sum, O(N^2)
    Direct,

    #[default]
    #[serde(rename = "tree")] // Barnes–Hut octree approximation, O(N log N)
    Tree,
}

/// Which integrator method used by the engine
/// `integrator: "euler"` or `integrator: "leapfrog"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IntegratorKind {
    #[default]
    #[serde(rename = "euler")] // Semi-implicit Euler, one force evaluation per step
    Euler,

    #[serde(rename = "leapfrog")] // Kick-drift-kick leapfrog, two force evaluations per step, symplectic
    Leapfrog,
}

/// High-level engine configuration
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ForceMode, // direct or Barnes–Hut tree
    pub integrator: IntegratorKind, // Time integrator used for advancing the system state
    pub theta: f64, // Nodes with size/distance below this are taken as a single mass at their com
    pub parallel: bool, // Distribute tree queries over the rayon pool
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ForceMode::Tree,
            integrator: IntegratorKind::Euler,
            theta: 0.5,
            parallel: true,
        }
    }
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ParametersConfig {
    pub dt: f64, // time step size
    pub eps: f64, // softening - prevent singular forces at very small separations
    #[serde(rename = "G")]
    pub g: f64, // gravitational constant
    pub steps: usize, // iterations for a full run
    pub seed: Option<u64>, // deterministic seed to make runs reproducible
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            eps: 0.05,
            g: 1.0,
            steps: 100,
            seed: None,
        }
    }
}

/// Generated spiral galaxy
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GalaxyConfig {
    pub num_particles: usize,
    pub radius: f64, // disk radius in normalized units
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        Self {
            num_particles: 100,
            radius: 1.0,
        }
    }
}

/// Configuration for a single particle's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: [f64; 3], // Initial position
    pub v: [f64; 3], // Initial velocity
    #[serde(default = "unit_mass")]
    pub m: f64, // Mass of the particle
}

fn unit_mass() -> f64 {
    1.0
}

impl From<&BodyConfig> for Particle {
    fn from(bc: &BodyConfig) -> Self {
        Particle::new(NVec3::from(bc.x), NVec3::from(bc.v)).with_mass(bc.m)
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub engine: EngineConfig, // Engine-level configuration
    pub parameters: ParametersConfig, // Global numerical and physical parameters
    pub galaxy: GalaxyConfig, // Generated initial state
    pub bodies: Vec<BodyConfig>, // Explicit initial state; replaces the galaxy when non-empty
}

impl ScenarioConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override the generated galaxy's particle count.
    ///
    /// # Errors
    /// [`SimError::ParticleCountMismatch`] if explicit `bodies` are listed
    /// and `n` differs from their number; the bodies decide the count.
    pub fn set_num_particles(&mut self, n: usize) -> Result<()> {
        if !self.bodies.is_empty() && n != self.bodies.len() {
            return Err(SimError::ParticleCountMismatch {
                expected: self.bodies.len(),
                actual: n,
            });
        }
        self.galaxy.num_particles = n;
        Ok(())
    }

    /// Number of particles the simulation will hold
    pub fn particle_count(&self) -> usize {
        if self.bodies.is_empty() {
            self.galaxy.num_particles
        } else {
            self.bodies.len()
        }
    }

    /// Explicit particles from `bodies`, if any were given
    pub fn explicit_particles(&self) -> Option<Vec<Particle>> {
        if self.bodies.is_empty() {
            None
        } else {
            Some(self.bodies.iter().map(Particle::from).collect())
        }
    }
}
