//! Core state types for the galaxy simulation.
//!
//! - `Particle` – a point mass using `NVec3` position/velocity
//! - `Galaxy`   – the particle collection plus the current simulation time `t`

use nalgebra::Vector3;
pub type NVec3 = Vector3<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: NVec3, // position
    pub v: NVec3, // velocity
    pub m: f64, // mass
}

impl Particle {
    /// Unit-mass particle
    pub fn new(x: NVec3, v: NVec3) -> Self {
        Self { x, v, m: 1.0 }
    }

    pub fn with_mass(mut self, m: f64) -> Self {
        self.m = m;
        self
    }

    /// Linear momentum `m v`
    pub fn momentum(&self) -> NVec3 {
        self.m * self.v
    }

    pub fn is_finite(&self) -> bool {
        self.x.iter().chain(self.v.iter()).all(|c| c.is_finite())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Galaxy {
    pub particles: Vec<Particle>, // collection of particles, index-aligned with acceleration buffers
    pub t: f64, // time
}

impl Galaxy {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles, t: 0.0 }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Ordered `(x, y, z)` snapshot of every particle, as handed to recorders
    pub fn positions(&self) -> Vec<NVec3> {
        self.particles.iter().map(|p| p.x).collect()
    }
}
