//! Global conserved quantities and run summaries
//!
//! Energy uses the same softened potential as the force models,
//! `-G m_i m_j / sqrt(|r|^2 + eps^2)`, so a symplectic integrator keeps it
//! bounded. All sums are sequential and in particle order.

use std::fmt;
use std::time::Duration;

use crate::simulation::states::{NVec3, Particle};

pub fn total_mass(particles: &[Particle]) -> f64 {
    particles.iter().map(|p| p.m).sum()
}

/// Sum of `m v` over all particles
pub fn total_momentum(particles: &[Particle]) -> NVec3 {
    particles.iter().fold(NVec3::zeros(), |acc, p| acc + p.momentum())
}

pub fn kinetic_energy(particles: &[Particle]) -> f64 {
    particles.iter().map(|p| 0.5 * p.m * p.v.norm_squared()).sum()
}

/// Softened pairwise potential energy, `O(N²)`
pub fn potential_energy(particles: &[Particle], g: f64, eps: f64) -> f64 {
    let eps2 = eps * eps;
    let mut pe = 0.0;
    for (i, pi) in particles.iter().enumerate() {
        for pj in &particles[i + 1..] {
            let r = (pi.x - pj.x).norm_squared() + eps2;
            pe -= g * pi.m * pj.m / r.sqrt();
        }
    }
    pe
}

pub fn total_energy(particles: &[Particle], g: f64, eps: f64) -> f64 {
    kinetic_energy(particles) + potential_energy(particles, g, eps)
}

/// Snapshot of the conserved quantities at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub mass: f64,
    pub momentum: NVec3,
    pub energy: f64,
}

impl Diagnostics {
    pub fn measure(particles: &[Particle], g: f64, eps: f64) -> Self {
        Self {
            mass: total_mass(particles),
            momentum: total_momentum(particles),
            energy: total_energy(particles, g, eps),
        }
    }
}

/// Before/after comparison for one `Simulation::run`
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: usize,
    pub start: Diagnostics,
    pub end: Diagnostics,
    pub elapsed: Duration,
}

impl RunReport {
    /// Absolute momentum change per axis
    pub fn momentum_drift(&self) -> NVec3 {
        (self.end.momentum - self.start.momentum).abs()
    }

    /// Momentum change per axis relative to the initial momentum magnitude.
    /// `None` when the system started at rest.
    pub fn relative_momentum_drift(&self) -> Option<NVec3> {
        let p0 = self.start.momentum.norm();
        if p0 > 0.0 {
            Some(self.momentum_drift() / p0)
        } else {
            None
        }
    }

    /// Signed energy change `E_end - E_start`
    pub fn energy_drift(&self) -> f64 {
        self.end.energy - self.start.energy
    }

    pub fn relative_energy_drift(&self) -> Option<f64> {
        let e0 = self.start.energy.abs();
        if e0 > 0.0 {
            Some(self.energy_drift().abs() / e0)
        } else {
            None
        }
    }

    pub fn mass_drift(&self) -> f64 {
        self.end.mass - self.start.mass
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p0 = self.start.momentum;
        let p1 = self.end.momentum;
        writeln!(
            f,
            "Momentum: ({:.6e}, {:.6e}, {:.6e}) -> ({:.6e}, {:.6e}, {:.6e})",
            p0.x, p0.y, p0.z, p1.x, p1.y, p1.z
        )?;
        if let Some(rel) = self.relative_momentum_drift() {
            writeln!(f, "Relative change: ({:.3e}, {:.3e}, {:.3e})", rel.x, rel.y, rel.z)?;
        }
        writeln!(
            f,
            "Energy: {:.6} -> {:.6} (drift {:+.6e})",
            self.start.energy,
            self.end.energy,
            self.energy_drift()
        )?;
        write!(
            f,
            "Simulation time: {:.2} s for {} steps",
            self.elapsed.as_secs_f64(),
            self.steps
        )
    }
}
