//! Fixed-step time integrators for the galaxy
//!
//! Provides semi-implicit Euler and kick-drift-kick leapfrog, both driven by
//! an [`Acceleration`] model. Integrators are the only code that mutates
//! particle positions and velocities.

use super::forces::Acceleration;
use super::states::Galaxy;
use crate::configuration::config::IntegratorKind;
use crate::error::Result;

impl IntegratorKind {
    /// Advance `galaxy` by one step of size `dt` with this scheme
    pub fn advance(&self, galaxy: &mut Galaxy, forces: &dyn Acceleration, dt: f64) -> Result<()> {
        match self {
            IntegratorKind::Euler => euler_step(galaxy, forces, dt),
            IntegratorKind::Leapfrog => leapfrog_step(galaxy, forces, dt),
        }
    }

    /// Force evaluations per step
    pub fn evaluations_per_step(&self) -> usize {
        match self {
            IntegratorKind::Euler => 1,
            IntegratorKind::Leapfrog => 2,
        }
    }
}

/// Advance the galaxy by one step using semi-implicit Euler.
/// Velocities are updated with the current acceleration first, then
/// positions with the new velocities. One force evaluation per step.
pub fn euler_step(galaxy: &mut Galaxy, forces: &dyn Acceleration, dt: f64) -> Result<()> {
    if galaxy.is_empty() {
        return Ok(());
    }

    // a_n from x_n
    let a = forces.accelerations(&galaxy.particles)?;

    // v_n+1 = v_n + dt * a_n
    // x_n+1 = x_n + dt * v_n+1
    for (p, a) in galaxy.particles.iter_mut().zip(a.iter()) {
        p.v += dt * *a;
        p.x += dt * p.v;
    }

    galaxy.t += dt;
    Ok(())
}

/// Advance the galaxy by one step using kick-drift-kick leapfrog.
/// Uses two force evaluations per step and updates positions, velocities,
/// and `galaxy.t` in-place.
///
/// If the second force evaluation fails the galaxy is left mid-step (half
/// kick and drift applied, `t` advanced) and must not be stepped again.
pub fn leapfrog_step(galaxy: &mut Galaxy, forces: &dyn Acceleration, dt: f64) -> Result<()> {
    if galaxy.is_empty() {
        return Ok(());
    }
    let half_dt = 0.5 * dt; // half step dt/2

    // a_n from x_n
    let a_old = forces.accelerations(&galaxy.particles)?;

    // Kick: v_n+1/2 = v_n + (dt/2) * a_n
    for (p, a) in galaxy.particles.iter_mut().zip(a_old.iter()) {
        p.v += half_dt * *a;
    }

    // Drift: x_n+1 = x_n + dt * v_n+1/2
    for p in galaxy.particles.iter_mut() {
        p.x += dt * p.v;
    }

    galaxy.t += dt;

    // a_n+1 from x_n+1
    let a_new = forces.accelerations(&galaxy.particles)?;

    // Second kick: v_n+1 = v_n+1/2 + (dt/2) * a_n+1
    for (p, a) in galaxy.particles.iter_mut().zip(a_new.iter()) {
        p.v += half_dt * *a;
    }
    Ok(())
}
