//! Initial conditions: a single-arm spiral disk
//!
//! Particles are spread over a disk of the given radius with a small
//! Gaussian thickness, and given a tangential speed derived from a
//! fictitious central mass equal to the particle count. The layout is a
//! fixed formula; all randomness comes from the caller's RNG, so a seeded
//! RNG gives a reproducible galaxy.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, SimError};
use crate::simulation::states::{NVec3, Particle};

const ARM_WINDING: f64 = 4.0; // radians of arm angle per unit radius
const ANGLE_JITTER: f64 = 0.2;
const DISK_THICKNESS: f64 = 0.05; // std dev of z
const VERTICAL_SPEED: f64 = 0.01; // std dev of vz
const CORE_RADIUS: f64 = 0.01; // keeps the orbital speed finite at r = 0

/// Generate `count` unit-mass particles in a spiral disk of `radius`.
///
/// For each particle:
/// - `r = sqrt(u) * radius` with `u ~ U(0, 1)` (uniform surface density)
/// - `angle = 4 r + U(-0.2, 0.2)`
/// - `z ~ N(0, 0.05)`, `vz ~ N(0, 0.01)`
/// - tangential speed `sqrt(G * count / (r + 0.01))`
///
/// # Errors
/// [`SimError::NoParticles`] for `count == 0`, [`SimError::InvalidRadius`]
/// for a non-positive or non-finite radius.
pub fn generate_spiral_galaxy<R: Rng>(
    count: usize,
    radius: f64,
    g: f64,
    rng: &mut R,
) -> Result<Vec<Particle>> {
    if count == 0 {
        return Err(SimError::NoParticles);
    }
    if !radius.is_finite() || radius <= 0.0 {
        return Err(SimError::InvalidRadius(radius));
    }

    let central_mass = count as f64;
    let mut particles = Vec::with_capacity(count);

    for _ in 0..count {
        let r = rng.gen::<f64>().sqrt() * radius;
        let angle = r * ARM_WINDING + rng.gen_range(-ANGLE_JITTER..ANGLE_JITTER);
        let (sin, cos) = angle.sin_cos();

        let z: f64 = StandardNormal.sample(rng);
        let x = NVec3::new(r * cos, r * sin, DISK_THICKNESS * z);

        let v_mag = (g * central_mass / (r + CORE_RADIUS)).sqrt();
        let vz: f64 = StandardNormal.sample(rng);
        let v = NVec3::new(-v_mag * sin, v_mag * cos, VERTICAL_SPEED * vz);

        particles.push(Particle::new(x, v));
    }

    log::debug!("generated spiral galaxy: {} particles, radius {}", count, radius);
    Ok(particles)
}
