//! Force / acceleration models for the galaxy simulation
//!
//! Both gravity models implement [`Acceleration`] and are interchangeable:
//! - [`DirectGravity`]: exact pairwise sum, `O(N²)`
//! - [`BarnesHutGravity`]: octree approximation controlled by `theta`

use rayon::prelude::*;

use crate::configuration::config::ForceMode;
use crate::error::Result;
use crate::simulation::engine::Engine;
use crate::simulation::octree::Octree;
use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec3, Particle};

/// Trait for acceleration sources operating on a particle slice.
/// Implementations add their contribution into `out[i]` for each particle;
/// they never mutate the particles.
pub trait Acceleration {
    fn acceleration(&self, particles: &[Particle], out: &mut [NVec3]) -> Result<()>;

    /// Fresh zeroed buffer with this model's accelerations, index-aligned
    /// with `particles`
    fn accelerations(&self, particles: &[Particle]) -> Result<Vec<NVec3>> {
        let mut out = vec![NVec3::zeros(); particles.len()];
        self.acceleration(particles, &mut out)?;
        Ok(out)
    }
}

/// Newtonian gravity with Plummer softening (direct n^2 sum)
#[derive(Debug, Clone, Copy)]
pub struct DirectGravity {
    pub g: f64, // gravitational constant
    pub eps: f64, // softening length
}

impl Acceleration for DirectGravity {
    fn acceleration(&self, particles: &[Particle], out: &mut [NVec3]) -> Result<()> {
        let n = particles.len();
        let eps2 = self.eps * self.eps;

        // Loop over each unordered pair (i, j) with i < j
        for i in 0..n {
            let xi = particles[i].x;
            let mi = particles[i].m;

            for j in (i + 1)..n {
                let xj = particles[j].x;
                let mj = particles[j].m;

                // r points from i to j: i is pulled along +r, j along -r
                let r = xj - xi;

                // softened distance |r_soft| = sqrt(|r|^2 + eps^2)
                let dist = (r.norm_squared() + eps2).sqrt();

                // coef = G / |r_soft|^3
                let coef = self.g / (dist * dist * dist);

                // Equal and opposite:
                // a_i +=  G * m_j * r / |r_soft|^3
                // a_j += -G * m_i * r / |r_soft|^3
                out[i] += coef * mj * r;
                out[j] -= coef * mi * r;
            }
        }
        Ok(())
    }
}

/// Newtonian gravity evaluated via a Barnes–Hut octree
///
/// A fresh [`Octree`] is built from the particles on every call, finalized,
/// and then queried once per particle. With `parallel` set, the queries run
/// on the rayon pool; the tree is read-only for the whole batch.
#[derive(Debug, Clone, Copy)]
pub struct BarnesHutGravity {
    pub g: f64,
    pub eps: f64,
    pub theta: f64, // opening-angle threshold
    pub parallel: bool,
}

impl Acceleration for BarnesHutGravity {
    fn acceleration(&self, particles: &[Particle], out: &mut [NVec3]) -> Result<()> {
        let tree = Octree::build(particles)?;

        if self.parallel {
            out.par_iter_mut().enumerate().for_each(|(i, a)| {
                *a += tree.compute_force_on(i, particles, self.theta, self.g, self.eps);
            });
        } else {
            for (i, a) in out.iter_mut().enumerate() {
                *a += tree.compute_force_on(i, particles, self.theta, self.g, self.eps);
            }
        }
        Ok(())
    }
}

/// Gravity model selected by the engine's force mode
pub fn gravity_for(engine: &Engine, params: &Parameters) -> Box<dyn Acceleration + Send + Sync> {
    match engine.mode {
        ForceMode::Direct => Box::new(DirectGravity {
            g: params.g,
            eps: params.eps,
        }),
        ForceMode::Tree => Box::new(BarnesHutGravity {
            g: params.g,
            eps: params.eps,
            theta: engine.theta,
            parallel: engine.parallel,
        }),
    }
}
