use std::time::Instant;

use crate::error::Result;
use crate::simulation::forces::{Acceleration, BarnesHutGravity, DirectGravity};
use crate::simulation::octree::Octree;
use crate::simulation::states::{NVec3, Particle};

const G: f64 = 1.0;
const EPS: f64 = 0.05;

/// One row of the direct vs Barnes–Hut timing table
#[derive(Debug, Clone)]
pub struct TimingRow {
    pub n: usize,
    pub direct_ms: f64,
    pub tree_ms: f64,
}

/// One row of the opening-angle sweep
#[derive(Debug, Clone)]
pub struct ThetaRow {
    pub theta: f64,
    pub mean_rel_error: f64, // mean |a_bh - a_direct| / |a_direct|
    pub mean_interactions: f64, // point-mass evaluations per particle
}

/// Helper to build `n` unit-mass particles at deterministic positions,
/// no rand needed
pub fn make_particles(n: usize) -> Vec<Particle> {
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            let x = NVec3::new(
                (i_f * 0.37).sin() * 1.5,
                (i_f * 0.13).cos() * 1.5,
                (i_f * 0.07).sin() * 1.5,
            );
            Particle::new(x, NVec3::zeros())
        })
        .collect()
}

/// Time one force evaluation of each model for a range of `n`
pub fn bench_gravity(ns: &[usize], theta: f64) -> Result<Vec<TimingRow>> {
    let direct = DirectGravity { g: G, eps: EPS };
    let bh = BarnesHutGravity {
        g: G,
        eps: EPS,
        theta,
        parallel: true,
    };

    let mut rows = Vec::with_capacity(ns.len());
    for &n in ns {
        let particles = make_particles(n);

        // Warm up
        direct.accelerations(&particles)?;
        bh.accelerations(&particles)?;

        let t0 = Instant::now();
        direct.accelerations(&particles)?;
        let direct_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let t1 = Instant::now();
        bh.accelerations(&particles)?;
        let tree_ms = t1.elapsed().as_secs_f64() * 1000.0;

        log::debug!("N = {n}: direct {direct_ms:.3} ms, BH {tree_ms:.3} ms");
        rows.push(TimingRow { n, direct_ms, tree_ms });
    }
    Ok(rows)
}

/// Accuracy and cost of the tree walk for each `theta`, against the direct sum
pub fn bench_theta(n: usize, thetas: &[f64]) -> Result<Vec<ThetaRow>> {
    let particles = make_particles(n);
    let exact = DirectGravity { g: G, eps: EPS }.accelerations(&particles)?;
    let tree = Octree::build(&particles)?;

    let rows = thetas
        .iter()
        .map(|&theta| {
            let mut err = 0.0;
            let mut interactions = 0usize;
            for (i, a_exact) in exact.iter().enumerate() {
                let a = tree.compute_force_on(i, &particles, theta, G, EPS);
                err += (a - a_exact).norm() / a_exact.norm().max(f64::MIN_POSITIVE);
                interactions += tree.interactions_for(i, &particles, theta, G, EPS);
            }
            ThetaRow {
                theta,
                mean_rel_error: err / n as f64,
                mean_interactions: interactions as f64 / n as f64,
            }
        })
        .collect();
    Ok(rows)
}

/// Paste output directly into a spreadsheet to graph
pub fn print_timings(rows: &[TimingRow]) {
    println!("N,direct_ms,bh_ms");
    for row in rows {
        println!("{},{:.6},{:.6}", row.n, row.direct_ms, row.tree_ms);
    }
}

pub fn print_theta_sweep(rows: &[ThetaRow]) {
    println!("theta,mean_rel_error,mean_interactions");
    for row in rows {
        println!("{:.2},{:.6e},{:.1}", row.theta, row.mean_rel_error, row.mean_interactions);
    }
}
