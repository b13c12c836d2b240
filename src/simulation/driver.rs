//! Simulation driver
//!
//! Turns a [`ScenarioConfig`] into a runnable [`Simulation`] bundling:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - galaxy state (`Galaxy`, particles at t = 0)
//! - the active gravity model (direct or Barnes–Hut)
//! - an optional recorder receiving a position snapshot after each step
//!
//! Lifecycle: `Uninitialized` → `Ready` (particles loaded) →
//! `Stepping` → `Ready` → … → `Completed` after [`Simulation::run`].
//! A step that returns an error leaves the galaxy partially advanced, so the
//! simulation moves to `Failed` and refuses further steps.

use std::fmt;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::configuration::config::ScenarioConfig;
use crate::error::{Result, SimError};
use crate::simulation::diagnostics::{Diagnostics, RunReport};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{gravity_for, Acceleration};
use crate::simulation::generator::generate_spiral_galaxy;
use crate::simulation::params::Parameters;
use crate::simulation::recorder::Recorder;
use crate::simulation::states::{Galaxy, Particle};

/// Relative energy drift above which a run logs a warning
const ENERGY_DRIFT_WARN: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Uninitialized, // configured, no particles yet
    Ready, // particles loaded, between steps
    Stepping, // inside step()
    Completed, // a full run() finished; terminal
    Failed, // a step errored mid-update; terminal
}

pub struct Simulation {
    engine: Engine,
    parameters: Parameters,
    num_particles: usize,
    radius: f64,
    galaxy: Galaxy,
    forces: Box<dyn Acceleration + Send + Sync>,
    recorder: Option<Box<dyn Recorder>>,
    state: SimState,
}

// forces and recorder are trait objects; report the rest
impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("parameters", &self.parameters)
            .field("num_particles", &self.num_particles)
            .field("radius", &self.radius)
            .field("t", &self.galaxy.t)
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}

impl Simulation {
    /// Validate `cfg` and build an unpopulated simulation.
    ///
    /// If the scenario lists explicit `bodies` they are loaded right away and
    /// the simulation starts `Ready`; otherwise it is `Uninitialized` until
    /// [`Simulation::populate`] or [`Simulation::with_particles`].
    ///
    /// # Errors
    /// Any invalid setting (particle count, `dt`, `eps`, `theta`, `G`,
    /// radius, or an invalid explicit body) fails here rather than mid-run.
    pub fn new(cfg: &ScenarioConfig) -> Result<Self> {
        let engine = Engine::try_from(&cfg.engine)?;
        let parameters = Parameters::try_from(&cfg.parameters)?;

        let num_particles = cfg.particle_count();
        if num_particles == 0 {
            return Err(SimError::NoParticles);
        }
        let radius = cfg.galaxy.radius;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SimError::InvalidRadius(radius));
        }

        let forces = gravity_for(&engine, &parameters);

        let mut sim = Self {
            engine,
            parameters,
            num_particles,
            radius,
            galaxy: Galaxy::default(),
            forces,
            recorder: None,
            state: SimState::Uninitialized,
        };

        if let Some(particles) = cfg.explicit_particles() {
            sim.load(particles)?;
        }
        Ok(sim)
    }

    /// [`Simulation::new`], then generate the galaxy if no explicit bodies
    /// were given, seeded from `parameters.seed` (entropy when absent)
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self> {
        let mut sim = Self::new(cfg)?;
        if sim.state == SimState::Uninitialized {
            let mut rng = match cfg.parameters.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            sim.populate(&mut rng)?;
        }
        Ok(sim)
    }

    /// Generate the spiral galaxy from `rng` and move to `Ready`
    pub fn populate<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let particles = generate_spiral_galaxy(self.num_particles, self.radius, self.parameters.g, rng)?;
        self.load(particles)
    }

    /// Use `particles` as the initial state
    pub fn with_particles(mut self, particles: Vec<Particle>) -> Result<Self> {
        self.load(particles)?;
        Ok(self)
    }

    /// Attach a recorder; it receives one frame after every successful step
    pub fn attach_recorder(&mut self, recorder: Box<dyn Recorder>) {
        self.recorder = Some(recorder);
    }

    pub fn take_recorder(&mut self) -> Option<Box<dyn Recorder>> {
        self.recorder.take()
    }

    /// Advance by exactly one step of the configured integrator / force mode.
    ///
    /// # Errors
    /// - [`SimError::Uninitialized`] before particles are loaded
    /// - [`SimError::Completed`] after a full run
    /// - [`SimError::Failed`] after an earlier step errored
    /// - [`SimError::NonFinite`] if the state diverged; the simulation is
    ///   `Failed` afterwards
    pub fn step(&mut self) -> Result<()> {
        self.ensure_runnable()?;

        self.state = SimState::Stepping;
        let advanced = self.engine.integrator.advance(
            &mut self.galaxy,
            self.forces.as_ref(),
            self.parameters.dt,
        );
        if let Err(e) = advanced {
            log::error!("step failed at t = {:.4}: {}", self.galaxy.t, e);
            self.state = SimState::Failed;
            return Err(e);
        }
        self.state = SimState::Ready;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.add_frame(&self.galaxy.positions());
        }
        Ok(())
    }

    /// Run `iterations` steps, measuring momentum and energy before and
    /// after. The simulation is `Completed` afterwards.
    pub fn run(&mut self, iterations: usize) -> Result<RunReport> {
        self.ensure_runnable()?;

        log::info!(
            "running {} steps: {} particles, {:?} forces, {:?} integrator, dt = {}",
            iterations,
            self.galaxy.len(),
            self.engine.mode,
            self.engine.integrator,
            self.parameters.dt
        );

        let start = self.diagnostics();
        let t0 = Instant::now();

        for i in 0..iterations {
            self.step()?;
            log::debug!("step {}/{} done, t = {:.4}", i + 1, iterations, self.galaxy.t);
        }

        let elapsed = t0.elapsed();
        let end = self.diagnostics();
        self.state = SimState::Completed;

        let report = RunReport {
            steps: iterations,
            start,
            end,
            elapsed,
        };

        log::info!(
            "run finished in {:.3} s, energy drift {:+.3e}",
            elapsed.as_secs_f64(),
            report.energy_drift()
        );
        if let Some(rel) = report.relative_energy_drift() {
            if rel > ENERGY_DRIFT_WARN {
                log::warn!("relative energy drift {:.3e} exceeds {}", rel, ENERGY_DRIFT_WARN);
            }
        }
        Ok(report)
    }

    /// Mass, momentum, and softened energy of the current state
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::measure(&self.galaxy.particles, self.parameters.g, self.parameters.eps)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.galaxy.particles
    }

    pub fn galaxy(&self) -> &Galaxy {
        &self.galaxy
    }

    pub fn time(&self) -> f64 {
        self.galaxy.t
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    // helpers ==============================================================================

    fn ensure_runnable(&self) -> Result<()> {
        match self.state {
            SimState::Uninitialized => Err(SimError::Uninitialized),
            SimState::Completed => Err(SimError::Completed),
            SimState::Failed => Err(SimError::Failed),
            SimState::Ready | SimState::Stepping => Ok(()),
        }
    }

    fn load(&mut self, particles: Vec<Particle>) -> Result<()> {
        match self.state {
            SimState::Completed => return Err(SimError::Completed),
            SimState::Failed => return Err(SimError::Failed),
            _ => {}
        }
        if particles.len() != self.num_particles {
            return Err(SimError::ParticleCountMismatch {
                expected: self.num_particles,
                actual: particles.len(),
            });
        }
        for (index, p) in particles.iter().enumerate() {
            if !p.m.is_finite() || p.m <= 0.0 {
                return Err(SimError::InvalidMass { index, mass: p.m });
            }
            if !p.is_finite() {
                return Err(SimError::NonFinite(index));
            }
        }

        self.galaxy = Galaxy::new(particles);
        self.state = SimState::Ready;
        Ok(())
    }
}
