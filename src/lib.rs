pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Result, SimError};

pub use simulation::states::{Particle, Galaxy, NVec3};
pub use simulation::octree::{Octree, OctreeNode, MIN_HALF_SIZE, ROOT_HALF_SIZE};
pub use simulation::forces::{Acceleration, DirectGravity, BarnesHutGravity};
pub use simulation::integrator::{euler_step, leapfrog_step};
pub use simulation::generator::generate_spiral_galaxy;
pub use simulation::diagnostics::{Diagnostics, RunReport, total_energy, total_momentum, total_mass};
pub use simulation::recorder::{Recorder, FrameRecorder};
pub use simulation::driver::{Simulation, SimState};

pub use configuration::config::{ForceMode, IntegratorKind, EngineConfig, ParametersConfig, GalaxyConfig, BodyConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_gravity, bench_theta, print_timings, print_theta_sweep};
