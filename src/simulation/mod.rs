pub mod states;
pub mod params;
pub mod engine;
pub mod octree;
pub mod forces;
pub mod integrator;
pub mod generator;
pub mod diagnostics;
pub mod recorder;
pub mod driver;
