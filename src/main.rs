use bhgalaxy::{bench_gravity, bench_theta, print_theta_sweep, print_timings};
use bhgalaxy::{ForceMode, IntegratorKind, ScenarioConfig, Simulation};

use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Barnes–Hut / direct N-body simulation of a spiral galaxy")]
struct Args {
    /// Scenario YAML; defaults are used when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[arg(short = 'n', long)]
    particles: Option<usize>,

    #[arg(short, long)]
    steps: Option<usize>,

    #[arg(long, value_enum)]
    mode: Option<ForceMode>,

    #[arg(long, value_enum)]
    integrator: Option<IntegratorKind>,

    #[arg(long)]
    theta: Option<f64>,

    #[arg(long)]
    dt: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Run the direct vs Barnes–Hut benchmark instead of a simulation
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario(args: &Args) -> Result<ScenarioConfig> {
    let mut cfg = match &args.file {
        Some(path) => ScenarioConfig::from_path(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };

    if let Some(n) = args.particles {
        cfg.set_num_particles(n)
            .context("--particles conflicts with the scenario's explicit bodies")?;
    }
    if let Some(steps) = args.steps {
        cfg.parameters.steps = steps;
    }
    if let Some(mode) = args.mode {
        cfg.engine.mode = mode;
    }
    if let Some(integrator) = args.integrator {
        cfg.engine.integrator = integrator;
    }
    if let Some(theta) = args.theta {
        cfg.engine.theta = theta;
    }
    if let Some(dt) = args.dt {
        cfg.parameters.dt = dt;
    }
    if args.seed.is_some() {
        cfg.parameters.seed = args.seed;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = load_scenario(&args)?;

    if args.bench {
        let timings = bench_gravity(&[200, 400, 800, 1600, 3200], cfg.engine.theta)?;
        print_timings(&timings);
        let sweep = bench_theta(1000, &[0.0, 0.25, 0.5, 0.75, 1.0, 1.5])?;
        print_theta_sweep(&sweep);
        return Ok(());
    }

    let mut sim = Simulation::from_config(&cfg).context("invalid scenario")?;

    let report = sim.run(cfg.parameters.steps).context("simulation failed")?;
    println!("{report}");
    Ok(())
}
