use std::env;
use std::process;

use elasto_sim::{MeshGenerator, Simulation, SimulationConfig};
use tracing_subscriber::EnvFilter;

/// Rectangle resolution; must match `npt` in the config
const NX: usize = 8;
const NY: usize = 4;
const LX: f64 = 2.0;
const LY: f64 = 1.0;

/// How far the right edge is pulled outward
const PULL: f64 = 0.5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "inputs/stretched_sheet.toml".to_string());

    if let Err(e) = run(&path) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(path: &str) -> elasto_sim::ElasticResult<()> {
    println!("=== Stretched Sheet (implicit elastodynamics) ===\n");

    let config = SimulationConfig::from_file(path)?;
    println!("Config: {}", path);
    println!(
        "  Material: {:?}, mu = {}, lambda = {}, rho = {}",
        config.physics.model, config.physics.mu, config.physics.lambd, config.physics.rho
    );
    println!("  dt = {}, steps = {}", config.time_stepping.dt, config.time_stepping.num_tpt);

    let (mesh, grid) = MeshGenerator::rectangle(NX, NY, LX, LY)?;
    println!("  Points: {}, Elements: {}", mesh.num_points(), mesh.num_elements());

    let tol = 1e-9;
    let clamped = move |x: &[f64]| x[0] < tol || x[0] > LX - tol;
    let pulled = move |x: &[f64]| {
        if x[0] > LX - tol {
            vec![x[0] + PULL, x[1]]
        } else {
            x.to_vec()
        }
    };

    let mut sim = Simulation::new(config, mesh, grid, clamped, pulled)?;
    println!("  Free DOFs: {}\n", sim.dofs().num_free_dofs());

    let stats = sim.run_with_output()?;

    let newton_total: usize = stats.iter().map(|s| s.newton_iterations).sum();
    let cg_total: usize = stats.iter().map(|s| s.linear_iterations).sum();
    println!("\nSummary:");
    println!("  Steps: {}", stats.len());
    println!("  Newton iterations: {} total", newton_total);
    println!("  CG iterations: {} total", cg_total);
    println!("  Final potential energy: {:.6e}", sim.potential_energy());
    println!("  Frames written to {}", sim.config().output.output_dir);

    Ok(())
}
