/// Hanging sheet under gravity
///
/// A unit square sheet is clamped along its top edge and released from
/// rest under uniform gravity. The sheet sags, overshoots and oscillates
/// about the static equilibrium; the implicit scheme damps the motion
/// numerically.
///
/// Checks:
/// - Newton converges at every step
/// - The lowest point moves down
/// - Elastic energy grows from zero as the sheet stretches
///
/// Usage: hanging_sheet [config.toml]   (default inputs/hanging_sheet.toml)

use std::env;
use std::process;

use elasto_sim::*;
use tracing_subscriber::EnvFilter;

const N: usize = 6;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "inputs/hanging_sheet.toml".to_string());

    if let Err(e) = run(&path) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(path: &str) -> ElasticResult<()> {
    println!("=== Hanging Sheet Benchmark ===\n");

    let config = SimulationConfig::from_file(path)?;
    let gravity = config.physics.gravity.clone().unwrap_or_else(|| vec![0.0; 2]);
    println!("Problem Setup:");
    println!("  Domain: 1 × 1, {} × {} cells", N, N);
    println!("  Material: {:?}, mu = {}, lambda = {}", config.physics.model, config.physics.mu, config.physics.lambd);
    println!("  Gravity: {:?}", gravity);
    println!("  dt = {}, steps = {}\n", config.time_stepping.dt, config.time_stepping.num_tpt);

    let (mesh, grid) = MeshGenerator::rectangle(N, N, 1.0, 1.0)?;
    let num_steps = config.time_stepping.num_tpt;
    let export = config.output.export_frames;
    let output_dir = config.output.output_dir.clone();

    let mut sim = Simulation::new(config, mesh, grid, |x| x[1] > 1.0 - 1e-9, |x| x.to_vec())?;
    let mut exporter: Box<dyn FrameExporter> = if export {
        Box::new(ObjExporter::new(&output_dir)?)
    } else {
        Box::new(NullExporter)
    };

    let lowest = |sim: &Simulation| sim.deformed().points.column(1).min();
    let y0 = lowest(&sim);

    println!("{:>5} {:>9} {:>7} {:>7} {:>12} {:>14} {:>10}", "step", "time", "newton", "cg", "residual", "elastic E", "min y");
    println!("{}", "-".repeat(71));

    exporter.export(1, sim.deformed(), &sim.mesh().faces())?;
    let mut max_newton = 0;
    for _ in 0..num_steps {
        let stats = sim.step()?;
        exporter.export(stats.step + 1, sim.deformed(), &sim.mesh().faces())?;
        max_newton = max_newton.max(stats.newton_iterations);

        println!(
            "{:>5} {:>9.4} {:>7} {:>7} {:>12.3e} {:>14.6e} {:>10.5}",
            stats.step,
            stats.time,
            stats.newton_iterations,
            stats.linear_iterations,
            stats.residual,
            sim.potential_energy(),
            lowest(&sim)
        );
    }

    let sag = y0 - lowest(&sim);
    println!("\nResults:");
    println!("  Max Newton iterations per step: {}", max_newton);
    println!("  Sag of lowest point: {:.5}", sag);
    println!("  Final elastic energy: {:.6e}", sim.potential_energy());

    if sag > 0.0 && sim.potential_energy() > 0.0 {
        println!("\n✓ PASS: sheet sags under gravity with all steps converged");
    } else {
        println!("\n✗ FAIL: sheet did not deform as expected");
        process::exit(1);
    }

    Ok(())
}
