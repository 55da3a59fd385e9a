use elasto_sim::{
    ConstitutiveModel, ElasticError, MeshGenerator, ModelKind, ObjExporter, Simulation,
    SimulationConfig,
};
use approx::assert_relative_eq;
use std::fs;

const CONFIG: &str = r#"
[physics]
d = 2
npt = 25
rho = 1.0
mu = 10.0
lambd = 10.0

[time_stepping]
dt = 0.01
num_tpt = 5
"#;

fn pulled_sheet(config: SimulationConfig, pull: f64) -> Simulation {
    let (mesh, grid) = MeshGenerator::rectangle(4, 4, 1.0, 1.0).unwrap();
    Simulation::new(
        config,
        mesh,
        grid,
        |x| x[0] < 1e-9 || x[0] > 1.0 - 1e-9,
        move |x| {
            if x[0] > 0.5 {
                vec![x[0] + pull, x[1]]
            } else {
                x.to_vec()
            }
        },
    )
    .unwrap()
}

#[test]
fn test_stretched_sheet_writes_all_frames() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig::from_toml_str(CONFIG).unwrap();
    let num_tpt = config.time_stepping.num_tpt;
    let mut sim = pulled_sheet(config, 0.25);

    let mut exporter = ObjExporter::new(dir.path()).unwrap();
    let stats = sim.run(&mut exporter).unwrap();

    assert_eq!(stats.len(), num_tpt);
    for s in &stats {
        assert!(s.residual <= 2e-5, "step {} residual {}", s.step, s.residual);
        assert!(s.newton_iterations >= 1);
    }

    for k in 1..=num_tpt + 1 {
        let path = dir.path().join(format!("frame_{}.obj", k));
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 25);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 32);
    }
    assert!(!dir.path().join(format!("frame_{}.obj", num_tpt + 2)).exists());
    assert_eq!(exporter.written().len(), num_tpt + 1);

    // Dirichlet points hold their mapped positions
    let right = sim.deformed().point_coords(4);
    assert_relative_eq!(right[0], 1.25, epsilon = 1e-15);
    assert!(sim.potential_energy() > 0.0);
}

#[test]
fn test_linear_model_runs() {
    let mut config = SimulationConfig::from_toml_str(CONFIG).unwrap();
    config.physics.model = ModelKind::Linear;
    let mut sim = pulled_sheet(config, 0.1);

    for _ in 0..3 {
        let stats = sim.step().unwrap();
        assert!(stats.residual <= 2e-5);
    }
    assert_eq!(sim.material().name(), "linear");
}

#[test]
fn test_newton_cap_reports_divergence() {
    let mut config = SimulationConfig::from_toml_str(CONFIG).unwrap();
    config.solver.max_newton_iterations = 1;
    config.solver.tol_newton = 1e-12;
    let mut sim = pulled_sheet(config, 0.25);
    let phi_before = sim.phi().to_vec();

    match sim.step() {
        Err(ElasticError::NewtonDivergence { iterations, residual }) => {
            assert_eq!(iterations, 1);
            assert!(residual > 1e-12);
        }
        other => panic!("expected NewtonDivergence, got {:?}", other.map(|s| s.step)),
    }

    assert_eq!(sim.phi(), phi_before.as_slice());
    assert_eq!(sim.steps(), 0);
}

#[test]
fn test_smaller_timestep_keeps_falling_velocity() {
    let mut config = SimulationConfig::new(2, 3, 1.0, 10.0, 10.0, 0.1, 3);
    config.physics.gravity = Some(vec![0.0, -1.0]);
    config.solver.tol_cg = 1e-10;
    let mesh = elasto_sim::SimplexMesh::from_flat(2, 3, &[0, 1, 2]).unwrap();
    let grid = elasto_sim::Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let mut sim = Simulation::new(config, mesh, grid, |_| false, |x| x.to_vec()).unwrap();

    let displacement = |sim: &Simulation, before: &[f64]| -> Vec<f64> {
        sim.phi().iter().zip(before).map(|(x, x0)| x - x0).collect()
    };

    // From rest: g·dt² = 0.01
    let phi0 = sim.phi().to_vec();
    sim.step().unwrap();
    let step1 = displacement(&sim, &phi0);

    // Velocity 0.1 carried into dt = 0.05: 0.1·0.05 + 0.05² = 0.0075
    sim.set_timestep(0.05).unwrap();
    let phi1 = sim.phi().to_vec();
    let stats = sim.step().unwrap();
    let step2 = displacement(&sim, &phi1);

    // Velocity 0.15: 0.15·0.05 + 0.05² = 0.01
    let phi2 = sim.phi().to_vec();
    sim.step().unwrap();
    let step3 = displacement(&sim, &phi2);

    assert_relative_eq!(stats.dt, 0.05);
    for k in 0..3 {
        assert_relative_eq!(step1[2 * k], 0.0, epsilon = 1e-8);
        assert_relative_eq!(step1[2 * k + 1], -0.01, epsilon = 1e-8);
        assert_relative_eq!(step2[2 * k + 1], -0.0075, epsilon = 1e-8);
        assert_relative_eq!(step3[2 * k + 1], -0.01, epsilon = 1e-8);
    }
    assert_relative_eq!(sim.time(), 0.2, epsilon = 1e-14);
}

#[test]
fn test_degenerate_mesh_rejected() {
    let config = SimulationConfig::from_toml_str(
        r#"
        [physics]
        d = 2
        npt = 3
        rho = 1.0
        mu = 1.0
        lambd = 1.0

        [time_stepping]
        dt = 0.01
        num_tpt = 1
        "#,
    )
    .unwrap();
    let mesh = elasto_sim::SimplexMesh::from_flat(2, 3, &[0, 1, 2]).unwrap();
    let grid = elasto_sim::Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();

    let result = Simulation::new(config, mesh, grid, |_| false, |x| x.to_vec());
    assert!(matches!(result, Err(ElasticError::DegenerateElement { element: 0, .. })));
}
