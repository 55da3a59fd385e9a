//! Top-level simulation driver
//!
//! Owns the mesh, the reference precomputation, the Dirichlet partition,
//! the mass operator, the material and the stepper, and drives frame export.

use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::error::{ElasticError, ElasticResult};
use crate::fem::{
    nodal_masses, update_kinematics, Assembler, Discretization, DofManager, ElasticSystem,
    ImplicitStepper, LumpedMass, SimulationState, TimeStepStats,
};
use crate::linalg::{ConjugateGradient, Solver};
use crate::mechanics::{ConstitutiveModel, MaterialModel};
use crate::mesh::{FrameExporter, Grid, NullExporter, ObjExporter, SimplexMesh};

/// Everything the Newton system reads that stays fixed across steps
struct ElasticBody {
    mesh: SimplexMesh,
    disc: Discretization,
    dofs: DofManager,
    mass: LumpedMass,
    material: MaterialModel,
    external: Vec<f64>,
}

impl ElasticBody {
    fn system(&self, dt: f64) -> ElasticSystem<'_, MaterialModel> {
        ElasticSystem {
            mesh: &self.mesh,
            disc: &self.disc,
            dofs: &self.dofs,
            mass: &self.mass,
            material: &self.material,
            external: &self.external,
            dt,
        }
    }
}

/// Implicit elastodynamics on a simplicial mesh
pub struct Simulation<S: Solver = ConjugateGradient> {
    config: SimulationConfig,
    reference: Grid,
    body: ElasticBody,
    state: SimulationState,
    stepper: ImplicitStepper<S>,
    faces: Vec<Vec<usize>>,
    dt: f64,
}

impl Simulation<ConjugateGradient> {
    /// Build a simulation with the Jacobi-preconditioned CG solver
    ///
    /// # Arguments
    /// * `config` - Validated configuration
    /// * `mesh` - Element connectivity
    /// * `reference` - Reference coordinates (`npt × d`)
    /// * `is_dirichlet` - Selects prescribed points by reference position
    /// * `dirichlet_target` - Prescribed position of each Dirichlet point
    pub fn new<P, T>(
        config: SimulationConfig,
        mesh: SimplexMesh,
        reference: Grid,
        is_dirichlet: P,
        dirichlet_target: T,
    ) -> ElasticResult<Self>
    where
        P: Fn(&[f64]) -> bool,
        T: Fn(&[f64]) -> Vec<f64>,
    {
        Self::with_solver(config, mesh, reference, is_dirichlet, dirichlet_target, ConjugateGradient::new())
    }
}

impl<S: Solver> Simulation<S> {
    /// Build a simulation with a caller-supplied linear solver
    ///
    /// The solver's tolerance and iteration cap are overridden with
    /// `tol_cg` and `max_cg_iterations`.
    pub fn with_solver<P, T>(
        config: SimulationConfig,
        mesh: SimplexMesh,
        reference: Grid,
        is_dirichlet: P,
        dirichlet_target: T,
        solver: S,
    ) -> ElasticResult<Self>
    where
        P: Fn(&[f64]) -> bool,
        T: Fn(&[f64]) -> Vec<f64>,
    {
        config.validate()?;
        let d = config.dimension();

        if mesh.dimension() != d || reference.dimension() != d {
            return Err(ElasticError::InvalidConfiguration(format!(
                "dimension mismatch: config d = {}, mesh d = {}, grid d = {}",
                d,
                mesh.dimension(),
                reference.dimension()
            )));
        }
        if mesh.num_points() != config.physics.npt || reference.num_points() != config.physics.npt {
            return Err(ElasticError::InvalidConfiguration(format!(
                "point count mismatch: config npt = {}, mesh npt = {}, grid npt = {}",
                config.physics.npt,
                mesh.num_points(),
                reference.num_points()
            )));
        }

        let disc = Discretization::new(&mesh, &reference)?;

        let dofs = DofManager::build(&reference, is_dirichlet);
        let orphans = mesh.orphan_points();
        if let Some(&p) = orphans.iter().find(|&&p| !dofs.is_dirichlet(p)) {
            return Err(ElasticError::InvalidConfiguration(format!(
                "free point {} belongs to no element",
                p
            )));
        }
        if !orphans.is_empty() {
            warn!("{} Dirichlet points belong to no element", orphans.len());
        }

        let mut deformed = reference.clone();
        dofs.apply_dirichlet_mapping(&reference, &mut deformed, dirichlet_target)?;

        let nodal = nodal_masses(&mesh, &disc, config.physics.rho);
        let mass = LumpedMass::from_nodal_mass(&nodal, &dofs)?;
        let external = match &config.physics.gravity {
            Some(g) => mass.gravity_force(g),
            None => vec![0.0; dofs.num_free_dofs()],
        };

        let material = MaterialModel::from_config(&config.physics);
        let state = SimulationState::new(&mesh, &disc, deformed);
        let phi0 = dofs.gather(&state.deformed);
        let stepper = ImplicitStepper::new(phi0, config.solver.clone(), solver);
        let faces = mesh.faces();

        info!(
            "{} simulation: {} elements, {} points, {} free DOFs, total mass {:.6e}, model {}",
            stepper.solver().name(),
            mesh.num_elements(),
            mesh.num_points(),
            dofs.num_free_dofs(),
            nodal.iter().sum::<f64>(),
            material.name()
        );

        let dt = config.time_stepping.dt;
        Ok(Self {
            config,
            reference,
            body: ElasticBody {
                mesh,
                disc,
                dofs,
                mass,
                material,
                external,
            },
            state,
            stepper,
            faces,
            dt,
        })
    }

    /// Advance one timestep
    ///
    /// On error the simulation stays at the last accepted state.
    pub fn step(&mut self) -> ElasticResult<TimeStepStats> {
        let system = self.body.system(self.dt);
        let stats = self.stepper.step(&system, &mut self.state)?;

        info!(
            "step {}: t = {:.4}, {} newton its, |g| = {:.3e}, BE = {:.6e}",
            stats.step, stats.time, stats.newton_iterations, stats.residual, stats.energy
        );
        Ok(stats)
    }

    /// Export the current frame, then take `num_tpt` steps exporting after each
    ///
    /// On a fresh simulation the frames are numbered 1 ..= num_tpt + 1.
    pub fn run<E: FrameExporter + ?Sized>(&mut self, exporter: &mut E) -> ElasticResult<Vec<TimeStepStats>> {
        let num_steps = self.config.time_stepping.num_tpt;
        let mut all_stats = Vec::with_capacity(num_steps);

        exporter.export(self.stepper.steps() + 1, &self.state.deformed, &self.faces)?;
        for _ in 0..num_steps {
            let stats = self.step()?;
            exporter.export(stats.step + 1, &self.state.deformed, &self.faces)?;
            all_stats.push(stats);
        }

        Ok(all_stats)
    }

    /// Run with the exporter named by the `[output]` section
    pub fn run_with_output(&mut self) -> ElasticResult<Vec<TimeStepStats>> {
        if self.config.output.export_frames {
            let mut exporter = ObjExporter::new(&self.config.output.output_dir)?;
            self.run(&mut exporter)
        } else {
            self.run(&mut NullExporter)
        }
    }

    /// Elastic potential energy Σ vol·ψ at the current state
    pub fn potential_energy(&self) -> f64 {
        Assembler::potential_energy(&self.body.disc, &self.state, &self.body.material)
    }

    /// Incremental energy BE(φ) the next step minimizes, evaluated at `phi`
    ///
    /// # Errors
    /// `InvalidConfiguration` if `phi` is not a free-DOF vector.
    pub fn backward_euler_energy(&self, phi: &[f64]) -> ElasticResult<f64> {
        if phi.len() != self.body.dofs.num_free_dofs() {
            return Err(ElasticError::InvalidConfiguration(format!(
                "phi has length {}, expected {}",
                phi.len(),
                self.body.dofs.num_free_dofs()
            )));
        }
        let mut trial_state = self.state.clone();
        self.body.dofs.scatter(phi, &mut trial_state.deformed);
        update_kinematics(&self.body.mesh, &self.body.disc, &mut trial_state);

        Ok(self
            .body
            .system(self.dt)
            .backward_euler_energy(&trial_state, phi, self.stepper.phi(), self.stepper.phi_prev()))
    }

    /// Change the step size for subsequent steps (e.g. retry after divergence)
    pub fn set_timestep(&mut self, dt: f64) -> ElasticResult<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ElasticError::InvalidConfiguration(format!(
                "dt must be positive, got {}",
                dt
            )));
        }
        self.dt = dt;
        self.stepper.rescale_history(dt);
        Ok(())
    }

    pub fn timestep(&self) -> f64 {
        self.dt
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn mesh(&self) -> &SimplexMesh {
        &self.body.mesh
    }

    pub fn reference(&self) -> &Grid {
        &self.reference
    }

    pub fn discretization(&self) -> &Discretization {
        &self.body.disc
    }

    pub fn dofs(&self) -> &DofManager {
        &self.body.dofs
    }

    pub fn mass(&self) -> &LumpedMass {
        &self.body.mass
    }

    pub fn material(&self) -> &MaterialModel {
        &self.body.material
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Current deformed positions
    pub fn deformed(&self) -> &Grid {
        &self.state.deformed
    }

    /// Current free-DOF positions φₙ
    pub fn phi(&self) -> &[f64] {
        self.stepper.phi()
    }

    pub fn time(&self) -> f64 {
        self.stepper.time()
    }

    /// Accepted steps so far
    pub fn steps(&self) -> usize {
        self.stepper.steps()
    }

    pub fn stepper(&self) -> &ImplicitStepper<S> {
        &self.stepper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MemoryExporter;
    use crate::mesh_generator::MeshGenerator;
    use approx::assert_relative_eq;

    fn triangle() -> (SimplexMesh, Grid) {
        let mesh = SimplexMesh::from_flat(2, 3, &[0, 1, 2]).unwrap();
        let grid = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        (mesh, grid)
    }

    #[test]
    fn test_vertex_zero_clamped() {
        let (mesh, grid) = triangle();
        let config = SimulationConfig::new(2, 3, 1.0, 10.0, 10.0, 0.01, 2);
        let sim = Simulation::new(config, mesh, grid, |x| x[0] == 0.0 && x[1] == 0.0, |x| x.to_vec())
            .unwrap();

        assert_eq!(sim.dofs().num_free_dofs(), 4);
        assert_eq!(sim.dofs().point_to_free(), &[None, Some(0), Some(1)]);
        assert_eq!(sim.phi(), &[1.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(sim.potential_energy(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(sim.discretization().volume(0), 0.5);
        assert_relative_eq!(sim.mass().diagonal()[0], 1.0 / 6.0, epsilon = 1e-15);
    }

    #[test]
    fn test_rest_run_exports_every_frame() {
        let (mesh, grid) = triangle();
        let config = SimulationConfig::new(2, 3, 1.0, 10.0, 10.0, 0.01, 3);
        let mut sim = Simulation::new(config, mesh, grid.clone(), |x| x[0] == 0.0, |x| x.to_vec()).unwrap();

        let mut exporter = MemoryExporter::new();
        let stats = sim.run(&mut exporter).unwrap();

        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.newton_iterations == 0));
        let frames: Vec<usize> = exporter.frames.iter().map(|(k, _)| *k).collect();
        assert_eq!(frames, vec![1, 2, 3, 4]);
        assert_eq!(exporter.frames[3].1, grid);
        assert_relative_eq!(sim.time(), 0.03, epsilon = 1e-15);
    }

    #[test]
    fn test_backward_euler_energy_at_rest() {
        let (mesh, grid) = MeshGenerator::rectangle(2, 2, 1.0, 1.0).unwrap();
        let config = SimulationConfig::new(2, 9, 2.0, 1.0, 1.0, 0.1, 1);
        let sim = Simulation::new(config, mesh, grid, |x| x[0] < 1e-9, |x| x.to_vec()).unwrap();

        // φ = φₙ = φₙ₋₁: BE = ½φᵀMφ − φᵀMφ = −½φᵀMφ
        let phi = sim.phi().to_vec();
        let m_phi: f64 = phi.iter().zip(sim.mass().diagonal()).map(|(x, m)| m * x * x).sum();
        assert_relative_eq!(sim.backward_euler_energy(&phi).unwrap(), -0.5 * m_phi, epsilon = 1e-12);
        assert!(sim.backward_euler_energy(&phi[1..]).is_err());
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let (mesh, grid) = triangle();
        let config = SimulationConfig::new(2, 4, 1.0, 10.0, 10.0, 0.01, 1);
        assert!(matches!(
            Simulation::new(config, mesh, grid, |_| false, |x| x.to_vec()),
            Err(ElasticError::InvalidConfiguration(_))
        ));

        let mesh = SimplexMesh::from_flat(2, 4, &[0, 1, 2]).unwrap();
        let grid = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![3.0, 3.0]]).unwrap();
        let config = SimulationConfig::new(2, 4, 1.0, 10.0, 10.0, 0.01, 1);
        assert!(matches!(
            Simulation::new(config, mesh, grid, |_| false, |x| x.to_vec()),
            Err(ElasticError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_set_timestep() {
        let (mesh, grid) = triangle();
        let config = SimulationConfig::new(2, 3, 1.0, 10.0, 10.0, 0.01, 1);
        let mut sim = Simulation::new(config, mesh, grid, |_| false, |x| x.to_vec()).unwrap();

        sim.set_timestep(0.005).unwrap();
        assert_relative_eq!(sim.timestep(), 0.005);
        assert!(sim.set_timestep(0.0).is_err());
        assert!(sim.set_timestep(f64::NAN).is_err());
    }
}
