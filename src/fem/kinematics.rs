/// Deformed configuration and per-element deformation gradients
///
/// `SimulationState` is the only mutable numerical state of a run besides
/// the position history kept by the stepper.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::fem::Discretization;
use crate::mesh::{Grid, SimplexMesh};

/// Deformed positions with the element quantities derived from them
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Current point positions (`npt × d`)
    pub deformed: Grid,
    /// Deformed shape matrices Ds
    pub ds: Vec<DMatrix<f64>>,
    /// Deformation gradients F = Ds · Dm⁻¹
    pub f: Vec<DMatrix<f64>>,
}

impl SimulationState {
    /// State at the given positions with kinematics evaluated
    pub fn new(mesh: &SimplexMesh, disc: &Discretization, deformed: Grid) -> Self {
        let mut state = Self {
            deformed,
            ds: Vec::new(),
            f: Vec::new(),
        };
        update_kinematics(mesh, disc, &mut state);
        state
    }

    pub fn deformation_gradient(&self, e: usize) -> &DMatrix<f64> {
        &self.f[e]
    }
}

/// Recompute Ds and F for every element from the deformed positions
///
/// Must run after every change to `state.deformed` and before evaluating
/// forces, tangents or energies.
pub fn update_kinematics(mesh: &SimplexMesh, disc: &Discretization, state: &mut SimulationState) {
    let deformed = &state.deformed;
    let (ds, f): (Vec<_>, Vec<_>) = (0..mesh.num_elements())
        .into_par_iter()
        .map(|e| {
            let ds = Discretization::shape_matrix(mesh, deformed, e);
            let f = &ds * disc.reference_shape_inverse(e);
            (ds, f)
        })
        .unzip();

    state.ds = ds;
    state.f = f;
}
