/// Nonlinear system solved at every timestep
///
/// Two-step position scheme with lumped mass M:
///
///   g(φ)  = M(φ − 2φₙ + φₙ₋₁) − dt² (f_int(φ) + f_ext)
///   Dg(φ) = M − dt² Df(φ)
///
/// g is the gradient of the incremental energy
///
///   BE(φ) = ½ φᵀMφ + φᵀ(−2Mφₙ + Mφₙ₋₁) + dt² (E(φ) − φᵀ f_ext)
///
/// with E the elastic potential energy.

use sprs::{CsMat, TriMat};

use crate::fem::{Assembler, Discretization, DofManager, LumpedMass, SimulationState};
use crate::linalg::{dot, LinearOperator};
use crate::mechanics::ConstitutiveModel;
use crate::mesh::SimplexMesh;

/// Borrowed view of everything the Newton loop evaluates
pub struct ElasticSystem<'a, M: ConstitutiveModel + ?Sized> {
    pub mesh: &'a SimplexMesh,
    pub disc: &'a Discretization,
    pub dofs: &'a DofManager,
    pub mass: &'a LumpedMass,
    pub material: &'a M,
    /// Constant external force over free DOFs
    pub external: &'a [f64],
    pub dt: f64,
}

impl<'a, M: ConstitutiveModel + ?Sized> ElasticSystem<'a, M> {
    /// Residual g(φ); `state` must hold φ with current kinematics
    pub fn residual(&self, state: &SimulationState, phi: &[f64], phi_n: &[f64], phi_prev: &[f64]) -> Vec<f64> {
        let dt2 = self.dt * self.dt;
        let f_int = Assembler::internal_force(self.mesh, self.disc, self.dofs, state, self.material);

        let inertia: Vec<f64> = phi
            .iter()
            .zip(phi_n)
            .zip(phi_prev)
            .map(|((&x, &xn), &xp)| x - 2.0 * xn + xp)
            .collect();
        let mut g = self.mass.apply(&inertia);

        for ((gi, &fi), &fe) in g.iter_mut().zip(&f_int).zip(self.external) {
            *gi -= dt2 * (fi + fe);
        }
        g
    }

    /// Jacobian Dg(φ) = M − dt² Df(φ) in CSR format
    pub fn jacobian(&self, state: &SimulationState) -> CsMat<f64> {
        let dt2 = self.dt * self.dt;
        let n = self.mass.len();

        let stiffness = Assembler::tangent_triplets(self.mesh, self.disc, self.dofs, state, self.material);
        let mut triplets = TriMat::with_capacity((n, n), stiffness.nnz() + n);
        self.mass.add_to_triplets(&mut triplets, 1.0);
        for (&val, (i, j)) in stiffness.triplet_iter() {
            triplets.add_triplet(i, j, -dt2 * val);
        }
        triplets.to_csr()
    }

    /// Incremental energy BE(φ); `state` must hold φ with current kinematics
    pub fn backward_euler_energy(&self, state: &SimulationState, phi: &[f64], phi_n: &[f64], phi_prev: &[f64]) -> f64 {
        let dt2 = self.dt * self.dt;
        let m_phi = self.mass.apply(phi);
        let m_phi_n = self.mass.apply(phi_n);
        let m_phi_prev = self.mass.apply(phi_prev);

        let quadratic = 0.5 * dot(phi, &m_phi);
        let linear: f64 = phi
            .iter()
            .zip(m_phi_n.iter().zip(&m_phi_prev))
            .map(|(&x, (&mn, &mp))| x * (-2.0 * mn + mp))
            .sum();
        let elastic = Assembler::potential_energy(self.disc, state, self.material);
        let work = dot(phi, self.external);

        quadratic + linear + dt2 * (elastic - work)
    }
}
