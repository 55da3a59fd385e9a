/// Lumped mass
///
/// Each element distributes `volume · rho` equally over its d+1 vertices.
/// The free-DOF operator is diagonal: entry `d·k+β` holds the mass of the
/// point owning free point `k`, repeated for every coordinate β.

use sprs::TriMat;

use crate::error::{ElasticError, ElasticResult};
use crate::fem::{Discretization, DofManager};
use crate::linalg::LinearOperator;
use crate::mesh::SimplexMesh;

/// Per-point lumped mass `Σ_e volume(e) · rho / (d+1)`
pub fn nodal_masses(mesh: &SimplexMesh, disc: &Discretization, rho: f64) -> Vec<f64> {
    let share = rho / mesh.vertices_per_element() as f64;
    let mut masses = vec![0.0; mesh.num_points()];

    for (e, elem) in mesh.elements.iter().enumerate() {
        let m = disc.volume(e) * share;
        for &node in &elem.nodes {
            masses[node] += m;
        }
    }

    masses
}

/// Diagonal mass operator over free DOFs
#[derive(Debug, Clone)]
pub struct LumpedMass {
    diagonal: Vec<f64>,
}

impl LumpedMass {
    /// Expand nodal masses to the free-DOF diagonal
    ///
    /// # Errors
    /// `InvalidConfiguration` if a free point carries no mass (it belongs to
    /// no element), since the Newton system would be singular there.
    pub fn from_nodal_mass(nodal: &[f64], dofs: &DofManager) -> ElasticResult<Self> {
        let d = dofs.dimension();
        let mut diagonal = vec![0.0; dofs.num_free_dofs()];

        for (k, &point) in dofs.free_points().iter().enumerate() {
            let m = nodal[point];
            if !(m > 0.0) {
                return Err(ElasticError::InvalidConfiguration(format!(
                    "free point {} has mass {} (not part of any element?)",
                    point, m
                )));
            }
            for beta in 0..d {
                diagonal[d * k + beta] = m;
            }
        }

        Ok(Self { diagonal })
    }

    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// Sum of the diagonal divided by the dimension (mass of free points)
    pub fn total_mass(&self, dimension: usize) -> f64 {
        self.diagonal.iter().sum::<f64>() / dimension as f64
    }

    /// Add `scale · M` to a triplet accumulator
    pub fn add_to_triplets(&self, triplets: &mut TriMat<f64>, scale: f64) {
        for (i, &m) in self.diagonal.iter().enumerate() {
            triplets.add_triplet(i, i, scale * m);
        }
    }

    /// Uniform body force `M · g` for acceleration `g` (length d)
    pub fn gravity_force(&self, gravity: &[f64]) -> Vec<f64> {
        let d = gravity.len();
        self.diagonal
            .iter()
            .enumerate()
            .map(|(i, &m)| m * gravity[i % d])
            .collect()
    }
}

impl LinearOperator for LumpedMass {
    fn dim(&self) -> usize {
        self.diagonal.len()
    }

    fn apply_into(&self, v: &[f64], out: &mut [f64]) {
        for ((o, &m), &x) in out.iter_mut().zip(&self.diagonal).zip(v) {
            *o = m * x;
        }
    }
}
