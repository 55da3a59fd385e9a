use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::fem::{Discretization, DofManager, SimulationState};
use crate::mechanics::ConstitutiveModel;
use crate::mesh::SimplexMesh;

/// Global force and stiffness assembler
///
/// Element contributions are computed in parallel and merged serially in
/// element order, so results do not depend on the thread count. Rows and
/// columns of Dirichlet vertices are skipped; every output lives on the
/// free DOFs of `dofs`.
pub struct Assembler;

impl Assembler {
    /// Internal elastic force f = −∂E/∂φ over free DOFs
    ///
    /// f[d·k+β] += −vol · Σ_γ P[β,γ] · ∇N_p[γ] for each free vertex p of
    /// each element, with P = P(F(e)).
    ///
    /// # Arguments
    /// * `mesh` - The mesh
    /// * `disc` - Reference volumes and shape-function gradients
    /// * `dofs` - Free/Dirichlet partition
    /// * `state` - Deformation gradients (kinematics must be current)
    /// * `material` - Constitutive model
    pub fn internal_force<M: ConstitutiveModel + ?Sized>(
        mesh: &SimplexMesh,
        disc: &Discretization,
        dofs: &DofManager,
        state: &SimulationState,
        material: &M,
    ) -> Vec<f64> {
        let d = disc.dimension();

        let local_forces: Vec<Vec<(usize, f64)>> = mesh
            .elements
            .par_iter()
            .enumerate()
            .map(|(e, elem)| {
                let p = material.stress(&state.f[e]);
                let vol = disc.volume(e);
                let mut entries = Vec::with_capacity(d * elem.nodes.len());

                for (a, &node) in elem.nodes.iter().enumerate() {
                    let Some(k) = dofs.free_dof(node) else {
                        continue;
                    };
                    let grad = disc.grad_n(e, a);
                    for beta in 0..d {
                        let mut sum = 0.0;
                        for gamma in 0..d {
                            sum += p[(beta, gamma)] * grad[gamma];
                        }
                        entries.push((d * k + beta, -vol * sum));
                    }
                }
                entries
            })
            .collect();

        let mut force = vec![0.0; dofs.num_free_dofs()];
        for entries in local_forces {
            for (i, val) in entries {
                force[i] += val;
            }
        }
        force
    }

    /// Force Jacobian Df = ∂f/∂φ as triplets (duplicates sum on conversion)
    ///
    /// Entry (d·free(p)+β, d·free(q)+α) receives
    /// −vol · ∂P[β,γ]/∂F[α,ε] · ∇N_q[ε] · ∇N_p[γ].
    pub fn tangent_triplets<M: ConstitutiveModel + ?Sized>(
        mesh: &SimplexMesh,
        disc: &Discretization,
        dofs: &DofManager,
        state: &SimulationState,
        material: &M,
    ) -> TriMat<f64> {
        let d = disc.dimension();
        let n = dofs.num_free_dofs();

        let local_triplets: Vec<Vec<(usize, usize, f64)>> = mesh
            .elements
            .par_iter()
            .enumerate()
            .map(|(e, elem)| {
                let dpdf = material.tangent(&state.f[e]);
                let vol = disc.volume(e);
                let nv = elem.nodes.len();
                let mut entries = Vec::with_capacity(nv * nv * d * d);

                for (p, &node_p) in elem.nodes.iter().enumerate() {
                    let Some(kp) = dofs.free_dof(node_p) else {
                        continue;
                    };
                    let grad_p = disc.grad_n(e, p);

                    for (q, &node_q) in elem.nodes.iter().enumerate() {
                        let Some(kq) = dofs.free_dof(node_q) else {
                            continue;
                        };
                        let grad_q = disc.grad_n(e, q);

                        for beta in 0..d {
                            for alpha in 0..d {
                                let mut sum = 0.0;
                                for gamma in 0..d {
                                    for eps in 0..d {
                                        sum += dpdf[(beta * d + gamma, alpha * d + eps)]
                                            * grad_q[eps]
                                            * grad_p[gamma];
                                    }
                                }
                                entries.push((d * kp + beta, d * kq + alpha, -vol * sum));
                            }
                        }
                    }
                }
                entries
            })
            .collect();

        let mut triplets = TriMat::new((n, n));
        for entries in local_triplets {
            for (i, j, val) in entries {
                triplets.add_triplet(i, j, val);
            }
        }
        triplets
    }

    /// Force Jacobian Df in CSR format
    pub fn tangent_matrix<M: ConstitutiveModel + ?Sized>(
        mesh: &SimplexMesh,
        disc: &Discretization,
        dofs: &DofManager,
        state: &SimulationState,
        material: &M,
    ) -> CsMat<f64> {
        Self::tangent_triplets(mesh, disc, dofs, state, material).to_csr()
    }

    /// Elastic potential energy Σ_e vol(e) · ψ(F(e))
    pub fn potential_energy<M: ConstitutiveModel + ?Sized>(
        disc: &Discretization,
        state: &SimulationState,
        material: &M,
    ) -> f64 {
        state
            .f
            .par_iter()
            .zip(disc.volumes().par_iter())
            .map(|(f, &vol)| vol * material.energy_density(f))
            .collect::<Vec<f64>>()
            .iter()
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::update_kinematics;
    use crate::linalg::LinearOperator;
    use crate::mechanics::{Corotated, LinearElasticity};
    use crate::mesh::Grid;
    use crate::mesh_generator::MeshGenerator;
    use approx::assert_relative_eq;

    struct Setup {
        mesh: SimplexMesh,
        disc: Discretization,
        dofs: DofManager,
        state: SimulationState,
    }

    fn sheet(pin_left: bool) -> Setup {
        let (mesh, mut grid) = MeshGenerator::rectangle(3, 2, 1.5, 1.0).unwrap();
        MeshGenerator::jitter_interior(&mut grid, 0.05, 11);
        let disc = Discretization::new(&mesh, &grid).unwrap();
        let dofs = if pin_left {
            DofManager::build(&grid, |x| x[0] < 1e-9)
        } else {
            DofManager::all_free(&grid)
        };
        let state = SimulationState::new(&mesh, &disc, grid);
        Setup { mesh, disc, dofs, state }
    }

    /// Smoothly perturb free points so the tangent is tested off rest
    fn perturb(setup: &mut Setup) {
        let mut phi = setup.dofs.gather(&setup.state.deformed);
        for (i, x) in phi.iter_mut().enumerate() {
            *x += 0.08 * ((i as f64) * 0.7).sin();
        }
        setup.dofs.scatter(&phi, &mut setup.state.deformed);
        update_kinematics(&setup.mesh, &setup.disc, &mut setup.state);
    }

    #[test]
    fn test_rest_force_vanishes() {
        let setup = sheet(true);
        for material in [
            &Corotated::new(10.0, 10.0) as &dyn ConstitutiveModel,
            &LinearElasticity::new(3.0, 7.0),
        ] {
            let f = Assembler::internal_force(&setup.mesh, &setup.disc, &setup.dofs, &setup.state, material);
            assert_eq!(f.len(), setup.dofs.num_free_dofs());
            for v in f {
                assert_relative_eq!(v, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_force_is_negative_energy_gradient() {
        let mut setup = sheet(true);
        perturb(&mut setup);
        let material = Corotated::new(10.0, 10.0);
        let f = Assembler::internal_force(&setup.mesh, &setup.disc, &setup.dofs, &setup.state, &material);

        let phi = setup.dofs.gather(&setup.state.deformed);
        let h = 1e-6;
        for i in 0..phi.len() {
            let energy_at = |delta: f64| {
                let mut shifted = phi.clone();
                shifted[i] += delta;
                let mut state = setup.state.clone();
                setup.dofs.scatter(&shifted, &mut state.deformed);
                update_kinematics(&setup.mesh, &setup.disc, &mut state);
                Assembler::potential_energy(&setup.disc, &state, &material)
            };
            let fd = -(energy_at(h) - energy_at(-h)) / (2.0 * h);
            assert_relative_eq!(f[i], fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_tangent_matches_force_difference() {
        let mut setup = sheet(true);
        perturb(&mut setup);
        let material = Corotated::new(10.0, 10.0);
        let df = Assembler::tangent_matrix(&setup.mesh, &setup.disc, &setup.dofs, &setup.state, &material);

        let phi = setup.dofs.gather(&setup.state.deformed);
        let n = phi.len();
        assert_eq!((df.rows(), df.cols()), (n, n));

        let h = 1e-6;
        for j in 0..n {
            let force_at = |delta: f64| {
                let mut shifted = phi.clone();
                shifted[j] += delta;
                let mut state = setup.state.clone();
                setup.dofs.scatter(&shifted, &mut state.deformed);
                update_kinematics(&setup.mesh, &setup.disc, &mut state);
                Assembler::internal_force(&setup.mesh, &setup.disc, &setup.dofs, &state, &material)
            };
            let plus = force_at(h);
            let minus = force_at(-h);

            let mut unit = vec![0.0; n];
            unit[j] = 1.0;
            let column = LinearOperator::apply(&df, &unit);

            for i in 0..n {
                let fd = (plus[i] - minus[i]) / (2.0 * h);
                assert_relative_eq!(column[i], fd, epsilon = 1e-4, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_tangent_is_symmetric() {
        let mut setup = sheet(false);
        perturb(&mut setup);
        let df = Assembler::tangent_matrix(
            &setup.mesh,
            &setup.disc,
            &setup.dofs,
            &setup.state,
            &Corotated::new(4.0, 9.0),
        );
        let dense = df.to_dense();
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                assert_relative_eq!(dense[(i, j)], dense[(j, i)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_single_triangle_stretch_energy() {
        let mesh = SimplexMesh::from_flat(2, 3, &[0, 1, 2]).unwrap();
        let grid = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let disc = Discretization::new(&mesh, &grid).unwrap();
        let mut state = SimulationState::new(&mesh, &disc, grid);
        state.deformed.set_point(1, &[2.0, 0.0]);
        update_kinematics(&mesh, &disc, &mut state);

        // F = diag(2, 1): ψ = μ·1 + λ/2·1, volume 0.5
        let energy = Assembler::potential_energy(&disc, &state, &Corotated::new(10.0, 4.0));
        assert_relative_eq!(energy, 0.5 * (10.0 + 2.0), epsilon = 1e-12);
    }
}
