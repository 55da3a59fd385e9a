/// Reference-configuration precomputation for linear simplices
///
/// For every element: the reference shape matrix Dm (columns are edges from
/// vertex 0), its inverse, the element volume |det Dm| / d!, and the
/// constant shape-function gradients ∇N_a = Dm⁻ᵀ ∇N̂_a.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{ElasticError, ElasticResult};
use crate::mesh::{Grid, SimplexMesh};

/// det(Dm) below this fraction of the product of edge lengths is degenerate
const DEGENERACY_TOL: f64 = 1e-12;

/// Per-element reference quantities, immutable after construction
#[derive(Debug, Clone)]
pub struct Discretization {
    dimension: usize,
    dm: Vec<DMatrix<f64>>,
    dm_inv: Vec<DMatrix<f64>>,
    volumes: Vec<f64>,
    /// Flattened (element, local vertex) → gradient, stride d+1
    grad_n: Vec<DVector<f64>>,
}

struct ElementData {
    dm: DMatrix<f64>,
    dm_inv: DMatrix<f64>,
    volume: f64,
    grad_n: Vec<DVector<f64>>,
}

impl Discretization {
    /// Precompute reference data for every element
    ///
    /// # Errors
    /// `DegenerateElement` if any element's shape matrix is singular or
    /// inverted (non-positive determinant).
    pub fn new(mesh: &SimplexMesh, reference: &Grid) -> ElasticResult<Self> {
        let d = mesh.dimension();
        if reference.dimension() != d || reference.num_points() != mesh.num_points() {
            return Err(ElasticError::InvalidConfiguration(format!(
                "grid is {}×{}, mesh expects {}×{}",
                reference.num_points(),
                reference.dimension(),
                mesh.num_points(),
                d
            )));
        }

        let canonical = Self::canonical_gradients(d);
        let d_factorial: f64 = (1..=d).map(|k| k as f64).product();

        let elements: Vec<ElementData> = (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| {
                let dm = Self::shape_matrix(mesh, reference, e);
                let det = dm.determinant();
                let scale: f64 = dm.column_iter().map(|c| c.norm()).product();

                if !(det > DEGENERACY_TOL * scale) {
                    return Err(ElasticError::DegenerateElement { element: e, determinant: det });
                }
                let dm_inv = dm
                    .clone()
                    .try_inverse()
                    .ok_or(ElasticError::DegenerateElement { element: e, determinant: det })?;

                let dm_inv_t = dm_inv.transpose();
                let grad_n = canonical.iter().map(|g| &dm_inv_t * g).collect();

                Ok(ElementData {
                    dm,
                    dm_inv,
                    volume: det.abs() / d_factorial,
                    grad_n,
                })
            })
            .collect::<ElasticResult<_>>()?;

        let ne = elements.len();
        let mut disc = Self {
            dimension: d,
            dm: Vec::with_capacity(ne),
            dm_inv: Vec::with_capacity(ne),
            volumes: Vec::with_capacity(ne),
            grad_n: Vec::with_capacity(ne * (d + 1)),
        };
        for data in elements {
            disc.dm.push(data.dm);
            disc.dm_inv.push(data.dm_inv);
            disc.volumes.push(data.volume);
            disc.grad_n.extend(data.grad_n);
        }

        Ok(disc)
    }

    /// Gradients of the barycentric basis on the reference simplex
    ///
    /// Vertex 0: (−1, …, −1); vertex k ≥ 1: e_{k−1}.
    pub fn canonical_gradients(d: usize) -> Vec<DVector<f64>> {
        let mut grads = Vec::with_capacity(d + 1);
        grads.push(DVector::from_element(d, -1.0));
        for k in 0..d {
            let mut g = DVector::zeros(d);
            g[k] = 1.0;
            grads.push(g);
        }
        grads
    }

    /// Shape matrix of element `e` in the given configuration
    ///
    /// Column k−1 is `x[v_k] − x[v_0]`. Shared by the reference (Dm) and
    /// deformed (Ds) computations.
    pub fn shape_matrix(mesh: &SimplexMesh, positions: &Grid, e: usize) -> DMatrix<f64> {
        let d = mesh.dimension();
        let elem = &mesh.elements[e];
        let mut shape = DMatrix::zeros(d, d);
        for (base, tip) in elem.shape_edges() {
            let edge = positions.edge(elem.nodes[base], elem.nodes[tip]);
            shape.set_column(tip - 1, &edge);
        }
        shape
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_elements(&self) -> usize {
        self.volumes.len()
    }

    pub fn reference_shape(&self, e: usize) -> &DMatrix<f64> {
        &self.dm[e]
    }

    pub fn reference_shape_inverse(&self, e: usize) -> &DMatrix<f64> {
        &self.dm_inv[e]
    }

    pub fn volume(&self, e: usize) -> f64 {
        self.volumes[e]
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn total_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }

    /// Gradient of the shape function of local vertex `a` in element `e`
    pub fn grad_n(&self, e: usize, a: usize) -> &DVector<f64> {
        &self.grad_n[e * (self.dimension + 1) + a]
    }
}
