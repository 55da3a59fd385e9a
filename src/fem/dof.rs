use crate::error::{ElasticError, ElasticResult};
use crate::mesh::Grid;

/// Degree of Freedom (DOF) manager
///
/// Splits mesh points into Dirichlet (prescribed) and free points. Free
/// points receive consecutive indices in ascending point order; free point
/// `k` owns the `d` vector slots `d·k .. d·k+d` of every free-DOF vector.
/// The assemblers depend on this ordering.
#[derive(Debug, Clone)]
pub struct DofManager {
    /// Spatial dimension (DOFs per point)
    dimension: usize,

    /// Point index → free point index, `None` for Dirichlet points
    point_to_free: Vec<Option<usize>>,

    /// Free point index → point index
    free_points: Vec<usize>,

    /// Dirichlet point indices, ascending
    dirichlet_points: Vec<usize>,
}

impl DofManager {
    /// Classify every reference point with `is_dirichlet`
    ///
    /// # Arguments
    /// * `reference` - Reference coordinates (`npt × d`)
    /// * `is_dirichlet` - Predicate over a point's reference coordinates
    pub fn build<P>(reference: &Grid, is_dirichlet: P) -> Self
    where
        P: Fn(&[f64]) -> bool,
    {
        let npt = reference.num_points();
        let mut point_to_free = Vec::with_capacity(npt);
        let mut free_points = Vec::new();
        let mut dirichlet_points = Vec::new();

        for i in 0..npt {
            if is_dirichlet(&reference.point_coords(i)) {
                dirichlet_points.push(i);
                point_to_free.push(None);
            } else {
                point_to_free.push(Some(free_points.len()));
                free_points.push(i);
            }
        }

        Self {
            dimension: reference.dimension(),
            point_to_free,
            free_points,
            dirichlet_points,
        }
    }

    /// Every point free
    pub fn all_free(reference: &Grid) -> Self {
        Self::build(reference, |_| false)
    }

    /// Move Dirichlet points of `deformed` to their prescribed positions
    ///
    /// # Errors
    /// `InvalidConfiguration` if `target` returns a vector whose length is
    /// not the spatial dimension, or a non-finite coordinate.
    pub fn apply_dirichlet_mapping<M>(&self, reference: &Grid, deformed: &mut Grid, target: M) -> ElasticResult<()>
    where
        M: Fn(&[f64]) -> Vec<f64>,
    {
        for &i in &self.dirichlet_points {
            let mapped = target(&reference.point_coords(i));
            if mapped.len() != self.dimension || mapped.iter().any(|x| !x.is_finite()) {
                return Err(ElasticError::InvalidConfiguration(format!(
                    "Dirichlet mapping of point {} returned {:?}",
                    i, mapped
                )));
            }
            deformed.set_point(i, &mapped);
        }
        Ok(())
    }

    /// Free point index owning point `point`, if any
    pub fn free_dof(&self, point: usize) -> Option<usize> {
        self.point_to_free[point]
    }

    /// Global free-DOF index for a point and coordinate
    pub fn global_dof(&self, point: usize, component: usize) -> Option<usize> {
        debug_assert!(component < self.dimension);
        self.point_to_free[point].map(|k| k * self.dimension + component)
    }

    pub fn is_dirichlet(&self, point: usize) -> bool {
        self.point_to_free[point].is_none()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_points(&self) -> usize {
        self.point_to_free.len()
    }

    /// Number of free points
    pub fn num_free(&self) -> usize {
        self.free_points.len()
    }

    /// Length of a free-DOF vector (d · free points)
    pub fn num_free_dofs(&self) -> usize {
        self.free_points.len() * self.dimension
    }

    pub fn num_dirichlet_points(&self) -> usize {
        self.dirichlet_points.len()
    }

    pub fn free_points(&self) -> &[usize] {
        &self.free_points
    }

    pub fn dirichlet_points(&self) -> &[usize] {
        &self.dirichlet_points
    }

    pub fn point_to_free(&self) -> &[Option<usize>] {
        &self.point_to_free
    }

    /// Flatten free point positions into a free-DOF vector
    pub fn gather(&self, positions: &Grid) -> Vec<f64> {
        let d = self.dimension;
        let mut phi = vec![0.0; self.num_free_dofs()];
        for (k, &point) in self.free_points.iter().enumerate() {
            for beta in 0..d {
                phi[d * k + beta] = positions.points[(point, beta)];
            }
        }
        phi
    }

    /// Write a free-DOF vector back into point positions
    ///
    /// Dirichlet points are left untouched.
    pub fn scatter(&self, phi: &[f64], positions: &mut Grid) {
        debug_assert_eq!(phi.len(), self.num_free_dofs());
        let d = self.dimension;
        for (k, &point) in self.free_points.iter().enumerate() {
            for beta in 0..d {
                positions.points[(point, beta)] = phi[d * k + beta];
            }
        }
    }
}
