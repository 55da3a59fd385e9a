use sprs::CsMat;

use crate::linalg::preconditioner::Preconditioner;

/// Outcome of one linear solve
///
/// Missing the tolerance is reported through `converged == false`, never as
/// an error; the Newton driver decides what to do with a stalled solve.
#[derive(Debug, Clone, Default)]
pub struct SolverStats {
    pub iterations: usize,
    /// ‖b − Ax‖ at exit
    pub residual_norm: f64,
    /// ‖b − Ax‖ / ‖b‖ at exit
    pub relative_residual: f64,
    pub converged: bool,
    /// Wall time in seconds
    pub solve_time: f64,
}

/// Square operator x ↦ Ax on free-DOF vectors
pub trait LinearOperator {
    /// Number of rows (= columns)
    fn dim(&self) -> usize;

    /// out = A v
    fn apply_into(&self, v: &[f64], out: &mut [f64]);

    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.apply_into(v, &mut out);
        out
    }
}

impl LinearOperator for CsMat<f64> {
    fn dim(&self) -> usize {
        self.rows()
    }

    fn apply_into(&self, v: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|o| *o = 0.0);
        if self.is_csr() {
            for (i, row) in self.outer_iterator().enumerate() {
                out[i] = row.iter().map(|(j, &a)| a * v[j]).sum();
            }
        } else {
            for (j, col) in self.outer_iterator().enumerate() {
                for (i, &a) in col.iter() {
                    out[i] += a * v[j];
                }
            }
        }
    }
}

/// Linear solver used for the Newton correction Dg Δφ = −g
pub trait Solver {
    /// Solve A x = b from a zero initial guess
    #[allow(non_snake_case)]
    fn solve(&mut self, A: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats);

    /// Solve with an arbitrary operator and preconditioner
    #[allow(non_snake_case)]
    fn solve_operator<O, P>(&self, A: &O, b: &[f64], precond: &P) -> (Vec<f64>, SolverStats)
    where
        O: LinearOperator,
        P: Preconditioner;

    fn name(&self) -> &str;

    /// Relative residual tolerance
    fn tolerance(&self) -> f64;
    fn set_tolerance(&mut self, tolerance: f64);

    /// Iteration cap
    fn max_iterations(&self) -> usize;
    fn set_max_iterations(&mut self, max_iterations: usize);
}

/// Euclidean inner product
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// y ← y + αx
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// ‖b − Ax‖
pub fn residual_norm<O: LinearOperator + ?Sized>(a: &O, x: &[f64], b: &[f64]) -> f64 {
    let ax = a.apply(x);
    b.iter()
        .zip(&ax)
        .map(|(bi, axi)| (bi - axi).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_vector_helpers() {
        let v = [3.0, 4.0];
        assert_relative_eq!(norm(&v), 5.0);
        assert_relative_eq!(dot(&v, &[1.0, 2.0]), 11.0);

        let mut y = vec![1.0, 1.0];
        axpy(2.0, &v, &mut y);
        assert_eq!(y, vec![7.0, 9.0]);
    }

    #[test]
    fn test_csr_and_csc_agree() {
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(0, 0, 2.0);
        tri.add_triplet(0, 2, 4.0);
        tri.add_triplet(1, 1, -1.0);
        tri.add_triplet(2, 0, 1.0);
        tri.add_triplet(2, 0, 1.0);
        let csr: CsMat<f64> = tri.to_csr();
        let csc: CsMat<f64> = tri.to_csc();

        let v = [1.0, 2.0, 3.0];
        assert_eq!(LinearOperator::apply(&csr, &v), vec![14.0, -2.0, 2.0]);
        assert_eq!(LinearOperator::apply(&csc, &v), vec![14.0, -2.0, 2.0]);
        assert_eq!(LinearOperator::dim(&csr), 3);
        assert_relative_eq!(residual_norm(&csr, &v, &[14.0, -2.0, 2.0]), 0.0);
    }
}
