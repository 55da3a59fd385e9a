use sprs::CsMat;
use std::time::Instant;

use super::preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
use super::solver::{axpy, dot, norm, LinearOperator, Solver, SolverStats};

/// ‖b‖ below this is treated as a zero right-hand side
const ZERO_RHS: f64 = 1e-300;

/// Preconditioned Conjugate Gradient for symmetric positive definite systems
///
/// Stops when ‖r‖ ≤ tolerance · ‖b‖ or after `max_iterations`. A direction
/// with non-positive curvature pᵀAp ends the iteration early; in both cases
/// the current iterate is returned with `converged == false`.
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
    jacobi: bool,
}

impl ConjugateGradient {
    /// Jacobi-preconditioned CG, 1000 iterations, relative tolerance 1e-8
    pub fn new() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            jacobi: true,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Toggle the diagonal preconditioner used by [`Solver::solve`]
    pub fn with_jacobi(mut self, jacobi: bool) -> Self {
        self.jacobi = jacobi;
        self
    }

    fn iterate<O, P>(&self, a: &O, b: &[f64], precond: &P) -> (Vec<f64>, SolverStats)
    where
        O: LinearOperator + ?Sized,
        P: Preconditioner,
    {
        let start = Instant::now();
        let n = b.len();
        let b_norm = norm(b);
        let mut x = vec![0.0; n];

        if b_norm < ZERO_RHS {
            let stats = SolverStats {
                converged: true,
                solve_time: start.elapsed().as_secs_f64(),
                ..SolverStats::default()
            };
            return (x, stats);
        }

        let mut r = b.to_vec();
        let mut z = precond.apply(&r);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);
        let mut ap = vec![0.0; n];

        let mut r_norm = b_norm;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            a.apply_into(&p, &mut ap);
            let curvature = dot(&p, &ap);
            if !(curvature > 0.0) {
                break;
            }

            let alpha = rz / curvature;
            axpy(alpha, &p, &mut x);
            axpy(-alpha, &ap, &mut r);
            iterations += 1;

            r_norm = norm(&r);
            if r_norm <= self.tolerance * b_norm {
                converged = true;
                break;
            }

            z = precond.apply(&r);
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for (pi, zi) in p.iter_mut().zip(&z) {
                *pi = zi + beta * *pi;
            }
        }

        let stats = SolverStats {
            iterations,
            residual_norm: r_norm,
            relative_residual: r_norm / b_norm,
            converged,
            solve_time: start.elapsed().as_secs_f64(),
        };
        (x, stats)
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for ConjugateGradient {
    fn solve(&mut self, a: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats) {
        if self.jacobi {
            self.iterate(a, b, &JacobiPreconditioner::new(a))
        } else {
            self.iterate(a, b, &IdentityPreconditioner)
        }
    }

    fn solve_operator<O, P>(&self, a: &O, b: &[f64], precond: &P) -> (Vec<f64>, SolverStats)
    where
        O: LinearOperator,
        P: Preconditioner,
    {
        self.iterate(a, b, precond)
    }

    fn name(&self) -> &str {
        if self.jacobi { "Jacobi-CG" } else { "CG" }
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }
}
