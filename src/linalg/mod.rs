pub mod solver;
pub mod iterative;
pub mod preconditioner;
pub mod decomposition;

pub use solver::{axpy, dot, norm, residual_norm, LinearOperator, Solver, SolverStats};
pub use iterative::ConjugateGradient;
pub use preconditioner::{Preconditioner, JacobiPreconditioner, IdentityPreconditioner};
pub use decomposition::{polar_decomposition, PolarDecomposition};
