//! Error types for the simulator.
//!
//! Every fallible operation returns `ElasticResult<T>`.

use thiserror::Error;

/// Unified error type for construction and time stepping.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// Reference shape matrix of an element is singular or inverted.
    #[error("Degenerate element {element}: det(Dm) = {determinant:.3e}")]
    DegenerateElement {
        element: usize,
        determinant: f64,
    },

    /// Newton iteration hit its cap (or produced a non-finite residual).
    #[error("Newton did not converge after {iterations} iterations (residual: {residual:.3e})")]
    NewtonDivergence {
        iterations: usize,
        residual: f64,
    },

    /// Linear solve missed its tolerance and no damped step reduced the residual.
    #[error("Linear solve stalled after {iterations} iterations (residual: {residual:.3e})")]
    LinearSolveStall {
        iterations: usize,
        residual: f64,
    },

    /// Configuration, mesh, or callback output is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// TOML configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, ElasticError>`.
pub type ElasticResult<T> = Result<T, ElasticError>;
