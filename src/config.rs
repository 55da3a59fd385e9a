//! Configuration management for elastodynamic simulations
//!
//! Reads TOML configuration files and provides structured data for the
//! material, time stepping, nonlinear/linear solver caps, and frame output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ElasticError, ElasticResult};

/// Main simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub time_stepping: TimeSteppingConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which constitutive law to instantiate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Corotated,
    Linear,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhysicsConfig {
    /// Spatial dimension
    pub d: usize,
    /// Number of mesh points
    pub npt: usize,
    /// Mass density
    pub rho: f64,
    /// Lamé shear parameter μ
    pub mu: f64,
    /// Lamé first parameter λ
    pub lambd: f64,
    #[serde(default)]
    pub model: ModelKind,
    /// Uniform body acceleration (length d); no external load when absent
    #[serde(default)]
    pub gravity: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeSteppingConfig {
    /// Time step size
    pub dt: f64,
    /// Number of timesteps to advance
    pub num_tpt: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    #[serde(default = "default_tol_newton")]
    pub tol_newton: f64,
    /// Relative residual tolerance of the inner linear solve
    #[serde(default = "default_tol_cg")]
    pub tol_cg: f64,
    #[serde(default = "default_max_newton_iterations")]
    pub max_newton_iterations: usize,
    #[serde(default = "default_max_cg_iterations")]
    pub max_cg_iterations: usize,
    /// Step-length reductions tried before falling back
    #[serde(default = "default_max_line_search")]
    pub max_line_search: usize,
    /// Step-length reduction factor
    #[serde(default = "default_line_search_rho")]
    pub line_search_rho: f64,
}

fn default_tol_newton() -> f64 { 2e-5 }
fn default_tol_cg() -> f64 { 1e-3 }
fn default_max_newton_iterations() -> usize { 50 }
fn default_max_cg_iterations() -> usize { 1000 }
fn default_max_line_search() -> usize { 8 }
fn default_line_search_rho() -> f64 { 0.5 }

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tol_newton: default_tol_newton(),
            tol_cg: default_tol_cg(),
            max_newton_iterations: default_max_newton_iterations(),
            max_cg_iterations: default_max_cg_iterations(),
            max_line_search: default_max_line_search(),
            line_search_rho: default_line_search_rho(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_export_frames")]
    pub export_frames: bool,
}

fn default_output_dir() -> String { "output".to_string() }
fn default_export_frames() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            export_frames: default_export_frames(),
        }
    }
}

impl SimulationConfig {
    /// Minimal configuration with default solver and output sections
    pub fn new(d: usize, npt: usize, rho: f64, mu: f64, lambd: f64, dt: f64, num_tpt: usize) -> Self {
        Self {
            physics: PhysicsConfig {
                d,
                npt,
                rho,
                mu,
                lambd,
                model: ModelKind::default(),
                gravity: None,
            },
            time_stepping: TimeSteppingConfig { dt, num_tpt },
            solver: SolverConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ElasticResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> ElasticResult<Self> {
        let config: SimulationConfig = toml::from_str(contents)
            .map_err(|e| ElasticError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Spatial dimension
    pub fn dimension(&self) -> usize {
        self.physics.d
    }

    /// Check value ranges and cross-field consistency
    pub fn validate(&self) -> ElasticResult<()> {
        let p = &self.physics;
        let t = &self.time_stepping;
        let s = &self.solver;

        let invalid = |msg: String| Err(ElasticError::InvalidConfiguration(msg));

        if p.d == 0 {
            return invalid("dimension d must be at least 1".to_string());
        }
        if p.npt == 0 {
            return invalid("npt must be positive".to_string());
        }
        if !(p.rho.is_finite() && p.rho > 0.0) {
            return invalid(format!("density rho must be positive, got {}", p.rho));
        }
        if !(p.mu.is_finite() && p.mu >= 0.0) {
            return invalid(format!("mu must be non-negative, got {}", p.mu));
        }
        if !p.lambd.is_finite() {
            return invalid(format!("lambd must be finite, got {}", p.lambd));
        }
        if let Some(g) = &p.gravity {
            if g.len() != p.d {
                return invalid(format!("gravity has {} components, expected {}", g.len(), p.d));
            }
            if g.iter().any(|x| !x.is_finite()) {
                return invalid("gravity must be finite".to_string());
            }
        }
        if !(t.dt.is_finite() && t.dt > 0.0) {
            return invalid(format!("dt must be positive, got {}", t.dt));
        }
        if !(s.tol_newton > 0.0 && s.tol_cg > 0.0) {
            return invalid("solver tolerances must be positive".to_string());
        }
        if s.max_newton_iterations == 0 || s.max_cg_iterations == 0 {
            return invalid("iteration caps must be positive".to_string());
        }
        if !(s.line_search_rho > 0.0 && s.line_search_rho < 1.0) {
            return invalid(format!("line_search_rho must be in (0, 1), got {}", s.line_search_rho));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [physics]
        d = 2
        npt = 9
        rho = 1.0
        mu = 10.0
        lambd = 20.0
        gravity = [0.0, -9.8]

        [time_stepping]
        dt = 0.01
        num_tpt = 5

        [solver]
        max_newton_iterations = 30
    "#;

    #[test]
    fn test_parse_with_defaults() {
        let config = SimulationConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.physics.d, 2);
        assert_eq!(config.physics.model, ModelKind::Corotated);
        assert_eq!(config.physics.gravity, Some(vec![0.0, -9.8]));
        assert_eq!(config.solver.max_newton_iterations, 30);
        assert_eq!(config.solver.max_cg_iterations, 1000);
        assert_eq!(config.solver.tol_newton, 2e-5);
        assert_eq!(config.output.output_dir, "output");
        assert!(config.output.export_frames);
    }

    #[test]
    fn test_linear_model_selection() {
        let text = SAMPLE.replace("lambd = 20.0", "lambd = 20.0\nmodel = \"linear\"");
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.physics.model, ModelKind::Linear);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let mut config = SimulationConfig::new(2, 3, 1.0, 1.0, 1.0, 0.1, 1);
        assert!(config.validate().is_ok());

        config.time_stepping.dt = 0.0;
        assert!(matches!(config.validate(), Err(ElasticError::InvalidConfiguration(_))));

        config.time_stepping.dt = 0.1;
        config.physics.rho = -1.0;
        assert!(matches!(config.validate(), Err(ElasticError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_gravity_dimension_mismatch() {
        let mut config = SimulationConfig::new(2, 3, 1.0, 1.0, 1.0, 0.1, 1);
        config.physics.gravity = Some(vec![0.0, 0.0, -9.8]);
        assert!(matches!(config.validate(), Err(ElasticError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = SimulationConfig::from_toml_str("[physics\nd = 2");
        assert!(matches!(result, Err(ElasticError::ConfigParse(_))));
    }
}
