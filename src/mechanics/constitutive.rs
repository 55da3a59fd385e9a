/// Constitutive models for hyperelastic solids
///
/// Each model maps a deformation gradient F (d×d) to an energy density ψ,
/// the first Piola–Kirchhoff stress P = ∂ψ/∂F, and the tangent ∂P/∂F laid
/// out as a d²×d² matrix with row `β·d+γ` and column `α·d+ε`.

use nalgebra::DMatrix;

use crate::config::{ModelKind, PhysicsConfig};
use crate::linalg::decomposition::polar_decomposition;

/// Interface every material law implements
pub trait ConstitutiveModel: Send + Sync {
    /// First Piola–Kirchhoff stress P(F)
    fn stress(&self, f: &DMatrix<f64>) -> DMatrix<f64>;

    /// Stress tangent ∂P/∂F (d²×d²)
    fn tangent(&self, f: &DMatrix<f64>) -> DMatrix<f64>;

    /// Strain energy density ψ(F)
    fn energy_density(&self, f: &DMatrix<f64>) -> f64;

    fn name(&self) -> &str;
}

/// Cofactor matrix cof(F) = det(F) F⁻ᵀ, from signed minors
pub fn cofactor(f: &DMatrix<f64>) -> DMatrix<f64> {
    let n = f.nrows();
    if n == 1 {
        return DMatrix::from_element(1, 1, 1.0);
    }
    DMatrix::from_fn(n, n, |i, j| {
        let minor = f.clone().remove_row(i).remove_column(j);
        let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
        sign * minor.determinant()
    })
}

/// Directional derivative of cof(F) along `df`
fn cofactor_differential(f: &DMatrix<f64>, df: &DMatrix<f64>) -> DMatrix<f64> {
    let n = f.nrows();
    if n <= 3 {
        // Entries are polynomials of degree n-1 <= 2; a unit central difference is exact
        (cofactor(&(f + df)) - cofactor(&(f - df))) * 0.5
    } else {
        match f.clone().try_inverse() {
            Some(f_inv) => {
                let f_inv_t = f_inv.transpose();
                let det = f.determinant();
                let trace_term = f_inv_t.component_mul(df).sum();
                (&f_inv_t * trace_term - &f_inv_t * df.transpose() * &f_inv_t) * det
            }
            None => DMatrix::zeros(n, n),
        }
    }
}

/// Unit perturbation E_{αε}
fn unit_direction(n: usize, alpha: usize, epsilon: usize) -> DMatrix<f64> {
    let mut e = DMatrix::zeros(n, n);
    e[(alpha, epsilon)] = 1.0;
    e
}

/// Corotated elasticity
///
/// ψ = μ ‖F − R‖² + λ/2 (J − 1)², with F = R·S the polar decomposition and
/// J = det F. Measuring stretch in the rotated frame keeps large rigid
/// rotations stress-free.
///
/// # References
/// - Stomakhin et al. (2012), "Energetically consistent invertible elasticity"
#[derive(Debug, Clone, Copy)]
pub struct Corotated {
    pub mu: f64,
    pub lambda: f64,
}

impl Corotated {
    pub fn new(mu: f64, lambda: f64) -> Self {
        Self { mu, lambda }
    }
}

impl ConstitutiveModel for Corotated {
    fn stress(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        let polar = polar_decomposition(f);
        let j = f.determinant();
        (f - &polar.rotation) * (2.0 * self.mu) + cofactor(f) * (self.lambda * (j - 1.0))
    }

    #[allow(non_snake_case)]
    fn tangent(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        let d = f.nrows();
        let polar = polar_decomposition(f);
        let J = f.determinant();
        let cof = cofactor(f);

        let mut dPdF = DMatrix::zeros(d * d, d * d);
        for alpha in 0..d {
            for epsilon in 0..d {
                let dF = unit_direction(d, alpha, epsilon);
                let dR = polar.rotation_differential(&dF);
                // δJ = cof(F) : δF
                let dJ = cof[(alpha, epsilon)];

                let dP = (&dF - dR) * (2.0 * self.mu)
                    + &cof * (self.lambda * dJ)
                    + cofactor_differential(f, &dF) * (self.lambda * (J - 1.0));

                let col = alpha * d + epsilon;
                for beta in 0..d {
                    for gamma in 0..d {
                        dPdF[(beta * d + gamma, col)] = dP[(beta, gamma)];
                    }
                }
            }
        }
        dPdF
    }

    fn energy_density(&self, f: &DMatrix<f64>) -> f64 {
        let polar = polar_decomposition(f);
        let j = f.determinant();
        let stretch: f64 = polar.singular_values.iter().map(|s| (s - 1.0).powi(2)).sum();
        self.mu * stretch + 0.5 * self.lambda * (j - 1.0).powi(2)
    }

    fn name(&self) -> &str {
        "corotated"
    }
}

/// Small-strain isotropic linear elasticity
///
/// ε = sym(F) − I, ψ = μ ε:ε + λ/2 tr(ε)², P = 2μ ε + λ tr(ε) I.
/// Not rotation invariant; the tangent is constant.
#[derive(Debug, Clone, Copy)]
pub struct LinearElasticity {
    pub mu: f64,
    pub lambda: f64,
}

impl LinearElasticity {
    pub fn new(mu: f64, lambda: f64) -> Self {
        Self { mu, lambda }
    }

    fn strain(f: &DMatrix<f64>) -> DMatrix<f64> {
        let d = f.nrows();
        (f + f.transpose()) * 0.5 - DMatrix::identity(d, d)
    }
}

impl ConstitutiveModel for LinearElasticity {
    fn stress(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        let d = f.nrows();
        let eps = Self::strain(f);
        let tr = eps.trace();
        eps * (2.0 * self.mu) + DMatrix::identity(d, d) * (self.lambda * tr)
    }

    fn tangent(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        let d = f.nrows();
        let delta = |a: usize, b: usize| if a == b { 1.0 } else { 0.0 };

        DMatrix::from_fn(d * d, d * d, |row, col| {
            let (beta, gamma) = (row / d, row % d);
            let (alpha, epsilon) = (col / d, col % d);
            self.mu * (delta(beta, alpha) * delta(gamma, epsilon) + delta(beta, epsilon) * delta(gamma, alpha))
                + self.lambda * delta(beta, gamma) * delta(alpha, epsilon)
        })
    }

    fn energy_density(&self, f: &DMatrix<f64>) -> f64 {
        let eps = Self::strain(f);
        let tr = eps.trace();
        self.mu * eps.norm_squared() + 0.5 * self.lambda * tr * tr
    }

    fn name(&self) -> &str {
        "linear"
    }
}

/// Material law selected at construction time
#[derive(Debug, Clone, Copy)]
pub enum MaterialModel {
    Corotated(Corotated),
    Linear(LinearElasticity),
}

impl MaterialModel {
    /// Build the model named in the physics section
    pub fn from_config(physics: &PhysicsConfig) -> Self {
        match physics.model {
            ModelKind::Corotated => MaterialModel::Corotated(Corotated::new(physics.mu, physics.lambd)),
            ModelKind::Linear => MaterialModel::Linear(LinearElasticity::new(physics.mu, physics.lambd)),
        }
    }

    fn inner(&self) -> &dyn ConstitutiveModel {
        match self {
            MaterialModel::Corotated(m) => m,
            MaterialModel::Linear(m) => m,
        }
    }
}

impl ConstitutiveModel for MaterialModel {
    fn stress(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        self.inner().stress(f)
    }

    fn tangent(&self, f: &DMatrix<f64>) -> DMatrix<f64> {
        self.inner().tangent(f)
    }

    fn energy_density(&self, f: &DMatrix<f64>) -> f64 {
        self.inner().energy_density(f)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
