//! Matrix decompositions for constitutive models.
//!
//! Polar decomposition F = R·S of a square deformation gradient, computed
//! through the SVD so that inverted elements still yield a proper rotation.

use nalgebra::{DMatrix, DVector};

/// Sums of singular values below this are treated as a degenerate pair
const SINGULAR_PAIR_EPS: f64 = 1e-12;

/// Result of a polar decomposition F = R · S
///
/// `R` is a proper rotation (det R = +1). `S = V Σ Vᵀ` is symmetric; when
/// det F < 0 the smallest entry of Σ is negative.
#[derive(Debug, Clone)]
pub struct PolarDecomposition {
    pub rotation: DMatrix<f64>,
    pub stretch: DMatrix<f64>,
    /// Right singular vectors (columns)
    pub v: DMatrix<f64>,
    /// Signed singular values, descending in magnitude
    pub singular_values: DVector<f64>,
}

impl PolarDecomposition {
    /// Variation of R for a perturbation `df` of F
    ///
    /// From Rᵀ δF = W S + δS with W = Rᵀ δR skew, the skew part gives
    /// W S + S W = Rᵀ δF − δFᵀ R, solved entrywise in the singular basis.
    pub fn rotation_differential(&self, df: &DMatrix<f64>) -> DMatrix<f64> {
        let n = self.rotation.nrows();
        let rt_df = self.rotation.transpose() * df;
        let skew = &rt_df - rt_df.transpose();
        let k = self.v.transpose() * skew * &self.v;

        let mut w = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let denom = self.singular_values[i] + self.singular_values[j];
                if denom.abs() > SINGULAR_PAIR_EPS {
                    w[(i, j)] = k[(i, j)] / denom;
                }
            }
        }

        &self.rotation * (&self.v * w * self.v.transpose())
    }
}

/// Compute the polar decomposition of a square matrix
///
/// Falls back to R = I, S = F if the SVD does not return singular vectors.
pub fn polar_decomposition(f: &DMatrix<f64>) -> PolarDecomposition {
    let n = f.nrows();
    debug_assert_eq!(n, f.ncols(), "polar decomposition needs a square matrix");

    let svd = f.clone().svd(true, true);
    let mut sigma = svd.singular_values;

    let (mut u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return PolarDecomposition {
                rotation: DMatrix::identity(n, n),
                stretch: f.clone(),
                v: DMatrix::identity(n, n),
                singular_values: DVector::from_iterator(n, (0..n).map(|i| f[(i, i)])),
            };
        }
    };

    // Reflection: move the sign onto the smallest singular value
    if u.determinant() * v_t.determinant() < 0.0 {
        let last = (0..n)
            .min_by(|&a, &b| sigma[a].total_cmp(&sigma[b]))
            .unwrap_or(n - 1);
        for r in 0..n {
            u[(r, last)] = -u[(r, last)];
        }
        sigma[last] = -sigma[last];
    }

    let v = v_t.transpose();
    let rotation = &u * &v_t;
    let stretch = &v * DMatrix::from_diagonal(&sigma) * &v_t;

    PolarDecomposition {
        rotation,
        stretch,
        v,
        singular_values: sigma,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_f() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[1.3, 0.4, -0.2, 0.8])
    }

    #[test]
    fn test_reconstructs_f() {
        let f = sample_f();
        let polar = polar_decomposition(&f);

        assert_relative_eq!(&polar.rotation * &polar.stretch, f, epsilon = 1e-12);
        assert_relative_eq!(polar.rotation.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(
            polar.rotation.transpose() * &polar.rotation,
            DMatrix::identity(2, 2),
            epsilon = 1e-12
        );
        assert_relative_eq!(polar.stretch.clone(), polar.stretch.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_gives_proper_rotation() {
        let f = DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, 1.0]);
        let polar = polar_decomposition(&f);

        assert_relative_eq!(polar.rotation.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(&polar.rotation * &polar.stretch, f, epsilon = 1e-12);
        assert!(polar.singular_values.iter().any(|&s| s < 0.0));
    }

    #[test]
    fn test_pure_rotation() {
        let theta: f64 = 0.7;
        let f = DMatrix::from_row_slice(2, 2, &[theta.cos(), -theta.sin(), theta.sin(), theta.cos()]);
        let polar = polar_decomposition(&f);

        assert_relative_eq!(polar.rotation, f, epsilon = 1e-12);
        assert_relative_eq!(polar.stretch, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_differential_matches_finite_difference() {
        let f = DMatrix::from_row_slice(3, 3, &[1.1, 0.2, 0.0, -0.1, 0.9, 0.3, 0.05, 0.0, 1.2]);
        let polar = polar_decomposition(&f);
        let h = 1e-6;

        for a in 0..3 {
            for b in 0..3 {
                let mut df = DMatrix::zeros(3, 3);
                df[(a, b)] = 1.0;

                let plus = polar_decomposition(&(&f + &df * h)).rotation;
                let minus = polar_decomposition(&(&f - &df * h)).rotation;
                let fd = (plus - minus) / (2.0 * h);

                assert_relative_eq!(polar.rotation_differential(&df), fd, epsilon = 1e-6);
            }
        }
    }
}
