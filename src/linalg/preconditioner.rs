use sprs::CsMat;

/// Diagonal entries with magnitude below this are left unscaled
const PIVOT_FLOOR: f64 = 1e-14;

/// Approximate inverse z ≈ A⁻¹ r applied once per CG iteration
pub trait Preconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64>;
}

/// Scaling by the inverse diagonal of the Newton matrix
///
/// The lumped mass dominates the diagonal of `M − dt² Df` for small dt, so
/// this is usually all the Jacobian needs.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    #[allow(non_snake_case)]
    pub fn new(A: &CsMat<f64>) -> Self {
        let mut diagonal = vec![0.0; A.rows()];
        for (&val, (i, j)) in A.iter() {
            if i == j {
                diagonal[i] += val;
            }
        }
        Self::from_diagonal(&diagonal)
    }

    /// From explicit diagonal entries; missing or tiny pivots act as identity
    pub fn from_diagonal(diagonal: &[f64]) -> Self {
        let inv_diag = diagonal
            .iter()
            .map(|&a| if a.abs() > PIVOT_FLOOR { a.recip() } else { 1.0 })
            .collect();
        Self { inv_diag }
    }

    pub fn inverse_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.iter().zip(&self.inv_diag).map(|(ri, di)| ri * di).collect()
    }
}

/// No preconditioning
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_missing_pivot_falls_back_to_identity() {
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(0, 0, 2.0);
        tri.add_triplet(1, 1, 4.0);
        tri.add_triplet(0, 1, 1.0);
        let a: CsMat<f64> = tri.to_csr();

        let jacobi = JacobiPreconditioner::new(&a);
        assert_eq!(jacobi.inverse_diagonal(), &[0.5, 0.25, 1.0]);
        assert_eq!(jacobi.apply(&[2.0, 2.0, 5.0]), vec![1.0, 0.5, 5.0]);
    }

    #[test]
    fn test_identity_copies() {
        assert_eq!(IdentityPreconditioner.apply(&[1.0, -2.0]), vec![1.0, -2.0]);
    }
}
