//! Symmetric positive-definite solves
//!
//! Thin layer over nalgebra's Cholesky: a jitter-retry loop for nearly
//! singular systems and conversions to and from plain slices.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::{Error, Result};

/// Cholesky factor of a dynamically sized matrix.
pub(crate) type SpdFactor = Cholesky<f64, Dyn>;

/// Largest absolute diagonal entry, 0 for an empty matrix.
pub(crate) fn max_diagonal(a: &DMatrix<f64>) -> f64 {
    a.diagonal().iter().map(|d| d.abs()).fold(0.0, f64::max)
}

/// Factor a symmetric positive-definite matrix.
///
/// Only the lower triangle of `a` is read.
pub(crate) fn factor(a: DMatrix<f64>) -> Result<SpdFactor> {
    let n = a.nrows();
    a.cholesky().ok_or_else(|| {
        Error::SingularMatrix(format!("{n}x{n} system is not positive definite"))
    })
}

/// Factor, retrying with growing diagonal jitter on failure.
pub(crate) fn factor_with_jitter(a: &DMatrix<f64>, attempts: u32) -> Result<SpdFactor> {
    let n = a.nrows();
    let mut last = factor(a.clone());
    let mut jitter = max_diagonal(a).max(1.0) * 1e-10;
    for _ in 0..attempts {
        if last.is_ok() {
            break;
        }
        tracing::debug!(jitter, "retrying Cholesky with jitter");
        last = factor(a + DMatrix::identity(n, n) * jitter);
        jitter *= 100.0;
    }
    last
}

/// Solve `A x = b` for a slice right-hand side.
pub(crate) fn solve(chol: &SpdFactor, b: &[f64]) -> Vec<f64> {
    chol.solve(&DVector::from_column_slice(b))
        .iter()
        .copied()
        .collect()
}

/// Diagonal of `A⁻¹`.
pub(crate) fn inverse_diagonal(chol: &SpdFactor) -> Vec<f64> {
    chol.inverse().diagonal().iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0])
    }

    #[test]
    fn test_solve_small_system() {
        let chol = factor(spd()).unwrap();
        let x = solve(&chol, &[2.0, 5.0]);
        // 4x + 2y = 2, 2x + 3y = 5 -> x = -0.5, y = 2
        assert!((x[0] + 0.5).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_diagonal() {
        let chol = factor(spd()).unwrap();
        let d = inverse_diagonal(&chol);
        // inverse = [[3, -2], [-2, 4]] / 8
        assert!((d[0] - 0.375).abs() < 1e-12);
        assert!((d[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_max_diagonal() {
        assert_eq!(max_diagonal(&spd()), 4.0);
        assert_eq!(max_diagonal(&DMatrix::zeros(0, 0)), 0.0);
    }

    #[test]
    fn test_singular_detected_and_jitter_recovers() {
        let a = DMatrix::from_element(2, 2, 1.0);
        assert!(matches!(factor(a.clone()), Err(Error::SingularMatrix(_))));
        assert!(factor_with_jitter(&a, 4).is_ok());
    }
}
