//! Ordinary least squares with intercept

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::linalg;
use super::r_squared;
use crate::{Error, Result};

/// Relative ridge added to the normal equations so that collinear or
/// duplicated inputs still factor.
const RIDGE: f64 = 1e-10;

/// Name reported for the intercept term.
pub const INTERCEPT: &str = "(Intercept)";

/// One row of a coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    /// Term name (`(Intercept)` or an input name).
    pub name: String,
    /// Estimated coefficient.
    pub estimate: f64,
    /// Standard error; `None` without residual degrees of freedom.
    pub std_error: Option<f64>,
    /// Estimate over standard error.
    pub t_value: Option<f64>,
}

/// Fitted linear model `y = b0 + Σ bᵢ xᵢ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    feature_names: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
    summary: Vec<CoefficientSummary>,
    r2: f64,
    n_samples: usize,
}

impl LinearRegression {
    /// Fit by least squares.
    ///
    /// `x` holds one row per sample with one value per feature name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for fewer than two samples or ragged rows, and
    /// `SingularMatrix` if the normal equations cannot be factored.
    pub fn fit(x: &[Vec<f64>], y: &[f64], feature_names: &[String]) -> Result<Self> {
        let n = x.len();
        let p = feature_names.len();
        if n < 2 || y.len() != n {
            return Err(Error::InvalidInput(format!(
                "linear fit needs 2+ samples with one target each, got {n} rows, {} targets",
                y.len()
            )));
        }
        if let Some(bad) = x.iter().position(|row| row.len() != p) {
            return Err(Error::InvalidInput(format!(
                "row {bad} has {} features, expected {p}",
                x[bad].len()
            )));
        }

        // Normal equations over [1, x1, .., xp].
        let dim = p + 1;
        let design = DMatrix::from_fn(n, dim, |i, j| if j == 0 { 1.0 } else { x[i][j - 1] });
        let mut xtx = design.tr_mul(&design);
        let xty = design.tr_mul(&DVector::from_column_slice(y));
        let ridge = RIDGE * linalg::max_diagonal(&xtx).max(1.0);
        xtx += DMatrix::identity(dim, dim) * ridge;

        let chol = linalg::factor_with_jitter(&xtx, 4)?;
        let beta = linalg::solve(&chol, xty.as_slice());

        let mut model = Self {
            feature_names: feature_names.to_vec(),
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
            summary: Vec::new(),
            r2: 0.0,
            n_samples: n,
        };

        let fitted = model.predict(x);
        model.r2 = r_squared(y, &fitted);

        let sse: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
        let dof = n.saturating_sub(dim);
        #[allow(clippy::cast_precision_loss)]
        let sigma2 = (dof > 0).then(|| sse / dof as f64);
        let inv_diag = linalg::inverse_diagonal(&chol);

        let names = std::iter::once(INTERCEPT.to_string()).chain(feature_names.iter().cloned());
        model.summary = names
            .zip(&beta)
            .zip(&inv_diag)
            .map(|((name, &estimate), &v)| {
                let std_error = sigma2.map(|s2| (s2 * v).max(0.0).sqrt());
                let t_value = std_error.filter(|se| *se > 0.0).map(|se| estimate / se);
                CoefficientSummary {
                    name,
                    estimate,
                    std_error,
                    t_value,
                }
            })
            .collect();

        tracing::debug!(
            samples = n,
            features = p,
            r2 = model.r2,
            "fitted linear regression"
        );
        Ok(model)
    }

    /// Predict one row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    /// Predict many rows.
    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// In-sample coefficient of determination.
    #[must_use]
    pub const fn r2(&self) -> f64 {
        self.r2
    }

    /// Intercept term.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Slopes, one per feature.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Feature names in fit order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of samples fitted.
    #[must_use]
    pub const fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Coefficient table, intercept first.
    #[must_use]
    pub fn coefficients_summary(&self) -> &[CoefficientSummary] {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("x{i}")).collect()
    }

    #[test]
    fn test_recovers_exact_plane() {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let a = f64::from(i) / 19.0;
                vec![a, (a * 7.0).sin()]
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 + 2.0 * r[0] - r[1]).collect();

        let lr = LinearRegression::fit(&x, &y, &names(2)).unwrap();
        assert!((lr.intercept() - 3.0).abs() < 1e-6);
        assert!((lr.coefficients()[0] - 2.0).abs() < 1e-6);
        assert!((lr.coefficients()[1] + 1.0).abs() < 1e-6);
        assert!(lr.r2() > 0.999_999);
    }

    #[test]
    fn test_summary_has_intercept_first() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..10)
            .map(|i| 1.0 + f64::from(i) + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();

        let lr = LinearRegression::fit(&x, &y, &names(1)).unwrap();
        let summary = lr.coefficients_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].name, INTERCEPT);
        assert_eq!(summary[1].name, "x0");
        let se = summary[1].std_error.unwrap();
        assert!(se > 0.0);
        assert!(summary[1].t_value.unwrap() > 10.0);
    }

    #[test]
    fn test_no_dof_leaves_std_error_empty() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![1.0, 3.0];
        let lr = LinearRegression::fit(&x, &y, &names(1)).unwrap();
        assert!(lr.coefficients_summary().iter().all(|c| c.std_error.is_none()));
    }

    #[test]
    fn test_duplicate_feature_still_fits() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i), f64::from(i)]).collect();
        let y: Vec<f64> = (0..8).map(|i| 2.0 * f64::from(i)).collect();
        let lr = LinearRegression::fit(&x, &y, &names(2)).unwrap();
        assert!(lr.r2() > 0.999);
    }

    #[test]
    fn test_too_few_rows() {
        let err = LinearRegression::fit(&[vec![1.0]], &[1.0], &names(1));
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }
}
