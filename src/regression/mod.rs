//! Regression backends for meta-models
//!
//! Toyota Way: Genchi Genbutsu (go and see)
//! - Every fit reports in-sample R² and a coefficient table
//! - Out-of-fold scores come from the same fitting path as the final model
//!
//! A [`Regressor`] maps normalized input rows to one measure. The default
//! [`RegressorKind::LinearGaussian`] fits ordinary least squares first and a
//! Gaussian process on its residuals, so trends extrapolate linearly while
//! local structure is still captured.

mod gaussian;
mod linalg;
mod linear;

pub use gaussian::{GaussianProcess, KernelParams};
pub use linear::{CoefficientSummary, LinearRegression, INTERCEPT};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which model family backs a regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressorKind {
    /// Ordinary least squares only.
    Linear,
    /// Least squares plus a Gaussian process on the residuals.
    #[default]
    LinearGaussian,
}

/// Settings shared by every regressor in a meta-model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Model family.
    pub kind: RegressorKind,
    /// Kernel settings for the residual process.
    pub kernel: KernelParams,
}

/// Regressor for a single measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regressor {
    kind: RegressorKind,
    linear: LinearRegression,
    residual: Option<GaussianProcess>,
    r2: f64,
}

impl Regressor {
    /// Fit to normalized rows `x` and targets `y`.
    ///
    /// # Errors
    ///
    /// Propagates fitting errors from the linear and Gaussian stages.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
        config: &RegressionConfig,
    ) -> Result<Self> {
        let linear = LinearRegression::fit(x, y, feature_names)?;
        let residual = match config.kind {
            RegressorKind::Linear => None,
            RegressorKind::LinearGaussian => {
                let residuals: Vec<f64> = x
                    .iter()
                    .zip(y)
                    .map(|(row, target)| target - linear.predict_row(row))
                    .collect();
                Some(GaussianProcess::fit(x, &residuals, config.kernel)?)
            }
        };
        let mut regressor = Self {
            kind: config.kind,
            linear,
            residual,
            r2: 0.0,
        };
        regressor.r2 = r_squared(y, &regressor.predict(x));
        Ok(regressor)
    }

    /// Predict one normalized row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let trend = self.linear.predict_row(row);
        self.residual
            .as_ref()
            .map_or(trend, |gp| trend + gp.predict_row(row))
    }

    /// Predict many normalized rows.
    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Model family.
    #[must_use]
    pub const fn kind(&self) -> RegressorKind {
        self.kind
    }

    /// The linear stage.
    #[must_use]
    pub const fn linear(&self) -> &LinearRegression {
        &self.linear
    }

    /// The residual process, if any.
    #[must_use]
    pub const fn residual(&self) -> Option<&GaussianProcess> {
        self.residual.as_ref()
    }

    /// In-sample R² of the full regressor.
    #[must_use]
    pub const fn r2(&self) -> f64 {
        self.r2
    }
}

/// Coefficient of determination of `predicted` against `actual`.
///
/// A constant `actual` scores 1 when matched exactly and 0 otherwise.
#[must_use]
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Shuffled k-fold cross-validation.
///
/// Rows are shuffled with a generator seeded by `seed`, dealt into `k`
/// folds, and each fold is predicted by a regressor fitted on the others.
/// Returns the R² of the pooled out-of-fold predictions.
///
/// # Errors
///
/// Returns `InvalidInput` unless `2 <= k <= rows`, and propagates fitting
/// errors for any fold.
pub fn k_fold_r2(
    x: &[Vec<f64>],
    y: &[f64],
    feature_names: &[String],
    config: &RegressionConfig,
    k: usize,
    seed: u64,
) -> Result<f64> {
    let n = x.len();
    if k < 2 || k > n {
        return Err(Error::InvalidInput(format!(
            "cross-validation needs 2 <= k <= rows, got k={k} for {n} rows"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut out_of_fold = vec![0.0; n];
    for fold in 0..k {
        let (test, train): (Vec<(usize, usize)>, Vec<(usize, usize)>) = order
            .iter()
            .copied()
            .enumerate()
            .partition(|(pos, _)| pos % k == fold);

        let train_x: Vec<Vec<f64>> = train.iter().map(|(_, i)| x[*i].clone()).collect();
        let train_y: Vec<f64> = train.iter().map(|(_, i)| y[*i]).collect();
        let model = Regressor::fit(&train_x, &train_y, feature_names, config)?;
        for (_, i) in test {
            out_of_fold[i] = model.predict_row(&x[i]);
        }
    }
    Ok(r_squared(y, &out_of_fold))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curved(n: u32) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = f64::from(i) / f64::from(n - 1);
                vec![a, ((a * 13.0).sin() + 1.0) / 2.0]
            })
            .collect();
        let y = x
            .iter()
            .map(|r| 1.0 + 2.0 * r[0] + (3.0 * r[1]).powi(2))
            .collect();
        (x, y)
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_residual_process_improves_fit() {
        let (x, y) = curved(40);
        let linear = Regressor::fit(
            &x,
            &y,
            &names(),
            &RegressionConfig {
                kind: RegressorKind::Linear,
                ..RegressionConfig::default()
            },
        )
        .unwrap();
        let full = Regressor::fit(&x, &y, &names(), &RegressionConfig::default()).unwrap();

        assert!(linear.residual().is_none());
        assert!(full.residual().is_some());
        assert!(full.r2() > linear.r2());
        assert!(full.r2() > 0.99);
    }

    #[test]
    fn test_k_fold_is_seeded() {
        let (x, y) = curved(30);
        let config = RegressionConfig::default();
        let a = k_fold_r2(&x, &y, &names(), &config, 5, 3).unwrap();
        let b = k_fold_r2(&x, &y, &names(), &config, 5, 3).unwrap();
        assert_eq!(a, b);
        assert!(a > 0.5);
    }

    #[test]
    fn test_k_fold_bounds() {
        let (x, y) = curved(5);
        let config = RegressionConfig::default();
        assert!(k_fold_r2(&x, &y, &names(), &config, 1, 0).is_err());
        assert!(k_fold_r2(&x, &y, &names(), &config, 6, 0).is_err());
    }

    #[test]
    fn test_r_squared_edge_cases() {
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = curved(12);
        let model = Regressor::fit(&x, &y, &names(), &RegressionConfig::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: Regressor = serde_json::from_str(&json).unwrap();
        let delta = model.predict_row(&[0.3, 0.7]) - back.predict_row(&[0.3, 0.7]);
        assert!(delta.abs() < 1e-9);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_r_squared_of_perfect_prediction_is_one(
                values in prop::collection::vec(-1e3f64..1e3, 2..50)
            ) {
                prop_assert!((r_squared(&values, &values) - 1.0).abs() < 1e-12);
            }

            #[test]
            fn prop_linear_fit_reproduces_lines(
                slope in -10.0f64..10.0,
                intercept in -10.0f64..10.0,
            ) {
                let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i) / 9.0]).collect();
                let y: Vec<f64> = x.iter().map(|r| intercept + slope * r[0]).collect();
                let lr = LinearRegression::fit(&x, &y, &["x".to_string()]).unwrap();
                prop_assert!((lr.coefficients()[0] - slope).abs() < 1e-6);
                prop_assert!((lr.intercept() - intercept).abs() < 1e-6);
            }
        }
    }
}
