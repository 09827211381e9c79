//! Gaussian process regression with a squared-exponential kernel
//!
//! Used to model what a linear fit leaves behind: the process is trained on
//! linear residuals and its posterior mean is added back at prediction time.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::linalg;
use crate::{Error, Result};

/// Kernel hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelParams {
    /// RBF length scale in normalized input units.
    pub length_scale: f64,
    /// Observation noise as a fraction of the signal variance.
    pub noise_ratio: f64,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            length_scale: 0.5,
            noise_ratio: 0.01,
        }
    }
}

/// Posterior mean of a zero-mean Gaussian process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianProcess {
    params: KernelParams,
    signal_variance: f64,
    train_x: Vec<Vec<f64>>,
    alpha: Vec<f64>,
}

impl GaussianProcess {
    /// Fit to `(x, y)`.
    ///
    /// The signal variance is the sample variance of `y`. A constant target
    /// yields a process that predicts zero everywhere.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for bad hyper-parameters or mismatched lengths,
    /// and `SingularMatrix` if the kernel matrix cannot be factored.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: KernelParams) -> Result<Self> {
        if !(params.length_scale > 0.0) || !(params.noise_ratio >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "kernel needs length_scale > 0 and noise_ratio >= 0, got {params:?}"
            )));
        }
        if x.len() != y.len() || x.is_empty() {
            return Err(Error::InvalidInput(format!(
                "gaussian process needs matching non-empty inputs, got {} rows and {} targets",
                x.len(),
                y.len()
            )));
        }

        #[allow(clippy::cast_precision_loss)]
        let n = x.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let signal_variance = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        if signal_variance <= f64::EPSILON {
            return Ok(Self {
                params,
                signal_variance: 0.0,
                train_x: Vec::new(),
                alpha: Vec::new(),
            });
        }

        let noise = params.noise_ratio * signal_variance;
        let gram = DMatrix::from_fn(x.len(), x.len(), |i, j| {
            let k = rbf(&x[i], &x[j], params.length_scale, signal_variance);
            if i == j {
                k + noise
            } else {
                k
            }
        });

        let chol = linalg::factor_with_jitter(&gram, 6)?;
        let alpha = linalg::solve(&chol, y);

        tracing::debug!(
            samples = x.len(),
            length_scale = params.length_scale,
            signal_variance,
            "fitted gaussian process"
        );
        Ok(Self {
            params,
            signal_variance,
            train_x: x.to_vec(),
            alpha,
        })
    }

    /// Posterior mean at one point.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.train_x
            .iter()
            .zip(&self.alpha)
            .map(|(xi, a)| a * rbf(row, xi, self.params.length_scale, self.signal_variance))
            .sum()
    }

    /// Kernel hyper-parameters.
    #[must_use]
    pub const fn params(&self) -> KernelParams {
        self.params
    }

    /// Number of training points retained.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.train_x.len()
    }
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64, variance: f64) -> f64 {
    let d2: f64 = a.iter().zip(b).map(|(u, v)| (u - v).powi(2)).sum();
    variance * (-d2 / (2.0 * length_scale * length_scale)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_smooth_curve() {
        let x: Vec<Vec<f64>> = (0..15).map(|i| vec![f64::from(i) / 14.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| (r[0] * 6.0).sin()).collect();
        let params = KernelParams {
            length_scale: 0.2,
            noise_ratio: 1e-6,
        };
        let gp = GaussianProcess::fit(&x, &y, params).unwrap();

        for (row, target) in x.iter().zip(&y) {
            assert!((gp.predict_row(row) - target).abs() < 1e-2);
        }
        // between training points
        let mid = gp.predict_row(&[0.5 / 14.0]);
        assert!((mid - (3.0_f64 / 14.0).sin()).abs() < 0.05);
    }

    #[test]
    fn test_constant_target_predicts_zero() {
        let x = vec![vec![0.0], vec![1.0]];
        let gp = GaussianProcess::fit(&x, &[4.0, 4.0], KernelParams::default()).unwrap();
        assert_eq!(gp.n_train(), 0);
        assert_eq!(gp.predict_row(&[0.5]), 0.0);
    }

    #[test]
    fn test_rejects_bad_length_scale() {
        let params = KernelParams {
            length_scale: 0.0,
            noise_ratio: 0.1,
        };
        assert!(GaussianProcess::fit(&[vec![0.0]], &[1.0], params).is_err());
    }
}
