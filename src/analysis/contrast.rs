//! Distributional contrast between two sets of experiments

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scores::truncate;
use super::{check_scope, stats};
use crate::experiment::ExperimentFrame;
use crate::scope::Scope;
use crate::{Error, Result};

/// Comparison of one measure across two sets of experiments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureContrast {
    /// Measure name.
    pub measure: String,
    /// Present values in the first set.
    pub n_a: usize,
    /// Present values in the second set.
    pub n_b: usize,
    /// Mean of the first set.
    pub mean_a: f64,
    /// Mean of the second set.
    pub mean_b: f64,
    /// Central interval of the first set.
    pub interval_a: (f64, f64),
    /// Central interval of the second set.
    pub interval_b: (f64, f64),
    /// Two-sample Kolmogorov-Smirnov statistic in `[0, 1]`.
    pub ks: f64,
    /// Intersection over union of the two central intervals, in `[0, 1]`.
    pub overlap: f64,
}

/// Result of [`contrast_experiments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastReport {
    /// Percent of probability mass in each central interval.
    pub mass: f64,
    /// One entry per measure present in both sets, in scope order.
    pub measures: Vec<MeasureContrast>,
}

impl ContrastReport {
    /// Contrast of one measure.
    #[must_use]
    pub fn measure(&self, name: &str) -> Option<&MeasureContrast> {
        self.measures.iter().find(|m| m.measure == name)
    }

    /// Largest KS statistic across measures; 0 when every distribution matches.
    #[must_use]
    pub fn divergence(&self) -> f64 {
        self.measures.iter().map(|m| m.ks).fold(0.0, f64::max)
    }
}

impl fmt::Display for ContrastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<32} {:>12} {:>12} {:>8} {:>8}",
            "measure", "mean a", "mean b", "ks", "overlap"
        )?;
        for m in &self.measures {
            writeln!(
                f,
                "{:<32} {:>12.4} {:>12.4} {:>8.3} {:>8.3}",
                truncate(&m.measure, 32),
                m.mean_a,
                m.mean_b,
                m.ks,
                m.overlap
            )?;
        }
        write!(f, "central mass {}%, divergence {:.3}", self.mass, self.divergence())
    }
}

/// Contrast two sets of experiments of the same scope, typically
/// meta-model results against core-model results.
///
/// `mass` is the percent of probability mass, in `(0, 100]`, of the
/// central interval compared for each measure; 100 compares full ranges.
///
/// # Errors
///
/// Returns `InvalidInput` for `mass` outside `(0, 100]` and
/// `ScopeMismatch` if either set belongs to another scope.
pub fn contrast_experiments(
    scope: &Scope,
    a: &ExperimentFrame,
    b: &ExperimentFrame,
    mass: f64,
) -> Result<ContrastReport> {
    if !(mass > 0.0 && mass <= 100.0) {
        return Err(Error::InvalidInput(format!(
            "mass must be in (0, 100], got {mass}"
        )));
    }
    check_scope(scope, a)?;
    check_scope(scope, b)?;

    let tail = (1.0 - mass / 100.0) / 2.0;
    let mut measures = Vec::new();
    for measure in scope.measures() {
        let (Some(col_a), Some(col_b)) = (a.column(measure.name()), b.column(measure.name()))
        else {
            continue;
        };
        let sa = stats::sorted_finite(col_a);
        let sb = stats::sorted_finite(col_b);
        if sa.is_empty() || sb.is_empty() {
            continue;
        }

        let interval_a = (
            stats::quantile(&sa, tail),
            stats::quantile(&sa, 1.0 - tail),
        );
        let interval_b = (
            stats::quantile(&sb, tail),
            stats::quantile(&sb, 1.0 - tail),
        );
        measures.push(MeasureContrast {
            measure: measure.name().to_string(),
            n_a: sa.len(),
            n_b: sb.len(),
            mean_a: stats::finite_mean(&sa),
            mean_b: stats::finite_mean(&sb),
            interval_a,
            interval_b,
            ks: stats::ks_statistic(&sa, &sb),
            overlap: interval_overlap(interval_a, interval_b),
        });
    }

    let report = ContrastReport { mass, measures };
    tracing::info!(
        scope = %scope.name(),
        measures = report.measures.len(),
        divergence = report.divergence(),
        "contrasted experiments"
    );
    Ok(report)
}

fn interval_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let union = a.1.max(b.1) - a.0.min(b.0);
    if union <= 0.0 {
        return 1.0;
    }
    let intersection = (a.1.min(b.1) - a.0.max(b.0)).max(0.0);
    intersection / union
}
