//! Analysis of experiment results
//!
//! Toyota Way: Genchi Genbutsu (go and see)
//! - Look at the core-model data before fitting anything to it
//! - Compare surrogate output against the ground truth it replaces
//!
//! - [`display_experiments`]: text summary and rank-correlation matrix
//! - [`feature_scores`]: per-measure input importance
//! - [`contrast_experiments`]: KS statistic and central-interval overlap

mod contrast;
mod display;
mod scores;
mod stats;

pub use contrast::{contrast_experiments, ContrastReport, MeasureContrast};
pub use display::display_experiments;
pub use scores::{feature_scores, FeatureScores};

use crate::experiment::ExperimentFrame;
use crate::scope::Scope;
use crate::{Error, Result};

fn check_scope(scope: &Scope, experiments: &ExperimentFrame) -> Result<()> {
    if experiments.scope_name() == scope.name() {
        Ok(())
    } else {
        Err(Error::ScopeMismatch {
            expected: scope.name().to_string(),
            actual: experiments.scope_name().to_string(),
        })
    }
}
