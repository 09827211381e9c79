//! Experimental designs
//!
//! A design is a named set of input-factor combinations for a scope, drawn
//! by a [`Sampler`]. Every draw is driven by an explicit seed, so the same
//! scope, sample count, sampler and seed always reproduce the same design.
//!
//! ```rust
//! use surrogate_db::design::{design_experiments, DesignOptions, Sampler};
//! use surrogate_db::scope::{Measure, Parameter, ParameterType, Scope};
//!
//! let scope = Scope::builder("toy")
//!     .parameter(Parameter::real("x", ParameterType::Uncertainty, 0.0, 1.0))
//!     .measure(Measure::new("y"))
//!     .build()?;
//!
//! let design = design_experiments(&scope, 100, Sampler::Lhs, &DesignOptions::default(), None)?;
//! assert_eq!(design.len(), 100);
//! assert_eq!(design.name(), "lhs");
//! # Ok::<(), surrogate_db::Error>(())
//! ```

mod sampler;

pub use sampler::Sampler;

use crate::database::Database;
use crate::experiment::{ExperimentFrame, Source};
use crate::logging::TimingLog;
use crate::scope::Scope;
use crate::{Error, Result};

/// Options for [`design_experiments`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignOptions {
    /// Seed for the sampler's generator.
    pub seed: u64,
    /// Design name; defaults to the sampler's short name, suffixed if taken.
    pub design_name: Option<String>,
}

impl DesignOptions {
    /// Set the seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set an explicit design name.
    #[must_use]
    pub fn design_name(mut self, name: impl Into<String>) -> Self {
        self.design_name = Some(name.into());
        self
    }
}

/// A named set of input rows for one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    name: String,
    sampler: Sampler,
    seed: u64,
    frame: ExperimentFrame,
}

impl Design {
    /// Wrap existing input rows (for example, read back from a store).
    #[must_use]
    pub fn from_frame(
        name: impl Into<String>,
        sampler: Sampler,
        seed: u64,
        frame: ExperimentFrame,
    ) -> Self {
        Self {
            name: name.into(),
            sampler,
            seed,
            frame,
        }
    }

    /// Design name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sampler that produced it.
    #[must_use]
    pub const fn sampler(&self) -> Sampler {
        self.sampler
    }

    /// Seed used.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Input rows.
    #[must_use]
    pub const fn frame(&self) -> &ExperimentFrame {
        &self.frame
    }

    /// Number of design points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    /// True for a design with no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Take the input rows.
    #[must_use]
    pub fn into_frame(self) -> ExperimentFrame {
        self.frame
    }
}

/// Draw `n_samples` design points for `scope`.
///
/// Uncertainties and levers are sampled, constants take their default.
/// [`Sampler::Reference`] always yields exactly one row. With a store, the
/// scope is stored if needed and the design recorded under a name not yet
/// used for the scope; the returned rows carry store-assigned experiment ids.
///
/// # Errors
///
/// Returns `InvalidInput` for zero samples or an explicit design name that
/// already exists, and store errors when recording the design.
pub fn design_experiments(
    scope: &Scope,
    n_samples: usize,
    sampler: Sampler,
    options: &DesignOptions,
    db: Option<&mut Database>,
) -> Result<Design> {
    let n = if sampler == Sampler::Reference { 1 } else { n_samples };
    if n == 0 {
        return Err(Error::InvalidInput("n_samples must be greater than 0".to_string()));
    }

    let _timer = TimingLog::new(format!("design {n} experiments ({sampler})"));
    let mut rng = Sampler::rng(options.seed);
    let columns: Vec<Vec<f64>> = scope
        .parameters()
        .iter()
        .map(|p| sampler.draw(p, n, &mut rng))
        .collect();

    let mut frame = ExperimentFrame::new(scope.name(), &scope.parameter_names())?;
    let mut row = vec![0.0; columns.len()];
    for i in 0..n {
        for (slot, column) in row.iter_mut().zip(&columns) {
            *slot = column[i];
        }
        frame.push_row(i as u64 + 1, Source::CoreModel, &row)?;
    }

    let (name, frame) = match db {
        Some(db) => {
            db.write_scope(scope)?;
            let name = match &options.design_name {
                Some(name) if db.has_design(scope.name(), name) => {
                    return Err(Error::InvalidInput(format!(
                        "design {name} already exists for scope {}",
                        scope.name()
                    )));
                }
                Some(name) => name.clone(),
                None => db.unique_design_name(scope.name(), sampler.short_name()),
            };
            let frame = db.write_design(scope.name(), &name, &frame, Some(sampler.short_name()))?;
            (name, frame)
        }
        None => (
            options
                .design_name
                .clone()
                .unwrap_or_else(|| sampler.short_name().to_string()),
            frame,
        ),
    };

    tracing::info!(
        scope = %scope.name(),
        design = %name,
        rows = frame.len(),
        seed = options.seed,
        "designed experiments"
    );
    Ok(Design {
        name,
        sampler,
        seed: options.seed,
        frame,
    })
}

impl Scope {
    /// Draw a design for this scope without recording it anywhere.
    ///
    /// # Errors
    ///
    /// See [`design_experiments`].
    pub fn design_experiments(
        &self,
        n_samples: usize,
        sampler: Sampler,
        seed: u64,
    ) -> Result<Design> {
        let options = DesignOptions::default().seed(seed);
        design_experiments(self, n_samples, sampler, &options, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Distribution, Measure, Parameter, ParameterType};

    fn scope() -> Scope {
        Scope::builder("toy")
            .parameter(
                Parameter::real("x", ParameterType::Uncertainty, 0.0, 4.0)
                    .with_dist(Distribution::Triangular { peak: 1.0 }),
            )
            .parameter(Parameter::integer("k", ParameterType::Lever, 1, 3))
            .parameter(Parameter::boolean("flag", ParameterType::Uncertainty))
            .parameter(Parameter::constant("year", 2040.0))
            .measure(Measure::new("y"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_same_seed_same_design() {
        let s = scope();
        let a = s.design_experiments(50, Sampler::MonteCarlo, 7).unwrap();
        let b = s.design_experiments(50, Sampler::MonteCarlo, 7).unwrap();
        let c = s.design_experiments(50, Sampler::MonteCarlo, 8).unwrap();
        assert_eq!(a.frame(), b.frame());
        assert_ne!(a.frame(), c.frame());
    }

    #[test]
    fn test_values_respect_scope() {
        let s = scope();
        let design = s.design_experiments(200, Sampler::Lhs, 1).unwrap();
        let frame = design.frame();
        assert_eq!(frame.column_names(), vec!["x", "k", "flag", "year"]);
        assert!(frame.column("x").unwrap().iter().all(|v| (0.0..=4.0).contains(v)));
        assert!(frame
            .column("k")
            .unwrap()
            .iter()
            .all(|v| [1.0, 2.0, 3.0].contains(v)));
        assert!(frame.column("flag").unwrap().iter().all(|v| *v == 0.0 || *v == 1.0));
        assert!(frame.column("year").unwrap().iter().all(|v| *v == 2040.0));
    }

    #[test]
    fn test_reference_is_one_row_of_defaults() {
        let design = scope().design_experiments(10, Sampler::Reference, 0).unwrap();
        assert_eq!(design.len(), 1);
        assert_eq!(design.frame().row(0).unwrap(), vec![2.0, 2.0, 0.0, 2040.0]);
    }

    #[test]
    fn test_zero_samples_rejected() {
        assert!(scope().design_experiments(0, Sampler::Lhs, 0).is_err());
    }

    #[test]
    fn test_store_names_designs_uniquely() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("d.db"), true).unwrap();
        let s = scope();

        let defaults = DesignOptions::default();
        let first =
            design_experiments(&s, 20, Sampler::MonteCarlo, &defaults, Some(&mut db)).unwrap();
        let reseeded = defaults.clone().seed(1);
        let second =
            design_experiments(&s, 20, Sampler::MonteCarlo, &reseeded, Some(&mut db)).unwrap();

        assert_eq!(first.name(), "mc");
        assert_eq!(second.name(), "mc_2");
        assert_eq!(db.design_row_count("toy", "mc").unwrap(), 20);

        let clash = design_experiments(
            &s,
            5,
            Sampler::Lhs,
            &DesignOptions::default().design_name("mc"),
            Some(&mut db),
        );
        assert!(matches!(clash, Err(Error::InvalidInput(_))));
    }
}
