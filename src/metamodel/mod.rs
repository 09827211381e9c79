//! Meta-models: fitted surrogates of the core model
//!
//! A [`MetaModel`] carries the scope it was fitted against, one
//! [`Regressor`] per measure, and the normalized training rows it needs to
//! re-run cross-validation after being reloaded from a store.
//!
//! ```rust
//! use surrogate_db::design::Sampler;
//! use surrogate_db::experiment::{ExperimentFrame, Source};
//! use surrogate_db::metamodel::{create_metamodel, MetaModelConfig};
//! use surrogate_db::scope::{Measure, Parameter, ParameterType, Scope};
//!
//! let scope = Scope::builder("toy")
//!     .parameter(Parameter::real("x", ParameterType::Uncertainty, 0.0, 1.0))
//!     .measure(Measure::new("y"))
//!     .build()?;
//!
//! let mut runs = ExperimentFrame::new("toy", &["x", "y"])?;
//! for i in 0..20u32 {
//!     let x = f64::from(i) / 19.0;
//!     runs.push_row(u64::from(i) + 1, Source::CoreModel, &[x, 2.0 * x + 1.0])?;
//! }
//!
//! let mm = create_metamodel(&scope, &runs, None, &MetaModelConfig::default())?;
//! let design = scope.design_experiments(100, Sampler::MonteCarlo, 0)?;
//! let predicted = mm.evaluate(design.frame())?;
//! assert_eq!(predicted.len(), 100);
//! # Ok::<(), surrogate_db::Error>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::design::Design;
use crate::experiment::{ExperimentFrame, Source};
use crate::regression::{k_fold_r2, CoefficientSummary, RegressionConfig, Regressor};
use crate::scope::{Parameter, Scope, Transform};
use crate::{Error, Result};

/// Settings for [`create_metamodel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaModelConfig {
    /// Regression family and kernel settings.
    pub regression: RegressionConfig,
    /// Measures with fewer usable rows than this are not fitted.
    pub min_rows: usize,
}

impl Default for MetaModelConfig {
    fn default() -> Self {
        Self {
            regression: RegressionConfig::default(),
            min_rows: 5,
        }
    }
}

/// Fit quality of one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureFit {
    /// Measure name.
    pub measure: String,
    /// Rows used for fitting.
    pub n_rows: usize,
    /// In-sample R² of the full regressor (transformed scale).
    pub r2: f64,
    /// In-sample R² of the linear stage alone.
    pub linear_r2: f64,
    /// Linear coefficient table, intercept first.
    pub coefficients: Vec<CoefficientSummary>,
}

/// Out-of-fold score of one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValScore {
    /// Measure name.
    pub measure: String,
    /// Pooled out-of-fold R².
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedMeasure {
    name: String,
    transform: Transform,
    regressor: Regressor,
    /// Indexes into the model's training rows.
    rows: Vec<usize>,
    /// Targets on the transformed scale, aligned with `rows`.
    targets: Vec<f64>,
}

/// A fitted surrogate for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaModel {
    metamodel_id: u32,
    scope: Scope,
    config: MetaModelConfig,
    /// Non-constant inputs in scope order.
    inputs: Vec<Parameter>,
    outputs: Vec<FittedMeasure>,
    /// Normalized training rows shared by every output.
    train_x: Vec<Vec<f64>>,
}

/// Fit a meta-model of `scope` to core-model results.
///
/// Inputs are the scope's non-constant parameters, normalized to `[0, 1]` by
/// their bounds. Every measure present in `experiments` with at least
/// `config.min_rows` usable values is fitted; rows with a missing input are
/// dropped. Measures with an `Ln` transform are fitted on `ln(y)`.
///
/// With a store, the scope is recorded if needed, the model receives the
/// next free meta-model id and is persisted. Without one its id is 1.
///
/// # Errors
///
/// Returns `ScopeMismatch`/`SchemaMismatch` if `experiments` does not fit
/// `scope` or lacks an input column, `InvalidInput` if a log-transformed
/// measure has a non-positive value or no measure has enough rows, and
/// fitting or store errors.
pub fn create_metamodel(
    scope: &Scope,
    experiments: &ExperimentFrame,
    db: Option<&mut Database>,
    config: &MetaModelConfig,
) -> Result<MetaModel> {
    experiments.validate_against(scope)?;
    let inputs: Vec<Parameter> = scope
        .parameters()
        .iter()
        .filter(|p| !p.is_constant())
        .cloned()
        .collect();
    let input_columns = input_columns(&inputs, experiments)?;

    let usable: Vec<usize> = (0..experiments.len())
        .filter(|&i| input_columns.iter().all(|c| c[i].is_finite()))
        .collect();
    let train_x: Vec<Vec<f64>> = usable
        .iter()
        .map(|&i| normalized_row(&inputs, &input_columns, i))
        .collect();
    let feature_names: Vec<String> = inputs.iter().map(|p| p.name().to_string()).collect();

    let mut outputs = Vec::new();
    for measure in scope.measures() {
        let Some(values) = experiments.column(measure.name()) else {
            continue;
        };
        let (rows, raw): (Vec<usize>, Vec<f64>) = usable
            .iter()
            .enumerate()
            .map(|(pos, &i)| (pos, values[i]))
            .filter(|(_, y)| y.is_finite())
            .unzip();
        if rows.len() < config.min_rows.max(2) {
            tracing::warn!(
                measure = %measure.name(),
                rows = rows.len(),
                min_rows = config.min_rows,
                "skipping measure with too few rows"
            );
            continue;
        }
        if measure.transform() == Transform::Ln && raw.iter().any(|y| *y <= 0.0) {
            return Err(Error::InvalidInput(format!(
                "measure `{}` is log-transformed but has non-positive values",
                measure.name()
            )));
        }

        let targets: Vec<f64> = raw.iter().map(|y| measure.transform().forward(*y)).collect();
        let x: Vec<Vec<f64>> = rows.iter().map(|&r| train_x[r].clone()).collect();
        let regressor = Regressor::fit(&x, &targets, &feature_names, &config.regression)?;
        tracing::info!(
            measure = %measure.name(),
            rows = rows.len(),
            r2 = regressor.r2(),
            linear_r2 = regressor.linear().r2(),
            "fitted measure"
        );
        outputs.push(FittedMeasure {
            name: measure.name().to_string(),
            transform: measure.transform(),
            regressor,
            rows,
            targets,
        });
    }

    if outputs.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no measure of scope {} has at least {} usable rows",
            scope.name(),
            config.min_rows
        )));
    }

    let mut model = MetaModel {
        metamodel_id: 1,
        scope: scope.clone(),
        config: *config,
        inputs,
        outputs,
        train_x,
    };

    if let Some(db) = db {
        db.write_scope(scope)?;
        model.metamodel_id = db.new_metamodel_id();
        db.write_metamodel(scope.name(), model.metamodel_id, &model)?;
    }

    tracing::info!(
        scope = %scope.name(),
        metamodel_id = model.metamodel_id,
        measures = model.outputs.len(),
        rows = model.train_x.len(),
        "created meta-model"
    );
    Ok(model)
}

impl MetaModel {
    /// Load a stored meta-model.
    ///
    /// # Errors
    ///
    /// Returns `MetaModelNotFound` or deserialization errors.
    pub fn load(db: &Database, metamodel_id: u32) -> Result<Self> {
        db.read_metamodel(metamodel_id)
    }

    /// Store-assigned id; also the provenance tag of its results.
    #[must_use]
    pub const fn metamodel_id(&self) -> u32 {
        self.metamodel_id
    }

    /// Provenance tag for rows this model produces.
    #[must_use]
    pub const fn source(&self) -> Source {
        Source::MetaModel(self.metamodel_id)
    }

    /// Scope the model was fitted against.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Names of the inputs the model reads.
    #[must_use]
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(Parameter::name).collect()
    }

    /// Names of the fitted measures.
    #[must_use]
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name.as_str()).collect()
    }

    /// Regressor for one measure.
    #[must_use]
    pub fn regressor(&self, measure: &str) -> Option<&Regressor> {
        self.outputs
            .iter()
            .find(|o| o.name == measure)
            .map(|o| &o.regressor)
    }

    /// Predict every fitted measure for each row of `design`.
    ///
    /// The result keeps the design's experiment ids and scope inputs, adds
    /// one column per fitted measure, and tags each row with this model's
    /// provenance.
    ///
    /// # Errors
    ///
    /// Returns `ScopeMismatch` for a frame of another scope,
    /// `SchemaMismatch` for a missing input column, and `InvalidInput` for a
    /// missing input value.
    pub fn evaluate(&self, design: &ExperimentFrame) -> Result<ExperimentFrame> {
        if design.scope_name() != self.scope.name() {
            return Err(Error::ScopeMismatch {
                expected: self.scope.name().to_string(),
                actual: design.scope_name().to_string(),
            });
        }
        let columns = input_columns(&self.inputs, design)?;
        if let Some((row, p)) = (0..design.len())
            .flat_map(|i| self.inputs.iter().enumerate().map(move |(j, p)| (i, j, p)))
            .find(|(i, j, _)| !columns[*j][*i].is_finite())
            .map(|(i, _, p)| (i, p))
        {
            return Err(Error::InvalidInput(format!(
                "row {row} has no value for input `{}`",
                p.name()
            )));
        }

        let rows: Vec<Vec<f64>> = (0..design.len())
            .map(|i| normalized_row(&self.inputs, &columns, i))
            .collect();

        let mut out = design.inputs(&self.scope).with_source(self.source());
        for output in &self.outputs {
            let values = rows
                .iter()
                .map(|row| output.transform.inverse(output.regressor.predict_row(row)))
                .collect();
            out.add_column(&output.name, values)?;
        }
        Ok(out)
    }

    /// Evaluate a design and, with a store, record the results under the
    /// design's name tagged with this model's provenance.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if the store holds a different version of the
    /// model's scope. See also [`evaluate`](Self::evaluate) and
    /// [`Database::write_experiments`].
    pub fn run_experiments(
        &self,
        design: &Design,
        db: Option<&mut Database>,
    ) -> Result<ExperimentFrame> {
        let results = self.evaluate(design.frame())?;
        let results = match db {
            Some(db) => {
                let stored = db.read_scope(self.scope.name())?;
                if stored.fingerprint() != self.scope.fingerprint() {
                    return Err(Error::SchemaMismatch(format!(
                        "meta-model {} was fitted against a different version of scope {}",
                        self.metamodel_id,
                        self.scope.name()
                    )));
                }
                db.write_experiments(self.scope.name(), design.name(), self.source(), &results)?
            }
            None => results,
        };
        tracing::info!(
            scope = %self.scope.name(),
            design = %design.name(),
            metamodel_id = self.metamodel_id,
            rows = results.len(),
            "ran meta-model experiments"
        );
        Ok(results)
    }

    /// Shuffled k-fold cross-validation of every fitted measure.
    ///
    /// Each fold is refitted with the model's own regression settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a measure has fewer than `k` rows, and
    /// fitting errors.
    pub fn cross_val_scores(&self, k: usize, seed: u64) -> Result<Vec<CrossValScore>> {
        let feature_names: Vec<String> =
            self.inputs.iter().map(|p| p.name().to_string()).collect();
        self.outputs
            .iter()
            .map(|output| {
                let x: Vec<Vec<f64>> =
                    output.rows.iter().map(|&r| self.train_x[r].clone()).collect();
                let r2 = k_fold_r2(
                    &x,
                    &output.targets,
                    &feature_names,
                    &self.config.regression,
                    k,
                    seed,
                )?;
                Ok(CrossValScore {
                    measure: output.name.clone(),
                    r2,
                })
            })
            .collect()
    }

    /// In-sample fit statistics of every fitted measure.
    #[must_use]
    pub fn fit_statistics(&self) -> Vec<MeasureFit> {
        self.outputs
            .iter()
            .map(|o| MeasureFit {
                measure: o.name.clone(),
                n_rows: o.rows.len(),
                r2: o.regressor.r2(),
                linear_r2: o.regressor.linear().r2(),
                coefficients: o.regressor.linear().coefficients_summary().to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for MetaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "MetaModel {} for scope {} ({} inputs, {} rows)",
            self.metamodel_id,
            self.scope.name(),
            self.inputs.len(),
            self.train_x.len()
        )?;
        for fit in self.fit_statistics() {
            writeln!(
                f,
                "  {:<32} r2={:.4} linear_r2={:.4} n={}",
                fit.measure, fit.r2, fit.linear_r2, fit.n_rows
            )?;
        }
        Ok(())
    }
}

fn input_columns<'a>(inputs: &[Parameter], frame: &'a ExperimentFrame) -> Result<Vec<&'a [f64]>> {
    inputs
        .iter()
        .map(|p| {
            frame.column(p.name()).ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "input `{}` missing from experiments of scope {}",
                    p.name(),
                    frame.scope_name()
                ))
            })
        })
        .collect()
}

fn normalized_row(inputs: &[Parameter], columns: &[&[f64]], i: usize) -> Vec<f64> {
    inputs
        .iter()
        .zip(columns)
        .map(|(p, c)| p.normalize(c[i]))
        .collect()
}
