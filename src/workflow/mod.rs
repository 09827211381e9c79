//! Meta-model development workflow
//!
//! Toyota Way: Standardized work
//! - Each step is a method; [`MetaModelWorkflow::run`] performs them in order
//! - A step that needs an earlier step's output fails instead of guessing
//!
//! Steps:
//! 1. open the source store
//! 2. load the stored scope
//! 3. load the core-model experiments
//! 4. load the updated scope (or reuse the stored one)
//! 5. display the experiments
//! 6. score features against the stored scope
//! 7. create the analysis store and record the updated scope and core results
//! 8. fit the meta-model (and cross-validate)
//! 9. design new experiments
//! 10. evaluate the meta-model on them
//! 11. contrast meta-model results with core-model results

mod config;

pub use config::WorkflowConfig;

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::analysis::{self, ContrastReport, FeatureScores};
use crate::database::{Database, ReadOptions};
use crate::design::{self, Design, DesignOptions};
use crate::experiment::{ExperimentFrame, Source};
use crate::logging::TimingLog;
use crate::metamodel::{create_metamodel, CrossValScore, MeasureFit, MetaModel};
use crate::scope::Scope;
use crate::{Error, Result};

/// Summary of a complete workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// Scopes found in the source store.
    pub scope_names: Vec<String>,
    /// Designs of the scope in the source store.
    pub design_names: Vec<String>,
    /// Core-model rows loaded.
    pub core_rows: usize,
    /// Input importance under the stored scope.
    pub feature_scores: FeatureScores,
    /// Id the analysis store gave the meta-model.
    pub metamodel_id: u32,
    /// In-sample fit per measure.
    pub fit: Vec<MeasureFit>,
    /// Out-of-fold scores; empty when cross-validation is off.
    pub cross_validation: Vec<CrossValScore>,
    /// Name of the new design.
    pub design_name: String,
    /// Meta-model rows produced for it.
    pub metamodel_rows: usize,
    /// Meta-model against core-model results.
    pub contrast: ContrastReport,
}

/// Session state of the workflow.
#[derive(Debug)]
pub struct MetaModelWorkflow {
    config: WorkflowConfig,
    source_db: Option<Database>,
    scope: Option<Scope>,
    core_experiments: Option<ExperimentFrame>,
    updated_scope: Option<Scope>,
    analysis_db: Option<Database>,
    metamodel: Option<MetaModel>,
    design: Option<Design>,
    metamodel_results: Option<ExperimentFrame>,
}

fn require<'a, T>(slot: &'a Option<T>, what: &str) -> Result<&'a T> {
    slot.as_ref()
        .ok_or_else(|| Error::Other(format!("workflow step needs {what} first")))
}

impl MetaModelWorkflow {
    /// New session for `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the config does not validate.
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source_db: None,
            scope: None,
            core_experiments: None,
            updated_scope: None,
            analysis_db: None,
            metamodel: None,
            design: None,
            metamodel_results: None,
        })
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Step 1: open the existing source store.
    ///
    /// Returns the names of the scopes it holds.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` if there is no store at the configured path.
    pub fn open_store(&mut self) -> Result<Vec<String>> {
        let db = Database::open(&self.config.source_db, false)?;
        let names = db.read_scope_names();
        tracing::info!(
            path = %self.config.source_db.display(),
            scopes = ?names,
            "opened source store"
        );
        self.source_db = Some(db);
        Ok(names)
    }

    /// Step 2: load the configured scope from the source store.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` if the store lacks it.
    pub fn load_scope(&mut self) -> Result<&Scope> {
        let db = require(&self.source_db, "an open source store")?;
        let scope = db.read_scope(&self.config.scope_name)?;
        tracing::info!("{}", scope.info());
        Ok(self.scope.insert(scope))
    }

    /// Designs of the scope in the source store.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` if the store lacks the scope.
    pub fn design_names(&self) -> Result<Vec<String>> {
        let db = require(&self.source_db, "an open source store")?;
        db.read_design_names(&self.config.scope_name)
    }

    /// Step 3: load the core-model results with dtypes enforced.
    ///
    /// # Errors
    ///
    /// Returns `DesignNotFound` if the store lacks the design.
    pub fn load_experiments(&mut self) -> Result<&ExperimentFrame> {
        let db = require(&self.source_db, "an open source store")?;
        let options = ReadOptions::new()
            .ensure_dtypes(true)
            .source(Source::CoreModel);
        let frame =
            db.read_experiments(&self.config.scope_name, &self.config.design_name, &options)?;
        Ok(self.core_experiments.insert(frame))
    }

    /// Step 4: load the updated scope file, or reuse the stored scope.
    ///
    /// # Errors
    ///
    /// Returns scope parsing errors, and `ScopeMismatch` if the file names a
    /// different scope than the stored one.
    pub fn load_updated_scope(&mut self) -> Result<&Scope> {
        let stored = require(&self.scope, "the stored scope")?;
        let updated = match &self.config.scope_file {
            Some(path) => Scope::from_yaml_file(path)?,
            None => stored.clone(),
        };
        if updated.name() != stored.name() {
            return Err(Error::ScopeMismatch {
                expected: stored.name().to_string(),
                actual: updated.name().to_string(),
            });
        }
        tracing::info!("{}", updated.info());
        Ok(self.updated_scope.insert(updated))
    }

    /// Step 5: write a text overview of the core results under the updated
    /// scope.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the writer fails.
    pub fn visualize<W: Write>(&self, out: &mut W) -> Result<()> {
        let scope = require(&self.updated_scope, "the updated scope")?;
        let frame = require(&self.core_experiments, "core experiments")?;
        analysis::display_experiments(scope, frame, out)
    }

    /// Step 6: feature scores of the core results under the stored scope.
    ///
    /// # Errors
    ///
    /// Fails if steps 2 and 3 have not run.
    pub fn feature_scores(&self) -> Result<FeatureScores> {
        let scope = require(&self.scope, "the stored scope")?;
        let frame = require(&self.core_experiments, "core experiments")?;
        analysis::feature_scores(scope, frame)
    }

    /// Step 7: create the analysis store, replacing any store at its path,
    /// and record the updated scope and core results in it.
    ///
    /// # Errors
    ///
    /// Returns store errors, and `SchemaMismatch` if the core results do not
    /// fit the updated scope.
    pub fn persist(&mut self) -> Result<()> {
        let scope = require(&self.updated_scope, "the updated scope")?;
        let frame = require(&self.core_experiments, "core experiments")?;
        let mut db = Database::open(&self.config.analysis_db, true)?;
        db.write_scope(scope)?;
        let written = db.write_experiments(
            scope.name(),
            &self.config.design_name,
            Source::CoreModel,
            frame,
        )?;
        tracing::info!(
            path = %self.config.analysis_db.display(),
            rows = written.len(),
            "recorded core experiments in analysis store"
        );
        self.analysis_db = Some(db);
        Ok(())
    }

    /// Step 8: fit a meta-model of the updated scope to the core results
    /// and store it in the analysis store.
    ///
    /// # Errors
    ///
    /// Returns fitting and store errors.
    pub fn fit(&mut self) -> Result<&MetaModel> {
        let scope = require(&self.updated_scope, "the updated scope")?;
        let frame = require(&self.core_experiments, "core experiments")?;
        let db = self
            .analysis_db
            .as_mut()
            .ok_or_else(|| Error::Other("workflow step needs the analysis store first".into()))?;

        let model = {
            let _timer = TimingLog::new("create meta-model");
            create_metamodel(scope, frame, Some(db), &self.config.metamodel)?
        };
        tracing::info!("{model}");
        Ok(self.metamodel.insert(model))
    }

    /// Cross-validate the fitted meta-model with the configured folds.
    ///
    /// Returns nothing when `cv_folds` is 0.
    ///
    /// # Errors
    ///
    /// Returns fitting errors, or `InvalidInput` if a measure has fewer rows
    /// than folds.
    pub fn cross_validate(&self) -> Result<Vec<CrossValScore>> {
        let model = require(&self.metamodel, "a fitted meta-model")?;
        if self.config.cv_folds == 0 {
            return Ok(Vec::new());
        }
        let _timer = TimingLog::new(format!("{}-fold cross-validation", self.config.cv_folds));
        model.cross_val_scores(self.config.cv_folds, self.config.seed)
    }

    /// Step 9: draw a new design for the updated scope in the analysis
    /// store.
    ///
    /// # Errors
    ///
    /// Returns sampling and store errors.
    pub fn design(&mut self) -> Result<&Design> {
        let scope = require(&self.updated_scope, "the updated scope")?;
        let db = self
            .analysis_db
            .as_mut()
            .ok_or_else(|| Error::Other("workflow step needs the analysis store first".into()))?;
        let options = DesignOptions::default().seed(self.config.seed);
        let design = design::design_experiments(
            scope,
            self.config.n_samples,
            self.config.sampler,
            &options,
            Some(db),
        )?;
        Ok(self.design.insert(design))
    }

    /// Step 10: run the meta-model on the new design, recording the results.
    ///
    /// # Errors
    ///
    /// Returns evaluation and store errors.
    pub fn evaluate(&mut self) -> Result<&ExperimentFrame> {
        let model = require(&self.metamodel, "a fitted meta-model")?;
        let design = require(&self.design, "a new design")?;
        let db = self
            .analysis_db
            .as_mut()
            .ok_or_else(|| Error::Other("workflow step needs the analysis store first".into()))?;
        let results = {
            let _timer = TimingLog::new(format!("evaluate meta-model on {} rows", design.len()));
            model.run_experiments(design, Some(db))?
        };
        Ok(self.metamodel_results.insert(results))
    }

    /// Step 11: contrast meta-model results against core results.
    ///
    /// # Errors
    ///
    /// Fails if steps 3 and 10 have not run.
    pub fn contrast(&self) -> Result<ContrastReport> {
        let scope = require(&self.updated_scope, "the updated scope")?;
        let meta = require(&self.metamodel_results, "meta-model results")?;
        let core = require(&self.core_experiments, "core experiments")?;
        analysis::contrast_experiments(scope, meta, core, self.config.mass)
    }

    /// Fitted meta-model, after step 8.
    #[must_use]
    pub const fn metamodel(&self) -> Option<&MetaModel> {
        self.metamodel.as_ref()
    }

    /// Analysis store, after step 7.
    #[must_use]
    pub const fn analysis_db(&self) -> Option<&Database> {
        self.analysis_db.as_ref()
    }

    /// Run every step, writing the human-readable output to `out`.
    ///
    /// # Errors
    ///
    /// Returns the first step's error; later steps do not run.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<WorkflowReport> {
        let _timer = TimingLog::new("meta-model workflow");

        let scope_names = self.open_store()?;
        self.load_scope()?;
        let design_names = self.design_names()?;
        let core_rows = self.load_experiments()?.len();
        self.load_updated_scope()?;

        self.visualize(out)?;
        let feature_scores = self.feature_scores()?;
        writeln!(out, "\nFeature scores\n{feature_scores}")?;

        self.persist()?;
        let model = self.fit()?;
        let metamodel_id = model.metamodel_id();
        let fit = model.fit_statistics();
        writeln!(out, "{model}")?;

        let cross_validation = self.cross_validate()?;
        for score in &cross_validation {
            writeln!(out, "  cv {:<32} r2={:.4}", score.measure, score.r2)?;
        }

        let design_name = self.design()?.name().to_string();
        let metamodel_rows = self.evaluate()?.len();
        let contrast = self.contrast()?;
        let core_design = &self.config.design_name;
        writeln!(out, "\nContrast ({design_name} vs {core_design})\n{contrast}")?;

        Ok(WorkflowReport {
            scope_names,
            design_names,
            core_rows,
            feature_scores,
            metamodel_id,
            fit,
            cross_validation,
            design_name,
            metamodel_rows,
            contrast,
        })
    }
}
