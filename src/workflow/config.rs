//! Workflow configuration
//!
//! Loaded from YAML or JSON; every field has a default, so a file only
//! needs the keys it changes:
//!
//! ```yaml
//! source_db: soabm_v2.db
//! scope_name: SOABM
//! design_name: odot_lhs
//! scope_file: SOABM_scope.yaml
//! analysis_db: soabm_live_analysis_v2.db
//! n_samples: 5000
//! sampler: mc
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::design::Sampler;
use crate::metamodel::MetaModelConfig;
use crate::{Error, Result};

/// Settings for a [`MetaModelWorkflow`](super::MetaModelWorkflow) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Existing store holding the core-model experiments.
    pub source_db: PathBuf,
    /// Scope to read from the source store.
    pub scope_name: String,
    /// Design holding the core-model results.
    pub design_name: String,
    /// Updated scope definition; the stored scope is reused when absent.
    pub scope_file: Option<PathBuf>,
    /// Store created (or replaced) for the analysis.
    pub analysis_db: PathBuf,
    /// Meta-model fitting settings.
    pub metamodel: MetaModelConfig,
    /// Folds for cross-validation; 0 skips it.
    pub cv_folds: usize,
    /// Size of the new design evaluated by the meta-model.
    pub n_samples: usize,
    /// Sampler for the new design.
    pub sampler: Sampler,
    /// Seed for sampling and cross-validation splits.
    pub seed: u64,
    /// Central probability mass, in percent, for the contrast.
    pub mass: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            source_db: PathBuf::from("soabm_v2.db"),
            scope_name: "SOABM".to_string(),
            design_name: "odot_lhs".to_string(),
            scope_file: None,
            analysis_db: PathBuf::from("soabm_live_analysis_v2.db"),
            metamodel: MetaModelConfig::default(),
            cv_folds: 5,
            n_samples: 5000,
            sampler: Sampler::MonteCarlo,
            seed: 0,
            mass: 100.0,
        }
    }
}

impl WorkflowConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if unreadable, `Yaml`/`Json` if malformed, and
    /// `InvalidInput` for an unknown extension or invalid values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(Error::InvalidInput(format!(
                "config file {} must end in .yaml, .yml or .json",
                path.display()
            ))),
        }
    }

    /// Parse YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Yaml` if malformed and `InvalidInput` for invalid values.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Json` if malformed and `InvalidInput` for invalid values.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for zero samples, `cv_folds == 1`, a mass
    /// outside `(0, 100]`, or identical source and analysis stores.
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(Error::InvalidInput("n_samples must be greater than 0".into()));
        }
        if self.cv_folds == 1 {
            return Err(Error::InvalidInput("cv_folds must be 0 or at least 2".into()));
        }
        if !(self.mass > 0.0 && self.mass <= 100.0) {
            return Err(Error::InvalidInput(format!(
                "mass must be in (0, 100], got {}",
                self.mass
            )));
        }
        if self.source_db == self.analysis_db {
            return Err(Error::InvalidInput(format!(
                "analysis store {} would replace the source store",
                self.analysis_db.display()
            )));
        }
        Ok(())
    }

    /// Set the source store path.
    #[must_use]
    pub fn source_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_db = path.into();
        self
    }

    /// Set the scope name.
    #[must_use]
    pub fn scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = name.into();
        self
    }

    /// Set the core-model design name.
    #[must_use]
    pub fn design_name(mut self, name: impl Into<String>) -> Self {
        self.design_name = name.into();
        self
    }

    /// Set the updated scope file.
    #[must_use]
    pub fn scope_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scope_file = Some(path.into());
        self
    }

    /// Set the analysis store path.
    #[must_use]
    pub fn analysis_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.analysis_db = path.into();
        self
    }

    /// Set the meta-model settings.
    #[must_use]
    pub const fn metamodel(mut self, metamodel: MetaModelConfig) -> Self {
        self.metamodel = metamodel;
        self
    }

    /// Set the number of cross-validation folds.
    #[must_use]
    pub const fn cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set the new design's size and sampler.
    #[must_use]
    pub const fn samples(mut self, n_samples: usize, sampler: Sampler) -> Self {
        self.n_samples = n_samples;
        self.sampler = sampler;
        self
    }

    /// Set the seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the contrast mass.
    #[must_use]
    pub const fn mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::RegressorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_samples, 5000);
        assert_eq!(config.sampler, Sampler::MonteCarlo);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = WorkflowConfig::from_yaml_str(
            "scope_name: Toy\nsampler: lhs\nmetamodel:\n  regression:\n    kind: linear\n",
        )
        .unwrap();
        assert_eq!(config.scope_name, "Toy");
        assert_eq!(config.sampler, Sampler::Lhs);
        assert_eq!(config.metamodel.regression.kind, RegressorKind::Linear);
        assert_eq!(config.metamodel.min_rows, 5);
        assert_eq!(config.design_name, "odot_lhs");
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.json");
        let config = WorkflowConfig::default().scope_name("Toy").seed(42).mass(90.0);
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        let loaded = WorkflowConfig::from_file(&path).unwrap();
        assert_eq!(loaded.scope_name, "Toy");
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded.mass, 90.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(WorkflowConfig::from_yaml_str("n_samples: 0").is_err());
        assert!(WorkflowConfig::from_yaml_str("cv_folds: 1").is_err());
        assert!(WorkflowConfig::from_yaml_str("mass: 150").is_err());
        assert!(WorkflowConfig::from_yaml_str("analysis_db: soabm_v2.db").is_err());
        assert!(WorkflowConfig::from_file("workflow.toml").is_err());
    }
}
