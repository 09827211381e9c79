//! # surrogate-db: Meta-Models of Core Simulation Experiments
//!
//! **Version**: 0.1.0
//!
//! surrogate-db stores the experiments of an exploratory-modeling study
//! (scopes, designs, provenance-tagged results) in an embedded Parquet
//! store, fits regression meta-models to core-model results, and evaluates
//! those surrogates on large new designs at a fraction of the core model's
//! cost.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: a meta-model only evaluates frames of its own scope
//! - **Jidoka**: provenance tags keep core and meta-model rows apart
//! - **Genchi Genbutsu**: fit statistics, cross-validation and contrasts
//!   against core results are first-class outputs
//! - **Muda elimination**: append-only Parquet parts, no rewrites
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use surrogate_db::database::{Database, ReadOptions};
//! use surrogate_db::design::{design_experiments, DesignOptions, Sampler};
//! use surrogate_db::metamodel::{create_metamodel, MetaModelConfig};
//!
//! let db = Database::open("soabm_v2.db", false)?;
//! let scope = db.read_scope("SOABM")?;
//! let read = ReadOptions::new().ensure_dtypes(true);
//! let core = db.read_experiments("SOABM", "odot_lhs", &read)?;
//!
//! let mut analysis = Database::open("analysis.db", true)?;
//! let config = MetaModelConfig::default();
//! let mm = create_metamodel(&scope, &core, Some(&mut analysis), &config)?;
//! let options = DesignOptions::default().seed(42);
//! let big = design_experiments(&scope, 5000, Sampler::MonteCarlo, &options, Some(&mut analysis))?;
//! let runs = mm.run_experiments(&big, Some(&mut analysis))?;
//! assert_eq!(runs.len(), 5000);
//! # Ok::<(), surrogate_db::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod database;
pub mod design;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod metamodel;
pub mod regression;
pub mod scope;
pub mod storage;
pub mod workflow;

pub use error::{Error, Result};
