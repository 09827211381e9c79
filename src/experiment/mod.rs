//! Experiment results
//!
//! An experiment is one design point: a vector of input-factor values. Once
//! a model has run it, the row also carries performance-measure values and a
//! [`Source`] tag saying which model produced them.
//!
//! ## Schema Overview
//!
//! ```text
//! Scope (1) ──< Design (N) ──< experiment row (N)
//!                                 ├── experiment_id  (per-scope, shared across designs)
//!                                 ├── source         (0 = core model, k = meta-model k)
//!                                 └── inputs + measures as f64 (NaN = missing)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use surrogate_db::experiment::{ExperimentFrame, Source};
//!
//! let mut frame = ExperimentFrame::new("SOABM", &["fuel_price", "region_vmt"])?;
//! frame.push_row(1, Source::CoreModel, &[2.5, 1.2e7])?;
//!
//! let core = frame.select_source(Source::CoreModel);
//! assert_eq!(core.len(), 1);
//! # Ok::<(), surrogate_db::Error>(())
//! ```

mod frame;
mod source;

pub use frame::{ExperimentFrame, EXPERIMENT_ID_COLUMN, SOURCE_COLUMN};
pub use source::Source;
