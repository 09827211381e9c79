//! Shared fixtures: a small "SOABM" scope and a toy core model

#![allow(dead_code)]

use std::path::Path;

use surrogate_db::database::Database;
use surrogate_db::design::{design_experiments, DesignOptions, Sampler};
use surrogate_db::experiment::{ExperimentFrame, Source};
use surrogate_db::scope::Scope;

pub const SCOPE_NAME: &str = "SOABM";
pub const CORE_DESIGN: &str = "odot_lhs";

pub const STORED_SCOPE: &str = r"
scope:
  name: SOABM
  desc: Toy stand-in for the Southern Oregon ABM
inputs:
  fuel_price:
    ptype: exogenous uncertainty
    dtype: real
    min: 1.0
    max: 5.0
    default: 2.5
    dist:
      name: triangular
      peak: 2.0
  new_lanes:
    ptype: policy lever
    dtype: int
    min: 0
    max: 4
    default: 0
  transit_fare:
    ptype: policy lever
    dtype: cat
    values: [flat, zonal]
    default: flat
  model_year:
    ptype: constant
    value: 2040
outputs:
  region_vmt:
    kind: minimize
    transform: ln
  transit_share:
    kind: maximize
";

/// Stored scope plus a measure the core runs never produced.
pub fn updated_scope_yaml() -> String {
    format!("{STORED_SCOPE}  hours_of_delay:\n    kind: minimize\n")
}

pub fn stored_scope() -> Scope {
    Scope::from_yaml_str(STORED_SCOPE).unwrap()
}

/// Deterministic stand-in for the core simulation.
pub fn core_model(design: &ExperimentFrame) -> ExperimentFrame {
    let fuel = design.column("fuel_price").unwrap();
    let lanes = design.column("new_lanes").unwrap();
    let fare = design.column("transit_fare").unwrap();

    let vmt = (0..design.len())
        .map(|i| {
            let log_vmt = 16.0 + 0.1 * fuel[i] - 0.05 * lanes[i] + 0.02 * fare[i];
            (log_vmt - 0.01 * fuel[i].powi(2)).exp()
        })
        .collect();
    let share = (0..design.len())
        .map(|i| 0.05 + 0.01 * fuel[i] + 0.02 * fare[i] - 0.002 * lanes[i])
        .collect();

    let mut results = design.clone();
    results.add_column("region_vmt", vmt).unwrap();
    results.add_column("transit_share", share).unwrap();
    results
}

/// Create a store holding the stored scope and `n` core-model runs of an
/// LHS design named `odot_lhs`.
pub fn seed_source_store(path: &Path, n: usize) -> ExperimentFrame {
    let scope = stored_scope();
    let mut db = Database::open(path, true).unwrap();
    db.write_scope(&scope).unwrap();

    let options = DesignOptions::default().seed(2019).design_name(CORE_DESIGN);
    let design = design_experiments(&scope, n, Sampler::Lhs, &options, Some(&mut db)).unwrap();
    let results = core_model(design.frame());
    db.write_experiments(SCOPE_NAME, CORE_DESIGN, Source::CoreModel, &results)
        .unwrap()
}
