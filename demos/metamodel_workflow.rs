//! Meta-model development walkthrough
//!
//! Builds a throwaway source store of core-model runs from a toy model,
//! then walks the workflow one step at a time, printing what each step
//! produces.
//!
//! Run with: `cargo run --example metamodel_workflow`
//! (set `RUST_LOG=surrogate_db=debug` for per-fit detail)

use anyhow::{Context, Result};
use surrogate_db::database::Database;
use surrogate_db::design::{design_experiments, DesignOptions, Sampler};
use surrogate_db::experiment::{ExperimentFrame, Source};
use surrogate_db::logging;
use surrogate_db::scope::Scope;
use surrogate_db::workflow::{MetaModelWorkflow, WorkflowConfig};

const SCOPE_YAML: &str = r"
scope:
  name: SOABM
  desc: Toy activity-based model
inputs:
  fuel_price:
    ptype: exogenous uncertainty
    dtype: real
    min: 1.0
    max: 5.0
    default: 2.5
  auto_cost_growth:
    ptype: exogenous uncertainty
    dtype: real
    min: 0.8
    max: 1.6
    default: 1.0
    dist:
      name: triangular
      peak: 1.1
  new_lanes:
    ptype: policy lever
    dtype: int
    min: 0
    max: 4
    default: 0
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

const NEW_OUTPUT: &str = "  hours_of_delay:\n    kind: minimize\n";

fn toy_core_model(design: &ExperimentFrame) -> Result<ExperimentFrame> {
    let fuel = design.column("fuel_price").context("fuel_price column")?;
    let growth = design.column("auto_cost_growth").context("auto_cost_growth column")?;
    let lanes = design.column("new_lanes").context("new_lanes column")?;

    let vmt = (0..design.len())
        .map(|i| (16.0 - 0.08 * fuel[i] - 0.2 * growth[i] + 0.03 * lanes[i]).exp())
        .collect();
    let share = (0..design.len())
        .map(|i| 0.04 + 0.006 * fuel[i] * growth[i] - 0.001 * lanes[i])
        .collect();

    let mut results = design.clone();
    results.add_column("region_vmt", vmt)?;
    results.add_column("transit_share", share)?;
    Ok(results)
}

fn main() -> Result<()> {
    logging::init(tracing::Level::INFO);

    println!("=== surrogate-db: meta-model development ===\n");

    let dir = tempfile::tempdir()?;
    let source_path = dir.path().join("soabm_v2.db");
    let scope_file = dir.path().join("SOABM_scope.yaml");
    std::fs::write(&scope_file, format!("{SCOPE_YAML}{NEW_OUTPUT}"))?;

    // Stand-in for previously completed core model runs.
    {
        let scope = Scope::from_yaml_str(SCOPE_YAML)?;
        let mut db = Database::open(&source_path, true)?;
        db.write_scope(&scope)?;
        let options = DesignOptions::default().seed(2019).design_name("odot_lhs");
        let design = design_experiments(&scope, 100, Sampler::Lhs, &options, Some(&mut db))?;
        let results = toy_core_model(design.frame())?;
        db.write_experiments("SOABM", "odot_lhs", Source::CoreModel, &results)?;
    }

    let config = WorkflowConfig::default()
        .source_db(&source_path)
        .analysis_db(dir.path().join("soabm_live_analysis_v2.db"))
        .scope_file(&scope_file)
        .samples(5000, Sampler::MonteCarlo);
    let mut workflow = MetaModelWorkflow::new(config)?;

    println!("Scopes: {:?}", workflow.open_store()?);
    println!("{}", workflow.load_scope()?.info());
    println!("Designs: {:?}", workflow.design_names()?);
    println!("Core experiments: {} rows", workflow.load_experiments()?.len());
    println!("{}", workflow.load_updated_scope()?.info());

    println!("--- Core model experiments ---");
    workflow.visualize(&mut std::io::stdout())?;

    println!("\n--- Feature scores ---");
    println!("{}", workflow.feature_scores()?);

    workflow.persist()?;
    let model = workflow.fit()?;
    println!("{model}");
    for fit in model.fit_statistics() {
        println!("{} coefficients:", fit.measure);
        for c in &fit.coefficients {
            let se = c.std_error.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
            println!("  {:<20} {:>12.5} se={se}", c.name, c.estimate);
        }
    }

    for score in workflow.cross_validate()? {
        println!("cv {:<20} r2={:.4}", score.measure, score.r2);
    }

    let design_name = workflow.design()?.name().to_string();
    let rows = workflow.evaluate()?.len();
    println!("\nMeta-model ran {rows} experiments in design {design_name}");

    println!("\n--- Contrast: meta-model vs core model ---");
    println!("{}", workflow.contrast()?);

    Ok(())
}
