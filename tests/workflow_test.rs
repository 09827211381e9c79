//! End-to-end meta-model workflow
//!
//! Toyota Way: Jidoka (Built-in Quality)

mod common;

use common::{seed_source_store, updated_scope_yaml, CORE_DESIGN, SCOPE_NAME};
use surrogate_db::database::{Database, ReadOptions};
use surrogate_db::design::Sampler;
use surrogate_db::experiment::Source;
use surrogate_db::workflow::{MetaModelWorkflow, WorkflowConfig};
use surrogate_db::Error;

fn config(dir: &std::path::Path) -> WorkflowConfig {
    let scope_file = dir.join("SOABM_scope.yaml");
    std::fs::write(&scope_file, updated_scope_yaml()).unwrap();
    WorkflowConfig::default()
        .source_db(dir.join("soabm_v2.db"))
        .analysis_db(dir.join("soabm_live_analysis_v2.db"))
        .scope_file(scope_file)
        .samples(5000, Sampler::MonteCarlo)
        .seed(7)
}

#[test]
fn test_full_run_produces_5000_metamodel_rows() {
    let dir = tempfile::tempdir().unwrap();
    seed_source_store(&dir.path().join("soabm_v2.db"), 60);

    let mut workflow = MetaModelWorkflow::new(config(dir.path())).unwrap();
    let mut out = Vec::new();
    let report = workflow.run(&mut out).unwrap();

    assert_eq!(report.scope_names, vec![SCOPE_NAME]);
    assert_eq!(report.design_names, vec![CORE_DESIGN]);
    assert_eq!(report.core_rows, 60);
    assert_eq!(report.metamodel_id, 1);
    assert_eq!(report.design_name, "mc");
    assert_eq!(report.metamodel_rows, 5000);

    // hours_of_delay is declared by the updated scope but has no data
    let fitted: Vec<&str> = report.fit.iter().map(|f| f.measure.as_str()).collect();
    assert_eq!(fitted, vec!["region_vmt", "transit_share"]);
    assert!(report.fit.iter().all(|f| f.r2 > 0.9));
    assert_eq!(report.cross_validation.len(), 2);
    assert!(report.cross_validation.iter().all(|s| s.r2 > 0.8));

    // feature scores use the stored scope
    assert_eq!(report.feature_scores.measures(), ["region_vmt", "transit_share"]);
    assert_eq!(report.contrast.measures.len(), 2);
    assert!((0.0..=1.0).contains(&report.contrast.divergence()));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Scope SOABM: 60 experiments"));
    assert!(text.contains("Feature scores"));
    assert!(text.contains("MetaModel 1 for scope SOABM"));

    let analysis = Database::open(dir.path().join("soabm_live_analysis_v2.db"), false).unwrap();
    let scope = analysis.read_scope(SCOPE_NAME).unwrap();
    assert!(scope.measure("hours_of_delay").is_some());

    let meta = analysis
        .read_experiments(SCOPE_NAME, "mc", &ReadOptions::new().source(Source::MetaModel(1)))
        .unwrap();
    assert_eq!(meta.len(), 5000);
    assert!(meta.column("region_vmt").unwrap().iter().all(|v| *v > 0.0));

    let core = analysis
        .read_experiments(SCOPE_NAME, CORE_DESIGN, &ReadOptions::new())
        .unwrap();
    assert_eq!(core.len(), 60);
    assert!(core.sources().iter().all(|s| *s == Source::CoreModel));
}

#[test]
fn test_rerun_replaces_analysis_store() {
    let dir = tempfile::tempdir().unwrap();
    seed_source_store(&dir.path().join("soabm_v2.db"), 30);
    let config = config(dir.path()).samples(200, Sampler::Lhs).cv_folds(0);

    let first = MetaModelWorkflow::new(config.clone())
        .unwrap()
        .run(&mut std::io::sink())
        .unwrap();
    let second = MetaModelWorkflow::new(config)
        .unwrap()
        .run(&mut std::io::sink())
        .unwrap();

    assert!(second.cross_validation.is_empty());
    assert_eq!(first.metamodel_id, second.metamodel_id);
    assert_eq!(second.design_name, "lhs");
    assert_eq!(first.contrast, second.contrast);
}

#[test]
fn test_missing_source_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut workflow = MetaModelWorkflow::new(config(dir.path())).unwrap();
    let err = workflow.run(&mut std::io::sink()).unwrap_err();
    assert!(matches!(err, Error::StoreNotFound(_)));
}

#[test]
fn test_missing_design_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    seed_source_store(&dir.path().join("soabm_v2.db"), 10);
    let config = config(dir.path()).design_name("odot_mc");

    let mut workflow = MetaModelWorkflow::new(config).unwrap();
    workflow.open_store().unwrap();
    workflow.load_scope().unwrap();
    assert!(matches!(
        workflow.load_experiments(),
        Err(Error::DesignNotFound { .. })
    ));
}

#[test]
fn test_steps_out_of_order_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut workflow = MetaModelWorkflow::new(config(dir.path())).unwrap();
    assert!(workflow.fit().is_err());
    assert!(workflow.contrast().is_err());
}

#[test]
fn test_updated_scope_must_keep_name() {
    let dir = tempfile::tempdir().unwrap();
    seed_source_store(&dir.path().join("soabm_v2.db"), 10);
    let renamed = dir.path().join("renamed.yaml");
    std::fs::write(&renamed, updated_scope_yaml().replace("name: SOABM", "name: OTHER")).unwrap();

    let mut workflow = MetaModelWorkflow::new(config(dir.path()).scope_file(&renamed)).unwrap();
    workflow.open_store().unwrap();
    workflow.load_scope().unwrap();
    assert!(matches!(
        workflow.load_updated_scope(),
        Err(Error::ScopeMismatch { .. })
    ));
}
